//! Session-wide flags shared by every subsystem
//!
//! The world owns the single instance and hands out references, so mutation
//! order within a frame is fixed by the world's stage list.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    /// Both players confirmed the start action
    pub started: bool,
    /// Run is over; never cleared except by a full restart
    pub has_lost: bool,
    /// Fusion body is authoritative (set at the start of a fuse transition)
    pub is_fused: bool,
    /// Frame-clock timestamp of the confirmed start
    pub start_time_ms: Option<f64>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the session as started; returns false if it already was
    pub fn start(&mut self, now_ms: f64) -> bool {
        if self.started {
            return false;
        }
        self.started = true;
        self.start_time_ms = Some(now_ms);
        true
    }

    /// Milliseconds since the session started (0 before start)
    pub fn elapsed_ms(&self, now_ms: f64) -> f64 {
        match self.start_time_ms {
            Some(start) => (now_ms - start).max(0.0),
            None => 0.0,
        }
    }

    /// Gameplay is live: started and not yet lost
    pub fn is_running(&self) -> bool {
        self.started && !self.has_lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_once() {
        let mut session = SessionState::new();
        assert_eq!(session.elapsed_ms(500.0), 0.0);
        assert!(session.start(1000.0));
        assert!(!session.start(2000.0));
        assert_eq!(session.start_time_ms, Some(1000.0));
        assert_eq!(session.elapsed_ms(1500.0), 500.0);
        assert!(session.is_running());
        session.has_lost = true;
        assert!(!session.is_running());
    }
}
