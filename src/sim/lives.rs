//! Lives and run outcome
//!
//! The game-over flag itself lives in [`SessionState::has_lost`]; this
//! tracker is the only thing that sets it.

use serde::{Deserialize, Serialize};

use super::session::SessionState;

/// Result of a life-affecting rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivesOutcome {
    /// Run already over; nothing changed
    Ignored,
    /// A life was taken, run continues
    LifeLost { remaining: u8 },
    /// This call ended the run
    GameOver,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivesTracker {
    lives: u8,
    starting: u8,
}

impl LivesTracker {
    pub fn new(starting: u8) -> Self {
        Self {
            lives: starting,
            starting,
        }
    }

    pub fn lives(&self) -> u8 {
        self.lives
    }

    pub fn starting(&self) -> u8 {
        self.starting
    }

    /// Take one life (rule violation)
    pub fn remove_life(&mut self, session: &mut SessionState) -> LivesOutcome {
        if session.has_lost {
            return LivesOutcome::Ignored;
        }
        self.lives = self.lives.saturating_sub(1);
        log::info!("Life lost, {} remaining", self.lives);
        if self.lives == 0 {
            self.end(session)
        } else {
            LivesOutcome::LifeLost {
                remaining: self.lives,
            }
        }
    }

    /// Immediate loss (caught by the danger front, fell off the track)
    pub fn lose(&mut self, session: &mut SessionState) -> LivesOutcome {
        if session.has_lost {
            return LivesOutcome::Ignored;
        }
        self.lives = 0;
        self.end(session)
    }

    fn end(&mut self, session: &mut SessionState) -> LivesOutcome {
        session.has_lost = true;
        log::info!("Game over");
        LivesOutcome::GameOver
    }
}
