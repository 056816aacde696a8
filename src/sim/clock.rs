//! Frame clock
//!
//! Turns raw timestamps (requestAnimationFrame or a test script) into a
//! monotonic `now` and a clamped per-frame delta. Only integration sees the
//! clamp: `now` follows wall time, so scores, ramps and sync deadlines stay
//! in real milliseconds on slow displays.

/// Default clamp: never simulate more than one 60 Hz frame at once
pub const DEFAULT_MAX_DELTA_MS: f32 = 1000.0 / 60.0;

#[derive(Debug, Clone)]
pub struct Clock {
    /// Timestamp of the first frame
    start_ms: f64,
    /// Latest raw timestamp, never decreasing
    now_ms: f64,
    /// Clamped delta of the latest frame
    delta_ms: f32,
    max_delta_ms: f32,
    frames: u64,
}

impl Clock {
    pub fn new(start_ms: f64, max_delta_ms: f32) -> Self {
        Self {
            start_ms,
            now_ms: start_ms,
            delta_ms: 0.0,
            max_delta_ms,
            frames: 0,
        }
    }

    /// Advance to a new raw timestamp; returns the clamped delta.
    ///
    /// Timestamps that go backwards produce a zero delta.
    pub fn advance(&mut self, raw_ms: f64) -> f32 {
        let raw_delta = (raw_ms - self.now_ms).max(0.0) as f32;
        self.now_ms = raw_ms.max(self.now_ms);
        self.delta_ms = raw_delta.min(self.max_delta_ms);
        self.frames += 1;
        self.delta_ms
    }

    #[inline]
    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    #[inline]
    pub fn delta_ms(&self) -> f32 {
        self.delta_ms
    }

    /// Delta in seconds, for physics
    #[inline]
    pub fn delta_secs(&self) -> f32 {
        self.delta_ms / 1000.0
    }

    /// Wall time since the clock started
    pub fn elapsed_ms(&self) -> f64 {
        self.now_ms - self.start_ms
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(0.0, DEFAULT_MAX_DELTA_MS)
    }
}
