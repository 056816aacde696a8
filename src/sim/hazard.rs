//! The chasing danger front
//!
//! Advances along x at a speed that ramps with elapsed run time. A button
//! press pushes the elapsed-time reference back instead of touching `x`, so
//! the front only ever slows its acceleration and never retreats.

use serde::{Deserialize, Serialize};

use super::camera::Camera;
use super::lives::{LivesOutcome, LivesTracker};
use super::session::SessionState;
use crate::tuning::Tuning;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HazardFront {
    /// World x of the front
    pub x: f32,
    /// Presentation signal: front position across the screen, in [0, 1]
    pub progress: f32,
    /// Accumulated slowdown shift of the elapsed-time reference
    slowdown_offset_ms: f64,
    /// Speed used by the latest tick (units per ms)
    speed: f32,
    base_speed: f32,
    ramp: f32,
    slowdown_ms: f64,
}

impl HazardFront {
    pub fn new(start_x: f32, tuning: &Tuning) -> Self {
        Self {
            x: start_x,
            progress: 0.0,
            slowdown_offset_ms: 0.0,
            speed: tuning.hazard_base_speed,
            base_speed: tuning.hazard_base_speed,
            ramp: tuning.hazard_ramp,
            slowdown_ms: tuning.slowdown_ms,
        }
    }

    /// Speed for a given run time, after the slowdown shift
    pub fn speed_at(&self, elapsed_ms: f64) -> f32 {
        let shifted = (elapsed_ms - self.slowdown_offset_ms).max(0.0);
        self.base_speed + self.ramp * shifted as f32
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn slowdown_offset_ms(&self) -> f64 {
        self.slowdown_offset_ms
    }

    /// Advance by one frame
    pub fn tick(&mut self, delta_ms: f32, elapsed_ms: f64) {
        self.speed = self.speed_at(elapsed_ms);
        self.x += delta_ms.max(0.0) * self.speed;
    }

    /// Temporary reprieve: pretend the run is younger than it is
    pub fn slow_down(&mut self) {
        self.slowdown_offset_ms += self.slowdown_ms;
        log::debug!("Danger slowed, offset now {} ms", self.slowdown_offset_ms);
    }

    /// Has the front reached `trailing_x`?
    pub fn has_caught(&self, trailing_x: f32) -> bool {
        trailing_x - self.x <= 0.0
    }

    /// End the run if the trailing actor has been caught
    pub fn check_loss(
        &self,
        trailing_x: f32,
        lives: &mut LivesTracker,
        session: &mut SessionState,
    ) -> LivesOutcome {
        if session.has_lost || !self.has_caught(trailing_x) {
            return LivesOutcome::Ignored;
        }
        log::info!("Caught by the danger front at x={:.2}", self.x);
        lives.lose(session)
    }

    /// Project the front through the camera; `origin_x` is the render offset
    pub fn update_progress(&mut self, camera: &Camera, origin_x: f32) {
        self.progress = camera.screen_progress(origin_x + self.x);
    }
}
