//! Data-driven game balance
//!
//! Every pacing constant lives here so a run can be re-balanced from JSON
//! without touching the simulation code.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading a tuning override
#[derive(Debug, Error)]
pub enum TuningError {
    #[error("tuning JSON is malformed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("tuning value `{field}` is out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

/// Gameplay constants. Times are milliseconds, distances are world units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Largest frame delta fed to the simulation (slow frames are clamped)
    pub max_delta_ms: f32,

    /// Window in which the partner must confirm a synchronized action
    pub sync_window_ms: f64,
    /// Window in which the partner must send a matching joystick vector
    pub joystick_window_ms: f64,
    /// Duration of the fuse/defuse animation
    pub fusion_transition_ms: f32,

    /// Danger front speed at elapsed 0 (units per ms)
    pub hazard_base_speed: f32,
    /// Danger front speed gained per elapsed ms (units per ms²)
    pub hazard_ramp: f32,
    /// How far the elapsed-time reference is pushed back by a button
    pub slowdown_ms: f64,
    /// Danger front starts this fraction of the visible width behind the origin
    pub hazard_start_factor: f32,

    /// Actor speed at session start (units per second)
    pub actor_base_speed: f32,
    /// Actor speed gained per elapsed second
    pub actor_speed_ramp: f32,
    /// Upward velocity change applied by a jump
    pub jump_velocity: f32,
    /// Gravity along y (negative)
    pub gravity: f32,
    /// Falling below this height ends the run
    pub fall_loss_y: f32,

    /// Lives at session start
    pub starting_lives: u8,

    /// Track is generated this many visible widths past the leading actor
    pub lookahead_widths: f32,
    /// Chunks before this x (relative to spawn) are forced to the safe type
    pub lead_in: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            max_delta_ms: 1000.0 / 60.0,

            sync_window_ms: 1000.0,
            joystick_window_ms: 1000.0,
            fusion_transition_ms: 300.0,

            hazard_base_speed: 0.0005,
            hazard_ramp: 0.000_000_1,
            slowdown_ms: 8000.0,
            hazard_start_factor: 0.6,

            actor_base_speed: 2.5,
            actor_speed_ramp: 0.06,
            jump_velocity: 5.5,
            gravity: -9.81,
            fall_loss_y: -4.0,

            starting_lives: 2,

            lookahead_widths: 2.0,
            lead_in: 2.0,
        }
    }
}

impl Tuning {
    /// Parse a (possibly partial) JSON override; missing fields keep defaults
    pub fn from_json(json: &str) -> Result<Self, TuningError> {
        let tuning: Tuning = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Reject values that would stall or invert the simulation
    pub fn validate(&self) -> Result<(), TuningError> {
        let positive: [(&'static str, f64); 7] = [
            ("max_delta_ms", self.max_delta_ms as f64),
            ("sync_window_ms", self.sync_window_ms),
            ("joystick_window_ms", self.joystick_window_ms),
            ("hazard_base_speed", self.hazard_base_speed as f64),
            ("actor_base_speed", self.actor_base_speed as f64),
            ("jump_velocity", self.jump_velocity as f64),
            ("lookahead_widths", self.lookahead_widths as f64),
        ];
        for (field, value) in positive {
            if !(value > 0.0) {
                return Err(TuningError::OutOfRange { field, value });
            }
        }

        let non_negative: [(&'static str, f64); 5] = [
            ("hazard_ramp", self.hazard_ramp as f64),
            ("slowdown_ms", self.slowdown_ms),
            ("actor_speed_ramp", self.actor_speed_ramp as f64),
            ("fusion_transition_ms", self.fusion_transition_ms as f64),
            ("lead_in", self.lead_in as f64),
        ];
        for (field, value) in non_negative {
            if !(value >= 0.0) {
                return Err(TuningError::OutOfRange { field, value });
            }
        }

        if self.gravity >= 0.0 {
            return Err(TuningError::OutOfRange {
                field: "gravity",
                value: self.gravity as f64,
            });
        }
        if self.starting_lives == 0 {
            return Err(TuningError::OutOfRange {
                field: "starting_lives",
                value: 0.0,
            });
        }
        Ok(())
    }

    /// LocalStorage key for a balance override
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "boop_runner_tuning";

    /// Load a tuning override from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match Self::from_json(&json) {
                    Ok(tuning) => {
                        log::info!("Loaded tuning override");
                        return tuning;
                    }
                    Err(e) => log::warn!("Ignoring tuning override: {}", e),
                }
            }
        }

        Self::default()
    }

    /// Native stub
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }
}
