//! Boop Runner - A two-player co-op runner
//!
//! Core modules:
//! - `sim`: Simulation core (track streaming, actors, fusion sync, danger front)
//! - `tuning`: Data-driven game balance
//! - `settings`: Player preferences
//! - `assets`: Resource manifest and loader dispatch
//! - `highscores`: Local leaderboard
//! - `audio`: Procedural sound cues

pub mod assets;
pub mod audio;
pub mod highscores;
pub mod settings;
pub mod sim;
pub mod tuning;

pub use highscores::HighScores;
pub use settings::Settings;
pub use tuning::{Tuning, TuningError};

/// World geometry constants
pub mod consts {
    /// Width of one chunk unit along x (chunk width = multiplier * unit)
    pub const BLOCK_WIDTH: f32 = 1.0;
    /// Track depth along z
    pub const BLOCK_DEPTH: f32 = 3.0;
    /// Floor slab height; floor is centered on y = 0
    pub const BLOCK_HEIGHT: f32 = 2.0;
    /// Top surface of the floor
    pub const FLOOR_TOP: f32 = BLOCK_HEIGHT * 0.5;

    /// Actor sphere radius
    pub const SPHERE_RAY: f32 = 0.3;
    /// Fusion body sphere radius
    pub const FUSION_RAY: f32 = 0.42;

    /// Raised platform center height and half thickness
    pub const PLATFORM_Y: f32 = 2.0;
    pub const PLATFORM_HALF_HEIGHT: f32 = 0.1;
    /// Actor bottom must be at or above this to count as standing on a platform
    pub const PLATFORM_TOP: f32 = PLATFORM_Y + PLATFORM_HALF_HEIGHT;

    /// Where parked (non-authoritative) bodies wait, far above the track
    pub const PARK_Y: f32 = 100.0;
    /// Lateral offset of each actor from the fusion body when splitting
    pub const DEFUSE_OFFSET_Z: f32 = 0.5;

    /// Screen-space x (render coordinates) where the trailing actor is anchored
    pub const ANCHOR_X: f32 = -2.0;
}

/// Actor spawn position for a given lane side (1.0 or -1.0)
#[inline]
pub fn spawn_position(side: f32) -> glam::Vec3 {
    use consts::*;
    glam::Vec3::new(0.0, FLOOR_TOP + SPHERE_RAY, side * BLOCK_DEPTH * 0.25)
}

/// Format elapsed milliseconds as `mm:ss:mmm`
pub fn format_elapsed(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms / 1000) % 60;
    let millis = ms % 1000;
    format!("{:02}:{:02}:{:03}", minutes, seconds, millis)
}
