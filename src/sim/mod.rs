//! Simulation core
//!
//! Everything that decides what happens in a run lives here. Nothing in this
//! module touches the DOM, the GPU or audio:
//! - Time comes in as raw frame timestamps
//! - Randomness comes from the world's seeded RNG
//! - Subsystems run in the fixed stage order owned by [`World`]

pub mod actor;
pub mod camera;
pub mod chunk;
pub mod clock;
pub mod hazard;
pub mod input;
pub mod lives;
pub mod physics;
pub mod players;
pub mod sequencer;
pub mod session;
pub mod sync;
pub mod world;

pub use actor::Actor;
pub use camera::Camera;
pub use chunk::{Chunk, ChunkKind, FeatureReport, Latch, MeshKey, PlatformGate, Violation};
pub use clock::Clock;
pub use hazard::HazardFront;
pub use input::{ActionKey, ActorId, InputEvent};
pub use lives::{LivesOutcome, LivesTracker};
pub use physics::{KinematicWorld, PhysicsEngine};
pub use players::{FusionState, PlayerManager};
pub use sequencer::ChunkSequencer;
pub use session::SessionState;
pub use sync::{ActionChannel, JoystickChannel};
pub use world::{GameEvent, Hud, TICK_ORDER, TickStage, World};
