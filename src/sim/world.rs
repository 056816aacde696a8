//! Per-frame orchestration
//!
//! `World` owns every subsystem plus the single [`SessionState`], and runs
//! them in the fixed order of [`TICK_ORDER`]. Input arrives through
//! [`World::push_input`]; everything the host needs to react to (HUD, audio,
//! mesh disposal, leaderboard) comes back out of [`World::drain_events`].

use std::collections::VecDeque;

use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::camera::Camera;
use super::chunk::{ChunkKind, MeshKey, Violation};
use super::clock::Clock;
use super::hazard::HazardFront;
use super::input::{ActorId, InputEvent};
use super::lives::{LivesOutcome, LivesTracker};
use super::physics::{KinematicWorld, PhysicsEngine};
use super::players::{PlayerEvent, PlayerManager};
use super::sequencer::ChunkSequencer;
use super::session::SessionState;
use crate::consts::*;
use crate::tuning::Tuning;

/// Stages of one frame, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickStage {
    /// Advance the frame clock
    Clock,
    /// Expire stale synchronization windows
    SyncWindows,
    /// Feed queued input through the synchronization channels
    Input,
    /// Advance any in-flight fusion transition, then apply a deferred split
    Fusion,
    /// Re-anchor the render origin on the trailing actor
    Origin,
    /// Write actor velocities into physics
    ActorsPreStep,
    PhysicsStep,
    /// Route contact events to the owning chunks
    Collisions,
    /// Read body positions back into the actors
    ActorsPostStep,
    Hazard,
    /// Fall and caught-by-danger checks
    Loss,
    /// Retire chunks behind, extend ahead
    Sequencer,
    /// Tunnel, platform and button rules
    Features,
    /// Screen-space danger progress
    Presentation,
}

pub const TICK_ORDER: [TickStage; 14] = [
    TickStage::Clock,
    TickStage::SyncWindows,
    TickStage::Input,
    TickStage::Fusion,
    TickStage::Origin,
    TickStage::ActorsPreStep,
    TickStage::PhysicsStep,
    TickStage::Collisions,
    TickStage::ActorsPostStep,
    TickStage::Hazard,
    TickStage::Loss,
    TickStage::Sequencer,
    TickStage::Features,
    TickStage::Presentation,
];

/// Everything the outside world hears about
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    SessionStarted,
    LivesChanged { lives: u8 },
    GameOver { score_ms: u64 },
    FusionChanged { fused: bool },
    Jumped,
    ButtonPressed,
    Penalty { actor: ActorId, violation: Violation },
    ChunkSpawned { id: u32, kind: ChunkKind },
    ChunkRetired { id: u32, kind: ChunkKind, meshes: Vec<MeshKey> },
}

/// Snapshot for the HUD
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hud {
    pub lives: u8,
    pub started: bool,
    pub game_over: bool,
    pub fused: bool,
    pub elapsed_ms: u64,
    pub danger_progress: f32,
    pub fusion_blend: f32,
}

pub struct World<P: PhysicsEngine = KinematicWorld> {
    tuning: Tuning,
    seed: u64,
    clock: Clock,
    session: SessionState,
    physics: P,
    rng: Pcg32,
    camera: Camera,
    sequencer: ChunkSequencer,
    players: PlayerManager,
    hazard: HazardFront,
    lives: LivesTracker,
    inputs: VecDeque<InputEvent>,
    events: Vec<GameEvent>,
    /// Render-space offset added to world x
    origin_x: f32,
    /// Frozen at game over
    final_score_ms: Option<u64>,
    last_tick_order: Vec<TickStage>,
}

impl World<KinematicWorld> {
    /// World backed by the built-in physics
    pub fn new(tuning: Tuning, seed: u64, start_ms: f64) -> Self {
        let physics = KinematicWorld::new(glam::Vec3::new(0.0, tuning.gravity, 0.0));
        Self::with_physics(physics, tuning, seed, start_ms)
    }
}

impl<P: PhysicsEngine> World<P> {
    pub fn with_physics(mut physics: P, tuning: Tuning, seed: u64, start_ms: f64) -> Self {
        let camera = Camera::default();
        let mut rng = Pcg32::seed_from_u64(seed);
        let players = PlayerManager::new(&mut physics, &tuning);
        let hazard_x = -camera.visible_width() * tuning.hazard_start_factor;
        let hazard = HazardFront::new(hazard_x, &tuning);

        let mut sequencer = ChunkSequencer::new((hazard.x - BLOCK_WIDTH).floor(), tuning.lead_in);
        let mut events = Vec::new();
        let target = players.leading_x() + tuning.lookahead_widths * camera.visible_width();
        for (id, kind) in sequencer.extend(target, &mut physics, &mut rng) {
            events.push(GameEvent::ChunkSpawned { id, kind });
        }

        log::info!(
            "World ready: seed {}, {} chunks, danger at x={:.2}",
            seed,
            sequencer.len(),
            hazard.x
        );

        Self {
            clock: Clock::new(start_ms, tuning.max_delta_ms),
            lives: LivesTracker::new(tuning.starting_lives),
            tuning,
            seed,
            session: SessionState::new(),
            physics,
            rng,
            camera,
            sequencer,
            players,
            hazard,
            inputs: VecDeque::new(),
            events,
            origin_x: 0.0,
            final_score_ms: None,
            last_tick_order: Vec::with_capacity(TICK_ORDER.len()),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn physics(&self) -> &P {
        &self.physics
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn sequencer(&self) -> &ChunkSequencer {
        &self.sequencer
    }

    pub fn players(&self) -> &PlayerManager {
        &self.players
    }

    pub fn hazard(&self) -> &HazardFront {
        &self.hazard
    }

    pub fn lives(&self) -> &LivesTracker {
        &self.lives
    }

    pub fn origin_x(&self) -> f32 {
        self.origin_x
    }

    /// Stages executed by the most recent tick
    pub fn last_tick_order(&self) -> &[TickStage] {
        &self.last_tick_order
    }

    /// Elapsed run time (the score)
    pub fn elapsed_ms(&self) -> u64 {
        if let Some(score) = self.final_score_ms {
            return score;
        }
        self.session.elapsed_ms(self.clock.now_ms()) as u64
    }

    pub fn hud(&self) -> Hud {
        Hud {
            lives: self.lives.lives(),
            started: self.session.started,
            game_over: self.session.has_lost,
            fused: self.session.is_fused,
            elapsed_ms: self.elapsed_ms(),
            danger_progress: self.hazard.progress,
            fusion_blend: self.players.fusion_blend(),
        }
    }

    /// Queue input for the next tick
    pub fn push_input(&mut self, event: InputEvent) {
        self.inputs.push_back(event);
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Run one frame at raw timestamp `raw_ms`
    pub fn tick(&mut self, raw_ms: f64) {
        self.last_tick_order.clear();
        for stage in TICK_ORDER {
            self.run_stage(stage, raw_ms);
            self.last_tick_order.push(stage);
        }
    }

    fn run_stage(&mut self, stage: TickStage, raw_ms: f64) {
        let now = self.clock.now_ms();
        let elapsed = self.session.elapsed_ms(now);

        match stage {
            TickStage::Clock => {
                self.clock.advance(raw_ms);
            }
            TickStage::SyncWindows => {
                let mut out = Vec::new();
                self.players
                    .poll_windows(now, &mut self.session, &mut self.physics, &mut out);
                self.forward_player_events(out);
            }
            TickStage::Input => {
                let mut out = Vec::new();
                while let Some(event) = self.inputs.pop_front() {
                    self.players.handle_input(
                        event,
                        now,
                        &mut self.session,
                        &mut self.physics,
                        &mut out,
                    );
                }
                self.forward_player_events(out);
            }
            TickStage::Fusion => {
                let mut out = Vec::new();
                self.players.advance_transition(
                    self.clock.delta_ms(),
                    &mut self.session,
                    &mut self.physics,
                    &mut out,
                );
                self.forward_player_events(out);
            }
            TickStage::Origin => {
                self.origin_x = ANCHOR_X - self.players.trailing_x();
            }
            TickStage::ActorsPreStep => self.players.pre_step(&mut self.physics, elapsed),
            TickStage::PhysicsStep => self.physics.step(self.clock.delta_secs()),
            TickStage::Collisions => {
                let sequencer = &mut self.sequencer;
                let mut unowned = 0u32;
                self.physics.drain_collision_events(&mut |event| {
                    if !sequencer.dispatch_collision(&event) {
                        unowned += 1;
                    }
                });
                if unowned > 0 {
                    log::trace!("{} contact events between actors only", unowned);
                }
            }
            TickStage::ActorsPostStep => {
                self.players.post_step(&self.physics, self.clock.delta_secs());
            }
            TickStage::Hazard => {
                if self.session.is_running() {
                    self.hazard.tick(self.clock.delta_ms(), elapsed);
                }
            }
            TickStage::Loss => self.check_loss(),
            TickStage::Sequencer => self.stream_chunks(),
            TickStage::Features => self.poll_features(),
            TickStage::Presentation => {
                self.hazard.update_progress(&self.camera, self.origin_x);
            }
        }
    }

    fn forward_player_events(&mut self, out: Vec<PlayerEvent>) {
        for event in out {
            self.events.push(match event {
                PlayerEvent::SessionStarted => GameEvent::SessionStarted,
                PlayerEvent::Jumped => GameEvent::Jumped,
                PlayerEvent::Fused => GameEvent::FusionChanged { fused: true },
                PlayerEvent::Defused => GameEvent::FusionChanged { fused: false },
            });
        }
    }

    fn report(&mut self, outcome: LivesOutcome) {
        match outcome {
            LivesOutcome::Ignored => {}
            LivesOutcome::LifeLost { remaining } => {
                self.events.push(GameEvent::LivesChanged { lives: remaining });
            }
            LivesOutcome::GameOver => {
                let score_ms = self.elapsed_ms();
                self.final_score_ms = Some(score_ms);
                self.players.halt();
                self.events.push(GameEvent::LivesChanged { lives: 0 });
                self.events.push(GameEvent::GameOver { score_ms });
            }
        }
    }

    fn check_loss(&mut self) {
        if !self.session.is_running() {
            return;
        }
        if self.players.any_fallen(self.tuning.fall_loss_y) {
            log::info!("An actor fell off the track");
            let outcome = self.lives.lose(&mut self.session);
            self.report(outcome);
        }
        let outcome = self.hazard.check_loss(
            self.players.trailing_x(),
            &mut self.lives,
            &mut self.session,
        );
        self.report(outcome);
    }

    fn stream_chunks(&mut self) {
        // Left screen edge in world space, one chunk of slack
        let left_edge = -self.camera.visible_width() * 0.5 - self.origin_x - BLOCK_WIDTH;
        for retired in self.sequencer.retire(left_edge, self.hazard.x, &mut self.physics) {
            self.events.push(GameEvent::ChunkRetired {
                id: retired.id,
                kind: retired.kind,
                meshes: retired.meshes,
            });
        }

        let target =
            self.players.leading_x() + self.tuning.lookahead_widths * self.camera.visible_width();
        for (id, kind) in self.sequencer.extend(target, &mut self.physics, &mut self.rng) {
            self.events.push(GameEvent::ChunkSpawned { id, kind });
        }
    }

    fn poll_features(&mut self) {
        if !self.session.is_running() {
            return;
        }
        let report = self
            .sequencer
            .poll(&self.players.probes(), self.session.is_fused);
        self.players.set_in_tunnel(report.in_tunnel);

        for (actor, violation) in report.penalties {
            self.apply_penalty(actor, violation);
        }
        if report.button_pressed {
            log::info!("Button pressed, danger slowed");
            self.hazard.slow_down();
            self.events.push(GameEvent::ButtonPressed);
        }
    }

    fn apply_penalty(&mut self, actor: ActorId, violation: Violation) {
        if self.session.has_lost {
            return;
        }
        log::debug!("Actor {} penalized: {:?}", actor.number(), violation);
        self.events.push(GameEvent::Penalty { actor, violation });
        let outcome = self.lives.remove_life(&mut self.session);
        self.report(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::chunk::Feature;
    use crate::sim::input::ActionKey;
    use glam::Vec3;

    const FRAME: f64 = 1000.0 / 60.0;

    struct Run {
        world: World,
        now: f64,
        events: Vec<GameEvent>,
    }

    impl Run {
        fn new(seed: u64) -> Self {
            Self::with_tuning(Tuning::default(), seed)
        }

        /// Plain floor all the way, so only hand-placed chunks have features
        fn flat(seed: u64) -> Self {
            Self::with_tuning(
                Tuning {
                    lead_in: 500.0,
                    ..Tuning::default()
                },
                seed,
            )
        }

        fn with_tuning(tuning: Tuning, seed: u64) -> Self {
            let mut world = World::new(tuning, seed, 0.0);
            let events = world.drain_events();
            Self {
                world,
                now: 0.0,
                events,
            }
        }

        fn frames(&mut self, n: usize) {
            self.frames_every(n, FRAME);
        }

        /// Frames at a fixed display interval
        fn frames_every(&mut self, n: usize, interval_ms: f64) {
            for _ in 0..n {
                self.now += interval_ms;
                self.world.tick(self.now);
                self.events.extend(self.world.drain_events());
            }
        }

        fn press(&mut self, actor: ActorId, key: ActionKey) {
            self.world.push_input(InputEvent::Action { actor, key });
        }

        fn start(&mut self) {
            self.press(ActorId::One, ActionKey::Fusion);
            self.frames(6);
            self.press(ActorId::Two, ActionKey::Fusion);
            self.frames(1);
            assert!(self.world.session().started);
        }

        fn count(&self, pred: impl Fn(&GameEvent) -> bool) -> usize {
            self.events.iter().filter(|e| pred(*e)).count()
        }

        fn teleport(&mut self, actor: ActorId, at: Vec3) {
            let body = self.world.players.actor(actor).body();
            self.world.physics.set_translation(body, at);
        }
    }

    #[test]
    fn test_stages_run_in_fixed_order() {
        let mut run = Run::new(1);
        run.frames(1);
        assert_eq!(run.world.last_tick_order(), &TICK_ORDER);
    }

    #[test]
    fn test_idle_world_waits_for_start() {
        let mut run = Run::new(3);
        let hazard_x = run.world.hazard().x;
        run.frames(120);

        assert!(!run.world.session().started);
        assert_eq!(run.world.hazard().x, hazard_x);
        assert_eq!(run.world.lives().lives(), 2);
        // Actors came to rest on the lead-in floor
        for actor in run.world.players().actors() {
            let y = actor.position().y;
            assert!((y - (FLOOR_TOP + SPHERE_RAY)).abs() < 0.05, "y = {y}");
        }
    }

    #[test]
    fn test_same_seed_same_track() {
        let a = Run::new(99);
        let b = Run::new(99);
        let kinds = |r: &Run| r.world.sequencer().chunks().map(|c| c.kind).collect::<Vec<_>>();
        assert_eq!(kinds(&a), kinds(&b));
        assert_eq!(a.world.seed(), 99);
    }

    #[test]
    fn test_scenario_session_starts_once() {
        let mut run = Run::new(5);
        run.start();
        // A second confirmed pair toggles fusion instead of restarting
        run.press(ActorId::One, ActionKey::Fusion);
        run.press(ActorId::Two, ActionKey::Fusion);
        run.frames(2);

        assert_eq!(run.count(|e| *e == GameEvent::SessionStarted), 1);
        assert_eq!(
            run.count(|e| *e == GameEvent::FusionChanged { fused: true }),
            1
        );
    }

    #[test]
    fn test_scenario_wrong_tunnel_lane_penalized_per_entry() {
        let mut run = Run::flat(11);
        run.start();

        let world = &mut run.world;
        let id = world
            .sequencer
            .append(ChunkKind::Tunnel, &mut world.physics, &mut world.rng);
        let chunk = world
            .sequencer
            .chunks()
            .find(|c| c.id == id)
            .expect("tunnel chunk");
        let Feature::Tunnel(tunnel) = &chunk.feature else {
            panic!("not a tunnel");
        };
        let lane = tunnel
            .lanes
            .iter()
            .find(|l| l.owner == ActorId::Two)
            .expect("lane for actor two");
        let inside = Vec3::new(lane.x_start + 2.0, FLOOR_TOP + SPHERE_RAY, lane.z);
        let outside = Vec3::new(chunk.anchor.x + 0.2, FLOOR_TOP + SPHERE_RAY, lane.z);

        run.teleport(ActorId::One, inside);
        run.frames(1);
        assert_eq!(run.world.lives().lives(), 1);
        assert!(run.world.players().actor(ActorId::One).in_tunnel);

        // Staying inside costs nothing more
        run.frames(30);
        assert_eq!(run.world.lives().lives(), 1);

        run.teleport(ActorId::One, outside);
        run.frames(2);
        assert_eq!(run.world.lives().lives(), 1);
        assert!(!run.world.players().actor(ActorId::One).in_tunnel);

        run.teleport(ActorId::One, inside);
        run.frames(1);
        assert_eq!(run.world.lives().lives(), 0);
        assert_eq!(
            run.count(|e| matches!(
                e,
                GameEvent::Penalty {
                    actor: ActorId::One,
                    violation: Violation::WrongLane
                }
            )),
            2
        );
        assert_eq!(run.count(|e| matches!(e, GameEvent::GameOver { .. })), 1);
    }

    #[test]
    fn test_scenario_caught_by_danger_once() {
        let mut run = Run::new(21);
        run.start();
        run.frames(10);
        assert!(!run.world.session().has_lost);

        run.world.hazard.x = run.world.players().trailing_x() + 1.0;
        run.frames(30);

        assert!(run.world.session().has_lost);
        assert_eq!(run.world.lives().lives(), 0);
        assert_eq!(run.count(|e| matches!(e, GameEvent::GameOver { .. })), 1);
        let score = run.events.iter().find_map(|e| match e {
            GameEvent::GameOver { score_ms } => Some(*score_ms),
            _ => None,
        });
        assert!(score.is_some_and(|ms| ms > 0));
    }

    #[test]
    fn test_scenario_lives_floor_at_zero() {
        let mut run = Run::new(8);
        run.start();

        run.world.apply_penalty(ActorId::One, Violation::WrongPlatform);
        run.world.apply_penalty(ActorId::Two, Violation::NotFused);
        assert!(run.world.session().has_lost);
        run.world.apply_penalty(ActorId::Two, Violation::MissedPlatform);
        run.world.lives.remove_life(&mut run.world.session);
        run.events.extend(run.world.drain_events());

        assert_eq!(run.world.lives().lives(), 0);
        assert_eq!(run.count(|e| matches!(e, GameEvent::GameOver { .. })), 1);
        assert_eq!(run.count(|e| matches!(e, GameEvent::Penalty { .. })), 2);
    }

    #[test]
    fn test_falling_ends_run() {
        let mut run = Run::new(4);
        run.start();
        run.teleport(ActorId::Two, Vec3::new(0.0, -10.0, 0.0));
        run.frames(1);
        assert!(run.world.session().has_lost);
        assert!(run.world.hud().game_over);
    }

    #[test]
    fn test_chunks_stream_as_players_advance() {
        let mut run = Run::flat(13);
        run.start();
        let cursor = run.world.sequencer().cursor();
        let first = run.world.sequencer().chunks().next().map(|c| c.id);

        // Push the whole party far forward and let the sequencer catch up
        for actor in ActorId::ALL {
            run.teleport(actor, Vec3::new(60.0, 40.0, actor.side() * 0.75));
        }
        run.world.hazard.x = -100.0;
        // Origin follows on the next frame, retirement with it
        run.frames(2);

        assert!(run.world.sequencer().cursor() > cursor);
        assert_ne!(run.world.sequencer().chunks().next().map(|c| c.id), first);
        assert!(run.count(|e| matches!(e, GameEvent::ChunkRetired { .. })) > 0);
    }

    #[test]
    fn test_slow_display_scores_wall_time() {
        let mut run = Run::flat(23);
        run.start();
        let before = run.world.elapsed_ms();

        // 3 s at 30 Hz: every frame delta is clamped, the score is not
        run.frames_every(90, 1000.0 / 30.0);
        assert!(!run.world.session().has_lost);
        let gained = run.world.elapsed_ms() - before;
        assert!((2999..=3001).contains(&gained), "gained {gained} ms");
        assert_eq!(run.world.hud().elapsed_ms, run.world.elapsed_ms());
    }

    #[test]
    fn test_slow_display_keeps_sync_window_in_real_time() {
        let mut run = Run::new(29);
        run.press(ActorId::One, ActionKey::Fusion);
        // Just over one second of wall time, about half of it after clamping
        run.frames_every(32, 1000.0 / 30.0);
        run.press(ActorId::Two, ActionKey::Fusion);
        run.frames(1);

        assert!(!run.world.session().started);
        assert_eq!(run.count(|e| *e == GameEvent::SessionStarted), 0);
    }

    #[test]
    fn test_desync_during_fuse_animation_still_splits() {
        let mut run = Run::flat(31);
        run.start();
        run.press(ActorId::One, ActionKey::Fusion);
        run.press(ActorId::Two, ActionKey::Fusion);
        run.frames(1);
        assert!(run.world.session().is_fused);

        run.press(ActorId::One, ActionKey::Jump);
        run.press(ActorId::Two, ActionKey::Fusion);
        run.frames(1);
        assert!(run.world.players().defuse_pending());

        // Fuse transition is 300 ms, then the split follows
        run.frames(30);
        assert!(!run.world.session().is_fused);
        assert!(!run.world.players().defuse_pending());
        assert_eq!(run.count(|e| *e == GameEvent::FusionChanged { fused: false }), 1);
    }

    #[test]
    fn test_no_fusion_after_game_over() {
        let mut run = Run::new(37);
        run.start();
        run.world.hazard.x = run.world.players().trailing_x() + 1.0;
        run.frames(2);
        assert!(run.world.session().has_lost);
        run.events.clear();

        run.press(ActorId::One, ActionKey::Fusion);
        run.press(ActorId::Two, ActionKey::Fusion);
        run.frames(2);

        assert!(!run.world.session().is_fused);
        assert_eq!(run.count(|e| matches!(e, GameEvent::FusionChanged { .. })), 0);
    }

    #[test]
    fn test_button_slows_danger_when_fused() {
        let mut run = Run::flat(17);
        run.start();
        run.press(ActorId::One, ActionKey::Fusion);
        run.press(ActorId::Two, ActionKey::Fusion);
        run.frames(30);
        assert!(run.world.session().is_fused);

        let world = &mut run.world;
        let id = world
            .sequencer
            .append(ChunkKind::Button, &mut world.physics, &mut world.rng);
        let button = world
            .sequencer
            .chunks()
            .find(|c| c.id == id)
            .and_then(|c| match &c.feature {
                Feature::Button(b) => Some(b.center),
                _ => None,
            })
            .expect("button chunk");

        let fusion = run.world.players().fusion_body();
        let at = Vec3::new(button.x, FLOOR_TOP + FUSION_RAY, button.z);
        run.world.physics.set_translation(fusion, at);
        run.frames(3);

        assert_eq!(run.count(|e| *e == GameEvent::ButtonPressed), 1);
        assert_eq!(run.world.hazard().slowdown_offset_ms(), 8000.0);
    }
}
