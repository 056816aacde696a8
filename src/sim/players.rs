//! Both actors, the shared fusion body, and the synchronization channels
//! that turn two input streams into joint actions.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::actor::Actor;
use super::chunk::ActorProbe;
use super::input::{ActionKey, ActorId, InputEvent};
use super::physics::{BodyHandle, ColliderDesc, PhysicsEngine, RigidBodyDesc};
use super::session::SessionState;
use super::sync::{ActionChannel, ActionOutcome, JoystickChannel, JoystickOutcome};
use crate::consts::*;
use crate::tuning::Tuning;

/// Fusion lifecycle; at most one transition in flight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FusionState {
    Separate,
    Fusing { remaining_ms: f32 },
    Fused,
    Defusing { remaining_ms: f32 },
}

impl FusionState {
    pub fn in_transition(self) -> bool {
        matches!(self, FusionState::Fusing { .. } | FusionState::Defusing { .. })
    }
}

/// Side effects the world turns into game events
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerEvent {
    SessionStarted,
    Jumped,
    Fused,
    Defused,
}

#[derive(Debug)]
pub struct PlayerManager {
    actors: [Actor; 2],
    fusion_body: BodyHandle,
    fusion: FusionState,
    actions: ActionChannel,
    joystick: JoystickChannel,
    /// Sync was lost mid-fuse; split as soon as the fuse settles
    defuse_pending: bool,
    transition_ms: f32,
    jump_velocity: f32,
}

impl PlayerManager {
    pub fn new<P: PhysicsEngine + ?Sized>(physics: &mut P, tuning: &Tuning) -> Self {
        let actors = ActorId::ALL.map(|id| Actor::spawn(id, physics, tuning));

        let fusion_body = physics.create_rigid_body(
            RigidBodyDesc::dynamic()
                .with_translation(Vec3::new(0.0, PARK_Y, 0.0))
                .locked_rotations()
                .sleeping(true),
        );
        physics.create_collider(ColliderDesc::ball(FUSION_RAY), fusion_body);

        Self {
            actors,
            fusion_body,
            fusion: FusionState::Separate,
            actions: ActionChannel::new(tuning.sync_window_ms),
            joystick: JoystickChannel::new(tuning.joystick_window_ms),
            defuse_pending: false,
            transition_ms: tuning.fusion_transition_ms,
            jump_velocity: tuning.jump_velocity,
        }
    }

    pub fn actor(&self, id: ActorId) -> &Actor {
        &self.actors[id.index()]
    }

    pub fn actors(&self) -> &[Actor; 2] {
        &self.actors
    }

    pub fn fusion_body(&self) -> BodyHandle {
        self.fusion_body
    }

    pub fn fusion_state(&self) -> FusionState {
        self.fusion
    }

    pub fn actions(&self) -> &ActionChannel {
        &self.actions
    }

    pub fn joystick(&self) -> &JoystickChannel {
        &self.joystick
    }

    pub fn defuse_pending(&self) -> bool {
        self.defuse_pending
    }

    /// 0 when separate, 1 when fused, eased in between
    pub fn fusion_blend(&self) -> f32 {
        let t = |remaining: f32| {
            if self.transition_ms <= 0.0 {
                1.0
            } else {
                1.0 - (remaining / self.transition_ms).clamp(0.0, 1.0)
            }
        };
        match self.fusion {
            FusionState::Separate => 0.0,
            FusionState::Fused => 1.0,
            FusionState::Fusing { remaining_ms } => t(remaining_ms),
            FusionState::Defusing { remaining_ms } => 1.0 - t(remaining_ms),
        }
    }

    pub fn handle_input<P: PhysicsEngine + ?Sized>(
        &mut self,
        event: InputEvent,
        now_ms: f64,
        session: &mut SessionState,
        physics: &mut P,
        out: &mut Vec<PlayerEvent>,
    ) {
        match event {
            InputEvent::Action { actor, key } => {
                let outcome = self.actions.push(actor, key, now_ms);
                self.on_action(outcome, now_ms, session, physics, out);
            }
            InputEvent::Joystick { actor, vector } => {
                if !session.is_running() {
                    return;
                }
                if !session.is_fused {
                    self.actors[actor.index()].apply_directional_intent(vector);
                    return;
                }
                let outcome = self.joystick.push(actor, vector, now_ms);
                self.on_joystick(outcome, session, physics, out);
            }
        }
    }

    /// Expire stale windows
    pub fn poll_windows<P: PhysicsEngine + ?Sized>(
        &mut self,
        now_ms: f64,
        session: &mut SessionState,
        physics: &mut P,
        out: &mut Vec<PlayerEvent>,
    ) {
        let action = self.actions.poll(now_ms);
        self.on_action(action, now_ms, session, physics, out);
        let joystick = self.joystick.poll(now_ms);
        self.on_joystick(joystick, session, physics, out);
    }

    fn on_action<P: PhysicsEngine + ?Sized>(
        &mut self,
        outcome: ActionOutcome,
        now_ms: f64,
        session: &mut SessionState,
        physics: &mut P,
        out: &mut Vec<PlayerEvent>,
    ) {
        match outcome {
            ActionOutcome::Confirmed(ActionKey::Jump) => {
                if session.is_running() && self.jump(physics) {
                    out.push(PlayerEvent::Jumped);
                }
            }
            ActionOutcome::Confirmed(ActionKey::Fusion) => {
                if !session.started {
                    if session.start(now_ms) {
                        log::info!("Session started at {:.0} ms", now_ms);
                        out.push(PlayerEvent::SessionStarted);
                    }
                } else if !session.is_running() {
                    log::trace!("Fusion toggle after game over ignored");
                } else if session.is_fused {
                    if self.defuse(session, physics) {
                        out.push(PlayerEvent::Defused);
                    }
                } else if self.fuse(session, physics) {
                    out.push(PlayerEvent::Fused);
                }
            }
            ActionOutcome::Mismatch | ActionOutcome::TimedOut => {
                self.force_defuse(session, physics, out);
            }
            ActionOutcome::Pending | ActionOutcome::Nothing => {}
        }
    }

    fn on_joystick<P: PhysicsEngine + ?Sized>(
        &mut self,
        outcome: JoystickOutcome,
        session: &mut SessionState,
        physics: &mut P,
        out: &mut Vec<PlayerEvent>,
    ) {
        match outcome {
            JoystickOutcome::Matched(direction) => {
                for actor in self.actors.iter_mut() {
                    actor.apply_directional_intent(direction);
                }
            }
            JoystickOutcome::Mismatch | JoystickOutcome::TimedOut => {
                self.force_defuse(session, physics, out);
            }
            JoystickOutcome::Pending | JoystickOutcome::Nothing => {}
        }
    }

    fn force_defuse<P: PhysicsEngine + ?Sized>(
        &mut self,
        session: &mut SessionState,
        physics: &mut P,
        out: &mut Vec<PlayerEvent>,
    ) {
        if !session.is_fused || !session.is_running() {
            return;
        }
        if let FusionState::Fusing { .. } = self.fusion {
            log::debug!("Lost sync mid-fuse, splitting once settled");
            self.defuse_pending = true;
        } else if self.defuse(session, physics) {
            log::debug!("Lost sync, splitting");
            out.push(PlayerEvent::Defused);
        }
    }

    /// Both actors jump; while fused the shared body jumps once
    pub fn jump<P: PhysicsEngine + ?Sized>(&mut self, physics: &mut P) -> bool {
        if self.actors[0].is_fused() {
            return self.actors[0].jump(physics, self.jump_velocity);
        }
        let mut jumped = false;
        for actor in &self.actors {
            jumped |= actor.jump(physics, self.jump_velocity);
        }
        jumped
    }

    /// Merge both actors into the fusion body. Returns false (no-op) unless
    /// separate, running, and neither actor is inside a tunnel.
    pub fn fuse<P: PhysicsEngine + ?Sized>(
        &mut self,
        session: &mut SessionState,
        physics: &mut P,
    ) -> bool {
        if self.fusion != FusionState::Separate || !session.is_running() {
            return false;
        }
        if self.actors.iter().any(|a| a.in_tunnel) {
            log::trace!("Fusion blocked inside tunnel");
            return false;
        }

        let midpoint = (self.actors[0].position() + self.actors[1].position()) * 0.5;
        physics.set_translation(self.fusion_body, midpoint);
        physics.wake_up(self.fusion_body);
        physics.set_linvel(self.fusion_body, Vec3::ZERO);

        let fusion_body = self.fusion_body;
        for actor in self.actors.iter_mut() {
            actor.fuse(fusion_body, physics);
        }
        // Separate intents would disagree on the shared body
        let lead = self.actors[0].intent();
        self.actors[1].apply_directional_intent(lead);
        self.joystick.reset();

        session.is_fused = true;
        self.defuse_pending = false;
        self.fusion = FusionState::Fusing {
            remaining_ms: self.transition_ms,
        };
        log::info!("Fused at ({:.2}, {:.2}, {:.2})", midpoint.x, midpoint.y, midpoint.z);
        true
    }

    /// Split back into two actors around the fusion body. A no-op unless
    /// fully fused and running.
    pub fn defuse<P: PhysicsEngine + ?Sized>(
        &mut self,
        session: &mut SessionState,
        physics: &mut P,
    ) -> bool {
        if self.fusion != FusionState::Fused || !session.is_running() {
            return false;
        }
        self.defuse_pending = false;

        let center = physics
            .translation(self.fusion_body)
            .unwrap_or_else(|| self.actors[0].position());
        for actor in self.actors.iter_mut() {
            let at = center + Vec3::Z * (DEFUSE_OFFSET_Z * actor.id.side());
            actor.defuse(at, physics);
        }
        physics.sleep(self.fusion_body);
        physics.set_translation(self.fusion_body, Vec3::new(center.x, PARK_Y, 0.0));
        self.joystick.reset();

        session.is_fused = false;
        self.fusion = FusionState::Defusing {
            remaining_ms: self.transition_ms,
        };
        log::info!("Defused at x={:.2}", center.x);
        true
    }

    /// Advance any in-flight fusion transition. A split deferred during the
    /// fuse happens on the frame the fuse settles.
    pub fn advance_transition<P: PhysicsEngine + ?Sized>(
        &mut self,
        delta_ms: f32,
        session: &mut SessionState,
        physics: &mut P,
        out: &mut Vec<PlayerEvent>,
    ) {
        self.fusion = match self.fusion {
            FusionState::Fusing { remaining_ms } if remaining_ms - delta_ms <= 0.0 => {
                FusionState::Fused
            }
            FusionState::Fusing { remaining_ms } => FusionState::Fusing {
                remaining_ms: remaining_ms - delta_ms,
            },
            FusionState::Defusing { remaining_ms } if remaining_ms - delta_ms <= 0.0 => {
                FusionState::Separate
            }
            FusionState::Defusing { remaining_ms } => FusionState::Defusing {
                remaining_ms: remaining_ms - delta_ms,
            },
            settled => settled,
        };

        if self.defuse_pending && self.fusion == FusionState::Fused {
            self.defuse_pending = false;
            if self.defuse(session, physics) {
                out.push(PlayerEvent::Defused);
            }
        }
    }

    /// Drop movement intent (run over)
    pub fn halt(&mut self) {
        for actor in self.actors.iter_mut() {
            actor.apply_directional_intent(Vec2::ZERO);
        }
    }

    /// Ramp speeds and write velocities into the authoritative bodies
    pub fn pre_step<P: PhysicsEngine + ?Sized>(&mut self, physics: &mut P, elapsed_ms: f64) {
        for actor in self.actors.iter_mut() {
            actor.update_speed(elapsed_ms);
        }
        if self.actors[0].is_fused() {
            self.actors[0].pre_step(physics);
        } else {
            for actor in &self.actors {
                actor.pre_step(physics);
            }
        }
    }

    pub fn post_step<P: PhysicsEngine + ?Sized>(&mut self, physics: &P, dt_secs: f32) {
        for actor in self.actors.iter_mut() {
            actor.post_step(physics, dt_secs);
        }
    }

    pub fn set_in_tunnel(&mut self, in_tunnel: [bool; 2]) {
        for actor in self.actors.iter_mut() {
            actor.in_tunnel = in_tunnel[actor.id.index()];
        }
    }

    /// Rule-check view of both actors at their authoritative positions
    pub fn probes(&self) -> [ActorProbe; 2] {
        self.actors.each_ref().map(|a| ActorProbe {
            id: a.id,
            position: a.position(),
            radius: a.radius(),
        })
    }

    pub fn trailing_x(&self) -> f32 {
        self.actors[0].position().x.min(self.actors[1].position().x)
    }

    pub fn leading_x(&self) -> f32 {
        self.actors[0].position().x.max(self.actors[1].position().x)
    }

    pub fn any_fallen(&self, fall_loss_y: f32) -> bool {
        self.actors.iter().any(|a| a.has_fallen(fall_loss_y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::physics::KinematicWorld;

    struct Rig {
        physics: KinematicWorld,
        session: SessionState,
        players: PlayerManager,
        events: Vec<PlayerEvent>,
    }

    impl Rig {
        fn new() -> Self {
            let mut physics = KinematicWorld::default();
            let players = PlayerManager::new(&mut physics, &Tuning::default());
            Self {
                physics,
                session: SessionState::new(),
                players,
                events: Vec::new(),
            }
        }

        fn press(&mut self, actor: ActorId, key: ActionKey, now: f64) {
            self.players.handle_input(
                InputEvent::Action { actor, key },
                now,
                &mut self.session,
                &mut self.physics,
                &mut self.events,
            );
        }

        fn both(&mut self, key: ActionKey, now: f64) {
            self.press(ActorId::One, key, now);
            self.press(ActorId::Two, key, now + 50.0);
        }

        fn settle(&mut self) {
            self.players.advance_transition(
                1000.0,
                &mut self.session,
                &mut self.physics,
                &mut self.events,
            );
        }
    }

    #[test]
    fn test_fusion_key_starts_session_once() {
        let mut rig = Rig::new();
        rig.both(ActionKey::Fusion, 0.0);
        assert!(rig.session.started);
        assert_eq!(rig.events, vec![PlayerEvent::SessionStarted]);
        assert_eq!(rig.session.start_time_ms, Some(50.0));
        assert!(!rig.session.is_fused);
    }

    #[test]
    fn test_fuse_requires_start_and_is_idempotent() {
        let mut rig = Rig::new();
        assert!(!rig.players.fuse(&mut rig.session, &mut rig.physics));

        rig.session.start(0.0);
        assert!(rig.players.fuse(&mut rig.session, &mut rig.physics));
        assert!(rig.session.is_fused);
        // In flight, then settled: both reject a second fuse
        assert!(!rig.players.fuse(&mut rig.session, &mut rig.physics));
        rig.settle();
        assert_eq!(rig.players.fusion_state(), FusionState::Fused);
        assert!(!rig.players.fuse(&mut rig.session, &mut rig.physics));

        let fusion = rig.players.fusion_body();
        for actor in rig.players.actors() {
            assert_eq!(actor.authoritative_body(), fusion);
            assert!(rig.physics.is_sleeping(actor.body()));
        }
        assert!(!rig.physics.is_sleeping(fusion));
    }

    #[test]
    fn test_defuse_when_separate_is_noop() {
        let mut rig = Rig::new();
        rig.session.start(0.0);
        assert!(!rig.players.defuse(&mut rig.session, &mut rig.physics));
        assert_eq!(rig.players.fusion_state(), FusionState::Separate);
    }

    #[test]
    fn test_fuse_places_body_at_midpoint_and_defuse_offsets() {
        let mut rig = Rig::new();
        rig.session.start(0.0);
        let expected = (rig.players.actor(ActorId::One).position()
            + rig.players.actor(ActorId::Two).position())
            * 0.5;
        rig.players.fuse(&mut rig.session, &mut rig.physics);
        let at = rig.physics.translation(rig.players.fusion_body()).unwrap();
        assert!((at - expected).length() < 1e-5);

        rig.settle();
        assert!(rig.players.defuse(&mut rig.session, &mut rig.physics));
        let one = rig.players.actor(ActorId::One).position();
        let two = rig.players.actor(ActorId::Two).position();
        assert!((one.z - at.z - DEFUSE_OFFSET_Z).abs() < 1e-5);
        assert!((two.z - at.z + DEFUSE_OFFSET_Z).abs() < 1e-5);
        assert!(rig.physics.is_sleeping(rig.players.fusion_body()));
        assert!(!rig.session.is_fused);
    }

    #[test]
    fn test_fusion_blocked_in_tunnel() {
        let mut rig = Rig::new();
        rig.session.start(0.0);
        rig.players.set_in_tunnel([false, true]);
        assert!(!rig.players.fuse(&mut rig.session, &mut rig.physics));
        assert!(!rig.session.is_fused);
    }

    #[test]
    fn test_mismatch_while_fused_defuses() {
        let mut rig = Rig::new();
        rig.both(ActionKey::Fusion, 0.0);
        rig.both(ActionKey::Fusion, 200.0);
        assert!(rig.session.is_fused);
        rig.settle();

        rig.press(ActorId::One, ActionKey::Jump, 2000.0);
        rig.press(ActorId::Two, ActionKey::Fusion, 2100.0);
        assert!(!rig.session.is_fused);
        assert!(rig.players.actions().is_idle());
        assert_eq!(rig.events.last(), Some(&PlayerEvent::Defused));
    }

    #[test]
    fn test_mismatch_while_separate_only_clears() {
        let mut rig = Rig::new();
        rig.both(ActionKey::Fusion, 0.0);
        rig.events.clear();
        rig.press(ActorId::One, ActionKey::Jump, 500.0);
        rig.press(ActorId::Two, ActionKey::Fusion, 600.0);
        assert!(rig.events.is_empty());
        assert!(rig.players.actions().is_idle());
        assert!(!rig.session.is_fused);
    }

    #[test]
    fn test_timeout_while_fused_defuses() {
        let mut rig = Rig::new();
        rig.both(ActionKey::Fusion, 0.0);
        rig.both(ActionKey::Fusion, 200.0);
        rig.settle();

        rig.press(ActorId::One, ActionKey::Jump, 1000.0);
        rig.players
            .poll_windows(1999.0, &mut rig.session, &mut rig.physics, &mut rig.events);
        assert!(rig.session.is_fused);
        rig.players
            .poll_windows(2000.0, &mut rig.session, &mut rig.physics, &mut rig.events);
        assert!(!rig.session.is_fused);
        assert!(rig.players.actions().is_idle());
    }

    #[test]
    fn test_joystick_is_independent_while_separate() {
        let mut rig = Rig::new();
        rig.both(ActionKey::Fusion, 0.0);
        rig.players.handle_input(
            InputEvent::Joystick {
                actor: ActorId::Two,
                vector: Vec2::X,
            },
            100.0,
            &mut rig.session,
            &mut rig.physics,
            &mut rig.events,
        );
        assert_eq!(rig.players.actor(ActorId::Two).intent(), Vec2::X);
        assert_eq!(rig.players.actor(ActorId::One).intent(), Vec2::ZERO);
        assert!(rig.players.joystick().is_idle());
    }

    #[test]
    fn test_opposite_sticks_while_fused_defuse() {
        let mut rig = Rig::new();
        rig.both(ActionKey::Fusion, 0.0);
        rig.both(ActionKey::Fusion, 200.0);
        rig.settle();

        let mut stick = |actor, x: f32, now| {
            rig.players.handle_input(
                InputEvent::Joystick {
                    actor,
                    vector: Vec2::new(x, 0.0),
                },
                now,
                &mut rig.session,
                &mut rig.physics,
                &mut rig.events,
            );
        };
        stick(ActorId::One, 1.0, 300.0);
        stick(ActorId::Two, 0.0, 310.0);
        stick(ActorId::One, 1.0, 320.0);
        stick(ActorId::Two, -1.0, 330.0);
        assert!(!rig.session.is_fused);
    }

    #[test]
    fn test_mismatch_mid_fuse_splits_once_settled() {
        let mut rig = Rig::new();
        rig.both(ActionKey::Fusion, 0.0);
        rig.both(ActionKey::Fusion, 200.0);
        assert!(matches!(rig.players.fusion_state(), FusionState::Fusing { .. }));

        rig.press(ActorId::One, ActionKey::Jump, 260.0);
        rig.press(ActorId::Two, ActionKey::Fusion, 270.0);
        // The fuse animation still finishes first
        assert!(rig.session.is_fused);
        assert!(rig.players.defuse_pending());

        rig.events.clear();
        rig.settle();
        assert!(!rig.session.is_fused);
        assert!(!rig.players.defuse_pending());
        assert!(matches!(rig.players.fusion_state(), FusionState::Defusing { .. }));
        assert_eq!(rig.events, vec![PlayerEvent::Defused]);
    }

    #[test]
    fn test_timeout_mid_fuse_splits_once_settled() {
        let mut rig = Rig::new();
        rig.both(ActionKey::Fusion, 0.0);
        rig.both(ActionKey::Fusion, 200.0);

        rig.press(ActorId::One, ActionKey::Jump, 220.0);
        rig.players
            .poll_windows(1220.0, &mut rig.session, &mut rig.physics, &mut rig.events);
        assert!(rig.players.defuse_pending());
        rig.settle();
        assert!(!rig.session.is_fused);
    }

    #[test]
    fn test_fusion_ignored_after_game_over() {
        let mut rig = Rig::new();
        rig.both(ActionKey::Fusion, 0.0);
        rig.session.has_lost = true;
        rig.events.clear();

        rig.both(ActionKey::Fusion, 500.0);
        assert!(rig.events.is_empty());
        assert!(!rig.session.is_fused);
        assert_eq!(rig.players.fusion_state(), FusionState::Separate);
        assert!(!rig.players.fuse(&mut rig.session, &mut rig.physics));
    }

    #[test]
    fn test_fused_pair_stays_fused_after_game_over() {
        let mut rig = Rig::new();
        rig.both(ActionKey::Fusion, 0.0);
        rig.both(ActionKey::Fusion, 200.0);
        rig.settle();
        rig.session.has_lost = true;
        rig.events.clear();

        rig.both(ActionKey::Fusion, 600.0);
        rig.press(ActorId::One, ActionKey::Jump, 800.0);
        rig.press(ActorId::Two, ActionKey::Fusion, 810.0);
        assert!(rig.events.is_empty());
        assert!(rig.session.is_fused);
        assert!(!rig.players.defuse(&mut rig.session, &mut rig.physics));
    }

    #[test]
    fn test_fused_jump_uses_shared_body() {
        let mut rig = Rig::new();
        rig.session.start(0.0);
        rig.players.fuse(&mut rig.session, &mut rig.physics);
        // Not grounded until the body has rested on something
        assert!(!rig.players.jump(&mut rig.physics));
    }
}
