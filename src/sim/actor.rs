//! Player-controlled bodies
//!
//! Each actor owns one dynamic ball. While fused, the shared fusion body is
//! authoritative instead and the actor's own ball is parked off-stage asleep.

use glam::{Vec2, Vec3};

use super::input::ActorId;
use super::physics::{BodyHandle, ColliderDesc, PhysicsEngine, RigidBodyDesc};
use crate::consts::*;
use crate::spawn_position;
use crate::tuning::Tuning;

#[derive(Debug, Clone)]
pub struct Actor {
    pub id: ActorId,
    body: BodyHandle,
    /// Shared body while fused
    fused_body: Option<BodyHandle>,
    /// Last joystick vector, length <= 1 (x forward, y toward the far lane)
    intent: Vec2,
    /// Planar velocity (world x, world z)
    velocity: Vec2,
    /// Mirrored from the authoritative body after each step
    position: Vec3,
    /// Inside a tunnel lane this tick
    pub in_tunnel: bool,
    speed: f32,
    base_speed: f32,
    speed_ramp: f32,
    /// Rolling animation clock (seconds)
    anim_time: f32,
}

impl Actor {
    /// Create the actor's ball at its spawn lane
    pub fn spawn<P: PhysicsEngine + ?Sized>(id: ActorId, physics: &mut P, tuning: &Tuning) -> Self {
        let position = spawn_position(id.side());
        let body = physics.create_rigid_body(
            RigidBodyDesc::dynamic()
                .with_translation(position)
                .locked_rotations(),
        );
        physics.create_collider(ColliderDesc::ball(SPHERE_RAY), body);

        Self {
            id,
            body,
            fused_body: None,
            intent: Vec2::ZERO,
            velocity: Vec2::ZERO,
            position,
            in_tunnel: false,
            speed: tuning.actor_base_speed,
            base_speed: tuning.actor_base_speed,
            speed_ramp: tuning.actor_speed_ramp,
            anim_time: 0.0,
        }
    }

    /// Own ball, regardless of fusion
    pub fn body(&self) -> BodyHandle {
        self.body
    }

    /// Body currently driving this actor's position
    pub fn authoritative_body(&self) -> BodyHandle {
        self.fused_body.unwrap_or(self.body)
    }

    pub fn is_fused(&self) -> bool {
        self.fused_body.is_some()
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn intent(&self) -> Vec2 {
        self.intent
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn anim_time(&self) -> f32 {
        self.anim_time
    }

    /// Radius of whatever body is authoritative
    pub fn radius(&self) -> f32 {
        if self.is_fused() { FUSION_RAY } else { SPHERE_RAY }
    }

    /// Linear pacing ramp on session time
    pub fn update_speed(&mut self, elapsed_ms: f64) {
        self.speed = self.base_speed + self.speed_ramp * (elapsed_ms.max(0.0) / 1000.0) as f32;
        self.velocity = self.planar_velocity();
    }

    fn planar_velocity(&self) -> Vec2 {
        Vec2::new(self.intent.x, -self.intent.y) * self.speed
    }

    /// Set planar velocity from a joystick vector, clamped to unit length
    pub fn apply_directional_intent(&mut self, vector: Vec2) {
        let vector = if vector.is_finite() {
            vector.clamp_length_max(1.0)
        } else {
            Vec2::ZERO
        };
        self.intent = vector;
        self.velocity = self.planar_velocity();
    }

    /// Upward impulse on the authoritative body, only from the ground
    pub fn jump<P: PhysicsEngine + ?Sized>(&self, physics: &mut P, jump_velocity: f32) -> bool {
        let body = self.authoritative_body();
        if !physics.is_grounded(body) || physics.is_sleeping(body) {
            return false;
        }
        physics.apply_impulse(body, Vec3::Y * jump_velocity);
        true
    }

    /// Write planar velocity into the authoritative body, keeping its
    /// vertical component
    pub fn pre_step<P: PhysicsEngine + ?Sized>(&self, physics: &mut P) {
        let body = self.authoritative_body();
        let vy = physics.linvel(body).map_or(0.0, |v| v.y);
        physics.set_linvel(body, Vec3::new(self.velocity.x, vy, self.velocity.y));
    }

    /// Read the body back and advance the rolling animation
    pub fn post_step<P: PhysicsEngine + ?Sized>(&mut self, physics: &P, dt_secs: f32) {
        if let Some(translation) = physics.translation(self.authoritative_body()) {
            self.position = translation;
        }
        let radius = self.radius();
        self.anim_time += dt_secs * self.velocity.length() / radius;
    }

    /// Dropped below the loss plane
    pub fn has_fallen(&self, fall_loss_y: f32) -> bool {
        self.position.y < fall_loss_y
    }

    /// Hand authority to `fusion_body` and park the own ball asleep
    pub fn fuse<P: PhysicsEngine + ?Sized>(&mut self, fusion_body: BodyHandle, physics: &mut P) {
        if self.is_fused() {
            return;
        }
        let parked = Vec3::new(self.position.x, PARK_Y, self.position.z);
        physics.set_translation(self.body, parked);
        physics.sleep(self.body);
        self.fused_body = Some(fusion_body);
    }

    /// Take authority back, dropping the own ball at `at`
    pub fn defuse<P: PhysicsEngine + ?Sized>(&mut self, at: Vec3, physics: &mut P) {
        if !self.is_fused() {
            return;
        }
        physics.set_translation(self.body, at);
        physics.wake_up(self.body);
        physics.set_linvel(self.body, Vec3::new(self.velocity.x, 0.0, self.velocity.y));
        self.fused_body = None;
        self.position = at;
    }
}
