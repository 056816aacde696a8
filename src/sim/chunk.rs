//! Track chunks and their hazard sub-features
//!
//! A chunk is a fixed-width slice of track. It creates its colliders once on
//! spawn and releases them once in [`Chunk::destroy`], which consumes it.
//! Rule checks (wrong tunnel lane, wrong platform, button press) use explicit
//! axis-aligned regions polled every tick; collider contacts are only
//! recorded for diagnostics.

use std::collections::BTreeSet;

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::input::ActorId;
use super::physics::{
    BodyHandle, ColliderDesc, ColliderHandle, CollisionEvent, PhysicsEngine, RigidBodyDesc,
};
use crate::consts::*;

/// Chunk variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChunkKind {
    /// Plain floor
    Normal,
    /// Two id-gated lanes
    Tunnel,
    /// Floor plus one or two raised platforms
    Platform,
    /// Gap, no floor
    Empty,
    /// Gap bridged only by raised platforms
    EmptyPlatform,
    /// Floor with a one-shot slowdown button
    Button,
    /// Reserved hazard floor
    Enemy,
}

impl ChunkKind {
    pub const ALL: [ChunkKind; 7] = [
        ChunkKind::Normal,
        ChunkKind::Tunnel,
        ChunkKind::Platform,
        ChunkKind::Empty,
        ChunkKind::EmptyPlatform,
        ChunkKind::Button,
        ChunkKind::Enemy,
    ];

    /// Width in chunk units
    pub fn units(self) -> u32 {
        match self {
            ChunkKind::Normal => 1,
            ChunkKind::Tunnel => 12,
            ChunkKind::Platform => 3,
            ChunkKind::Empty => 2,
            ChunkKind::EmptyPlatform => 6,
            ChunkKind::Button => 3,
            ChunkKind::Enemy => 3,
        }
    }

    /// World width along x
    pub fn width(self) -> f32 {
        self.units() as f32 * BLOCK_WIDTH
    }

    /// Relative spawn weight
    pub fn weight(self) -> u32 {
        match self {
            ChunkKind::Normal => 15,
            ChunkKind::Tunnel => 2,
            ChunkKind::Platform => 2,
            ChunkKind::Empty => 3,
            ChunkKind::EmptyPlatform => 1,
            ChunkKind::Button => 1,
            ChunkKind::Enemy => 1,
        }
    }

    pub fn has_floor(self) -> bool {
        !matches!(self, ChunkKind::Empty | ChunkKind::EmptyPlatform)
    }

    /// The hazard-free type used for the lead-in
    pub fn is_safe(self) -> bool {
        self == ChunkKind::Normal
    }

    /// Whether this kind may directly follow `prev`
    pub fn can_follow(self, prev: Option<ChunkKind>) -> bool {
        use ChunkKind::*;
        let Some(prev) = prev else {
            return true;
        };
        if self == prev {
            return false;
        }
        !matches!(
            (prev, self),
            (Empty, EmptyPlatform) | (EmptyPlatform, Empty) | (Empty, Platform) | (Platform, Empty)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChunkKind::Normal => "normal",
            ChunkKind::Tunnel => "tunnel",
            ChunkKind::Platform => "platform",
            ChunkKind::Empty => "empty",
            ChunkKind::EmptyPlatform => "empty_platform",
            ChunkKind::Button => "button",
            ChunkKind::Enemy => "enemy",
        }
    }
}

/// One-shot guard for a hazard rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Latch {
    #[default]
    Armed,
    Triggered,
}

impl Latch {
    /// Fire the latch; true only on the Armed -> Triggered transition
    pub fn trigger(&mut self) -> bool {
        match self {
            Latch::Armed => {
                *self = Latch::Triggered;
                true
            }
            Latch::Triggered => false,
        }
    }

    pub fn is_triggered(self) -> bool {
        self == Latch::Triggered
    }
}

/// Why an actor was penalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Violation {
    /// Entered the tunnel lane of the other actor
    WrongLane,
    /// Stood on the other actor's platform
    WrongPlatform,
    /// Stood on a fusion-only platform while split
    NotFused,
    /// Passed an assigned platform without stepping on it
    MissedPlatform,
}

/// What the sub-feature checks need to know about an actor
#[derive(Debug, Clone, Copy)]
pub struct ActorProbe {
    pub id: ActorId,
    pub position: Vec3,
    pub radius: f32,
}

/// Results of polling every chunk for one tick
#[derive(Debug, Clone, Default)]
pub struct FeatureReport {
    pub penalties: Vec<(ActorId, Violation)>,
    pub button_pressed: bool,
    /// Actor is inside any tunnel lane, indexed by `ActorId::index`
    pub in_tunnel: [bool; 2],
}

/// Render parts a chunk asks the presentation layer for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeshKey {
    Floor { units: u32 },
    TunnelLane { owner: ActorId },
    Platform { gate: PlatformGate },
    Button,
}

/// One lane of a tunnel
#[derive(Debug, Clone)]
pub struct TunnelLane {
    pub owner: ActorId,
    pub z: f32,
    pub x_start: f32,
    pub x_end: f32,
    pub radius: f32,
    inside: BTreeSet<ActorId>,
}

impl TunnelLane {
    fn contains(&self, p: Vec3) -> bool {
        p.x >= self.x_start
            && p.x <= self.x_end
            && (p.z - self.z).abs() < self.radius
            && p.y >= FLOOR_TOP
            && p.y <= FLOOR_TOP + self.radius * 2.0
    }

    /// Update membership; returns a violation on entry into the wrong lane
    fn update(&mut self, probe: &ActorProbe) -> Option<Violation> {
        if self.contains(probe.position) {
            let entered = self.inside.insert(probe.id);
            (entered && probe.id != self.owner).then_some(Violation::WrongLane)
        } else {
            self.inside.remove(&probe.id);
            None
        }
    }

    pub fn is_inside(&self, id: ActorId) -> bool {
        self.inside.contains(&id)
    }
}

/// Two lanes, one per actor, on opposite sides
#[derive(Debug, Clone)]
pub struct Tunnel {
    pub lanes: [TunnelLane; 2],
}

/// Who may stand on a platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformGate {
    Actor(ActorId),
    /// Fusion body only
    Center,
}

#[derive(Debug, Clone)]
pub struct Platform {
    pub gate: PlatformGate,
    pub center: Vec3,
    pub left: f32,
    pub right: f32,
    pub far: f32,
    pub near: f32,
    pub activated: bool,
    pub error: Latch,
}

impl Platform {
    fn new(gate: PlatformGate, center: Vec3, chunk_width: f32) -> Self {
        Self {
            gate,
            center,
            left: center.x - chunk_width * 0.25,
            right: center.x + chunk_width * 0.25,
            far: center.z - BLOCK_DEPTH * 0.33,
            near: center.z + BLOCK_DEPTH * 0.33,
            activated: false,
            error: Latch::Armed,
        }
    }

    fn is_on(&self, probe: &ActorProbe) -> bool {
        let p = probe.position;
        let r = probe.radius;
        let inside_x = p.x + r >= self.left && p.x - r <= self.right;
        let inside_y = p.y - r >= PLATFORM_TOP - 0.01;
        let inside_z = p.z - r >= self.far && p.z + r <= self.near;
        inside_x && inside_y && inside_z
    }

    fn assigned_to(&self, id: ActorId) -> bool {
        match self.gate {
            PlatformGate::Actor(owner) => owner == id,
            PlatformGate::Center => true,
        }
    }

    /// Check one actor; a violation fires the error latch at most once
    fn update(&mut self, probe: &ActorProbe, fused: bool) -> Option<Violation> {
        if self.error.is_triggered() {
            return None;
        }

        let violation = if self.is_on(probe) {
            match self.gate {
                PlatformGate::Center if fused => {
                    self.activated = true;
                    None
                }
                PlatformGate::Center => Some(Violation::NotFused),
                PlatformGate::Actor(owner) if owner == probe.id => {
                    self.activated = true;
                    None
                }
                PlatformGate::Actor(_) => Some(Violation::WrongPlatform),
            }
        } else if !self.activated
            && self.assigned_to(probe.id)
            && probe.position.x - probe.radius >= self.right
        {
            Some(Violation::MissedPlatform)
        } else {
            None
        };

        match violation {
            Some(v) if self.error.trigger() => Some(v),
            _ => None,
        }
    }
}

/// One-shot slowdown trigger
#[derive(Debug, Clone)]
pub struct Button {
    pub center: Vec3,
    pub left: f32,
    pub right: f32,
    pub far: f32,
    pub near: f32,
    pub pressed: Latch,
}

impl Button {
    fn new(center: Vec3, chunk_width: f32) -> Self {
        Self {
            center,
            left: center.x - chunk_width * 0.2,
            right: center.x + chunk_width * 0.2,
            far: center.z - BLOCK_DEPTH * 0.33,
            near: center.z + BLOCK_DEPTH * 0.33,
            pressed: Latch::Armed,
        }
    }

    fn is_on(&self, probe: &ActorProbe) -> bool {
        let p = probe.position;
        let r = probe.radius;
        let bottom = p.y - r;
        let inside_x = p.x + r >= self.left && p.x - r <= self.right;
        let inside_y = bottom >= FLOOR_TOP - 0.01 && bottom <= FLOOR_TOP + 0.5;
        let inside_z = p.z - r >= self.far && p.z + r <= self.near;
        inside_x && inside_y && inside_z
    }

    /// Only the lead actor presses, and only while fused
    fn update(&mut self, lead: &ActorProbe, fused: bool) -> bool {
        if self.pressed.is_triggered() || !fused || !self.is_on(lead) {
            return false;
        }
        self.pressed.trigger()
    }
}

#[derive(Debug, Clone)]
pub enum Feature {
    None,
    Tunnel(Tunnel),
    Platforms(Vec<Platform>),
    Button(Button),
}

/// A live slice of track
#[derive(Debug)]
pub struct Chunk {
    pub id: u32,
    pub kind: ChunkKind,
    /// Left edge of the chunk on the floor centerline
    pub anchor: Vec3,
    pub width: f32,
    pub feature: Feature,
    bodies: Vec<BodyHandle>,
    colliders: Vec<ColliderHandle>,
    meshes: Vec<MeshKey>,
    /// Collision starts seen on this chunk's colliders
    contacts: u32,
}

impl Chunk {
    /// Build the chunk's geometry and register its colliders
    pub fn spawn<P, R>(id: u32, kind: ChunkKind, anchor: Vec3, physics: &mut P, rng: &mut R) -> Self
    where
        P: PhysicsEngine + ?Sized,
        R: Rng,
    {
        let mut chunk = Self {
            id,
            kind,
            anchor,
            width: kind.width(),
            feature: Feature::None,
            bodies: Vec::new(),
            colliders: Vec::new(),
            meshes: Vec::new(),
            contacts: 0,
        };

        if kind.has_floor() {
            chunk.create_floor(physics);
        }

        match kind {
            ChunkKind::Normal | ChunkKind::Enemy | ChunkKind::Empty => {}
            ChunkKind::Tunnel => chunk.init_tunnel(physics, rng),
            ChunkKind::Platform | ChunkKind::EmptyPlatform => chunk.init_platforms(physics, rng),
            ChunkKind::Button => chunk.init_button(rng),
        }

        log::trace!("chunk {} spawned: {} at x={:.2}", id, kind.as_str(), anchor.x);
        chunk
    }

    /// Center of the chunk on the floor centerline
    pub fn center(&self) -> Vec3 {
        self.anchor + Vec3::new(self.width * 0.5, 0.0, 0.0)
    }

    /// x of the trailing (right) edge
    pub fn end_x(&self) -> f32 {
        self.anchor.x + self.width
    }

    pub fn colliders(&self) -> &[ColliderHandle] {
        &self.colliders
    }

    pub fn meshes(&self) -> &[MeshKey] {
        &self.meshes
    }

    pub fn contacts(&self) -> u32 {
        self.contacts
    }

    fn add_fixed_box<P: PhysicsEngine + ?Sized>(
        &mut self,
        physics: &mut P,
        center: Vec3,
        half: Vec3,
    ) {
        let body = physics.create_rigid_body(RigidBodyDesc::fixed().with_translation(center));
        self.bodies.push(body);
        if let Some(collider) =
            physics.create_collider(ColliderDesc::cuboid(half.x, half.y, half.z), body)
        {
            self.colliders.push(collider);
        }
    }

    fn create_floor<P: PhysicsEngine + ?Sized>(&mut self, physics: &mut P) {
        let half = Vec3::new(self.width * 0.5, BLOCK_HEIGHT * 0.5, BLOCK_DEPTH * 0.5);
        self.add_fixed_box(physics, self.center(), half);
        self.meshes.push(MeshKey::Floor {
            units: self.kind.units(),
        });
    }

    fn init_tunnel<P, R>(&mut self, physics: &mut P, rng: &mut R)
    where
        P: PhysicsEngine + ?Sized,
        R: Rng,
    {
        let radius = BLOCK_DEPTH * 0.25;
        let x_start = self.anchor.x + BLOCK_WIDTH;
        let x_end = self.end_x() - BLOCK_WIDTH;
        let first_left = rng.random_bool(0.5);

        let lane = |owner: ActorId, left: bool| TunnelLane {
            owner,
            z: if left { -radius } else { radius },
            x_start,
            x_end,
            radius,
            inside: BTreeSet::new(),
        };
        let lanes = [lane(ActorId::One, first_left), lane(ActorId::Two, !first_left)];

        // Thin wall between the lanes
        let divider_center = Vec3::new((x_start + x_end) * 0.5, FLOOR_TOP + radius, self.anchor.z);
        let divider_half = Vec3::new((x_end - x_start) * 0.5, radius, 0.05);
        self.add_fixed_box(physics, divider_center, divider_half);

        for lane in &lanes {
            self.meshes.push(MeshKey::TunnelLane { owner: lane.owner });
        }
        self.feature = Feature::Tunnel(Tunnel { lanes });
    }

    fn init_platforms<P, R>(&mut self, physics: &mut P, rng: &mut R)
    where
        P: PhysicsEngine + ?Sized,
        R: Rng,
    {
        let is_left = rng.random_bool(0.5);
        let is_double = rng.random_bool(0.5);
        let is_center = !is_double && rng.random_bool(0.5);

        let mut gates = Vec::with_capacity(2);
        if is_double {
            gates.push((PlatformGate::Actor(ActorId::One), is_left));
            gates.push((PlatformGate::Actor(ActorId::Two), !is_left));
        } else if is_center {
            gates.push((PlatformGate::Center, is_left));
        } else {
            let owner = if rng.random_bool(0.5) {
                ActorId::One
            } else {
                ActorId::Two
            };
            gates.push((PlatformGate::Actor(owner), is_left));
        }

        let side_z = BLOCK_DEPTH * 0.25;
        let mut platforms = Vec::with_capacity(gates.len());
        for (gate, left) in gates {
            let z = match gate {
                PlatformGate::Center => 0.0,
                PlatformGate::Actor(_) if left => -side_z,
                PlatformGate::Actor(_) => side_z,
            };
            let center = Vec3::new(self.center().x, PLATFORM_Y, self.anchor.z + z);
            let half = Vec3::new(self.width * 0.25, PLATFORM_HALF_HEIGHT, BLOCK_DEPTH * 0.25);
            self.add_fixed_box(physics, center, half);
            self.meshes.push(MeshKey::Platform { gate });
            platforms.push(Platform::new(gate, center, self.width));
        }
        self.feature = Feature::Platforms(platforms);
    }

    fn init_button<R: Rng>(&mut self, rng: &mut R) {
        let is_left = rng.random_bool(0.5);
        let is_center = rng.random_bool(0.5);
        let z = if is_center {
            0.0
        } else if is_left {
            -BLOCK_DEPTH * 0.25
        } else {
            BLOCK_DEPTH * 0.25
        };
        let center = Vec3::new(self.center().x, FLOOR_TOP, self.anchor.z + z);
        self.meshes.push(MeshKey::Button);
        self.feature = Feature::Button(Button::new(center, self.width));
    }

    /// Poll sub-feature rules for both actors. Actor one leads and is the
    /// only one that can press buttons.
    pub fn poll(&mut self, probes: &[ActorProbe; 2], fused: bool, report: &mut FeatureReport) {
        match &mut self.feature {
            Feature::None => {}
            Feature::Tunnel(tunnel) => {
                for probe in probes {
                    for lane in tunnel.lanes.iter_mut() {
                        if let Some(v) = lane.update(probe) {
                            report.penalties.push((probe.id, v));
                        }
                        if lane.is_inside(probe.id) {
                            report.in_tunnel[probe.id.index()] = true;
                        }
                    }
                }
            }
            Feature::Platforms(platforms) => {
                for platform in platforms.iter_mut() {
                    for probe in probes {
                        if let Some(v) = platform.update(probe, fused) {
                            report.penalties.push((probe.id, v));
                        }
                    }
                }
            }
            Feature::Button(button) => {
                if button.update(&probes[ActorId::One.index()], fused) {
                    report.button_pressed = true;
                }
            }
        }
    }

    /// Does this chunk own `collider`?
    pub fn owns(&self, collider: ColliderHandle) -> bool {
        self.colliders.contains(&collider)
    }

    /// Collision event involving one of this chunk's colliders
    pub fn on_collision(&mut self, event: &CollisionEvent) {
        if event.started {
            self.contacts += 1;
        }
        log::trace!(
            "chunk {} ({}) contact {}",
            self.id,
            self.kind.as_str(),
            if event.started { "started" } else { "stopped" }
        );
    }

    /// Release every collider and body exactly once
    pub fn destroy<P: PhysicsEngine + ?Sized>(self, physics: &mut P) -> Vec<MeshKey> {
        for collider in &self.colliders {
            physics.remove_collider(*collider);
        }
        for body in &self.bodies {
            physics.remove_rigid_body(*body);
        }
        log::trace!("chunk {} destroyed", self.id);
        self.meshes
    }
}
