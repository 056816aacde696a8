//! Rigid-body physics
//!
//! The simulation talks to physics through [`PhysicsEngine`]: body and
//! collider creation, stepping, a drained collision-event queue and a handful
//! of body operations. [`KinematicWorld`] is the built-in implementation:
//! unit-mass dynamic spheres falling under gravity against fixed boxes, which
//! is everything the track needs.

use std::collections::BTreeSet;

use glam::Vec3;

/// Terminal fall speed (units per second)
pub const MAX_FALL_SPEED: f32 = 30.0;

/// Bodies moving slower than this along the contact normal count as resting
const GROUNDED_NORMAL_Y: f32 = 0.5;

/// Handle to a rigid body. Stale handles (removed bodies) are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyHandle {
    index: u32,
    generation: u32,
}

/// Handle to a collider attached to a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColliderHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Never moves (track geometry)
    Fixed,
    /// Integrated every step (actors, fusion body)
    Dynamic,
}

#[derive(Debug, Clone, Copy)]
pub struct RigidBodyDesc {
    pub kind: BodyKind,
    pub translation: Vec3,
    pub lock_rotations: bool,
    pub sleeping: bool,
}

impl RigidBodyDesc {
    pub fn fixed() -> Self {
        Self {
            kind: BodyKind::Fixed,
            translation: Vec3::ZERO,
            lock_rotations: true,
            sleeping: false,
        }
    }

    pub fn dynamic() -> Self {
        Self {
            kind: BodyKind::Dynamic,
            translation: Vec3::ZERO,
            lock_rotations: false,
            sleeping: false,
        }
    }

    pub fn with_translation(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self
    }

    pub fn locked_rotations(mut self) -> Self {
        self.lock_rotations = true;
        self
    }

    pub fn sleeping(mut self, sleeping: bool) -> Self {
        self.sleeping = sleeping;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Cuboid { half_extents: Vec3 },
    Ball { radius: f32 },
}

#[derive(Debug, Clone, Copy)]
pub struct ColliderDesc {
    pub shape: Shape,
    /// Reports contacts but does not push bodies
    pub sensor: bool,
}

impl ColliderDesc {
    pub fn cuboid(hx: f32, hy: f32, hz: f32) -> Self {
        Self {
            shape: Shape::Cuboid {
                half_extents: Vec3::new(hx, hy, hz),
            },
            sensor: false,
        }
    }

    pub fn ball(radius: f32) -> Self {
        Self {
            shape: Shape::Ball { radius },
            sensor: false,
        }
    }

    pub fn sensor(mut self) -> Self {
        self.sensor = true;
        self
    }
}

/// Contact start/stop between two colliders (`a < b`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionEvent {
    pub a: ColliderHandle,
    pub b: ColliderHandle,
    pub started: bool,
}

impl CollisionEvent {
    pub fn involves(&self, collider: ColliderHandle) -> bool {
        self.a == collider || self.b == collider
    }
}

/// Physics engine as seen by the simulation
pub trait PhysicsEngine {
    fn create_rigid_body(&mut self, desc: RigidBodyDesc) -> BodyHandle;
    /// Removes the body and every collider attached to it
    fn remove_rigid_body(&mut self, body: BodyHandle);
    /// Returns `None` if the parent body does not exist
    fn create_collider(&mut self, desc: ColliderDesc, body: BodyHandle) -> Option<ColliderHandle>;
    /// Returns false if the collider was already gone
    fn remove_collider(&mut self, collider: ColliderHandle) -> bool;

    /// Advance by `dt` seconds, queueing collision events
    fn step(&mut self, dt: f32);
    /// Hand every queued collision event to `f`, emptying the queue
    fn drain_collision_events(&mut self, f: &mut dyn FnMut(CollisionEvent));

    fn translation(&self, body: BodyHandle) -> Option<Vec3>;
    fn set_translation(&mut self, body: BodyHandle, translation: Vec3);
    fn linvel(&self, body: BodyHandle) -> Option<Vec3>;
    fn set_linvel(&mut self, body: BodyHandle, linvel: Vec3);
    fn apply_impulse(&mut self, body: BodyHandle, impulse: Vec3);
    fn sleep(&mut self, body: BodyHandle);
    fn wake_up(&mut self, body: BodyHandle);
    fn is_sleeping(&self, body: BodyHandle) -> bool;
    fn lock_rotations(&mut self, body: BodyHandle, locked: bool);
    /// Body rested on an upward-facing surface during the last step
    fn is_grounded(&self, body: BodyHandle) -> bool;

    fn body_count(&self) -> usize;
    fn collider_count(&self) -> usize;
}

/// Generational slot storage so stale handles never alias new entries
#[derive(Debug, Clone)]
struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

impl<T> Arena<T> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    fn insert(&mut self, value: T) -> (u32, u32) {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation += 1;
            slot.value = Some(value);
            (index, slot.generation)
        } else {
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            ((self.slots.len() - 1) as u32, 0)
        }
    }

    fn remove(&mut self, index: u32, generation: u32) -> Option<T> {
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.value.take()?;
        self.free.push(index);
        self.len -= 1;
        Some(value)
    }

    fn get(&self, index: u32, generation: u32) -> Option<&T> {
        let slot = self.slots.get(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.value.as_ref()
    }

    fn get_mut(&mut self, index: u32, generation: u32) -> Option<&mut T> {
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// (index, generation, value) in index order
    fn iter(&self) -> impl Iterator<Item = (u32, u32, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.value.as_ref().map(|v| (i as u32, s.generation, v)))
    }
}

#[derive(Debug, Clone)]
struct Body {
    kind: BodyKind,
    translation: Vec3,
    linvel: Vec3,
    sleeping: bool,
    rotations_locked: bool,
    grounded: bool,
    colliders: Vec<ColliderHandle>,
}

#[derive(Debug, Clone)]
struct Collider {
    body: BodyHandle,
    shape: Shape,
    sensor: bool,
}

/// Built-in physics: dynamic balls against fixed cuboids
#[derive(Debug, Clone)]
pub struct KinematicWorld {
    gravity: Vec3,
    bodies: Arena<Body>,
    colliders: Arena<Collider>,
    /// Pairs touching at the end of the last step
    contacts: BTreeSet<(ColliderHandle, ColliderHandle)>,
    events: Vec<CollisionEvent>,
}

impl KinematicWorld {
    pub fn new(gravity: Vec3) -> Self {
        Self {
            gravity,
            bodies: Arena::new(),
            colliders: Arena::new(),
            contacts: BTreeSet::new(),
            events: Vec::new(),
        }
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    fn body(&self, h: BodyHandle) -> Option<&Body> {
        self.bodies.get(h.index, h.generation)
    }

    fn body_mut(&mut self, h: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(h.index, h.generation)
    }

    fn forget_contacts_of(&mut self, collider: ColliderHandle) {
        self.contacts.retain(|(a, b)| *a != collider && *b != collider);
    }
}

impl Default for KinematicWorld {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, -9.81, 0.0))
    }
}

/// Penetration of a sphere into an axis-aligned box.
///
/// Returns the push-out normal and depth, or `None` if they do not overlap.
pub fn sphere_box_contact(
    center: Vec3,
    radius: f32,
    box_center: Vec3,
    half_extents: Vec3,
) -> Option<(Vec3, f32)> {
    let min = box_center - half_extents;
    let max = box_center + half_extents;
    let closest = center.clamp(min, max);
    let delta = center - closest;
    let dist_sq = delta.length_squared();

    if dist_sq > radius * radius {
        return None;
    }

    if dist_sq > 1e-12 {
        let dist = dist_sq.sqrt();
        return Some((delta / dist, radius - dist));
    }

    // Center is inside the box: leave through the nearest face
    let local = center - box_center;
    let gaps = half_extents - local.abs();
    let (normal, gap) = if gaps.x <= gaps.y && gaps.x <= gaps.z {
        (Vec3::X * local.x.signum(), gaps.x)
    } else if gaps.y <= gaps.z {
        (Vec3::Y * local.y.signum(), gaps.y)
    } else {
        (Vec3::Z * local.z.signum(), gaps.z)
    };
    Some((normal, gap + radius))
}

impl PhysicsEngine for KinematicWorld {
    fn create_rigid_body(&mut self, desc: RigidBodyDesc) -> BodyHandle {
        let (index, generation) = self.bodies.insert(Body {
            kind: desc.kind,
            translation: desc.translation,
            linvel: Vec3::ZERO,
            sleeping: desc.sleeping,
            rotations_locked: desc.lock_rotations,
            grounded: false,
            colliders: Vec::new(),
        });
        BodyHandle { index, generation }
    }

    fn remove_rigid_body(&mut self, body: BodyHandle) {
        let Some(removed) = self.bodies.remove(body.index, body.generation) else {
            return;
        };
        for collider in removed.colliders {
            self.colliders.remove(collider.index, collider.generation);
            self.forget_contacts_of(collider);
        }
    }

    fn create_collider(&mut self, desc: ColliderDesc, body: BodyHandle) -> Option<ColliderHandle> {
        self.body(body)?;
        let (index, generation) = self.colliders.insert(Collider {
            body,
            shape: desc.shape,
            sensor: desc.sensor,
        });
        let handle = ColliderHandle { index, generation };
        self.body_mut(body)?.colliders.push(handle);
        Some(handle)
    }

    fn remove_collider(&mut self, collider: ColliderHandle) -> bool {
        let Some(removed) = self.colliders.remove(collider.index, collider.generation) else {
            return false;
        };
        if let Some(parent) = self.body_mut(removed.body) {
            parent.colliders.retain(|c| *c != collider);
        }
        self.forget_contacts_of(collider);
        true
    }

    fn step(&mut self, dt: f32) {
        // Static geometry snapshot (solid and sensor boxes)
        let boxes: Vec<(ColliderHandle, Vec3, Vec3, bool)> = self
            .colliders
            .iter()
            .filter_map(|(index, generation, c)| {
                let Shape::Cuboid { half_extents } = c.shape else {
                    return None;
                };
                let body = self.body(c.body)?;
                (body.kind == BodyKind::Fixed).then_some((
                    ColliderHandle { index, generation },
                    body.translation,
                    half_extents,
                    c.sensor,
                ))
            })
            .collect();

        let movers: Vec<BodyHandle> = self
            .bodies
            .iter()
            .filter(|(_, _, b)| b.kind == BodyKind::Dynamic && !b.sleeping)
            .map(|(index, generation, _)| BodyHandle { index, generation })
            .collect();

        let mut touching = BTreeSet::new();

        for handle in movers {
            let balls: Vec<(ColliderHandle, f32)> = match self.body(handle) {
                Some(body) => body
                    .colliders
                    .iter()
                    .filter_map(|c| {
                        let collider = self.colliders.get(c.index, c.generation)?;
                        match collider.shape {
                            Shape::Ball { radius } => Some((*c, radius)),
                            Shape::Cuboid { .. } => None,
                        }
                    })
                    .collect(),
                None => continue,
            };

            let gravity = self.gravity;
            let Some(body) = self.body_mut(handle) else {
                continue;
            };

            body.linvel += gravity * dt;
            body.linvel.y = body.linvel.y.max(-MAX_FALL_SPEED);
            body.translation += body.linvel * dt;
            body.grounded = false;

            for (ball, radius) in &balls {
                for (cuboid, box_center, half_extents, sensor) in &boxes {
                    let Some((normal, depth)) =
                        sphere_box_contact(body.translation, *radius, *box_center, *half_extents)
                    else {
                        continue;
                    };

                    touching.insert(ordered(*ball, *cuboid));
                    if *sensor {
                        continue;
                    }

                    body.translation += normal * depth;
                    let into = body.linvel.dot(normal);
                    if into < 0.0 {
                        body.linvel -= normal * into;
                    }
                    if normal.y > GROUNDED_NORMAL_Y {
                        body.grounded = true;
                    }
                }
            }
        }

        for pair in touching.difference(&self.contacts) {
            self.events.push(CollisionEvent {
                a: pair.0,
                b: pair.1,
                started: true,
            });
        }
        for pair in self.contacts.difference(&touching) {
            self.events.push(CollisionEvent {
                a: pair.0,
                b: pair.1,
                started: false,
            });
        }
        self.contacts = touching;
    }

    fn drain_collision_events(&mut self, f: &mut dyn FnMut(CollisionEvent)) {
        for event in self.events.drain(..) {
            f(event);
        }
    }

    fn translation(&self, body: BodyHandle) -> Option<Vec3> {
        self.body(body).map(|b| b.translation)
    }

    fn set_translation(&mut self, body: BodyHandle, translation: Vec3) {
        if let Some(b) = self.body_mut(body) {
            b.translation = translation;
        }
    }

    fn linvel(&self, body: BodyHandle) -> Option<Vec3> {
        self.body(body).map(|b| b.linvel)
    }

    fn set_linvel(&mut self, body: BodyHandle, linvel: Vec3) {
        if let Some(b) = self.body_mut(body) {
            if b.kind == BodyKind::Dynamic && !b.sleeping {
                b.linvel = linvel;
            }
        }
    }

    fn apply_impulse(&mut self, body: BodyHandle, impulse: Vec3) {
        // Unit mass: impulse is a velocity change
        if let Some(b) = self.body_mut(body) {
            if b.kind == BodyKind::Dynamic && !b.sleeping {
                b.linvel += impulse;
            }
        }
    }

    fn sleep(&mut self, body: BodyHandle) {
        if let Some(b) = self.body_mut(body) {
            b.sleeping = true;
            b.linvel = Vec3::ZERO;
            b.grounded = false;
        }
    }

    fn wake_up(&mut self, body: BodyHandle) {
        if let Some(b) = self.body_mut(body) {
            b.sleeping = false;
        }
    }

    fn is_sleeping(&self, body: BodyHandle) -> bool {
        self.body(body).is_some_and(|b| b.sleeping)
    }

    fn lock_rotations(&mut self, body: BodyHandle, locked: bool) {
        if let Some(b) = self.body_mut(body) {
            b.rotations_locked = locked;
        }
    }

    fn is_grounded(&self, body: BodyHandle) -> bool {
        self.body(body).is_some_and(|b| b.grounded)
    }

    fn body_count(&self) -> usize {
        self.bodies.len
    }

    fn collider_count(&self) -> usize {
        self.colliders.len
    }
}

fn ordered(a: ColliderHandle, b: ColliderHandle) -> (ColliderHandle, ColliderHandle) {
    if a <= b { (a, b) } else { (b, a) }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn floor(world: &mut KinematicWorld) -> (BodyHandle, ColliderHandle) {
        let body = world.create_rigid_body(RigidBodyDesc::fixed());
        let collider = world
            .create_collider(ColliderDesc::cuboid(5.0, 1.0, 1.5), body)
            .unwrap();
        (body, collider)
    }

    fn ball(world: &mut KinematicWorld, at: Vec3) -> (BodyHandle, ColliderHandle) {
        let body = world.create_rigid_body(RigidBodyDesc::dynamic().with_translation(at));
        let collider = world.create_collider(ColliderDesc::ball(0.3), body).unwrap();
        (body, collider)
    }

    #[test]
    fn test_ball_rests_on_floor() {
        let mut world = KinematicWorld::default();
        floor(&mut world);
        let (body, _) = ball(&mut world, Vec3::new(0.0, 2.0, 0.0));

        for _ in 0..240 {
            world.step(DT);
        }

        let pos = world.translation(body).unwrap();
        assert!((pos.y - 1.3).abs() < 0.02, "y = {}", pos.y);
        assert!(world.is_grounded(body));
        assert!(world.linvel(body).unwrap().y.abs() < 0.2);
    }

    #[test]
    fn test_ball_falls_without_floor() {
        let mut world = KinematicWorld::default();
        let (body, _) = ball(&mut world, Vec3::new(0.0, 2.0, 0.0));
        for _ in 0..60 {
            world.step(DT);
        }
        assert!(world.translation(body).unwrap().y < -2.0);
        assert!(!world.is_grounded(body));
    }

    #[test]
    fn test_contact_events_start_and_stop() {
        let mut world = KinematicWorld::default();
        let (_, floor_collider) = floor(&mut world);
        let (body, ball_collider) = ball(&mut world, Vec3::new(0.0, 1.29, 0.0));

        world.step(DT);
        let mut events = Vec::new();
        world.drain_collision_events(&mut |e| events.push(e));
        assert_eq!(events.len(), 1);
        assert!(events[0].started);
        assert!(events[0].involves(floor_collider));
        assert!(events[0].involves(ball_collider));

        // Queue is empty after draining; steady contact adds nothing
        world.step(DT);
        let mut count = 0;
        world.drain_collision_events(&mut |_| count += 1);
        assert_eq!(count, 0);

        world.set_translation(body, Vec3::new(0.0, 10.0, 0.0));
        world.step(DT);
        let mut stopped = Vec::new();
        world.drain_collision_events(&mut |e| stopped.push(e));
        assert_eq!(stopped.len(), 1);
        assert!(!stopped[0].started);
    }

    #[test]
    fn test_sleeping_body_does_not_move() {
        let mut world = KinematicWorld::default();
        let (body, _) = ball(&mut world, Vec3::new(0.0, 50.0, 0.0));
        world.sleep(body);
        world.apply_impulse(body, Vec3::Y * 3.0);
        world.step(DT);
        assert_eq!(world.translation(body), Some(Vec3::new(0.0, 50.0, 0.0)));
        assert!(world.is_sleeping(body));

        world.wake_up(body);
        world.step(DT);
        assert!(world.translation(body).unwrap().y < 50.0);
    }

    #[test]
    fn test_remove_collider_and_stale_handles() {
        let mut world = KinematicWorld::default();
        let (floor_body, collider) = floor(&mut world);
        assert_eq!(world.collider_count(), 1);
        assert!(world.remove_collider(collider));
        assert!(!world.remove_collider(collider));
        assert_eq!(world.collider_count(), 0);

        world.remove_rigid_body(floor_body);
        assert_eq!(world.body_count(), 0);
        assert!(world.translation(floor_body).is_none());

        // Slot reuse bumps the generation, old handle stays dead
        let (fresh, _) = floor(&mut world);
        assert_ne!(fresh, floor_body);
        assert!(world.translation(floor_body).is_none());
        assert!(world.create_collider(ColliderDesc::ball(1.0), floor_body).is_none());
    }

    #[test]
    fn test_sphere_box_contact_inside() {
        let (normal, depth) =
            sphere_box_contact(Vec3::new(0.0, 0.9, 0.0), 0.3, Vec3::ZERO, Vec3::new(5.0, 1.0, 1.5))
                .unwrap();
        assert_eq!(normal, Vec3::Y);
        assert!((depth - 0.4).abs() < 1e-5);
        assert!(sphere_box_contact(Vec3::new(0.0, 2.0, 0.0), 0.3, Vec3::ZERO, Vec3::ONE).is_none());
    }
}
