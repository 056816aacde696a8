//! Procedural track streaming
//!
//! Chunks are appended at a cursor ahead of the leading actor and retired
//! once they fall behind the danger front (or the left screen edge, if that is
//! further ahead). Live chunks stay contiguous along x.

use std::collections::VecDeque;

use glam::Vec3;
use rand::Rng;

use super::chunk::{ActorProbe, Chunk, ChunkKind, FeatureReport, MeshKey};
use super::physics::{CollisionEvent, PhysicsEngine};

/// Weighted draw over the kinds allowed after `prev`.
///
/// `roll` is a uniform sample in [0, 1); kinds are laid out as cumulative
/// probability buckets in declaration order.
pub fn select_kind(prev: Option<ChunkKind>, roll: f32) -> ChunkKind {
    let eligible: Vec<ChunkKind> = ChunkKind::ALL
        .into_iter()
        .filter(|kind| kind.can_follow(prev))
        .collect();

    let total: u32 = eligible.iter().map(|k| k.weight()).sum();
    if total == 0 {
        return ChunkKind::Normal;
    }

    let mut cumulative = 0.0;
    for kind in &eligible {
        cumulative += kind.weight() as f32 / total as f32;
        if roll < cumulative {
            return *kind;
        }
    }
    // Rounding left the last bucket a hair short of 1.0
    eligible.last().copied().unwrap_or(ChunkKind::Normal)
}

/// A retired chunk, handed back so the presentation layer can drop its meshes
#[derive(Debug, Clone)]
pub struct RetiredChunk {
    pub id: u32,
    pub kind: ChunkKind,
    pub meshes: Vec<MeshKey>,
}

#[derive(Debug)]
pub struct ChunkSequencer {
    chunks: VecDeque<Chunk>,
    /// x where the next chunk starts
    cursor: f32,
    /// Chunks starting at or before this x are forced to the safe kind
    lead_in_end: f32,
    next_id: u32,
}

impl ChunkSequencer {
    pub fn new(start_x: f32, lead_in_end: f32) -> Self {
        Self {
            chunks: VecDeque::new(),
            cursor: start_x,
            lead_in_end,
            next_id: 1,
        }
    }

    pub fn cursor(&self) -> f32 {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    /// Chunk covering world x, if any
    pub fn chunk_at(&self, x: f32) -> Option<&Chunk> {
        self.chunks.iter().find(|c| x >= c.anchor.x && x < c.end_x())
    }

    fn last_kind(&self) -> Option<ChunkKind> {
        self.chunks.back().map(|c| c.kind)
    }

    /// Pick the kind for the chunk starting at the cursor
    pub fn next_kind<R: Rng>(&self, rng: &mut R) -> ChunkKind {
        if self.chunks.is_empty() || self.cursor <= self.lead_in_end {
            return ChunkKind::Normal;
        }
        select_kind(self.last_kind(), rng.random::<f32>())
    }

    /// Append chunks until the cursor passes `target_x`; returns spawned ids
    pub fn extend<P, R>(
        &mut self,
        target_x: f32,
        physics: &mut P,
        rng: &mut R,
    ) -> Vec<(u32, ChunkKind)>
    where
        P: PhysicsEngine + ?Sized,
        R: Rng,
    {
        let mut spawned = Vec::new();
        while self.cursor <= target_x {
            let kind = self.next_kind(rng);
            spawned.push((self.append(kind, physics, rng), kind));
        }
        spawned
    }

    /// Spawn one chunk of `kind` at the cursor, bypassing selection
    pub fn append<P, R>(&mut self, kind: ChunkKind, physics: &mut P, rng: &mut R) -> u32
    where
        P: PhysicsEngine + ?Sized,
        R: Rng,
    {
        let id = self.next_id;
        self.next_id += 1;

        let chunk = Chunk::spawn(id, kind, Vec3::new(self.cursor, 0.0, 0.0), physics, rng);
        self.cursor = chunk.end_x();
        self.chunks.push_back(chunk);
        id
    }

    /// Destroy chunks whose trailing edge is behind
    /// `max(retirement_threshold, hazard_x)`. A no-op on an empty track.
    pub fn retire<P>(
        &mut self,
        retirement_threshold: f32,
        hazard_x: f32,
        physics: &mut P,
    ) -> Vec<RetiredChunk>
    where
        P: PhysicsEngine + ?Sized,
    {
        let limit = retirement_threshold.max(hazard_x);
        let mut retired = Vec::new();

        while self.chunks.front().is_some_and(|c| c.end_x() < limit) {
            let Some(chunk) = self.chunks.pop_front() else {
                break;
            };
            let (id, kind) = (chunk.id, chunk.kind);
            let meshes = chunk.destroy(physics);
            retired.push(RetiredChunk { id, kind, meshes });
        }
        retired
    }

    /// Route a collision event to the chunk owning either collider
    pub fn dispatch_collision(&mut self, event: &CollisionEvent) -> bool {
        let mut handled = false;
        for chunk in self.chunks.iter_mut() {
            if chunk.owns(event.a) || chunk.owns(event.b) {
                chunk.on_collision(event);
                handled = true;
            }
        }
        handled
    }

    /// Poll every chunk's sub-feature rules
    pub fn poll(&mut self, probes: &[ActorProbe; 2], fused: bool) -> FeatureReport {
        let mut report = FeatureReport::default();
        for chunk in self.chunks.iter_mut() {
            chunk.poll(probes, fused, &mut report);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::sim::physics::KinematicWorld;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_select_kind_buckets() {
        // After a tunnel, normal is first in declaration order and heaviest
        assert_eq!(select_kind(Some(ChunkKind::Tunnel), 0.0), ChunkKind::Normal);
        assert_ne!(select_kind(Some(ChunkKind::Tunnel), 0.999), ChunkKind::Tunnel);
        // Normal is excluded right after normal
        assert_eq!(select_kind(Some(ChunkKind::Normal), 0.0), ChunkKind::Tunnel);
        // Rolls at the very top fall into the last eligible bucket
        assert_eq!(select_kind(Some(ChunkKind::Normal), 0.99999), ChunkKind::Enemy);
    }

    #[test]
    fn test_first_chunk_is_safe_and_track_is_contiguous() {
        let mut physics = KinematicWorld::default();
        let mut rng = Pcg32::seed_from_u64(42);
        let mut seq = ChunkSequencer::new(-10.0, 2.0);
        let spawned = seq.extend(60.0, &mut physics, &mut rng);

        assert!(!spawned.is_empty());
        assert_eq!(spawned[0].1, ChunkKind::Normal);
        assert!(seq.cursor() > 60.0);

        let chunks: Vec<_> = seq.chunks().collect();
        for pair in chunks.windows(2) {
            assert!((pair[0].end_x() - pair[1].anchor.x).abs() < 1e-4);
        }
        // Spawn line sits on solid ground
        assert_eq!(seq.chunk_at(0.0).map(|c| c.kind), Some(ChunkKind::Normal));
    }

    #[test]
    fn test_retire_on_empty_is_noop() {
        let mut physics = KinematicWorld::default();
        let mut seq = ChunkSequencer::new(0.0, 2.0);
        assert!(seq.retire(100.0, 100.0, &mut physics).is_empty());
        assert!(seq.is_empty());
    }

    #[test]
    fn test_retire_releases_colliders() {
        let mut physics = KinematicWorld::default();
        let mut rng = Pcg32::seed_from_u64(7);
        let mut seq = ChunkSequencer::new(0.0, 2.0);
        seq.extend(40.0, &mut physics, &mut rng);
        let before = physics.collider_count();

        let retired = seq.retire(-100.0, 10.0, &mut physics);
        assert!(!retired.is_empty());
        assert!(physics.collider_count() < before);
        assert!(seq.chunks().next().unwrap().end_x() >= 10.0);

        // Retiring everything leaves an empty, but valid, sequence
        seq.retire(1000.0, 0.0, &mut physics);
        assert!(seq.is_empty());
        assert_eq!(physics.collider_count(), 0);
        assert!(seq.retire(1000.0, 0.0, &mut physics).is_empty());
    }

    proptest! {
        #[test]
        fn prop_no_repeat_after_lead_in(seed in any::<u64>()) {
            let mut physics = KinematicWorld::default();
            let mut rng = Pcg32::seed_from_u64(seed);
            let mut seq = ChunkSequencer::new(-8.0, 2.0);
            seq.extend(300.0, &mut physics, &mut rng);

            let chunks: Vec<_> = seq.chunks().collect();
            prop_assert_eq!(chunks[0].kind, ChunkKind::Normal);
            for pair in chunks.windows(2) {
                if pair[1].anchor.x > 2.0 {
                    prop_assert!(pair[1].kind.can_follow(Some(pair[0].kind)),
                        "{:?} after {:?}", pair[1].kind, pair[0].kind);
                }
            }
        }

        #[test]
        fn prop_retire_never_removes_live_chunks(
            seed in any::<u64>(),
            threshold in -20.0f32..200.0,
            hazard in -20.0f32..200.0,
        ) {
            let mut physics = KinematicWorld::default();
            let mut rng = Pcg32::seed_from_u64(seed);
            let mut seq = ChunkSequencer::new(-10.0, 2.0);
            seq.extend(150.0, &mut physics, &mut rng);

            let limit = threshold.max(hazard);
            let end_x: HashMap<u32, f32> = seq.chunks().map(|c| (c.id, c.end_x())).collect();
            let retired = seq.retire(threshold, hazard, &mut physics);

            for chunk in &retired {
                let end = end_x[&chunk.id];
                prop_assert!(
                    end < limit,
                    "chunk {} retired with end {} >= {}",
                    chunk.id,
                    end,
                    limit
                );
                prop_assert!(chunk.meshes.len() <= 3);
            }
            for chunk in seq.chunks() {
                prop_assert!(chunk.end_x() >= limit);
            }
            prop_assert_eq!(retired.len() + seq.len(), end_x.len());
        }
    }
}
