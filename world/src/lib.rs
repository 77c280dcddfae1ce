#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative chunked terrain world for Thornfall Defence.
//!
//! The world is an infinite procedural heightfield streamed in fixed-size
//! chunks around a single observer. Chunk residency is reconciled on
//! observer movement; all owned chunk state (resource nodes, pending
//! respawn timers, physics bodies) is created on load and disposed on
//! eviction. Height queries outside residency answer a flat default so
//! callers never block on generation.

pub mod heightfield;
pub mod objective;
pub mod resources;

use std::collections::BTreeMap;
use std::time::Duration;

use glam::DVec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thornfall_core::schedule::{OwnerId, Schedule};
use thornfall_core::{ChunkKey, Event, Physics, ResourceKind, ResourceNodeId};

use crate::heightfield::HeightField;
use crate::resources::{Harvest, InteractOutcome, NodeStatus, ResourceNode};

/// Side length of a chunk in world units.
pub const CHUNK_SIZE: f64 = 64.0;
/// Height samples per chunk axis.
pub const CHUNK_RESOLUTION: usize = 32;
/// Chebyshev radius of resident chunks around the observer.
pub const VIEW_DISTANCE: i32 = 2;

/// Spacing between adjacent height samples.
const SAMPLE_SPACING: f64 = CHUNK_SIZE / CHUNK_RESOLUTION as f64;

/// Read-only view of a resource node handed to perception and interaction
/// queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResourceSnapshot {
    /// Identifier of the node.
    pub id: ResourceNodeId,
    /// Kind of resource the node yields.
    pub kind: ResourceKind,
    /// World position of the node.
    pub position: DVec3,
    /// Whether the node currently accepts interactions.
    pub active: bool,
    /// Grow-back scale in `[0, 1]`.
    pub scale: f64,
}

/// One resident terrain chunk: a height grid plus the resource nodes
/// scattered across it.
#[derive(Clone, Debug)]
pub struct Chunk {
    key: ChunkKey,
    origin: DVec3,
    height_samples: Vec<f64>,
    nodes: Vec<ResourceNode>,
}

impl Chunk {
    fn generate(key: ChunkKey, field: &HeightField, seed: u64, next_node: &mut u32) -> Self {
        let origin = DVec3::new(
            f64::from(key.x()) * CHUNK_SIZE,
            0.0,
            f64::from(key.z()) * CHUNK_SIZE,
        );

        let mut height_samples = Vec::with_capacity(CHUNK_RESOLUTION * CHUNK_RESOLUTION);
        for iz in 0..CHUNK_RESOLUTION {
            for ix in 0..CHUNK_RESOLUTION {
                let x = origin.x + ix as f64 * SAMPLE_SPACING;
                let z = origin.z + iz as f64 * SAMPLE_SPACING;
                height_samples.push(field.sample(x, z));
            }
        }

        let mut chunk = Self {
            key,
            origin,
            height_samples,
            nodes: Vec::new(),
        };

        // Content is seeded per chunk key so residency order never changes
        // what a chunk contains.
        let mut rng = ChaCha8Rng::seed_from_u64(chunk_seed(seed, key));
        let tree_count = rng.gen_range(5..=9);
        let rock_count = rng.gen_range(3..=5);
        for _ in 0..tree_count {
            let node = scatter_node(ResourceKind::Wood, &chunk, &mut rng, next_node);
            chunk.nodes.push(node);
        }
        for _ in 0..rock_count {
            let node = scatter_node(ResourceKind::Stone, &chunk, &mut rng, next_node);
            chunk.nodes.push(node);
        }

        chunk
    }

    /// Key identifying this chunk.
    #[must_use]
    pub const fn key(&self) -> ChunkKey {
        self.key
    }

    /// World-space origin corner of the chunk.
    #[must_use]
    pub const fn origin(&self) -> DVec3 {
        self.origin
    }

    /// Resource nodes owned by the chunk.
    #[must_use]
    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    /// Bilinearly interpolated terrain height at a world position assumed
    /// to lie within this chunk's footprint.
    #[must_use]
    pub fn height_at(&self, x: f64, z: f64) -> f64 {
        let gx = (x - self.origin.x) / SAMPLE_SPACING;
        let gz = (z - self.origin.z) / SAMPLE_SPACING;

        let ix = (gx.floor() as isize).clamp(0, CHUNK_RESOLUTION as isize - 1) as usize;
        let iz = (gz.floor() as isize).clamp(0, CHUNK_RESOLUTION as isize - 1) as usize;
        let ix1 = (ix + 1).min(CHUNK_RESOLUTION - 1);
        let iz1 = (iz + 1).min(CHUNK_RESOLUTION - 1);

        let fx = (gx - ix as f64).clamp(0.0, 1.0);
        let fz = (gz - iz as f64).clamp(0.0, 1.0);

        let h00 = self.height_samples[iz * CHUNK_RESOLUTION + ix];
        let h10 = self.height_samples[iz * CHUNK_RESOLUTION + ix1];
        let h01 = self.height_samples[iz1 * CHUNK_RESOLUTION + ix];
        let h11 = self.height_samples[iz1 * CHUNK_RESOLUTION + ix1];

        h00 * (1.0 - fx) * (1.0 - fz)
            + h10 * fx * (1.0 - fz)
            + h01 * (1.0 - fx) * fz
            + h11 * fx * fz
    }
}

fn chunk_seed(world_seed: u64, key: ChunkKey) -> u64 {
    let x = key.x() as u32 as u64;
    let z = key.z() as u32 as u64;
    world_seed ^ (x << 32 | z).wrapping_mul(0x9e37_79b9_7f4a_7c15)
}

fn scatter_node(
    kind: ResourceKind,
    chunk: &Chunk,
    rng: &mut ChaCha8Rng,
    next_node: &mut u32,
) -> ResourceNode {
    let x = chunk.origin.x + rng.gen_range(0.0..CHUNK_SIZE);
    let z = chunk.origin.z + rng.gen_range(0.0..CHUNK_SIZE);
    let id = ResourceNodeId::new(*next_node);
    *next_node += 1;
    // Nodes sit on the interpolated surface, not on the raw noise sample.
    ResourceNode::new(id, kind, DVec3::new(x, chunk.height_at(x, z), z))
}

/// Authoritative chunk residency and terrain query surface.
///
/// Owns the height function, every resident [`Chunk`], and the respawn
/// schedule for depleted resource nodes. Exactly one observer drives
/// residency.
pub struct ChunkStore {
    field: HeightField,
    seed: u64,
    chunks: BTreeMap<ChunkKey, Chunk>,
    next_node: u32,
    respawns: Schedule<ResourceNodeId>,
    clock: Duration,
}

impl ChunkStore {
    /// Creates an empty store. No chunks are resident until the first
    /// [`ChunkStore::set_observer`] call.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            field: HeightField::new(),
            seed,
            chunks: BTreeMap::new(),
            next_node: 0,
            respawns: Schedule::new(),
            clock: Duration::ZERO,
        }
    }

    /// Reconciles chunk residency against the observer's position. Loads
    /// every chunk within [`VIEW_DISTANCE`] of the observer's chunk and
    /// evicts the rest, disposing their owned state.
    pub fn set_observer(
        &mut self,
        position: DVec3,
        mut physics: Option<&mut dyn Physics>,
        out_events: &mut Vec<Event>,
    ) {
        let center = ChunkKey::from_world(position.x, position.z, CHUNK_SIZE);

        let evicted: Vec<ChunkKey> = self
            .chunks
            .keys()
            .copied()
            .filter(|key| {
                (key.x() - center.x()).abs() > VIEW_DISTANCE
                    || (key.z() - center.z()).abs() > VIEW_DISTANCE
            })
            .collect();
        for key in evicted {
            if let Some(chunk) = self.chunks.remove(&key) {
                for node in chunk.nodes() {
                    let _ = self.respawns.cancel_owner(respawn_owner(node.id()));
                }
                if let Some(physics) = physics.as_deref_mut() {
                    physics.remove_terrain_body(key);
                }
                out_events.push(Event::ChunkEvicted { key });
            }
        }

        for dz in -VIEW_DISTANCE..=VIEW_DISTANCE {
            for dx in -VIEW_DISTANCE..=VIEW_DISTANCE {
                let key = ChunkKey::new(center.x() + dx, center.z() + dz);
                if self.chunks.contains_key(&key) {
                    continue;
                }
                let chunk = Chunk::generate(key, &self.field, self.seed, &mut self.next_node);
                if let Some(physics) = physics.as_deref_mut() {
                    physics.create_terrain_body(
                        key,
                        &chunk.height_samples,
                        CHUNK_RESOLUTION,
                        CHUNK_SIZE,
                    );
                }
                let _ = self.chunks.insert(key, chunk);
                out_events.push(Event::ChunkLoaded { key });
            }
        }
    }

    /// Advances the simulation clock, firing due respawns and growing
    /// regrown nodes back to full scale.
    pub fn update(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        self.clock += dt;

        for id in self.respawns.drain_due(self.clock) {
            if let Some(node) = self.node_mut(id) {
                node.respawn();
                out_events.push(Event::ResourceRespawned { node: id });
            }
        }

        for chunk in self.chunks.values_mut() {
            for node in &mut chunk.nodes {
                if node.status() == NodeStatus::Active {
                    node.grow(dt);
                }
            }
        }
    }

    /// Terrain height at a world position. Answers `0.0` when the
    /// containing chunk is not resident.
    #[must_use]
    pub fn height_at(&self, x: f64, z: f64) -> f64 {
        let key = ChunkKey::from_world(x, z, CHUNK_SIZE);
        self.chunks
            .get(&key)
            .map_or(0.0, |chunk| chunk.height_at(x, z))
    }

    /// Reports whether the chunk containing a world position is resident.
    #[must_use]
    pub fn is_loaded(&self, x: f64, z: f64) -> bool {
        self.chunks
            .contains_key(&ChunkKey::from_world(x, z, CHUNK_SIZE))
    }

    /// Keys of every resident chunk, in unspecified order.
    #[must_use]
    pub fn resident_keys(&self) -> Vec<ChunkKey> {
        self.chunks.keys().copied().collect()
    }

    /// Snapshots of every resource node within `radius` of `position`.
    #[must_use]
    pub fn objects_near(&self, position: DVec3, radius: f64) -> Vec<ResourceSnapshot> {
        let mut found = Vec::new();
        for chunk in self.chunks.values() {
            for node in chunk.nodes() {
                if node.position().distance(position) <= radius {
                    found.push(snapshot(node));
                }
            }
        }
        found
    }

    /// Nearest active node within `radius` of `position`, if any.
    #[must_use]
    pub fn check_interaction(&self, position: DVec3, radius: f64) -> Option<ResourceSnapshot> {
        let mut best: Option<(f64, ResourceSnapshot)> = None;
        for chunk in self.chunks.values() {
            for node in chunk.nodes() {
                if !node.can_interact() {
                    continue;
                }
                let distance = node.position().distance(position);
                if distance > radius {
                    continue;
                }
                if best.map_or(true, |(nearest, _)| distance < nearest) {
                    best = Some((distance, snapshot(node)));
                }
            }
        }
        best.map(|(_, found)| found)
    }

    /// Applies one harvest interaction to the identified node. Returns the
    /// harvest on success and `None` when the node is depleted, evicted, or
    /// unknown. Depletion queues the node's respawn on the store clock.
    pub fn interact(
        &mut self,
        id: ResourceNodeId,
        out_events: &mut Vec<Event>,
    ) -> Option<Harvest> {
        let clock = self.clock;
        let node = self.node_mut(id)?;
        match node.interact() {
            InteractOutcome::Rejected => None,
            InteractOutcome::Harvested(harvest) => Some(harvest),
            InteractOutcome::Depleted(harvest) => {
                let fire_at = clock + node.respawn_delay();
                self.respawns.insert(fire_at, respawn_owner(id), id);
                out_events.push(Event::ResourceDepleted {
                    node: id,
                    kind: harvest.kind,
                    amount: harvest.amount,
                });
                Some(harvest)
            }
        }
    }

    /// Snapshot of a node by identifier, when resident.
    #[must_use]
    pub fn node_snapshot(&self, id: ResourceNodeId) -> Option<ResourceSnapshot> {
        self.chunks
            .values()
            .flat_map(|chunk| chunk.nodes())
            .find(|node| node.id() == id)
            .map(snapshot)
    }

    /// Number of pending respawn timers.
    #[must_use]
    pub fn pending_respawns(&self) -> usize {
        self.respawns.len()
    }

    fn node_mut(&mut self, id: ResourceNodeId) -> Option<&mut ResourceNode> {
        self.chunks
            .values_mut()
            .flat_map(|chunk| chunk.nodes.iter_mut())
            .find(|node| node.id() == id)
    }

    /// Installs a chunk with caller-supplied height samples and no nodes.
    /// Test scaffolding for exercising height queries against known grids.
    #[cfg(any(test, feature = "terrain_scaffolding"))]
    pub fn insert_chunk_with_samples(&mut self, key: ChunkKey, height_samples: Vec<f64>) {
        assert_eq!(height_samples.len(), CHUNK_RESOLUTION * CHUNK_RESOLUTION);
        let origin = DVec3::new(
            f64::from(key.x()) * CHUNK_SIZE,
            0.0,
            f64::from(key.z()) * CHUNK_SIZE,
        );
        let _ = self.chunks.insert(
            key,
            Chunk {
                key,
                origin,
                height_samples,
                nodes: Vec::new(),
            },
        );
    }
}

fn snapshot(node: &ResourceNode) -> ResourceSnapshot {
    ResourceSnapshot {
        id: node.id(),
        kind: node.kind(),
        position: node.position(),
        active: node.can_interact(),
        scale: node.scale(),
    }
}

fn respawn_owner(id: ResourceNodeId) -> OwnerId {
    OwnerId::new(u64::from(id.get()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_samples(height: f64) -> Vec<f64> {
        vec![height; CHUNK_RESOLUTION * CHUNK_RESOLUTION]
    }

    #[test]
    fn bilinear_interpolation_blends_cell_corners() {
        let mut store = ChunkStore::new(0);
        let mut samples = flat_samples(0.0);
        samples[0] = 1.0; // (0, 0)
        samples[1] = 3.0; // (1, 0)
        samples[CHUNK_RESOLUTION] = 5.0; // (0, 1)
        samples[CHUNK_RESOLUTION + 1] = 7.0; // (1, 1)
        store.insert_chunk_with_samples(ChunkKey::new(0, 0), samples);

        // Cell center: equal weight on all four corners.
        let center = store.height_at(SAMPLE_SPACING * 0.5, SAMPLE_SPACING * 0.5);
        assert!((center - 4.0).abs() < 1e-12);

        // Exact sample positions reproduce the samples.
        assert!((store.height_at(0.0, 0.0) - 1.0).abs() < 1e-12);
        assert!((store.height_at(SAMPLE_SPACING, 0.0) - 3.0).abs() < 1e-12);
        assert!((store.height_at(0.0, SAMPLE_SPACING) - 5.0).abs() < 1e-12);

        // Midpoint of the bottom edge blends only its two corners.
        let edge = store.height_at(SAMPLE_SPACING * 0.5, 0.0);
        assert!((edge - 2.0).abs() < 1e-12);
    }

    #[test]
    fn height_query_outside_residency_is_flat_zero() {
        let store = ChunkStore::new(7);
        assert_eq!(store.height_at(1_000.0, -1_000.0), 0.0);
        assert!(!store.is_loaded(1_000.0, -1_000.0));
    }

    #[test]
    fn observer_loads_full_view_square() {
        let mut store = ChunkStore::new(42);
        let mut events = Vec::new();
        store.set_observer(DVec3::ZERO, None, &mut events);

        let side = (2 * VIEW_DISTANCE + 1) as usize;
        assert_eq!(store.resident_keys().len(), side * side);
        let loads = events
            .iter()
            .filter(|event| matches!(event, Event::ChunkLoaded { .. }))
            .count();
        assert_eq!(loads, side * side);
    }

    #[test]
    fn observer_movement_evicts_left_behind_chunks() {
        let mut store = ChunkStore::new(42);
        let mut events = Vec::new();
        store.set_observer(DVec3::ZERO, None, &mut events);

        events.clear();
        store.set_observer(DVec3::new(CHUNK_SIZE * 10.0, 0.0, 0.0), None, &mut events);

        let side = (2 * VIEW_DISTANCE + 1) as usize;
        let evictions = events
            .iter()
            .filter(|event| matches!(event, Event::ChunkEvicted { .. }))
            .count();
        assert_eq!(evictions, side * side);
        assert_eq!(store.resident_keys().len(), side * side);
        assert!(!store.is_loaded(0.0, 0.0));
    }

    #[test]
    fn chunks_are_populated_within_density_bounds() {
        let mut store = ChunkStore::new(99);
        let mut events = Vec::new();
        store.set_observer(DVec3::ZERO, None, &mut events);

        for key in store.resident_keys() {
            let chunk = store.chunks.get(&key).expect("resident");
            let trees = chunk
                .nodes()
                .iter()
                .filter(|node| node.kind() == ResourceKind::Wood)
                .count();
            let rocks = chunk
                .nodes()
                .iter()
                .filter(|node| node.kind() == ResourceKind::Stone)
                .count();
            assert!((5..=9).contains(&trees));
            assert!((3..=5).contains(&rocks));
        }
    }

    #[test]
    fn scattered_nodes_sit_on_the_interpolated_surface() {
        let mut store = ChunkStore::new(99);
        let mut events = Vec::new();
        store.set_observer(DVec3::ZERO, None, &mut events);

        // Node heights must match the query surface, not the raw noise
        // function, so placed entities never float above or sink below it.
        let nodes = store.objects_near(DVec3::ZERO, CHUNK_SIZE * 3.0);
        assert!(!nodes.is_empty());
        for node in nodes {
            let surface = store.height_at(node.position.x, node.position.z);
            assert!((node.position.y - surface).abs() < 1e-12);
        }
    }

    #[test]
    fn chunk_content_is_independent_of_load_order() {
        let mut events = Vec::new();

        let mut first = ChunkStore::new(5);
        first.set_observer(DVec3::ZERO, None, &mut events);
        let reference: Vec<DVec3> = first
            .chunks
            .get(&ChunkKey::new(1, 1))
            .expect("resident")
            .nodes()
            .iter()
            .map(|node| node.position())
            .collect();

        let mut second = ChunkStore::new(5);
        second.set_observer(DVec3::new(CHUNK_SIZE, 0.0, CHUNK_SIZE), None, &mut events);
        let repeat: Vec<DVec3> = second
            .chunks
            .get(&ChunkKey::new(1, 1))
            .expect("resident")
            .nodes()
            .iter()
            .map(|node| node.position())
            .collect();

        assert_eq!(reference, repeat);
    }

    #[test]
    fn objects_near_filters_by_euclidean_radius() {
        let mut store = ChunkStore::new(13);
        let mut events = Vec::new();
        store.set_observer(DVec3::ZERO, None, &mut events);

        let all: Vec<_> = store
            .chunks
            .values()
            .flat_map(|chunk| chunk.nodes())
            .map(snapshot)
            .collect();
        let center = DVec3::new(10.0, 0.0, -5.0);
        let radius = 50.0;

        let near = store.objects_near(center, radius);
        assert!(!near.is_empty());
        for found in &near {
            assert!(found.position.distance(center) <= radius);
        }
        let expected = all
            .iter()
            .filter(|node| node.position.distance(center) <= radius)
            .count();
        assert_eq!(near.len(), expected);
    }

    fn deplete(store: &mut ChunkStore, id: ResourceNodeId, out_events: &mut Vec<Event>) {
        for _ in 0..4 {
            let _ = store.interact(id, out_events);
        }
    }

    #[test]
    fn depletion_schedules_respawn_on_store_clock() {
        let mut store = ChunkStore::new(3);
        let mut events = Vec::new();
        store.set_observer(DVec3::ZERO, None, &mut events);

        let target = store
            .check_interaction(DVec3::ZERO, CHUNK_SIZE * 2.0)
            .expect("a node near origin");
        events.clear();
        deplete(&mut store, target.id, &mut events);

        assert!(events
            .iter()
            .any(|event| matches!(event, Event::ResourceDepleted { node, .. } if *node == target.id)));
        assert_eq!(store.pending_respawns(), 1);
        assert!(store.interact(target.id, &mut events).is_none());

        // Longest respawn delay is 45s.
        events.clear();
        store.update(Duration::from_secs(46), &mut events);
        assert!(events
            .iter()
            .any(|event| matches!(event, Event::ResourceRespawned { node } if *node == target.id)));
        let restored = store.node_snapshot(target.id).expect("still resident");
        assert!(restored.active);
        assert_eq!(restored.scale, 0.0);
        assert_eq!(store.pending_respawns(), 0);
    }

    #[test]
    fn eviction_cancels_pending_respawns() {
        let mut store = ChunkStore::new(3);
        let mut events = Vec::new();
        store.set_observer(DVec3::ZERO, None, &mut events);

        let target = store
            .check_interaction(DVec3::ZERO, CHUNK_SIZE * 2.0)
            .expect("a node near origin");
        deplete(&mut store, target.id, &mut events);
        assert_eq!(store.pending_respawns(), 1);

        store.set_observer(DVec3::new(CHUNK_SIZE * 20.0, 0.0, 0.0), None, &mut events);
        assert_eq!(store.pending_respawns(), 0);

        events.clear();
        store.update(Duration::from_secs(120), &mut events);
        assert!(!events
            .iter()
            .any(|event| matches!(event, Event::ResourceRespawned { .. })));
    }

    #[test]
    fn regrown_node_scales_back_to_full() {
        let mut store = ChunkStore::new(3);
        let mut events = Vec::new();
        store.set_observer(DVec3::ZERO, None, &mut events);

        let target = store
            .check_interaction(DVec3::ZERO, CHUNK_SIZE * 2.0)
            .expect("a node near origin");
        deplete(&mut store, target.id, &mut events);
        store.update(Duration::from_secs(46), &mut events);

        store.update(Duration::from_secs(1), &mut events);
        let snapshot = store.node_snapshot(target.id).expect("resident");
        assert!((snapshot.scale - 0.5).abs() < 1e-9);
        assert!(snapshot.active, "growth never gates interaction");

        store.update(Duration::from_secs(2), &mut events);
        assert_eq!(store.node_snapshot(target.id).expect("resident").scale, 1.0);
    }

    #[test]
    fn physics_bodies_track_residency() {
        #[derive(Default)]
        struct RecordingPhysics {
            created: Vec<ChunkKey>,
            removed: Vec<ChunkKey>,
        }

        impl Physics for RecordingPhysics {
            fn create_terrain_body(
                &mut self,
                key: ChunkKey,
                heights: &[f64],
                resolution: usize,
                chunk_size: f64,
            ) {
                assert_eq!(heights.len(), resolution * resolution);
                assert_eq!(chunk_size, CHUNK_SIZE);
                self.created.push(key);
            }

            fn remove_terrain_body(&mut self, key: ChunkKey) {
                self.removed.push(key);
            }
        }

        let mut store = ChunkStore::new(11);
        let mut physics = RecordingPhysics::default();
        let mut events = Vec::new();

        store.set_observer(DVec3::ZERO, Some(&mut physics), &mut events);
        let side = (2 * VIEW_DISTANCE + 1) as usize;
        assert_eq!(physics.created.len(), side * side);
        assert!(physics.removed.is_empty());

        store.set_observer(
            DVec3::new(CHUNK_SIZE * 10.0, 0.0, 0.0),
            Some(&mut physics),
            &mut events,
        );
        assert_eq!(physics.removed.len(), side * side);
        assert_eq!(physics.created.len(), 2 * side * side);
    }
}
