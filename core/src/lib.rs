#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Thornfall Defence simulation.
//!
//! This crate defines the surface that connects the authoritative terrain
//! world, the simulation systems, and adapters. Directors own their agent
//! rosters and mutate them from a single per-tick update pass, broadcasting
//! [`Event`] values for adapters to react to deterministically. Cross-roster
//! combat is routed as [`Strike`] values so no system ever reaches into a
//! roster it does not own.

pub mod schedule;

use std::time::Duration;

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// First identifier handed out for allied agents.
///
/// Hostile and allied rosters allocate from disjoint ranges so a
/// [`TargetRef::Agent`] value is unambiguous across directors.
pub const ALLIED_ID_BASE: u32 = 0x8000_0000;

/// Unique identifier assigned to a mobile agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(u32);

impl AgentId {
    /// Creates a new agent identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a harvestable resource node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceNodeId(u32);

impl ResourceNodeId {
    /// Creates a new resource node identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Key identifying a terrain chunk by its integer grid coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    x: i32,
    z: i32,
}

impl ChunkKey {
    /// Creates a new chunk key from integer grid coordinates.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk index along the world x axis.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Chunk index along the world z axis.
    #[must_use]
    pub const fn z(&self) -> i32 {
        self.z
    }

    /// Computes the key of the chunk containing the provided world position.
    #[must_use]
    pub fn from_world(x: f64, z: f64, chunk_size: f64) -> Self {
        Self {
            x: (x / chunk_size).floor() as i32,
            z: (z / chunk_size).floor() as i32,
        }
    }
}

/// Health pool measured in whole hit points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Health(u32);

impl Health {
    /// Creates a new health value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the remaining hit points.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Reports whether the pool is exhausted.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns the pool after absorbing the provided damage, clamped at zero.
    #[must_use]
    pub const fn damaged(self, amount: u32) -> Self {
        Self(self.0.saturating_sub(amount))
    }
}

/// Harvestable resource kinds yielded by world objects and loot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Lumber harvested from trees.
    Wood,
    /// Stone harvested from rocks.
    Stone,
}

/// Allegiance of a mobile agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Faction {
    /// Wave-spawned attackers targeting the objective.
    Hostile,
    /// Player-placed defenders.
    Allied,
}

/// States of the shared agent finite-state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AgentState {
    /// Freshly spawned; promoted by the first perception tick.
    Idle,
    /// Roaming between random height-snapped points.
    Wander,
    /// Steering directly toward the current target.
    Seek,
    /// In range; applying damage on a fixed cooldown.
    Attack,
    /// Steering directly away from the current target.
    Flee,
    /// Terminal; eligible for removal by the owning director.
    Dead,
}

/// Reference to a target-able entity, resolved by identity against roster
/// views rather than by holding the entity itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetRef {
    /// A mobile agent in either roster.
    Agent(AgentId),
    /// The defended objective.
    Objective,
}

/// Snapshot of a target-able entity used by perception scans.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetCandidate {
    /// Identity of the candidate.
    pub target: TargetRef,
    /// World position at the start of the tick.
    pub position: DVec3,
    /// Whether the candidate can still receive damage.
    pub alive: bool,
}

/// Damage routed from an attacking agent to its target's owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Strike {
    /// Identity of the entity receiving the damage.
    pub target: TargetRef,
    /// Hit points to deduct.
    pub amount: u32,
}

/// Reward dropped when a hostile agent dies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loot {
    /// Experience granted to the player.
    pub experience: u32,
    /// Resource kind included in the drop.
    pub kind: ResourceKind,
    /// Units of the resource included in the drop.
    pub amount: u32,
}

/// Resources credited when a wave completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveReward {
    /// Wood credited to the player.
    pub wood: u32,
    /// Stone credited to the player.
    pub stone: u32,
}

impl WaveReward {
    /// Computes the reward for completing `wave` with `remaining` enemies
    /// still unaccounted (non-zero only on force-completed waves).
    #[must_use]
    pub const fn for_wave(wave: u32, remaining: u32) -> Self {
        Self {
            wood: 3 * wave + 2 * remaining,
            stone: wave + remaining,
        }
    }
}

/// Capability set implemented by every entity that can be targeted: agents
/// and the objective. Dispatch goes through this interface, never through
/// probing for method presence.
pub trait Targetable {
    /// Current world position.
    fn position(&self) -> DVec3;
    /// Remaining health.
    fn health(&self) -> Health;
    /// Applies damage, clamping at zero. A no-op once dead; repeated calls
    /// after death never produce negative health or a second death.
    fn take_damage(&mut self, amount: u32);
    /// Whether health has reached zero.
    fn is_dead(&self) -> bool;
}

/// Combat and movement statistics assigned to an agent at spawn.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentSpec {
    /// Full health pool.
    pub max_health: Health,
    /// Hit points dealt per attack.
    pub damage: u32,
    /// Movement speed in world units per second.
    pub speed: f64,
    /// Radius of the perception scan.
    pub vision_radius: f64,
    /// Distance at which attacking replaces seeking.
    pub attack_range: f64,
    /// Delay between successive attacks.
    pub attack_cooldown: Duration,
    /// Health fraction below which the agent flees, if any.
    pub flee_threshold: Option<f64>,
    /// Visual scale multiplier applied by variations.
    pub scale: f64,
}

impl AgentSpec {
    /// Returns the spec with health and damage escalated for the given wave
    /// by the factor `1 + 0.1 * (wave - 1)`.
    #[must_use]
    pub fn scaled_for_wave(self, wave: u32) -> Self {
        let factor = 1.0 + 0.1 * f64::from(wave.saturating_sub(1));
        Self {
            max_health: Health::new((f64::from(self.max_health.get()) * factor).round() as u32),
            damage: (f64::from(self.damage) * factor).round() as u32,
            ..self
        }
    }
}

/// Hostile breeds spawned by the wave director.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyBreed {
    /// Weak melee swarmer, available from the first wave.
    Goblin,
    /// Sturdier melee attacker.
    Orc,
    /// Slow, heavily armored bruiser.
    Troll,
    /// Fast high-damage elite.
    Demon,
    /// Ranged caster with long reach.
    Warlock,
}

impl EnemyBreed {
    /// Every breed in unlock order.
    pub const ALL: [EnemyBreed; 5] = [
        EnemyBreed::Goblin,
        EnemyBreed::Orc,
        EnemyBreed::Troll,
        EnemyBreed::Demon,
        EnemyBreed::Warlock,
    ];

    /// First wave on which the breed may spawn.
    #[must_use]
    pub const fn unlock_wave(self) -> u32 {
        match self {
            Self::Goblin => 1,
            Self::Orc => 3,
            Self::Troll => 5,
            Self::Demon => 7,
            Self::Warlock => 9,
        }
    }

    /// Breeds eligible to spawn on the provided wave.
    #[must_use]
    pub fn unlocked_for(wave: u32) -> Vec<EnemyBreed> {
        Self::ALL
            .into_iter()
            .filter(|breed| breed.unlock_wave() <= wave)
            .collect()
    }

    /// Base statistics before variation and wave scaling.
    #[must_use]
    pub const fn spec(self) -> AgentSpec {
        match self {
            Self::Goblin => AgentSpec {
                max_health: Health::new(30),
                damage: 5,
                speed: 3.5,
                vision_radius: 40.0,
                attack_range: 2.0,
                attack_cooldown: Duration::from_millis(1_500),
                flee_threshold: None,
                scale: 1.0,
            },
            Self::Orc => AgentSpec {
                max_health: Health::new(60),
                damage: 10,
                speed: 3.0,
                vision_radius: 40.0,
                attack_range: 2.0,
                attack_cooldown: Duration::from_millis(1_500),
                flee_threshold: None,
                scale: 1.0,
            },
            Self::Troll => AgentSpec {
                max_health: Health::new(120),
                damage: 18,
                speed: 2.5,
                vision_radius: 40.0,
                attack_range: 2.5,
                attack_cooldown: Duration::from_millis(2_000),
                flee_threshold: None,
                scale: 1.4,
            },
            Self::Demon => AgentSpec {
                max_health: Health::new(200),
                damage: 25,
                speed: 3.0,
                vision_radius: 45.0,
                attack_range: 2.5,
                attack_cooldown: Duration::from_millis(1_500),
                flee_threshold: None,
                scale: 1.3,
            },
            Self::Warlock => AgentSpec {
                max_health: Health::new(150),
                damage: 30,
                speed: 2.75,
                vision_radius: 45.0,
                attack_range: 8.0,
                attack_cooldown: Duration::from_millis(2_000),
                flee_threshold: None,
                scale: 1.1,
            },
        }
    }

    /// Experience granted when the breed is slain.
    #[must_use]
    pub const fn experience(self) -> u32 {
        match self {
            Self::Goblin => 10,
            Self::Orc => 20,
            Self::Troll => 35,
            Self::Demon => 50,
            Self::Warlock => 45,
        }
    }
}

/// Stat multipliers occasionally applied to a spawned enemy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variation {
    /// Bigger and tougher.
    Large,
    /// Much bigger and much tougher.
    Huge,
    /// Faster but slightly smaller.
    Quick,
}

impl Variation {
    /// Every variation the spawn roll may pick from.
    pub const ALL: [Variation; 3] = [Variation::Large, Variation::Huge, Variation::Quick];

    /// Returns the spec with the variation's multipliers applied.
    #[must_use]
    pub fn apply(self, spec: AgentSpec) -> AgentSpec {
        let (health_mul, damage_mul, speed_mul, scale_mul) = match self {
            Self::Large => (1.5, 1.25, 1.0, 1.5),
            Self::Huge => (2.5, 1.75, 0.9, 2.0),
            Self::Quick => (1.0, 1.0, 1.6, 0.9),
        };
        AgentSpec {
            max_health: Health::new(
                (f64::from(spec.max_health.get()) * health_mul).round() as u32
            ),
            damage: (f64::from(spec.damage) * damage_mul).round() as u32,
            speed: spec.speed * speed_mul,
            scale: spec.scale * scale_mul,
            ..spec
        }
    }
}

/// Allied unit kinds the player can place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    /// Basic melee defender.
    Militia,
}

impl UnitKind {
    /// Resource cost deducted when the unit is placed.
    #[must_use]
    pub const fn cost(self) -> (ResourceKind, u32) {
        match self {
            Self::Militia => (ResourceKind::Wood, 5),
        }
    }

    /// Combat statistics for the unit.
    #[must_use]
    pub const fn spec(self) -> AgentSpec {
        match self {
            Self::Militia => AgentSpec {
                max_health: Health::new(80),
                damage: 12,
                speed: 3.5,
                vision_radius: 25.0,
                attack_range: 2.0,
                attack_cooldown: Duration::from_millis(1_200),
                flee_threshold: Some(0.2),
                scale: 1.0,
            },
        }
    }
}

/// Events broadcast by the world and directors after each update pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// A terrain chunk entered residency.
    ChunkLoaded {
        /// Key of the generated chunk.
        key: ChunkKey,
    },
    /// A terrain chunk left residency and its owned state was disposed.
    ChunkEvicted {
        /// Key of the evicted chunk.
        key: ChunkKey,
    },
    /// A resource node was harvested to depletion.
    ResourceDepleted {
        /// Identifier of the depleted node.
        node: ResourceNodeId,
        /// Kind of resource yielded.
        kind: ResourceKind,
        /// Units yielded by the depleting interaction.
        amount: u32,
    },
    /// A depleted resource node restored itself.
    ResourceRespawned {
        /// Identifier of the restored node.
        node: ResourceNodeId,
    },
    /// The wave director created a hostile agent.
    EnemySpawned {
        /// Identifier assigned to the enemy.
        agent: AgentId,
        /// Breed selected for the spawn.
        breed: EnemyBreed,
    },
    /// A dead hostile agent was reclaimed from the roster.
    EnemyRemoved {
        /// Identifier of the removed enemy.
        agent: AgentId,
        /// Loot credited for the kill.
        loot: Loot,
    },
    /// The unit director placed an allied agent.
    AllyPlaced {
        /// Identifier assigned to the ally.
        agent: AgentId,
        /// Kind of unit placed.
        kind: UnitKind,
    },
    /// A dead allied agent was reclaimed from the roster.
    AllyRemoved {
        /// Identifier of the removed ally.
        agent: AgentId,
    },
    /// A new wave began spawning.
    WaveStarted {
        /// Monotonic wave number, starting at one.
        wave: u32,
        /// Total enemies the wave will produce.
        total: u32,
    },
    /// A wave finished, by clearing all enemies or by watchdog.
    WaveCompleted {
        /// Number of the completed wave.
        wave: u32,
        /// Resources credited for the completion.
        reward: WaveReward,
    },
    /// The objective absorbed damage this tick.
    ObjectiveDamaged {
        /// Health remaining after the damage.
        remaining: Health,
    },
    /// The objective's health crossed to zero. Emitted exactly once.
    ObjectiveDestroyed,
}

/// Inventory collaborator owned by the surrounding application. Directors
/// call it to grant rewards and gate placement cost; the core never owns
/// inventory state.
pub trait Inventory {
    /// Reports whether at least `amount` units of `kind` are held.
    fn has_item(&self, kind: ResourceKind, amount: u32) -> bool;
    /// Credits `amount` units of `kind`.
    fn add_item(&mut self, kind: ResourceKind, amount: u32);
    /// Debits `amount` units of `kind`; returns false (without mutating)
    /// when the balance is insufficient.
    fn remove_item(&mut self, kind: ResourceKind, amount: u32) -> bool;
}

/// Reference [`Inventory`] implementation backed by a counter per kind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stockpile {
    counts: std::collections::BTreeMap<ResourceKind, u32>,
}

impl Stockpile {
    /// Creates an empty stockpile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Units of `kind` currently held.
    #[must_use]
    pub fn count(&self, kind: ResourceKind) -> u32 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }
}

impl Inventory for Stockpile {
    fn has_item(&self, kind: ResourceKind, amount: u32) -> bool {
        self.count(kind) >= amount
    }

    fn add_item(&mut self, kind: ResourceKind, amount: u32) {
        let entry = self.counts.entry(kind).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    fn remove_item(&mut self, kind: ResourceKind, amount: u32) -> bool {
        let held = self.count(kind);
        if held < amount {
            return false;
        }
        let _ = self.counts.insert(kind, held - amount);
        true
    }
}

/// Optional physics collaborator. The simulation functions identically when
/// no implementation is supplied.
pub trait Physics {
    /// Builds a static collision body for a freshly generated chunk's
    /// height grid.
    fn create_terrain_body(
        &mut self,
        key: ChunkKey,
        heights: &[f64],
        resolution: usize,
        chunk_size: f64,
    );
    /// Releases the collision body owned by an evicted chunk.
    fn remove_terrain_body(&mut self, key: ChunkKey);
}

/// Reasons an allied unit placement request is rejected.
///
/// Rejection is a normal operation result surfaced to the caller, never a
/// process failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    /// The inventory does not hold the unit's resource cost.
    #[error("insufficient {kind:?}: {required} required")]
    InsufficientResources {
        /// Resource kind the cost is paid in.
        kind: ResourceKind,
        /// Units required by the unit kind.
        required: u32,
    },
    /// The requested position is not representable in the world.
    #[error("placement position is not finite")]
    InvalidPosition,
}

/// Reasons constructing a hostile agent can fail. Failures are consumed by
/// the wave director so wave accounting never desyncs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SpawnError {
    /// The resolved spawn position contained a non-finite component.
    #[error("spawn position is not finite")]
    NonFinitePosition,
}
