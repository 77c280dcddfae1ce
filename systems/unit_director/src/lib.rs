#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Allied defender placement and roster management.
//!
//! The unit director owns the allied roster. Placement is gated on the
//! player's inventory: the resource cost is debited atomically with the
//! spawn, so a rejected placement never mutates anything. Allied agents
//! allocate identifiers from a range disjoint from the hostile roster's,
//! keeping agent references unambiguous across directors.

use std::time::Duration;

use glam::DVec3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thornfall_core::{
    AgentId, Event, Inventory, PlacementError, Strike, TargetCandidate, Targetable, UnitKind,
    ALLIED_ID_BASE,
};
use thornfall_system_agent_ai::Agent;
use thornfall_world::ChunkStore;

/// Owner and driver of the allied agent roster.
pub struct UnitDirector {
    units: Vec<Agent>,
    rng: ChaCha8Rng,
    next_agent: u32,
}

impl UnitDirector {
    /// Creates an empty director with its deterministic seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            units: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_agent: ALLIED_ID_BASE,
        }
    }

    /// Units currently alive.
    #[must_use]
    pub fn alive(&self) -> usize {
        self.units.len()
    }

    /// Perception snapshots of the allied roster for hostile agents.
    #[must_use]
    pub fn candidates(&self) -> Vec<TargetCandidate> {
        self.units.iter().map(Agent::candidate).collect()
    }

    /// Places a unit at the requested position, debiting its cost.
    ///
    /// The position's height is snapped to the terrain; a placement outside
    /// residency lands on the flat default plane. Insufficient resources
    /// reject the request without debiting anything.
    pub fn try_place(
        &mut self,
        kind: UnitKind,
        position: DVec3,
        terrain: &ChunkStore,
        inventory: &mut dyn Inventory,
        out_events: &mut Vec<Event>,
    ) -> Result<AgentId, PlacementError> {
        if !position.x.is_finite() || !position.z.is_finite() {
            return Err(PlacementError::InvalidPosition);
        }

        let (cost_kind, cost) = kind.cost();
        if !inventory.remove_item(cost_kind, cost) {
            return Err(PlacementError::InsufficientResources {
                kind: cost_kind,
                required: cost,
            });
        }

        let id = AgentId::new(self.next_agent);
        self.next_agent += 1;

        let snapped = DVec3::new(
            position.x,
            terrain.height_at(position.x, position.z),
            position.z,
        );
        self.units.push(Agent::allied(id, kind.spec(), snapped));
        out_events.push(Event::AllyPlaced { agent: id, kind });
        Ok(id)
    }

    /// Applies routed damage to an owned unit. Unknown identifiers are
    /// ignored; the attacker's information may be one tick stale.
    pub fn apply_strike(&mut self, id: AgentId, amount: u32) {
        if let Some(unit) = self.units.iter_mut().find(|unit| unit.id() == id) {
            unit.take_damage(amount);
        }
    }

    /// Runs one simulation tick. `hostiles` are the opposing roster's
    /// perception snapshots; damage dealt by units leaves through
    /// `out_strikes` for the session to route.
    pub fn update(
        &mut self,
        dt: Duration,
        terrain: &ChunkStore,
        hostiles: &[TargetCandidate],
        out_events: &mut Vec<Event>,
        out_strikes: &mut Vec<Strike>,
    ) {
        for unit in &mut self.units {
            unit.update(
                dt,
                |x, z| terrain.height_at(x, z),
                hostiles,
                &mut self.rng,
                out_strikes,
            );
        }

        self.units.retain(|unit| {
            if unit.is_dead() {
                out_events.push(Event::AllyRemoved { agent: unit.id() });
                false
            } else {
                true
            }
        });
    }
}
