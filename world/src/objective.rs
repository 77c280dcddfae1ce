//! The defended structure hostile waves converge on.

use glam::DVec3;
use thornfall_core::{Health, Targetable};

/// Destructible objective with a fixed position and a single health pool.
/// One instance exists per game session; directors hold non-owning
/// references through [`Targetable`].
#[derive(Clone, Debug)]
pub struct Objective {
    position: DVec3,
    health: Health,
    max_health: Health,
    destroyed_edge: bool,
}

impl Objective {
    /// Creates the objective at its session-fixed position.
    #[must_use]
    pub fn new(position: DVec3, max_health: Health) -> Self {
        Self {
            position,
            health: max_health,
            max_health,
            destroyed_edge: false,
        }
    }

    /// Full health pool configured at creation.
    #[must_use]
    pub const fn max_health(&self) -> Health {
        self.max_health
    }

    /// Reports and clears the destruction edge. Returns true exactly once,
    /// on the tick health crossed to zero.
    pub fn take_destroyed_edge(&mut self) -> bool {
        let edge = self.destroyed_edge;
        self.destroyed_edge = false;
        edge
    }
}

impl Targetable for Objective {
    fn position(&self) -> DVec3 {
        self.position
    }

    fn health(&self) -> Health {
        self.health
    }

    fn take_damage(&mut self, amount: u32) {
        if self.is_dead() {
            return;
        }
        self.health = self.health.damaged(amount);
        if self.health.is_zero() {
            self.destroyed_edge = true;
        }
    }

    fn is_dead(&self) -> bool {
        self.health.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destruction_edge_fires_exactly_once() {
        let mut objective = Objective::new(DVec3::ZERO, Health::new(1_000));
        for _ in 0..9 {
            objective.take_damage(100);
            assert!(!objective.is_dead());
            assert!(!objective.take_destroyed_edge());
        }

        objective.take_damage(100);
        assert!(objective.is_dead());
        assert!(objective.take_destroyed_edge());
        assert!(!objective.take_destroyed_edge());

        objective.take_damage(50);
        assert_eq!(objective.health(), Health::new(0));
        assert!(!objective.take_destroyed_edge(), "no double-death");
    }

    #[test]
    fn overkill_clamps_at_zero() {
        let mut objective = Objective::new(DVec3::ZERO, Health::new(40));
        objective.take_damage(9_999);
        assert_eq!(objective.health(), Health::new(0));
        assert!(objective.take_destroyed_edge());
    }
}
