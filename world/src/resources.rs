//! Harvestable resource nodes with depletion and timed respawn.

use std::time::Duration;

use glam::DVec3;
use thornfall_core::{Health, ResourceKind, ResourceNodeId};

/// Full health pool of a freshly grown node.
pub const NODE_MAX_HEALTH: Health = Health::new(100);
/// Hit points removed by a single interaction.
pub const INTERACT_DECREMENT: u32 = 25;
/// Units yielded by a non-depleting interaction.
pub const PARTIAL_YIELD: u32 = 1;
/// Grow-back scale progress per second after a respawn.
pub const GROWTH_RATE: f64 = 0.5;

/// Lifecycle state of a resource node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeStatus {
    /// Harvestable.
    Active,
    /// Exhausted; waiting on the respawn timer.
    Depleted,
}

/// Resources yielded by a successful interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Harvest {
    /// Kind of resource yielded.
    pub kind: ResourceKind,
    /// Units yielded.
    pub amount: u32,
}

/// Result of an interaction attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InteractOutcome {
    /// The node could not be interacted with; nothing happened.
    Rejected,
    /// The node survived the interaction and yielded a partial amount.
    Harvested(Harvest),
    /// The interaction exhausted the node, yielding its full amount.
    Depleted(Harvest),
}

/// A harvestable world object: a tree or a rock.
#[derive(Clone, Debug)]
pub struct ResourceNode {
    id: ResourceNodeId,
    kind: ResourceKind,
    position: DVec3,
    health: Health,
    status: NodeStatus,
    scale: f64,
}

impl ResourceNode {
    /// Creates a fully grown node at the provided position.
    #[must_use]
    pub fn new(id: ResourceNodeId, kind: ResourceKind, position: DVec3) -> Self {
        Self {
            id,
            kind,
            position,
            health: NODE_MAX_HEALTH,
            status: NodeStatus::Active,
            scale: 1.0,
        }
    }

    /// Identifier assigned by the chunk store.
    #[must_use]
    pub const fn id(&self) -> ResourceNodeId {
        self.id
    }

    /// Kind of resource the node yields.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// World position fixed at creation.
    #[must_use]
    pub const fn position(&self) -> DVec3 {
        self.position
    }

    /// Remaining node health.
    #[must_use]
    pub const fn health(&self) -> Health {
        self.health
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn status(&self) -> NodeStatus {
        self.status
    }

    /// Grow-back scale in `[0, 1]`. Cosmetic: interaction is re-enabled on
    /// respawn regardless of scale.
    #[must_use]
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// Units yielded when the node depletes.
    #[must_use]
    pub const fn resource_amount(&self) -> u32 {
        match self.kind {
            ResourceKind::Wood => 5,
            ResourceKind::Stone => 3,
        }
    }

    /// Delay before a depleted node grows back.
    #[must_use]
    pub const fn respawn_delay(&self) -> Duration {
        match self.kind {
            ResourceKind::Wood => Duration::from_secs(30),
            ResourceKind::Stone => Duration::from_secs(45),
        }
    }

    /// Whether an interaction would currently be accepted.
    #[must_use]
    pub fn can_interact(&self) -> bool {
        self.status == NodeStatus::Active
    }

    /// Attempts a harvest interaction. Rejected interactions are a no-op,
    /// never an error.
    pub fn interact(&mut self) -> InteractOutcome {
        if !self.can_interact() {
            return InteractOutcome::Rejected;
        }

        self.health = self.health.damaged(INTERACT_DECREMENT);
        if self.health.is_zero() {
            self.status = NodeStatus::Depleted;
            InteractOutcome::Depleted(Harvest {
                kind: self.kind,
                amount: self.resource_amount(),
            })
        } else {
            InteractOutcome::Harvested(Harvest {
                kind: self.kind,
                amount: PARTIAL_YIELD,
            })
        }
    }

    /// Restores the node after its respawn delay elapsed. Health resets in
    /// full and the grow-back animation starts from zero.
    pub(crate) fn respawn(&mut self) {
        self.health = NODE_MAX_HEALTH;
        self.status = NodeStatus::Active;
        self.scale = 0.0;
    }

    /// Advances the grow-back scale animation.
    pub(crate) fn grow(&mut self, dt: Duration) {
        if self.scale < 1.0 {
            self.scale = (self.scale + GROWTH_RATE * dt.as_secs_f64()).min(1.0);
        }
    }
}
