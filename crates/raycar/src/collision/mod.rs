//! Semantic collision categories, broadphase groups and contact events.

mod classifier;

pub use classifier::{
    BEGIN_COOLDOWN, CollisionClassifier, DispatchOutcome, DispatchScope, Handler, Subscription,
};

use std::time::Duration;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Ground / terrain membership bit.
pub const GROUP_GROUND: u16 = 1;
/// Vehicle chassis membership bit.
pub const GROUP_VEHICLE: u16 = 1 << 1;
/// Track rail membership bit.
pub const GROUP_RAIL: u16 = 1 << 2;
/// Checkpoint sensor membership bit.
pub const GROUP_CHECKPOINT: u16 = 1 << 3;
/// Every group.
pub const GROUP_ALL: u16 = 0xFFFF;

/// Semantic category attached to every collider at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CollisionType {
    /// Drivable terrain.
    Ground,
    /// A vehicle chassis.
    Vehicle,
    /// Track boundary rail.
    Rail,
    /// Lap checkpoint trigger.
    Checkpoint,
    /// Anything else in the scene.
    Object,
}

impl CollisionType {
    /// Default broadphase groups for colliders of this type.
    pub fn groups(self) -> CollisionGroups {
        match self {
            CollisionType::Ground => {
                CollisionGroups::new(GROUP_GROUND, GROUP_VEHICLE | GROUP_RAIL)
            }
            CollisionType::Vehicle => CollisionGroups::new(GROUP_VEHICLE, GROUP_ALL),
            CollisionType::Rail => CollisionGroups::new(GROUP_RAIL, GROUP_VEHICLE),
            CollisionType::Checkpoint => CollisionGroups::new(GROUP_CHECKPOINT, GROUP_VEHICLE),
            CollisionType::Object => CollisionGroups::new(GROUP_ALL, GROUP_ALL),
        }
    }
}

/// Broadphase membership and filter bitmasks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollisionGroups {
    /// Groups this collider belongs to.
    pub membership: u16,
    /// Groups this collider collides with.
    pub filter: u16,
}

impl CollisionGroups {
    /// Create a group pair.
    pub const fn new(membership: u16, filter: u16) -> Self {
        Self { membership, filter }
    }

    /// Whether two colliders pass each other's filters.
    pub fn interacts_with(self, other: CollisionGroups) -> bool {
        self.membership & other.filter != 0 && other.membership & self.filter != 0
    }
}

/// Unordered pair of collision types, stored sorted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypePair(CollisionType, CollisionType);

impl TypePair {
    /// Build the canonical (sorted) key for two types.
    pub fn new(a: CollisionType, b: CollisionType) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    /// The two types, lowest first.
    pub fn types(self) -> (CollisionType, CollisionType) {
        (self.0, self.1)
    }

    /// Whether either side is `ty`.
    pub fn contains(self, ty: CollisionType) -> bool {
        self.0 == ty || self.1 == ty
    }
}

/// Engine handle of a collider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColliderId(pub u64);

/// Engine handle of a rigid body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyId(pub u64);

/// Unordered pair of bodies, stored sorted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyPair(BodyId, BodyId);

impl BodyPair {
    /// Build the canonical key for two bodies.
    pub fn new(a: BodyId, b: BodyId) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    /// Whether `body` is on either side.
    pub fn contains(self, body: BodyId) -> bool {
        self.0 == body || self.1 == body
    }
}

/// Whether a contact started or stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContactPhase {
    /// First frame of contact.
    Begin,
    /// Contact ended.
    End,
}

/// Raw contact notification drained from the engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    /// First collider.
    pub collider_a: ColliderId,
    /// Second collider.
    pub collider_b: ColliderId,
    /// Body owning `collider_a`.
    pub body_a: BodyId,
    /// Body owning `collider_b`.
    pub body_b: BodyId,
    /// Begin or end.
    pub phase: ContactPhase,
    /// Sum of the two bodies' speeds, zero if unknown.
    pub relative_speed: f32,
    /// World-space contact point, when known.
    pub contact_point: Option<Vec3>,
    /// Simulation time of the notification.
    pub timestamp: Duration,
}

impl Contact {
    /// A contact between two colliders that are their own bodies.
    pub fn between(a: u64, b: u64, phase: ContactPhase, timestamp: Duration) -> Self {
        Self {
            collider_a: ColliderId(a),
            collider_b: ColliderId(b),
            body_a: BodyId(a),
            body_b: BodyId(b),
            phase,
            relative_speed: 0.0,
            contact_point: None,
            timestamp,
        }
    }
}

/// A classified contact, as handed to subscribers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollisionEvent {
    /// First collider.
    pub collider_a: ColliderId,
    /// Second collider.
    pub collider_b: ColliderId,
    /// Body owning `collider_a`.
    pub body_a: BodyId,
    /// Body owning `collider_b`.
    pub body_b: BodyId,
    /// Type of `collider_a`, if classified.
    pub type_a: Option<CollisionType>,
    /// Type of `collider_b`, if classified.
    pub type_b: Option<CollisionType>,
    /// Begin or end.
    pub phase: ContactPhase,
    /// Sum of the two bodies' speeds, when the caller knows them.
    pub relative_speed: f32,
    /// World-space contact point, when known.
    pub contact_point: Option<Vec3>,
    /// Simulation time of the notification.
    pub timestamp: Duration,
}

impl CollisionEvent {
    /// The canonical type pair, when both sides are classified.
    pub fn type_pair(&self) -> Option<TypePair> {
        Some(TypePair::new(self.type_a?, self.type_b?))
    }

    /// The canonical body pair.
    pub fn body_pair(&self) -> BodyPair {
        BodyPair::new(self.body_a, self.body_b)
    }

    /// Whether either side has type `ty`.
    pub fn involves(&self, ty: CollisionType) -> bool {
        self.type_a == Some(ty) || self.type_b == Some(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_pair_is_unordered() {
        assert_eq!(
            TypePair::new(CollisionType::Rail, CollisionType::Vehicle),
            TypePair::new(CollisionType::Vehicle, CollisionType::Rail)
        );
    }

    #[test]
    fn test_group_invariants() {
        let rail = CollisionType::Rail.groups();
        let ground = CollisionType::Ground.groups();
        let vehicle = CollisionType::Vehicle.groups();
        assert_ne!(rail.filter & GROUP_VEHICLE, 0);
        assert_ne!(ground.filter & GROUP_VEHICLE, 0);
        assert_ne!(ground.filter & GROUP_RAIL, 0);
        assert!(vehicle.interacts_with(rail));
        assert!(vehicle.interacts_with(ground));
        assert!(vehicle.interacts_with(CollisionType::Checkpoint.groups()));
        // Rails don't collide with each other.
        assert!(!rail.interacts_with(rail));
    }
}
