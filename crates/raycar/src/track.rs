//! Track loading and the per-world simulation context.
//!
//! Scene objects are classified once, by name, when a track loads. The
//! resulting colliders and their owners are tracked by [`Simulation`] so they
//! can be torn down again without leaving stale classifier state behind.

use std::{collections::HashMap, time::Duration};

use crate::{
    collider::{ColliderBuilder, ColliderDescriptor, HeightfieldSource, MeshSource},
    collision::{
        BodyId, ColliderId, CollisionClassifier, CollisionType, Contact, DispatchOutcome, TypePair,
    },
    error::Result,
    feedback::{ContactSample, FeedbackDispatcher, FeedbackSink},
};

const RAIL_KEYWORDS: &[&str] = &["rail"];
const GROUND_KEYWORDS: &[&str] = &["terrain", "ground", "floor", "road", "track"];
const CHECKPOINT_KEYWORDS: &[&str] = &["checkpoint"];

/// Pick a collision type from an object's name and its parent's name.
///
/// Matching is a case-insensitive substring search. Rails take precedence
/// over ground, so `"track_rail_left"` is a rail. Objects that match nothing
/// get no collider.
pub fn classify_name(name: &str, parent: Option<&str>) -> Option<CollisionType> {
    let name = name.to_lowercase();
    let parent = parent.map(str::to_lowercase);
    let matches = |keywords: &[&str]| {
        keywords.iter().any(|keyword| {
            name.contains(keyword) || parent.as_deref().is_some_and(|p| p.contains(keyword))
        })
    };

    if matches(RAIL_KEYWORDS) {
        Some(CollisionType::Rail)
    } else if matches(GROUND_KEYWORDS) {
        Some(CollisionType::Ground)
    } else if matches(CHECKPOINT_KEYWORDS) {
        Some(CollisionType::Checkpoint)
    } else {
        None
    }
}

/// Colliders derived from one scene.
#[derive(Clone, Debug, Default)]
pub struct TrackColliders {
    /// One descriptor per classified object, in scene order.
    pub colliders: Vec<ColliderDescriptor>,
    /// Objects that matched no keyword.
    pub skipped: Vec<String>,
}

impl TrackColliders {
    /// Number of colliders of a type.
    pub fn count(&self, ty: CollisionType) -> usize {
        self.colliders
            .iter()
            .filter(|c| c.collision_type == ty)
            .count()
    }
}

/// Classify every object and build its collider.
///
/// `terrain` is used for every ground object when present. Fails only when an
/// object cannot be placed at all.
pub fn build_track(
    builder: &ColliderBuilder,
    objects: &[MeshSource],
    terrain: Option<&HeightfieldSource>,
) -> Result<TrackColliders> {
    let mut track = TrackColliders::default();
    for object in objects {
        let Some(ty) = classify_name(&object.name, object.parent_name.as_deref()) else {
            tracing::trace!(object = %object.name, "No collision keyword; skipping");
            track.skipped.push(object.name.clone());
            continue;
        };
        let descriptor = match ty {
            CollisionType::Ground => builder.terrain(object, terrain)?,
            _ => builder.build(object, ty)?,
        };
        track.colliders.push(descriptor);
    }

    tracing::info!(
        rails = track.count(CollisionType::Rail),
        ground = track.count(CollisionType::Ground),
        checkpoints = track.count(CollisionType::Checkpoint),
        skipped = track.skipped.len(),
        "Track colliders built"
    );
    Ok(track)
}

/// Owns collision classification and feedback for one physics world.
#[derive(Default)]
pub struct Simulation {
    /// Type tags and subscribers.
    pub classifier: CollisionClassifier,
    /// Impact feedback.
    pub feedback: FeedbackDispatcher,
    track: Vec<(ColliderId, BodyId)>,
    vehicles: HashMap<BodyId, Vec<ColliderId>>,
}

impl Simulation {
    /// Create an empty context with no colliders or subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a static track collider the engine has created.
    pub fn register_track_collider(
        &mut self,
        collider: ColliderId,
        body: BodyId,
        ty: CollisionType,
    ) -> bool {
        if !self.classifier.classify(collider, body, ty) {
            return false;
        }
        self.track.push((collider, body));
        true
    }

    /// Record a vehicle chassis collider.
    pub fn register_vehicle(&mut self, body: BodyId, collider: ColliderId) -> bool {
        if !self
            .classifier
            .classify(collider, body, CollisionType::Vehicle)
        {
            return false;
        }
        self.vehicles.entry(body).or_default().push(collider);
        true
    }

    /// Number of live track colliders.
    pub fn track_collider_count(&self) -> usize {
        self.track.len()
    }

    /// Number of live vehicles.
    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// Forget the track. Returns the colliders the engine must remove before
    /// the next step.
    pub fn dispose_track(&mut self) -> Vec<ColliderId> {
        let owned = std::mem::take(&mut self.track);
        for &(collider, body) in &owned {
            self.classifier.forget_collider(collider);
            self.classifier.forget_body(body);
        }
        tracing::info!(colliders = owned.len(), "Track disposed");
        owned.into_iter().map(|(collider, _)| collider).collect()
    }

    /// Forget a vehicle. Returns its colliders; empty if it was unknown.
    pub fn dispose_vehicle(&mut self, body: BodyId) -> Vec<ColliderId> {
        let colliders = self.vehicles.remove(&body).unwrap_or_default();
        self.classifier.forget_body(body);
        tracing::info!(?body, colliders = colliders.len(), "Vehicle disposed");
        colliders
    }

    /// Route one engine contact through the classifier, and into feedback for
    /// vehicle/rail contacts.
    pub fn handle_contact(
        &mut self,
        contact: &Contact,
        sample: &ContactSample,
        sink: &mut impl FeedbackSink,
    ) -> DispatchOutcome {
        let outcome = self.classifier.dispatch(contact);
        if let Some(event) = outcome.event()
            && event.type_pair() == Some(TypePair::new(CollisionType::Vehicle, CollisionType::Rail))
        {
            self.feedback.on_contact(event, sample, sink);
        }
        outcome
    }

    /// Drop cooldown state older than the window.
    pub fn end_step(&mut self, now: Duration) {
        self.classifier.prune_cooldowns(now);
    }
}
