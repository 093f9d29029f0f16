//! Drains Avian contact messages into the collision classifier.

use std::collections::HashMap;

use avian3d::prelude::*;
use bevy::prelude::*;
use raycar::{
    Contact, ContactPhase, FeedbackEvent, FeedbackSink,
    collision::{BodyId, BodyPair, ColliderId},
    feedback::{ContactSample, ScrapeHandle},
};

use super::SimulationState;

/// Feedback for audio and particle systems.
#[derive(Message, Clone, Debug)]
pub struct VehicleFeedback(pub FeedbackEvent);

/// Scrape loops currently playing, by body pair.
#[derive(Resource, Default)]
pub struct ActiveScrapes(HashMap<BodyPair, ScrapeHandle>);

/// Body components read when sampling a contact.
type BodyState = (
    &'static Position,
    Option<&'static Rotation>,
    Option<&'static ComputedCenterOfMass>,
    Option<&'static LinearVelocity>,
);

/// Engine handle for a collider entity.
pub fn collider_id(entity: Entity) -> ColliderId {
    ColliderId(entity.to_bits())
}

/// Engine handle for a body entity.
pub fn body_id(entity: Entity) -> BodyId {
    BodyId(entity.to_bits())
}

struct MessageSink<'a, 'w> {
    writer: &'a mut MessageWriter<'w, VehicleFeedback>,
}

impl FeedbackSink for MessageSink<'_, '_> {
    fn emit(&mut self, event: FeedbackEvent) {
        self.writer.write(VehicleFeedback(event));
    }
}

/// Classify every contact that started or ended this frame.
#[allow(clippy::too_many_arguments)]
pub fn dispatch_contacts(
    time: Res<Time>,
    mut simulation: ResMut<SimulationState>,
    mut started: MessageReader<CollisionStart>,
    mut ended: MessageReader<CollisionEnd>,
    collisions: Collisions,
    bodies: Query<BodyState>,
    mut feedback: MessageWriter<VehicleFeedback>,
) {
    let now = time.elapsed();
    let mut sink = MessageSink {
        writer: &mut feedback,
    };

    let begins = started
        .read()
        .map(|e| (e.collider1, e.collider2, e.body1, e.body2, ContactPhase::Begin));
    let ends = ended
        .read()
        .map(|e| (e.collider1, e.collider2, e.body1, e.body2, ContactPhase::End));

    for (collider1, collider2, body1, body2, phase) in begins.chain(ends) {
        let body1 = body1.unwrap_or(collider1);
        let body2 = body2.unwrap_or(collider2);

        let sample = sample_contact(&collisions, &bodies, collider1, collider2, body1, body2);
        let contact = Contact {
            collider_a: collider_id(collider1),
            collider_b: collider_id(collider2),
            body_a: body_id(body1),
            body_b: body_id(body2),
            phase,
            relative_speed: sample.strength(),
            contact_point: sample.manifold_point,
            timestamp: now,
        };
        simulation.0.handle_contact(&contact, &sample, &mut sink);
    }

    simulation.0.end_step(now);
}

/// World point of a contact anchor, which Avian stores relative to the body's
/// center of mass.
fn anchor_to_world(position: Vec3, rotation: Quat, local_center_of_mass: Vec3, anchor: Vec3) -> Vec3 {
    position + rotation * local_center_of_mass + anchor
}

fn sample_contact(
    collisions: &Collisions,
    bodies: &Query<BodyState>,
    collider1: Entity,
    collider2: Entity,
    body1: Entity,
    body2: Entity,
) -> ContactSample {
    // (position, center of mass in world space, velocity)
    let state = |entity: Entity| {
        bodies
            .get(entity)
            .map(|(position, rotation, center_of_mass, velocity)| {
                let rotation = rotation.map_or(Quat::IDENTITY, |r| r.0);
                let local_center = center_of_mass.map_or(Vec3::ZERO, |c| c.0);
                (
                    position.0,
                    anchor_to_world(position.0, rotation, local_center, Vec3::ZERO),
                    velocity.map_or(Vec3::ZERO, |v| v.0),
                )
            })
            .unwrap_or((Vec3::ZERO, Vec3::ZERO, Vec3::ZERO))
    };
    let (position_a, center_a, velocity_a) = state(body1);
    let (_, center_b, velocity_b) = state(body2);

    let point = collisions
        .get(collider1, collider2)
        .and_then(|pair| pair.manifolds.first())
        .and_then(|manifold| manifold.points.first());

    ContactSample {
        velocity_a,
        velocity_b,
        manifold_point: point.map(|p| p.point),
        anchor_a: point.map(|p| center_a + p.anchor1),
        anchor_b: point.map(|p| center_b + p.anchor2),
        position_a,
    }
}

/// Start and stop scrape loops, and log impacts.
///
/// Playback itself is left to whichever audio layer listens for
/// [`VehicleFeedback`]; this keeps the loop bookkeeping.
pub fn track_scrapes(
    mut feedback: MessageReader<VehicleFeedback>,
    mut scrapes: ResMut<ActiveScrapes>,
) {
    for VehicleFeedback(event) in feedback.read() {
        match event {
            FeedbackEvent::Impact {
                tier,
                strength,
                point,
                ..
            } => {
                tracing::info!(?tier, strength, ?point, "Rail impact");
            }
            FeedbackEvent::ScrapeStarted {
                handle,
                pair,
                volume,
            } => {
                if let Some(previous) = scrapes.0.insert(*pair, *handle) {
                    tracing::debug!(handle = previous.get(), "Replacing scrape loop");
                }
                tracing::debug!(handle = handle.get(), volume, "Scrape started");
            }
            FeedbackEvent::ContactEnded { pair } => {
                if let Some(handle) = scrapes.0.remove(pair) {
                    tracing::debug!(handle = handle.get(), "Scrape stopped");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    #[test]
    fn test_anchor_offsets_by_rotated_center_of_mass() {
        let position = Vec3::new(10.0, 0.0, 0.0);
        let rotation = Quat::from_rotation_y(FRAC_PI_2);
        // Local +X center of mass ends up along world -Z.
        let world = anchor_to_world(position, rotation, Vec3::X, Vec3::new(0.0, 0.5, 0.0));
        assert!(world.abs_diff_eq(Vec3::new(10.0, 0.5, -1.0), 1e-5));
    }

    #[test]
    fn test_anchor_at_origin_center_of_mass() {
        let world = anchor_to_world(Vec3::ONE, Quat::IDENTITY, Vec3::ZERO, Vec3::Y);
        assert_eq!(world, Vec3::new(1.0, 2.0, 1.0));
    }
}
