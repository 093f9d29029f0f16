//! Impact classification and feedback events for audio and particles.
//!
//! The dispatcher never plays anything. It turns a classified contact plus a
//! velocity sample into [`FeedbackEvent`]s for whoever owns the speakers and
//! the particle pools.

use std::time::Duration;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::collision::{BodyPair, CollisionEvent, ContactPhase};

/// Strength above which a contact is a light impact.
pub const LIGHT_THRESHOLD: f32 = 2.0;
/// Strength above which a contact is a medium impact.
pub const MEDIUM_THRESHOLD: f32 = 5.0;
/// Strength above which a contact is a heavy impact.
pub const HEAVY_THRESHOLD: f32 = 10.0;

/// Upper bound on the scrape loop volume.
pub const SCRAPE_MAX_VOLUME: f32 = 0.3;

/// Severity of an impact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ImpactTier {
    /// Just above the audible threshold.
    Light,
    /// A solid knock.
    Medium,
    /// A crash.
    Heavy,
}

impl ImpactTier {
    /// Suggested one-shot volume.
    pub fn volume(self) -> f32 {
        match self {
            ImpactTier::Light => 0.4,
            ImpactTier::Medium => 0.6,
            ImpactTier::Heavy => 0.8,
        }
    }

    /// Particle bursts spawned at the contact point.
    pub fn particles(self) -> Vec<ParticleBurst> {
        match self {
            ImpactTier::Light => vec![ParticleBurst::spark(10, 0.05, 400)],
            ImpactTier::Medium => vec![ParticleBurst::spark(20, 0.1, 600)],
            ImpactTier::Heavy => vec![
                ParticleBurst::spark(30, 0.15, 800),
                ParticleBurst {
                    kind: ParticleKind::Smoke,
                    count: 15,
                    speed: 0.05,
                    lifetime: Duration::from_millis(1500),
                },
            ],
        }
    }
}

/// Classify an impact strength. Thresholds are strict.
pub fn classify_impact(strength: f32) -> Option<ImpactTier> {
    if strength > HEAVY_THRESHOLD {
        Some(ImpactTier::Heavy)
    } else if strength > MEDIUM_THRESHOLD {
        Some(ImpactTier::Medium)
    } else if strength > LIGHT_THRESHOLD {
        Some(ImpactTier::Light)
    } else {
        None
    }
}

/// Playback rate for an impact sound.
pub fn playback_rate(strength: f32) -> f32 {
    (0.8 + strength / 20.0).clamp(0.6, 1.5)
}

/// Particle material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticleKind {
    /// Hot, falling sparks.
    Spark,
    /// Slow, rising smoke.
    Smoke,
}

/// A one-shot particle emission.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleBurst {
    /// What to emit.
    pub kind: ParticleKind,
    /// Number of particles.
    pub count: u32,
    /// Spread of initial particle velocity.
    pub speed: f32,
    /// How long each particle lives.
    pub lifetime: Duration,
}

impl ParticleBurst {
    fn spark(count: u32, speed: f32, lifetime_ms: u64) -> Self {
        Self {
            kind: ParticleKind::Spark,
            count,
            speed,
            lifetime: Duration::from_millis(lifetime_ms),
        }
    }
}

/// Opaque identifier for a looping scrape sound owned by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScrapeHandle(u64);

impl ScrapeHandle {
    /// Raw value, for keying caller-side maps.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Engine-side data about a contact that the classifier does not carry.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ContactSample {
    /// Linear velocity of body A.
    pub velocity_a: Vec3,
    /// Linear velocity of body B.
    pub velocity_b: Vec3,
    /// World-space point from the contact manifold, if any.
    pub manifold_point: Option<Vec3>,
    /// World-space contact anchor on body A.
    pub anchor_a: Option<Vec3>,
    /// World-space contact anchor on body B.
    pub anchor_b: Option<Vec3>,
    /// World position of body A.
    pub position_a: Vec3,
}

impl ContactSample {
    /// Impact strength: the sum of both body speeds.
    ///
    /// Not the relative velocity; glancing contacts between two fast bodies
    /// read as hard hits.
    pub fn strength(&self) -> f32 {
        self.velocity_a.length() + self.velocity_b.length()
    }

    /// Best available contact point.
    pub fn resolve_point(&self) -> Vec3 {
        self.manifold_point
            .or(self.anchor_b)
            .or(self.anchor_a)
            .unwrap_or_else(|| {
                tracing::debug!("No contact geometry; using body position");
                self.position_a
            })
    }
}

/// Something for audio and particle systems to act on.
#[derive(Clone, Debug, PartialEq)]
pub enum FeedbackEvent {
    /// A one-shot impact.
    Impact {
        /// Severity bucket.
        tier: ImpactTier,
        /// Impact strength in m/s.
        strength: f32,
        /// Where to play the sound and spawn particles.
        point: Vec3,
        /// Contact phase that produced the impact.
        phase: ContactPhase,
        /// Bodies involved.
        pair: BodyPair,
        /// Sound volume in `[0, 1]`.
        volume: f32,
        /// Sound pitch multiplier.
        playback_rate: f32,
        /// Particle bursts to spawn at `point`.
        particles: Vec<ParticleBurst>,
    },
    /// Start a looping scrape; stop it when `ContactEnded` arrives for `pair`.
    ScrapeStarted {
        /// Identifies this scrape loop.
        handle: ScrapeHandle,
        /// Bodies involved.
        pair: BodyPair,
        /// Loop volume, at most 0.3.
        volume: f32,
    },
    /// Contact between `pair` ended.
    ContactEnded {
        /// Bodies that separated.
        pair: BodyPair,
    },
}

/// Receiver for feedback events.
pub trait FeedbackSink {
    /// Accept one event.
    fn emit(&mut self, event: FeedbackEvent);
}

impl FeedbackSink for Vec<FeedbackEvent> {
    fn emit(&mut self, event: FeedbackEvent) {
        self.push(event);
    }
}

/// Turns contacts into feedback events.
#[derive(Debug, Default)]
pub struct FeedbackDispatcher {
    next_handle: u64,
}

impl FeedbackDispatcher {
    /// Create a dispatcher whose scrape handles start at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle one contact phase.
    ///
    /// Strength is the event's `relative_speed` when the engine filled it in,
    /// otherwise the sample's sum of body speeds. Returns the impact tier, if
    /// the contact was strong enough to have one.
    pub fn on_contact(
        &mut self,
        event: &CollisionEvent,
        sample: &ContactSample,
        sink: &mut impl FeedbackSink,
    ) -> Option<ImpactTier> {
        let pair = event.body_pair();
        let strength = if event.relative_speed.is_finite() && event.relative_speed > 0.0 {
            event.relative_speed
        } else {
            sample.strength()
        };
        let tier = classify_impact(strength);

        if let Some(tier) = tier {
            let point = event
                .contact_point
                .unwrap_or_else(|| sample.resolve_point());
            tracing::debug!(?tier, strength, ?point, phase = ?event.phase, "Impact");
            sink.emit(FeedbackEvent::Impact {
                tier,
                strength,
                point,
                phase: event.phase,
                pair,
                volume: tier.volume(),
                playback_rate: playback_rate(strength),
                particles: tier.particles(),
            });
        }

        match event.phase {
            ContactPhase::Begin if tier.is_some() => {
                let handle = ScrapeHandle(self.next_handle);
                self.next_handle += 1;
                sink.emit(FeedbackEvent::ScrapeStarted {
                    handle,
                    pair,
                    volume: SCRAPE_MAX_VOLUME.min(strength / 20.0),
                });
            }
            ContactPhase::Begin => {}
            ContactPhase::End => sink.emit(FeedbackEvent::ContactEnded { pair }),
        }

        tier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{BodyId, ColliderId, CollisionType};

    fn event(phase: ContactPhase) -> CollisionEvent {
        CollisionEvent {
            collider_a: ColliderId(1),
            collider_b: ColliderId(2),
            body_a: BodyId(10),
            body_b: BodyId(20),
            type_a: Some(CollisionType::Vehicle),
            type_b: Some(CollisionType::Rail),
            phase,
            relative_speed: 0.0,
            contact_point: None,
            timestamp: Duration::ZERO,
        }
    }

    fn moving(speed: f32) -> ContactSample {
        ContactSample {
            velocity_a: Vec3::new(0.0, 0.0, -speed),
            ..Default::default()
        }
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(classify_impact(1.9), None);
        assert_eq!(classify_impact(2.0), None);
        assert_eq!(classify_impact(2.1), Some(ImpactTier::Light));
        assert_eq!(classify_impact(5.1), Some(ImpactTier::Medium));
        assert_eq!(classify_impact(10.1), Some(ImpactTier::Heavy));
        assert_eq!(classify_impact(f32::NAN), None);
    }

    #[test]
    fn test_event_speed_overrides_sample() {
        let mut dispatcher = FeedbackDispatcher::new();
        let mut events = Vec::new();
        let mut begin = event(ContactPhase::Begin);
        begin.relative_speed = 12.0;

        let tier = dispatcher.on_contact(&begin, &ContactSample::default(), &mut events);
        assert_eq!(tier, Some(ImpactTier::Heavy));
        let FeedbackEvent::Impact { strength, .. } = &events[0] else {
            panic!("expected an impact");
        };
        assert_eq!(*strength, 12.0);
    }

    #[test]
    fn test_unusable_event_speed_falls_back_to_sample() {
        let mut dispatcher = FeedbackDispatcher::new();
        let mut events = Vec::new();
        let mut begin = event(ContactPhase::Begin);
        begin.relative_speed = f32::NAN;

        let tier = dispatcher.on_contact(&begin, &moving(6.0), &mut events);
        assert_eq!(tier, Some(ImpactTier::Medium));
    }

    #[test]
    fn test_strength_is_sum_of_speeds() {
        let sample = ContactSample {
            velocity_a: Vec3::new(3.0, 0.0, 0.0),
            velocity_b: Vec3::new(-3.0, 0.0, 0.0),
            ..Default::default()
        };
        assert_eq!(sample.strength(), 6.0);
    }

    #[test]
    fn test_point_fallback_order() {
        let mut sample = ContactSample {
            manifold_point: Some(Vec3::X),
            anchor_a: Some(Vec3::Y),
            anchor_b: Some(Vec3::Z),
            position_a: Vec3::ONE,
            ..Default::default()
        };
        assert_eq!(sample.resolve_point(), Vec3::X);
        sample.manifold_point = None;
        assert_eq!(sample.resolve_point(), Vec3::Z);
        sample.anchor_b = None;
        assert_eq!(sample.resolve_point(), Vec3::Y);
        sample.anchor_a = None;
        assert_eq!(sample.resolve_point(), Vec3::ONE);
    }

    #[test]
    fn test_quiet_contact_emits_nothing() {
        let mut dispatcher = FeedbackDispatcher::new();
        let mut events = Vec::new();
        let tier = dispatcher.on_contact(&event(ContactPhase::Begin), &moving(1.9), &mut events);
        assert_eq!(tier, None);
        assert!(events.is_empty());
    }

    #[test]
    fn test_heavy_begin_emits_impact_and_scrape() {
        let mut dispatcher = FeedbackDispatcher::new();
        let mut events = Vec::new();
        let tier = dispatcher.on_contact(&event(ContactPhase::Begin), &moving(10.1), &mut events);
        assert_eq!(tier, Some(ImpactTier::Heavy));
        assert_eq!(events.len(), 2);

        let FeedbackEvent::Impact {
            volume,
            playback_rate,
            particles,
            ..
        } = &events[0]
        else {
            panic!("expected impact, got {:?}", events[0]);
        };
        assert_eq!(*volume, 0.8);
        assert!((playback_rate - 1.305).abs() < 1e-5);
        assert_eq!(particles.len(), 2);
        assert_eq!(particles[1].kind, ParticleKind::Smoke);

        let FeedbackEvent::ScrapeStarted { volume, pair, .. } = &events[1] else {
            panic!("expected scrape, got {:?}", events[1]);
        };
        assert_eq!(*volume, SCRAPE_MAX_VOLUME);
        assert_eq!(*pair, BodyPair::new(BodyId(20), BodyId(10)));
    }

    #[test]
    fn test_light_scrape_volume_scales() {
        let mut dispatcher = FeedbackDispatcher::new();
        let mut events = Vec::new();
        dispatcher.on_contact(&event(ContactPhase::Begin), &moving(4.0), &mut events);
        let FeedbackEvent::ScrapeStarted { volume, .. } = &events[1] else {
            panic!("expected scrape, got {:?}", events[1]);
        };
        assert!((volume - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_end_reports_pair_without_scrape() {
        let mut dispatcher = FeedbackDispatcher::new();
        let mut events = Vec::new();
        dispatcher.on_contact(&event(ContactPhase::End), &moving(6.0), &mut events);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            FeedbackEvent::Impact {
                tier: ImpactTier::Medium,
                phase: ContactPhase::End,
                ..
            }
        ));
        assert!(matches!(events[1], FeedbackEvent::ContactEnded { .. }));
    }

    #[test]
    fn test_scrape_handles_are_unique() {
        let mut dispatcher = FeedbackDispatcher::new();
        let mut events = Vec::new();
        dispatcher.on_contact(&event(ContactPhase::Begin), &moving(3.0), &mut events);
        dispatcher.on_contact(&event(ContactPhase::Begin), &moving(3.0), &mut events);
        let handles: Vec<ScrapeHandle> = events
            .iter()
            .filter_map(|e| match e {
                FeedbackEvent::ScrapeStarted { handle, .. } => Some(*handle),
                _ => None,
            })
            .collect();
        assert_eq!(handles.len(), 2);
        assert_ne!(handles[0], handles[1]);
    }

    #[test]
    fn test_event_contact_point_wins() {
        let mut dispatcher = FeedbackDispatcher::new();
        let mut events = Vec::new();
        let mut begin = event(ContactPhase::Begin);
        begin.contact_point = Some(Vec3::new(5.0, 0.0, 0.0));
        let sample = ContactSample {
            manifold_point: Some(Vec3::X),
            ..moving(3.0)
        };
        dispatcher.on_contact(&begin, &sample, &mut events);
        assert!(matches!(
            events[0],
            FeedbackEvent::Impact { point, .. } if point == Vec3::new(5.0, 0.0, 0.0)
        ));
    }
}
