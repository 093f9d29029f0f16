//! Collider classification and type-pair handler dispatch.
//!
//! Every collider gets an immutable [`CollisionType`] when it is created.
//! Subscribers register for an unordered pair of types, or for every typed
//! contact. Repeated `Begin` notifications between the same two bodies are
//! suppressed for [`BEGIN_COOLDOWN`].

use std::{collections::HashMap, time::Duration};

use super::{
    BodyId, BodyPair, ColliderId, CollisionEvent, CollisionType, Contact, ContactPhase, TypePair,
};

/// Minimum time between two dispatched `Begin` events for the same body pair.
pub const BEGIN_COOLDOWN: Duration = Duration::from_millis(500);

/// Callback invoked for matching collision events.
pub type Handler = Box<dyn FnMut(&CollisionEvent, &mut DispatchScope) + Send + Sync>;

/// Token returned by a subscription, used to remove it again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

/// Handle given to handlers while a dispatch is running.
///
/// Removals requested here take effect once the dispatch has finished, so the
/// handler list is never mutated mid-iteration.
#[derive(Debug, Default)]
pub struct DispatchScope {
    removals: Vec<Subscription>,
}

impl DispatchScope {
    /// Remove a subscription after the current dispatch completes.
    pub fn unsubscribe(&mut self, subscription: Subscription) {
        self.removals.push(subscription);
    }
}

/// Result of handing one contact to the classifier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DispatchOutcome {
    /// Neither collider was classified.
    Skipped,
    /// A `Begin` arrived within the cooldown window.
    Suppressed,
    /// The event was delivered.
    Dispatched {
        /// The classified event.
        event: CollisionEvent,
        /// How many handlers ran.
        handlers: usize,
    },
}

impl DispatchOutcome {
    /// The classified event, if it was delivered.
    pub fn event(&self) -> Option<&CollisionEvent> {
        match self {
            DispatchOutcome::Dispatched { event, .. } => Some(event),
            _ => None,
        }
    }
}

struct Tag {
    body: BodyId,
    ty: CollisionType,
}

struct Entry {
    id: Subscription,
    /// `None` for global handlers.
    key: Option<TypePair>,
    handler: Handler,
}

/// Assigns semantic types to colliders and routes contacts to subscribers.
#[derive(Default)]
pub struct CollisionClassifier {
    tags: HashMap<ColliderId, Tag>,
    entries: Vec<Entry>,
    next_id: u64,
    last_begin: HashMap<BodyPair, Duration>,
}

impl CollisionClassifier {
    /// Create an empty classifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a type to a collider. Returns `false` if it was already typed.
    pub fn classify(&mut self, collider: ColliderId, body: BodyId, ty: CollisionType) -> bool {
        if let Some(existing) = self.tags.get(&collider) {
            tracing::warn!(
                ?collider,
                existing = ?existing.ty,
                requested = ?ty,
                "Collider already classified; keeping original type"
            );
            return false;
        }
        self.tags.insert(collider, Tag { body, ty });
        true
    }

    /// The type attached to a collider, if any.
    pub fn type_of(&self, collider: ColliderId) -> Option<CollisionType> {
        self.tags.get(&collider).map(|tag| tag.ty)
    }

    /// Number of classified colliders.
    pub fn classified_count(&self) -> usize {
        self.tags.len()
    }

    /// Register a handler for contacts between `a` and `b`, in either order.
    pub fn subscribe(
        &mut self,
        a: CollisionType,
        b: CollisionType,
        handler: impl FnMut(&CollisionEvent, &mut DispatchScope) + Send + Sync + 'static,
    ) -> Subscription {
        self.push_entry(Some(TypePair::new(a, b)), Box::new(handler))
    }

    /// Register a handler for every contact with at least one typed side.
    pub fn subscribe_global(
        &mut self,
        handler: impl FnMut(&CollisionEvent, &mut DispatchScope) + Send + Sync + 'static,
    ) -> Subscription {
        self.push_entry(None, Box::new(handler))
    }

    /// Remove a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != subscription);
        self.entries.len() != before
    }

    /// Number of live handlers.
    pub fn handler_count(&self) -> usize {
        self.entries.len()
    }

    fn push_entry(&mut self, key: Option<TypePair>, handler: Handler) -> Subscription {
        let id = Subscription(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry { id, key, handler });
        id
    }

    /// Classify a contact and run every matching handler.
    pub fn dispatch(&mut self, contact: &Contact) -> DispatchOutcome {
        let type_a = self.type_of(contact.collider_a);
        let type_b = self.type_of(contact.collider_b);
        if type_a.is_none() && type_b.is_none() {
            return DispatchOutcome::Skipped;
        }

        let pair = BodyPair::new(contact.body_a, contact.body_b);
        if contact.phase == ContactPhase::Begin {
            if let Some(&last) = self.last_begin.get(&pair)
                && contact.timestamp.saturating_sub(last) < BEGIN_COOLDOWN
            {
                tracing::trace!(?pair, "Begin suppressed by cooldown");
                return DispatchOutcome::Suppressed;
            }
            self.last_begin.insert(pair, contact.timestamp);
        }

        let event = CollisionEvent {
            collider_a: contact.collider_a,
            collider_b: contact.collider_b,
            body_a: contact.body_a,
            body_b: contact.body_b,
            type_a,
            type_b,
            phase: contact.phase,
            relative_speed: contact.relative_speed,
            contact_point: contact.contact_point,
            timestamp: contact.timestamp,
        };
        let key = event.type_pair();

        let mut scope = DispatchScope::default();
        let mut handlers = 0;
        for entry in &mut self.entries {
            // Pair handlers need both sides typed; globals take everything.
            let matches = match entry.key {
                Some(entry_key) => key == Some(entry_key),
                None => true,
            };
            if matches {
                (entry.handler)(&event, &mut scope);
                handlers += 1;
            }
        }

        if !scope.removals.is_empty() {
            self.entries
                .retain(|entry| !scope.removals.contains(&entry.id));
        }

        tracing::debug!(
            ?type_a,
            ?type_b,
            phase = ?contact.phase,
            handlers,
            "Collision dispatched"
        );
        DispatchOutcome::Dispatched { event, handlers }
    }

    /// Drop cooldown entries that can no longer suppress anything.
    pub fn prune_cooldowns(&mut self, now: Duration) {
        self.last_begin
            .retain(|_, last| now.saturating_sub(*last) < BEGIN_COOLDOWN);
    }

    /// Forget a single collider's type.
    pub fn forget_collider(&mut self, collider: ColliderId) {
        self.tags.remove(&collider);
    }

    /// Forget every collider attached to `body`, and its cooldown history.
    pub fn forget_body(&mut self, body: BodyId) {
        self.tags.retain(|_, tag| tag.body != body);
        self.last_begin.retain(|pair, _| !pair.contains(body));
    }
}
