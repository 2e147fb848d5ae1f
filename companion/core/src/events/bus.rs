//! In-process event bus

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::name::Pattern;

/// Callback invoked with the emitted event name
pub type EventCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Identity of a registration, returned by [`EventBus::on`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Subscription {
    id: SubscriptionId,
    pattern: Pattern,
    callback: EventCallback,
}

/// Publish/subscribe bus keyed by event name
///
/// Registrations are kept in insertion order. `emit` snapshots the matching
/// callbacks before invoking them, so a callback may subscribe, unsubscribe
/// or emit again without deadlocking; such changes apply to later emissions.
#[derive(Default)]
pub struct EventBus {
    subscriptions: RwLock<Vec<Subscription>>,
}

impl EventBus {
    /// Create an empty bus
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `pattern`
    pub fn on<F>(&self, pattern: impl Into<Pattern>, callback: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_shared(pattern, Arc::new(callback))
    }

    /// Register an already shared callback under `pattern`
    pub fn on_shared(&self, pattern: impl Into<Pattern>, callback: EventCallback) -> SubscriptionId {
        let id = SubscriptionId::next();
        let pattern = pattern.into();
        trace!(%id, %pattern, "subscribed");
        self.subscriptions.write().push(Subscription {
            id,
            pattern,
            callback,
        });
        id
    }

    /// Remove the registration `id` made under `pattern`
    ///
    /// Returns `false` if no such registration exists; other registrations
    /// under the same pattern are untouched.
    pub fn off(&self, pattern: impl Into<Pattern>, id: SubscriptionId) -> bool {
        let pattern = pattern.into();
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| !(s.id == id && s.pattern == pattern));
        before != subscriptions.len()
    }

    /// Deliver `event` to every matching registration, in registration order
    ///
    /// Emitting a name nobody listens for is not an error.
    pub fn emit(&self, event: &str) {
        let matching: Vec<EventCallback> = self
            .subscriptions
            .read()
            .iter()
            .filter(|s| s.pattern.matches(event))
            .map(|s| Arc::clone(&s.callback))
            .collect();

        trace!(event, listeners = matching.len(), "emit");

        for callback in matching {
            callback(event);
        }
    }

    /// Number of live registrations
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Patterns currently registered, in registration order
    #[must_use]
    pub fn patterns(&self) -> Vec<String> {
        self.subscriptions
            .read()
            .iter()
            .map(|s| s.pattern.to_string())
            .collect()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("patterns", &self.patterns())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |event: &str| sink.lock().push(event.to_string()))
    }

    #[test]
    fn test_wildcard_and_prefix_subscribers() {
        let bus = EventBus::new();
        let (any, any_cb) = recorder();
        let (time, time_cb) = recorder();
        let (exact, exact_cb) = recorder();

        bus.on("*", any_cb);
        bus.on("time.*", time_cb);
        bus.on("idle.random", exact_cb);

        bus.emit("time.morning");
        bus.emit("idle.random");
        bus.emit("festival.newyear");

        assert_eq!(
            *any.lock(),
            vec!["time.morning", "idle.random", "festival.newyear"]
        );
        assert_eq!(*time.lock(), vec!["time.morning"]);
        assert_eq!(*exact.lock(), vec!["idle.random"]);
    }

    #[test]
    fn test_emit_without_subscribers_is_noop() {
        let bus = EventBus::new();
        bus.emit("nobody.listens");
        assert_eq!(bus.subscription_count(), 0);
    }

    #[test]
    fn test_callbacks_run_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            bus.on("*", move |_| order.lock().push(label));
        }

        bus.emit("time.noon");
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_off_removes_only_matching_registration() {
        let bus = EventBus::new();
        let (a, a_cb) = recorder();
        let (b, b_cb) = recorder();

        let id_a = bus.on("time.*", a_cb);
        bus.on("time.*", b_cb);

        // Wrong pattern does not remove anything
        assert!(!bus.off("idle.*", id_a));
        assert!(bus.off("time.*", id_a));
        assert!(!bus.off("time.*", id_a));

        bus.emit("time.night");
        assert!(a.lock().is_empty());
        assert_eq!(*b.lock(), vec!["time.night"]);
    }

    #[test]
    fn test_callback_may_reenter_bus() {
        let bus = Arc::new(EventBus::new());
        let (seen, seen_cb) = recorder();
        bus.on("chain.second", seen_cb);

        let inner = Arc::clone(&bus);
        bus.on("chain.first", move |_| {
            inner.emit("chain.second");
            inner.on("late.*", |_| {});
        });

        bus.emit("chain.first");
        assert_eq!(*seen.lock(), vec!["chain.second"]);
        assert_eq!(bus.subscription_count(), 3);
    }

    #[test]
    fn test_patterns_lists_registrations() {
        let bus = EventBus::new();
        bus.on("time.*", |_| {});
        bus.on("*", |_| {});
        assert_eq!(bus.patterns(), vec!["time.*", "*"]);
    }
}
