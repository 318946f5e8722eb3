//! Kind-routed event bus.
//!
//! Observers register per [`EventKind`]; a publish invokes every current
//! observer of the event's kind in registration order, on the publishing
//! task. Observers are arbitrary user code, so each invocation runs under
//! `catch_unwind`: a panicking observer is logged and skipped, and delivery
//! continues with the next one.
//!
//! # Example
//!
//! ```ignore
//! let bus = EventBus::new();
//! let sub = bus.subscribe(EventKind::Chat, |event| {
//!     println!("chat: {:?}", event.chat_message());
//! });
//! bus.publish(&SessionEvent::chat("Steve", "hello"));
//! bus.unsubscribe(&sub);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{error, trace};

use crate::identifiers::SubscriptionId;
use crate::protocol::{EventKind, SessionEvent};

// ============================================================================
// Types
// ============================================================================

/// Observer callback.
pub type EventCallback = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Registrations per kind, in registration order.
type DispatchTable = FxHashMap<EventKind, Vec<Registration>>;

struct Registration {
    id: SubscriptionId,
    callback: EventCallback,
}

// ============================================================================
// Subscription
// ============================================================================

/// Handle identifying one registration, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    kind: EventKind,
    id: SubscriptionId,
}

impl Subscription {
    /// Returns the subscribed kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Returns the registration ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

// ============================================================================
// EventBus
// ============================================================================

/// Publish/subscribe registry shared by the client's components.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    table: Arc<Mutex<DispatchTable>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.total_subscribers())
            .finish()
    }
}

impl EventBus {
    /// Creates an empty bus.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for events of `kind`.
    ///
    /// Registering the same closure twice yields two independent
    /// registrations that both fire.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId::next();
        self.table
            .lock()
            .entry(kind)
            .or_default()
            .push(Registration {
                id,
                callback: Arc::new(callback),
            });

        trace!(%kind, subscription = %id, "Subscribed");
        Subscription { kind, id }
    }

    /// Removes a registration.
    ///
    /// Returns `false` if it was already removed.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let mut table = self.table.lock();
        let Some(registrations) = table.get_mut(&subscription.kind) else {
            return false;
        };

        let before = registrations.len();
        registrations.retain(|r| r.id != subscription.id);
        let removed = registrations.len() != before;

        if registrations.is_empty() {
            table.remove(&subscription.kind);
        }

        if removed {
            trace!(kind = %subscription.kind, subscription = %subscription.id, "Unsubscribed");
        }
        removed
    }

    /// Delivers `event` to every observer of its kind.
    ///
    /// Observers run after the registry lock is released, against a
    /// snapshot taken at publish time: registrations added or removed by an
    /// observer take effect from the next publish.
    ///
    /// Returns the number of observers that completed without panicking.
    pub fn publish(&self, event: &SessionEvent) -> usize {
        let kind = event.kind();
        let snapshot: Vec<(SubscriptionId, EventCallback)> = match self.table.lock().get(&kind) {
            Some(registrations) => registrations
                .iter()
                .map(|r| (r.id, Arc::clone(&r.callback)))
                .collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for (id, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    error!(
                        %kind,
                        subscription = %id,
                        panic = panic_message(payload.as_ref()),
                        "Listener error"
                    );
                }
            }
        }

        delivered
    }

    /// Returns the number of observers registered for `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.table.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Returns the number of observers across all kinds.
    #[must_use]
    pub fn total_subscribers(&self) -> usize {
        self.table.lock().values().map(Vec::len).sum()
    }
}

/// Extracts a printable message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU64, Ordering};

    use proptest::prelude::*;

    fn recorder(bus: &EventBus, kind: EventKind) -> (Subscription, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sub = bus.subscribe(kind, move |event| {
            seen_clone
                .lock()
                .push(event.chat_message().unwrap_or_default().to_string());
        });
        (sub, seen)
    }

    #[test]
    fn test_delivers_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let order = Arc::clone(&order);
            bus.subscribe(EventKind::Chat, move |_| order.lock().push(n));
        }

        assert_eq!(bus.publish(&SessionEvent::chat("a", "b")), 3);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_routes_by_kind() {
        let bus = EventBus::new();
        let (_, chats) = recorder(&bus, EventKind::Chat);

        assert_eq!(bus.publish(&SessionEvent::Death), 0);
        bus.publish(&SessionEvent::chat("a", "hello"));

        assert_eq!(*chats.lock(), vec!["hello".to_string()]);
    }

    #[test]
    fn test_duplicate_registrations_both_fire() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU64::new(0));
        let callback = {
            let count = Arc::clone(&count);
            move |_: &SessionEvent| {
                count.fetch_add(1, Ordering::SeqCst);
            }
        };

        bus.subscribe(EventKind::Death, callback.clone());
        bus.subscribe(EventKind::Death, callback);
        bus.publish(&SessionEvent::Death);

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let bus = EventBus::new();
        let (sub, seen) = recorder(&bus, EventKind::Chat);

        assert!(bus.unsubscribe(&sub));
        assert!(!bus.unsubscribe(&sub));
        bus.publish(&SessionEvent::chat("a", "late"));

        assert!(seen.lock().is_empty());
        assert_eq!(bus.total_subscribers(), 0);
    }

    #[test]
    fn test_unsubscribe_removes_only_that_registration() {
        let bus = EventBus::new();
        let (first, first_seen) = recorder(&bus, EventKind::Chat);
        let (_, second_seen) = recorder(&bus, EventKind::Chat);

        bus.unsubscribe(&first);
        bus.publish(&SessionEvent::chat("a", "x"));

        assert!(first_seen.lock().is_empty());
        assert_eq!(second_seen.lock().len(), 1);
        assert_eq!(bus.subscriber_count(EventKind::Chat), 1);
    }

    #[test]
    fn test_panicking_observer_is_isolated() {
        let bus = EventBus::new();
        bus.subscribe(EventKind::Chat, |_| panic!("observer blew up"));
        let (_, seen) = recorder(&bus, EventKind::Chat);

        let delivered = bus.publish(&SessionEvent::chat("a", "still delivered"));

        assert_eq!(delivered, 1);
        assert_eq!(*seen.lock(), vec!["still delivered".to_string()]);
    }

    #[test]
    fn test_subscribe_during_publish_applies_next_time() {
        let bus = EventBus::new();
        let late_hits = Arc::new(AtomicU64::new(0));
        let bus_clone = bus.clone();
        let late_clone = Arc::clone(&late_hits);

        bus.subscribe(EventKind::Chat, move |_| {
            let late = Arc::clone(&late_clone);
            bus_clone.subscribe(EventKind::Chat, move |_| {
                late.fetch_add(1, Ordering::SeqCst);
            });
        });

        bus.publish(&SessionEvent::chat("a", "1"));
        assert_eq!(late_hits.load(Ordering::SeqCst), 0);

        bus.publish(&SessionEvent::chat("a", "2"));
        assert_eq!(late_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_observer_can_unsubscribe_itself() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicU64::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let sub = {
            let bus_inner = bus.clone();
            let hits = Arc::clone(&hits);
            let slot = Arc::clone(&slot);
            bus.subscribe(EventKind::Health, move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
                if let Some(sub) = slot.lock().take() {
                    bus_inner.unsubscribe(&sub);
                }
            })
        };
        *slot.lock() = Some(sub);

        bus.publish(&SessionEvent::Health(Default::default()));
        bus.publish(&SessionEvent::Health(Default::default()));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(EventKind::Health), 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Subscribe { kind: usize, panics: bool },
        Unsubscribe(usize),
        Publish(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..EventKind::ALL.len(), any::<bool>())
                .prop_map(|(kind, panics)| Op::Subscribe { kind, panics }),
            (0..16usize).prop_map(Op::Unsubscribe),
            (0..EventKind::ALL.len()).prop_map(Op::Publish),
        ]
    }

    fn event_of(kind: EventKind) -> SessionEvent {
        match kind {
            EventKind::Connected => SessionEvent::Connected,
            EventKind::Chat => SessionEvent::chat("p", "m"),
            EventKind::Health => SessionEvent::Health(Default::default()),
            EventKind::Death => SessionEvent::Death,
            EventKind::End => SessionEvent::End { reason: "r".into() },
            EventKind::Error => SessionEvent::Error { message: "e".into() },
        }
    }

    struct Tracked {
        sub: Subscription,
        kind: EventKind,
        active: bool,
        expected: Vec<u64>,
        received: Arc<Mutex<Vec<u64>>>,
    }

    proptest! {
        #[test]
        fn prop_subscriber_sees_exactly_its_window(ops in prop::collection::vec(op_strategy(), 0..64)) {
            let bus = EventBus::new();
            let seq = Arc::new(AtomicU64::new(0));
            let mut tracked: Vec<Tracked> = Vec::new();

            for op in ops {
                match op {
                    Op::Subscribe { kind, panics } => {
                        let kind = EventKind::ALL[kind];
                        let received = Arc::new(Mutex::new(Vec::new()));
                        let received_clone = Arc::clone(&received);
                        let seq_clone = Arc::clone(&seq);
                        let sub = bus.subscribe(kind, move |_| {
                            received_clone.lock().push(seq_clone.load(Ordering::SeqCst));
                            if panics {
                                panic!("property observer panic");
                            }
                        });
                        tracked.push(Tracked { sub, kind, active: true, expected: Vec::new(), received });
                    }
                    Op::Unsubscribe(index) => {
                        if let Some(t) = tracked.get_mut(index) {
                            let removed = bus.unsubscribe(&t.sub);
                            prop_assert_eq!(removed, t.active);
                            t.active = false;
                        }
                    }
                    Op::Publish(kind) => {
                        let kind = EventKind::ALL[kind];
                        let n = seq.fetch_add(1, Ordering::SeqCst) + 1;
                        bus.publish(&event_of(kind));
                        for t in tracked.iter_mut().filter(|t| t.active && t.kind == kind) {
                            t.expected.push(n);
                        }
                    }
                }
            }

            for t in &tracked {
                prop_assert_eq!(&*t.received.lock(), &t.expected);
            }
        }
    }
}
