//! In-process publish/subscribe bus with a closed set of typed topics.
//!
//! Each subscriber owns a bounded queue. `publish` never waits: a full
//! queue drops the event for that subscriber, a closed queue is pruned.
//! Subscribers consume on their own tasks, so a failing consumer cannot
//! affect the publisher or its siblings.
//!
//! Every published event carries a bus-wide sequence number, so consumers
//! further downstream can tell events published before they attached from
//! those published after.
//!
//! The bus is created once at startup (`EventBus::init`), cloned into the
//! components that need it, and closed with `shutdown`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, MutexGuard, Weak};

use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::{Alert, AlertAcknowledgement, PatientNotification};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EventBusError {
    #[error("Event bus is shut down")]
    Closed,
}

mod registry {
    use std::sync::Mutex;

    use tokio::sync::mpsc;

    use crate::models::{Alert, AlertAcknowledgement, PatientNotification};

    pub struct Subscriber<T> {
        pub(super) id: u64,
        pub(super) tx: mpsc::Sender<(u64, T)>,
    }

    pub type Slot<T> = Mutex<Vec<Subscriber<T>>>;

    #[derive(Default)]
    pub struct Registries {
        pub(super) alert_created: Slot<Alert>,
        pub(super) alert_acknowledged: Slot<AlertAcknowledgement>,
        pub(super) patient_notification: Slot<PatientNotification>,
    }

    pub trait Sealed {}
}

/// A bus topic with a fixed payload type. Implemented only by the
/// marker types in this module.
pub trait Topic: registry::Sealed + Send + Sync + 'static {
    type Payload: Clone + Send + 'static;
    const NAME: &'static str;

    #[doc(hidden)]
    fn slot(registries: &registry::Registries) -> &registry::Slot<Self::Payload>;
}

/// `alert.created`: a skip alert was persisted.
pub struct AlertCreated;

/// `alert.acknowledged`: a doctor acknowledged an alert.
pub struct AlertAcknowledged;

/// `patient.notification`: a notification targeted at one patient.
pub struct PatientNotified;

impl registry::Sealed for AlertCreated {}
impl registry::Sealed for AlertAcknowledged {}
impl registry::Sealed for PatientNotified {}

impl Topic for AlertCreated {
    type Payload = Alert;
    const NAME: &'static str = "alert.created";

    fn slot(registries: &registry::Registries) -> &registry::Slot<Alert> {
        &registries.alert_created
    }
}

impl Topic for AlertAcknowledged {
    type Payload = AlertAcknowledgement;
    const NAME: &'static str = "alert.acknowledged";

    fn slot(registries: &registry::Registries) -> &registry::Slot<AlertAcknowledgement> {
        &registries.alert_acknowledged
    }
}

impl Topic for PatientNotified {
    type Payload = PatientNotification;
    const NAME: &'static str = "patient.notification";

    fn slot(registries: &registry::Registries) -> &registry::Slot<PatientNotification> {
        &registries.patient_notification
    }
}

// ═══════════════════════════════════════════════════════════
// EventBus
// ═══════════════════════════════════════════════════════════

struct BusInner {
    registries: registry::Registries,
    queue_capacity: usize,
    next_id: AtomicU64,
    sequence: AtomicU64,
    closed: AtomicBool,
}

#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create an open bus whose subscribers each buffer up to `queue_capacity` events.
    pub fn init(queue_capacity: usize) -> Self {
        tracing::debug!(queue_capacity, "Event bus initialized");
        Self {
            inner: Arc::new(BusInner {
                registries: registry::Registries::default(),
                queue_capacity: queue_capacity.max(1),
                next_id: AtomicU64::new(1),
                sequence: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Fire-and-forget delivery to every current subscriber of `T`.
    /// Returns how many subscribers accepted the event.
    pub fn publish<T: Topic>(&self, payload: T::Payload) -> usize {
        if self.is_closed() {
            tracing::debug!(topic = T::NAME, "Publish after shutdown ignored");
            return 0;
        }

        let mut delivered = 0;
        let mut subscribers = lock_slot(T::slot(&self.inner.registries));
        // Taken under the slot lock so queue order matches sequence order
        let seq = self.inner.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        subscribers.retain(|sub| match sub.tx.try_send((seq, payload.clone())) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(topic = T::NAME, subscriber = sub.id, "Subscriber queue full, event dropped");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(topic = T::NAME, subscriber = sub.id, "Pruning closed subscriber");
                false
            }
        });
        delivered
    }

    /// Register a new subscriber. Events published before this call are not replayed.
    pub fn subscribe<T: Topic>(&self) -> Result<Subscription<T>, EventBusError> {
        let mut subscribers = lock_slot(T::slot(&self.inner.registries));
        // Checked under the slot lock so shutdown cannot miss this subscriber
        if self.is_closed() {
            return Err(EventBusError::Closed);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.queue_capacity);
        subscribers.push(registry::Subscriber { id, tx });
        tracing::debug!(topic = T::NAME, subscriber = id, "Subscribed");

        Ok(Subscription {
            id,
            rx,
            bus: Arc::downgrade(&self.inner),
            _topic: std::marker::PhantomData,
        })
    }

    /// Sequence number of the most recent publish, 0 before the first.
    pub fn last_sequence(&self) -> u64 {
        self.inner.sequence.load(Ordering::SeqCst)
    }

    pub fn subscriber_count<T: Topic>(&self) -> usize {
        lock_slot(T::slot(&self.inner.registries)).len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Close every subscription. Pending events are still drained by
    /// consumers, after which `recv` returns `None`.
    pub fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let registries = &self.inner.registries;
        let closed = clear_slot(&registries.alert_created)
            + clear_slot(&registries.alert_acknowledged)
            + clear_slot(&registries.patient_notification);
        tracing::info!(closed_subscriptions = closed, "Event bus shut down");
    }
}

fn lock_slot<T>(slot: &registry::Slot<T>) -> MutexGuard<'_, Vec<registry::Subscriber<T>>> {
    // A panic while holding the lock cannot leave the Vec half-updated
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn clear_slot<T>(slot: &registry::Slot<T>) -> usize {
    let mut subscribers = lock_slot(slot);
    let count = subscribers.len();
    subscribers.clear();
    count
}

// ═══════════════════════════════════════════════════════════
// Subscription
// ═══════════════════════════════════════════════════════════

/// Handle to one subscriber queue. Dropping it unsubscribes.
pub struct Subscription<T: Topic> {
    id: u64,
    rx: mpsc::Receiver<(u64, T::Payload)>,
    bus: Weak<BusInner>,
    _topic: std::marker::PhantomData<T>,
}

impl<T: Topic> Subscription<T> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event, or `None` once the bus has shut down and the queue is drained.
    pub async fn recv(&mut self) -> Option<T::Payload> {
        self.rx.recv().await.map(|(_, payload)| payload)
    }

    /// Like `recv`, with the sequence number assigned at publish.
    pub async fn recv_sequenced(&mut self) -> Option<(u64, T::Payload)> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<T::Payload> {
        self.rx.try_recv().ok().map(|(_, payload)| payload)
    }

    /// Unsubscribe without affecting other subscribers.
    pub fn cancel(self) {}
}

impl<T: Topic> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            lock_slot(T::slot(&bus.registries)).retain(|sub| sub.id != self.id);
            tracing::debug!(topic = T::NAME, subscriber = self.id, "Unsubscribed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{NotificationType, RiskLevel};
    use chrono::Utc;

    fn alert(id: &str) -> Alert {
        Alert {
            id: id.into(),
            patient_id: "p1".into(),
            patient_name: "Rajesh Kumar".into(),
            drug_name: "Furosemide".into(),
            risk_level: RiskLevel::High,
            message: "m".into(),
            ai_explanation: "e".into(),
            timestamp: Utc::now(),
            acknowledged: false,
        }
    }

    #[tokio::test]
    async fn delivers_to_every_subscriber_in_order() {
        let bus = EventBus::init(8);
        let mut a = bus.subscribe::<AlertCreated>().unwrap();
        let mut b = bus.subscribe::<AlertCreated>().unwrap();

        assert_eq!(bus.publish::<AlertCreated>(alert("1")), 2);
        assert_eq!(bus.publish::<AlertCreated>(alert("2")), 2);

        assert_eq!(a.recv().await.unwrap().id, "1");
        assert_eq!(a.recv().await.unwrap().id, "2");
        assert_eq!(b.recv().await.unwrap().id, "1");
        assert_eq!(b.recv().await.unwrap().id, "2");
    }

    #[tokio::test]
    async fn no_replay_for_late_subscribers() {
        let bus = EventBus::init(8);
        assert_eq!(bus.publish::<AlertCreated>(alert("early")), 0);

        let mut sub = bus.subscribe::<AlertCreated>().unwrap();
        bus.publish::<AlertCreated>(alert("late"));
        assert_eq!(sub.recv().await.unwrap().id, "late");
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let bus = EventBus::init(8);
        let mut alerts = bus.subscribe::<AlertCreated>().unwrap();
        let mut notes = bus.subscribe::<PatientNotified>().unwrap();

        bus.publish::<PatientNotified>(PatientNotification::new(
            "p1",
            NotificationType::MedicationReminder,
            "take it".into(),
            "en",
        ));

        assert!(alerts.try_recv().is_none());
        assert_eq!(notes.recv().await.unwrap().patient_id, "p1");
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let bus = EventBus::init(1);
        let mut sub = bus.subscribe::<AlertCreated>().unwrap();

        assert_eq!(bus.publish::<AlertCreated>(alert("1")), 1);
        assert_eq!(bus.publish::<AlertCreated>(alert("2")), 0);
        assert_eq!(bus.subscriber_count::<AlertCreated>(), 1);

        assert_eq!(sub.try_recv().unwrap().id, "1");
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn cancel_unsubscribes_only_that_subscriber() {
        let bus = EventBus::init(4);
        let first = bus.subscribe::<AlertCreated>().unwrap();
        let mut second = bus.subscribe::<AlertCreated>().unwrap();
        assert_eq!(bus.subscriber_count::<AlertCreated>(), 2);

        first.cancel();
        assert_eq!(bus.subscriber_count::<AlertCreated>(), 1);
        assert_eq!(bus.publish::<AlertCreated>(alert("1")), 1);
        assert!(second.try_recv().is_some());
    }

    #[tokio::test]
    async fn panicking_consumer_does_not_affect_others() {
        let bus = EventBus::init(4);
        let mut healthy = bus.subscribe::<AlertCreated>().unwrap();
        let mut doomed = bus.subscribe::<AlertCreated>().unwrap();

        let task = tokio::spawn(async move {
            let _alert = doomed.recv().await;
            panic!("consumer failure");
        });

        bus.publish::<AlertCreated>(alert("1"));
        assert!(task.await.is_err());

        // The dead consumer unsubscribed while its task unwound
        assert_eq!(bus.publish::<AlertCreated>(alert("2")), 1);
        assert_eq!(bus.subscriber_count::<AlertCreated>(), 1);
        assert_eq!(healthy.recv().await.unwrap().id, "1");
        assert_eq!(healthy.recv().await.unwrap().id, "2");
    }

    #[tokio::test]
    async fn shutdown_closes_subscriptions() {
        let bus = EventBus::init(4);
        let mut sub = bus.subscribe::<AlertAcknowledged>().unwrap();
        bus.publish::<AlertAcknowledged>(AlertAcknowledgement {
            alert_id: "a1".into(),
            acknowledged_at: Utc::now(),
        });

        bus.shutdown();
        assert!(bus.is_closed());
        // Buffered event still drains, then the stream ends
        assert_eq!(sub.recv().await.unwrap().alert_id, "a1");
        assert!(sub.recv().await.is_none());

        assert_eq!(bus.subscribe::<AlertCreated>().err(), Some(EventBusError::Closed));
        assert_eq!(bus.publish::<AlertCreated>(alert("x")), 0);
    }

    #[tokio::test]
    async fn sequence_numbers_increase_across_topics() {
        let bus = EventBus::init(4);
        assert_eq!(bus.last_sequence(), 0);
        let mut alerts = bus.subscribe::<AlertCreated>().unwrap();
        let mut acks = bus.subscribe::<AlertAcknowledged>().unwrap();

        bus.publish::<AlertCreated>(alert("1"));
        bus.publish::<AlertAcknowledged>(AlertAcknowledgement {
            alert_id: "1".into(),
            acknowledged_at: Utc::now(),
        });
        // Counted even with nobody listening
        bus.publish::<PatientNotified>(PatientNotification::new(
            "p1",
            NotificationType::MedicationReminder,
            "take it".into(),
            "en",
        ));

        assert_eq!(alerts.recv_sequenced().await.unwrap().0, 1);
        assert_eq!(acks.recv_sequenced().await.unwrap().0, 2);
        assert_eq!(bus.last_sequence(), 3);
    }

    #[test]
    fn topic_names_are_stable() {
        assert_eq!(AlertCreated::NAME, "alert.created");
        assert_eq!(AlertAcknowledged::NAME, "alert.acknowledged");
        assert_eq!(PatientNotified::NAME, "patient.notification");
    }
}
