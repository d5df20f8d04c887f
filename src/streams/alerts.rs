//! The single process-wide alert stream for doctor clients.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use futures_util::Stream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::{broadcast_stream, Sequenced, StreamError, StreamReceiver};
use crate::db::{DatabaseError, Store};
use crate::events::{AlertAcknowledged, AlertCreated, EventBus};
use crate::models::{Alert, AlertAcknowledgement, AlertUpdate};

/// Bridges `alert.created` onto one broadcast subject. Subscribers see
/// every alert published after they subscribe, with no replay.
pub struct AlertStreamManager {
    subject: Mutex<Option<broadcast::Sender<Sequenced<Alert>>>>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
    store: Arc<dyn Store>,
    bus: EventBus,
}

impl AlertStreamManager {
    /// Subscribe to the bus and start forwarding. Needs a tokio runtime.
    pub fn start(store: Arc<dyn Store>, bus: EventBus, buffer: usize) -> Result<Self, StreamError> {
        let mut subscription = bus.subscribe::<AlertCreated>()?;
        let (subject, _) = broadcast::channel(buffer.max(1));
        let tx = subject.clone();

        let forwarder = tokio::spawn(async move {
            while let Some((seq, alert)) = subscription.recv_sequenced().await {
                // Err only means no consumer is connected right now
                let _ = tx.send(Sequenced { seq, item: alert });
            }
            tracing::debug!("Alert stream forwarder stopped");
        });

        Ok(Self {
            subject: Mutex::new(Some(subject)),
            forwarder: Mutex::new(Some(forwarder)),
            store,
            bus,
        })
    }

    /// Receiver for alerts published from now on.
    pub fn subscribe(&self) -> Result<StreamReceiver<Alert>, StreamError> {
        let rx = self
            .lock_subject()
            .as_ref()
            .map(broadcast::Sender::subscribe)
            .ok_or(StreamError::Closed)?;
        // Read after attaching, so nothing published from here on is missed
        Ok(StreamReceiver::new(rx, self.bus.last_sequence()))
    }

    /// Live alert stream; ends when the manager closes.
    pub fn alert_stream(&self) -> Result<impl Stream<Item = Alert> + Send + 'static, StreamError> {
        Ok(broadcast_stream(self.subscribe()?))
    }

    pub fn consumer_count(&self) -> usize {
        self.lock_subject()
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    pub fn all_alerts(&self) -> Result<Vec<Alert>, StreamError> {
        Ok(self.store.get_all_alerts()?)
    }

    pub fn alerts_for_patient(&self, patient_id: &str) -> Result<Vec<Alert>, StreamError> {
        Ok(self.store.get_alerts_by_patient(patient_id)?)
    }

    /// Persist the acknowledgement and announce it on `alert.acknowledged`.
    /// The alert stream itself does not re-emit the alert.
    pub fn acknowledge_alert(&self, alert_id: &str) -> Result<AlertAcknowledgement, StreamError> {
        if self.store.get_alert(alert_id)?.is_none() {
            return Err(DatabaseError::not_found("alert", alert_id).into());
        }
        self.store.update_alert(
            alert_id,
            &AlertUpdate {
                acknowledged: Some(true),
            },
        )?;

        let acknowledgement = AlertAcknowledgement {
            alert_id: alert_id.to_string(),
            acknowledged_at: Utc::now(),
        };
        self.bus.publish::<AlertAcknowledged>(acknowledgement.clone());
        tracing::info!(alert_id, "Alert acknowledged");
        Ok(acknowledgement)
    }

    /// Drop the subject so every open stream ends, and stop forwarding.
    pub fn close(&self) {
        let subject = self.lock_subject().take();
        if let Ok(mut forwarder) = self.forwarder.lock() {
            if let Some(handle) = forwarder.take() {
                handle.abort();
            }
        }
        if subject.is_some() {
            tracing::debug!("Alert stream closed");
        }
    }

    fn lock_subject(&self) -> MutexGuard<'_, Option<broadcast::Sender<Sequenced<Alert>>>> {
        self.subject
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for AlertStreamManager {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::models::enums::RiskLevel;
    use crate::models::{NewPatient, Patient};
    use futures_util::StreamExt;
    use std::time::Duration;
    use tokio::time::timeout;

    fn alert(id: &str) -> Alert {
        Alert {
            id: id.into(),
            patient_id: "p1".into(),
            patient_name: "Priya Sharma".into(),
            drug_name: "Amlodipine".into(),
            risk_level: RiskLevel::Medium,
            message: "Missed dose".into(),
            ai_explanation: "Blood pressure may rise".into(),
            timestamp: Utc::now(),
            acknowledged: false,
        }
    }

    fn store_with_patient() -> Arc<SqliteStore> {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store
            .save_patient(&Patient::from_new(
                "p1".into(),
                NewPatient {
                    name: "Priya Sharma".into(),
                    age: 58,
                    conditions: Vec::new(),
                    current_medications: Vec::new(),
                    doctor_id: None,
                    language: None,
                },
            ))
            .unwrap();
        store
    }

    async fn next(rx: &mut StreamReceiver<Alert>) -> Option<Alert> {
        timeout(Duration::from_millis(200), rx.recv()).await.ok()?.ok()
    }

    #[tokio::test]
    async fn subscribers_get_alerts_after_subscribing_in_order() {
        let bus = EventBus::init(16);
        let manager = AlertStreamManager::start(store_with_patient(), bus.clone(), 16).unwrap();

        bus.publish::<AlertCreated>(alert("before"));

        let mut first = manager.subscribe().unwrap();
        let mut second = manager.subscribe().unwrap();
        bus.publish::<AlertCreated>(alert("a"));
        bus.publish::<AlertCreated>(alert("b"));

        for rx in [&mut first, &mut second] {
            assert_eq!(next(rx).await.unwrap().id, "a");
            assert_eq!(next(rx).await.unwrap().id, "b");
            assert!(next(rx).await.is_none());
        }
    }

    #[tokio::test]
    async fn alert_published_just_before_subscribe_is_not_delivered() {
        let bus = EventBus::init(16);
        let manager = AlertStreamManager::start(store_with_patient(), bus.clone(), 16).unwrap();

        // Still queued for the forwarder when the consumer attaches
        bus.publish::<AlertCreated>(alert("early"));
        let mut rx = manager.subscribe().unwrap();
        assert!(next(&mut rx).await.is_none());

        bus.publish::<AlertCreated>(alert("late"));
        assert_eq!(next(&mut rx).await.unwrap().id, "late");
    }

    #[tokio::test]
    async fn acknowledge_persists_and_publishes_without_reemitting() {
        let store = store_with_patient();
        store.save_alert(&alert("a1")).unwrap();
        let bus = EventBus::init(16);
        let manager = AlertStreamManager::start(store.clone(), bus.clone(), 16).unwrap();
        let mut stream_rx = manager.subscribe().unwrap();
        let mut acks = bus.subscribe::<AlertAcknowledged>().unwrap();

        let ack = manager.acknowledge_alert("a1").unwrap();
        assert_eq!(ack.alert_id, "a1");

        assert!(manager.all_alerts().unwrap()[0].acknowledged);
        assert_eq!(acks.recv().await.unwrap().alert_id, "a1");
        assert!(next(&mut stream_rx).await.is_none());
    }

    #[tokio::test]
    async fn acknowledging_unknown_alert_is_not_found() {
        let bus = EventBus::init(4);
        let manager = AlertStreamManager::start(store_with_patient(), bus.clone(), 4).unwrap();
        let mut acks = bus.subscribe::<AlertAcknowledged>().unwrap();

        let err = manager.acknowledge_alert("missing").unwrap_err();
        assert!(matches!(err, StreamError::Database(e) if e.is_not_found()));
        assert!(acks.try_recv().is_none());
    }

    #[tokio::test]
    async fn close_ends_open_streams() {
        let bus = EventBus::init(4);
        let manager = AlertStreamManager::start(store_with_patient(), bus, 4).unwrap();
        let stream = manager.alert_stream().unwrap();
        assert_eq!(manager.consumer_count(), 1);

        manager.close();
        let items: Vec<Alert> = stream.collect().await;
        assert!(items.is_empty());
        assert!(matches!(manager.subscribe(), Err(StreamError::Closed)));
    }
}
