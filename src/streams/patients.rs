//! Per-patient notification streams.
//!
//! Subjects are created on first subscribe and looked up by
//! `PatientNotification::patient_id` on dispatch. A notification for a
//! patient without a subject is dropped, never buffered.
//!
//! Eviction: a subject whose last consumer has gone is removed, either
//! when a notification finds it idle or during the sweep on every
//! subscribe. The next subscribe creates a fresh subject. Subjects with
//! live consumers are always reused.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::Stream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::{broadcast_stream, Sequenced, StreamError, StreamReceiver};
use crate::events::{EventBus, PatientNotified};
use crate::models::PatientNotification;

type Subjects = HashMap<String, broadcast::Sender<Sequenced<PatientNotification>>>;

pub struct PatientStreamManager {
    subjects: Arc<Mutex<Subjects>>,
    buffer: usize,
    bus: EventBus,
    closed: AtomicBool,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl PatientStreamManager {
    /// Subscribe once to `patient.notification` and start routing. Needs a
    /// tokio runtime.
    pub fn start(bus: &EventBus, buffer: usize) -> Result<Self, StreamError> {
        let mut subscription = bus.subscribe::<PatientNotified>()?;
        let subjects: Arc<Mutex<Subjects>> = Arc::default();
        let routes = Arc::clone(&subjects);

        let forwarder = tokio::spawn(async move {
            while let Some((seq, notification)) = subscription.recv_sequenced().await {
                dispatch(&routes, seq, notification);
            }
            tracing::debug!("Patient notification forwarder stopped");
        });

        Ok(Self {
            subjects,
            buffer: buffer.max(1),
            bus: bus.clone(),
            closed: AtomicBool::new(false),
            forwarder: Mutex::new(Some(forwarder)),
        })
    }

    /// Attach a consumer to the patient's subject, creating it if needed.
    /// Only notifications published after this call are delivered.
    pub fn subscribe(
        &self,
        patient_id: &str,
    ) -> Result<StreamReceiver<PatientNotification>, StreamError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StreamError::Closed);
        }

        let mut subjects = lock(&self.subjects);
        let before = subjects.len();
        subjects.retain(|_, tx| tx.receiver_count() > 0);
        let evicted = before - subjects.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted idle patient streams");
        }

        let tx = subjects.entry(patient_id.to_string()).or_insert_with(|| {
            tracing::debug!(patient_id, "Patient stream created");
            broadcast::channel(self.buffer).0
        });
        let rx = tx.subscribe();
        Ok(StreamReceiver::new(rx, self.bus.last_sequence()))
    }

    pub fn notification_stream(
        &self,
        patient_id: &str,
    ) -> Result<impl Stream<Item = PatientNotification> + Send + 'static, StreamError> {
        Ok(broadcast_stream(self.subscribe(patient_id)?))
    }

    /// Patients that currently hold a subject.
    pub fn active_patients(&self) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.subjects).keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Drop every subject so open streams end, and stop routing.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let dropped = {
            let mut subjects = lock(&self.subjects);
            let count = subjects.len();
            subjects.clear();
            count
        };
        if let Ok(mut forwarder) = self.forwarder.lock() {
            if let Some(handle) = forwarder.take() {
                handle.abort();
            }
        }
        tracing::debug!(dropped, "Patient streams closed");
    }
}

impl Drop for PatientStreamManager {
    fn drop(&mut self) {
        self.close();
    }
}

fn lock(subjects: &Mutex<Subjects>) -> MutexGuard<'_, Subjects> {
    subjects
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Route one notification to its patient's subject. Returns whether a
/// consumer received it.
fn dispatch(subjects: &Mutex<Subjects>, seq: u64, notification: PatientNotification) -> bool {
    let mut subjects = lock(subjects);
    let patient_id = notification.patient_id.clone();

    let Some(tx) = subjects.get(&patient_id) else {
        tracing::debug!(patient_id = %patient_id, "No stream for patient, notification dropped");
        return false;
    };

    if tx.send(Sequenced { seq, item: notification }).is_ok() {
        return true;
    }
    subjects.remove(&patient_id);
    tracing::debug!(patient_id = %patient_id, "Last consumer gone, patient stream evicted");
    false
}
