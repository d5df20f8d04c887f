//! Long-lived bus subscribers that fan events out to push connections.
//!
//! Each manager owns one forwarding task reading its bus subscription and
//! re-emitting onto `tokio::sync::broadcast` subjects. Consumers get a
//! `StreamReceiver` or a ready-made `Stream`.
//!
//! Forwarding runs behind the bus queue, so a subject can still carry an
//! event published before a consumer attached. Items keep their bus
//! sequence number and each receiver skips anything at or below the
//! sequence it saw when it subscribed.

pub mod alerts;
pub mod patients;

pub use alerts::AlertStreamManager;
pub use patients::PatientStreamManager;

use futures_util::Stream;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::db::DatabaseError;
use crate::events::EventBusError;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Stream manager is closed")]
    Closed,

    #[error("Event bus error: {0}")]
    Bus(#[from] EventBusError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// An item on a broadcast subject, tagged with its bus sequence number.
#[derive(Debug, Clone)]
pub struct Sequenced<T> {
    pub seq: u64,
    pub item: T,
}

/// Consumer side of a stream subject. Only yields items published after
/// the receiver was created.
pub struct StreamReceiver<T> {
    rx: broadcast::Receiver<Sequenced<T>>,
    after: u64,
}

impl<T: Clone> StreamReceiver<T> {
    pub(crate) fn new(rx: broadcast::Receiver<Sequenced<T>>, after: u64) -> Self {
        Self { rx, after }
    }

    /// Next item published after subscription. Errors mirror
    /// `broadcast::Receiver::recv`.
    pub async fn recv(&mut self) -> Result<T, RecvError> {
        loop {
            let sequenced = self.rx.recv().await?;
            if sequenced.seq > self.after {
                return Ok(sequenced.item);
            }
        }
    }
}

/// Adapt a receiver into a stream that ends when the subject closes.
/// A lagging consumer skips what it missed.
pub fn broadcast_stream<T>(rx: StreamReceiver<T>) -> impl Stream<Item = T> + Send + 'static
where
    T: Clone + Send + 'static,
{
    futures_util::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(item) => return Some((item, rx)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Stream consumer lagged, events skipped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}
