//! C6: transport adapter trait + `LocalBus`, an in-process pub/sub bus
//! (spec §4.6).
//!
//! The engine consumes exactly three operations per spec: `Publish`,
//! `SubscribeSync`, `Unsubscribe`. Grounded in
//! `terrain-gossip-net::transport::Transport`, which is itself an explicit
//! placeholder for a real wire transport (see its `run()` TODO) — `LocalBus`
//! takes the same posture: a thin, fully-working stand-in for single-host
//! fan-out and tests, not a production message bus. A real networked
//! transport (reconnect-on-failure, ping interval) is out of scope here.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("subscribe failed: {0}")]
    Subscribe(String),
}

/// The three operations the send/receive engines depend on.
pub trait Transport: Send + Sync {
    type Subscription: Subscription;

    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), TransportError>;
    async fn subscribe_sync(&self, subject: &str) -> Result<Self::Subscription, TransportError>;
    async fn unsubscribe(&self, subscription: Self::Subscription) -> Result<(), TransportError> {
        drop(subscription);
        Ok(())
    }
    /// Flush any buffered outbound data. `LocalBus` has no buffering, so
    /// this is a no-op; a real transport would block until acked.
    async fn flush(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// A live subscription handle. `next_message` returns `None` once the
/// subscription is closed (after `unsubscribe` drops the sender side).
pub trait Subscription: Send {
    async fn next_message(&mut self) -> Option<Vec<u8>>;
}

const CHANNEL_CAPACITY: usize = 1024;

/// In-process, multi-subject pub/sub bus. Subjects are created lazily on
/// first publish or subscribe and live for the lifetime of the bus.
#[derive(Clone)]
pub struct LocalBus {
    subjects: Arc<RwLock<HashMap<String, broadcast::Sender<Vec<u8>>>>>,
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBus {
    pub fn new() -> Self {
        Self {
            subjects: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn sender_for(&self, subject: &str) -> broadcast::Sender<Vec<u8>> {
        if let Some(tx) = self.subjects.read().get(subject) {
            return tx.clone();
        }
        let mut subjects = self.subjects.write();
        subjects
            .entry(subject.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

impl Transport for LocalBus {
    type Subscription = LocalSubscription;

    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), TransportError> {
        // No receivers is not an error: fire-and-forget semantics.
        let _ = self.sender_for(subject).send(payload.to_vec());
        Ok(())
    }

    async fn subscribe_sync(&self, subject: &str) -> Result<Self::Subscription, TransportError> {
        let rx = self.sender_for(subject).subscribe();
        Ok(LocalSubscription { rx })
    }
}

pub struct LocalSubscription {
    rx: broadcast::Receiver<Vec<u8>>,
}

impl Subscription for LocalSubscription {
    async fn next_message(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.rx.recv().await {
                Ok(bytes) => return Some(bytes),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Join the base subject with an optional suffix, defaulting to `all`
/// when no suffix is given (spec §4.6 subject construction).
pub fn subject_for(base: &str, suffix: Option<&str>) -> String {
    format!("{base}.{}", suffix.unwrap_or("all"))
}

/// The private reply subject derived from a message's content hash
/// (spec §4.7: `baseSubject.<hex of sender's message hash>`).
pub fn reply_subject(base: &str, hash: &[u8]) -> String {
    format!("{base}.{}", hex::encode(hash))
}
