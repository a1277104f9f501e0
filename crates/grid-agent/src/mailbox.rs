//! Ordered event mailbox.
//!
//! Events are handled one at a time per shard, in arrival order. With more
//! than one shard, container events are routed by a hash of their ID so that
//! every event for a given container lands on the same consumer.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use grid_common::{GridError, GridResult};

use crate::events::{Envelope, Topic};
use crate::worker::OverlayWorker;

/// Queue in front of an [`OverlayWorker`].
pub struct Mailbox {
    senders: Vec<mpsc::Sender<Envelope>>,
    consumers: Vec<JoinHandle<()>>,
}

impl Mailbox {
    /// Spawn `shards` consumers, each buffering up to `capacity` envelopes.
    ///
    /// Both values are clamped to at least one.
    pub fn spawn(worker: Arc<OverlayWorker>, shards: usize, capacity: usize) -> Self {
        let shards = shards.max(1);
        let mut senders = Vec::with_capacity(shards);
        let mut consumers = Vec::with_capacity(shards);

        for shard in 0..shards {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            senders.push(tx);
            consumers.push(tokio::spawn(consume(shard, Arc::clone(&worker), rx)));
        }

        tracing::debug!(shards, capacity, "Mailbox started");
        Self { senders, consumers }
    }

    /// Number of consumers.
    #[must_use]
    pub fn shards(&self) -> usize {
        self.senders.len()
    }

    /// Shard an envelope is routed to.
    #[must_use]
    pub fn shard_for(&self, envelope: &Envelope) -> usize {
        match (envelope.topic, envelope.event.id.as_deref()) {
            (Topic::ContainerLifecycle, Some(id)) if self.shards() > 1 => {
                let mut hasher = DefaultHasher::new();
                id.hash(&mut hasher);
                (hasher.finish() % self.shards() as u64) as usize
            }
            _ => 0,
        }
    }

    /// Queue an envelope, waiting for room if the shard is full.
    ///
    /// # Errors
    ///
    /// Fails only if the shard's consumer has stopped.
    pub async fn deliver(&self, envelope: Envelope) -> GridResult<()> {
        let shard = self.shard_for(&envelope);
        self.senders[shard]
            .send(envelope)
            .await
            .map_err(|_| GridError::Internal {
                message: format!("mailbox shard {shard} stopped"),
            })
    }

    /// Feed events from a bus subscription until the bus closes.
    pub async fn forward(&self, mut events: broadcast::Receiver<Envelope>) {
        loop {
            match events.recv().await {
                Ok(envelope) => {
                    if let Err(e) = self.deliver(envelope).await {
                        tracing::error!(error = %e, "Mailbox closed");
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("Event bus closed");
                    return;
                }
            }
        }
    }

    /// Stop accepting events and wait for queued ones to be handled.
    pub async fn shutdown(self) {
        drop(self.senders);
        for consumer in self.consumers {
            if let Err(e) = consumer.await {
                tracing::error!(error = %e, "Mailbox consumer failed");
            }
        }
    }
}

async fn consume(shard: usize, worker: Arc<OverlayWorker>, mut rx: mpsc::Receiver<Envelope>) {
    while let Some(envelope) = rx.recv().await {
        let topic = envelope.topic;
        let id = envelope.event.id.clone();

        if let Err(panic) = AssertUnwindSafe(worker.dispatch(envelope))
            .catch_unwind()
            .await
        {
            let message = panic
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_default();
            tracing::error!(shard, %topic, ?id, panic = %message, "Event handler panicked");
        }
    }

    tracing::debug!(shard, "Mailbox shard stopped");
}
