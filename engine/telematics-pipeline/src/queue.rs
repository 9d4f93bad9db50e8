//! # Ingestion Queue
//!
//! Bounded MPSC hand-off between producers and the stream processor, built on
//! `tokio::sync::mpsc`.
//!
//! - Any number of producers enqueue through a shared `IngestionQueue`
//! - Exactly one `QueueReceiver` exists; the processor takes it once
//! - A full queue either blocks the caller (optionally bounded by a timeout) or
//!   rejects immediately, depending on `BackpressurePolicy`
//! - `close()` stops new enqueues; the receiver still drains what was buffered and
//!   then sees `QueueError::Closed`

use crate::config::{BackpressurePolicy, QueueConfig};
use crate::error::QueueError;
use crate::reading::Envelope;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError, Permit};

#[derive(Debug, Default)]
struct QueueShared {
    depth: AtomicUsize,
}

/// Producer side of the ingestion queue
#[derive(Debug)]
pub struct IngestionQueue {
    sender: Mutex<Option<mpsc::Sender<Envelope>>>,
    receiver: Mutex<Option<mpsc::Receiver<Envelope>>>,
    shared: Arc<QueueShared>,
    capacity: usize,
    policy: BackpressurePolicy,
    enqueue_timeout: Option<Duration>,
}

/// Consumer side of the ingestion queue
#[derive(Debug)]
pub struct QueueReceiver {
    receiver: mpsc::Receiver<Envelope>,
    shared: Arc<QueueShared>,
}

impl IngestionQueue {
    pub fn new(config: &QueueConfig) -> Self {
        let capacity = config.capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);

        Self {
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
            shared: Arc::new(QueueShared::default()),
            capacity,
            policy: config.backpressure,
            enqueue_timeout: config.enqueue_timeout(),
        }
    }

    /// Queue with the given capacity and policy, no enqueue timeout
    pub fn with_capacity(capacity: usize, policy: BackpressurePolicy) -> Self {
        Self::new(&QueueConfig { capacity, backpressure: policy, enqueue_timeout_ms: None })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn policy(&self) -> BackpressurePolicy {
        self.policy
    }

    /// Items buffered and not yet dequeued
    #[inline]
    pub fn len(&self) -> usize {
        self.shared.depth.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Hand out the single consumer handle; `None` once taken
    pub fn take_receiver(&self) -> Option<QueueReceiver> {
        self.receiver
            .lock()
            .take()
            .map(|receiver| QueueReceiver { receiver, shared: Arc::clone(&self.shared) })
    }

    /// Stop accepting items. Buffered items stay available to the receiver.
    pub fn close(&self) {
        if self.sender.lock().take().is_some() {
            tracing::info!("Ingestion queue closed with {} buffered items", self.len());
        }
    }

    fn sender(&self) -> Result<mpsc::Sender<Envelope>, QueueError> {
        self.sender.lock().clone().ok_or(QueueError::Closed)
    }

    /// Enqueue according to the configured backpressure policy
    ///
    /// - `Block` waits for space, up to the configured timeout if one is set
    /// - `FailFast` returns `QueueError::Full` immediately
    pub async fn enqueue(&self, envelope: Envelope) -> Result<(), QueueError> {
        match self.policy {
            BackpressurePolicy::Block => self.enqueue_timeout_opt(envelope, self.enqueue_timeout).await,
            BackpressurePolicy::FailFast => self.try_enqueue(envelope),
        }
    }

    /// Enqueue, never waiting longer than `timeout` for space
    ///
    /// Under `FailFast` this does not wait at all.
    pub async fn enqueue_timeout(
        &self,
        envelope: Envelope,
        timeout: Duration,
    ) -> Result<(), QueueError> {
        match self.policy {
            BackpressurePolicy::Block => self.enqueue_timeout_opt(envelope, Some(timeout)).await,
            BackpressurePolicy::FailFast => self.try_enqueue(envelope),
        }
    }

    /// Non-blocking enqueue regardless of policy
    pub fn try_enqueue(&self, envelope: Envelope) -> Result<(), QueueError> {
        let sender = self.sender()?;
        let permit = sender.try_reserve().map_err(|err| match err {
            TrySendError::Full(()) => QueueError::Full,
            TrySendError::Closed(()) => QueueError::Closed,
        })?;
        self.commit(permit, envelope);
        Ok(())
    }

    async fn enqueue_timeout_opt(
        &self,
        envelope: Envelope,
        timeout: Option<Duration>,
    ) -> Result<(), QueueError> {
        let sender = self.sender()?;
        let permit = match timeout {
            Some(timeout) => match tokio::time::timeout(timeout, sender.reserve()).await {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(QueueError::Closed),
                Err(_) => return Err(QueueError::Full),
            },
            None => sender.reserve().await.map_err(|_| QueueError::Closed)?,
        };
        self.commit(permit, envelope);
        Ok(())
    }

    fn commit(&self, permit: Permit<'_, Envelope>, envelope: Envelope) {
        // Count before the item becomes visible so the receiver never underflows.
        self.shared.depth.fetch_add(1, Ordering::AcqRel);
        permit.send(envelope);
    }
}

impl QueueReceiver {
    /// Wait for the next item. Returns `QueueError::Closed` once the queue is
    /// closed and fully drained.
    pub async fn dequeue(&mut self) -> Result<Envelope, QueueError> {
        match self.receiver.recv().await {
            Some(envelope) => {
                self.shared.depth.fetch_sub(1, Ordering::AcqRel);
                Ok(envelope)
            }
            None => Err(QueueError::Closed),
        }
    }

    /// Take the next item if one is already buffered
    pub fn try_dequeue(&mut self) -> Option<Envelope> {
        let envelope = self.receiver.try_recv().ok()?;
        self.shared.depth.fetch_sub(1, Ordering::AcqRel);
        Some(envelope)
    }

    /// Items buffered and not yet dequeued
    pub fn len(&self) -> usize {
        self.shared.depth.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
