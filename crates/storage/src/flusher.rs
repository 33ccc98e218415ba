//! Write-behind flusher
//!
//! Persistence is fire-and-forget: mutating cache calls enqueue a flush and
//! return immediately, with no read-your-writes guarantee against the
//! durable layer. A single worker thread drains the queue in order, so for
//! any one key the last enqueued state wins. The thread exits when the
//! owning manager drops its sender.

use crate::backend::StorageBackend;
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error};

/// One queued durable operation
pub enum FlushOp {
    /// Store `payload` under `key`
    Write {
        /// Logical storage key
        key: String,
        /// Serialized payload
        payload: String,
    },
    /// Remove `key` from durable storage
    Remove {
        /// Logical storage key
        key: String,
    },
    /// Ack once every previously queued operation has been applied
    Sync(Sender<()>),
}

/// Handle to the write-behind worker
///
/// Dropping the flusher closes the channel; the worker drains what was
/// already queued and exits, which is what joins pending writes on manager
/// drop.
pub struct Flusher {
    sender: Option<Sender<FlushOp>>,
    worker: Option<JoinHandle<()>>,
}

impl Flusher {
    /// Spawn the worker thread against a backend
    pub fn spawn(backend: Arc<dyn StorageBackend>) -> Self {
        let (sender, receiver) = channel::<FlushOp>();
        let worker = std::thread::Builder::new()
            .name("recache-flusher".to_string())
            .spawn(move || {
                while let Ok(op) = receiver.recv() {
                    match op {
                        FlushOp::Write { key, payload } => {
                            debug!(key = %key, bytes = payload.len(), "flushing persisted key");
                            backend.write(&key, &payload);
                        }
                        FlushOp::Remove { key } => {
                            debug!(key = %key, "removing persisted key");
                            backend.remove(&key);
                        }
                        FlushOp::Sync(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
            })
            .expect("failed to spawn flusher thread");
        Flusher {
            sender: Some(sender),
            worker: Some(worker),
        }
    }

    /// Enqueue a durable operation; never blocks on I/O
    pub fn enqueue(&self, op: FlushOp) {
        if let Some(sender) = &self.sender {
            if sender.send(op).is_err() {
                error!("flusher worker exited early; dropping durable write");
            }
        }
    }

    /// Enqueue a write when `payload` is present, a removal otherwise
    ///
    /// Matches the codec contract: an empty projection removes the durable
    /// key entirely.
    pub fn enqueue_projection(&self, key: &str, payload: Option<String>) {
        match payload {
            Some(payload) => self.enqueue(FlushOp::Write {
                key: key.to_string(),
                payload,
            }),
            None => self.enqueue(FlushOp::Remove {
                key: key.to_string(),
            }),
        }
    }

    /// Block until every operation enqueued so far has been applied
    ///
    /// The channel is FIFO with a single consumer, so an acked marker
    /// guarantees all prior operations hit the backend. Test-and-shutdown
    /// aid; production callers rely on write-behind.
    pub fn sync(&self) {
        if let Some(sender) = &self.sender {
            let (ack_tx, ack_rx) = channel::<()>();
            if sender.send(FlushOp::Sync(ack_tx)).is_ok() {
                let _ = ack_rx.recv();
            }
        }
    }
}

impl Drop for Flusher {
    fn drop(&mut self) {
        // Close the channel first so the worker drains and exits.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("flusher worker panicked during shutdown");
            }
        }
    }
}
