//! Debounced Write Coalescer
//!
//! Collapses bursts of edits into one outbound write per namespace per
//! settle window, so the backend sees one request per pause in typing
//! instead of one per keystroke, while still converging to the latest
//! state within the settle duration.
//!
//! One pending-write slot and one settle timer per namespace. The slot's
//! payload is replaced on every call (each payload already carries the full
//! accumulated sub-record), the timer restarts from the most recent call,
//! and the rollback snapshot of the batch's earliest edit is retained. A
//! single worker task per namespace both runs the timer and performs the
//! write, so at most one write per namespace is ever in flight: a batch
//! that becomes due while a write is outstanding waits for it to resolve.

use crate::error::SyncError;
use crate::field::Namespace;
use crate::model::{AgentModel, WireObject};
use crate::remote::ConfigTransport;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

/// Configuration for the write coalescer
#[derive(Debug, Clone)]
pub struct CoalescerConfig {
    /// Settle window in milliseconds after the most recent edit before a
    /// coalesced write is sent.
    pub settle_ms: u64,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self { settle_ms: 500 }
    }
}

/// A coalesced write that failed, reported for rollback.
#[derive(Debug)]
pub struct WriteFailure {
    pub namespace: Namespace,
    /// Model snapshot taken before the earliest edit of the failed batch.
    pub rollback: AgentModel,
    pub error: SyncError,
}

struct PendingWrite {
    payload: WireObject,
    rollback: AgentModel,
    deadline: Instant,
}

/// Per-namespace pending-write slot.
struct Slot {
    namespace: Namespace,
    pending: Mutex<Option<PendingWrite>>,
    notify: Notify,
}

impl Slot {
    fn new(namespace: Namespace) -> Arc<Self> {
        Arc::new(Self {
            namespace,
            pending: Mutex::new(None),
            notify: Notify::new(),
        })
    }
}

/// Debounced write coalescer with one worker task per namespace.
pub struct WriteCoalescer {
    slots: [Arc<Slot>; 2],
    transport: Arc<dyn ConfigTransport>,
    settle: Duration,
    running: Arc<RwLock<bool>>,
    workers: Mutex<Vec<tokio::task::JoinHandle<()>>>,
    failures: mpsc::UnboundedSender<WriteFailure>,
}

impl WriteCoalescer {
    pub fn new(
        transport: Arc<dyn ConfigTransport>,
        config: CoalescerConfig,
        failures: mpsc::UnboundedSender<WriteFailure>,
    ) -> Self {
        Self {
            slots: [Slot::new(Namespace::Agent), Slot::new(Namespace::Llm)],
            transport,
            settle: Duration::from_millis(config.settle_ms),
            running: Arc::new(RwLock::new(false)),
            workers: Mutex::new(Vec::new()),
            failures,
        }
    }

    fn slot(&self, namespace: Namespace) -> &Arc<Slot> {
        match namespace {
            Namespace::Agent => &self.slots[0],
            Namespace::Llm => &self.slots[1],
        }
    }

    /// Register the latest full payload for a namespace and restart its
    /// settle timer.
    ///
    /// Last-write-wins within the window: each payload already contains the
    /// full accumulated sub-record, so replacing the slot never loses an
    /// earlier field edit. The first call of a batch supplies the rollback
    /// snapshot; later calls keep it, so a failure undoes the whole batch.
    pub fn schedule(&self, namespace: Namespace, payload: WireObject, snapshot: AgentModel) {
        let slot = self.slot(namespace);
        let deadline = Instant::now() + self.settle;
        {
            let mut pending = slot.pending.lock();
            match pending.as_mut() {
                Some(write) => {
                    write.payload = payload;
                    write.deadline = deadline;
                }
                None => {
                    *pending = Some(PendingWrite {
                        payload,
                        rollback: snapshot,
                        deadline,
                    });
                }
            }
        }
        slot.notify.notify_one();
        debug!(
            namespace = %namespace,
            settle_ms = self.settle.as_millis() as u64,
            "scheduled coalesced write"
        );
    }

    /// Start one worker task per namespace.
    pub fn start(&self) {
        {
            let mut running = self.running.write();
            if *running {
                return;
            }
            *running = true;
        }

        let mut workers = self.workers.lock();
        for slot in &self.slots {
            let slot = Arc::clone(slot);
            let transport = Arc::clone(&self.transport);
            let running = Arc::clone(&self.running);
            let failures = self.failures.clone();
            workers.push(tokio::spawn(async move {
                Self::worker_loop(slot, transport, running, failures).await;
            }));
        }
        info!(worker_count = workers.len(), "Started write coalescer workers");
    }

    /// Stop workers and discard pending writes (graceful shutdown).
    ///
    /// Pending settle timers are cancelled with their batches; an in-flight
    /// write is not interrupted, but its outcome is dropped.
    pub async fn stop(&self) {
        {
            let mut running = self.running.write();
            if !*running {
                return;
            }
            *running = false;
        }

        for slot in &self.slots {
            let dropped = slot.pending.lock().take();
            if let Some(write) = dropped {
                debug!(
                    namespace = %slot.namespace,
                    fields = write.payload.len(),
                    "discarding pending write at shutdown"
                );
            }
            slot.notify.notify_one();
        }

        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            let _ = handle.await;
        }
        info!("Stopped write coalescer workers");
    }

    /// Worker loop: run the namespace's settle timer and perform its writes.
    async fn worker_loop(
        slot: Arc<Slot>,
        transport: Arc<dyn ConfigTransport>,
        running: Arc<RwLock<bool>>,
        failures: mpsc::UnboundedSender<WriteFailure>,
    ) {
        debug!(namespace = %slot.namespace, "write worker started");

        while *running.read() {
            let deadline = slot.pending.lock().as_ref().map(|write| write.deadline);

            let Some(deadline) = deadline else {
                // Idle: wait for a schedule() wake-up, with a periodic
                // re-check of the running flag.
                tokio::select! {
                    _ = slot.notify.notified() => {}
                    _ = sleep(Duration::from_millis(100)) => {}
                }
                continue;
            };

            if Instant::now() < deadline {
                // A newer edit moves the deadline; wake up and re-read
                // either way.
                tokio::select! {
                    _ = slot.notify.notified() => {}
                    _ = sleep_until(deadline) => {}
                }
                continue;
            }

            // Settle window elapsed with no further edits: flush exactly once.
            let Some(write) = slot.pending.lock().take() else {
                continue;
            };

            debug!(
                namespace = %slot.namespace,
                fields = write.payload.len(),
                "settle window elapsed, sending coalesced write"
            );
            let result = match slot.namespace {
                Namespace::Agent => transport.write_agent(&write.payload).await,
                Namespace::Llm => transport.write_llm(&write.payload).await,
            };

            match result {
                Ok(()) => {
                    debug!(namespace = %slot.namespace, "coalesced write committed");
                }
                Err(error) => {
                    if !*running.read() {
                        debug!(
                            namespace = %slot.namespace,
                            "ignoring write outcome after shutdown"
                        );
                        continue;
                    }
                    // A batch scheduled while this write was in flight was
                    // built on state the rollback is about to erase; it is
                    // discarded with the failed one.
                    slot.pending.lock().take();
                    warn!(
                        namespace = %slot.namespace,
                        error = %error,
                        "coalesced write failed"
                    );
                    let _ = failures.send(WriteFailure {
                        namespace: slot.namespace,
                        rollback: write.rollback,
                        error,
                    });
                }
            }
        }

        debug!(namespace = %slot.namespace, "write worker stopped");
    }
}

impl Drop for WriteCoalescer {
    fn drop(&mut self) {
        *self.running.write() = false;
        for slot in &self.slots {
            slot.notify.notify_one();
        }
    }
}
