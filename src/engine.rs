//! Reconciliation Engine
//!
//! Owns the authoritative in-memory model for one editing session. Edits
//! apply optimistically and synchronously (observers re-render before any
//! network activity), then flow to the coalescer as the namespace's full
//! current sub-record. When a coalesced write fails, the failed namespace
//! reverts to the snapshot taken before the earliest edit of that batch;
//! the other namespace's state is never touched.

use crate::coalescer::{CoalescerConfig, WriteCoalescer, WriteFailure};
use crate::error::SyncError;
use crate::field::FieldKey;
use crate::model::AgentModel;
use crate::remote::ConfigTransport;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Reconciliation engine for one editing session.
pub struct SyncEngine {
    model: Arc<RwLock<AgentModel>>,
    observers: watch::Sender<AgentModel>,
    coalescer: WriteCoalescer,
    rollback_worker: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl SyncEngine {
    /// Fetch the authoritative record and start an editing session.
    ///
    /// The fetch happening first is what guarantees `apply`'s "model is
    /// loaded" precondition: an engine cannot exist without a model.
    pub async fn open(
        transport: Arc<dyn ConfigTransport>,
        agent_id: &str,
        config: CoalescerConfig,
    ) -> Result<Self, SyncError> {
        let model = transport.fetch_agent(agent_id).await?;
        info!(
            agent_id = %model.agent_id(),
            llm_id = %model.llm_id(),
            "agent record loaded"
        );
        Ok(Self::with_model(transport, model, config))
    }

    /// Start an editing session over an already-fetched model.
    pub fn with_model(
        transport: Arc<dyn ConfigTransport>,
        model: AgentModel,
        config: CoalescerConfig,
    ) -> Self {
        let (failure_tx, failure_rx) = mpsc::unbounded_channel();
        let coalescer = WriteCoalescer::new(transport, config, failure_tx);
        coalescer.start();

        let model = Arc::new(RwLock::new(model));
        let (observers, _) = watch::channel(model.read().clone());

        let rollback_worker = tokio::spawn(Self::rollback_loop(
            failure_rx,
            Arc::clone(&model),
            observers.clone(),
        ));

        Self {
            model,
            observers,
            coalescer,
            rollback_worker: Mutex::new(Some(rollback_worker)),
        }
    }

    /// Apply one field edit.
    ///
    /// Synchronous effect: snapshot the model, merge the value into the
    /// namespace the field mapping selects, publish the new model to
    /// observers. Deferred effect: hand the namespace's full current
    /// sub-record to the coalescer. Never waits on the network.
    pub fn apply(&self, key: FieldKey, value: Value) {
        let namespace = key.namespace();
        let (snapshot, updated, payload) = {
            let mut model = self.model.write();
            let snapshot = model.clone();
            model.apply(key, value);
            (snapshot, model.clone(), model.write_payload(namespace))
        };

        self.observers.send_replace(updated);
        self.coalescer.schedule(namespace, payload, snapshot);
        debug!(field = %key, namespace = %namespace, "applied edit");
    }

    /// Apply an edit arriving as a raw wire name, e.g. straight from a UI
    /// event. An unknown name is a hard error, not a silent drop.
    pub fn apply_raw(&self, key: &str, value: Value) -> Result<(), SyncError> {
        let key: FieldKey = key.parse()?;
        self.apply(key, value);
        Ok(())
    }

    /// Current model snapshot for rendering.
    pub fn model(&self) -> AgentModel {
        self.model.read().clone()
    }

    /// Subscribe to model updates. Optimistic applies and rollbacks both
    /// publish here.
    pub fn subscribe(&self) -> watch::Receiver<AgentModel> {
        self.observers.subscribe()
    }

    /// End the editing session.
    ///
    /// Pending settle timers are cancelled and their writes discarded;
    /// results of writes already in flight are ignored.
    pub async fn shutdown(&self) {
        self.coalescer.stop().await;
        let worker = self.rollback_worker.lock().take();
        if let Some(worker) = worker {
            worker.abort();
            let _ = worker.await;
        }
        info!("editing session closed");
    }

    async fn rollback_loop(
        mut failures: mpsc::UnboundedReceiver<WriteFailure>,
        model: Arc<RwLock<AgentModel>>,
        observers: watch::Sender<AgentModel>,
    ) {
        while let Some(failure) = failures.recv().await {
            warn!(
                namespace = %failure.namespace,
                error = %failure.error,
                "write failed; restoring pre-edit snapshot"
            );
            let reverted = {
                let mut model = model.write();
                model.restore_namespace(failure.namespace, &failure.rollback);
                model.clone()
            };
            observers.send_replace(reverted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WireObject;
    use crate::remote::types::{KnowledgeBase, Voice};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    #[derive(Default)]
    struct FakeBackend {
        agent_writes: Mutex<Vec<WireObject>>,
        llm_writes: Mutex<Vec<WireObject>>,
        fail_llm: AtomicBool,
    }

    #[async_trait]
    impl ConfigTransport for FakeBackend {
        async fn fetch_agent(&self, agent_id: &str) -> Result<AgentModel, SyncError> {
            AgentModel::from_remote(json!({
                "agent_id": agent_id,
                "agent_name": "Front Desk",
                "voice_id": "v-1",
                "llm_data": {
                    "llm_id": "llm-1",
                    "general_prompt": "Original prompt",
                    "begin_message": "Hi!"
                }
            }))
        }

        async fn write_agent(&self, payload: &WireObject) -> Result<(), SyncError> {
            self.agent_writes.lock().push(payload.clone());
            Ok(())
        }

        async fn write_llm(&self, payload: &WireObject) -> Result<(), SyncError> {
            if self.fail_llm.load(Ordering::SeqCst) {
                return Err(SyncError::EndpointStatus {
                    endpoint: "update-llm".to_string(),
                    status: 500,
                });
            }
            self.llm_writes.lock().push(payload.clone());
            Ok(())
        }

        async fn list_voices(&self) -> Result<Vec<Voice>, SyncError> {
            Ok(Vec::new())
        }

        async fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBase>, SyncError> {
            Ok(Vec::new())
        }
    }

    async fn open(backend: Arc<FakeBackend>) -> SyncEngine {
        SyncEngine::open(backend, "agent-1", CoalescerConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_is_optimistic_and_synchronous() {
        let backend = Arc::new(FakeBackend::default());
        let engine = open(Arc::clone(&backend)).await;
        let mut updates = engine.subscribe();

        engine.apply(FieldKey::AgentName, json!("Reception"));

        // Model and observers reflect the edit before any write went out.
        assert_eq!(engine.model().field(FieldKey::AgentName), Some(&json!("Reception")));
        assert_eq!(
            updates.borrow_and_update().field(FieldKey::AgentName),
            Some(&json!("Reception"))
        );
        assert!(backend.agent_writes.lock().is_empty());

        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_write_carries_full_sub_record() {
        let backend = Arc::new(FakeBackend::default());
        let engine = open(Arc::clone(&backend)).await;

        engine.apply(FieldKey::GeneralPrompt, json!("New prompt"));
        sleep(Duration::from_millis(600)).await;

        {
            let writes = backend.llm_writes.lock();
            assert_eq!(writes.len(), 1);
            assert_eq!(writes[0].get("llm_id"), Some(&json!("llm-1")));
            assert_eq!(writes[0].get("general_prompt"), Some(&json!("New prompt")));
            // The untouched greeting rides along: whole-object semantics.
            assert_eq!(writes[0].get("begin_message"), Some(&json!("Hi!")));
        }

        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_rolls_back_only_its_namespace() {
        let backend = Arc::new(FakeBackend::default());
        backend.fail_llm.store(true, Ordering::SeqCst);
        let engine = open(Arc::clone(&backend)).await;
        let mut updates = engine.subscribe();

        engine.apply(FieldKey::GeneralPrompt, json!("Doomed prompt"));
        engine.apply(FieldKey::AgentName, json!("Kept name"));
        sleep(Duration::from_millis(700)).await;

        let model = engine.model();
        // LLM write failed: its edit reverted.
        assert_eq!(model.field(FieldKey::GeneralPrompt), Some(&json!("Original prompt")));
        // Agent write committed: its edit survives the other rollback.
        assert_eq!(model.field(FieldKey::AgentName), Some(&json!("Kept name")));
        assert_eq!(backend.agent_writes.lock().len(), 1);

        // Observers saw the reverted state too.
        assert_eq!(
            updates.borrow_and_update().field(FieldKey::GeneralPrompt),
            Some(&json!("Original prompt"))
        );

        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_raw_rejects_unknown_key() {
        let backend = Arc::new(FakeBackend::default());
        let engine = open(Arc::clone(&backend)).await;

        let err = engine.apply_raw("no_such_field", json!(1)).unwrap_err();
        assert!(matches!(err, SyncError::UnknownField(_)));
        // Nothing mutated, nothing scheduled.
        sleep(Duration::from_millis(700)).await;
        assert!(backend.agent_writes.lock().is_empty());
        assert!(backend.llm_writes.lock().is_empty());

        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_before_settle_sends_nothing() {
        let backend = Arc::new(FakeBackend::default());
        let engine = open(Arc::clone(&backend)).await;

        engine.apply(FieldKey::Language, json!("nl-NL"));
        sleep(Duration::from_millis(200)).await;
        engine.shutdown().await;

        sleep(Duration::from_millis(1_000)).await;
        assert!(backend.agent_writes.lock().is_empty());
    }
}
