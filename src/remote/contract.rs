//! Transport port for the agent backend.
//!
//! One method per remote operation the editor uses. Implementations are
//! stateless with respect to the editing session: they know nothing of
//! debouncing or of the engine's model, they only serialize and transmit
//! what they are given, once, and report success or failure.

use crate::error::SyncError;
use crate::model::{AgentModel, WireObject};
use crate::remote::types::{KnowledgeBase, Voice};
use async_trait::async_trait;

#[async_trait]
pub trait ConfigTransport: Send + Sync {
    /// Fetch the full nested agent record, split into the editing model.
    async fn fetch_agent(&self, agent_id: &str) -> Result<AgentModel, SyncError>;

    /// Write the complete root agent sub-record (identifier included).
    ///
    /// Single attempt; no retry. Success is decided by the transport-level
    /// response.
    async fn write_agent(&self, payload: &WireObject) -> Result<(), SyncError>;

    /// Write the complete LLM sub-record (identifier included).
    async fn write_llm(&self, payload: &WireObject) -> Result<(), SyncError>;

    /// Voice catalog for the voice picker.
    async fn list_voices(&self) -> Result<Vec<Voice>, SyncError>;

    /// Knowledge-base catalog for the sidebar.
    async fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBase>, SyncError>;
}
