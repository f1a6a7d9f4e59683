//! Catalog types returned by the backend's list endpoints.

use serde::{Deserialize, Serialize};

/// Voice available for the agent's voice selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voice {
    pub voice_id: String,
    pub voice_name: String,
    pub provider: String,
    #[serde(default)]
    pub accent: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub preview_audio_url: String,
}

/// Knowledge base that can be attached to the LLM record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub knowledge_base_id: String,
    pub knowledge_base_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
}
