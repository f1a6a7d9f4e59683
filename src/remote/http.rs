//! HTTP adapter for the agent backend.
//!
//! Thin `reqwest` wiring around the backend's endpoints. Update bodies carry
//! the operator scope plus the whole sub-record under its wrapper key, which
//! is the shape the backend expects.

use crate::config::EditorConfig;
use crate::error::SyncError;
use crate::model::{AgentModel, WireObject};
use crate::remote::contract::ConfigTransport;
use crate::remote::types::{KnowledgeBase, Voice};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
pub struct HttpConfigTransport {
    client: reqwest::Client,
    base_url: String,
    user_id: String,
    workspace_id: String,
}

#[derive(Debug, Deserialize)]
struct GetAgentEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    agent: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListVoicesEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    voices: Vec<Voice>,
}

impl HttpConfigTransport {
    pub fn new(config: &EditorConfig) -> Result<Self, SyncError> {
        if config.base_url.is_empty() {
            return Err(SyncError::ConfigError(
                "base_url is not set; the agent backend cannot be reached".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| SyncError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_id: config.user_id.clone(),
            workspace_id: config.workspace_id.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    /// Update body: operator scope plus the whole sub-record under its
    /// wrapper key.
    fn update_body(&self, wrapper: &str, payload: &WireObject) -> Value {
        let mut body = WireObject::new();
        body.insert("user_id".to_string(), Value::String(self.user_id.clone()));
        body.insert(
            "workspace_id".to_string(),
            Value::String(self.workspace_id.clone()),
        );
        body.insert(wrapper.to_string(), Value::Object(payload.clone()));
        Value::Object(body)
    }

    async fn post_update(&self, path: &str, body: Value) -> Result<(), SyncError> {
        let response = self.client.post(self.endpoint(path)).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::EndpointStatus {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }
        debug!(endpoint = path, "update accepted");
        Ok(())
    }
}

#[async_trait]
impl ConfigTransport for HttpConfigTransport {
    async fn fetch_agent(&self, agent_id: &str) -> Result<AgentModel, SyncError> {
        let response = self
            .client
            .get(self.endpoint("get-agent"))
            .query(&[("agent_id", agent_id)])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::EndpointStatus {
                endpoint: "get-agent".to_string(),
                status: status.as_u16(),
            });
        }
        let envelope: GetAgentEnvelope = response.json().await?;
        if !envelope.success {
            return Err(SyncError::RemoteRejected(
                envelope
                    .error
                    .unwrap_or_else(|| "get-agent reported failure".to_string()),
            ));
        }
        let record = envelope
            .agent
            .ok_or_else(|| SyncError::MalformedRecord("get-agent returned no record".to_string()))?;
        AgentModel::from_remote(record)
    }

    async fn write_agent(&self, payload: &WireObject) -> Result<(), SyncError> {
        self.post_update("update-agent", self.update_body("agent_data", payload))
            .await
    }

    async fn write_llm(&self, payload: &WireObject) -> Result<(), SyncError> {
        self.post_update("update-llm", self.update_body("llm_data", payload))
            .await
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, SyncError> {
        let response = self.client.get(self.endpoint("list-voices")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::EndpointStatus {
                endpoint: "list-voices".to_string(),
                status: status.as_u16(),
            });
        }
        let envelope: ListVoicesEnvelope = response.json().await?;
        if !envelope.success {
            return Err(SyncError::RemoteRejected(
                "list-voices reported failure".to_string(),
            ));
        }
        Ok(envelope.voices)
    }

    async fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBase>, SyncError> {
        let response = self
            .client
            .get(self.endpoint("list-knowledge-bases"))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::EndpointStatus {
                endpoint: "list-knowledge-bases".to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}
