//! Authoritative in-memory editing model.
//!
//! The model is a complete snapshot of the remote configuration, split into
//! the two write namespaces. It is always internally consistent: edits merge
//! synchronously, and a clone of the whole model is the unit of rollback.
//! Field values are carried as raw JSON; the editor performs no schema
//! validation, well-formed values are the caller's responsibility.

use crate::error::SyncError;
use crate::field::{FieldKey, Namespace};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// JSON object in backend wire shape.
pub type WireObject = serde_json::Map<String, Value>;

/// Ordered field-to-value map for one namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap(BTreeMap<FieldKey, Value>);

impl FieldMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert or replace a field value, returning the previous one.
    pub fn insert(&mut self, key: FieldKey, value: Value) -> Option<Value> {
        self.0.insert(key, value)
    }

    pub fn get(&self, key: FieldKey) -> Option<&Value> {
        self.0.get(&key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldKey, &Value)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    /// Render as a wire object keyed by backend field names.
    pub fn to_wire(&self) -> WireObject {
        self.0
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.clone()))
            .collect()
    }
}

/// Complete editing-session model: both namespaces plus their identifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentModel {
    agent_id: String,
    llm_id: String,
    agent_fields: FieldMap,
    llm_fields: FieldMap,
}

impl AgentModel {
    /// Construct an empty model with known identifiers.
    pub fn new(agent_id: impl Into<String>, llm_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            llm_id: llm_id.into(),
            agent_fields: FieldMap::new(),
            llm_fields: FieldMap::new(),
        }
    }

    /// Split a fetched nested record into the two namespaces.
    ///
    /// Known keys are routed by the field mapping. Keys the mapping does not
    /// cover (backend bookkeeping such as timestamps) are skipped; the closed
    /// set governs edits, not the backend's own record shape.
    pub fn from_remote(record: Value) -> Result<Self, SyncError> {
        let Value::Object(record) = record else {
            return Err(SyncError::MalformedRecord(
                "agent record is not a JSON object".to_string(),
            ));
        };

        let agent_id = record
            .get("agent_id")
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::MalformedRecord("missing agent_id".to_string()))?
            .to_string();

        let llm_data = record
            .get("llm_data")
            .and_then(Value::as_object)
            .ok_or_else(|| SyncError::MalformedRecord("missing llm_data object".to_string()))?;

        let llm_id = llm_data
            .get("llm_id")
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::MalformedRecord("missing llm_data.llm_id".to_string()))?
            .to_string();

        let mut model = AgentModel::new(agent_id, llm_id);

        for (name, value) in record.iter() {
            if name == "agent_id" || name == "llm_data" {
                continue;
            }
            match name.parse::<FieldKey>() {
                Ok(key) => {
                    model.apply(key, value.clone());
                }
                Err(_) => debug!(field = %name, "skipping unmapped field in fetched record"),
            }
        }

        for (name, value) in llm_data.iter() {
            if name == "llm_id" {
                continue;
            }
            match name.parse::<FieldKey>() {
                Ok(key) => {
                    model.apply(key, value.clone());
                }
                Err(_) => debug!(field = %name, "skipping unmapped field in fetched llm record"),
            }
        }

        Ok(model)
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn llm_id(&self) -> &str {
        &self.llm_id
    }

    /// Merge one edit into the namespace the field mapping selects.
    pub fn apply(&mut self, key: FieldKey, value: Value) {
        match key.namespace() {
            Namespace::Agent => self.agent_fields.insert(key, value),
            Namespace::Llm => self.llm_fields.insert(key, value),
        };
    }

    /// Restore one namespace's fields from a snapshot, leaving the other
    /// namespace untouched. This is the rollback unit: a failed write only
    /// ever reverts its own sub-record.
    pub fn restore_namespace(&mut self, namespace: Namespace, snapshot: &AgentModel) {
        match namespace {
            Namespace::Agent => self.agent_fields = snapshot.agent_fields.clone(),
            Namespace::Llm => self.llm_fields = snapshot.llm_fields.clone(),
        }
    }

    /// Current value of a field, if the record carries it.
    pub fn field(&self, key: FieldKey) -> Option<&Value> {
        match key.namespace() {
            Namespace::Agent => self.agent_fields.get(key),
            Namespace::Llm => self.llm_fields.get(key),
        }
    }

    pub fn fields(&self, namespace: Namespace) -> &FieldMap {
        match namespace {
            Namespace::Agent => &self.agent_fields,
            Namespace::Llm => &self.llm_fields,
        }
    }

    /// Identifier of the sub-record a namespace writes against.
    pub fn identifier(&self, namespace: Namespace) -> &str {
        match namespace {
            Namespace::Agent => &self.agent_id,
            Namespace::Llm => &self.llm_id,
        }
    }

    /// Whole-object write payload for a namespace: the stable identifier
    /// merged with every known field. The nested resource has no
    /// partial-update semantics, so a single changed field still transmits
    /// the complete sub-record.
    pub fn write_payload(&self, namespace: Namespace) -> WireObject {
        let (id_name, id, fields) = match namespace {
            Namespace::Agent => ("agent_id", &self.agent_id, &self.agent_fields),
            Namespace::Llm => ("llm_id", &self.llm_id, &self.llm_fields),
        };
        let mut payload = fields.to_wire();
        payload.insert(id_name.to_string(), Value::String(id.clone()));
        payload
    }

    /// Render the full nested record, as the UI consumes it.
    pub fn to_value(&self) -> Value {
        let mut record = self.agent_fields.to_wire();
        record.insert(
            "agent_id".to_string(),
            Value::String(self.agent_id.clone()),
        );
        let mut llm = self.llm_fields.to_wire();
        llm.insert("llm_id".to_string(), Value::String(self.llm_id.clone()));
        record.insert("llm_data".to_string(), Value::Object(llm));
        Value::Object(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn fetched_record() -> Value {
        json!({
            "agent_id": "agent-123",
            "agent_name": "Support Line",
            "voice_id": "voice-7",
            "language": "en-US",
            "responsiveness": 0.8,
            "last_modification_timestamp": 1719414241,
            "llm_data": {
                "llm_id": "llm-456",
                "general_prompt": "You are a helpful receptionist.",
                "begin_message": "Hello!",
                "general_tools": [{"name": "end_call", "type": "end_call"}],
                "knowledge_base_ids": ["kb-1"],
                "model": "internal"
            }
        })
    }

    #[test]
    fn test_from_remote_splits_namespaces() {
        let model = AgentModel::from_remote(fetched_record()).unwrap();

        assert_eq!(model.agent_id(), "agent-123");
        assert_eq!(model.llm_id(), "llm-456");
        assert_eq!(model.fields(Namespace::Agent).len(), 4);
        assert_eq!(model.fields(Namespace::Llm).len(), 4);
        assert_eq!(
            model.field(FieldKey::GeneralPrompt),
            Some(&json!("You are a helpful receptionist."))
        );
        assert_eq!(model.field(FieldKey::VoiceId), Some(&json!("voice-7")));
    }

    #[test]
    fn test_from_remote_skips_unmapped_fields() {
        let model = AgentModel::from_remote(fetched_record()).unwrap();
        let agent_wire = model.write_payload(Namespace::Agent);
        assert!(!agent_wire.contains_key("last_modification_timestamp"));
        let llm_wire = model.write_payload(Namespace::Llm);
        assert!(!llm_wire.contains_key("model"));
    }

    #[test]
    fn test_from_remote_requires_identifiers() {
        let err = AgentModel::from_remote(json!({"llm_data": {"llm_id": "x"}})).unwrap_err();
        assert!(matches!(err, SyncError::MalformedRecord(_)));

        let err =
            AgentModel::from_remote(json!({"agent_id": "a", "llm_data": {}})).unwrap_err();
        assert!(matches!(err, SyncError::MalformedRecord(_)));

        let err = AgentModel::from_remote(json!("not-an-object")).unwrap_err();
        assert!(matches!(err, SyncError::MalformedRecord(_)));
    }

    #[test]
    fn test_apply_routes_to_correct_namespace() {
        let mut model = AgentModel::new("a-1", "l-1");
        model.apply(FieldKey::AgentName, json!("Front Desk"));
        model.apply(FieldKey::KnowledgeBaseIds, json!(["kb-2", "kb-3"]));

        assert_eq!(model.fields(Namespace::Agent).len(), 1);
        assert_eq!(model.fields(Namespace::Llm).len(), 1);
        assert_eq!(
            model.field(FieldKey::KnowledgeBaseIds),
            Some(&json!(["kb-2", "kb-3"]))
        );
    }

    #[test]
    fn test_write_payload_is_whole_object() {
        let model = AgentModel::from_remote(fetched_record()).unwrap();
        let payload = model.write_payload(Namespace::Llm);

        assert_eq!(payload.get("llm_id"), Some(&json!("llm-456")));
        // Every known LLM field rides along, not just the one last edited.
        assert!(payload.contains_key("general_prompt"));
        assert!(payload.contains_key("begin_message"));
        assert!(payload.contains_key("general_tools"));
        assert!(payload.contains_key("knowledge_base_ids"));
    }

    #[test]
    fn test_snapshot_clone_restores_exactly() {
        let mut model = AgentModel::from_remote(fetched_record()).unwrap();
        let snapshot = model.clone();

        model.apply(FieldKey::GeneralPrompt, json!("rewritten"));
        model.apply(FieldKey::AgentName, json!("renamed"));
        assert_ne!(model, snapshot);

        model = snapshot.clone();
        assert_eq!(model, snapshot);
        assert_eq!(
            model.field(FieldKey::GeneralPrompt),
            Some(&json!("You are a helpful receptionist."))
        );
    }

    #[test]
    fn test_restore_namespace_leaves_other_namespace_alone() {
        let mut model = AgentModel::from_remote(fetched_record()).unwrap();
        let snapshot = model.clone();

        model.apply(FieldKey::GeneralPrompt, json!("rewritten"));
        model.apply(FieldKey::AgentName, json!("renamed"));

        model.restore_namespace(Namespace::Llm, &snapshot);
        assert_eq!(
            model.field(FieldKey::GeneralPrompt),
            Some(&json!("You are a helpful receptionist."))
        );
        // The agent-side edit survives the LLM rollback.
        assert_eq!(model.field(FieldKey::AgentName), Some(&json!("renamed")));
    }

    #[test]
    fn test_to_value_round_trips_through_from_remote() {
        let model = AgentModel::from_remote(fetched_record()).unwrap();
        let reparsed = AgentModel::from_remote(model.to_value()).unwrap();
        assert_eq!(model, reparsed);
    }

    proptest! {
        /// Within one batch, later edits to the same field supersede earlier
        /// ones: the payload carries exactly the last value per field.
        #[test]
        fn prop_payload_carries_last_value_per_field(
            edits in proptest::collection::vec((0usize..FieldKey::ALL.len(), any::<i64>()), 1..32)
        ) {
            let mut model = AgentModel::new("a-1", "l-1");
            let mut last: BTreeMap<FieldKey, i64> = BTreeMap::new();
            for (idx, value) in &edits {
                let key = FieldKey::ALL[*idx];
                model.apply(key, json!(value));
                last.insert(key, *value);
            }
            for (key, value) in last {
                let payload = model.write_payload(key.namespace());
                prop_assert_eq!(payload.get(key.as_str()), Some(&json!(value)));
            }
        }
    }
}
