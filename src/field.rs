//! Field keys and namespace routing.
//!
//! Every editable key belongs to exactly one of the two remote sub-resources.
//! The mapping is a closed set fixed at build time: routing is an exhaustive
//! match with no fallback arm, so adding a key without choosing its namespace
//! fails compilation instead of silently misrouting the write.

use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Remote sub-resource a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Namespace {
    /// Root agent record (identity, voice, language, call and speech behavior).
    Agent,
    /// Nested LLM record (prompt, greeting, tools, knowledge bases).
    Llm,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Agent => write!(f, "agent"),
            Namespace::Llm => write!(f, "llm"),
        }
    }
}

/// Editable field of the agent configuration.
///
/// Wire names match the backend record verbatim (`serde` snake_case).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    // Root agent record
    AgentName,
    VoiceId,
    Language,
    EnableVoicemailDetection,
    EndCallAfterSilenceMs,
    MaxCallDurationMs,
    BeginMessageDelayMs,
    AmbientSound,
    Responsiveness,
    InterruptionSensitivity,
    EnableBackchannel,
    BackchannelWords,
    PronunciationDictionary,
    // Nested LLM record
    GeneralPrompt,
    BeginMessage,
    GeneralTools,
    KnowledgeBaseIds,
}

impl FieldKey {
    /// Every key in the closed set, for iteration and completeness checks.
    pub const ALL: [FieldKey; 17] = [
        FieldKey::AgentName,
        FieldKey::VoiceId,
        FieldKey::Language,
        FieldKey::EnableVoicemailDetection,
        FieldKey::EndCallAfterSilenceMs,
        FieldKey::MaxCallDurationMs,
        FieldKey::BeginMessageDelayMs,
        FieldKey::AmbientSound,
        FieldKey::Responsiveness,
        FieldKey::InterruptionSensitivity,
        FieldKey::EnableBackchannel,
        FieldKey::BackchannelWords,
        FieldKey::PronunciationDictionary,
        FieldKey::GeneralPrompt,
        FieldKey::BeginMessage,
        FieldKey::GeneralTools,
        FieldKey::KnowledgeBaseIds,
    ];

    /// Route a key to the sub-resource that stores it.
    ///
    /// `GeneralTools` and `KnowledgeBaseIds` live on the LLM record even
    /// though the editor surfaces them next to root-level settings.
    pub fn namespace(self) -> Namespace {
        match self {
            FieldKey::AgentName
            | FieldKey::VoiceId
            | FieldKey::Language
            | FieldKey::EnableVoicemailDetection
            | FieldKey::EndCallAfterSilenceMs
            | FieldKey::MaxCallDurationMs
            | FieldKey::BeginMessageDelayMs
            | FieldKey::AmbientSound
            | FieldKey::Responsiveness
            | FieldKey::InterruptionSensitivity
            | FieldKey::EnableBackchannel
            | FieldKey::BackchannelWords
            | FieldKey::PronunciationDictionary => Namespace::Agent,
            FieldKey::GeneralPrompt
            | FieldKey::BeginMessage
            | FieldKey::GeneralTools
            | FieldKey::KnowledgeBaseIds => Namespace::Llm,
        }
    }

    /// Wire name of the key as it appears in backend records.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKey::AgentName => "agent_name",
            FieldKey::VoiceId => "voice_id",
            FieldKey::Language => "language",
            FieldKey::EnableVoicemailDetection => "enable_voicemail_detection",
            FieldKey::EndCallAfterSilenceMs => "end_call_after_silence_ms",
            FieldKey::MaxCallDurationMs => "max_call_duration_ms",
            FieldKey::BeginMessageDelayMs => "begin_message_delay_ms",
            FieldKey::AmbientSound => "ambient_sound",
            FieldKey::Responsiveness => "responsiveness",
            FieldKey::InterruptionSensitivity => "interruption_sensitivity",
            FieldKey::EnableBackchannel => "enable_backchannel",
            FieldKey::BackchannelWords => "backchannel_words",
            FieldKey::PronunciationDictionary => "pronunciation_dictionary",
            FieldKey::GeneralPrompt => "general_prompt",
            FieldKey::BeginMessage => "begin_message",
            FieldKey::GeneralTools => "general_tools",
            FieldKey::KnowledgeBaseIds => "knowledge_base_ids",
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKey {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| SyncError::UnknownField(s.to_string()))
    }
}
