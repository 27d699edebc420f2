//! Wire message types for the realtime transcription protocol.
//!
//! All events are JSON-encoded text frames. Outbound events are wrapped in an
//! envelope carrying a client-generated unique id; inbound frames carry a
//! `type` field naming the event.
//!
//! # Protocol Overview
//!
//! Client events (sent to server):
//! - `transcription_session.update` - Update session configuration
//! - `input_audio_buffer.append` - Append base64 audio to the input buffer
//!
//! Server events (received from server):
//! - `transcription_session.created` - Session handshake complete
//! - `transcription_session.updated` - Session configuration acknowledged
//! - `input_audio_buffer.speech_started` - VAD detected start of speech
//! - `input_audio_buffer.speech_stopped` - VAD detected end of speech
//! - `conversation.item.input_audio_transcription.delta` - Transcript chunk
//! - `conversation.item.input_audio_transcription.completed` - Final transcript
//! - `error` - Error occurred

use base64::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use super::base::{RealtimeError, RealtimeResult};
use super::config::{AudioFormat, NoiseReductionType, TranscriptionModel};

// =============================================================================
// Outbound Envelope
// =============================================================================

/// Prefix distinguishing client-generated event ids from server-generated ones.
pub const EVENT_ID_PREFIX: &str = "evt_";

/// Generate a globally unique outbound event id.
pub fn generate_event_id() -> String {
    format!("{}{}", EVENT_ID_PREFIX, Uuid::new_v4().simple())
}

/// Build the outbound envelope for `event_type` by merging a fresh event id,
/// the type, and the payload fields.
///
/// Rejects non-object payloads with [`RealtimeError::InvalidPayload`] before
/// any network I/O. Payload fields are merged last, matching the upstream
/// protocol where explicit payload keys win over the generated ones.
pub(crate) fn build_envelope(event_type: &str, payload: &Value) -> RealtimeResult<Value> {
    let fields = payload.as_object().ok_or_else(|| {
        RealtimeError::InvalidPayload(format!(
            "event data for '{event_type}' must be a JSON object"
        ))
    })?;

    let mut envelope = Map::with_capacity(fields.len() + 2);
    envelope.insert("event_id".to_string(), Value::String(generate_event_id()));
    envelope.insert("type".to_string(), Value::String(event_type.to_string()));
    for (key, value) in fields {
        envelope.insert(key.clone(), value.clone());
    }
    Ok(Value::Object(envelope))
}

/// Build the payload for an `input_audio_buffer.append` event from raw audio
/// bytes.
pub(crate) fn audio_append_payload(audio: &[u8]) -> Value {
    json!({ "audio": BASE64_STANDARD.encode(audio) })
}

// =============================================================================
// Session Configuration
// =============================================================================

/// Transcription session configuration, sent in
/// `transcription_session.update`.
///
/// The nullable descriptors serialize as explicit JSON `null` rather than
/// being omitted: on the wire, `null` is the value that turns the feature
/// off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Input audio format tag
    pub input_audio_format: AudioFormat,

    /// Input noise reduction, or `null` to disable
    #[serde(default)]
    pub input_audio_noise_reduction: Option<NoiseReduction>,

    /// Transcription parameters
    pub input_audio_transcription: TranscriptionConfig,

    /// Turn detection (server VAD), or `null` to disable. With VAD disabled
    /// the server never commits the audio buffer on its own.
    #[serde(default)]
    pub turn_detection: Option<TurnDetection>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            input_audio_format: AudioFormat::Pcm16,
            input_audio_noise_reduction: None,
            input_audio_transcription: TranscriptionConfig::default(),
            turn_detection: Some(TurnDetection::default()),
        }
    }
}

/// Input noise reduction descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseReduction {
    /// Microphone placement the filter is tuned for
    #[serde(rename = "type")]
    pub reduction_type: NoiseReductionType,
}

/// Transcription parameters within the session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Input language in ISO-639-1 (e.g. "en")
    pub language: String,

    /// Model to use for transcription
    pub model: TranscriptionModel,

    /// Optional free text to guide the model's style or continue a previous
    /// audio segment
    #[serde(default)]
    pub prompt: String,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            model: TranscriptionModel::default(),
            prompt: String::new(),
        }
    }
}

/// Turn detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD: the server detects the start and end of speech from
    /// audio volume and commits the buffer at the end of user speech
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Activation threshold (0.0 to 1.0). Higher values require louder
        /// audio, which can perform better in noisy environments
        threshold: f32,
        /// Audio included before detected speech, in milliseconds
        prefix_padding_ms: u32,
        /// Silence duration that ends a turn, in milliseconds. Shorter values
        /// respond faster but may cut off short pauses
        silence_duration_ms: u32,
    },
}

impl Default for TurnDetection {
    fn default() -> Self {
        TurnDetection::ServerVad {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
        }
    }
}

// =============================================================================
// Typed Server Events
// =============================================================================

/// Server VAD detected the start of speech.
#[derive(Debug, Clone, Deserialize)]
pub struct SpeechStartedEvent {
    /// Server event id
    pub event_id: String,
    /// Item the speech belongs to
    pub item_id: String,
    /// Offset of detected speech start in the audio stream, in milliseconds
    pub audio_start_ms: u64,
}

/// Server VAD detected the end of speech.
#[derive(Debug, Clone, Deserialize)]
pub struct SpeechStoppedEvent {
    /// Server event id
    pub event_id: String,
    /// Item the speech belongs to
    pub item_id: String,
    /// Offset of detected speech end in the audio stream, in milliseconds
    pub audio_end_ms: u64,
}

/// Incremental transcription chunk for an in-progress utterance.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionDeltaEvent {
    /// Server event id
    pub event_id: String,
    /// Item being transcribed
    pub item_id: String,
    /// Index of the content part within the item
    #[serde(default)]
    pub content_index: u32,
    /// Transcript text fragment
    pub delta: String,
}

/// Final transcript for a completed utterance.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionCompletedEvent {
    /// Server event id
    pub event_id: String,
    /// Item that was transcribed
    pub item_id: String,
    /// Index of the content part within the item
    #[serde(default)]
    pub content_index: u32,
    /// Full transcript text
    pub transcript: String,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_merges_id_type_and_payload() {
        let payload = json!({ "audio": "AAAA" });
        let envelope = build_envelope("input_audio_buffer.append", &payload).unwrap();

        assert_eq!(envelope["type"], "input_audio_buffer.append");
        assert_eq!(envelope["audio"], "AAAA");
        let id = envelope["event_id"].as_str().unwrap();
        assert!(id.starts_with(EVENT_ID_PREFIX));
    }

    #[test]
    fn test_envelope_ids_are_unique() {
        let a = build_envelope("t", &json!({})).unwrap();
        let b = build_envelope("t", &json!({})).unwrap();
        assert_ne!(a["event_id"], b["event_id"]);
    }

    #[test]
    fn test_envelope_rejects_non_object_payload() {
        let result = build_envelope("t", &json!("just a string"));
        match result {
            Err(RealtimeError::InvalidPayload(msg)) => assert!(msg.contains("JSON object")),
            other => panic!("expected InvalidPayload, got {other:?}"),
        }
    }

    #[test]
    fn test_audio_append_payload_round_trips() {
        let input = vec![0u8, 1, 2, 3, 255];
        let payload = audio_append_payload(&input);
        let decoded = BASE64_STANDARD
            .decode(payload["audio"].as_str().unwrap())
            .unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn test_session_config_serializes_wire_names() {
        let config = SessionConfig {
            input_audio_noise_reduction: Some(NoiseReduction {
                reduction_type: NoiseReductionType::NearField,
            }),
            ..Default::default()
        };
        let value = serde_json::to_value(&config).unwrap();

        assert_eq!(value["input_audio_format"], "pcm16");
        assert_eq!(value["input_audio_noise_reduction"]["type"], "near_field");
        assert_eq!(
            value["input_audio_transcription"]["model"],
            "gpt-4o-transcribe"
        );
        assert_eq!(value["turn_detection"]["type"], "server_vad");
        assert_eq!(value["turn_detection"]["threshold"], 0.5);
        assert_eq!(value["turn_detection"]["prefix_padding_ms"], 300);
        assert_eq!(value["turn_detection"]["silence_duration_ms"], 500);
    }

    #[test]
    fn test_nullable_descriptors_serialize_as_null() {
        let config = SessionConfig {
            input_audio_noise_reduction: None,
            turn_detection: None,
            ..Default::default()
        };
        let value = serde_json::to_value(&config).unwrap();

        // null is meaningful on the wire: it turns the feature off
        assert!(value["input_audio_noise_reduction"].is_null());
        assert!(value["turn_detection"].is_null());
    }

    #[test]
    fn test_session_config_round_trip() {
        let config = SessionConfig {
            input_audio_transcription: TranscriptionConfig {
                language: "ja".to_string(),
                model: TranscriptionModel::Gpt4oMiniTranscribe,
                prompt: "expect words related to technology".to_string(),
            },
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SessionConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.input_audio_transcription.language, "ja");
        assert_eq!(
            parsed.input_audio_transcription.model,
            TranscriptionModel::Gpt4oMiniTranscribe
        );
    }

    #[test]
    fn test_speech_started_event_deserializes() {
        let json = r#"{
            "type": "input_audio_buffer.speech_started",
            "event_id": "event_123",
            "item_id": "item_456",
            "audio_start_ms": 1500
        }"#;
        let event: SpeechStartedEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.item_id, "item_456");
        assert_eq!(event.audio_start_ms, 1500);
    }

    #[test]
    fn test_transcription_delta_event_deserializes() {
        let json = r#"{
            "type": "conversation.item.input_audio_transcription.delta",
            "event_id": "event_123",
            "item_id": "item_456",
            "content_index": 0,
            "delta": "Hello"
        }"#;
        let event: TranscriptionDeltaEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.delta, "Hello");
        assert_eq!(event.content_index, 0);
    }
}
