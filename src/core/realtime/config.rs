//! Configuration types for the realtime transcription client.
//!
//! This module contains the endpoint constants, the client configuration and
//! the enums for session parameters:
//! - Transcription model selection
//! - Input audio format
//! - Noise reduction mode

use serde::{Deserialize, Serialize};

/// OpenAI Realtime transcription WebSocket endpoint.
pub const REALTIME_TRANSCRIPTION_URL: &str =
    "wss://api.openai.com/v1/realtime?intent=transcription";

/// Protocol version header sent with the WebSocket upgrade request.
pub const REALTIME_BETA_HEADER: &str = "realtime=v1";

/// Default bound for the session-created wait, in milliseconds.
pub const DEFAULT_SESSION_CREATE_TIMEOUT_MS: u64 = 10_000;

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for [`RealtimeClient`](super::client::RealtimeClient) and
/// [`TranscriptionClient`](super::session::TranscriptionClient).
///
/// The API key is required and must be passed explicitly; the client never
/// reads it from the process environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API key for authentication
    pub api_key: String,

    /// WebSocket endpoint URL
    #[serde(default = "default_url")]
    pub url: String,

    /// Upper bound for the session-created wait in
    /// [`update_session`](super::session::TranscriptionClient::update_session),
    /// in milliseconds. The upstream protocol has no such bound; a server that
    /// silently drops the create request would otherwise hang the caller
    /// forever.
    #[serde(default = "default_session_create_timeout_ms")]
    pub session_create_timeout_ms: u64,
}

fn default_url() -> String {
    REALTIME_TRANSCRIPTION_URL.to_string()
}

fn default_session_create_timeout_ms() -> u64 {
    DEFAULT_SESSION_CREATE_TIMEOUT_MS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            url: default_url(),
            session_create_timeout_ms: default_session_create_timeout_ms(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration with the given API key and default endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }
}

// =============================================================================
// Models
// =============================================================================

/// Supported realtime transcription models.
///
/// Batch-only models (`whisper-1`) are not accepted by the realtime endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TranscriptionModel {
    /// GPT-4o transcription model (default)
    #[default]
    #[serde(rename = "gpt-4o-transcribe")]
    Gpt4oTranscribe,
    /// GPT-4o mini transcription model
    #[serde(rename = "gpt-4o-mini-transcribe")]
    Gpt4oMiniTranscribe,
}

impl TranscriptionModel {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpt4oTranscribe => "gpt-4o-transcribe",
            Self::Gpt4oMiniTranscribe => "gpt-4o-mini-transcribe",
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "gpt-4o-transcribe" => Self::Gpt4oTranscribe,
            "gpt-4o-mini-transcribe" => Self::Gpt4oMiniTranscribe,
            _ => Self::default(),
        }
    }
}

impl std::fmt::Display for TranscriptionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Audio Formats
// =============================================================================

/// Supported input audio formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// PCM 16-bit signed little-endian (default)
    #[default]
    Pcm16,
    /// G.711 u-law (8-bit)
    #[serde(rename = "g711_ulaw")]
    G711Ulaw,
    /// G.711 a-law (8-bit)
    #[serde(rename = "g711_alaw")]
    G711Alaw,
}

impl AudioFormat {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pcm16 => "pcm16",
            Self::G711Ulaw => "g711_ulaw",
            Self::G711Alaw => "g711_alaw",
        }
    }

    /// Get the sample rate for this format.
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        match self {
            Self::Pcm16 => 24000,
            Self::G711Ulaw | Self::G711Alaw => 8000,
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pcm16" | "pcm" | "linear16" => Self::Pcm16,
            "g711_ulaw" | "ulaw" | "mulaw" => Self::G711Ulaw,
            "g711_alaw" | "alaw" => Self::G711Alaw,
            _ => Self::default(),
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Noise Reduction
// =============================================================================

/// Input noise reduction modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseReductionType {
    /// Optimized for close-talking microphones such as headsets (default)
    #[default]
    NearField,
    /// Optimized for distant microphones such as laptops or conference rooms
    FarField,
}

impl NoiseReductionType {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NearField => "near_field",
            Self::FarField => "far_field",
        }
    }
}

impl std::fmt::Display for NoiseReductionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================
