//! Shared types for the realtime transcription client.
//!
//! This module defines the error taxonomy, the connection state machine and
//! the callback type aliases used by [`RealtimeClient`](super::client::RealtimeClient)
//! and [`TranscriptionClient`](super::session::TranscriptionClient).

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

use super::messages::{
    SpeechStartedEvent, SpeechStoppedEvent, TranscriptionCompletedEvent, TranscriptionDeltaEvent,
};
use crate::core::events::RealtimeEvent;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during realtime transcription operations.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// No API key was supplied at construction time
    #[error("Missing credential: an API key is required")]
    MissingCredential,

    /// `connect()` was called while a connection is already active
    #[error("Already connected, disconnect first")]
    AlreadyConnected,

    /// The operation requires an active connection
    #[error("Not connected")]
    NotConnected,

    /// The WebSocket handshake failed before the connection opened
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    /// Outbound payload validation failed before any network I/O
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// An inbound text frame could not be parsed as a typed event.
    /// Never propagated out of the frame handler; logged and the frame dropped.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// A bounded wait elapsed before the awaited event arrived
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Connection State
// =============================================================================

/// Connection state for the realtime client.
///
/// State and socket ownership are always mutated together: exactly one live
/// socket may be associated with a client, and only while `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected to the endpoint
    #[default]
    Disconnected,
    /// WebSocket handshake in progress
    Connecting,
    /// Connected and ready
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
        }
    }
}

// =============================================================================
// Callback Types
// =============================================================================

/// Callback type for raw dispatcher events.
pub type EventCallback =
    Arc<dyn Fn(RealtimeEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for speech-started events (server VAD).
pub type SpeechStartedCallback =
    Arc<dyn Fn(SpeechStartedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for speech-stopped events (server VAD).
pub type SpeechStoppedCallback =
    Arc<dyn Fn(SpeechStoppedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for incremental transcription deltas.
pub type TranscriptionDeltaCallback =
    Arc<dyn Fn(TranscriptionDeltaEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for completed utterance transcripts.
pub type TranscriptionCompletedCallback = Arc<
    dyn Fn(TranscriptionCompletedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync,
>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "Connected");
        assert_eq!(ConnectionState::Disconnected.to_string(), "Disconnected");
        assert_eq!(ConnectionState::Connecting.to_string(), "Connecting");
    }

    #[test]
    fn test_connection_state_default() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_error_display() {
        let err = RealtimeError::ConnectFailed("refused".to_string());
        assert!(err.to_string().contains("Connection failed"));

        let err = RealtimeError::NotConnected;
        assert_eq!(err.to_string(), "Not connected");

        let err = RealtimeError::MissingCredential;
        assert!(err.to_string().contains("API key"));
    }
}
