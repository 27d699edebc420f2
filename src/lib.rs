//! Realtime speech-to-text WebSocket client.
//!
//! Connects to OpenAI's realtime transcription endpoint, turns the raw
//! duplex socket into a typed, named-event pub/sub surface with
//! `client.`/`server.` namespacing, and sequences the session-creation
//! handshake before configuration updates and audio streaming.

pub mod core;

// Re-export the primary API at the crate root
pub use crate::core::events::{EventDispatcher, RealtimeEvent};
pub use crate::core::realtime::{
    AudioFormat, ClientConfig, ConnectionState, EventCallback, NoiseReduction, NoiseReductionType,
    RealtimeClient, RealtimeError, RealtimeResult, SessionConfig, SpeechStartedCallback,
    SpeechStartedEvent, SpeechStoppedCallback, SpeechStoppedEvent, TranscriptionClient,
    TranscriptionCompletedCallback, TranscriptionCompletedEvent, TranscriptionConfig,
    TranscriptionDeltaCallback, TranscriptionDeltaEvent, TranscriptionModel, TurnDetection,
};
