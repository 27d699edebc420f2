//! Realtime transcription client module.
//!
//! This module provides the WebSocket client for OpenAI's realtime
//! transcription endpoint and the session-lifecycle layer on top of it.
//!
//! # Architecture
//!
//! - [`RealtimeClient`] owns the socket and translates between wire frames
//!   and named dispatcher events (`server.*` inbound, `client.*` outbound).
//! - [`TranscriptionClient`] wraps it, gates configuration updates on the
//!   `transcription_session.created` handshake and exposes typed
//!   subscriptions for speech and transcription events.
//!
//! # Audio Format
//!
//! Input audio defaults to PCM 16-bit signed little-endian at 24kHz, sent
//! base64-encoded inside `input_audio_buffer.append` events.
//!
//! # Example
//!
//! ```rust,ignore
//! use realtime_transcription::{ClientConfig, SessionConfig, TranscriptionClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = TranscriptionClient::new(ClientConfig::new("sk-...")).unwrap();
//!
//!     client.on_transcription_delta(Arc::new(|event| Box::pin(async move {
//!         print!("{}", event.delta);
//!     })));
//!
//!     client.connect(SessionConfig::default()).await.unwrap();
//!     client.append_input_audio(audio_bytes).await.unwrap();
//! }
//! ```

mod base;
pub mod client;
pub mod config;
pub mod messages;
pub mod session;

pub use base::{
    ConnectionState, EventCallback, RealtimeError, RealtimeResult, SpeechStartedCallback,
    SpeechStoppedCallback, TranscriptionCompletedCallback, TranscriptionDeltaCallback,
};
pub use client::RealtimeClient;
pub use config::{
    AudioFormat, ClientConfig, DEFAULT_SESSION_CREATE_TIMEOUT_MS, NoiseReductionType,
    REALTIME_BETA_HEADER, REALTIME_TRANSCRIPTION_URL, TranscriptionModel,
};
pub use messages::{
    EVENT_ID_PREFIX, NoiseReduction, SessionConfig, SpeechStartedEvent, SpeechStoppedEvent,
    TranscriptionCompletedEvent, TranscriptionConfig, TranscriptionDeltaEvent, TurnDetection,
    generate_event_id,
};
pub use session::{
    SESSION_CREATED_EVENT, SPEECH_STARTED_EVENT, SPEECH_STOPPED_EVENT, TRANSCRIPTION_COMPLETED_EVENT,
    TRANSCRIPTION_DELTA_EVENT, TranscriptionClient,
};
