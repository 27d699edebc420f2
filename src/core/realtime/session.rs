//! Transcription session lifecycle client.
//!
//! Wraps [`RealtimeClient`] and enforces the handshake ordering the protocol
//! requires: a configuration update is meaningless before the server has
//! acknowledged session creation, so [`TranscriptionClient::update_session`]
//! waits for the `transcription_session.created` event before transmitting.
//! Readiness is re-armed on every disconnect; a fresh connection needs a
//! fresh handshake.
//!
//! The layer also presents a narrower, typed event surface
//! ([`on_speech_started`](TranscriptionClient::on_speech_started),
//! [`on_transcription_delta`](TranscriptionClient::on_transcription_delta),
//! ...) and streams audio chunks with
//! [`append_input_audio`](TranscriptionClient::append_input_audio).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::Notify;

use super::base::{
    EventCallback, RealtimeError, RealtimeResult, SpeechStartedCallback, SpeechStoppedCallback,
    TranscriptionCompletedCallback, TranscriptionDeltaCallback,
};
use super::client::RealtimeClient;
use super::config::ClientConfig;
use super::messages::{SessionConfig, audio_append_payload};
use crate::core::events::RealtimeEvent;

// =============================================================================
// Event Names
// =============================================================================

/// Dispatcher name of the session handshake acknowledgement.
pub const SESSION_CREATED_EVENT: &str = "server.transcription_session.created";

/// Dispatcher name of the VAD speech-start event.
pub const SPEECH_STARTED_EVENT: &str = "server.input_audio_buffer.speech_started";

/// Dispatcher name of the VAD speech-stop event.
pub const SPEECH_STOPPED_EVENT: &str = "server.input_audio_buffer.speech_stopped";

/// Dispatcher name of the incremental transcript event.
pub const TRANSCRIPTION_DELTA_EVENT: &str =
    "server.conversation.item.input_audio_transcription.delta";

/// Dispatcher name of the completed transcript event.
pub const TRANSCRIPTION_COMPLETED_EVENT: &str =
    "server.conversation.item.input_audio_transcription.completed";

// =============================================================================
// Transcription Client
// =============================================================================

/// Session-lifecycle client for realtime transcription.
///
/// Owns a [`RealtimeClient`] by composition and a readiness flag that is
/// exclusively mutated by the subscriptions wired at construction time:
/// `transcription_session.created` sets it, the local `close` event clears
/// it.
pub struct TranscriptionClient {
    /// Underlying connection client
    realtime: RealtimeClient,
    /// True once the server has acknowledged session creation
    session_created: Arc<AtomicBool>,
    /// Wakes readiness waiters exactly when the flag flips
    session_notify: Arc<Notify>,
    /// Bound for the readiness wait in `update_session`
    session_create_timeout: Duration,
}

impl TranscriptionClient {
    /// Create a new transcription client.
    ///
    /// Fails with [`RealtimeError::MissingCredential`] when no API key is
    /// configured. The readiness subscriptions wired here live for the
    /// lifetime of the client.
    pub fn new(config: ClientConfig) -> RealtimeResult<Self> {
        let session_create_timeout = Duration::from_millis(config.session_create_timeout_ms);
        let realtime = RealtimeClient::new(config)?;

        let session_created = Arc::new(AtomicBool::new(false));
        let session_notify = Arc::new(Notify::new());

        {
            let created = session_created.clone();
            let notify = session_notify.clone();
            let callback: EventCallback = Arc::new(move |_event: RealtimeEvent| {
                let created = created.clone();
                let notify = notify.clone();
                Box::pin(async move {
                    created.store(true, Ordering::SeqCst);
                    notify.notify_waiters();
                })
            });
            realtime.on(SESSION_CREATED_EVENT, callback);
        }

        // Re-arm on every disconnect, including error-initiated ones: a new
        // connection needs a fresh created handshake
        {
            let created = session_created.clone();
            let callback: EventCallback = Arc::new(move |_event: RealtimeEvent| {
                let created = created.clone();
                Box::pin(async move {
                    created.store(false, Ordering::SeqCst);
                })
            });
            realtime.on("close", callback);
        }

        Ok(Self {
            realtime,
            session_created,
            session_notify,
            session_create_timeout,
        })
    }

    /// Whether the underlying connection is open.
    pub fn is_connected(&self) -> bool {
        self.realtime.is_connected()
    }

    /// Access the underlying connection client, e.g. for raw `on` / `off` /
    /// `wait_for_next` subscriptions.
    pub fn realtime(&self) -> &RealtimeClient {
        &self.realtime
    }

    /// Connect and push the initial session configuration.
    ///
    /// Fails with [`RealtimeError::AlreadyConnected`] when already connected.
    /// The configuration update waits for the session-created handshake, so
    /// any handshake failure is propagated to the caller.
    pub async fn connect(&self, session: SessionConfig) -> RealtimeResult<()> {
        if self.is_connected() {
            return Err(RealtimeError::AlreadyConnected);
        }
        self.realtime.connect().await?;
        self.update_session(session).await
    }

    /// Wait until the server has acknowledged session creation.
    ///
    /// Fails with [`RealtimeError::NotConnected`] when not connected and with
    /// [`RealtimeError::Timeout`] when the configured bound elapses first.
    pub async fn wait_for_session_created(&self) -> RealtimeResult<()> {
        if !self.is_connected() {
            return Err(RealtimeError::NotConnected);
        }
        self.wait_ready().await
    }

    /// Update the transcription session configuration.
    ///
    /// A silent no-op while not connected, tolerating opportunistic calls.
    /// Otherwise waits for session readiness (bounded by
    /// [`ClientConfig::session_create_timeout_ms`]) and sends
    /// `transcription_session.update`.
    pub async fn update_session(&self, session: SessionConfig) -> RealtimeResult<()> {
        if !self.is_connected() {
            return Ok(());
        }
        self.wait_ready().await?;
        self.realtime
            .send("transcription_session.update", json!({ "session": session }))
            .await
    }

    /// Append raw audio bytes to the server-side input buffer.
    ///
    /// A no-op for empty input. The audio is base64-encoded into a single
    /// `input_audio_buffer.append` event; the caller chooses the chunking
    /// (the protocol allows up to 15 MiB per append, smaller chunks keep the
    /// server VAD responsive). The server sends no per-append confirmation.
    pub async fn append_input_audio(&self, audio: Bytes) -> RealtimeResult<()> {
        if audio.is_empty() {
            return Ok(());
        }
        self.realtime
            .send("input_audio_buffer.append", audio_append_payload(&audio))
            .await
    }

    /// Reset session readiness and close the underlying connection.
    pub async fn disconnect(&self) -> RealtimeResult<()> {
        self.session_created.store(false, Ordering::SeqCst);
        if self.realtime.is_connected() {
            self.realtime.disconnect().await?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Typed subscriptions
    // -------------------------------------------------------------------------

    /// Register a callback for VAD speech-start events.
    pub fn on_speech_started(&self, callback: SpeechStartedCallback) -> EventCallback {
        self.on_typed(SPEECH_STARTED_EVENT, callback)
    }

    /// Register a callback for VAD speech-stop events.
    pub fn on_speech_stopped(&self, callback: SpeechStoppedCallback) -> EventCallback {
        self.on_typed(SPEECH_STOPPED_EVENT, callback)
    }

    /// Register a callback for incremental transcript deltas.
    pub fn on_transcription_delta(&self, callback: TranscriptionDeltaCallback) -> EventCallback {
        self.on_typed(TRANSCRIPTION_DELTA_EVENT, callback)
    }

    /// Register a callback for completed utterance transcripts.
    pub fn on_transcription_completed(
        &self,
        callback: TranscriptionCompletedCallback,
    ) -> EventCallback {
        self.on_typed(TRANSCRIPTION_COMPLETED_EVENT, callback)
    }

    /// Register a callback for every inbound server event.
    pub fn on_any_server_event(&self, callback: EventCallback) -> EventCallback {
        self.realtime.on("server.*", callback)
    }

    /// Subscribe under a fixed event name, decoding the payload into `T`
    /// before invoking the callback. Returns the raw registry handle; pass it
    /// to [`RealtimeClient::off`] with the matching event name constant to
    /// unsubscribe.
    fn on_typed<T>(
        &self,
        event_name: &str,
        callback: Arc<
            dyn Fn(T) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
                + Send
                + Sync,
        >,
    ) -> EventCallback
    where
        T: DeserializeOwned + Send + 'static,
    {
        let raw: EventCallback = Arc::new(move |event: RealtimeEvent| {
            let callback = callback.clone();
            Box::pin(async move {
                match serde_json::from_value::<T>(event.payload) {
                    Ok(typed) => callback(typed).await,
                    Err(e) => {
                        tracing::warn!("failed to decode '{}' payload: {}", event.name, e);
                    }
                }
            })
        });
        self.realtime.on(event_name, raw)
    }

    /// Block cooperatively until the readiness flag flips, bounded by the
    /// configured timeout.
    async fn wait_ready(&self) -> RealtimeResult<()> {
        if self.session_created.load(Ordering::SeqCst) {
            return Ok(());
        }

        let limit = self.session_create_timeout;
        let wait = async {
            let notified = self.session_notify.notified();
            tokio::pin!(notified);
            loop {
                // Register interest before re-checking the flag so a
                // notification landing in between is not lost
                notified.as_mut().enable();
                if self.session_created.load(Ordering::SeqCst) {
                    return;
                }
                notified.as_mut().await;
                notified.set(self.session_notify.notified());
            }
        };

        tokio::time::timeout(limit, wait).await.map_err(|_| {
            RealtimeError::Timeout(format!(
                "session was not created within {}ms",
                limit.as_millis()
            ))
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::messages::TranscriptionDeltaEvent;
    use parking_lot::Mutex;

    fn test_client() -> TranscriptionClient {
        TranscriptionClient::new(ClientConfig::new("test_key")).unwrap()
    }

    #[test]
    fn test_new_requires_credential() {
        let result = TranscriptionClient::new(ClientConfig::default());
        assert!(matches!(result, Err(RealtimeError::MissingCredential)));
    }

    #[tokio::test]
    async fn test_update_session_is_noop_when_disconnected() {
        let client = test_client();
        // Lenient by design: no error, nothing sent
        client.update_session(SessionConfig::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_append_empty_audio_is_noop() {
        let client = test_client();
        // Empty input short-circuits before the connection check
        client.append_input_audio(Bytes::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_append_audio_requires_connection() {
        let client = test_client();
        let result = client
            .append_input_audio(Bytes::from(vec![0u8; 1024]))
            .await;
        assert!(matches!(result, Err(RealtimeError::NotConnected)));
    }

    #[tokio::test]
    async fn test_wait_for_session_created_requires_connection() {
        let client = test_client();
        let result = client.wait_for_session_created().await;
        assert!(matches!(result, Err(RealtimeError::NotConnected)));
    }

    #[tokio::test]
    async fn test_created_event_flips_readiness_and_close_resets_it() {
        let client = test_client();
        let dispatcher = client.realtime.dispatcher().clone();

        assert!(!client.session_created.load(Ordering::SeqCst));

        dispatcher
            .dispatch(
                SESSION_CREATED_EVENT,
                json!({"type": "transcription_session.created", "session": {}}),
            )
            .await;
        assert!(client.session_created.load(Ordering::SeqCst));

        dispatcher.dispatch("close", json!({"error": false})).await;
        assert!(!client.session_created.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_wait_ready_resolves_when_created_fires() {
        let client = Arc::new(test_client());
        let dispatcher = client.realtime.dispatcher().clone();

        let waiter = {
            let client = client.clone();
            tokio::spawn(async move { client.wait_ready().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        dispatcher
            .dispatch(
                SESSION_CREATED_EVENT,
                json!({"type": "transcription_session.created"}),
            )
            .await;

        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_wait_ready_times_out() {
        let config = ClientConfig {
            api_key: "test_key".to_string(),
            session_create_timeout_ms: 20,
            ..Default::default()
        };
        let client = TranscriptionClient::new(config).unwrap();

        let result = client.wait_ready().await;
        match result {
            Err(RealtimeError::Timeout(msg)) => assert!(msg.contains("20ms")),
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_typed_subscription_decodes_payload() {
        let client = test_client();
        let dispatcher = client.realtime.dispatcher().clone();

        let deltas = Arc::new(Mutex::new(Vec::new()));
        let collected = deltas.clone();
        let callback: TranscriptionDeltaCallback =
            Arc::new(move |event: TranscriptionDeltaEvent| {
                let collected = collected.clone();
                Box::pin(async move {
                    collected.lock().push(event.delta);
                })
            });
        client.on_transcription_delta(callback);

        dispatcher
            .dispatch(
                TRANSCRIPTION_DELTA_EVENT,
                json!({
                    "type": "conversation.item.input_audio_transcription.delta",
                    "event_id": "event_1",
                    "item_id": "item_1",
                    "content_index": 0,
                    "delta": "Hel"
                }),
            )
            .await;

        assert_eq!(deltas.lock().clone(), vec!["Hel".to_string()]);
    }

    #[tokio::test]
    async fn test_typed_subscription_skips_undecodable_payload() {
        let client = test_client();
        let dispatcher = client.realtime.dispatcher().clone();

        let count = Arc::new(AtomicBool::new(false));
        let seen = count.clone();
        let callback: TranscriptionDeltaCallback =
            Arc::new(move |_event: TranscriptionDeltaEvent| {
                let seen = seen.clone();
                Box::pin(async move {
                    seen.store(true, Ordering::SeqCst);
                })
            });
        client.on_transcription_delta(callback);

        // Missing required fields: logged and skipped, no panic
        dispatcher
            .dispatch(TRANSCRIPTION_DELTA_EVENT, json!({"type": "bogus"}))
            .await;

        assert!(!count.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_disconnect_resets_readiness() {
        let client = test_client();
        let dispatcher = client.realtime.dispatcher().clone();

        dispatcher
            .dispatch(SESSION_CREATED_EVENT, json!({"type": "created"}))
            .await;
        assert!(client.session_created.load(Ordering::SeqCst));

        client.disconnect().await.unwrap();
        assert!(!client.session_created.load(Ordering::SeqCst));
    }
}
