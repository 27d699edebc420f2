//! Realtime WebSocket connection client.
//!
//! Manages exactly one logical connection to the realtime endpoint and
//! translates between the wire representation and named dispatcher events.
//!
//! # Namespace dispatch
//!
//! Every inbound frame of type `T` is dispatched twice: under `server.T` and
//! under the wildcard `server.*`. Every outbound event is dispatched under
//! `client.T` and `client.*` *before* the serialized frame is handed to the
//! socket writer, so local listeners observe the event even if the transport
//! write later fails asynchronously.
//!
//! # Connection lifecycle
//!
//! ```text
//! Disconnected --connect()--> Connecting --handshake ok--> Connected
//!      ^                                                       |
//!      +---------- close / error / disconnect() ---------------+
//! ```
//!
//! A transport error or server close after the handshake is not surfaced to
//! the original `connect()` caller; it transitions the state back to
//! `Disconnected` and dispatches a local `close` event carrying
//! `{"error": bool}`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;

use super::base::{ConnectionState, EventCallback, RealtimeError, RealtimeResult};
use super::config::{ClientConfig, REALTIME_BETA_HEADER};
use super::messages::build_envelope;
use crate::core::events::{EventDispatcher, RealtimeEvent};

/// Channel capacity for outbound WebSocket frames.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Grace period for the connection task to wind down on disconnect.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// =============================================================================
// Realtime Client
// =============================================================================

/// WebSocket client for the realtime transcription endpoint.
///
/// Holds the [`EventDispatcher`] by composition and exposes the registry
/// operations callers need (`on` / `off` / `wait_for_next`). All mutable
/// state is owned by this client and its connection task; no external code
/// can mutate connection state directly.
pub struct RealtimeClient {
    /// Client configuration
    config: ClientConfig,
    /// Named-event registry shared with the connection task
    dispatcher: Arc<EventDispatcher>,
    /// Connection state, mutated together with socket ownership
    state: Arc<RwLock<ConnectionState>>,
    /// Connected flag for lock-free checks (shared with the connection task)
    connected: Arc<AtomicBool>,
    /// Outbound frame channel for the live socket, if any
    ws_sender: Arc<Mutex<Option<mpsc::Sender<String>>>>,
    /// Shutdown signal for the live connection task, if any
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    /// Connection task handle
    connection_handle: Mutex<Option<JoinHandle<()>>>,
    /// Generation counter identifying the current socket. Teardown of a
    /// superseded connection must not clobber its successor's state.
    generation: Arc<AtomicU64>,
}

impl RealtimeClient {
    /// Create a new client.
    ///
    /// Fails with [`RealtimeError::MissingCredential`] when the configured
    /// API key is empty. The credential is taken from the configuration
    /// only; the client never consults the process environment.
    pub fn new(config: ClientConfig) -> RealtimeResult<Self> {
        if config.api_key.is_empty() {
            return Err(RealtimeError::MissingCredential);
        }

        Ok(Self {
            config,
            dispatcher: Arc::new(EventDispatcher::new()),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            connected: Arc::new(AtomicBool::new(false)),
            ws_sender: Arc::new(Mutex::new(None)),
            shutdown_tx: Mutex::new(None),
            connection_handle: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Whether the client currently owns an open socket.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Get the current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Register a persistent subscription; see [`EventDispatcher::on`].
    pub fn on(&self, event_name: impl Into<String>, callback: EventCallback) -> EventCallback {
        self.dispatcher.on(event_name, callback)
    }

    /// Remove subscriptions; see [`EventDispatcher::off`].
    pub fn off(&self, event_name: &str, callback: Option<&EventCallback>) {
        self.dispatcher.off(event_name, callback);
    }

    /// Wait for the next event under `event_name`; see
    /// [`EventDispatcher::wait_for_next`].
    pub async fn wait_for_next(
        &self,
        event_name: &str,
        wait_timeout: Option<Duration>,
    ) -> RealtimeResult<RealtimeEvent> {
        self.dispatcher.wait_for_next(event_name, wait_timeout).await
    }

    pub(crate) fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Connect to the realtime endpoint.
    ///
    /// Fails fast with [`RealtimeError::AlreadyConnected`] unless the state
    /// is `Disconnected`. Resolves once the WebSocket handshake completes;
    /// any transport failure before that rejects with
    /// [`RealtimeError::ConnectFailed`] and leaves the state `Disconnected`.
    pub async fn connect(&self) -> RealtimeResult<()> {
        {
            let mut state = self.state.write();
            if *state != ConnectionState::Disconnected {
                return Err(RealtimeError::AlreadyConnected);
            }
            *state = ConnectionState::Connecting;
        }

        let request = match self.build_upgrade_request() {
            Ok(request) => request,
            Err(e) => {
                *self.state.write() = ConnectionState::Disconnected;
                return Err(e);
            }
        };

        let (ws_stream, _response) = match tokio_tungstenite::connect_async(request).await {
            Ok(connected) => connected,
            Err(e) => {
                *self.state.write() = ConnectionState::Disconnected;
                return Err(RealtimeError::ConnectFailed(format!(
                    "could not connect to \"{}\": {e}",
                    self.config.url
                )));
            }
        };

        tracing::info!("Connected to \"{}\"", self.config.url);

        let (mut ws_sink, mut ws_stream) = ws_stream.split();

        let (tx, mut rx) = mpsc::channel::<String>(WS_CHANNEL_CAPACITY);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        *self.ws_sender.lock() = Some(tx);
        *self.shutdown_tx.lock() = Some(shutdown_tx);

        let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        // Clone shared state for the connection task
        let dispatcher = self.dispatcher.clone();
        let state = self.state.clone();
        let connected = self.connected.clone();
        let ws_sender = self.ws_sender.clone();
        let generation = self.generation.clone();
        let endpoint = self.config.url.clone();

        self.connected.store(true, Ordering::SeqCst);
        *self.state.write() = ConnectionState::Connected;

        let handle = tokio::spawn(async move {
            let mut error_close = false;

            loop {
                tokio::select! {
                    // Flush queued outbound frames before reacting to a
                    // shutdown signal, so a send() that already returned is
                    // not silently dropped
                    biased;

                    // Outgoing frames, already serialized by send()
                    Some(text) = rx.recv() => {
                        if let Err(e) = ws_sink.send(Message::Text(text.into())).await {
                            tracing::error!("Failed to send WebSocket message: {}", e);
                            error_close = true;
                            break;
                        }
                    }

                    // Incoming frames
                    msg = ws_stream.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                Self::handle_frame(&dispatcher, &text).await;
                            }
                            Some(Ok(Message::Close(frame))) => {
                                tracing::info!("WebSocket closed by server: {:?}", frame);
                                break;
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    tracing::error!("Failed to send pong: {}", e);
                                }
                            }
                            // The protocol carries JSON text frames only
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                tracing::error!("WebSocket error: {}", e);
                                error_close = true;
                                break;
                            }
                            None => {
                                tracing::info!("WebSocket stream ended");
                                break;
                            }
                        }
                    }

                    // Graceful shutdown requested by disconnect()
                    _ = &mut shutdown_rx => {
                        let _ = ws_sink.send(Message::Close(None)).await;
                        break;
                    }
                }
            }

            // Only the task owning the current socket may release state; a
            // superseded connection must not clobber its successor.
            if generation.load(Ordering::SeqCst) == my_generation {
                connected.store(false, Ordering::SeqCst);
                *state.write() = ConnectionState::Disconnected;
                *ws_sender.lock() = None;
            }

            tracing::info!("Disconnected from \"{}\"", endpoint);
            dispatcher
                .dispatch("close", json!({ "error": error_close }))
                .await;
        });

        *self.connection_handle.lock() = Some(handle);

        Ok(())
    }

    /// Close the current connection and clear socket ownership.
    ///
    /// Waits for the connection task to wind down (bounded by a grace
    /// period), so the local `close` event has been dispatched by the time
    /// this returns. A no-op when already disconnected.
    pub async fn disconnect(&self) -> RealtimeResult<()> {
        if let Some(shutdown_tx) = self.shutdown_tx.lock().take() {
            let _ = shutdown_tx.send(());
        }

        self.connected.store(false, Ordering::SeqCst);
        *self.state.write() = ConnectionState::Disconnected;
        *self.ws_sender.lock() = None;

        let handle = self.connection_handle.lock().take();
        if let Some(handle) = handle {
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, handle).await;
        }

        Ok(())
    }

    /// Send an event to the endpoint.
    ///
    /// Builds the envelope (unique `event_id`, `type`, payload fields),
    /// dispatches it locally under `client.<type>` and `client.*`, then
    /// serializes and hands it to the socket writer. Dispatch happens before
    /// the write on purpose: local listeners observe the outbound event even
    /// if the transport write itself later fails.
    ///
    /// Fails with [`RealtimeError::NotConnected`] while not connected and
    /// with [`RealtimeError::InvalidPayload`] for non-object payloads; in
    /// both cases nothing is dispatched or written.
    pub async fn send(&self, event_type: &str, payload: Value) -> RealtimeResult<()> {
        if !self.is_connected() {
            return Err(RealtimeError::NotConnected);
        }

        let envelope = build_envelope(event_type, &payload)?;

        self.dispatcher
            .dispatch(&format!("client.{event_type}"), envelope.clone())
            .await;
        self.dispatcher.dispatch("client.*", envelope.clone()).await;

        let text = serde_json::to_string(&envelope)
            .map_err(|e| RealtimeError::SerializationError(e.to_string()))?;

        tracing::debug!("sent: {}", event_type);

        let sender = self.ws_sender.lock().clone();
        match sender {
            Some(sender) => sender.send(text).await.map_err(|e| {
                RealtimeError::WebSocketError(format!("failed to queue outbound frame: {e}"))
            }),
            None => Err(RealtimeError::NotConnected),
        }
    }

    /// Build the WebSocket upgrade request with authentication and protocol
    /// version headers.
    fn build_upgrade_request(&self) -> RealtimeResult<http::Request<()>> {
        let url = Url::parse(&self.config.url)
            .map_err(|e| RealtimeError::ConnectFailed(format!("invalid endpoint URL: {e}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| RealtimeError::ConnectFailed("endpoint URL has no host".to_string()))?;
        let host_header = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        http::Request::builder()
            .uri(&self.config.url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("OpenAI-Beta", REALTIME_BETA_HEADER)
            .header(
                "Sec-WebSocket-Key",
                tungstenite::handshake::client::generate_key(),
            )
            .header("Sec-WebSocket-Version", "13")
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Host", host_header)
            .body(())
            .map_err(|e| RealtimeError::ConnectFailed(e.to_string()))
    }

    /// Handle one inbound text frame: parse, then dispatch under
    /// `server.<type>` and `server.*`.
    ///
    /// A malformed frame is logged and dropped; it never panics and never
    /// affects subsequent frames.
    async fn handle_frame(dispatcher: &EventDispatcher, text: &str) {
        match Self::parse_frame(text) {
            Ok((event_type, payload)) => {
                tracing::debug!("received: {}", event_type);
                dispatcher
                    .dispatch(&format!("server.{event_type}"), payload.clone())
                    .await;
                dispatcher.dispatch("server.*", payload).await;
            }
            Err(e) => {
                tracing::warn!("{}", e);
            }
        }
    }

    /// Parse an inbound frame into its event type and payload.
    fn parse_frame(text: &str) -> RealtimeResult<(String, Value)> {
        let payload: Value = serde_json::from_str(text)
            .map_err(|e| RealtimeError::MalformedFrame(format!("invalid JSON frame: {e}")))?;
        let event_type = payload
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                RealtimeError::MalformedFrame("frame is missing the 'type' field".to_string())
            })?
            .to_string();
        Ok((event_type, payload))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ClientConfig {
        ClientConfig::new("test_key")
    }

    #[test]
    fn test_new_requires_credential() {
        let result = RealtimeClient::new(ClientConfig::default());
        match result {
            Err(RealtimeError::MissingCredential) => {}
            other => panic!("expected MissingCredential, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_new_starts_disconnected() {
        let client = RealtimeClient::new(test_config()).unwrap();
        assert!(!client.is_connected());
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let client = RealtimeClient::new(test_config()).unwrap();
        let result = client.send("transcription_session.update", json!({})).await;
        match result {
            Err(RealtimeError::NotConnected) => {}
            other => panic!("expected NotConnected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connect_failure_resets_state() {
        let config = ClientConfig {
            api_key: "test_key".to_string(),
            // Nothing listens here; the handshake fails immediately
            url: "ws://127.0.0.1:9".to_string(),
            ..Default::default()
        };
        let client = RealtimeClient::new(config).unwrap();

        let result = client.connect().await;
        match result {
            Err(RealtimeError::ConnectFailed(_)) => {}
            other => panic!("expected ConnectFailed, got {other:?}"),
        }
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_without_connection_is_noop() {
        let client = RealtimeClient::new(test_config()).unwrap();
        client.disconnect().await.unwrap();
        assert!(!client.is_connected());
    }

    #[test]
    fn test_parse_frame_extracts_type() {
        let (event_type, payload) =
            RealtimeClient::parse_frame(r#"{"type": "transcription_session.created", "session": {}}"#)
                .unwrap();
        assert_eq!(event_type, "transcription_session.created");
        assert!(payload["session"].is_object());
    }

    #[test]
    fn test_parse_frame_rejects_invalid_json() {
        let result = RealtimeClient::parse_frame("not json at all");
        match result {
            Err(RealtimeError::MalformedFrame(msg)) => assert!(msg.contains("invalid JSON")),
            other => panic!("expected MalformedFrame, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_frame_rejects_missing_type() {
        let result = RealtimeClient::parse_frame(r#"{"session": {}}"#);
        match result {
            Err(RealtimeError::MalformedFrame(msg)) => assert!(msg.contains("'type'")),
            other => panic!("expected MalformedFrame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_build_upgrade_request_rejects_bad_url() {
        let config = ClientConfig {
            api_key: "test_key".to_string(),
            url: "not a url".to_string(),
            ..Default::default()
        };
        let client = RealtimeClient::new(config).unwrap();
        let result = client.connect().await;
        assert!(matches!(result, Err(RealtimeError::ConnectFailed(_))));
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    }
}
