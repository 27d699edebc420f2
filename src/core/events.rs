//! Named-event dispatch registry.
//!
//! Decouples producers and consumers of named events inside a single process.
//! Event names are dot-separated strings; the realtime client dispatches every
//! wire event under both its exact name (`server.session.created`) and the
//! direction wildcard (`server.*`), so subscribers choose their granularity by
//! the name they register under. The registry itself does exact-name matching
//! only.
//!
//! Callbacks are async and are awaited sequentially in registration order. A
//! panicking callback is isolated and logged; it never prevents the remaining
//! callbacks from running.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::core::realtime::{EventCallback, RealtimeError, RealtimeResult};

// =============================================================================
// Event Type
// =============================================================================

/// A single named event flowing through the dispatcher.
///
/// The payload is always a JSON object: inbound frames are dispatched as
/// received (including their `type` field), outbound events as the full
/// envelope (including the generated `event_id`).
#[derive(Debug, Clone)]
pub struct RealtimeEvent {
    /// Dot-separated event name, e.g. `server.transcription_session.created`
    pub name: String,
    /// JSON object payload
    pub payload: Value,
}

impl RealtimeEvent {
    /// Create a new event.
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

// =============================================================================
// Event Dispatcher
// =============================================================================

/// Named-event subscribe/dispatch/unsubscribe registry with one-shot wait
/// support.
///
/// Held by composition inside [`RealtimeClient`](crate::core::realtime::RealtimeClient),
/// which exposes the subset of operations callers need.
#[derive(Default)]
pub struct EventDispatcher {
    /// Persistent subscriptions, keyed by exact event name
    handlers: Mutex<HashMap<String, Vec<EventCallback>>>,
    /// Pending one-shot waiters, consumed by the next matching dispatch
    waiters: Mutex<HashMap<String, Vec<oneshot::Sender<RealtimeEvent>>>>,
}

impl EventDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a persistent subscription for `event_name`.
    ///
    /// Multiple subscriptions to the same name are all invoked, in
    /// registration order. Returns a clone of the callback handle; pass it to
    /// [`off`](Self::off) to remove this specific subscription.
    pub fn on(&self, event_name: impl Into<String>, callback: EventCallback) -> EventCallback {
        let handle = callback.clone();
        self.handlers
            .lock()
            .entry(event_name.into())
            .or_default()
            .push(callback);
        handle
    }

    /// Remove one matching subscription, or every subscription for
    /// `event_name` when no callback is given.
    ///
    /// Matching is by callback identity (`Arc::ptr_eq`). No-op if nothing
    /// matches.
    pub fn off(&self, event_name: &str, callback: Option<&EventCallback>) {
        let mut handlers = self.handlers.lock();
        match callback {
            Some(target) => {
                if let Some(list) = handlers.get_mut(event_name) {
                    if let Some(pos) = list.iter().position(|cb| Arc::ptr_eq(cb, target)) {
                        list.remove(pos);
                    }
                    if list.is_empty() {
                        handlers.remove(event_name);
                    }
                }
            }
            None => {
                handlers.remove(event_name);
            }
        }
    }

    /// Wait for the next event dispatched under exactly `event_name`.
    ///
    /// Implemented as a self-consuming registration: the waiter is fulfilled
    /// by the next matching [`dispatch`](Self::dispatch) and never sees later
    /// events. With `wait_timeout = None` the wait is unbounded; otherwise a
    /// lapsed timeout yields [`RealtimeError::Timeout`]. A wait cut short by
    /// [`clear`](Self::clear) reports `Timeout` as well.
    pub async fn wait_for_next(
        &self,
        event_name: &str,
        wait_timeout: Option<Duration>,
    ) -> RealtimeResult<RealtimeEvent> {
        let (tx, rx) = oneshot::channel();
        self.waiters
            .lock()
            .entry(event_name.to_string())
            .or_default()
            .push(tx);

        let received = match wait_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(result) => result,
                Err(_) => {
                    // Drop the stale sender so it does not linger in the map
                    self.prune_closed_waiters(event_name);
                    return Err(RealtimeError::Timeout(format!(
                        "no '{}' event within {}ms",
                        event_name,
                        limit.as_millis()
                    )));
                }
            },
            None => rx.await,
        };

        received.map_err(|_| {
            RealtimeError::Timeout(format!("wait for '{event_name}' was cancelled"))
        })
    }

    /// Dispatch `payload` to every subscription registered under exactly
    /// `event_name`, then fulfil any pending one-shot waiters on that name.
    ///
    /// Callbacks run sequentially in registration order and are each awaited
    /// to completion before the next, so all listeners observe the event
    /// before the caller proceeds to the next frame. A panic inside one
    /// callback is caught and logged without affecting the others.
    pub async fn dispatch(&self, event_name: &str, payload: Value) {
        let event = RealtimeEvent::new(event_name, payload);

        // Snapshot under the lock, invoke outside it: callbacks may
        // re-enter the registry to subscribe or unsubscribe.
        let callbacks: Vec<EventCallback> = self
            .handlers
            .lock()
            .get(event_name)
            .map(|list| list.to_vec())
            .unwrap_or_default();

        for callback in callbacks {
            if AssertUnwindSafe(callback(event.clone()))
                .catch_unwind()
                .await
                .is_err()
            {
                tracing::error!("event callback panicked for '{}'", event_name);
            }
        }

        let waiters = self
            .waiters
            .lock()
            .remove(event_name)
            .unwrap_or_default();
        for waiter in waiters {
            // A closed receiver just means the waiter gave up (timeout)
            let _ = waiter.send(event.clone());
        }
    }

    /// Drop all subscriptions and pending waiters.
    pub fn clear(&self) {
        self.handlers.lock().clear();
        self.waiters.lock().clear();
    }

    /// Remove waiters whose receiving side has been dropped.
    fn prune_closed_waiters(&self, event_name: &str) {
        let mut waiters = self.waiters.lock();
        if let Some(list) = waiters.get_mut(event_name) {
            list.retain(|tx| !tx.is_closed());
            if list.is_empty() {
                waiters.remove(event_name);
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
