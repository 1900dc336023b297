//! # Event Bus System
//!
//! Typed, broadcast-based notifications from the bridge core to the UI layer,
//! built on `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: [`CoreEvent`] wraps one enum per domain (connection,
//!   auth, update)
//! - **EventBus**: central sender, cheap to clone
//! - **EventStream**: a subscription handle with optional filtering; dropping
//!   it unsubscribes
//!
//! ```text
//! ┌──────────────┐  emit   ┌───────────┐  subscribe  ┌────────────┐
//! │ StatusPoller ├────────>│           ├────────────>│ UI binding │
//! └──────────────┘         │ EventBus  │             └────────────┘
//! ┌──────────────┐  emit   │           │  subscribe  ┌────────────┐
//! │SessionManager├────────>│           ├────────────>│  Logger    │
//! └──────────────┘         └───────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut stream = bus.stream().filter(|e| matches!(e, CoreEvent::Auth(_)));
//!
//! bus.emit(CoreEvent::Auth(AuthEvent::LoggedOut)).ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event, CoreEvent::Auth(AuthEvent::LoggedOut));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; it may
//!   keep receiving.
//! - **`RecvError::Closed`**: every sender is gone, treat as shutdown.
//!
//! `emit` fails only when nobody is subscribed. Publishers ignore that case.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

pub use crate::config::DEFAULT_EVENT_BUFFER_SIZE;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the [`EventBus`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// VPN connection status transitions
    Connection(ConnectionEvent),
    /// Session lifecycle
    Auth(AuthEvent),
    /// Desktop self-update notifications
    Update(UpdateEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Connection(e) => e.description(),
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Update(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Connection(ConnectionEvent::StateChanged { state, .. })
                if state == "error" =>
            {
                EventSeverity::Error
            }
            CoreEvent::Auth(AuthEvent::SessionExpired { .. }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::LoggedIn) => EventSeverity::Info,
            CoreEvent::Update(UpdateEvent::Ready { .. }) => EventSeverity::Info,
            CoreEvent::Connection(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Connection Events
// ============================================================================

/// Normalized connection status as published by the status poller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ConnectionEvent {
    /// The normalized state differs from the previously published one.
    StateChanged {
        /// `disconnected | connecting | connected | reconnecting | disconnecting | error`
        state: String,
        running: bool,
        network_available: bool,
        /// Unix seconds when the tunnel came up.
        start_at: Option<i64>,
        error_code: Option<i32>,
        error_message: Option<String>,
    },
}

impl ConnectionEvent {
    fn description(&self) -> &str {
        match self {
            ConnectionEvent::StateChanged { .. } => "Connection state changed",
        }
    }
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Session lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// Login succeeded and tokens were persisted.
    LoggedIn,
    /// Tokens were cleared on request.
    LoggedOut,
    /// Stored tokens validated against the profile endpoint.
    SessionRestored,
    /// The access token was replaced by a refresh.
    TokenRefreshed,
    /// Refresh failed; the session was demoted to anonymous.
    SessionExpired {
        reason: String,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::LoggedIn => "User logged in",
            AuthEvent::LoggedOut => "User logged out",
            AuthEvent::SessionRestored => "Session restored",
            AuthEvent::TokenRefreshed => "Access token refreshed",
            AuthEvent::SessionExpired { .. } => "Session expired",
        }
    }
}

// ============================================================================
// Update Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum UpdateEvent {
    /// An update was downloaded and is ready to apply.
    Ready {
        current_version: String,
        new_version: String,
        release_notes: Option<String>,
    },
}

impl UpdateEvent {
    fn description(&self) -> &str {
        match self {
            UpdateEvent::Ready { .. } => "Update ready to install",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for broadcasting events to multiple subscribers.
///
/// Cloning shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// A capacity of `0` is raised to `1`; `broadcast::channel` rejects zero.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a raw receiver for all future events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Creates an [`EventStream`] subscription.
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Subscription handle with optional filtering.
///
/// Dropping the stream unsubscribes it from the bus.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()` / `try_recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn matches(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |f| f(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> CoreEvent {
        CoreEvent::Connection(ConnectionEvent::StateChanged {
            state: "connected".to_string(),
            running: true,
            network_available: true,
            start_at: Some(1_700_000_000),
            error_code: None,
            error_message: None,
        })
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_fails() {
        let bus = EventBus::new(10);
        assert!(bus.emit(CoreEvent::Auth(AuthEvent::LoggedOut)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        assert_eq!(bus.emit(connected()).unwrap(), 2);

        assert_eq!(first.recv().await.unwrap(), connected());
        assert_eq!(second.recv().await.unwrap(), connected());
    }

    #[tokio::test]
    async fn test_stream_drop_unsubscribes() {
        let bus = EventBus::default();
        let stream = bus.stream();
        assert_eq!(bus.subscriber_count(), 1);

        drop(stream);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = bus.stream().filter(|e| matches!(e, CoreEvent::Auth(_)));

        bus.emit(connected()).unwrap();
        bus.emit(CoreEvent::Auth(AuthEvent::TokenRefreshed)).unwrap();

        assert_eq!(
            stream.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::TokenRefreshed)
        );
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut stream = bus.stream();

        for _ in 0..5 {
            bus.emit(CoreEvent::Auth(AuthEvent::TokenRefreshed)).unwrap();
        }

        assert!(matches!(stream.try_recv(), Some(Err(RecvError::Lagged(_)))));
        assert!(matches!(stream.try_recv(), Some(Ok(_))));
    }

    #[test]
    fn test_event_severity() {
        let error_state = CoreEvent::Connection(ConnectionEvent::StateChanged {
            state: "error".to_string(),
            running: false,
            network_available: true,
            start_at: None,
            error_code: Some(570),
            error_message: Some("tunnel failed".to_string()),
        });

        assert_eq!(error_state.severity(), EventSeverity::Error);
        assert_eq!(connected().severity(), EventSeverity::Info);
        assert_eq!(
            CoreEvent::Auth(AuthEvent::SessionExpired {
                reason: "refresh rejected".to_string()
            })
            .severity(),
            EventSeverity::Warning
        );
        assert_eq!(
            CoreEvent::Auth(AuthEvent::TokenRefreshed).severity(),
            EventSeverity::Debug
        );
        assert!(EventSeverity::Error > EventSeverity::Warning);
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Update(UpdateEvent::Ready {
            current_version: "0.3.1".to_string(),
            new_version: "0.4.0".to_string(),
            release_notes: None,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Update");
        assert_eq!(json["payload"]["event"], "Ready");
        assert_eq!(json["payload"]["new_version"], "0.4.0");

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.description(), "Update ready to install");
    }
}
