//! # Status Poller
//!
//! Samples `status` on the active backend at a fixed interval and
//! republishes it on the event bus only when it changes.
//!
//! ## Publishing
//!
//! All status sources (polls, host-pushed state changes and host-pushed
//! errors) go through one [`StatusPublisher`], which remembers the last
//! published status and drops exact repeats.
//!
//! A failed poll (transport error or non-zero code) is published as
//! `disconnected` carrying the failure as its error. Consecutive failures
//! are published once; the next successful poll publishes again.
//!
//! ## Lifecycle
//!
//! Each loop owns a running flag checked before every tick.
//! [`StatusPoller::stop`] clears it; a request already in flight is allowed
//! to finish but its result is still published. Starting while a loop runs
//! fails with [`BridgeCoreError::PollerAlreadyRunning`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use bridge_traits::envelope::SResponse;
use core_runtime::events::{CoreEvent, EventBus};

use crate::backend::{actions, VpnBackend};
use crate::error::{BridgeCoreError, Result};
use crate::types::{ConnectionState, ControlError, StatusResponseData};

#[derive(Debug, Default)]
struct PublisherState {
    last: Option<StatusResponseData>,
    failing: bool,
}

/// Edge-triggered status publisher.
#[derive(Debug)]
pub struct StatusPublisher {
    event_bus: EventBus,
    state: Mutex<PublisherState>,
}

impl StatusPublisher {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            event_bus,
            state: Mutex::new(PublisherState::default()),
        }
    }

    /// Last published status.
    pub async fn current(&self) -> Option<StatusResponseData> {
        self.state.lock().await.last.clone()
    }

    /// Publish `status` unless it equals the last one. Returns whether an
    /// event was emitted.
    pub async fn publish(&self, status: StatusResponseData) -> bool {
        let mut state = self.state.lock().await;
        state.failing = false;

        if state.last.as_ref() == Some(&status) {
            return false;
        }

        debug!(state = %status.state, running = status.running, "Connection state changed");
        let _ = self
            .event_bus
            .emit(CoreEvent::Connection(status.to_event()));
        state.last = Some(status);
        true
    }

    /// Publish a poll failure as `disconnected` with a reason, once per run
    /// of consecutive failures.
    pub async fn publish_failure(&self, code: i32, message: impl Into<String>) -> bool {
        let mut state = self.state.lock().await;
        if state.failing {
            return false;
        }
        state.failing = true;

        let status = StatusResponseData {
            state: ConnectionState::Disconnected,
            running: false,
            network_available: state.last.as_ref().map_or(true, |s| s.network_available),
            start_at: None,
            error: Some(ControlError::new(code, message)),
            retrying: false,
        };
        if state.last.as_ref() == Some(&status) {
            return false;
        }

        let _ = self
            .event_bus
            .emit(CoreEvent::Connection(status.to_event()));
        state.last = Some(status);
        true
    }
}

pub struct StatusPoller {
    backend: Arc<dyn VpnBackend>,
    publisher: Arc<StatusPublisher>,
    interval: Duration,
    current: std::sync::Mutex<Option<Arc<AtomicBool>>>,
}

impl StatusPoller {
    pub fn new(
        backend: Arc<dyn VpnBackend>,
        publisher: Arc<StatusPublisher>,
        interval: Duration,
    ) -> Self {
        Self {
            backend,
            publisher,
            // tokio::time::interval panics on zero
            interval: interval.max(Duration::from_millis(1)),
            current: std::sync::Mutex::new(None),
        }
    }

    pub fn publisher(&self) -> &Arc<StatusPublisher> {
        &self.publisher
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.slot()
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Spawn the polling loop on the current Tokio runtime. The first poll
    /// happens immediately.
    ///
    /// # Errors
    ///
    /// - [`BridgeCoreError::PollerAlreadyRunning`] when a loop is active
    /// - [`BridgeCoreError::NoRuntime`] outside a Tokio runtime
    pub fn start(&self) -> Result<()> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| BridgeCoreError::NoRuntime(e.to_string()))?;

        let mut current = self.slot();
        if current.as_ref().is_some_and(|flag| flag.load(Ordering::SeqCst)) {
            return Err(BridgeCoreError::PollerAlreadyRunning);
        }

        let running = Arc::new(AtomicBool::new(true));
        *current = Some(Arc::clone(&running));

        let backend = Arc::clone(&self.backend);
        let publisher = Arc::clone(&self.publisher);
        let interval = self.interval;
        handle.spawn(async move {
            run_loop(backend, publisher, interval, running).await;
        });

        info!(interval_ms = self.interval.as_millis() as u64, "Status poller started");
        Ok(())
    }

    /// Stop before the next tick. Does not abort an in-flight request.
    pub fn stop(&self) {
        if let Some(flag) = self.slot().take() {
            flag.store(false, Ordering::SeqCst);
            info!("Status poller stopped");
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<AtomicBool>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one poll and publish the result.
    pub async fn poll_once(&self) -> bool {
        poll(self.backend.as_ref(), &self.publisher).await
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for StatusPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPoller")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

async fn run_loop(
    backend: Arc<dyn VpnBackend>,
    publisher: Arc<StatusPublisher>,
    interval: Duration,
    running: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if !running.load(Ordering::SeqCst) {
            break;
        }
        poll(backend.as_ref(), &publisher).await;
    }

    debug!("Status poll loop exited");
}

#[instrument(skip_all)]
async fn poll(backend: &dyn VpnBackend, publisher: &StatusPublisher) -> bool {
    let response = backend.run(actions::STATUS, None).await;
    match decode_status(response) {
        Ok(status) => publisher.publish(status).await,
        Err((code, message)) => {
            warn!(code, message = %message, "Status poll failed");
            publisher.publish_failure(code, message).await
        }
    }
}

fn decode_status(response: SResponse) -> std::result::Result<StatusResponseData, (i32, String)> {
    if !response.is_ok() {
        let message = response.message_or_default().to_string();
        return Err((response.code, message));
    }

    let typed = response.into_typed::<StatusResponseData>();
    if !typed.is_ok() {
        return Err((typed.code, typed.message_or_default().to_string()));
    }
    typed
        .data
        .ok_or_else(|| (-1, "Status response has no data".to_string()))
}
