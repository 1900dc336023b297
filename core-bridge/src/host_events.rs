//! Forwarding of host-pushed events.
//!
//! Native shells push VPN state changes, VPN errors and update
//! notifications. State changes and errors go through the poller's
//! [`StatusPublisher`] so they share its de-duplication; update
//! notifications are re-emitted as [`UpdateEvent::Ready`].

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use bridge_traits::host::{HostEvent, HostEventStream};
use core_runtime::events::{CoreEvent, EventBus, UpdateEvent};

use crate::error::{BridgeCoreError, Result};
use crate::poller::StatusPublisher;
use crate::status::{error_status, normalize_status};

#[derive(Debug, Clone)]
pub struct HostEventPump {
    publisher: Arc<StatusPublisher>,
    event_bus: EventBus,
}

impl HostEventPump {
    pub fn new(publisher: Arc<StatusPublisher>, event_bus: EventBus) -> Self {
        Self {
            publisher,
            event_bus,
        }
    }

    pub async fn handle(&self, event: HostEvent) {
        match event {
            HostEvent::VpnStateChange(raw) => {
                debug!("Host pushed a state change");
                self.publisher.publish(normalize_status(&raw)).await;
            }
            HostEvent::VpnError { code, message } => {
                warn!(code = ?code, message = %message, "Host reported a VPN error");
                let previous = self.publisher.current().await;
                self.publisher
                    .publish(error_status(previous.as_ref(), code, message))
                    .await;
            }
            HostEvent::UpdateReady(update) => {
                info!(new_version = %update.new_version, "Update ready");
                let _ = self.event_bus.emit(CoreEvent::Update(UpdateEvent::Ready {
                    current_version: update.current_version,
                    new_version: update.new_version,
                    release_notes: update.release_notes,
                }));
            }
        }
    }

    /// Drain `stream` until the host closes it.
    pub async fn run(self, mut stream: Box<dyn HostEventStream>) {
        while let Some(event) = stream.next().await {
            self.handle(event).await;
        }
        debug!("Host event stream closed");
    }

    /// [`run`](Self::run) on a background task of the current runtime.
    pub fn spawn(self, stream: Box<dyn HostEventStream>) -> Result<JoinHandle<()>> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| BridgeCoreError::NoRuntime(e.to_string()))?;
        Ok(handle.spawn(self.run(stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::host::UpdateInfo;
    use core_runtime::events::ConnectionEvent;
    use serde_json::json;
    use std::collections::VecDeque;

    struct ScriptedStream(VecDeque<HostEvent>);

    #[async_trait]
    impl HostEventStream for ScriptedStream {
        async fn next(&mut self) -> Option<HostEvent> {
            self.0.pop_front()
        }
    }

    #[tokio::test]
    async fn test_forwards_all_event_kinds() {
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        let publisher = Arc::new(StatusPublisher::new(bus.clone()));
        let pump = HostEventPump::new(publisher.clone(), bus.clone());

        let connected = json!({"state": "connected", "connectedAt": 1_700_000_000_000_i64});
        let stream = ScriptedStream(VecDeque::from(vec![
            HostEvent::VpnStateChange(connected.clone()),
            HostEvent::VpnStateChange(connected),
            HostEvent::VpnError {
                code: None,
                message: "tunnel reset".into(),
            },
            HostEvent::UpdateReady(UpdateInfo {
                current_version: "0.3.0".into(),
                new_version: "0.4.0".into(),
                release_notes: None,
            }),
        ]));

        pump.run(Box::new(stream)).await;

        let received: Vec<CoreEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
        assert_eq!(received.len(), 3);

        assert!(matches!(
            &received[0],
            CoreEvent::Connection(ConnectionEvent::StateChanged {
                state,
                start_at: Some(1_700_000_000),
                ..
            }) if state == "connected"
        ));
        assert!(matches!(
            &received[1],
            CoreEvent::Connection(ConnectionEvent::StateChanged {
                state,
                running: false,
                error_code: Some(570),
                start_at: Some(1_700_000_000),
                ..
            }) if state == "error"
        ));
        assert!(matches!(
            &received[2],
            CoreEvent::Update(UpdateEvent::Ready { new_version, .. }) if new_version == "0.4.0"
        ));
    }
}
