//! # Mobile Backend
//!
//! Maps the action vocabulary onto the native VPN plugin's methods. The
//! plugin only implements the tunnel lifecycle, so configuration, speed
//! test and evaluation actions answer `Unknown action`.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

use bridge_traits::envelope::SResponse;
use bridge_traits::host::{HostEventStream, MobilePlugin, PluginReady};
use bridge_traits::BridgeError;

use crate::backend::{actions, VpnBackend};
use crate::error::{BridgeCoreError, Result};
use crate::status::normalize_status;

#[derive(Clone)]
pub struct MobileBackend {
    plugin: Arc<dyn MobilePlugin>,
}

impl MobileBackend {
    pub fn new(plugin: Arc<dyn MobilePlugin>) -> Self {
        Self { plugin }
    }

    pub async fn check_ready(&self) -> Result<PluginReady> {
        Ok(self.plugin.check_ready().await?)
    }

    /// `vpnStateChange` / `vpnError` push events.
    pub async fn subscribe_events(&self) -> Result<Box<dyn HostEventStream>> {
        Ok(self.plugin.subscribe_events().await?)
    }

    async fn dispatch(
        &self,
        action: &str,
        params: Option<Value>,
    ) -> std::result::Result<SResponse, BridgeError> {
        match action {
            actions::STATUS => {
                let raw = self.plugin.get_status().await?;
                let status = normalize_status(&raw);
                Ok(SResponse::ok(serde_json::to_value(status).map_err(|e| {
                    BridgeError::InvalidResponse(e.to_string())
                })?))
            }
            actions::UP => {
                let Some(config) = params else {
                    return Ok(SResponse::transport_error("Config is required for connect"));
                };
                let config = serde_json::to_string(&config)
                    .map_err(|e| BridgeError::InvalidResponse(e.to_string()))?;
                self.plugin.connect(config).await?;
                Ok(SResponse::ok_empty())
            }
            actions::DOWN => {
                self.plugin.disconnect().await?;
                Ok(SResponse::ok_empty())
            }
            actions::VERSION => Ok(SResponse::ok(self.plugin.get_version().await?)),
            other => Ok(SResponse::transport_error(format!("Unknown action: {}", other))),
        }
    }
}

#[async_trait]
impl VpnBackend for MobileBackend {
    #[instrument(skip(self, params))]
    async fn run(&self, action: &str, params: Option<Value>) -> SResponse {
        match self.dispatch(action, params).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Plugin call failed");
                SResponse::transport_error(e.to_string())
            }
        }
    }

    async fn udid(&self) -> Result<String> {
        let udid = self.plugin.get_udid().await?;
        if udid.is_empty() {
            return Err(BridgeCoreError::InvalidResponse("plugin returned an empty UDID".into()));
        }
        Ok(udid)
    }
}

impl fmt::Debug for MobileBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MobileBackend").finish_non_exhaustive()
    }
}
