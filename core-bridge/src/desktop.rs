//! # Desktop Backend
//!
//! Drives the VPN daemon through the desktop shell's IPC. Every action goes
//! through the `daemon_exec` command; the shell also exposes device,
//! service and updater commands that only exist on desktop.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

use bridge_traits::envelope::SResponse;
use bridge_traits::host::{DesktopIpc, HostEventStream, UpdateInfo};

use crate::backend::{actions, udid_from_envelope, VpnBackend};
use crate::error::{BridgeCoreError, Result};
use crate::status::normalize_status;
use crate::types::{PlatformInfo, UploadLogParams, UploadLogResult};

/// Shell commands.
pub mod commands {
    pub const DAEMON_EXEC: &str = "daemon_exec";
    pub const GET_UDID: &str = "get_udid";
    pub const GET_PLATFORM_INFO: &str = "get_platform_info";
    pub const GET_PID: &str = "get_pid";
    pub const ADMIN_REINSTALL_SERVICE: &str = "admin_reinstall_service";
    pub const APPLY_UPDATE_NOW: &str = "apply_update_now";
    pub const CHECK_UPDATE_NOW: &str = "check_update_now";
    pub const GET_UPDATE_STATUS: &str = "get_update_status";
    pub const SYNC_LOCALE: &str = "sync_locale";
    pub const UPLOAD_SERVICE_LOG: &str = "upload_service_log_command";
}

#[derive(Clone)]
pub struct DesktopBackend {
    ipc: Arc<dyn DesktopIpc>,
}

impl DesktopBackend {
    pub fn new(ipc: Arc<dyn DesktopIpc>) -> Self {
        Self { ipc }
    }

    pub async fn platform_info(&self) -> Result<PlatformInfo> {
        self.invoke(commands::GET_PLATFORM_INFO, json!({})).await
    }

    /// PID of the shell process.
    pub async fn pid(&self) -> Result<u32> {
        self.invoke(commands::GET_PID, json!({})).await
    }

    /// Reinstall the VPN service with elevated privileges.
    pub async fn admin_reinstall_service(&self) -> Result<String> {
        self.invoke(commands::ADMIN_REINSTALL_SERVICE, json!({})).await
    }

    /// Restart into a downloaded update.
    pub async fn apply_update_now(&self) -> Result<()> {
        self.ipc
            .invoke(commands::APPLY_UPDATE_NOW, json!({}))
            .await?;
        Ok(())
    }

    pub async fn check_update_now(&self) -> Result<String> {
        self.invoke(commands::CHECK_UPDATE_NOW, json!({})).await
    }

    /// Pending update, if one has been downloaded.
    pub async fn update_status(&self) -> Result<Option<UpdateInfo>> {
        self.invoke(commands::GET_UPDATE_STATUS, json!({})).await
    }

    /// Push the UI locale to the shell (tray menu labels).
    pub async fn sync_locale(&self, locale: &str) -> Result<()> {
        self.ipc
            .invoke(commands::SYNC_LOCALE, json!({ "locale": locale }))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, params), fields(reason = %params.reason))]
    pub async fn upload_service_log(&self, params: &UploadLogParams) -> Result<UploadLogResult> {
        self.invoke(commands::UPLOAD_SERVICE_LOG, json!({ "params": params }))
            .await
    }

    pub async fn subscribe_events(&self) -> Result<Box<dyn HostEventStream>> {
        Ok(self.ipc.subscribe_events().await?)
    }

    async fn invoke<T: DeserializeOwned>(&self, command: &str, args: Value) -> Result<T> {
        let value = self.ipc.invoke(command, args).await?;
        serde_json::from_value(value)
            .map_err(|e| BridgeCoreError::InvalidResponse(format!("{}: {}", command, e)))
    }
}

#[async_trait]
impl VpnBackend for DesktopBackend {
    #[instrument(skip(self, params))]
    async fn run(&self, action: &str, params: Option<Value>) -> SResponse {
        let args = json!({
            "action": action,
            "params": params.unwrap_or(Value::Null),
        });

        let raw = match self.ipc.invoke(commands::DAEMON_EXEC, args).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!(error = %e, "daemon_exec failed");
                return SResponse::transport_error(e.to_string());
            }
        };

        let response: SResponse = match serde_json::from_value(raw) {
            Ok(response) => response,
            Err(e) => return SResponse::transport_error(format!("Invalid daemon response: {}", e)),
        };

        if action == actions::STATUS && response.is_ok() {
            if let Some(data) = response.data.as_ref().filter(|d| !d.is_null()) {
                let normalized = normalize_status(data);
                return SResponse {
                    code: response.code,
                    message: response.message,
                    data: serde_json::to_value(normalized).ok(),
                };
            }
        }

        response
    }

    async fn udid(&self) -> Result<String> {
        let raw = self.ipc.invoke(commands::GET_UDID, json!({})).await?;
        let response: SResponse = serde_json::from_value(raw)
            .map_err(|e| BridgeCoreError::InvalidResponse(e.to_string()))?;
        udid_from_envelope(response)
    }
}

impl fmt::Debug for DesktopBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DesktopBackend").finish_non_exhaustive()
    }
}
