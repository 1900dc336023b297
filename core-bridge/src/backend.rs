//! The `run(action, params)` contract and the closed set of backends.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

use bridge_traits::envelope::SResponse;
use core_auth::{AuthError, DeviceBridge};

use crate::desktop::DesktopBackend;
use crate::error::{BridgeCoreError, Result};
use crate::mobile::MobileBackend;
use crate::standalone::StandaloneBackend;

/// Actions every backend understands.
pub mod actions {
    pub const STATUS: &str = "status";
    pub const UP: &str = "up";
    pub const DOWN: &str = "down";
    pub const VERSION: &str = "version";
    pub const GET_CONFIG: &str = "get_config";
    pub const SET_CONFIG: &str = "set_config";
    pub const EVALUATE_TUNNELS: &str = "evaluate_tunnels";
    pub const SPEEDTEST: &str = "speedtest";
    pub const GET_SPEEDTEST_STATUS: &str = "get_speedtest_status";
}

/// One VPN control transport.
///
/// `run` never fails: transport problems come back as `{code: -1}`
/// envelopes, and a successful `status` is already normalized.
#[async_trait]
pub trait VpnBackend: Send + Sync {
    async fn run(&self, action: &str, params: Option<Value>) -> SResponse;

    /// Device identifier as reported by the host.
    async fn udid(&self) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Desktop,
    Mobile,
    Standalone,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Desktop => "desktop",
            BackendKind::Mobile => "mobile",
            BackendKind::Standalone => "standalone",
        })
    }
}

/// The active backend, chosen once per process by
/// [`BridgeSelector`](crate::selector::BridgeSelector).
#[derive(Debug)]
pub enum Backend {
    Desktop(DesktopBackend),
    Mobile(MobileBackend),
    Standalone(StandaloneBackend),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Desktop(_) => BackendKind::Desktop,
            Backend::Mobile(_) => BackendKind::Mobile,
            Backend::Standalone(_) => BackendKind::Standalone,
        }
    }

    pub fn as_desktop(&self) -> Option<&DesktopBackend> {
        match self {
            Backend::Desktop(desktop) => Some(desktop),
            _ => None,
        }
    }

    pub async fn run(&self, action: &str, params: Option<Value>) -> SResponse {
        match self {
            Backend::Desktop(b) => b.run(action, params).await,
            Backend::Mobile(b) => b.run(action, params).await,
            Backend::Standalone(b) => b.run(action, params).await,
        }
    }

    /// [`run`](Self::run) with `data` decoded into `T`.
    pub async fn run_typed<T: DeserializeOwned>(
        &self,
        action: &str,
        params: Option<Value>,
    ) -> SResponse<T> {
        self.run(action, params).await.into_typed()
    }

    pub async fn udid(&self) -> Result<String> {
        match self {
            Backend::Desktop(b) => b.udid().await,
            Backend::Mobile(b) => b.udid().await,
            Backend::Standalone(b) => b.udid().await,
        }
    }
}

#[async_trait]
impl VpnBackend for Backend {
    async fn run(&self, action: &str, params: Option<Value>) -> SResponse {
        Backend::run(self, action, params).await
    }

    async fn udid(&self) -> Result<String> {
        Backend::udid(self).await
    }
}

#[async_trait]
impl DeviceBridge for Backend {
    async fn udid(&self) -> core_auth::Result<String> {
        Backend::udid(self)
            .await
            .map_err(|e| AuthError::Device(e.to_string()))
    }

    async fn disconnect(&self) -> core_auth::Result<()> {
        let response = self.run(actions::DOWN, None).await;
        if response.is_ok() {
            Ok(())
        } else {
            Err(AuthError::Device(response.message_or_default().to_string()))
        }
    }
}

/// Pull `data.udid` out of a `{code, data: {udid}}` answer.
pub(crate) fn udid_from_envelope(response: SResponse) -> Result<String> {
    if !response.is_ok() {
        return Err(BridgeCoreError::Rejected {
            code: response.code,
            message: response.message_or_default().to_string(),
        });
    }

    response
        .data
        .as_ref()
        .and_then(|data| data.get("udid"))
        .and_then(Value::as_str)
        .filter(|udid| !udid.is_empty())
        .map(str::to_string)
        .ok_or_else(|| BridgeCoreError::InvalidResponse("Failed to get UDID from daemon".into()))
}
