//! Action payloads shared by every backend.
//!
//! Status types use camelCase on the wire; daemon action payloads
//! (`evaluate_tunnels`, `speedtest`, `get_config`) keep the daemon's
//! snake_case.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use core_runtime::events::ConnectionEvent;

/// Structured VPN error carried by a status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlError {
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl ControlError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Disconnecting,
    Error,
}

impl ConnectionState {
    /// Parse a state as reported by a native host. The daemon's `stopped`
    /// maps to [`ConnectionState::Disconnected`].
    pub fn from_native(state: &str) -> Option<Self> {
        match state {
            "stopped" | "disconnected" => Some(Self::Disconnected),
            "connecting" => Some(Self::Connecting),
            "connected" => Some(Self::Connected),
            "reconnecting" => Some(Self::Reconnecting),
            "disconnecting" => Some(Self::Disconnecting),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnecting => "disconnecting",
            Self::Error => "error",
        }
    }

    /// `true` for the states in which the tunnel is wanted up.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized `status` payload.
///
/// Built by [`crate::status::normalize_status`], which keeps
/// `running == state.is_running()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponseData {
    pub state: ConnectionState,
    pub running: bool,
    pub network_available: bool,
    /// Unix seconds when the tunnel came up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ControlError>,
    #[serde(default)]
    pub retrying: bool,
}

impl StatusResponseData {
    pub fn disconnected() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            running: false,
            network_available: true,
            start_at: None,
            error: None,
            retrying: false,
        }
    }

    pub fn to_event(&self) -> ConnectionEvent {
        ConnectionEvent::StateChanged {
            state: self.state.as_str().to_string(),
            running: self.running,
            network_available: self.network_available,
            start_at: self.start_at,
            error_code: self.error.as_ref().map(|e| e.code),
            error_message: self.error.as_ref().map(|e| e.message.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionResponseData {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedtestParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_direct: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedtestResponseData {
    pub started: bool,
    pub forced_direct: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedtestState {
    Idle,
    Running,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedtestProgress {
    pub stage: String,
    pub message: String,
    pub percentage: f64,
    pub current_speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedtestResult {
    pub success: bool,
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub server_id: Option<String>,
    #[serde(default)]
    pub latency_ms: Option<f64>,
    #[serde(default)]
    pub jitter_ms: Option<f64>,
    #[serde(default)]
    pub download_mbps: Option<f64>,
    #[serde(default)]
    pub upload_mbps: Option<f64>,
    #[serde(default)]
    pub packet_loss: Option<f64>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `get_speedtest_status` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedtestStatusResponseData {
    pub status: SpeedtestState,
    pub forced_direct: bool,
    #[serde(default)]
    pub started_at: Option<i64>,
    #[serde(default)]
    pub completed_at: Option<i64>,
    #[serde(default)]
    pub progress: Option<SpeedtestProgress>,
    #[serde(default)]
    pub result: Option<SpeedtestResult>,
}

/// `get_config` / `set_config` payload.
///
/// Only the top-level keys the core reads are typed; nested sections are
/// passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigResponseData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socks5_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k2v4: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<Value>,
}

/// One candidate tunnel for `evaluate_tunnels`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunnelInput {
    pub domain: String,
    pub node_load: f64,
    pub traffic_usage_percent: f64,
    pub bandwidth_usage_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_route_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downstream_route_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluateTunnelsParams {
    pub tunnels: Vec<TunnelInput>,
    pub has_relays: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedTunnel {
    pub domain: String,
    pub final_score: f64,
    /// `excellent | good | fair | poor | unknown`
    pub route_quality: String,
    pub is_overloaded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluateTunnelsResponse {
    /// Sorted by recommendation order.
    pub evaluated_tunnels: Vec<EvaluatedTunnel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_domain: Option<String>,
    pub should_use_relay: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_reason: Option<String>,
}

/// Desktop `get_platform_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub os: String,
    pub version: String,
}

/// Desktop `upload_service_log_command` parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadLogParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_duration_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadLogResult {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_wire_format() {
        let status = StatusResponseData {
            state: ConnectionState::Error,
            running: false,
            network_available: true,
            start_at: None,
            error: Some(ControlError::new(570, "x")),
            retrying: false,
        };

        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({
                "state": "error",
                "running": false,
                "networkAvailable": true,
                "error": {"code": 570, "message": "x"},
                "retrying": false
            })
        );
    }

    #[test]
    fn test_from_native_translates_stopped() {
        assert_eq!(
            ConnectionState::from_native("stopped"),
            Some(ConnectionState::Disconnected)
        );
        assert_eq!(ConnectionState::from_native("paused"), None);
        assert!(ConnectionState::Connecting.is_running());
        assert!(!ConnectionState::Reconnecting.is_running());
    }

    #[test]
    fn test_evaluate_response_optional_fields() {
        let response: EvaluateTunnelsResponse = serde_json::from_value(json!({
            "evaluated_tunnels": [
                {
                    "domain": "a.example",
                    "final_score": 91.5,
                    "route_quality": "excellent",
                    "is_overloaded": false
                }
            ],
            "should_use_relay": false
        }))
        .unwrap();

        assert_eq!(response.evaluated_tunnels.len(), 1);
        assert!(response.recommended_domain.is_none());
        assert!(response.relay_reason.is_none());
    }

    #[test]
    fn test_status_event_carries_error() {
        let mut status = StatusResponseData::disconnected();
        status.error = Some(ControlError::new(571, "all failed"));

        match status.to_event() {
            ConnectionEvent::StateChanged {
                state,
                error_code,
                error_message,
                ..
            } => {
                assert_eq!(state, "disconnected");
                assert_eq!(error_code, Some(571));
                assert_eq!(error_message.as_deref(), Some("all failed"));
            }
        }
    }
}
