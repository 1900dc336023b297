//! Status normalization shared by every backend.
//!
//! Native hosts report status in their own vocabulary: the desktop daemon
//! says `stopped` and `connected_at`, the mobile plugin says `connectedAt`,
//! and errors arrive either as bare strings or as `{code, message}`. Every
//! backend funnels its raw payload through [`normalize_status`] so the UI
//! sees one shape.

use chrono::DateTime;
use serde_json::Value;
use tracing::warn;

use crate::codes::CONNECTION_FATAL;
use crate::types::{ConnectionState, ControlError, StatusResponseData};

/// Normalize a raw native status payload.
///
/// - `stopped` or a missing state becomes `disconnected`; unknown states
///   become `disconnected` with a warning
/// - an error next to `disconnected` turns the state into `error`
/// - `connected` drops any error and derives `start_at` from
///   `connected_at` / `connectedAt`
/// - `running` always follows the final state; `retrying` is always `false`
pub fn normalize_status(raw: &Value) -> StatusResponseData {
    let mut state = match raw.get("state").and_then(Value::as_str) {
        None => ConnectionState::Disconnected,
        Some(native) => ConnectionState::from_native(native).unwrap_or_else(|| {
            warn!(state = native, "Unrecognized connection state, treating as disconnected");
            ConnectionState::Disconnected
        }),
    };

    let mut error = raw.get("error").and_then(control_error);
    if error.is_some() && state == ConnectionState::Disconnected {
        state = ConnectionState::Error;
    }

    let mut start_at = None;
    if state == ConnectionState::Connected {
        error = None;
        start_at = raw
            .get("connected_at")
            .or_else(|| raw.get("connectedAt"))
            .and_then(unix_seconds);
    }

    let network_available = raw
        .get("networkAvailable")
        .or_else(|| raw.get("network_available"))
        .and_then(Value::as_bool)
        .unwrap_or(true);

    StatusResponseData {
        state,
        running: state.is_running(),
        network_available,
        start_at,
        error,
        retrying: false,
    }
}

/// Status pushed by a host-side VPN error.
///
/// Keeps `network_available` and `start_at` from the last known status.
pub fn error_status(
    previous: Option<&StatusResponseData>,
    code: Option<i32>,
    message: impl Into<String>,
) -> StatusResponseData {
    StatusResponseData {
        state: ConnectionState::Error,
        running: false,
        network_available: previous.map_or(true, |p| p.network_available),
        start_at: previous.and_then(|p| p.start_at),
        error: Some(ControlError::new(code.unwrap_or(CONNECTION_FATAL), message)),
        retrying: false,
    }
}

fn control_error(raw: &Value) -> Option<ControlError> {
    match raw {
        Value::Null | Value::Bool(false) => None,
        Value::String(message) if message.is_empty() => None,
        Value::String(message) => Some(ControlError::new(CONNECTION_FATAL, message.clone())),
        Value::Object(fields) => match fields.get("code").and_then(Value::as_i64) {
            Some(code) => Some(ControlError::new(
                i32::try_from(code).unwrap_or(CONNECTION_FATAL),
                fields
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default(),
            )),
            None => Some(ControlError::new(CONNECTION_FATAL, raw.to_string())),
        },
        other => Some(ControlError::new(CONNECTION_FATAL, other.to_string())),
    }
}

/// RFC 3339 text or epoch milliseconds, floored to Unix seconds.
fn unix_seconds(raw: &Value) -> Option<i64> {
    match raw {
        Value::String(text) => match DateTime::parse_from_rfc3339(text) {
            Ok(at) => Some(at.timestamp()),
            Err(_) => text.parse::<i64>().ok().map(|ms| ms.div_euclid(1000)),
        },
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|ms| ms as i64))
            .map(|ms| ms.div_euclid(1000)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stopped_becomes_disconnected() {
        let status = normalize_status(&json!({"state": "stopped"}));

        assert_eq!(status.state, ConnectionState::Disconnected);
        assert!(!status.running);
        assert!(status.error.is_none());
        assert!(status.network_available);
        assert!(!status.retrying);
    }

    #[test]
    fn test_stopped_with_error_becomes_error() {
        let status = normalize_status(&json!({"state": "stopped", "error": "x"}));

        assert_eq!(status.state, ConnectionState::Error);
        assert!(!status.running);
        assert_eq!(status.error, Some(ControlError::new(570, "x")));
    }

    #[test]
    fn test_missing_and_unknown_states() {
        assert_eq!(normalize_status(&json!({})).state, ConnectionState::Disconnected);
        assert_eq!(
            normalize_status(&json!({"state": "warming_up"})).state,
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn test_structured_error_passes_through() {
        let status = normalize_status(&json!({
            "state": "disconnected",
            "error": {"code": 401, "message": "auth failed"}
        }));

        assert_eq!(status.state, ConnectionState::Error);
        assert_eq!(status.error, Some(ControlError::new(401, "auth failed")));
    }

    #[test]
    fn test_error_keeps_non_disconnected_state() {
        let status = normalize_status(&json!({"state": "reconnecting", "error": "lost"}));

        assert_eq!(status.state, ConnectionState::Reconnecting);
        assert!(!status.running);
        assert_eq!(status.error.unwrap().code, 570);
    }

    #[test]
    fn test_connected_clears_error_and_derives_start() {
        let status = normalize_status(&json!({
            "state": "connected",
            "error": "stale",
            "connected_at": "2024-01-01T00:00:10.900Z"
        }));

        assert_eq!(status.state, ConnectionState::Connected);
        assert!(status.running);
        assert!(status.error.is_none());
        assert_eq!(status.start_at, Some(1_704_067_210));
    }

    #[test]
    fn test_connected_at_epoch_millis() {
        let status = normalize_status(&json!({
            "state": "connected",
            "connectedAt": 1_704_067_210_999_i64
        }));

        assert_eq!(status.start_at, Some(1_704_067_210));
    }

    #[test]
    fn test_network_available_is_read_when_present() {
        let status = normalize_status(&json!({"state": "connecting", "networkAvailable": false}));

        assert!(!status.network_available);
        assert!(status.running);
    }

    #[test]
    fn test_error_status_defaults_to_connection_fatal() {
        let previous = StatusResponseData {
            start_at: Some(42),
            network_available: false,
            ..StatusResponseData::disconnected()
        };

        let status = error_status(Some(&previous), None, "tunnel died");

        assert_eq!(status.state, ConnectionState::Error);
        assert!(!status.running);
        assert!(!status.network_available);
        assert_eq!(status.start_at, Some(42));
        assert_eq!(status.error, Some(ControlError::new(570, "tunnel died")));

        let coded = error_status(None, Some(402), "expired");
        assert_eq!(coded.error.unwrap().code, 402);
        assert!(coded.network_available);
    }
}
