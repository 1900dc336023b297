//! RPC Response Envelope
//!
//! Every action on every host, and every cloud API call, answers with the
//! same `{ code, message?, data? }` shape. `code == 0` is success and `-1` is
//! reserved for failures that happened locally (transport, decoding) before
//! any remote party produced a code.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// Success code.
pub const CODE_OK: i32 = 0;
/// Local or transport failure.
pub const CODE_TRANSPORT: i32 = -1;
/// Authentication required or token rejected.
pub const CODE_UNAUTHORIZED: i32 = 401;

/// Uniform response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SResponse<T = Value> {
    pub code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> SResponse<T> {
    /// `{ code: 0, message: "ok", data }`
    pub fn ok(data: T) -> Self {
        Self {
            code: CODE_OK,
            message: Some("ok".to_string()),
            data: Some(data),
        }
    }

    /// `{ code: 0, message: "ok" }`
    pub fn ok_empty() -> Self {
        Self {
            code: CODE_OK,
            message: Some("ok".to_string()),
            data: None,
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
            data: None,
        }
    }

    /// `{ code: -1, message }`
    pub fn transport_error(message: impl Into<String>) -> Self {
        Self::error(CODE_TRANSPORT, message)
    }

    /// `{ code: 401, message: "Unauthorized" }`
    pub fn unauthorized() -> Self {
        Self::error(CODE_UNAUTHORIZED, "Unauthorized")
    }

    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }

    pub fn is_unauthorized(&self) -> bool {
        self.code == CODE_UNAUTHORIZED
    }

    pub fn message_or_default(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }

    pub fn map<U, F>(self, f: F) -> SResponse<U>
    where
        F: FnOnce(T) -> U,
    {
        SResponse {
            code: self.code,
            message: self.message,
            data: self.data.map(f),
        }
    }
}

impl SResponse<Value> {
    /// Decode `data` into `U`.
    ///
    /// A payload that does not match `U` turns the envelope into a `-1`
    /// failure. Absent or `null` data stays absent.
    pub fn into_typed<U: DeserializeOwned>(self) -> SResponse<U> {
        match self.data {
            None | Some(Value::Null) => SResponse {
                code: self.code,
                message: self.message,
                data: None,
            },
            Some(value) => match serde_json::from_value(value) {
                Ok(data) => SResponse {
                    code: self.code,
                    message: self.message,
                    data: Some(data),
                },
                Err(err) => SResponse::transport_error(format!("Invalid response data: {}", err)),
            },
        }
    }
}
