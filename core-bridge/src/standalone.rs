//! # Standalone Backend
//!
//! Talks to a local K2 daemon over HTTP (router or headless installs):
//!
//! - `POST {daemon}/core` with `{action, params}` for every action
//! - `GET {daemon}/api/device/udid` for the device identifier
//!
//! Actions are sent exactly once. `up`, `down` and `set_config` are not safe
//! to replay, and the status poller supplies its own cadence.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use bridge_traits::envelope::SResponse;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};

use crate::backend::{actions, udid_from_envelope, VpnBackend};
use crate::error::{BridgeCoreError, Result};
use crate::status::normalize_status;

pub const CORE_PATH: &str = "/core";
pub const UDID_PATH: &str = "/api/device/udid";

#[derive(Clone)]
pub struct StandaloneBackend {
    http: Arc<dyn HttpClient>,
    base_url: String,
    timeout: Duration,
}

impl StandaloneBackend {
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn core_exec(&self, action: &str, params: Option<Value>) -> Result<SResponse> {
        let body = json!({
            "action": action,
            "params": params.unwrap_or_else(|| json!({})),
        });
        let url = format!("{}{}", self.base_url, CORE_PATH);
        let request = HttpRequest::new(HttpMethod::Post, url)
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&body)?;

        let response = self
            .http
            .execute_with_retry(request, RetryPolicy::no_retry())
            .await?;
        if !response.is_success() {
            return Ok(http_status_error(&response));
        }

        response
            .json::<SResponse>()
            .map_err(|e| BridgeCoreError::InvalidResponse(e.to_string()))
    }
}

fn http_status_error(response: &HttpResponse) -> SResponse {
    SResponse::transport_error(format!(
        "HTTP {}: {}",
        response.status,
        response.status_text()
    ))
}

#[async_trait]
impl VpnBackend for StandaloneBackend {
    #[instrument(skip(self, params))]
    async fn run(&self, action: &str, params: Option<Value>) -> SResponse {
        let response = match self.core_exec(action, params).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Daemon request failed");
                return SResponse::transport_error(e.to_string());
            }
        };

        if action != actions::STATUS || !response.is_ok() {
            return response;
        }

        match response.data.as_ref().filter(|d| !d.is_null()) {
            Some(data) => {
                let normalized = normalize_status(data);
                SResponse {
                    code: response.code,
                    message: response.message,
                    data: serde_json::to_value(normalized).ok(),
                }
            }
            None => response,
        }
    }

    async fn udid(&self) -> Result<String> {
        let request = HttpRequest::new(HttpMethod::Get, format!("{}{}", self.base_url, UDID_PATH))
            .timeout(self.timeout);
        let response = self.http.execute(request).await?;
        if !response.is_success() {
            return Err(BridgeCoreError::Rejected {
                code: -1,
                message: http_status_error(&response).message_or_default().to_string(),
            });
        }

        let envelope = response
            .json::<SResponse>()
            .map_err(|e| BridgeCoreError::InvalidResponse(e.to_string()))?;
        udid_from_envelope(envelope)
    }
}

impl std::fmt::Debug for StandaloneBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandaloneBackend")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}
