//! Tunnel evaluation cache.
//!
//! Caches the daemon's `evaluate_tunnels` answer and turns route quality
//! into the 0-5 display score used for star ratings. Scoring itself happens
//! in the daemon.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, instrument, warn};

use bridge_traits::envelope::SResponse;

use crate::backend::{actions, VpnBackend};
use crate::types::{EvaluateTunnelsParams, EvaluateTunnelsResponse, EvaluatedTunnel};

/// Display score for a route quality. Unrecognized qualities score `0`.
pub fn route_quality_score(quality: &str) -> u8 {
    match quality {
        "excellent" => 5,
        "good" => 4,
        "fair" => 3,
        "poor" => 2,
        "unknown" => 1,
        _ => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvaluationStatus {
    #[default]
    Idle,
    Loading,
    Completed,
    Error,
}

#[derive(Debug, Default)]
struct Snapshot {
    status: EvaluationStatus,
    tunnels: Vec<EvaluatedTunnel>,
    by_domain: HashMap<String, EvaluatedTunnel>,
    recommended_domain: Option<String>,
    should_use_relay: bool,
    relay_reason: Option<String>,
    evaluated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct TunnelEvaluationCache {
    inner: RwLock<Snapshot>,
}

impl TunnelEvaluationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `evaluate_tunnels` on `backend` and cache a successful answer.
    #[instrument(skip_all, fields(tunnels = params.tunnels.len()))]
    pub async fn evaluate(
        &self,
        backend: &dyn VpnBackend,
        params: &EvaluateTunnelsParams,
    ) -> SResponse<EvaluateTunnelsResponse> {
        self.set_status(EvaluationStatus::Loading);

        let params = match serde_json::to_value(params) {
            Ok(params) => params,
            Err(e) => {
                self.set_status(EvaluationStatus::Error);
                return SResponse::transport_error(e.to_string());
            }
        };

        let response = backend
            .run(actions::EVALUATE_TUNNELS, Some(params))
            .await
            .into_typed::<EvaluateTunnelsResponse>();

        match (&response.data, response.is_ok()) {
            (Some(result), true) => self.set_result(result.clone()),
            _ => {
                warn!(code = response.code, "Tunnel evaluation failed");
                self.set_status(EvaluationStatus::Error);
            }
        }
        response
    }

    /// Replace the cache with a fresh evaluation.
    pub fn set_result(&self, response: EvaluateTunnelsResponse) {
        let by_domain = response
            .evaluated_tunnels
            .iter()
            .map(|t| (t.domain.to_lowercase(), t.clone()))
            .collect();

        debug!(
            tunnels = response.evaluated_tunnels.len(),
            recommended = response.recommended_domain.as_deref().unwrap_or(""),
            "Evaluation cached"
        );

        *self.write() = Snapshot {
            status: EvaluationStatus::Completed,
            tunnels: response.evaluated_tunnels,
            by_domain,
            recommended_domain: response.recommended_domain.filter(|d| !d.is_empty()),
            should_use_relay: response.should_use_relay,
            relay_reason: response.relay_reason.filter(|r| !r.is_empty()),
            evaluated_at: Some(Utc::now()),
        };
    }

    pub fn set_status(&self, status: EvaluationStatus) {
        self.write().status = status;
    }

    pub fn status(&self) -> EvaluationStatus {
        self.read().status
    }

    /// Display score (0-5) for `domain`, case-insensitive. Unseen domains
    /// score `0`.
    pub fn route_quality(&self, domain: &str) -> u8 {
        self.read()
            .by_domain
            .get(&domain.to_lowercase())
            .map_or(0, |t| route_quality_score(&t.route_quality))
    }

    pub fn tunnel(&self, domain: &str) -> Option<EvaluatedTunnel> {
        self.read().by_domain.get(&domain.to_lowercase()).cloned()
    }

    /// Evaluated tunnels in recommendation order.
    pub fn evaluated_tunnels(&self) -> Vec<EvaluatedTunnel> {
        self.read().tunnels.clone()
    }

    pub fn recommended_domain(&self) -> Option<String> {
        self.read().recommended_domain.clone()
    }

    pub fn should_use_relay(&self) -> bool {
        self.read().should_use_relay
    }

    pub fn relay_reason(&self) -> Option<String> {
        self.read().relay_reason.clone()
    }

    pub fn evaluated_at(&self) -> Option<DateTime<Utc>> {
        self.read().evaluated_at
    }

    pub fn clear(&self) {
        *self.write() = Snapshot::default();
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Snapshot> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Snapshot> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
