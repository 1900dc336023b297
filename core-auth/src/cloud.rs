//! # Cloud API Client
//!
//! JSON-over-HTTP client for the cloud API with bearer authentication and a
//! 401 interceptor.
//!
//! ## Request flow
//!
//! 1. Resolve the base URL through the [`EntryResolver`] when one is set.
//! 2. Attach `Authorization: Bearer <access token>` when a token is stored.
//! 3. Send; a transport failure answers `{ code: -1, message }`.
//! 4. On HTTP 401 or envelope `code == 401`, refresh through
//!    `POST /api/auth/refresh` and replay the request exactly once with the
//!    new token. Its result is returned as-is, except that a second 401
//!    demotes the session.
//! 5. When the refresh fails, or the replay is rejected again, both tokens
//!    are cleared, the shared session becomes anonymous, the response cache
//!    is emptied and the caller gets `{ code: 401, message: "Unauthorized" }`.
//!
//! ## Single-flight refresh
//!
//! Every refresh, from the interceptor or from session restore, serializes on
//! one refresh lock. The first caller refreshes; later callers see that the
//! stored token no longer matches the one that was rejected and reuse the new
//! token without refreshing again.

use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use bridge_traits::envelope::SResponse;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};

use crate::cache::{CachePolicy, ResponseCache};
use crate::entry::EntryResolver;
use crate::error::{AuthError, Result};
use crate::token_store::TokenStore;
use crate::types::{Session, TokenPair};

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REFRESH_PATH: &str = "/api/auth/refresh";
pub const LOGOUT_PATH: &str = "/api/auth/logout";
pub const PROFILE_PATH: &str = "/api/user/info";

/// Session shared between the API client and the session manager.
pub type SharedSession = Arc<RwLock<Session>>;

/// What a refresh does when the refresh endpoint cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnUnreachable {
    Demote,
    KeepTokens,
}

/// Result of a single-flight refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RefreshOutcome {
    /// Access token to use, rotated here or by a concurrent caller.
    Token(String),
    /// A concurrent caller already ended the session.
    Cleared,
    /// The refresh failed and the session has been demoted.
    Rejected(String),
    /// The refresh endpoint was unreachable. Tokens are untouched.
    Unreachable(String),
}

#[derive(Clone)]
pub struct CloudApi {
    http: Arc<dyn HttpClient>,
    tokens: TokenStore,
    session: SharedSession,
    event_bus: EventBus,
    base_url: String,
    timeout: Duration,
    refresh_lock: Arc<Mutex<()>>,
    entry: Option<EntryResolver>,
    cache: Option<ResponseCache>,
}

impl CloudApi {
    pub fn new(
        http: Arc<dyn HttpClient>,
        tokens: TokenStore,
        session: SharedSession,
        event_bus: EventBus,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            tokens,
            session,
            event_bus,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            refresh_lock: Arc::new(Mutex::new(())),
            entry: None,
            cache: None,
        }
    }

    /// Resolve the base URL per request instead of using the fixed one.
    pub fn with_entry_resolver(mut self, resolver: EntryResolver) -> Self {
        self.entry = Some(resolver);
        self
    }

    /// Enable [`cached_request`](Self::cached_request).
    pub fn with_response_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_ref()
    }

    pub async fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear().await;
        }
    }

    /// Base URL the next request goes to.
    pub async fn base_url(&self) -> String {
        match &self.entry {
            Some(resolver) => resolver.resolve().await,
            None => self.base_url.clone(),
        }
    }

    pub async fn get(&self, path: &str) -> SResponse {
        self.request(HttpMethod::Get, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> SResponse {
        self.request(HttpMethod::Post, path, Some(body)).await
    }

    /// Authenticated request returning an untyped envelope.
    #[instrument(skip(self, method, body), fields(method = method.as_str()))]
    pub async fn request(&self, method: HttpMethod, path: &str, body: Option<Value>) -> SResponse {
        let token = self.tokens.token().await;

        let response = match self.send(method, path, body.as_ref(), token.as_deref()).await {
            Ok(response) => response,
            Err(message) => return SResponse::transport_error(message),
        };

        if !response.is_unauthorized() {
            return response;
        }

        debug!("Received 401, attempting token refresh");
        let Some(new_token) = self.refresh_after_unauthorized(token.as_deref()).await else {
            return SResponse::unauthorized();
        };

        let replay = match self
            .send(method, path, body.as_ref(), Some(new_token.as_str()))
            .await
        {
            Ok(response) => response,
            Err(message) => return SResponse::transport_error(message),
        };

        if replay.is_unauthorized() {
            warn!("Request rejected again after refresh");
            self.demote("rejected after refresh").await;
            return SResponse::unauthorized();
        }

        replay
    }

    /// [`request`](Self::request) behind the response cache.
    ///
    /// - A live entry answers without a request unless `force_refresh` is
    ///   set. With `revalidate` the entry is refreshed in the background.
    /// - A successful response with data is stored under the policy's key.
    /// - A transport failure (`-1`) answers with the expired entry when
    ///   `allow_expired` is set and one exists.
    ///
    /// Without a configured cache this is a plain request.
    #[instrument(skip(self, method, body, policy), fields(key = %policy.key))]
    pub async fn cached_request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
        policy: &CachePolicy,
    ) -> SResponse {
        let Some(cache) = self.cache.clone() else {
            return self.request(method, path, body).await;
        };

        if !policy.force_refresh {
            if let Some(data) = cache.get(&policy.key, false).await {
                debug!("Cache hit");
                if policy.revalidate {
                    self.revalidate_in_background(cache, method, path, body, policy);
                }
                return SResponse::ok(data);
            }
        }

        let response = self.request(method, path, body).await;

        if response.code == -1 && policy.allow_expired {
            if let Some(data) = cache.get(&policy.key, true).await {
                info!(message = response.message_or_default(), "Using expired cache entry");
                return SResponse::ok(data);
            }
            return response;
        }

        if response.is_ok() {
            if let Some(data) = response.data.as_ref().filter(|d| !d.is_null()) {
                cache.set(&policy.key, data.clone(), policy.ttl).await;
            }
        }

        response
    }

    fn revalidate_in_background(
        &self,
        cache: ResponseCache,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
        policy: &CachePolicy,
    ) {
        let api = self.clone();
        let path = path.to_string();
        let key = policy.key.clone();
        let ttl = policy.ttl;

        tokio::spawn(async move {
            let response = api.request(method, &path, body).await;
            match response.data {
                Some(data) if response.code == 0 && !data.is_null() => {
                    cache.set(&key, data, ttl).await;
                    debug!(key, "Background revalidation completed");
                }
                _ => debug!(key, code = response.code, "Background revalidation skipped"),
            }
        });
    }

    /// One request with an explicit token and no interception.
    ///
    /// Used by login, logout and session restore, which own their retry
    /// policy.
    pub async fn send_raw<B: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
        token: Option<&str>,
    ) -> SResponse {
        match self.send(method, path, body, token).await {
            Ok(response) => response,
            Err(message) => SResponse::transport_error(message),
        }
    }

    /// Exchange the stored refresh token for a new pair and persist it.
    ///
    /// Does not touch the session on failure; callers decide. Concurrent
    /// callers should go through the single-flight path instead, since a
    /// server that rotates refresh tokens rejects the second exchange.
    #[instrument(skip(self))]
    pub async fn refresh_tokens(&self) -> Result<TokenPair> {
        let refresh_token = self
            .tokens
            .refresh_token()
            .await
            .ok_or(AuthError::NotAuthenticated)?;

        let response = self
            .send_raw(
                HttpMethod::Post,
                REFRESH_PATH,
                Some(&json!({ "refreshToken": refresh_token })),
                None,
            )
            .await;

        if !response.is_ok() {
            return Err(AuthError::Rejected {
                code: response.code,
                message: response.message_or_default().to_string(),
            });
        }

        let pair = response
            .data
            .as_ref()
            .and_then(TokenPair::from_auth_data)
            .ok_or_else(|| AuthError::InvalidResponse("refresh response has no token".into()))?;

        self.tokens.set_tokens(&pair).await?;

        {
            let mut session = self.session.write().await;
            *session = session.clone().with_tokens(pair.clone());
        }

        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::TokenRefreshed));
        info!("Access token refreshed");

        Ok(pair)
    }

    /// Clear tokens and cached account data, and mark the shared session
    /// anonymous.
    pub async fn demote(&self, reason: &str) {
        self.tokens.clear_tokens().await;
        self.clear_cache().await;
        *self.session.write().await = Session::anonymous();
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SessionExpired {
            reason: reason.to_string(),
        }));
    }

    /// Refresh under the refresh lock.
    ///
    /// `rejected` is the access token the caller saw fail. When the stored
    /// token already differs, a concurrent caller has refreshed and its token
    /// is returned without another exchange. Failures demote while the lock
    /// is held, except unreachable ones under [`OnUnreachable::KeepTokens`].
    pub(crate) async fn refresh_single_flight(
        &self,
        rejected: Option<&str>,
        on_unreachable: OnUnreachable,
    ) -> RefreshOutcome {
        let _guard = self.refresh_lock.lock().await;

        match (self.tokens.token().await, rejected) {
            (Some(current), Some(rejected)) if current != rejected => {
                debug!("Token already refreshed by a concurrent request");
                return RefreshOutcome::Token(current);
            }
            (None, Some(_)) => {
                debug!("Session was cleared by a concurrent request");
                return RefreshOutcome::Cleared;
            }
            _ => {}
        }

        match self.refresh_tokens().await {
            Ok(pair) => RefreshOutcome::Token(pair.access_token),
            Err(e) if e.is_transport() && on_unreachable == OnUnreachable::KeepTokens => {
                warn!(error = %e, "Refresh endpoint unreachable, keeping tokens");
                RefreshOutcome::Unreachable(e.to_string())
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                self.demote(&e.to_string()).await;
                RefreshOutcome::Rejected(e.to_string())
            }
        }
    }

    async fn refresh_after_unauthorized(&self, rejected: Option<&str>) -> Option<String> {
        match self
            .refresh_single_flight(rejected, OnUnreachable::Demote)
            .await
        {
            RefreshOutcome::Token(token) => Some(token),
            _ => None,
        }
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
        token: Option<&str>,
    ) -> std::result::Result<SResponse, String> {
        let url = format!("{}{}", self.base_url().await, path);
        let mut request = HttpRequest::new(method, url)
            .header("Content-Type", "application/json")
            .timeout(self.timeout);

        if let Some(token) = token {
            request = request.bearer_token(token);
        }

        if let Some(body) = body {
            request = request.json(body).map_err(|e| e.to_string())?;
        }

        let response = self.http.execute(request).await.map_err(|e| e.to_string())?;
        Ok(decode_envelope(&response))
    }
}

/// Turn an HTTP response into an envelope.
///
/// HTTP 401 maps to `{401}` whatever the body says. Other statuses use the
/// JSON body; an unparseable body becomes `{-1}`.
fn decode_envelope(response: &HttpResponse) -> SResponse {
    if response.status == 401 {
        return SResponse::unauthorized();
    }

    match response.json::<SResponse>() {
        Ok(envelope) => envelope,
        Err(_) if !response.is_success() => SResponse::transport_error(format!(
            "HTTP {}: {}",
            response.status,
            response.status_text()
        )),
        Err(e) => SResponse::transport_error(e.to_string()),
    }
}

impl std::fmt::Debug for CloudApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudApi")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("entry", &self.entry)
            .field("cache", &self.cache)
            .finish()
    }
}
