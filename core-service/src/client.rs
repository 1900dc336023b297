//! The `K2Client` composition root.

use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use bridge_traits::device::DeviceSignalSource;
use bridge_traits::envelope::SResponse;
use bridge_traits::host::{DesktopIpc, HostEventStream, MobilePlugin};
use bridge_traits::http::{HttpClient, HttpMethod};
use bridge_traits::storage::KeyValueStore;
use core_auth::{
    AuthState, CachePolicy, CloudApi, DeviceBridge, EntryResolver, EntrySources, ResponseCache,
    Session, SessionManager, TokenStore, PROFILE_PATH, USER_INFO_CACHE_KEY,
};
use core_bridge::{
    actions, Backend, BackendKind, BridgeSelector, ConfigResponseData, EvaluateTunnelsParams,
    EvaluateTunnelsResponse, HostEventPump, HostProbe, SpeedtestParams, SpeedtestResponseData,
    SpeedtestStatusResponseData, StatusPoller, StatusPublisher, StatusResponseData,
    TunnelEvaluationCache, VersionResponseData, VpnBackend,
};
use core_runtime::config::BridgeConfig;
use core_runtime::events::{EventBus, EventStream};
use core_storage::SecureStorage;

use crate::error::Result;

/// How long a cached profile read stays fresh.
pub const USER_INFO_TTL: Duration = Duration::from_secs(3600);

/// Builder for [`K2Client`].
///
/// `http`, `storage_medium` and `device_signals` are required. With the
/// `desktop-shims` feature they default to the `bridge-desktop`
/// implementations. `desktop_ipc` and `mobile_plugin` are only set by hosts
/// that have them; without either the client talks to the local daemon.
#[derive(Default)]
pub struct K2ClientBuilder {
    config: Option<BridgeConfig>,
    http: Option<Arc<dyn HttpClient>>,
    medium: Option<Arc<dyn KeyValueStore>>,
    signals: Option<Arc<dyn DeviceSignalSource>>,
    desktop: Option<Arc<dyn DesktopIpc>>,
    mobile: Option<Arc<dyn MobilePlugin>>,
}

impl K2ClientBuilder {
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn storage_medium(mut self, medium: Arc<dyn KeyValueStore>) -> Self {
        self.medium = Some(medium);
        self
    }

    pub fn device_signals(mut self, signals: Arc<dyn DeviceSignalSource>) -> Self {
        self.signals = Some(signals);
        self
    }

    pub fn desktop_ipc(mut self, ipc: Arc<dyn DesktopIpc>) -> Self {
        self.desktop = Some(ipc);
        self
    }

    pub fn mobile_plugin(mut self, plugin: Arc<dyn MobilePlugin>) -> Self {
        self.mobile = Some(plugin);
        self
    }

    /// Validate the configuration, wire every component and activate the
    /// backend for this host.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Runtime`](crate::CoreError::Runtime) for an invalid configuration
    /// - [`CoreError::CapabilityMissing`](crate::CoreError::CapabilityMissing) when a required
    ///   host capability was not provided
    pub async fn build(self) -> Result<K2Client> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let http = match self.http {
            Some(http) => http,
            None => default_http(&config)?,
        };
        let medium = match self.medium {
            Some(medium) => medium,
            None => default_medium()?,
        };
        let signals = match self.signals {
            Some(signals) => signals,
            None => default_signals()?,
        };

        let event_bus = EventBus::new(config.event_buffer_size);

        let storage = SecureStorage::new(medium, signals);
        let storage = match &config.storage_namespace {
            Some(namespace) => storage.with_namespace(namespace),
            None => storage,
        };

        let cache_namespace = format!(
            "{}_cache",
            config.storage_namespace.as_deref().unwrap_or("secure")
        );
        let cache = ResponseCache::new(storage.with_namespace(&cache_namespace));

        let mut api = CloudApi::new(
            Arc::clone(&http),
            TokenStore::new(storage.clone()),
            Arc::new(RwLock::new(Session::anonymous())),
            event_bus.clone(),
            config.api_base_url.clone(),
            config.api_timeout,
        )
        .with_response_cache(cache);

        if !config.entry_sources.is_empty() {
            let sources = EntrySources::new(config.entry_sources.clone(), &config.entry_key)?;
            let resolver = EntryResolver::new(
                Arc::clone(&http),
                storage,
                sources,
                config.api_base_url.clone(),
            );
            api = api.with_entry_resolver(resolver);
        }

        let mut probe = HostProbe::standalone(http, config.daemon_base_url.clone())
            .with_daemon_timeout(config.daemon_timeout);
        if let Some(ipc) = self.desktop {
            probe = probe.with_desktop(ipc);
        }
        if let Some(plugin) = self.mobile {
            probe = probe.with_mobile(plugin);
        }

        let selector = BridgeSelector::new(probe);
        let backend = selector.ensure_injected().await;

        let device: Arc<dyn DeviceBridge> = backend.clone();
        let session = SessionManager::new(api, device, event_bus.clone());

        let publisher = Arc::new(StatusPublisher::new(event_bus.clone()));
        let vpn: Arc<dyn VpnBackend> = backend.clone();
        let poller = StatusPoller::new(vpn, Arc::clone(&publisher), config.poll_interval);

        info!(backend = ?backend.kind(), "K2 client ready");

        Ok(K2Client {
            config,
            event_bus,
            selector,
            backend,
            session,
            publisher,
            poller,
            evaluation: TunnelEvaluationCache::new(),
            host_events: Mutex::new(None),
        })
    }
}

#[cfg(feature = "desktop-shims")]
fn default_http(config: &BridgeConfig) -> Result<Arc<dyn HttpClient>> {
    let client = bridge_desktop::ReqwestHttpClient::with_timeout(config.api_timeout)?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn default_http(_config: &BridgeConfig) -> Result<Arc<dyn HttpClient>> {
    Err(crate::error::CoreError::missing("http", "No HttpClient provided"))
}

#[cfg(feature = "desktop-shims")]
fn default_medium() -> Result<Arc<dyn KeyValueStore>> {
    Ok(Arc::new(bridge_desktop::FileKeyValueStore::default_location()?))
}

#[cfg(not(feature = "desktop-shims"))]
fn default_medium() -> Result<Arc<dyn KeyValueStore>> {
    Err(crate::error::CoreError::missing("storage", "No KeyValueStore provided"))
}

#[cfg(feature = "desktop-shims")]
fn default_signals() -> Result<Arc<dyn DeviceSignalSource>> {
    Ok(Arc::new(bridge_desktop::DesktopDeviceSignals::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn default_signals() -> Result<Arc<dyn DeviceSignalSource>> {
    Err(crate::error::CoreError::missing("device_signals", "No DeviceSignalSource provided"))
}

/// Process-lifetime handle to the bridge core.
///
/// Owns the event bus, the active backend, the session manager, the status
/// poller and the tunnel evaluation cache. Build one with
/// [`K2Client::builder`] at startup and share it.
pub struct K2Client {
    config: BridgeConfig,
    event_bus: EventBus,
    selector: BridgeSelector,
    backend: Arc<Backend>,
    session: SessionManager,
    publisher: Arc<StatusPublisher>,
    poller: StatusPoller,
    evaluation: TunnelEvaluationCache,
    host_events: Mutex<Option<JoinHandle<()>>>,
}

impl K2Client {
    pub fn builder() -> K2ClientBuilder {
        K2ClientBuilder::default()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// A new subscription to every core event. Dropping it unsubscribes.
    pub fn subscribe(&self) -> EventStream {
        self.event_bus.stream()
    }

    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Re-run host detection. Always returns the backend chosen at build.
    pub async fn ensure_injected(&self) -> Arc<Backend> {
        self.selector.ensure_injected().await
    }

    pub fn session_manager(&self) -> &SessionManager {
        &self.session
    }

    pub fn api(&self) -> &CloudApi {
        self.session.api()
    }

    pub fn evaluation(&self) -> &TunnelEvaluationCache {
        &self.evaluation
    }

    pub fn poller(&self) -> &StatusPoller {
        &self.poller
    }

    /// Last published connection status.
    pub async fn current_status(&self) -> Option<StatusResponseData> {
        self.publisher.current().await
    }

    // Control

    pub async fn run(&self, action: &str, params: Option<Value>) -> SResponse {
        self.backend.run(action, params).await
    }

    pub async fn status(&self) -> SResponse<StatusResponseData> {
        self.backend.run_typed(actions::STATUS, None).await
    }

    /// Connect. `config` is the tunnel configuration forwarded as-is.
    pub async fn up(&self, config: Option<Value>) -> SResponse {
        self.backend.run(actions::UP, config).await
    }

    pub async fn down(&self) -> SResponse {
        self.backend.run(actions::DOWN, None).await
    }

    pub async fn version(&self) -> SResponse<VersionResponseData> {
        self.backend.run_typed(actions::VERSION, None).await
    }

    pub async fn get_config(&self) -> SResponse<ConfigResponseData> {
        self.backend.run_typed(actions::GET_CONFIG, None).await
    }

    pub async fn set_config(&self, config: &ConfigResponseData) -> SResponse {
        match serde_json::to_value(config) {
            Ok(params) => self.backend.run(actions::SET_CONFIG, Some(params)).await,
            Err(e) => SResponse::transport_error(e.to_string()),
        }
    }

    pub async fn speedtest(&self, params: &SpeedtestParams) -> SResponse<SpeedtestResponseData> {
        match serde_json::to_value(params) {
            Ok(params) => {
                self.backend
                    .run_typed(actions::SPEEDTEST, Some(params))
                    .await
            }
            Err(e) => SResponse::transport_error(e.to_string()),
        }
    }

    pub async fn speedtest_status(&self) -> SResponse<SpeedtestStatusResponseData> {
        self.backend
            .run_typed(actions::GET_SPEEDTEST_STATUS, None)
            .await
    }

    /// Evaluate tunnels on the daemon and cache the result.
    pub async fn evaluate_tunnels(
        &self,
        params: &EvaluateTunnelsParams,
    ) -> SResponse<EvaluateTunnelsResponse> {
        self.evaluation.evaluate(self.backend.as_ref(), params).await
    }

    pub async fn udid(&self) -> Result<String> {
        Ok(self.backend.udid().await?)
    }

    // Auth

    pub async fn login(&self, email: &str, verification_code: &str) -> Result<Session> {
        Ok(self.session.login(email, verification_code).await?)
    }

    pub async fn logout(&self) {
        self.session.logout().await;
    }

    pub async fn restore_session(&self) -> AuthState {
        self.session.restore_session().await
    }

    pub async fn build_tunnel_url(&self, tunnel_url: &str) -> Result<String> {
        Ok(self.session.build_tunnel_url(tunnel_url).await?)
    }

    /// `GET` on the cloud API with bearer auth and 401 recovery.
    pub async fn cloud_get(&self, path: &str) -> SResponse {
        self.api().get(path).await
    }

    pub async fn cloud_post(&self, path: &str, body: Value) -> SResponse {
        self.api().post(path, body).await
    }

    /// Cloud API read through the response cache.
    pub async fn cloud_get_cached(&self, path: &str, policy: &CachePolicy) -> SResponse {
        self.api()
            .cached_request(HttpMethod::Get, path, None, policy)
            .await
    }

    /// Account profile. Served from the cache for an hour, and past that
    /// when the API is unreachable.
    pub async fn user_info(&self) -> SResponse {
        let policy = CachePolicy::new(USER_INFO_CACHE_KEY)
            .ttl(USER_INFO_TTL)
            .allow_expired();
        self.cloud_get_cached(PROFILE_PATH, &policy).await
    }

    // Lifecycle

    /// Start the status poller and forward host-pushed events. Calling it
    /// again while running is a no-op.
    ///
    /// # Errors
    ///
    /// Fails outside a Tokio runtime.
    #[instrument(skip(self), fields(backend = ?self.backend.kind()))]
    pub async fn start(&self) -> Result<()> {
        if !self.poller.is_running() {
            self.poller.start()?;
        }

        let forwarding = self.host_events_slot().is_some();
        if forwarding {
            return Ok(());
        }

        if let Some(stream) = self.host_event_stream().await {
            let pump = HostEventPump::new(Arc::clone(&self.publisher), self.event_bus.clone());
            let handle = pump.spawn(stream)?;
            let mut slot = self.host_events_slot();
            match slot.as_ref() {
                // lost a race with a concurrent start
                Some(_) => handle.abort(),
                None => *slot = Some(handle),
            }
        }

        Ok(())
    }

    /// Stop polling and host event forwarding. In-flight requests complete.
    pub fn stop(&self) {
        self.poller.stop();
        if let Some(handle) = self.host_events_slot().take() {
            handle.abort();
        }
    }

    async fn host_event_stream(&self) -> Option<Box<dyn HostEventStream>> {
        let subscribed = match self.backend.as_ref() {
            Backend::Desktop(desktop) => desktop.subscribe_events().await,
            Backend::Mobile(mobile) => mobile.subscribe_events().await,
            Backend::Standalone(_) => return None,
        };

        subscribed
            .map_err(|e| warn!(error = %e, "Host events unavailable"))
            .ok()
    }

    fn host_events_slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.host_events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Push the locale to the desktop shell. Other hosts ignore it.
    pub async fn sync_locale(&self, locale: &str) -> Result<()> {
        if let Some(desktop) = self.backend.as_desktop() {
            desktop.sync_locale(locale).await?;
        }
        Ok(())
    }
}

impl Drop for K2Client {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for K2Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("K2Client")
            .field("backend", &self.backend.kind())
            .field("polling", &self.poller.is_running())
            .finish()
    }
}
