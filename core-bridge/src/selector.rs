//! # Bridge Selector
//!
//! Picks the backend for this process exactly once. Detection order:
//!
//! 1. desktop shell IPC present → [`Backend::Desktop`]
//! 2. mobile VPN plugin present → [`Backend::Mobile`]
//! 3. otherwise → [`Backend::Standalone`] over HTTP to the local daemon
//!
//! The first call to [`BridgeSelector::ensure_injected`] wins; later calls
//! return the same backend. There is no re-detection.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use bridge_traits::host::{DesktopIpc, MobilePlugin};
use bridge_traits::http::HttpClient;

use crate::backend::{Backend, BackendKind};
use crate::desktop::DesktopBackend;
use crate::mobile::MobileBackend;
use crate::standalone::StandaloneBackend;

/// Host capabilities visible at startup.
#[derive(Clone)]
pub struct HostProbe {
    pub desktop: Option<Arc<dyn DesktopIpc>>,
    pub mobile: Option<Arc<dyn MobilePlugin>>,
    /// Used by the standalone fallback.
    pub http: Arc<dyn HttpClient>,
    pub daemon_base_url: String,
    pub daemon_timeout: Duration,
}

impl HostProbe {
    pub fn standalone(http: Arc<dyn HttpClient>, daemon_base_url: impl Into<String>) -> Self {
        Self {
            desktop: None,
            mobile: None,
            http,
            daemon_base_url: daemon_base_url.into(),
            daemon_timeout: core_runtime::config::DEFAULT_DAEMON_TIMEOUT,
        }
    }

    pub fn with_desktop(mut self, ipc: Arc<dyn DesktopIpc>) -> Self {
        self.desktop = Some(ipc);
        self
    }

    pub fn with_mobile(mut self, plugin: Arc<dyn MobilePlugin>) -> Self {
        self.mobile = Some(plugin);
        self
    }

    pub fn with_daemon_timeout(mut self, timeout: Duration) -> Self {
        self.daemon_timeout = timeout;
        self
    }
}

pub struct BridgeSelector {
    probe: HostProbe,
    active: OnceCell<Arc<Backend>>,
}

impl BridgeSelector {
    pub fn new(probe: HostProbe) -> Self {
        Self {
            probe,
            active: OnceCell::new(),
        }
    }

    /// Detect the host and activate its backend. Idempotent.
    pub async fn ensure_injected(&self) -> Arc<Backend> {
        self.active
            .get_or_init(|| async { Arc::new(self.detect().await) })
            .await
            .clone()
    }

    /// The active backend, if detection already ran.
    pub fn active(&self) -> Option<Arc<Backend>> {
        self.active.get().cloned()
    }

    pub fn kind(&self) -> Option<BackendKind> {
        self.active.get().map(|backend| backend.kind())
    }

    async fn detect(&self) -> Backend {
        if let Some(ipc) = &self.probe.desktop {
            info!("Desktop shell detected");
            return Backend::Desktop(DesktopBackend::new(Arc::clone(ipc)));
        }

        if let Some(plugin) = &self.probe.mobile {
            let backend = MobileBackend::new(Arc::clone(plugin));
            match backend.check_ready().await {
                Ok(ready) => info!(
                    ready = ready.ready,
                    version = ready.version.as_deref().unwrap_or("unknown"),
                    "Mobile plugin detected"
                ),
                Err(e) => warn!(error = %e, "Mobile plugin readiness check failed"),
            }
            return Backend::Mobile(backend);
        }

        info!(daemon = %self.probe.daemon_base_url, "No native host, using standalone daemon");
        Backend::Standalone(StandaloneBackend::new(
            Arc::clone(&self.probe.http),
            self.probe.daemon_base_url.clone(),
            self.probe.daemon_timeout,
        ))
    }
}

impl fmt::Debug for BridgeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeSelector")
            .field("has_desktop", &self.probe.desktop.is_some())
            .field("has_mobile", &self.probe.mobile.is_some())
            .field("active", &self.kind())
            .finish()
    }
}
