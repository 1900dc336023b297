//! # Bridge Core
//!
//! One VPN control contract over three host transports.
//!
//! ## Overview
//!
//! - [`Backend`]: closed set of transports (desktop IPC, mobile plugin,
//!   standalone HTTP daemon) behind `run(action, params) -> SResponse`
//! - [`BridgeSelector`]: detects the host once and activates one backend
//! - [`StatusPoller`]: samples `status` and publishes changes as
//!   [`ConnectionEvent`](core_runtime::events::ConnectionEvent)s
//! - [`HostEventPump`]: forwards host-pushed state, errors and updates
//! - [`TunnelEvaluationCache`]: caches `evaluate_tunnels` results
//!
//! ## Status normalization
//!
//! Every backend returns `status` in the shape of [`StatusResponseData`],
//! produced by [`normalize_status`]. See the [`status`] module for the
//! rules.

pub mod backend;
pub mod codes;
pub mod desktop;
pub mod error;
pub mod evaluation;
pub mod host_events;
pub mod mobile;
pub mod poller;
pub mod selector;
pub mod standalone;
pub mod status;
pub mod types;

pub use backend::{actions, Backend, BackendKind, VpnBackend};
pub use desktop::DesktopBackend;
pub use error::{BridgeCoreError, Result};
pub use evaluation::{route_quality_score, EvaluationStatus, TunnelEvaluationCache};
pub use host_events::HostEventPump;
pub use mobile::MobileBackend;
pub use poller::{StatusPoller, StatusPublisher};
pub use selector::{BridgeSelector, HostProbe};
pub use standalone::StandaloneBackend;
pub use status::{error_status, normalize_status};
pub use types::{
    ConfigResponseData, ConnectionState, ControlError, EvaluateTunnelsParams,
    EvaluateTunnelsResponse, EvaluatedTunnel, PlatformInfo, SpeedtestParams,
    SpeedtestResponseData, SpeedtestStatusResponseData, StatusResponseData, TunnelInput,
    UploadLogParams, UploadLogResult, VersionResponseData,
};
