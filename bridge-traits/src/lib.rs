//! # Host Bridge Traits
//!
//! Capabilities the K2 bridge core needs from whichever shell it is embedded in.
//!
//! ## Overview
//!
//! The core never talks to a window, a native plugin or an OS keychain directly.
//! Each host (desktop shell, mobile shell, standalone web page served by the
//! daemon) implements the traits below and hands them to the composition root
//! in `core-service`.
//!
//! ## Traits
//!
//! ### Transports
//! - [`DesktopIpc`](host::DesktopIpc) - Native IPC `invoke` exposed by the desktop shell
//! - [`MobilePlugin`](host::MobilePlugin) - Native VPN plugin exposed by the mobile shell
//! - [`HttpClient`](http::HttpClient) - Async HTTP for the standalone daemon and the cloud API
//!
//! ### Storage & device
//! - [`KeyValueStore`](storage::KeyValueStore) - Plain string medium (localStorage-like)
//! - [`DeviceSignalSource`](device::DeviceSignalSource) - Environment signals for key derivation
//!
//! ### Wire types
//! - [`SResponse`](envelope::SResponse) - `{ code, message?, data? }` envelope shared by all hosts
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing:
//!
//! ```ignore
//! let http_client = config.http_client
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "HttpClient".to_string(),
//!         message: "Standalone mode talks to the daemon over HTTP".to_string(),
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Host
//! implementations convert their native failures into it; the backend adapters
//! then fold every `BridgeError` into a `code = -1` response envelope.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared across async
//! tasks behind `Arc`.

pub mod device;
pub mod envelope;
pub mod error;
pub mod host;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use device::{DeviceSignalSource, DeviceSignals};
pub use envelope::SResponse;
pub use host::{
    DesktopIpc, HostEvent, HostEventStream, MobilePlugin, PluginReady, UpdateInfo,
};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::KeyValueStore;
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
