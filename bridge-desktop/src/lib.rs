//! # Desktop Bridge Implementations
//!
//! Host capabilities for desktop shells (macOS, Windows, Linux) and for the
//! standalone web build that talks to a local daemon:
//! - [`ReqwestHttpClient`]: `HttpClient` on `reqwest` with rustls
//! - [`FileKeyValueStore`]: `KeyValueStore` as a JSON file in the data dir
//! - [`MemoryKeyValueStore`]: `KeyValueStore` that lives in memory
//! - [`DesktopDeviceSignals`]: `DeviceSignalSource` from process environment
//!
//! The desktop IPC channel and mobile plugin are provided by the native
//! shells themselves and are not implemented here.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopDeviceSignals, FileKeyValueStore, ReqwestHttpClient};
//! use std::sync::Arc;
//!
//! let http = Arc::new(ReqwestHttpClient::new()?);
//! let medium = Arc::new(FileKeyValueStore::default_location()?);
//! let signals = Arc::new(DesktopDeviceSignals::new());
//! ```

mod http;
mod kv_file;
mod kv_memory;
mod signals;

pub use http::ReqwestHttpClient;
pub use kv_file::FileKeyValueStore;
pub use kv_memory::MemoryKeyValueStore;
pub use signals::DesktopDeviceSignals;
