//! # Secure Storage
//!
//! Confidentiality-at-rest for credentials on hosts whose only persistent
//! medium is a plain string map (`localStorage`, a JSON file).
//!
//! Values are wrapped in a [`StorageEntry`], serialized to JSON and sealed
//! with AES-256-GCM under a key derived from the host's
//! [`DeviceSignals`](bridge_traits::device::DeviceSignals). This keeps tokens
//! out of reach of casual inspection (devtools, file browsers). It is not a
//! defense against an attacker with code execution on the device.
//!
//! ```ignore
//! use core_storage::SecureStorage;
//! use std::time::Duration;
//!
//! let storage = SecureStorage::new(medium, signals);
//! storage.set("k2.auth.token", "abc", Some(Duration::from_secs(3600))).await?;
//! let token: Option<String> = storage.get("k2.auth.token").await?;
//! ```

pub mod cipher;
pub mod error;
pub mod secure;

pub use error::{Result, StorageError};
pub use secure::{SecureStorage, StorageEntry, DEFAULT_NAMESPACE};
