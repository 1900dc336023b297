//! Core service façade and bootstrap.
//!
//! This crate wires host-provided bridge implementations (HTTP, key/value
//! storage medium, device signals, and the optional desktop IPC or mobile
//! plugin) into the bridge core and exposes the result as [`K2Client`].
//! Desktop apps typically enable the `desktop-shims` feature (which depends on
//! `bridge-desktop`) so the HTTP client, storage medium and device signals
//! default to desktop implementations.
//!
//! ```ignore
//! use core_runtime::config::BridgeConfig;
//! use core_service::K2Client;
//!
//! let config = BridgeConfig::builder().with_env_overrides().build()?;
//! let client = K2Client::builder().config(config).build().await?;
//! client.restore_session().await;
//! client.start().await?;
//! ```

mod client;
pub mod error;

pub use client::{K2Client, K2ClientBuilder, USER_INFO_TTL};
pub use error::{CoreError, Result};
