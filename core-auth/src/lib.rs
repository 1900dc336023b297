//! # Authentication Module
//!
//! Cloud account authentication for the K2 client.
//!
//! ## Overview
//!
//! - [`TokenStore`] keeps the access and refresh tokens in encrypted storage.
//! - [`CloudApi`] talks to the cloud API, attaching bearer tokens and
//!   recovering from 401 responses with a single-flight refresh.
//! - [`SessionManager`] drives login, logout and startup session restore,
//!   and builds tunnel URLs carrying the device credentials.
//! - [`EntryResolver`] finds the cloud API entry URL through sealed CDN
//!   mirror documents, falling back to the configured base URL.
//! - [`ResponseCache`] keeps cloud reads for offline fallback and
//!   stale-while-revalidate.
//!
//! Auth transitions are published on the shared event bus as
//! [`core_runtime::events::AuthEvent`].

pub mod cache;
pub mod cloud;
pub mod entry;
pub mod error;
pub mod session;
pub mod token_store;
pub mod types;

pub use cache::{CacheEntry, CachePolicy, ResponseCache, USER_INFO_CACHE_KEY};
pub use cloud::{CloudApi, SharedSession, LOGIN_PATH, LOGOUT_PATH, PROFILE_PATH, REFRESH_PATH};
pub use entry::{EntryResolver, EntrySources, ENTRY_STORAGE_KEY};
pub use error::{AuthError, Result};
pub use session::{DeviceBridge, SessionManager, TUNNEL_SCHEME};
pub use token_store::{TokenStore, REFRESH_TOKEN_STORAGE_KEY, TOKEN_STORAGE_KEY};
pub use types::{AuthState, Session, TokenPair, TunnelCredentials};
