//! Token persistence in encrypted storage.
//!
//! Two entries, both sealed by [`SecureStorage`]:
//! - `k2.auth.token`: access token
//! - `k2.auth.refresh`: refresh token
//!
//! Reads never fail: an unreadable entry is logged and treated as absent, so
//! callers fall back to the anonymous path instead of erroring.

use core_storage::SecureStorage;
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::TokenPair;

pub const TOKEN_STORAGE_KEY: &str = "k2.auth.token";
pub const REFRESH_TOKEN_STORAGE_KEY: &str = "k2.auth.refresh";

#[derive(Clone, Debug)]
pub struct TokenStore {
    storage: SecureStorage,
}

impl TokenStore {
    pub fn new(storage: SecureStorage) -> Self {
        Self { storage }
    }

    /// Current access token, if any.
    pub async fn token(&self) -> Option<String> {
        self.read(TOKEN_STORAGE_KEY).await
    }

    /// Current refresh token, if any.
    pub async fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_STORAGE_KEY).await
    }

    /// Both tokens, when an access token is stored.
    pub async fn tokens(&self) -> Option<TokenPair> {
        let access = self.token().await?;
        Some(TokenPair::new(access, self.refresh_token().await))
    }

    /// Persist tokens. The refresh token is only written when present, so a
    /// refresh response without one keeps the stored refresh token.
    pub async fn set_tokens(&self, tokens: &TokenPair) -> Result<()> {
        self.storage
            .set(TOKEN_STORAGE_KEY, tokens.access_token.as_str(), None)
            .await?;
        debug!("Access token saved");

        if let Some(refresh) = tokens.refresh_token.as_deref() {
            self.storage
                .set(REFRESH_TOKEN_STORAGE_KEY, refresh, None)
                .await?;
            debug!("Refresh token saved");
        }

        Ok(())
    }

    /// Remove both tokens. Storage failures are logged, never returned.
    pub async fn clear_tokens(&self) {
        for key in [TOKEN_STORAGE_KEY, REFRESH_TOKEN_STORAGE_KEY] {
            if let Err(e) = self.storage.remove(key).await {
                warn!(key, error = %e, "Failed to remove token");
            }
        }
        debug!("Tokens cleared");
    }

    /// `true` when a non-empty access token is stored. Expiry is not checked.
    pub async fn has_token(&self) -> bool {
        self.token().await.is_some_and(|token| !token.is_empty())
    }

    async fn read(&self, key: &str) -> Option<String> {
        match self.storage.get::<String>(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to read token");
                None
            }
        }
    }
}
