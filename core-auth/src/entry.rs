//! # Entry Resolution
//!
//! The cloud API host can be blocked on some networks, so its current entry
//! URL is also published on CDN mirrors as a sealed document:
//!
//! ```text
//! window.__k2ac = {"v": 1, "data": "<base64(nonce || AES-256-GCM ciphertext)>"};
//! ```
//!
//! The plaintext is `{"entries": ["https://..."]}` and the first entry wins.
//!
//! ## Resolution order
//!
//! 1. The entry already resolved in this process.
//! 2. The persisted entry (`k2_entry_url`). The mirrors are then consulted
//!    once in the background so the next start uses a fresh entry.
//! 3. The mirrors, in order. The first usable entry is persisted.
//! 4. The configured fallback base URL.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use core_storage::SecureStorage;

use crate::error::{AuthError, Result};

/// Storage key of the last entry learned from the mirrors.
pub const ENTRY_STORAGE_KEY: &str = "k2_entry_url";

/// Per-mirror request timeout.
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

const NONCE_LEN: usize = 12;
const DOCUMENT_VERSION: u32 = 1;

/// Mirror URLs plus the key their documents are sealed with.
#[derive(Clone)]
pub struct EntrySources {
    urls: Vec<String>,
    key: [u8; 32],
}

impl EntrySources {
    /// # Errors
    ///
    /// [`AuthError::Config`] when `key_hex` is not 64 hex characters.
    pub fn new(urls: Vec<String>, key_hex: &str) -> Result<Self> {
        let mut key = [0u8; 32];
        hex::decode_to_slice(key_hex.trim(), &mut key)
            .map_err(|e| AuthError::Config(format!("entry key: {e}")))?;
        Ok(Self { urls, key })
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }
}

impl fmt::Debug for EntrySources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntrySources")
            .field("urls", &self.urls)
            .field("key", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct SealedDocument {
    v: u32,
    data: String,
}

#[derive(Deserialize)]
struct EntryList {
    #[serde(default)]
    entries: Vec<String>,
}

/// Resolves the cloud API base URL. Clones share the resolved entry.
#[derive(Clone)]
pub struct EntryResolver {
    inner: Arc<Inner>,
}

struct Inner {
    http: Arc<dyn HttpClient>,
    storage: SecureStorage,
    sources: EntrySources,
    fallback: String,
    timeout: Duration,
    resolved: Mutex<Option<String>>,
}

impl EntryResolver {
    pub fn new(
        http: Arc<dyn HttpClient>,
        storage: SecureStorage,
        sources: EntrySources,
        fallback: impl Into<String>,
    ) -> Self {
        Self::with_timeout(http, storage, sources, fallback, DEFAULT_SOURCE_TIMEOUT)
    }

    pub fn with_timeout(
        http: Arc<dyn HttpClient>,
        storage: SecureStorage,
        sources: EntrySources,
        fallback: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                storage,
                sources,
                fallback: trim_base(&fallback.into()),
                timeout,
                resolved: Mutex::new(None),
            }),
        }
    }

    pub fn fallback(&self) -> &str {
        &self.inner.fallback
    }

    /// Base URL for the next cloud request. Never fails.
    ///
    /// Concurrent callers wait for a single resolution.
    pub async fn resolve(&self) -> String {
        let mut resolved = self.inner.resolved.lock().await;
        if let Some(entry) = resolved.as_ref() {
            return entry.clone();
        }

        let entry = match self.persisted().await {
            Some(entry) => {
                self.refresh_in_background();
                entry
            }
            None => match self.fetch_from_sources().await {
                Some(entry) => entry,
                None => {
                    info!(fallback = %self.inner.fallback, "No usable mirror, using fallback");
                    self.inner.fallback.clone()
                }
            },
        };

        *resolved = Some(entry.clone());
        entry
    }

    async fn persisted(&self) -> Option<String> {
        match self.inner.storage.get::<String>(ENTRY_STORAGE_KEY).await {
            Ok(entry) => entry.filter(|e| is_http_url(e)).map(|e| trim_base(&e)),
            Err(e) => {
                warn!(error = %e, "Reading persisted entry failed");
                None
            }
        }
    }

    fn refresh_in_background(&self) {
        let resolver = self.clone();
        tokio::spawn(async move {
            if let Some(entry) = resolver.fetch_from_sources().await {
                *resolver.inner.resolved.lock().await = Some(entry);
            }
        });
    }

    /// Try every mirror in order and persist the first usable entry.
    #[instrument(skip(self), fields(mirrors = self.inner.sources.urls.len()))]
    pub async fn fetch_from_sources(&self) -> Option<String> {
        for url in &self.inner.sources.urls {
            let Some(entry) = self.fetch_one(url).await else {
                continue;
            };

            if let Err(e) = self.inner.storage.set(ENTRY_STORAGE_KEY, &entry, None).await {
                warn!(error = %e, "Persisting entry failed");
            }
            info!(entry = %entry, "Entry resolved from mirror");
            return Some(entry);
        }
        None
    }

    async fn fetch_one(&self, url: &str) -> Option<String> {
        let request = HttpRequest::new(HttpMethod::Get, url).timeout(self.inner.timeout);
        let response = match self.inner.http.execute(request).await {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                debug!(url, status = response.status, "Mirror answered with an error");
                return None;
            }
            Err(e) => {
                debug!(url, error = %e, "Mirror unreachable");
                return None;
            }
        };

        let text = response.text().ok()?;
        let entry = parse_document(&text, &self.inner.sources.key);
        if entry.is_none() {
            debug!(url, "Mirror document unusable");
        }
        entry
    }
}

impl fmt::Debug for EntryResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryResolver")
            .field("sources", &self.inner.sources)
            .field("fallback", &self.inner.fallback)
            .finish()
    }
}

/// First entry of a mirror document, if it is well formed and opens under `key`.
fn parse_document(text: &str, key: &[u8; 32]) -> Option<String> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    let document: SealedDocument = serde_json::from_str(text.get(start..=end)?).ok()?;
    if document.v != DOCUMENT_VERSION {
        return None;
    }

    let plaintext = open_sealed(&document.data, key)?;
    let list: EntryList = serde_json::from_str(&plaintext).ok()?;
    list.entries
        .into_iter()
        .next()
        .filter(|entry| is_http_url(entry))
        .map(|entry| trim_base(&entry))
}

/// Decrypt `base64(nonce || ciphertext)`. Any failure reads as `None`.
pub fn open_sealed(encoded: &str, key: &[u8; 32]) -> Option<String> {
    let data = BASE64.decode(encoded.trim()).ok()?;
    if data.len() <= NONCE_LEN {
        return None;
    }

    let (nonce, ciphertext) = data.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key).ok()?;
    let plaintext = cipher.decrypt(Nonce::from_slice(nonce), ciphertext).ok()?;
    String::from_utf8(plaintext).ok()
}

fn is_http_url(value: &str) -> bool {
    Url::parse(value).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_storage, MockHttpClient};
    use bridge_traits::http::HttpResponse;
    use bridge_traits::BridgeError;
    use serde_json::json;

    const KEY_HEX: &str = "9e3573184d5e5b3034a087c33fa2cdb76bd0126238ed08f54d1de8c6ae0eb4ba";
    const MIRROR_A: &str = "https://cdn-a.test/config.js";
    const MIRROR_B: &str = "https://cdn-b.test/config.js";
    const FALLBACK: &str = "https://fallback.test";

    fn sources() -> EntrySources {
        EntrySources::new(vec![MIRROR_A.into(), MIRROR_B.into()], KEY_HEX).unwrap()
    }

    fn seal(plaintext: &str, key: &[u8; 32]) -> String {
        let cipher = Aes256Gcm::new_from_slice(key).unwrap();
        let nonce = [7u8; NONCE_LEN];
        let mut payload = nonce.to_vec();
        payload.extend(
            cipher
                .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
                .unwrap(),
        );
        BASE64.encode(payload)
    }

    fn document(entries: &[&str]) -> String {
        let sealed = seal(&json!({ "entries": entries }).to_string(), &sources().key);
        format!("window.__k2ac = {};", json!({"v": 1, "data": sealed}))
    }

    fn resolver(http: MockHttpClient, storage: SecureStorage) -> EntryResolver {
        EntryResolver::new(Arc::new(http), storage, sources(), FALLBACK)
    }

    #[test]
    fn test_open_sealed_rejects_wrong_key_and_tampering() {
        let key = sources().key;
        let sealed = seal("https://example.com", &key);
        assert_eq!(open_sealed(&sealed, &key).as_deref(), Some("https://example.com"));

        let mut wrong = key;
        wrong[0] ^= 0xff;
        assert!(open_sealed(&sealed, &wrong).is_none());

        let mut raw = BASE64.decode(&sealed).unwrap();
        raw[14] ^= 0xff;
        assert!(open_sealed(&BASE64.encode(raw), &key).is_none());
        assert!(open_sealed("not base64!", &key).is_none());
    }

    #[test]
    fn test_bad_key_is_a_config_error() {
        assert!(matches!(
            EntrySources::new(vec![], "abc"),
            Err(AuthError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_first_usable_mirror_wins_and_is_persisted() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|req| req.url == MIRROR_A)
            .times(1)
            .returning(|_| Err(BridgeError::OperationFailed("blocked".into())));
        http.expect_execute()
            .withf(|req| req.url == MIRROR_B && req.timeout == Some(DEFAULT_SOURCE_TIMEOUT))
            .times(1)
            .returning(|_| {
                Ok(HttpResponse::new(
                    200,
                    document(&["https://entry.test/", "https://backup.test"]),
                ))
            });

        let storage = memory_storage();
        let resolver = resolver(http, storage.clone());

        assert_eq!(resolver.resolve().await, "https://entry.test");
        // memoized: no second round of mirror requests
        assert_eq!(resolver.resolve().await, "https://entry.test");
        assert_eq!(
            storage.get::<String>(ENTRY_STORAGE_KEY).await.unwrap().as_deref(),
            Some("https://entry.test")
        );
    }

    #[tokio::test]
    async fn test_unusable_mirrors_fall_back() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|req| req.url == MIRROR_A)
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, r#"window.__k2ac = {"v": 2, "data": ""};"#)));
        http.expect_execute()
            .withf(|req| req.url == MIRROR_B)
            .times(1)
            .returning(|_| Ok(HttpResponse::new(404, "not found")));

        let storage = memory_storage();
        let resolver = resolver(http, storage.clone());

        assert_eq!(resolver.resolve().await, FALLBACK);
        assert!(storage
            .get::<String>(ENTRY_STORAGE_KEY)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_persisted_entry_is_used_then_refreshed_in_background() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|req| req.url == MIRROR_A)
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, document(&["https://new.test"]))));

        let storage = memory_storage();
        storage
            .set(ENTRY_STORAGE_KEY, "https://old.test", None)
            .await
            .unwrap();
        let resolver = resolver(http, storage.clone());

        assert_eq!(resolver.resolve().await, "https://old.test");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            storage.get::<String>(ENTRY_STORAGE_KEY).await.unwrap().as_deref(),
            Some("https://new.test")
        );
        assert_eq!(resolver.resolve().await, "https://new.test");
    }

    #[tokio::test]
    async fn test_no_mirrors_uses_fallback_without_requests() {
        let mut http = MockHttpClient::new();
        http.expect_execute().never();

        let sources = EntrySources::new(Vec::new(), KEY_HEX).unwrap();
        let resolver =
            EntryResolver::new(Arc::new(http), memory_storage(), sources, "https://api.test/");

        assert_eq!(resolver.resolve().await, "https://api.test");
    }
}
