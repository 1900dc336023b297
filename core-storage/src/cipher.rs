//! Device-bound AES-256-GCM sealing.
//!
//! The key is `SHA-256(fingerprint)` where the fingerprint is the host's
//! device signals plus a fixed application salt, joined by `|`. Sealed
//! payloads are `base64(nonce || ciphertext)` with a fresh 12-byte nonce.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bridge_traits::device::DeviceSignals;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::error::{Result, StorageError};

/// Application salt appended to the device fingerprint.
pub const FINGERPRINT_SALT: &str = "kaitu-secure-storage-v1";

const NONCE_LEN: usize = 12;

/// Build the fingerprint string the storage key is derived from.
pub fn device_fingerprint(signals: &DeviceSignals) -> String {
    let mut components = signals.components();
    components.push(FINGERPRINT_SALT.to_string());
    components.join("|")
}

/// Symmetric cipher derived from a device fingerprint.
#[derive(Clone)]
pub struct DeviceCipher {
    cipher: Aes256Gcm,
}

impl DeviceCipher {
    pub fn derive(fingerprint: &str) -> Self {
        let key = Sha256::digest(fingerprint.as_bytes());
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    pub fn seal(&self, plaintext: &[u8]) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from(nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|err| StorageError::Encryption(err.to_string()))?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(payload))
    }

    /// Decode and decrypt a payload produced by [`seal`](Self::seal).
    pub fn open(&self, encoded: &str) -> Result<Vec<u8>> {
        let data = BASE64
            .decode(encoded)
            .map_err(|err| StorageError::Corrupted(format!("base64: {err}")))?;

        if data.len() <= NONCE_LEN {
            return Err(StorageError::Corrupted("payload too small".into()));
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let mut nonce_array = [0u8; NONCE_LEN];
        nonce_array.copy_from_slice(nonce_bytes);
        let nonce = Nonce::from(nonce_array);

        self.cipher
            .decrypt(&nonce, ciphertext)
            .map_err(|err| StorageError::Corrupted(format!("decrypt: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals() -> DeviceSignals {
        DeviceSignals {
            user_agent: "Mozilla/5.0".to_string(),
            language: "zh-CN".to_string(),
            screen_width: 1440,
            screen_height: 900,
            color_depth: 24,
            timezone_offset: -480,
            hardware_concurrency: Some(8),
        }
    }

    #[test]
    fn test_fingerprint_appends_salt() {
        assert_eq!(
            device_fingerprint(&signals()),
            "Mozilla/5.0|zh-CN|1440|900|24|-480|8|kaitu-secure-storage-v1"
        );
    }

    #[test]
    fn test_nonce_is_fresh_per_seal() {
        let cipher = DeviceCipher::derive("fp");
        let a = cipher.seal(b"same").unwrap();
        let b = cipher.seal(b"same").unwrap();

        assert_ne!(a, b);
        assert_eq!(cipher.open(&a).unwrap(), b"same");
        assert_eq!(cipher.open(&b).unwrap(), b"same");
    }

    #[test]
    fn test_other_device_cannot_open() {
        let sealed = DeviceCipher::derive("device-a").seal(b"secret").unwrap();
        let err = DeviceCipher::derive("device-b").open(&sealed).unwrap_err();
        assert!(matches!(err, StorageError::Corrupted(_)));
    }

    #[test]
    fn test_rejects_garbage() {
        let cipher = DeviceCipher::derive("fp");
        assert!(matches!(cipher.open("%%%"), Err(StorageError::Corrupted(_))));
        assert!(matches!(cipher.open("AAAA"), Err(StorageError::Corrupted(_))));
    }
}
