use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage medium error: {0}")]
    Medium(#[from] BridgeError),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Payload could not be decoded, decrypted or parsed.
    #[error("Corrupted entry: {0}")]
    Corrupted(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;
