use bridge_traits::BridgeError;
use core_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Secure storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// The cloud API answered with a non-zero envelope code.
    #[error("Request rejected ({code}): {message}")]
    Rejected { code: i32, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Device bridge error: {0}")]
    Device(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AuthError {
    /// The server was never reached, so nothing is known about the
    /// credentials that were sent.
    pub fn is_transport(&self) -> bool {
        match self {
            AuthError::Rejected { code, .. } => *code == -1,
            AuthError::Bridge(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
