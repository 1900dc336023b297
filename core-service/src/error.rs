use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] core_storage::StorageError),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] core_bridge::BridgeCoreError),

    #[error("Host error: {0}")]
    Host(#[from] bridge_traits::BridgeError),
}

impl CoreError {
    #[cfg_attr(feature = "desktop-shims", allow(dead_code))]
    pub(crate) fn missing(capability: &str, message: &str) -> Self {
        CoreError::CapabilityMissing {
            capability: capability.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
