use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeCoreError {
    #[error("Host bridge error: {0}")]
    Host(#[from] BridgeError),

    /// The daemon or plugin answered with a non-zero code.
    #[error("Backend rejected request ({code}): {message}")]
    Rejected { code: i32, message: String },

    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),

    #[error("Status poller is already running")]
    PollerAlreadyRunning,

    #[error("No async runtime available: {0}")]
    NoRuntime(String),
}

pub type Result<T> = std::result::Result<T, BridgeCoreError>;
