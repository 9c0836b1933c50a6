use thiserror::Error;

/// Main error type for ADS bridge operations
#[derive(Error, Debug)]
pub enum AdsError {
    /// Malformed connection string
    #[error("Address error: {0}")]
    Address(String),

    /// The device reported a data type this bridge cannot decode
    #[error("Unsupported data type {type_name:?} (number={type_id} size={size} comment={comment:?})")]
    UnsupportedType {
        type_name: String,
        type_id: u32,
        size: u32,
        comment: String,
    },

    /// Malformed or undersized payload
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// Failure reported by the transport collaborator
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-zero ADS return code from the device
    #[error("Device error code {0:#x}")]
    Device(u32),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The device worker is no longer draining its command queue
    #[error("Device worker stopped")]
    WorkerStopped,

    #[error("Symbol {0:?} has been released")]
    SymbolReleased(String),

    #[error("Timeout")]
    Timeout,
}

/// Result type alias for ADS bridge operations
pub type AdsResult<T> = Result<T, AdsError>;
