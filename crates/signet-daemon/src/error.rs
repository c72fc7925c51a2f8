//! Error types for the Signet daemon

use thiserror::Error;

/// Result type alias for daemon operations
pub type Result<T> = std::result::Result<T, DaemonError>;

/// Failures reported by a [`DeviceStore`](crate::store::DeviceStore)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A device with this id is already stored
    #[error("Device already exists: {0}")]
    DeviceAlreadyExists(String),

    /// No device with this id is stored
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Backend failure
    #[error("Storage failure: {0}")]
    Storage(String),
}

/// Errors that can occur in the daemon
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Requested algorithm tag is not supported
    #[error("Unknown signing algorithm: {0}")]
    UnknownSigningAlgorithm(String),

    /// Device id collision
    #[error("Device already exists: {0}")]
    DeviceAlreadyExists(String),

    /// Device not found
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Store rejected a new device
    #[error("Device creation failed: {0}")]
    DeviceCreationFailed(#[source] StoreError),

    /// Store failure outside device creation
    #[error("Store error: {0}")]
    Storage(#[source] StoreError),

    /// Signer or key generation failure
    #[error("Crypto error: {0}")]
    Crypto(#[from] signet_core::Error),

    /// Device reached the largest representable counter
    #[error("Signature counter exhausted for device: {0}")]
    CounterExhausted(String),

    /// Blocking task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DaemonError {
    /// Whether the error must be hidden from clients
    ///
    /// Only validation and lookup failures carry information meant for the
    /// caller; everything else is reported as an opaque internal failure.
    pub fn is_internal(&self) -> bool {
        !matches!(
            self,
            DaemonError::UnknownSigningAlgorithm(_)
                | DaemonError::DeviceAlreadyExists(_)
                | DaemonError::DeviceNotFound(_)
        )
    }
}

impl From<StoreError> for DaemonError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DeviceAlreadyExists(id) => DaemonError::DeviceAlreadyExists(id),
            StoreError::DeviceNotFound(id) => DaemonError::DeviceNotFound(id),
            other => DaemonError::Storage(other),
        }
    }
}

impl From<tokio::task::JoinError> for DaemonError {
    fn from(e: tokio::task::JoinError) -> Self {
        DaemonError::Task(e.to_string())
    }
}

impl From<serde_json::Error> for DaemonError {
    fn from(e: serde_json::Error) -> Self {
        DaemonError::Serialization(e.to_string())
    }
}
