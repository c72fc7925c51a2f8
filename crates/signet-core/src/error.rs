//! Error types for the Signet core library

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Key parse error: {0}")]
    KeyParse(String),

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Signature verification failed")]
    VerificationFailed,

    #[error("Malformed signed payload: {0}")]
    MalformedPayload(String),

    #[error("Signature chain broken at link {index}: {reason}")]
    ChainBroken { index: usize, reason: String },
}

impl Error {
    /// Create a chain error for the given link
    pub fn chain_broken(index: usize, reason: impl Into<String>) -> Self {
        Self::ChainBroken {
            index,
            reason: reason.into(),
        }
    }
}
