//! Signet Core - Device types, signers and signature chaining
//!
//! This crate provides the building blocks for the Signet signing service:
//! - Signature device data model and its redacted external view
//! - RSA and ECC signers behind one [`Signer`] trait
//! - Key pair generation encoded as PEM
//! - The chained payload format that links every signature to the previous one

pub mod chain;
pub mod error;
pub mod keygen;
pub mod signer;
pub mod types;

pub use chain::{build_payload, chain_anchor, verify_chain, SignedPayload};
pub use error::{Error, Result};
pub use keygen::{generate_key_pair, generate_key_pair_by_tag, KeyPair, RSA_KEY_BITS};
pub use signer::{resolve_signer, resolve_signer_by_tag, EccSigner, RsaSigner, Signer};
pub use types::{
    DeviceSummary, NewSignatureDeviceRequest, PrivateKeyPem, SignatureDevice, SignedData,
    SigningAlgorithm,
};

/// Separator between the counter, data and anchor parts of a signed payload
pub const PAYLOAD_SEPARATOR: u8 = b'_';
