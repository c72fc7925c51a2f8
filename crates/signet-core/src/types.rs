//! Signature device data model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

use crate::error::Error;

/// Signing algorithm bound to a device at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    /// RSASSA-PKCS1-v1_5 over SHA-256
    #[serde(rename = "RSA")]
    Rsa,

    /// ECDSA P-384 over SHA-384
    #[serde(rename = "ECC")]
    Ecc,
}

impl SigningAlgorithm {
    /// All supported algorithms
    pub const ALL: [SigningAlgorithm; 2] = [SigningAlgorithm::Rsa, SigningAlgorithm::Ecc];

    /// Textual tag used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rsa => "RSA",
            Self::Ecc => "ECC",
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RSA" => Ok(Self::Rsa),
            "ECC" => Ok(Self::Ecc),
            other => Err(Error::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// PKCS#8 PEM encoded private key, wiped from memory on drop
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKeyPem(Zeroizing<String>);

impl PrivateKeyPem {
    pub fn new(pem: impl Into<String>) -> Self {
        Self(Zeroizing::new(pem.into()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<Zeroizing<String>> for PrivateKeyPem {
    fn from(pem: Zeroizing<String>) -> Self {
        Self(pem)
    }
}

impl fmt::Debug for PrivateKeyPem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKeyPem(<redacted>)")
    }
}

/// A key pair bound to one algorithm that signs on behalf of a client
///
/// Not serializable: the external view is [`DeviceSummary`].
#[derive(Clone)]
pub struct SignatureDevice {
    /// Unique, immutable identifier
    pub id: String,

    /// Algorithm the private key belongs to
    pub algorithm: SigningAlgorithm,

    /// Free-form display label
    pub label: String,

    /// Number of signatures produced so far
    pub counter: u32,

    /// Encoded private key
    pub private_key: PrivateKeyPem,

    /// Signatures keyed by the counter value they were produced at
    pub signature_history: BTreeMap<u32, Vec<u8>>,
}

impl SignatureDevice {
    /// Create a device that has never signed
    pub fn new(
        id: impl Into<String>,
        algorithm: SigningAlgorithm,
        label: impl Into<String>,
        private_key: PrivateKeyPem,
    ) -> Self {
        Self {
            id: id.into(),
            algorithm,
            label: label.into(),
            counter: 0,
            private_key,
            signature_history: BTreeMap::new(),
        }
    }

    /// Whether the counter agrees with the number of stored signatures
    pub fn is_consistent(&self) -> bool {
        self.signature_history.len() == self.counter as usize
            && self
                .signature_history
                .keys()
                .copied()
                .eq(0..self.counter)
    }

    /// Signatures in the order they were produced
    pub fn signatures(&self) -> Vec<Vec<u8>> {
        self.signature_history.values().cloned().collect()
    }

    pub fn summary(&self) -> DeviceSummary {
        DeviceSummary::from(self)
    }
}

impl fmt::Debug for SignatureDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureDevice")
            .field("id", &self.id)
            .field("algorithm", &self.algorithm)
            .field("label", &self.label)
            .field("counter", &self.counter)
            .field("private_key", &self.private_key)
            .field("signatures", &self.signature_history.len())
            .finish()
    }
}

/// Input for creating a device
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewSignatureDeviceRequest {
    /// Requested algorithm tag, validated by the service
    pub algorithm: String,

    #[serde(default)]
    pub label: String,
}

impl NewSignatureDeviceRequest {
    pub fn new(algorithm: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            label: label.into(),
        }
    }
}

/// Externally visible view of a device, without key material or history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub id: String,
    pub algorithm: SigningAlgorithm,
    pub label: String,
    pub counter: u32,
}

impl From<&SignatureDevice> for DeviceSummary {
    fn from(device: &SignatureDevice) -> Self {
        Self {
            id: device.id.clone(),
            algorithm: device.algorithm,
            label: device.label.clone(),
            counter: device.counter,
        }
    }
}

/// Result of one signing operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedData {
    /// Signature over `signed_payload`
    pub signature: Vec<u8>,

    /// Exact bytes that were submitted to the signer
    pub signed_payload: Vec<u8>,
}
