//! Key pair generation
//!
//! Keys are encoded as PEM so they can travel through any textual channel:
//! PKCS#8 for the private half, SPKI for the public half.

use rand::rngs::OsRng;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::error::{Error, Result};
use crate::types::{PrivateKeyPem, SigningAlgorithm};

/// Default RSA modulus size in bits
pub const RSA_KEY_BITS: usize = 2048;

/// Smallest RSA modulus accepted for new keys
pub const MIN_RSA_KEY_BITS: usize = 2048;

/// Freshly generated key pair
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// Algorithm the pair belongs to
    pub algorithm: SigningAlgorithm,

    /// SPKI PEM public key
    pub public_key_pem: String,

    /// PKCS#8 PEM private key
    pub private_key: PrivateKeyPem,
}

/// Generate a key pair for the given algorithm
pub fn generate_key_pair(algorithm: SigningAlgorithm) -> Result<KeyPair> {
    match algorithm {
        SigningAlgorithm::Rsa => generate_rsa_key_pair(RSA_KEY_BITS),
        SigningAlgorithm::Ecc => generate_ecc_key_pair(),
    }
}

/// Generate a key pair from a textual algorithm tag
pub fn generate_key_pair_by_tag(tag: &str) -> Result<KeyPair> {
    generate_key_pair(tag.parse()?)
}

/// Generate an RSA key pair with a modulus of `bits` bits
pub fn generate_rsa_key_pair(bits: usize) -> Result<KeyPair> {
    if bits < MIN_RSA_KEY_BITS {
        return Err(Error::KeyGeneration(format!(
            "RSA modulus of {} bits is below the minimum of {}",
            bits, MIN_RSA_KEY_BITS
        )));
    }

    let private_key = RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| Error::KeyGeneration(format!("RSA: {}", e)))?;

    let public_key_pem = RsaPublicKey::from(&private_key)
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| Error::KeyGeneration(format!("RSA public key encoding: {}", e)))?;

    let private_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| Error::KeyGeneration(format!("RSA private key encoding: {}", e)))?;

    Ok(KeyPair {
        algorithm: SigningAlgorithm::Rsa,
        public_key_pem,
        private_key: PrivateKeyPem::from(private_pem),
    })
}

/// Generate a NIST P-384 key pair
pub fn generate_ecc_key_pair() -> Result<KeyPair> {
    let secret_key = p384::SecretKey::random(&mut OsRng);

    let public_key_pem = secret_key
        .public_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| Error::KeyGeneration(format!("ECC public key encoding: {}", e)))?;

    let private_pem = secret_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| Error::KeyGeneration(format!("ECC private key encoding: {}", e)))?;

    Ok(KeyPair {
        algorithm: SigningAlgorithm::Ecc,
        public_key_pem,
        private_key: PrivateKeyPem::from(private_pem),
    })
}
