//! Algorithm-specific signers behind one capability trait

use p384::ecdsa::signature::{DigestSigner, DigestVerifier};
use p384::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256, Sha384};

use crate::error::{Error, Result};
use crate::types::{PrivateKeyPem, SigningAlgorithm};

/// Signing capability shared by every supported algorithm
pub trait Signer: Send + Sync {
    /// Algorithm implemented by this signer
    fn algorithm(&self) -> SigningAlgorithm;

    /// Sign the payload, hashing it first with the algorithm's digest
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>>;

    /// Verify a signature produced by [`Signer::sign`]
    ///
    /// Any mismatch, including a signature that cannot be decoded, is
    /// reported as [`Error::VerificationFailed`].
    fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<()>;

    /// SPKI PEM encoding of the verifying key
    fn public_key_pem(&self) -> Result<String>;
}

/// Resolve a signer for a device's algorithm and encoded private key
pub fn resolve_signer(
    algorithm: SigningAlgorithm,
    private_key: &PrivateKeyPem,
) -> Result<Box<dyn Signer>> {
    match algorithm {
        SigningAlgorithm::Rsa => Ok(Box::new(RsaSigner::from_pem(private_key)?)),
        SigningAlgorithm::Ecc => Ok(Box::new(EccSigner::from_pem(private_key)?)),
    }
}

/// Resolve a signer from a textual algorithm tag
pub fn resolve_signer_by_tag(tag: &str, private_key: &PrivateKeyPem) -> Result<Box<dyn Signer>> {
    resolve_signer(tag.parse()?, private_key)
}

/// RSASSA-PKCS1-v1_5 signer over SHA-256 digests
pub struct RsaSigner {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl RsaSigner {
    pub fn new(private_key: RsaPrivateKey) -> Self {
        let public_key = RsaPublicKey::from(&private_key);
        Self {
            private_key,
            public_key,
        }
    }

    /// Decode a PKCS#8 PEM private key
    pub fn from_pem(pem: &PrivateKeyPem) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem.as_str())
            .map_err(|e| Error::KeyParse(format!("RSA private key: {}", e)))?;
        Ok(Self::new(private_key))
    }
}

impl Signer for RsaSigner {
    fn algorithm(&self) -> SigningAlgorithm {
        SigningAlgorithm::Rsa
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let digest = Sha256::digest(payload);
        self.private_key
            .sign_with_rng(&mut OsRng, Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| Error::Signing(e.to_string()))
    }

    fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<()> {
        let digest = Sha256::digest(payload);
        self.public_key
            .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
            .map_err(|_| Error::VerificationFailed)
    }

    fn public_key_pem(&self) -> Result<String> {
        self.public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| Error::KeyParse(e.to_string()))
    }
}

/// ECDSA P-384 signer over SHA-384 digests, producing DER signatures
pub struct EccSigner {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl EccSigner {
    pub fn new(signing_key: SigningKey) -> Self {
        let verifying_key = VerifyingKey::from(&signing_key);
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Decode a PKCS#8 PEM private key
    pub fn from_pem(pem: &PrivateKeyPem) -> Result<Self> {
        let secret_key = p384::SecretKey::from_pkcs8_pem(pem.as_str())
            .map_err(|e| Error::KeyParse(format!("ECC private key: {}", e)))?;
        Ok(Self::new(SigningKey::from(secret_key)))
    }
}

impl Signer for EccSigner {
    fn algorithm(&self) -> SigningAlgorithm {
        SigningAlgorithm::Ecc
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let signature: EcdsaSignature = self
            .signing_key
            .try_sign_digest(Sha384::new_with_prefix(payload))
            .map_err(|e| Error::Signing(e.to_string()))?;
        Ok(signature.to_der().as_bytes().to_vec())
    }

    fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<()> {
        let signature =
            EcdsaSignature::from_der(signature).map_err(|_| Error::VerificationFailed)?;
        self.verifying_key
            .verify_digest(Sha384::new_with_prefix(payload), &signature)
            .map_err(|_| Error::VerificationFailed)
    }

    fn public_key_pem(&self) -> Result<String> {
        p384::PublicKey::from(&self.verifying_key)
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| Error::KeyParse(e.to_string()))
    }
}
