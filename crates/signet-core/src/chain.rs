//! Signature chaining
//!
//! Every signature commits to the one before it. The payload submitted to the
//! signer for counter `n` is
//!
//! ```text
//! "<n>" || "_" || data || "_" || base64(anchor)
//! ```
//!
//! where the anchor is the device id for `n == 0` and signature `n - 1`
//! otherwise. Re-deriving each payload and verifying each signature in order
//! detects reordered, omitted or forged entries.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{Error, Result};
use crate::signer::Signer;
use crate::types::SignatureDevice;
use crate::PAYLOAD_SEPARATOR;

/// Value the next signature of `device` commits to
pub fn chain_anchor(device: &SignatureDevice) -> Result<&[u8]> {
    if device.counter == 0 {
        return Ok(device.id.as_bytes());
    }

    let previous = device.counter - 1;
    device
        .signature_history
        .get(&previous)
        .map(Vec::as_slice)
        .ok_or_else(|| {
            Error::chain_broken(
                previous as usize,
                format!("device {} has no signature at counter {}", device.id, previous),
            )
        })
}

/// Build the exact bytes submitted to the signer
pub fn build_payload(counter: u32, data: &[u8], anchor: &[u8]) -> Vec<u8> {
    let counter = counter.to_string();
    let anchor = STANDARD.encode(anchor);

    let mut payload = Vec::with_capacity(counter.len() + data.len() + anchor.len() + 2);
    payload.extend_from_slice(counter.as_bytes());
    payload.push(PAYLOAD_SEPARATOR);
    payload.extend_from_slice(data);
    payload.push(PAYLOAD_SEPARATOR);
    payload.extend_from_slice(anchor.as_bytes());
    payload
}

/// A signed payload split back into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    pub counter: u32,
    pub data: Vec<u8>,
    pub anchor: Vec<u8>,
}

impl SignedPayload {
    /// Parse a payload produced by [`build_payload`]
    ///
    /// The counter ends at the first separator and the anchor starts after the
    /// last one, so the data itself may contain separators.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let first = payload
            .iter()
            .position(|&b| b == PAYLOAD_SEPARATOR)
            .ok_or_else(|| Error::MalformedPayload("missing counter separator".to_string()))?;
        let last = payload
            .iter()
            .rposition(|&b| b == PAYLOAD_SEPARATOR)
            .filter(|&last| last > first)
            .ok_or_else(|| Error::MalformedPayload("missing anchor separator".to_string()))?;

        let counter_text = &payload[..first];
        if counter_text.is_empty() || !counter_text.iter().all(u8::is_ascii_digit) {
            return Err(Error::MalformedPayload("counter is not a decimal number".to_string()));
        }
        let counter = std::str::from_utf8(counter_text)
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or_else(|| Error::MalformedPayload("counter out of range".to_string()))?;

        let anchor = STANDARD
            .decode(&payload[last + 1..])
            .map_err(|e| Error::MalformedPayload(format!("anchor is not base64: {}", e)))?;

        Ok(Self {
            counter,
            data: payload[first + 1..last].to_vec(),
            anchor,
        })
    }

    /// Re-encode into payload bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        build_payload(self.counter, &self.data, &self.anchor)
    }
}

/// Verify an ordered chain of `(signature, signed_payload)` links
///
/// Link `i` must carry counter `i`, anchor on the device id (first link) or on
/// the signature of link `i - 1`, and its signature must verify.
pub fn verify_chain<S, P>(signer: &dyn Signer, device_id: &str, links: &[(S, P)]) -> Result<()>
where
    S: AsRef<[u8]>,
    P: AsRef<[u8]>,
{
    let mut expected_anchor: &[u8] = device_id.as_bytes();

    for (index, (signature, payload)) in links.iter().enumerate() {
        let signature = signature.as_ref();
        let parsed = SignedPayload::parse(payload.as_ref())
            .map_err(|e| Error::chain_broken(index, e.to_string()))?;

        if parsed.counter as usize != index {
            return Err(Error::chain_broken(
                index,
                format!("expected counter {}, found {}", index, parsed.counter),
            ));
        }
        if parsed.anchor != expected_anchor {
            return Err(Error::chain_broken(index, "anchor does not match previous link"));
        }
        signer
            .verify(payload.as_ref(), signature)
            .map_err(|_| Error::chain_broken(index, "signature does not verify"))?;

        expected_anchor = signature;
    }

    Ok(())
}
