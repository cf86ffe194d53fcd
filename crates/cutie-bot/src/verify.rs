//! Interaction signature verification.
//!
//! Every interaction the platform POSTs carries an Ed25519 signature over
//! `timestamp || body`, made with the application's key.  Requests that fail
//! verification must be rejected with 401.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("Invalid public key")]
    InvalidKey,

    #[error("Malformed signature")]
    MalformedSignature,

    #[error("Signature does not match")]
    Mismatch,
}

/// Checks interaction signatures against the application's public key.
#[derive(Debug, Clone)]
pub struct InteractionVerifier {
    key: VerifyingKey,
}

impl InteractionVerifier {
    pub fn new(key: VerifyingKey) -> Self {
        Self { key }
    }

    /// Build a verifier from the 64-char hex key shown in the developer portal.
    pub fn from_hex(hex_key: &str) -> Result<Self, VerifyError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|_| VerifyError::InvalidKey)?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| VerifyError::InvalidKey)?;
        let key = VerifyingKey::from_bytes(&bytes).map_err(|_| VerifyError::InvalidKey)?;
        Ok(Self { key })
    }

    pub fn verify(
        &self,
        signature_hex: &str,
        timestamp: &str,
        body: &[u8],
    ) -> Result<(), VerifyError> {
        let sig_bytes = hex::decode(signature_hex).map_err(|_| VerifyError::MalformedSignature)?;
        let signature =
            Signature::from_slice(&sig_bytes).map_err(|_| VerifyError::MalformedSignature)?;

        let mut payload = Vec::with_capacity(timestamp.len() + body.len());
        payload.extend_from_slice(timestamp.as_bytes());
        payload.extend_from_slice(body);

        self.key
            .verify(&payload, &signature)
            .map_err(|_| VerifyError::Mismatch)
    }
}
