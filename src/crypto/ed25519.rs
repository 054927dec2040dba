// SPDX-License-Identifier: MIT OR Apache-2.0

//! Edwards-Curve Digital Signature Algorithm (EdDSA) related to Curve25519 using SHA-512.
//!
//! The inbound side only ever verifies. Signing is available to test utilities which play the
//! role of the sender.
use std::fmt;

use ed25519_dalek::Verifier;
use thiserror::Error;

pub const VERIFYING_KEY_SIZE: usize = 32;

pub const SIGNATURE_SIZE: usize = 64;

/// Public Ed25519 key of the sender of a group session.
///
/// Bytes are guaranteed to represent a valid point on the curve.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct VerifyingKey([u8; VERIFYING_KEY_SIZE]);

impl VerifyingKey {
    pub fn from_bytes(bytes: [u8; VERIFYING_KEY_SIZE]) -> Result<Self, SignatureError> {
        ed25519_dalek::VerifyingKey::from_bytes(&bytes)
            .map_err(|_| SignatureError::InvalidVerifyingKey)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; VERIFYING_KEY_SIZE] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; VERIFYING_KEY_SIZE] {
        self.0
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    pub fn verify(&self, bytes: &[u8], signature: &Signature) -> Result<(), SignatureError> {
        let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(&self.0)
            .map_err(|_| SignatureError::InvalidVerifyingKey)?;
        let signature = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
        verifying_key
            .verify(bytes, &signature)
            .map_err(|_| SignatureError::VerificationFailed)
    }
}

impl fmt::Display for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// 512-bit Ed25519 signature.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_SIZE]);

impl Signature {
    pub fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; SIGNATURE_SIZE] {
        self.0
    }
}

#[cfg(any(test, feature = "test_utils"))]
pub use signing::SigningKey;

#[cfg(any(test, feature = "test_utils"))]
mod signing {
    use ed25519_dalek::Signer;
    use zeroize::ZeroizeOnDrop;

    use super::{Signature, VerifyingKey};

    pub const SIGNING_KEY_SIZE: usize = 32;

    #[derive(Clone, ZeroizeOnDrop)]
    pub struct SigningKey([u8; SIGNING_KEY_SIZE]);

    impl SigningKey {
        pub fn from_bytes(bytes: [u8; SIGNING_KEY_SIZE]) -> Self {
            Self(bytes)
        }

        pub fn verifying_key(&self) -> VerifyingKey {
            let signing_key = ed25519_dalek::SigningKey::from_bytes(&self.0);
            VerifyingKey(signing_key.verifying_key().to_bytes())
        }

        pub fn sign(&self, bytes: &[u8]) -> Signature {
            let signing_key = ed25519_dalek::SigningKey::from_bytes(&self.0);
            Signature(signing_key.sign(bytes).to_bytes())
        }
    }
}

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid ed25519 verifying key")]
    InvalidVerifyingKey,

    #[error("signature does not match public key and payload")]
    VerificationFailed,
}
