// SPDX-License-Identifier: MIT OR Apache-2.0

//! Default cryptographic provider for group sessions.
//!
//! Following algorithms are used:
//! * HMAC with SHA256 for ratchet derivation
//! * HKDF with SHA256 for message and pickle keys
//! * XChaCha20-Poly1305 AEAD with detached tag
//! * EdDSA related to Curve25519 with SHA-512
use thiserror::Error;

use crate::crypto::aead::{self, AeadKey, AeadNonce, AeadTag};
use crate::crypto::ed25519::{self, Signature, VerifyingKey};
use crate::crypto::hkdf;
use crate::crypto::hmac::{self, HMAC_SHA256_SIZE};
use crate::traits::CryptoProvider;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Crypto;

impl CryptoProvider for Crypto {
    type Error = CryptoError;

    fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; HMAC_SHA256_SIZE], Self::Error> {
        let mac = hmac::hmac_sha256(key, data)?;
        Ok(mac)
    }

    fn hkdf<const N: usize>(
        salt: &[u8],
        ikm: &[u8],
        info: Option<&[u8]>,
    ) -> Result<[u8; N], Self::Error> {
        let key_material = hkdf::hkdf(salt, ikm, info)?;
        Ok(key_material)
    }

    fn aead_encrypt(
        key: &AeadKey,
        plaintext: &[u8],
        nonce: AeadNonce,
        aad: Option<&[u8]>,
    ) -> Result<(Vec<u8>, AeadTag), Self::Error> {
        let ciphertext_tag = aead::aead_encrypt(key, plaintext, nonce, aad)?;
        Ok(ciphertext_tag)
    }

    fn aead_decrypt(
        key: &AeadKey,
        ciphertext: &[u8],
        tag: &AeadTag,
        nonce: AeadNonce,
        aad: Option<&[u8]>,
    ) -> Result<Vec<u8>, Self::Error> {
        let plaintext = aead::aead_decrypt(key, ciphertext, tag, nonce, aad)?;
        Ok(plaintext)
    }

    fn verify(
        bytes: &[u8],
        verifying_key: &VerifyingKey,
        signature: &Signature,
    ) -> Result<(), Self::Error> {
        verifying_key.verify(bytes, signature)?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error(transparent)]
    Hmac(#[from] hmac::HmacError),

    #[error(transparent)]
    Hkdf(#[from] hkdf::HkdfError),

    #[error(transparent)]
    Aead(#[from] aead::AeadError),

    #[error(transparent)]
    Signature(#[from] ed25519::SignatureError),
}
