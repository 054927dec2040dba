// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use crate::crypto::aead::{AeadKey, AeadNonce, AeadTag};
use crate::crypto::ed25519::{Signature, VerifyingKey};
use crate::crypto::hmac::HMAC_SHA256_SIZE;

/// Cryptographic capabilities consumed by the ratchet, the session and the pickle codec.
///
/// Implementations are stateless, all methods are associated functions and the provider is
/// selected through the type parameter of [`InboundGroupSession`](crate::InboundGroupSession).
/// The crate ships [`Crypto`](crate::Crypto) as the default.
pub trait CryptoProvider {
    type Error: Error + Send + Sync + 'static;

    /// One-way keyed hash used to derive ratchet parts from each other.
    fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; HMAC_SHA256_SIZE], Self::Error>;

    fn hkdf<const N: usize>(
        salt: &[u8],
        ikm: &[u8],
        info: Option<&[u8]>,
    ) -> Result<[u8; N], Self::Error>;

    /// Encrypts the plaintext and returns the ciphertext with a detached authentication tag.
    fn aead_encrypt(
        key: &AeadKey,
        plaintext: &[u8],
        nonce: AeadNonce,
        aad: Option<&[u8]>,
    ) -> Result<(Vec<u8>, AeadTag), Self::Error>;

    /// Authenticates and decrypts the ciphertext. Fails if the tag does not match.
    fn aead_decrypt(
        key: &AeadKey,
        ciphertext: &[u8],
        tag: &AeadTag,
        nonce: AeadNonce,
        aad: Option<&[u8]>,
    ) -> Result<Vec<u8>, Self::Error>;

    fn verify(
        bytes: &[u8],
        verifying_key: &VerifyingKey,
        signature: &Signature,
    ) -> Result<(), Self::Error>;
}
