// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authenticated encryption of session state under a caller-supplied key.
//!
//! ```text
//! +---------+----------+-----------+------------+----------+
//! | version | kdf salt | nonce     | ciphertext | tag      |
//! | 1 byte  | 16 bytes | 24 bytes  | n bytes    | 16 bytes |
//! +---------+----------+-----------+------------+----------+
//! ```
//!
//! The encryption key is derived from the pickle key with HKDF-SHA256 and a fresh random salt,
//! the plaintext is the CBOR-encoded session state. The version byte is authenticated as
//! associated data.
use std::error::Error;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cbor::{DecodeError, EncodeError, decode_cbor, encode_cbor};
use crate::crypto::aead::{
    AEAD_KEY_SIZE, AEAD_NONCE_SIZE, AEAD_TAG_SIZE, AeadKey, AeadNonce, AeadTag,
};
use crate::crypto::ed25519::VERIFYING_KEY_SIZE;
use crate::crypto::{Rng, RngError, Secret};
use crate::ratchet::Ratchet;
use crate::traits::CryptoProvider;

pub const PICKLE_VERSION: u8 = 1;

pub const PICKLE_SALT_SIZE: usize = 16;

const PICKLE_KEY_INFO: &[u8] = b"p2panda-group-session pickle";

const SALT_START: usize = 1;

const NONCE_START: usize = SALT_START + PICKLE_SALT_SIZE;

const CIPHERTEXT_START: usize = NONCE_START + AEAD_NONCE_SIZE;

/// Size of a pickle with empty plaintext.
const MIN_PICKLE_SIZE: usize = CIPHERTEXT_START + AEAD_TAG_SIZE;

/// Plaintext state of an inbound group session.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PickledSession {
    pub ratchet: Ratchet,
    #[serde(with = "serde_bytes")]
    pub signing_key: [u8; VERIFYING_KEY_SIZE],
    pub first_known_index: u32,
    pub verified: bool,
}

pub(crate) fn pickle<C: CryptoProvider>(
    state: &PickledSession,
    key: &[u8],
    rng: &Rng,
) -> Result<Vec<u8>, PickleError> {
    let plaintext = encode_cbor(state)?;

    let salt: [u8; PICKLE_SALT_SIZE] = rng.random_array()?;
    let nonce: AeadNonce = rng.random_array()?;
    let pickle_key = derive_key::<C>(key, &salt)?;

    let (ciphertext, tag) = C::aead_encrypt(
        pickle_key.as_bytes(),
        &plaintext,
        nonce,
        Some([PICKLE_VERSION].as_slice()),
    )
    .map_err(PickleError::crypto)?;

    let mut bytes = Vec::with_capacity(MIN_PICKLE_SIZE + ciphertext.len());
    bytes.push(PICKLE_VERSION);
    bytes.extend_from_slice(&salt);
    bytes.extend_from_slice(&nonce);
    bytes.extend_from_slice(&ciphertext);
    bytes.extend_from_slice(&tag);

    Ok(bytes)
}

pub(crate) fn unpickle<C: CryptoProvider>(
    key: &[u8],
    bytes: &[u8],
) -> Result<PickledSession, PickleError> {
    let Some(version) = bytes.first() else {
        return Err(PickleError::TooShort(0));
    };

    if *version != PICKLE_VERSION {
        return Err(PickleError::UnsupportedVersion(*version));
    }

    if bytes.len() < MIN_PICKLE_SIZE {
        return Err(PickleError::TooShort(bytes.len()));
    }

    let tag_start = bytes.len() - AEAD_TAG_SIZE;

    let mut nonce: AeadNonce = [0u8; AEAD_NONCE_SIZE];
    nonce.copy_from_slice(&bytes[NONCE_START..CIPHERTEXT_START]);
    let mut tag: AeadTag = [0u8; AEAD_TAG_SIZE];
    tag.copy_from_slice(&bytes[tag_start..]);

    let pickle_key = derive_key::<C>(key, &bytes[SALT_START..NONCE_START])?;

    let plaintext = zeroize::Zeroizing::new(
        C::aead_decrypt(
            pickle_key.as_bytes(),
            &bytes[CIPHERTEXT_START..tag_start],
            &tag,
            nonce,
            Some([PICKLE_VERSION].as_slice()),
        )
        .map_err(|_| PickleError::BadPickleKey)?,
    );

    let state: PickledSession = decode_cbor(&plaintext)?;

    if state.ratchet.index() < state.first_known_index {
        return Err(PickleError::InvalidState(
            "ratchet index lies behind first known index",
        ));
    }

    Ok(state)
}

fn derive_key<C: CryptoProvider>(
    key: &[u8],
    salt: &[u8],
) -> Result<Secret<AEAD_KEY_SIZE>, PickleError> {
    let pickle_key: AeadKey =
        C::hkdf(salt, key, Some(PICKLE_KEY_INFO)).map_err(PickleError::crypto)?;
    Ok(Secret::from_bytes(pickle_key))
}

#[derive(Debug, Error)]
pub enum PickleError {
    #[error("unsupported pickle version {0}")]
    UnsupportedVersion(u8),

    #[error("pickle with {0} bytes is too short")]
    TooShort(usize),

    #[error("pickle key does not match or pickle is corrupted")]
    BadPickleKey,

    #[error("invalid session state in pickle: {0}")]
    InvalidState(&'static str),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Rng(#[from] RngError),

    #[error("pickle encryption failed: {0}")]
    Crypto(Box<dyn Error + Send + Sync>),
}

impl PickleError {
    fn crypto<E: Error + Send + Sync + 'static>(err: E) -> Self {
        Self::Crypto(Box::new(err))
    }
}
