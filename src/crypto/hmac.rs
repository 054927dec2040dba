// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyed-hash message authentication code (HMAC) with SHA256, used as the one-way function of the
//! group ratchet.
//!
//! <https://www.rfc-editor.org/rfc/rfc2104>
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

pub const HMAC_SHA256_SIZE: usize = 32;

pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; HMAC_SHA256_SIZE], HmacError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(|_| HmacError::InvalidKeyLength)?;
    mac.update(data);
    let mut out = [0u8; HMAC_SHA256_SIZE];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

#[derive(Debug, Error)]
pub enum HmacError {
    #[error("invalid key length for hmac")]
    InvalidKeyLength,
}
