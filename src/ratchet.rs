// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::crypto::Secret;
use crate::crypto::aead::{AEAD_KEY_SIZE, AEAD_NONCE_SIZE, AeadKey, AeadNonce};
use crate::traits::CryptoProvider;

/// Number of parts in the ratchet. The advancement algorithm relies on this being 4, one part per
/// byte of the 32-bit counter.
pub const RATCHET_PARTS: usize = 4;

/// Size of each ratchet part in bytes, matching the HMAC-SHA256 output.
pub const RATCHET_PART_SIZE: usize = 32;

pub const RATCHET_SIZE: usize = RATCHET_PARTS * RATCHET_PART_SIZE;

const MESSAGE_KEYS_INFO: &[u8] = b"p2panda-group-session message keys";

const MESSAGE_KEYS_SIZE: usize = AEAD_KEY_SIZE + AEAD_NONCE_SIZE;

/// Multi-part hash ratchet deriving one key per message index.
///
/// The ratchet consists of four parts `R(0)..R(3)`, each one responsible for one byte of the
/// 32-bit counter (`R(0)` for the most significant one). Whenever the byte belonging to `R(i)`
/// changes, `R(i)` is hashed forward and all "lower" parts `R(i+1)..R(3)` are re-derived from it:
///
/// ```text
/// R(i, j) = HMAC-SHA256(R(i, j-1), [i])            (hash part forward)
/// R(k, j) = HMAC-SHA256(R(i, j-1), [k]) for k > i  (re-seed lower parts)
/// ```
///
/// This allows jumping from index `c` to index `n` with at most `4 * 255` hash operations instead
/// of `n - c`, while the result is exactly the same as advancing one step at a time.
///
/// All parts which get overwritten are zeroised: after advancing there is no way to recover the
/// key material of any earlier index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratchet {
    parts: [Secret<RATCHET_PART_SIZE>; RATCHET_PARTS],
    counter: u32,
}

impl Ratchet {
    /// Initialise ratchet from raw key material positioned at the given index.
    pub(crate) fn from_bytes(bytes: &[u8; RATCHET_SIZE], counter: u32) -> Self {
        let parts = std::array::from_fn(|i| {
            let mut part = [0u8; RATCHET_PART_SIZE];
            part.copy_from_slice(&bytes[i * RATCHET_PART_SIZE..(i + 1) * RATCHET_PART_SIZE]);
            Secret::from_bytes(part)
        });
        Self { parts, counter }
    }

    /// Concatenation of all ratchet parts.
    pub(crate) fn to_bytes(&self) -> Secret<RATCHET_SIZE> {
        let mut bytes = [0u8; RATCHET_SIZE];
        for (i, part) in self.parts.iter().enumerate() {
            bytes[i * RATCHET_PART_SIZE..(i + 1) * RATCHET_PART_SIZE]
                .copy_from_slice(part.as_bytes());
        }
        Secret::from_bytes(bytes)
    }

    /// Message index this ratchet state belongs to.
    pub fn index(&self) -> u32 {
        self.counter
    }

    /// Advance the ratchet by exactly one step.
    ///
    /// The counter wraps around after `u32::MAX`, which re-derives the whole ratchet.
    pub fn advance<C: CryptoProvider>(&mut self) -> Result<(), RatchetError> {
        self.counter = self.counter.wrapping_add(1);

        // Find the highest part whose counter byte changed.
        let mut mask: u32 = 0x00FF_FFFF;
        let mut h = 0;
        while h < RATCHET_PARTS {
            if self.counter & mask == 0 {
                break;
            }
            h += 1;
            mask >>= 8;
        }

        // Re-derive R(h)..R(3) from R(h). R(h) comes last since the others are derived from its
        // previous value.
        for i in (h..RATCHET_PARTS).rev() {
            self.rehash_part::<C>(h, i)?;
        }

        Ok(())
    }

    /// Advance the ratchet to the given index.
    ///
    /// Fails if the index lies behind the current position, the ratchet can never move backwards.
    pub fn advance_to<C: CryptoProvider>(&mut self, index: u32) -> Result<(), RatchetError> {
        if index < self.counter {
            return Err(RatchetError::IndexTooLow {
                current: self.counter,
                target: index,
            });
        }

        if index == self.counter {
            return Ok(());
        }

        let from = self.counter;

        for j in 0..RATCHET_PARTS {
            let shift = (RATCHET_PARTS - j - 1) * 8;
            let mask = u32::MAX << shift;

            // How often do we need to rehash this part? Since all higher parts have been handled
            // already, only the byte belonging to this part can differ.
            let steps = ((index >> shift).wrapping_sub(self.counter >> shift)) & 0xff;
            if steps == 0 {
                continue;
            }

            // For all but the last step we only bump R(j) without touching R(j+1)..R(3).
            for _ in 1..steps {
                self.rehash_part::<C>(j, j)?;
            }

            // On the last step we also re-derive R(j+1)..R(3) from R(j).
            for k in (j..RATCHET_PARTS).rev() {
                self.rehash_part::<C>(j, k)?;
            }

            self.counter = index & mask;
        }

        trace!(from, to = index, "advanced group ratchet");

        Ok(())
    }

    /// Derive the symmetric key and nonce to encrypt or decrypt the message at the current index.
    pub(crate) fn message_keys<C: CryptoProvider>(
        &self,
    ) -> Result<(Secret<AEAD_KEY_SIZE>, AeadNonce), RatchetError> {
        let ikm = self.to_bytes();
        let okm: [u8; MESSAGE_KEYS_SIZE] =
            C::hkdf(&[], ikm.as_bytes(), Some(MESSAGE_KEYS_INFO)).map_err(RatchetError::crypto)?;
        let okm = Secret::from_bytes(okm);

        let mut key: AeadKey = [0u8; AEAD_KEY_SIZE];
        key.copy_from_slice(&okm.as_bytes()[..AEAD_KEY_SIZE]);
        let mut nonce: AeadNonce = [0u8; AEAD_NONCE_SIZE];
        nonce.copy_from_slice(&okm.as_bytes()[AEAD_KEY_SIZE..]);

        Ok((Secret::from_bytes(key), nonce))
    }

    fn rehash_part<C: CryptoProvider>(
        &mut self,
        from: usize,
        to: usize,
    ) -> Result<(), RatchetError> {
        let seed = [to as u8];
        let part =
            C::hmac_sha256(self.parts[from].as_bytes(), &seed).map_err(RatchetError::crypto)?;
        self.parts[to] = Secret::from_bytes(part);
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum RatchetError {
    #[error("can not move ratchet backwards from index {current} to {target}")]
    IndexTooLow { current: u32, target: u32 },

    #[error("ratchet key derivation failed: {0}")]
    Crypto(Box<dyn Error + Send + Sync>),
}

impl RatchetError {
    fn crypto<E: Error + Send + Sync + 'static>(err: E) -> Self {
        Self::Crypto(Box::new(err))
    }
}
