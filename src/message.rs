// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire format of encrypted group messages.
//!
//! ```text
//! +---------+-------------+------------+----------+----------------+
//! | version | index (u32) | ciphertext | mac      | signature      |
//! | 1 byte  | 4 bytes, BE | n bytes    | 16 bytes | 64 bytes       |
//! +---------+-------------+------------+----------+----------------+
//! ```
//!
//! The MAC is the detached AEAD tag, computed over the ciphertext with version and index as
//! associated data. The Ed25519 signature covers every byte preceding it.
use thiserror::Error;

use crate::crypto::aead::{AEAD_TAG_SIZE, AeadTag};
use crate::crypto::ed25519::{SIGNATURE_SIZE, Signature};

pub const MESSAGE_VERSION: u8 = 3;

const INDEX_SIZE: usize = 4;

/// Bytes authenticated as associated data of the AEAD.
pub(crate) const MESSAGE_HEADER_SIZE: usize = 1 + INDEX_SIZE;

/// Size of a message with empty ciphertext.
pub const MIN_MESSAGE_SIZE: usize = MESSAGE_HEADER_SIZE + AEAD_TAG_SIZE + SIGNATURE_SIZE;

/// Encrypted group message, decoded from its wire representation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupMessage {
    index: u32,
    ciphertext: Vec<u8>,
    mac: AeadTag,
    signature: Signature,
}

impl GroupMessage {
    pub fn new(index: u32, ciphertext: Vec<u8>, mac: AeadTag, signature: Signature) -> Self {
        Self {
            index,
            ciphertext,
            mac,
            signature,
        }
    }

    /// Decode a message, validating the version tag and length before extracting any fields.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        let Some(version) = bytes.first() else {
            return Err(MessageError::TooShort(0));
        };

        if *version != MESSAGE_VERSION {
            return Err(MessageError::UnknownVersion(*version));
        }

        if bytes.len() < MIN_MESSAGE_SIZE {
            return Err(MessageError::TooShort(bytes.len()));
        }

        let mac_start = bytes.len() - SIGNATURE_SIZE - AEAD_TAG_SIZE;
        let signature_start = bytes.len() - SIGNATURE_SIZE;

        let mut index = [0u8; INDEX_SIZE];
        index.copy_from_slice(&bytes[1..MESSAGE_HEADER_SIZE]);

        let mut mac = [0u8; AEAD_TAG_SIZE];
        mac.copy_from_slice(&bytes[mac_start..signature_start]);

        let mut signature = [0u8; SIGNATURE_SIZE];
        signature.copy_from_slice(&bytes[signature_start..]);

        Ok(Self {
            index: u32::from_be_bytes(index),
            ciphertext: bytes[MESSAGE_HEADER_SIZE..mac_start].to_vec(),
            mac,
            signature: Signature::from_bytes(signature),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.signed_bytes();
        bytes.extend_from_slice(self.signature.as_bytes());
        bytes
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn mac(&self) -> &AeadTag {
        &self.mac
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Associated data of the AEAD: version tag and index.
    pub(crate) fn header(index: u32) -> [u8; MESSAGE_HEADER_SIZE] {
        let mut header = [0u8; MESSAGE_HEADER_SIZE];
        header[0] = MESSAGE_VERSION;
        header[1..].copy_from_slice(&index.to_be_bytes());
        header
    }

    /// Everything the sender's signature covers.
    pub(crate) fn signed_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(MIN_MESSAGE_SIZE + self.ciphertext.len());
        bytes.extend_from_slice(&Self::header(self.index));
        bytes.extend_from_slice(&self.ciphertext);
        bytes.extend_from_slice(&self.mac);
        bytes
    }
}

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("unknown message version {0}")]
    UnknownVersion(u8),

    #[error("message with {0} bytes is too short")]
    TooShort(usize),
}

#[cfg(test)]
mod tests {
    use crate::crypto::ed25519::Signature;

    use super::{GroupMessage, MIN_MESSAGE_SIZE, MessageError};

    #[test]
    fn encode_decode() {
        let message = GroupMessage::new(
            0x0102_0304,
            b"ciphertext".to_vec(),
            [7; 16],
            Signature::from_bytes([9; 64]),
        );

        let bytes = message.to_bytes();
        assert_eq!(bytes.len(), MIN_MESSAGE_SIZE + 10);
        assert_eq!(bytes[0], 3);
        assert_eq!(&bytes[1..5], &[1, 2, 3, 4]);

        assert_eq!(GroupMessage::from_bytes(&bytes).unwrap(), message);
    }

    #[test]
    fn empty_ciphertext() {
        let message =
            GroupMessage::new(0, Vec::new(), [1; 16], Signature::from_bytes([2; 64]));
        let bytes = message.to_bytes();
        assert_eq!(bytes.len(), MIN_MESSAGE_SIZE);

        let decoded = GroupMessage::from_bytes(&bytes).unwrap();
        assert!(decoded.ciphertext().is_empty());
        assert_eq!(decoded.mac(), &[1; 16]);
        assert_eq!(decoded.signature(), &Signature::from_bytes([2; 64]));
    }

    #[test]
    fn invalid_messages() {
        assert!(matches!(
            GroupMessage::from_bytes(&[]),
            Err(MessageError::TooShort(0))
        ));

        let mut bytes = GroupMessage::new(5, vec![1, 2, 3], [0; 16], Signature::from_bytes([0; 64]))
            .to_bytes();

        assert!(matches!(
            GroupMessage::from_bytes(&bytes[..MIN_MESSAGE_SIZE - 1]),
            Err(MessageError::TooShort(_))
        ));

        bytes[0] = 1;
        assert!(matches!(
            GroupMessage::from_bytes(&bytes),
            Err(MessageError::UnknownVersion(1))
        ));
    }
}
