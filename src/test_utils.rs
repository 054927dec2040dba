// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sending side of a group session and logging setup, for tests and fuzzing.
use crate::crypto::aead::{AeadTag, aead_encrypt};
use crate::crypto::ed25519::{Signature, SigningKey};
use crate::crypto::{Crypto, Rng};
use crate::message::GroupMessage;
use crate::ratchet::{RATCHET_SIZE, Ratchet};
use crate::session::SessionId;
use crate::session_key::SessionKey;

/// Minimal sender which encrypts and signs group messages.
pub struct OutboundGroupSession {
    ratchet: Ratchet,
    signing_key: SigningKey,
}

impl OutboundGroupSession {
    pub fn new(rng: &Rng) -> Self {
        let ratchet_bytes: [u8; RATCHET_SIZE] = rng.random_array().unwrap();
        let signing_key = SigningKey::from_bytes(rng.random_array().unwrap());

        Self {
            ratchet: Ratchet::from_bytes(&ratchet_bytes, 0),
            signing_key,
        }
    }

    /// Signed session key of the current ratchet state.
    pub fn session_key(&self) -> SessionKey {
        SessionKey::encode(&self.ratchet, &self.signing_key)
    }

    pub fn session_id(&self) -> SessionId {
        let session_key = self.session_key();
        let (_, verifying_key) = session_key.decode::<Crypto>().unwrap();
        SessionId::from(verifying_key)
    }

    /// Index of the next encrypted message.
    pub fn message_index(&self) -> u32 {
        self.ratchet.index()
    }

    /// Encrypt and sign a message with the current ratchet state, then advance the ratchet.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Vec<u8> {
        let index = self.ratchet.index();
        let (key, nonce) = self.ratchet.message_keys::<Crypto>().unwrap();
        let (ciphertext, mac) = aead_encrypt(
            key.as_bytes(),
            plaintext,
            nonce,
            Some(GroupMessage::header(index).as_slice()),
        )
        .unwrap();

        let bytes = self.sign(index, ciphertext, mac);
        self.ratchet.advance::<Crypto>().unwrap();
        bytes
    }

    /// Sign arbitrary message contents with the session's signing key.
    ///
    /// Allows crafting messages which carry a valid signature but were not encrypted correctly.
    pub fn sign(&self, index: u32, ciphertext: Vec<u8>, mac: AeadTag) -> Vec<u8> {
        let unsigned = GroupMessage::new(index, ciphertext, mac, Signature::from_bytes([0; 64]));
        let signature = self.signing_key.sign(&unsigned.signed_bytes());
        GroupMessage::new(index, unsigned.ciphertext().to_vec(), mac, signature).to_bytes()
    }
}

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}
