// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key material to bootstrap inbound group sessions.
//!
//! A [`SessionKey`] is handed out by the sender when it creates a group session. It is signed with
//! the session's Ed25519 key, proving that the holder of the signing key created it:
//!
//! ```text
//! version (0x02) | index (u32, BE) | ratchet (128) | verifying key (32) | signature (64)
//! ```
//!
//! An [`ExportedSessionKey`] is produced by receivers to share a session from a given message
//! index onwards. It carries no signature, since receivers do not hold the signing key:
//!
//! ```text
//! version (0x01) | index (u32, BE) | ratchet (128) | verifying key (32)
//! ```
use thiserror::Error;

use crate::crypto::Secret;
use crate::crypto::ed25519::{
    SIGNATURE_SIZE, Signature, SignatureError, VERIFYING_KEY_SIZE, VerifyingKey,
};
use crate::ratchet::{RATCHET_SIZE, Ratchet};
use crate::traits::CryptoProvider;

pub const SESSION_KEY_VERSION: u8 = 2;

pub const EXPORTED_SESSION_KEY_VERSION: u8 = 1;

pub const EXPORTED_SESSION_KEY_SIZE: usize = 1 + 4 + RATCHET_SIZE + VERIFYING_KEY_SIZE;

pub const SESSION_KEY_SIZE: usize = EXPORTED_SESSION_KEY_SIZE + SIGNATURE_SIZE;

const RATCHET_START: usize = 5;

const VERIFYING_KEY_START: usize = RATCHET_START + RATCHET_SIZE;

/// Signed session key, as created by the sender of a group session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionKey(Secret<SESSION_KEY_SIZE>);

impl SessionKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SessionKeyError> {
        let bytes = check_layout::<SESSION_KEY_SIZE>(bytes, SESSION_KEY_VERSION)?;
        Ok(Self(Secret::from_bytes(bytes)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn index(&self) -> u32 {
        read_index(self.0.as_bytes())
    }

    /// Sign the current ratchet state with the session's signing key.
    #[cfg(any(test, feature = "test_utils"))]
    pub(crate) fn encode(
        ratchet: &Ratchet,
        signing_key: &crate::crypto::ed25519::SigningKey,
    ) -> Self {
        let mut bytes = [0u8; SESSION_KEY_SIZE];
        write_unsigned(
            &mut bytes,
            SESSION_KEY_VERSION,
            ratchet,
            &signing_key.verifying_key(),
        );
        let signature = signing_key.sign(&bytes[..EXPORTED_SESSION_KEY_SIZE]);
        bytes[EXPORTED_SESSION_KEY_SIZE..].copy_from_slice(signature.as_bytes());
        Self(Secret::from_bytes(bytes))
    }

    /// Extract ratchet and signing key after checking the self-signature.
    pub(crate) fn decode<C: CryptoProvider>(
        &self,
    ) -> Result<(Ratchet, VerifyingKey), SessionKeyError> {
        let bytes = self.0.as_bytes();
        let (ratchet, signing_key) = read_unsigned(bytes)?;

        let mut signature = [0u8; SIGNATURE_SIZE];
        signature.copy_from_slice(&bytes[EXPORTED_SESSION_KEY_SIZE..]);
        C::verify(
            &bytes[..EXPORTED_SESSION_KEY_SIZE],
            &signing_key,
            &Signature::from_bytes(signature),
        )
        .map_err(|_| SessionKeyError::InvalidSignature)?;

        Ok((ratchet, signing_key))
    }
}

/// Unsigned session key, exported by a receiver to share the session from a given index onwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedSessionKey(Secret<EXPORTED_SESSION_KEY_SIZE>);

impl ExportedSessionKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SessionKeyError> {
        let bytes =
            check_layout::<EXPORTED_SESSION_KEY_SIZE>(bytes, EXPORTED_SESSION_KEY_VERSION)?;
        Ok(Self(Secret::from_bytes(bytes)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }

    pub fn index(&self) -> u32 {
        read_index(self.0.as_bytes())
    }

    pub(crate) fn encode(ratchet: &Ratchet, signing_key: &VerifyingKey) -> Self {
        let mut bytes = [0u8; EXPORTED_SESSION_KEY_SIZE];
        write_unsigned(&mut bytes, EXPORTED_SESSION_KEY_VERSION, ratchet, signing_key);
        Self(Secret::from_bytes(bytes))
    }

    pub(crate) fn decode(&self) -> Result<(Ratchet, VerifyingKey), SessionKeyError> {
        read_unsigned(self.0.as_bytes())
    }
}

fn check_layout<const N: usize>(bytes: &[u8], version: u8) -> Result<[u8; N], SessionKeyError> {
    match bytes.first() {
        Some(given) if *given != version => return Err(SessionKeyError::UnknownVersion(*given)),
        _ => (),
    }

    bytes
        .try_into()
        .map_err(|_| SessionKeyError::InvalidLength {
            expected: N,
            given: bytes.len(),
        })
}

fn read_index(bytes: &[u8]) -> u32 {
    let mut index = [0u8; 4];
    index.copy_from_slice(&bytes[1..RATCHET_START]);
    u32::from_be_bytes(index)
}

fn read_unsigned(bytes: &[u8]) -> Result<(Ratchet, VerifyingKey), SessionKeyError> {
    let mut ratchet = [0u8; RATCHET_SIZE];
    ratchet.copy_from_slice(&bytes[RATCHET_START..VERIFYING_KEY_START]);
    let ratchet = Secret::from_bytes(ratchet);

    let mut signing_key = [0u8; VERIFYING_KEY_SIZE];
    signing_key
        .copy_from_slice(&bytes[VERIFYING_KEY_START..VERIFYING_KEY_START + VERIFYING_KEY_SIZE]);
    let signing_key = VerifyingKey::from_bytes(signing_key)?;

    Ok((
        Ratchet::from_bytes(ratchet.as_bytes(), read_index(bytes)),
        signing_key,
    ))
}

fn write_unsigned(bytes: &mut [u8], version: u8, ratchet: &Ratchet, signing_key: &VerifyingKey) {
    bytes[0] = version;
    bytes[1..RATCHET_START].copy_from_slice(&ratchet.index().to_be_bytes());
    bytes[RATCHET_START..VERIFYING_KEY_START].copy_from_slice(ratchet.to_bytes().as_bytes());
    bytes[VERIFYING_KEY_START..VERIFYING_KEY_START + VERIFYING_KEY_SIZE]
        .copy_from_slice(signing_key.as_bytes());
}

#[derive(Debug, Error)]
pub enum SessionKeyError {
    #[error("expected session key with {expected} bytes, got {given}")]
    InvalidLength { expected: usize, given: usize },

    #[error("unknown session key version {0}")]
    UnknownVersion(u8),

    #[error("invalid signing key in session key: {0}")]
    InvalidSigningKey(#[from] SignatureError),

    #[error("session key signature does not match signing key")]
    InvalidSignature,
}

#[cfg(test)]
mod tests {
    use crate::crypto::ed25519::SigningKey;
    use crate::crypto::{Crypto, Rng};
    use crate::ratchet::{RATCHET_SIZE, Ratchet};

    use super::{
        EXPORTED_SESSION_KEY_SIZE, ExportedSessionKey, SESSION_KEY_SIZE, SessionKey,
        SessionKeyError,
    };

    fn key_material(rng: &Rng, index: u32) -> (Ratchet, SigningKey) {
        let ratchet_bytes: [u8; RATCHET_SIZE] = rng.random_array().unwrap();
        let signing_key = SigningKey::from_bytes(rng.random_array().unwrap());
        (Ratchet::from_bytes(&ratchet_bytes, index), signing_key)
    }

    #[test]
    fn signed_session_key() {
        let rng = Rng::from_seed([1; 32]);
        let (ratchet, signing_key) = key_material(&rng, 42);

        let session_key = SessionKey::encode(&ratchet, &signing_key);
        assert_eq!(session_key.as_bytes().len(), SESSION_KEY_SIZE);
        assert_eq!(session_key.index(), 42);

        let session_key = SessionKey::from_bytes(session_key.as_bytes()).unwrap();
        let (decoded_ratchet, verifying_key) = session_key.decode::<Crypto>().unwrap();
        assert_eq!(decoded_ratchet, ratchet);
        assert_eq!(verifying_key, signing_key.verifying_key());
    }

    #[test]
    fn tampered_session_key() {
        let rng = Rng::from_seed([1; 32]);
        let (ratchet, signing_key) = key_material(&rng, 0);

        let mut bytes = SessionKey::encode(&ratchet, &signing_key).as_bytes().to_vec();
        bytes[10] ^= 1;

        let session_key = SessionKey::from_bytes(&bytes).unwrap();
        assert!(matches!(
            session_key.decode::<Crypto>(),
            Err(SessionKeyError::InvalidSignature)
        ));
    }

    #[test]
    fn exported_session_key() {
        let rng = Rng::from_seed([1; 32]);
        let (ratchet, signing_key) = key_material(&rng, 7);

        let exported = ExportedSessionKey::encode(&ratchet, &signing_key.verifying_key());
        assert_eq!(exported.as_bytes().len(), EXPORTED_SESSION_KEY_SIZE);
        assert_eq!(exported.index(), 7);

        let exported = ExportedSessionKey::from_bytes(&exported.to_bytes()).unwrap();
        let (decoded_ratchet, verifying_key) = exported.decode().unwrap();
        assert_eq!(decoded_ratchet, ratchet);
        assert_eq!(verifying_key, signing_key.verifying_key());
    }

    #[test]
    fn invalid_layout() {
        let rng = Rng::from_seed([1; 32]);
        let (ratchet, signing_key) = key_material(&rng, 0);
        let session_key = SessionKey::encode(&ratchet, &signing_key);
        let exported = ExportedSessionKey::encode(&ratchet, &signing_key.verifying_key());

        assert!(matches!(
            SessionKey::from_bytes(exported.as_bytes()),
            Err(SessionKeyError::UnknownVersion(1))
        ));
        assert!(matches!(
            ExportedSessionKey::from_bytes(session_key.as_bytes()),
            Err(SessionKeyError::UnknownVersion(2))
        ));
        assert!(matches!(
            SessionKey::from_bytes(&session_key.as_bytes()[..100]),
            Err(SessionKeyError::InvalidLength {
                expected: SESSION_KEY_SIZE,
                given: 100
            })
        ));
        assert!(matches!(
            SessionKey::from_bytes(&[]),
            Err(SessionKeyError::InvalidLength { given: 0, .. })
        ));
    }

    #[test]
    fn invalid_signing_key() {
        let rng = Rng::from_seed([1; 32]);
        let (ratchet, signing_key) = key_material(&rng, 0);

        let mut bytes = ExportedSessionKey::encode(&ratchet, &signing_key.verifying_key())
            .to_bytes();

        // Replace verifying key with a point which is not on the curve.
        let start = EXPORTED_SESSION_KEY_SIZE - 32;
        bytes[start..].copy_from_slice(&[0; 32]);
        bytes[start] = 2;

        let exported = ExportedSessionKey::from_bytes(&bytes).unwrap();
        assert!(matches!(
            exported.decode(),
            Err(SessionKeyError::InvalidSigningKey(_))
        ));
    }
}
