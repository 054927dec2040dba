// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;
use std::fmt;
use std::marker::PhantomData;

use thiserror::Error;
use tracing::{debug, trace};

use crate::crypto::ed25519::{VERIFYING_KEY_SIZE, VerifyingKey};
use crate::crypto::{Crypto, Rng};
use crate::message::{GroupMessage, MessageError};
use crate::pickle::{PickleError, PickledSession, pickle, unpickle};
use crate::ratchet::{Ratchet, RatchetError};
use crate::session_key::{ExportedSessionKey, SessionKey, SessionKeyError};
use crate::traits::CryptoProvider;

/// Receiving side of a group session.
///
/// An inbound group session decrypts messages of exactly one sender. It is bootstrapped from key
/// material the sender (or another receiver) shared with us and can from then on decrypt all
/// messages with an index equal or higher than the position of its ratchet.
///
/// ## Forward secrecy
///
/// Decrypting a message moves the ratchet forward to the message's index and erases all key
/// material before it. Messages arriving late, with an index lower than the current position, can
/// not be decrypted anymore. Applications which need to handle heavily re-ordered streams should
/// keep an exported session key of an earlier index around, trading forward secrecy for
/// robustness.
///
/// ## Atomicity
///
/// All checks (decoding, signature, MAC) run against a copy of the ratchet, the session is only
/// updated after a message was successfully authenticated and decrypted. A forged or corrupted
/// message never moves the ratchet, otherwise an attacker could "burn" the keys of legitimate
/// messages which did not arrive yet.
///
/// ## Concurrency
///
/// `decrypt` needs exclusive access, sessions shared between threads need to be wrapped in a
/// mutex.
pub struct InboundGroupSession<C = Crypto> {
    /// Ratchet positioned at the lowest index we can still decrypt.
    ratchet: Ratchet,

    /// Public key of the sender, used to authenticate every message.
    signing_key: VerifyingKey,

    /// Index of the key material this session was created with.
    first_known_index: u32,

    /// Whether we know that the signing key belongs to the session's sender. This is the case when
    /// the session key was signed by it or after the first message could be authenticated.
    verified: bool,

    _marker: PhantomData<C>,
}

impl<C> InboundGroupSession<C>
where
    C: CryptoProvider,
{
    /// Create a session from a signed session key, as shared by the sender.
    pub fn init(session_key: &[u8]) -> Result<Self, GroupSessionError> {
        let session_key = SessionKey::from_bytes(session_key)?;
        let (ratchet, signing_key) = session_key.decode::<C>()?;
        let session = Self::from_parts(ratchet, signing_key, true);

        debug!(
            session_id = %session.session_id(),
            first_known_index = session.first_known_index,
            "initialised inbound group session",
        );

        Ok(session)
    }

    /// Create a session from an exported session key.
    ///
    /// The resulting session can only decrypt messages from the exported index onwards.
    pub fn import_session(exported_session_key: &[u8]) -> Result<Self, GroupSessionError> {
        let exported_session_key = ExportedSessionKey::from_bytes(exported_session_key)?;
        let (ratchet, signing_key) = exported_session_key.decode()?;
        let session = Self::from_parts(ratchet, signing_key, false);

        debug!(
            session_id = %session.session_id(),
            first_known_index = session.first_known_index,
            "imported inbound group session",
        );

        Ok(session)
    }

    /// Decrypt a group message and return the plaintext together with the message's index.
    ///
    /// On success the ratchet moves to the message's index: all messages with a lower index can
    /// not be decrypted by this session anymore. On failure the session stays untouched.
    pub fn decrypt(&mut self, message: &[u8]) -> Result<(Vec<u8>, u32), GroupSessionError> {
        let message = GroupMessage::from_bytes(message)?;
        let index = message.index();

        if index < self.first_known_index || index < self.ratchet.index() {
            return Err(GroupSessionError::IndexTooLow {
                index,
                lowest_index: self.ratchet.index(),
            });
        }

        C::verify(
            &message.signed_bytes(),
            &self.signing_key,
            message.signature(),
        )
        .map_err(|_| GroupSessionError::Signature)?;

        let mut ratchet = self.ratchet.clone();
        ratchet.advance_to::<C>(index)?;

        let (key, nonce) = ratchet.message_keys::<C>()?;
        let plaintext = C::aead_decrypt(
            key.as_bytes(),
            message.ciphertext(),
            message.mac(),
            nonce,
            Some(GroupMessage::header(index).as_slice()),
        )
        .map_err(|_| GroupSessionError::MacMismatch)?;

        // Message is authentic, commit the new ratchet position.
        self.ratchet = ratchet;
        self.verified = true;

        trace!(session_id = %self.session_id(), index, "decrypted group message");

        Ok((plaintext, index))
    }

    /// Public identifier of this session, derived from the sender's signing key.
    pub fn session_id(&self) -> SessionId {
        SessionId::from(self.signing_key)
    }

    /// Lowest message index this session was ever able to decrypt.
    pub fn first_known_index(&self) -> u32 {
        self.first_known_index
    }

    /// Lowest message index this session is still able to decrypt.
    pub fn message_index(&self) -> u32 {
        self.ratchet.index()
    }

    pub fn signing_key(&self) -> &VerifyingKey {
        &self.signing_key
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Export the session from the given index onwards, for importing it with
    /// [`InboundGroupSession::import_session`].
    ///
    /// The index can not be lower than the current ratchet position. Exporting does not change
    /// the state of this session.
    pub fn export_session(
        &self,
        message_index: u32,
    ) -> Result<ExportedSessionKey, GroupSessionError> {
        let mut ratchet = self.ratchet.clone();
        ratchet.advance_to::<C>(message_index)?;
        Ok(ExportedSessionKey::encode(&ratchet, &self.signing_key))
    }

    /// Serialize and encrypt the full session state with the given key.
    pub fn pickle(&self, key: &[u8], rng: &Rng) -> Result<Vec<u8>, GroupSessionError> {
        let state = PickledSession {
            ratchet: self.ratchet.clone(),
            signing_key: self.signing_key.to_bytes(),
            first_known_index: self.first_known_index,
            verified: self.verified,
        };
        let bytes = pickle::<C>(&state, key, rng)?;
        Ok(bytes)
    }

    /// Restore a session from a pickle created with the same key.
    pub fn unpickle(key: &[u8], pickle: &[u8]) -> Result<Self, GroupSessionError> {
        let state = unpickle::<C>(key, pickle)?;
        let signing_key = VerifyingKey::from_bytes(state.signing_key).map_err(|_| {
            GroupSessionError::from(PickleError::InvalidState("invalid signing key"))
        })?;

        let session = Self {
            ratchet: state.ratchet,
            signing_key,
            first_known_index: state.first_known_index,
            verified: state.verified,
            _marker: PhantomData,
        };

        debug!(
            session_id = %session.session_id(),
            message_index = session.message_index(),
            "restored inbound group session from pickle",
        );

        Ok(session)
    }

    fn from_parts(ratchet: Ratchet, signing_key: VerifyingKey, verified: bool) -> Self {
        Self {
            first_known_index: ratchet.index(),
            ratchet,
            signing_key,
            verified,
            _marker: PhantomData,
        }
    }
}

impl<C> Clone for InboundGroupSession<C> {
    fn clone(&self) -> Self {
        Self {
            ratchet: self.ratchet.clone(),
            signing_key: self.signing_key,
            first_known_index: self.first_known_index,
            verified: self.verified,
            _marker: PhantomData,
        }
    }
}

impl<C> PartialEq for InboundGroupSession<C> {
    fn eq(&self, other: &Self) -> bool {
        self.ratchet == other.ratchet
            && self.signing_key == other.signing_key
            && self.first_known_index == other.first_known_index
            && self.verified == other.verified
    }
}

impl<C> Eq for InboundGroupSession<C> {}

impl<C> fmt::Debug for InboundGroupSession<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundGroupSession")
            .field("ratchet", &self.ratchet)
            .field("signing_key", &self.signing_key)
            .field("first_known_index", &self.first_known_index)
            .field("verified", &self.verified)
            .finish()
    }
}

/// Public, non-secret identifier of a group session.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId([u8; VERIFYING_KEY_SIZE]);

impl SessionId {
    pub fn as_bytes(&self) -> &[u8; VERIFYING_KEY_SIZE] {
        &self.0
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

impl From<VerifyingKey> for SessionId {
    fn from(signing_key: VerifyingKey) -> Self {
        Self(signing_key.to_bytes())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[derive(Debug, Error)]
pub enum GroupSessionError {
    #[error("invalid session key: {0}")]
    InvalidKey(#[source] SessionKeyError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("message index {index} is lower than the lowest decryptable index {lowest_index}")]
    IndexTooLow { index: u32, lowest_index: u32 },

    #[error("signature does not match signing key of group session")]
    Signature,

    #[error("message authentication code does not match")]
    MacMismatch,

    #[error("unsupported pickle version {0}")]
    UnsupportedVersion(u8),

    #[error("pickle key does not match or pickle is corrupted")]
    BadPickleKey,

    #[error("could not pickle session: {0}")]
    Pickle(#[source] PickleError),

    #[error("group session crypto failed: {0}")]
    Crypto(Box<dyn Error + Send + Sync>),
}

/// Malformed message or pickle.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("malformed group message: {0}")]
    Message(#[from] MessageError),

    #[error("malformed pickle: {0}")]
    Pickle(#[source] PickleError),
}

impl From<MessageError> for GroupSessionError {
    fn from(err: MessageError) -> Self {
        Self::Format(FormatError::Message(err))
    }
}

impl From<SessionKeyError> for GroupSessionError {
    fn from(err: SessionKeyError) -> Self {
        match err {
            SessionKeyError::InvalidSignature => Self::Signature,
            err => Self::InvalidKey(err),
        }
    }
}

impl From<RatchetError> for GroupSessionError {
    fn from(err: RatchetError) -> Self {
        match err {
            RatchetError::IndexTooLow { current, target } => Self::IndexTooLow {
                index: target,
                lowest_index: current,
            },
            RatchetError::Crypto(err) => Self::Crypto(err),
        }
    }
}

impl From<PickleError> for GroupSessionError {
    fn from(err: PickleError) -> Self {
        match err {
            PickleError::UnsupportedVersion(version) => Self::UnsupportedVersion(version),
            PickleError::BadPickleKey => Self::BadPickleKey,
            PickleError::TooShort(_) | PickleError::InvalidState(_) | PickleError::Decode(_) => {
                Self::Format(FormatError::Pickle(err))
            }
            PickleError::Crypto(err) => Self::Crypto(err),
            err @ (PickleError::Encode(_) | PickleError::Rng(_)) => Self::Pickle(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::crypto::Rng;
    use crate::test_utils::OutboundGroupSession;

    use super::{GroupSessionError, InboundGroupSession};

    #[test]
    fn init_from_session_key() {
        let rng = Rng::from_seed([1; 32]);
        let outbound = OutboundGroupSession::new(&rng);

        let inbound: InboundGroupSession =
            InboundGroupSession::init(outbound.session_key().as_bytes()).unwrap();

        assert_eq!(inbound.session_id(), outbound.session_id());
        assert_eq!(inbound.first_known_index(), 0);
        assert_eq!(inbound.message_index(), 0);
        assert!(inbound.is_verified());
    }

    #[test]
    fn init_from_session_key_mid_stream() {
        let rng = Rng::from_seed([1; 32]);
        let mut outbound = OutboundGroupSession::new(&rng);
        outbound.encrypt(b"one");
        outbound.encrypt(b"two");

        let mut inbound: InboundGroupSession =
            InboundGroupSession::init(outbound.session_key().as_bytes()).unwrap();
        assert_eq!(inbound.first_known_index(), 2);

        let message = outbound.encrypt(b"three");
        assert_eq!(inbound.decrypt(&message).unwrap(), (b"three".to_vec(), 2));
    }

    #[test]
    fn init_with_invalid_keys() {
        let rng = Rng::from_seed([1; 32]);
        let outbound = OutboundGroupSession::new(&rng);
        let session_key = outbound.session_key();

        let result = InboundGroupSession::<crate::Crypto>::init(&session_key.as_bytes()[1..]);
        assert!(matches!(result, Err(GroupSessionError::InvalidKey(_))));

        let mut bytes = session_key.as_bytes().to_vec();
        bytes[0] = 9;
        let result = InboundGroupSession::<crate::Crypto>::init(&bytes);
        assert!(matches!(result, Err(GroupSessionError::InvalidKey(_))));

        let mut bytes = session_key.as_bytes().to_vec();
        bytes[20] ^= 0xff;
        let result = InboundGroupSession::<crate::Crypto>::init(&bytes);
        assert!(matches!(result, Err(GroupSessionError::Signature)));

        // Exported keys are not accepted by `init` and vice versa.
        let inbound: InboundGroupSession =
            InboundGroupSession::init(session_key.as_bytes()).unwrap();
        let exported = inbound.export_session(0).unwrap();
        let result = InboundGroupSession::<crate::Crypto>::init(exported.as_bytes());
        assert!(matches!(result, Err(GroupSessionError::InvalidKey(_))));
        let result = InboundGroupSession::<crate::Crypto>::import_session(session_key.as_bytes());
        assert!(matches!(result, Err(GroupSessionError::InvalidKey(_))));
    }

    #[test]
    fn decrypt_in_order() {
        let rng = Rng::from_seed([1; 32]);
        let mut outbound = OutboundGroupSession::new(&rng);
        let mut inbound: InboundGroupSession =
            InboundGroupSession::init(outbound.session_key().as_bytes()).unwrap();

        for (expected_index, text) in ["têst1", "hot beverage: ☕", "☕"].iter().enumerate() {
            let message = outbound.encrypt(text.as_bytes());
            let (plaintext, index) = inbound.decrypt(&message).unwrap();
            assert_eq!(plaintext, text.as_bytes());
            assert_eq!(index, expected_index as u32);
            assert_eq!(inbound.message_index(), expected_index as u32);
        }

        let message = outbound.encrypt(&[0x00, 0x00, 0xde, 0xad, 0xbe, 0xef, 0x00, 0x00]);
        let (plaintext, index) = inbound.decrypt(&message).unwrap();
        assert_eq!(plaintext, vec![0x00, 0x00, 0xde, 0xad, 0xbe, 0xef, 0x00, 0x00]);
        assert_eq!(index, 3);
    }

    #[test]
    fn decrypt_same_message_twice() {
        let rng = Rng::from_seed([1; 32]);
        let mut outbound = OutboundGroupSession::new(&rng);
        let mut inbound: InboundGroupSession =
            InboundGroupSession::init(outbound.session_key().as_bytes()).unwrap();

        let message = outbound.encrypt(b"Hello, Panda!");
        let first = inbound.decrypt(&message).unwrap();
        let second = inbound.decrypt(&message).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn imported_session_gets_verified() {
        let rng = Rng::from_seed([1; 32]);
        let mut outbound = OutboundGroupSession::new(&rng);
        let inbound: InboundGroupSession =
            InboundGroupSession::init(outbound.session_key().as_bytes()).unwrap();

        let exported = inbound.export_session(1).unwrap();
        let mut imported: InboundGroupSession =
            InboundGroupSession::import_session(exported.as_bytes()).unwrap();
        assert!(!imported.is_verified());
        assert_eq!(imported.first_known_index(), 1);
        assert_eq!(imported.session_id(), inbound.session_id());

        // Message 0 is not available in the imported session.
        let message_0 = outbound.encrypt(b"zero");
        assert!(matches!(
            imported.decrypt(&message_0),
            Err(GroupSessionError::IndexTooLow {
                index: 0,
                lowest_index: 1
            })
        ));
        assert!(!imported.is_verified());

        let message_1 = outbound.encrypt(b"one");
        assert_eq!(imported.decrypt(&message_1).unwrap(), (b"one".to_vec(), 1));
        assert!(imported.is_verified());
    }

    #[test]
    fn export_below_ratchet_position() {
        let rng = Rng::from_seed([1; 32]);
        let mut outbound = OutboundGroupSession::new(&rng);
        let mut inbound: InboundGroupSession =
            InboundGroupSession::init(outbound.session_key().as_bytes()).unwrap();

        for _ in 0..3 {
            outbound.encrypt(b"skipped");
        }
        let message = outbound.encrypt(b"three");
        inbound.decrypt(&message).unwrap();

        assert!(matches!(
            inbound.export_session(2),
            Err(GroupSessionError::IndexTooLow {
                index: 2,
                lowest_index: 3
            })
        ));
        assert_eq!(inbound.export_session(3).unwrap().index(), 3);
        assert_eq!(inbound.export_session(100).unwrap().index(), 100);

        // Exporting does not move the ratchet of the session itself.
        assert_eq!(inbound.message_index(), 3);
    }

    #[test]
    fn malformed_messages() {
        let rng = Rng::from_seed([1; 32]);
        let mut outbound = OutboundGroupSession::new(&rng);
        let mut inbound: InboundGroupSession =
            InboundGroupSession::init(outbound.session_key().as_bytes()).unwrap();

        assert!(matches!(
            inbound.decrypt(&[]),
            Err(GroupSessionError::Format(_))
        ));
        assert!(matches!(
            inbound.decrypt(&[3, 0, 0, 0, 0]),
            Err(GroupSessionError::Format(_))
        ));

        let mut message = outbound.encrypt(b"Hello, Panda!");
        message[0] = 4;
        assert!(matches!(
            inbound.decrypt(&message),
            Err(GroupSessionError::Format(_))
        ));
    }

    #[test]
    fn pickle_errors() {
        let rng = Rng::from_seed([1; 32]);
        let outbound = OutboundGroupSession::new(&rng);
        let inbound: InboundGroupSession =
            InboundGroupSession::init(outbound.session_key().as_bytes()).unwrap();

        let mut pickle = inbound.pickle(b"pickle key", &rng).unwrap();

        assert!(matches!(
            InboundGroupSession::<crate::Crypto>::unpickle(b"other key", &pickle),
            Err(GroupSessionError::BadPickleKey)
        ));
        assert!(matches!(
            InboundGroupSession::<crate::Crypto>::unpickle(b"pickle key", &pickle[..20]),
            Err(GroupSessionError::Format(_))
        ));

        pickle[0] = 0xff;
        assert!(matches!(
            InboundGroupSession::<crate::Crypto>::unpickle(b"pickle key", &pickle),
            Err(GroupSessionError::UnsupportedVersion(0xff))
        ));
    }
}
