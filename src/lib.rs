// SPDX-License-Identifier: MIT OR Apache-2.0

//! `p2panda-group-session` implements the receiving side of a forward-secure group session: a
//! single sender encrypts a stream of messages towards many receivers, every message with its own
//! key.
//!
//! Message keys are derived from a hash ratchet with four parts, similar to the Megolm design
//! known from Matrix. The ratchet can only move forward. Jumping from index `i` to index `j`
//! costs at most a few hundred hash operations, independent of the distance, which makes it cheap
//! to decrypt messages arriving with gaps. Once a receiver moved past an index, the key material
//! for it is gone: a compromised session does not reveal earlier messages.
//!
//! ## Sessions
//!
//! An [`InboundGroupSession`] is created from key material the sender shared over a secure
//! channel (for example a 2SM or Double Ratchet session):
//!
//! - A signed [`SessionKey`], created by the sender itself. Sessions created from it are
//!   considered verified.
//! - An [`ExportedSessionKey`], created by another receiver with
//!   [`InboundGroupSession::export_session`]. It carries no signature and the resulting session
//!   is only verified after the first message could be authenticated.
//!
//! Every message is signed with the sender's Ed25519 key and authenticated with a per-message
//! XChaCha20-Poly1305 tag. A message failing any of these checks never changes the state of the
//! session.
//!
//! ## Persistence
//!
//! Sessions can be stored with [`InboundGroupSession::pickle`], encrypting the full state with a
//! key of the application's choice, and restored with [`InboundGroupSession::unpickle`].
//!
//! ## Cryptographic primitives
//!
//! All primitives are consumed through the [`CryptoProvider`](traits::CryptoProvider) trait. The
//! crate ships with [`Crypto`], backed by RustCrypto and `ed25519-dalek`.
//!
//! ## Example
//!
//! ```ignore
//! use p2panda_group_session::{InboundGroupSession, Rng};
//!
//! let mut session: InboundGroupSession = InboundGroupSession::init(&session_key)?;
//! let (plaintext, index) = session.decrypt(&message)?;
//!
//! let pickle = session.pickle(&pickle_key, &Rng::default())?;
//! let session: InboundGroupSession = InboundGroupSession::unpickle(&pickle_key, &pickle)?;
//! ```
mod cbor;
pub mod crypto;
mod message;
mod pickle;
mod ratchet;
mod session;
mod session_key;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod traits;

pub use crypto::{Crypto, CryptoError, Rng, RngError};
pub use message::{GroupMessage, MESSAGE_VERSION, MIN_MESSAGE_SIZE, MessageError};
pub use pickle::{PICKLE_VERSION, PickleError};
pub use ratchet::{RATCHET_PART_SIZE, RATCHET_PARTS, RATCHET_SIZE, Ratchet, RatchetError};
pub use session::{FormatError, GroupSessionError, InboundGroupSession, SessionId};
pub use session_key::{
    EXPORTED_SESSION_KEY_SIZE, EXPORTED_SESSION_KEY_VERSION, ExportedSessionKey,
    SESSION_KEY_SIZE, SESSION_KEY_VERSION, SessionKey, SessionKeyError,
};
