// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interfaces to plug in the cryptographic primitives used by group sessions.
mod crypto;

pub use crypto::CryptoProvider;
