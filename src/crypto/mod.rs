// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cryptographic primitives, secret container and random number generator.
pub mod aead;
pub mod ed25519;
pub mod hkdf;
pub mod hmac;
mod provider;
mod rng;
mod secret;

pub use provider::{Crypto, CryptoError};
pub use rng::{Rng, RngError};
pub use secret::Secret;
