//! # oxtls Cryptographic Provider Interface
//!
//! This crate defines the cryptographic abstraction layer for oxtls.
//! The handshake engine never touches key material algorithms directly;
//! it asks a [`CryptoProvider`] for the primitive it needs and works with
//! boxed trait objects.
//!
//! ## Architecture
//!
//! ```text
//! CryptoProvider (main trait)
//! ├── Hash (SHA-256, SHA-384, SHA-512)
//! ├── Hmac (HMAC with the suite hash)
//! ├── Kdf (HKDF-Extract / HKDF-Expand)
//! ├── Random (CSPRNG)
//! ├── KeyExchange (ECDHE per named group)
//! └── Signer (CertificateVerify signatures)
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unused_qualifications,
    missing_debug_implementations
)]

pub mod aead;
pub mod error;
pub mod hash;
pub mod hmac;
pub mod kdf;
pub mod key_exchange;
pub mod random;
pub mod signature;

pub use aead::AeadAlgorithm;
pub use error::{Error, Result};
pub use hash::{Hash, HashAlgorithm};
pub use hmac::Hmac;
pub use kdf::{Kdf, KdfAlgorithm};
pub use key_exchange::{KeyExchange, NamedGroup, PrivateKey, PublicKey, SharedSecret};
pub use random::Random;
pub use signature::{Signer, SignatureScheme};

/// The main cryptographic provider trait.
///
/// Implementations supply every primitive the handshake engine consumes.
/// The trait is object-safe; the engine holds it as `&dyn CryptoProvider`
/// for the duration of a connection.
///
/// All implementations must be `Send + Sync`.
pub trait CryptoProvider: Send + Sync {
    /// Get a hash function instance.
    fn hash(&self, algorithm: HashAlgorithm) -> Result<Box<dyn Hash>>;

    /// Get an HMAC instance keyed with `key`.
    fn hmac(&self, algorithm: HashAlgorithm, key: &[u8]) -> Result<Box<dyn Hmac>>;

    /// Get a KDF (HKDF) instance.
    fn kdf(&self, algorithm: KdfAlgorithm) -> Result<Box<dyn Kdf>>;

    /// Get the random number generator.
    fn random(&self) -> &dyn Random;

    /// Get a key exchange instance for a named group.
    fn key_exchange(&self, group: NamedGroup) -> Result<Box<dyn KeyExchange>>;

    /// Get a signer for a signature scheme.
    fn signer(&self, scheme: SignatureScheme) -> Result<Box<dyn Signer>>;

    /// Check if the provider supports a specific named group.
    ///
    /// Used when picking the group for the initial key share.
    fn supports_group(&self, group: NamedGroup) -> bool {
        self.key_exchange(group).is_ok()
    }
}
