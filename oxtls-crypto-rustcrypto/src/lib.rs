//! # RustCrypto-based Provider for oxtls
//!
//! Implements the [`oxtls_crypto::CryptoProvider`] interface on top of the
//! RustCrypto crates (`sha2`, `hmac`, `hkdf`, `x25519-dalek`, `p256`,
//! `ed25519-dalek`).
//!
//! ## Supported algorithms
//!
//! - **Hash / HMAC / HKDF**: SHA-256, SHA-384, SHA-512
//! - **Key exchange**: X25519, ECDH P-256
//! - **Signatures**: Ed25519
//! - **RNG**: operating-system entropy (`OsRng`)
//!
//! Everything else returns [`oxtls_crypto::Error::UnsupportedAlgorithm`].

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications, missing_debug_implementations)]

use oxtls_crypto::{
    CryptoProvider, Hash, HashAlgorithm, Hmac, Kdf, KdfAlgorithm, KeyExchange, NamedGroup, Random,
    Result, SignatureScheme, Signer,
};

mod hash;
mod hmac_impl;
mod kdf;
mod kex;
mod random;
mod sign;

pub use random::OsRandom;
pub use sign::ed25519_public_key;

/// Crypto provider backed by the RustCrypto ecosystem.
#[derive(Debug, Default)]
pub struct RustCryptoProvider {
    random: OsRandom,
}

impl RustCryptoProvider {
    /// Create a new provider.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CryptoProvider for RustCryptoProvider {
    fn hash(&self, algorithm: HashAlgorithm) -> Result<Box<dyn Hash>> {
        hash::create_hash(algorithm)
    }

    fn hmac(&self, algorithm: HashAlgorithm, key: &[u8]) -> Result<Box<dyn Hmac>> {
        hmac_impl::create_hmac(algorithm, key)
    }

    fn kdf(&self, algorithm: KdfAlgorithm) -> Result<Box<dyn Kdf>> {
        kdf::create_kdf(algorithm)
    }

    fn random(&self) -> &dyn Random {
        &self.random
    }

    fn key_exchange(&self, group: NamedGroup) -> Result<Box<dyn KeyExchange>> {
        kex::create_key_exchange(group)
    }

    fn signer(&self, scheme: SignatureScheme) -> Result<Box<dyn Signer>> {
        sign::create_signer(scheme)
    }
}
