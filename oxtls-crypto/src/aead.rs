//! AEAD algorithm descriptors.
//!
//! The handshake engine only sizes keys and IVs for the record layer;
//! record protection itself lives behind the record-layer boundary.

/// AEAD algorithms used by TLS 1.3 cipher suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AeadAlgorithm {
    /// AES-128-GCM
    Aes128Gcm,
    /// AES-256-GCM
    Aes256Gcm,
    /// ChaCha20-Poly1305
    ChaCha20Poly1305,
}

impl AeadAlgorithm {
    /// Get the key size in bytes.
    pub const fn key_size(self) -> usize {
        match self {
            AeadAlgorithm::Aes128Gcm => 16,
            AeadAlgorithm::Aes256Gcm => 32,
            AeadAlgorithm::ChaCha20Poly1305 => 32,
        }
    }

    /// Get the nonce size in bytes (12 for every TLS 1.3 AEAD).
    pub const fn nonce_size(self) -> usize {
        12
    }
}
