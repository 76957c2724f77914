//! Cipher suite definitions.

use oxtls_crypto::{AeadAlgorithm, HashAlgorithm};

/// TLS 1.3 cipher suite.
///
/// TLS 1.3 cipher suites only name the AEAD and the hash; key exchange and
/// signatures are negotiated through extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CipherSuite {
    /// TLS_AES_128_GCM_SHA256 (mandatory to implement)
    Aes128GcmSha256 = 0x1301,

    /// TLS_AES_256_GCM_SHA384
    Aes256GcmSha384 = 0x1302,

    /// TLS_CHACHA20_POLY1305_SHA256
    ChaCha20Poly1305Sha256 = 0x1303,
}

impl CipherSuite {
    /// Create from wire format (u16).
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x1301 => Some(CipherSuite::Aes128GcmSha256),
            0x1302 => Some(CipherSuite::Aes256GcmSha384),
            0x1303 => Some(CipherSuite::ChaCha20Poly1305Sha256),
            _ => None,
        }
    }

    /// Convert to wire format (u16).
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Get the AEAD algorithm for this cipher suite.
    pub const fn aead_algorithm(self) -> AeadAlgorithm {
        match self {
            CipherSuite::Aes128GcmSha256 => AeadAlgorithm::Aes128Gcm,
            CipherSuite::Aes256GcmSha384 => AeadAlgorithm::Aes256Gcm,
            CipherSuite::ChaCha20Poly1305Sha256 => AeadAlgorithm::ChaCha20Poly1305,
        }
    }

    /// Get the hash algorithm for this cipher suite.
    pub const fn hash_algorithm(self) -> HashAlgorithm {
        match self {
            CipherSuite::Aes128GcmSha256 | CipherSuite::ChaCha20Poly1305Sha256 => {
                HashAlgorithm::Sha256
            }
            CipherSuite::Aes256GcmSha384 => HashAlgorithm::Sha384,
        }
    }

    /// Get the AEAD key length for this cipher suite.
    pub const fn key_length(self) -> usize {
        self.aead_algorithm().key_size()
    }

    /// Get the AEAD IV length for this cipher suite.
    pub const fn iv_length(self) -> usize {
        self.aead_algorithm().nonce_size()
    }

    /// Get the cipher suite name.
    pub const fn name(self) -> &'static str {
        match self {
            CipherSuite::Aes128GcmSha256 => "TLS_AES_128_GCM_SHA256",
            CipherSuite::Aes256GcmSha384 => "TLS_AES_256_GCM_SHA384",
            CipherSuite::ChaCha20Poly1305Sha256 => "TLS_CHACHA20_POLY1305_SHA256",
        }
    }
}

/// Default cipher suite preference order.
pub const DEFAULT_CIPHER_SUITES: &[CipherSuite] = &[
    CipherSuite::Aes128GcmSha256,
    CipherSuite::ChaCha20Poly1305Sha256,
    CipherSuite::Aes256GcmSha384,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cipher_suite_conversion() {
        assert_eq!(
            CipherSuite::from_u16(0x1301),
            Some(CipherSuite::Aes128GcmSha256)
        );
        assert_eq!(CipherSuite::Aes256GcmSha384.to_u16(), 0x1302);
        assert_eq!(CipherSuite::from_u16(0xC02F), None);
    }

    #[test]
    fn test_cipher_suite_properties() {
        let suite = CipherSuite::Aes128GcmSha256;
        assert_eq!(suite.hash_algorithm(), HashAlgorithm::Sha256);
        assert_eq!(suite.key_length(), 16);
        assert_eq!(suite.iv_length(), 12);
        assert_eq!(suite.name(), "TLS_AES_128_GCM_SHA256");

        assert_eq!(
            CipherSuite::Aes256GcmSha384.hash_algorithm(),
            HashAlgorithm::Sha384
        );
        assert_eq!(CipherSuite::ChaCha20Poly1305Sha256.key_length(), 32);
    }
}
