//! Signature schemes and signing interface.

use crate::Result;

/// Signature schemes (RFC 8446 Section 4.2.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SignatureScheme {
    /// ecdsa_secp256r1_sha256
    EcdsaSecp256r1Sha256 = 0x0403,
    /// ecdsa_secp384r1_sha384
    EcdsaSecp384r1Sha384 = 0x0503,
    /// ecdsa_secp521r1_sha512
    EcdsaSecp521r1Sha512 = 0x0603,
    /// ed25519
    Ed25519 = 0x0807,
    /// ed448
    Ed448 = 0x0808,
    /// rsa_pss_rsae_sha256
    RsaPssRsaeSha256 = 0x0804,
    /// rsa_pss_rsae_sha384
    RsaPssRsaeSha384 = 0x0805,
    /// rsa_pss_rsae_sha512
    RsaPssRsaeSha512 = 0x0806,
}

impl SignatureScheme {
    /// Convert from wire format (u16).
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0403 => Some(SignatureScheme::EcdsaSecp256r1Sha256),
            0x0503 => Some(SignatureScheme::EcdsaSecp384r1Sha384),
            0x0603 => Some(SignatureScheme::EcdsaSecp521r1Sha512),
            0x0807 => Some(SignatureScheme::Ed25519),
            0x0808 => Some(SignatureScheme::Ed448),
            0x0804 => Some(SignatureScheme::RsaPssRsaeSha256),
            0x0805 => Some(SignatureScheme::RsaPssRsaeSha384),
            0x0806 => Some(SignatureScheme::RsaPssRsaeSha512),
            _ => None,
        }
    }

    /// Convert to wire format (u16).
    pub const fn to_u16(self) -> u16 {
        self as u16
    }
}

/// Signature generation and verification.
///
/// Used for the client CertificateVerify message; the server-side
/// signature is checked through the certificate verifier, which owns the
/// peer's public key.
pub trait Signer: Send + Sync {
    /// Sign a message with the given private key.
    fn sign(&self, private_key: &[u8], message: &[u8]) -> Result<Vec<u8>>;

    /// Verify a signature over a message with the given public key.
    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<()>;

    /// Get the scheme this signer implements.
    fn scheme(&self) -> SignatureScheme;
}
