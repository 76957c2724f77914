//! Ephemeral key exchange per TLS named group.

use crate::Result;
use zeroize::Zeroize;

/// TLS named groups (IANA supported_groups registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedGroup {
    /// X25519 (Curve25519 ECDHE) - TLS 1.3 preferred
    X25519,
    /// secp256r1 (P-256, NIST curve)
    Secp256r1,
    /// secp384r1 (P-384, NIST curve)
    Secp384r1,
    /// secp521r1 (P-521, NIST curve)
    Secp521r1,
    /// X448 (Curve448)
    X448,
}

impl NamedGroup {
    /// Get the public key size in bytes for this group.
    pub const fn public_key_size(self) -> usize {
        match self {
            NamedGroup::X25519 => 32,
            NamedGroup::Secp256r1 => 65, // Uncompressed point
            NamedGroup::Secp384r1 => 97,
            NamedGroup::Secp521r1 => 133,
            NamedGroup::X448 => 56,
        }
    }

    /// Get the shared secret size in bytes.
    pub const fn shared_secret_size(self) -> usize {
        match self {
            NamedGroup::X25519 => 32,
            NamedGroup::Secp256r1 => 32,
            NamedGroup::Secp384r1 => 48,
            NamedGroup::Secp521r1 => 66,
            NamedGroup::X448 => 56,
        }
    }

    /// Convert to wire format (u16, IANA codepoint).
    pub const fn to_u16(self) -> u16 {
        match self {
            NamedGroup::X25519 => 0x001D,
            NamedGroup::Secp256r1 => 0x0017,
            NamedGroup::Secp384r1 => 0x0018,
            NamedGroup::Secp521r1 => 0x0019,
            NamedGroup::X448 => 0x001E,
        }
    }

    /// Convert from wire format (u16).
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x001D => Some(NamedGroup::X25519),
            0x0017 => Some(NamedGroup::Secp256r1),
            0x0018 => Some(NamedGroup::Secp384r1),
            0x0019 => Some(NamedGroup::Secp521r1),
            0x001E => Some(NamedGroup::X448),
            _ => None,
        }
    }

    /// Get the group name.
    pub const fn name(self) -> &'static str {
        match self {
            NamedGroup::X25519 => "x25519",
            NamedGroup::Secp256r1 => "secp256r1",
            NamedGroup::Secp384r1 => "secp384r1",
            NamedGroup::Secp521r1 => "secp521r1",
            NamedGroup::X448 => "x448",
        }
    }
}

/// Private key for key exchange.
///
/// Wraps the private key material and zeroizes it on drop.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct PrivateKey {
    bytes: Vec<u8>,
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("bytes", &"<redacted>")
            .finish()
    }
}

impl PrivateKey {
    /// Create a new private key from bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Get the private key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Public key for key exchange.
#[derive(Debug, Clone)]
pub struct PublicKey {
    bytes: Vec<u8>,
}

impl PublicKey {
    /// Create a new public key from bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Get the public key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Convert to owned bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Shared secret from key exchange, zeroized on drop.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct SharedSecret {
    bytes: Vec<u8>,
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecret")
            .field("bytes", &"<redacted>")
            .finish()
    }
}

impl SharedSecret {
    /// Create a new shared secret from bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Get the shared secret bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Key exchange trait.
///
/// The handshake engine generates one ephemeral key pair per ClientHello
/// and computes the shared secret from the server's key share.
pub trait KeyExchange: Send + Sync {
    /// Generate an ephemeral key pair.
    ///
    /// The private key MUST come from a CSPRNG and is zeroized on drop.
    fn generate_keypair(&self) -> Result<(PrivateKey, PublicKey)>;

    /// Compute the shared secret from our private key and the peer's
    /// public key bytes.
    fn exchange(&self, private_key: &PrivateKey, peer_public_key: &[u8]) -> Result<SharedSecret>;

    /// Get the group this key exchange implements.
    fn group(&self) -> NamedGroup;
}
