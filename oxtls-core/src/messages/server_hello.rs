//! ServerHello message (RFC 8446 Section 4.1.3).

use crate::cipher::CipherSuite;
use crate::codec::Reader;
use crate::error::{ProtocolError, Result};
use crate::extensions::Extensions;
use crate::protocol::ProtocolVersion;

/// HelloRetryRequest sentinel random value, SHA-256("HelloRetryRequest")
/// (RFC 8446 Section 4.1.3).
pub const HELLO_RETRY_REQUEST_RANDOM: [u8; 32] = [
    0xCF, 0x21, 0xAD, 0x74, 0xE5, 0x9A, 0x61, 0x11, 0xBE, 0x1D, 0x8C, 0x02, 0x1E, 0x65, 0xB8, 0x91,
    0xC2, 0xA2, 0x11, 0x16, 0x7A, 0xBB, 0x8C, 0x5E, 0x07, 0x9E, 0x09, 0xE2, 0xC8, 0xA8, 0x33, 0x9C,
];

/// ServerHello message.
///
/// ```text
/// struct {
///     ProtocolVersion legacy_version = 0x0303;    /* TLS v1.2 */
///     Random random;
///     opaque legacy_session_id_echo<0..32>;
///     CipherSuite cipher_suite;
///     uint8 legacy_compression_method = 0;
///     Extension extensions<6..2^16-1>;
/// } ServerHello;
/// ```
///
/// A HelloRetryRequest shares this wire shape; it is recognized by the
/// sentinel random.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    /// Server random (32 bytes).
    pub random: [u8; 32],

    /// Echo of the client's legacy session id.
    pub legacy_session_id_echo: Vec<u8>,

    /// Selected cipher suite, raw: selection validity is the state
    /// machine's call, not the codec's.
    pub cipher_suite: u16,

    /// Extensions.
    pub extensions: Extensions,
}

impl ServerHello {
    /// Decode a message body.
    ///
    /// Enforces the fixed wire fields: `legacy_version == 0x0303` and a
    /// null compression method.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);

        let legacy_version = r.read_u16()?;
        if legacy_version != ProtocolVersion::Tls12.to_u16() {
            return Err(ProtocolError::BadProtocolVersion.into());
        }

        let mut random = [0u8; 32];
        random.copy_from_slice(r.read_bytes(32)?);

        let legacy_session_id_echo = r.read_vector8(0, 32)?.to_vec();
        let cipher_suite = r.read_u16()?;

        let legacy_compression_method = r.read_u8()?;
        if legacy_compression_method != 0 {
            return Err(ProtocolError::IllegalParameter.into());
        }

        let extensions = Extensions::decode(&mut r)?;
        r.expect_end()?;

        Ok(Self {
            random,
            legacy_session_id_echo,
            cipher_suite,
            extensions,
        })
    }

    /// Check whether this is a HelloRetryRequest.
    pub fn is_hello_retry_request(&self) -> bool {
        self.random == HELLO_RETRY_REQUEST_RANDOM
    }

    /// The selected cipher suite, if it is one we can name.
    pub fn known_cipher_suite(&self) -> Option<CipherSuite> {
        CipherSuite::from_u16(self.cipher_suite)
    }
}
