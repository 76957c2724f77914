//! ClientHello message (RFC 8446 Section 4.1.2).

use crate::cipher::CipherSuite;
use crate::codec::{put_vector8, Reader};
use crate::error::{ProtocolError, Result};
use crate::extensions::Extensions;
use crate::protocol::ProtocolVersion;
use bytes::{BufMut, BytesMut};

/// ClientHello message.
///
/// ```text
/// struct {
///     ProtocolVersion legacy_version = 0x0303;    /* TLS v1.2 */
///     Random random;
///     opaque legacy_session_id<0..32>;
///     CipherSuite cipher_suites<2..2^16-2>;
///     opaque legacy_compression_methods<1..2^8-1>;
///     Extension extensions<8..2^16-1>;
/// } ClientHello;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    /// Always 0x0303 on the wire.
    pub legacy_version: ProtocolVersion,

    /// Client random (32 bytes).
    pub random: [u8; 32],

    /// Legacy session id; non-empty only in compatibility mode.
    pub legacy_session_id: Vec<u8>,

    /// Offered cipher suites, in preference order.
    pub cipher_suites: Vec<CipherSuite>,

    /// Extensions; pre_shared_key, when present, must be last.
    pub extensions: Extensions,
}

impl ClientHello {
    /// Create a new ClientHello.
    pub fn new(random: [u8; 32], cipher_suites: Vec<CipherSuite>) -> Self {
        Self {
            legacy_version: ProtocolVersion::Tls12,
            random,
            legacy_session_id: Vec::new(),
            cipher_suites,
            extensions: Extensions::new(),
        }
    }

    /// Encode the message body.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::new();

        buf.put_u16(self.legacy_version.to_u16());
        buf.put_slice(&self.random);

        if self.legacy_session_id.len() > 32 {
            return Err(ProtocolError::InternalError.into());
        }
        put_vector8(&mut buf, &self.legacy_session_id)?;

        let mut suites = BytesMut::new();
        for suite in &self.cipher_suites {
            suites.put_u16(suite.to_u16());
        }
        crate::codec::put_vector16(&mut buf, &suites)?;

        // legacy_compression_methods: null only
        put_vector8(&mut buf, &[0])?;

        self.extensions.encode_into(&mut buf)?;
        Ok(buf.to_vec())
    }

    /// Decode a message body.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);

        let legacy_version = ProtocolVersion::from_u16(r.read_u16()?)
            .ok_or(ProtocolError::DecodeError)?;
        let mut random = [0u8; 32];
        random.copy_from_slice(r.read_bytes(32)?);
        let legacy_session_id = r.read_vector8(0, 32)?.to_vec();

        let suites_raw = r.read_vector16(2, 0xFFFE)?;
        if suites_raw.len() % 2 != 0 {
            return Err(ProtocolError::DecodeError.into());
        }
        let mut cipher_suites = Vec::new();
        let mut suites_r = Reader::new(suites_raw);
        while !suites_r.is_empty() {
            // Unknown cipher suites are skipped, not rejected
            if let Some(suite) = CipherSuite::from_u16(suites_r.read_u16()?) {
                cipher_suites.push(suite);
            }
        }

        let compression = r.read_vector8(1, 255)?;
        if compression != [0] {
            return Err(ProtocolError::IllegalParameter.into());
        }

        let extensions = Extensions::decode(&mut r)?;
        r.expect_end()?;

        Ok(Self {
            legacy_version,
            random,
            legacy_session_id,
            cipher_suites,
            extensions,
        })
    }
}
