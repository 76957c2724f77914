//! CertificateVerify message (RFC 8446 Section 4.4.3).

use crate::codec::{put_vector16, Reader};
use crate::error::{ProtocolError, Result};
use bytes::{BufMut, BytesMut};
use oxtls_crypto::SignatureScheme;

/// CertificateVerify message.
///
/// ```text
/// struct {
///     SignatureScheme algorithm;
///     opaque signature<0..2^16-1>;
/// } CertificateVerify;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateVerify {
    /// Signature scheme.
    pub algorithm: SignatureScheme,

    /// Signature over the transcript hash with its context prefix.
    pub signature: Vec<u8>,
}

impl CertificateVerify {
    /// Create a new CertificateVerify message.
    pub fn new(algorithm: SignatureScheme, signature: Vec<u8>) -> Self {
        Self {
            algorithm,
            signature,
        }
    }

    /// Encode the message body.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::new();
        buf.put_u16(self.algorithm.to_u16());
        put_vector16(&mut buf, &self.signature)?;
        Ok(buf.to_vec())
    }

    /// Decode a message body.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let algorithm = SignatureScheme::from_u16(r.read_u16()?)
            .ok_or(ProtocolError::IllegalParameter)?;
        let signature = r.read_vector16(1, u16::MAX as usize)?.to_vec();
        r.expect_end()?;
        Ok(Self {
            algorithm,
            signature,
        })
    }

    /// The content that is signed: 64 spaces, context string, a zero
    /// byte, then the transcript hash (RFC 8446 Section 4.4.3).
    pub fn signed_content(server: bool, transcript_hash: &[u8]) -> Vec<u8> {
        let context: &[u8] = if server {
            b"TLS 1.3, server CertificateVerify"
        } else {
            b"TLS 1.3, client CertificateVerify"
        };
        let mut content = Vec::with_capacity(64 + context.len() + 1 + transcript_hash.len());
        content.extend_from_slice(&[0x20u8; 64]);
        content.extend_from_slice(context);
        content.push(0x00);
        content.extend_from_slice(transcript_hash);
        content
    }
}
