//! Handshake messages (RFC 8446 Section 4).

pub mod certificate;
pub mod certificate_request;
pub mod certificate_verify;
pub mod client_hello;
pub mod encrypted_extensions;
pub mod end_of_early_data;
pub mod finished;
pub mod new_session_ticket;
pub mod server_hello;

pub use certificate::{Certificate, CertificateEntry};
pub use certificate_request::CertificateRequest;
pub use certificate_verify::CertificateVerify;
pub use client_hello::ClientHello;
pub use encrypted_extensions::EncryptedExtensions;
pub use end_of_early_data::EndOfEarlyData;
pub use finished::Finished;
pub use new_session_ticket::NewSessionTicket;
pub use server_hello::{ServerHello, HELLO_RETRY_REQUEST_RANDOM};

use crate::codec::{put_u24, Reader};
use crate::error::{ProtocolError, Result};
use crate::protocol::HandshakeType;
use bytes::{BufMut, BytesMut};

/// One framed handshake message.
///
/// ```text
/// struct {
///     HandshakeType msg_type;    /* handshake type */
///     uint24 length;             /* bytes in message */
///     opaque body[Handshake.length];
/// } Handshake;
/// ```
#[derive(Debug, Clone)]
pub struct HandshakeMessage {
    /// Message type.
    pub msg_type: HandshakeType,
    /// Message body (header excluded).
    pub payload: Vec<u8>,
}

impl HandshakeMessage {
    /// Create a new handshake message.
    pub fn new(msg_type: HandshakeType, payload: Vec<u8>) -> Self {
        Self { msg_type, payload }
    }

    /// Encode with the 4-byte handshake header.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.payload.len() > 0x00FF_FFFF {
            return Err(ProtocolError::InternalError.into());
        }
        let mut buf = BytesMut::with_capacity(4 + self.payload.len());
        buf.put_u8(self.msg_type.to_u8());
        put_u24(&mut buf, self.payload.len() as u32);
        buf.put_slice(&self.payload);
        Ok(buf.to_vec())
    }

    /// Decode one complete framed message; trailing bytes are an error.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let msg_type = HandshakeType::from_u8(r.read_u8()?)
            .ok_or(ProtocolError::UnexpectedMessage)?;
        let payload = r.read_vector24(0, 0x00FF_FFFF)?.to_vec();
        r.expect_end()?;
        Ok(Self { msg_type, payload })
    }
}
