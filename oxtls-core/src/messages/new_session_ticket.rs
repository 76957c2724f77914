//! NewSessionTicket message (RFC 8446 Section 4.6.1).

use crate::codec::Reader;
use crate::error::Result;
use crate::extensions::Extensions;

/// NewSessionTicket message.
///
/// ```text
/// struct {
///     uint32 ticket_lifetime;
///     uint32 ticket_age_add;
///     opaque ticket_nonce<0..255>;
///     opaque ticket<1..2^16-1>;
///     Extension extensions<0..2^16-2>;
/// } NewSessionTicket;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSessionTicket {
    /// Lifetime in seconds.
    pub ticket_lifetime: u32,
    /// Obfuscation value added to the ticket age on re-use.
    pub ticket_age_add: u32,
    /// Per-ticket nonce for resumption-PSK derivation.
    pub ticket_nonce: Vec<u8>,
    /// Opaque ticket blob.
    pub ticket: Vec<u8>,
    /// Extensions (early_data only).
    pub extensions: Extensions,
}

impl NewSessionTicket {
    /// Decode a message body.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let ticket_lifetime = r.read_u32()?;
        let ticket_age_add = r.read_u32()?;
        let ticket_nonce = r.read_vector8(0, 255)?.to_vec();
        let ticket = r.read_vector16(1, u16::MAX as usize)?.to_vec();
        let extensions = Extensions::decode(&mut r)?;
        r.expect_end()?;
        Ok(Self {
            ticket_lifetime,
            ticket_age_add,
            ticket_nonce,
            ticket,
            extensions,
        })
    }
}
