//! EncryptedExtensions message (RFC 8446 Section 4.3.1).

use crate::codec::Reader;
use crate::error::Result;
use crate::extensions::Extensions;

/// EncryptedExtensions message.
///
/// First message under the handshake keys; carries extensions that are
/// not needed for cryptographic negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedExtensions {
    /// Extensions.
    pub extensions: Extensions,
}

impl EncryptedExtensions {
    /// Decode a message body.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let extensions = Extensions::decode(&mut r)?;
        r.expect_end()?;
        Ok(Self { extensions })
    }
}
