//! Finished message (RFC 8446 Section 4.4.4).

use crate::error::Result;

/// Finished message: an HMAC over the handshake transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    /// Verify data (HMAC output, hash length of the suite).
    pub verify_data: Vec<u8>,
}

impl Finished {
    /// Create a new Finished message.
    pub fn new(verify_data: Vec<u8>) -> Self {
        Self { verify_data }
    }

    /// Encode the message body.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.verify_data.clone())
    }

    /// Decode a message body.
    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(Self {
            verify_data: data.to_vec(),
        })
    }
}
