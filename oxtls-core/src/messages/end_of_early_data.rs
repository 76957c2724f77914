//! EndOfEarlyData message (RFC 8446 Section 4.5).

use crate::error::{ProtocolError, Result};

/// EndOfEarlyData message.
///
/// Empty body; its presence closes the client's early-data stream.
///
/// ```text
/// struct {} EndOfEarlyData;
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndOfEarlyData;

impl EndOfEarlyData {
    /// Encode the (empty) message body.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    /// Decode a message body.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if !data.is_empty() {
            return Err(ProtocolError::DecodeError.into());
        }
        Ok(Self)
    }
}
