//! CertificateRequest message (RFC 8446 Section 4.3.2).

use crate::codec::Reader;
use crate::error::Result;
use crate::extensions::Extensions;

/// CertificateRequest message.
///
/// ```text
/// struct {
///     opaque certificate_request_context<0..2^8-1>;
///     Extension extensions<2..2^16-1>;
/// } CertificateRequest;
/// ```
///
/// The signature_algorithms extension MUST be present; the state machine
/// enforces that after the allow-mask walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    /// Opaque context to echo in the client Certificate.
    pub certificate_request_context: Vec<u8>,

    /// Extensions.
    pub extensions: Extensions,
}

impl CertificateRequest {
    /// Decode a message body.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let certificate_request_context = r.read_vector8(0, 255)?.to_vec();
        let extensions = Extensions::decode(&mut r)?;
        r.expect_end()?;
        Ok(Self {
            certificate_request_context,
            extensions,
        })
    }
}
