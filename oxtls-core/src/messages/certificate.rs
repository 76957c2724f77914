//! Certificate message (RFC 8446 Section 4.4.2).

use crate::codec::{put_vector24, put_vector8, Reader};
use crate::error::Result;
use crate::extensions::Extensions;
use bytes::BytesMut;

/// One certificate plus its per-certificate extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateEntry {
    /// DER-encoded X.509 certificate.
    pub cert_data: Vec<u8>,

    /// Extensions for this certificate (OCSP response, SCTs).
    pub extensions: Extensions,
}

/// Certificate message.
///
/// ```text
/// struct {
///     opaque certificate_request_context<0..2^8-1>;
///     CertificateEntry certificate_list<0..2^24-1>;
/// } Certificate;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// Echo of the CertificateRequest context; empty for server auth.
    pub certificate_request_context: Vec<u8>,

    /// Certificate chain, leaf first.
    pub certificate_list: Vec<CertificateEntry>,
}

impl Certificate {
    /// Create a Certificate message from a DER chain.
    pub fn new(context: Vec<u8>, chain: Vec<Vec<u8>>) -> Self {
        let certificate_list = chain
            .into_iter()
            .map(|cert_data| CertificateEntry {
                cert_data,
                extensions: Extensions::new(),
            })
            .collect();
        Self {
            certificate_request_context: context,
            certificate_list,
        }
    }

    /// Encode the message body.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::new();
        put_vector8(&mut buf, &self.certificate_request_context)?;

        let mut list = BytesMut::new();
        for entry in &self.certificate_list {
            put_vector24(&mut list, &entry.cert_data)?;
            entry.extensions.encode_into(&mut list)?;
        }
        put_vector24(&mut buf, &list)?;
        Ok(buf.to_vec())
    }

    /// Decode a message body.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let certificate_request_context = r.read_vector8(0, 255)?.to_vec();

        let list_raw = r.read_vector24(0, 0x00FF_FFFF)?;
        r.expect_end()?;

        let mut certificate_list = Vec::new();
        let mut list_r = Reader::new(list_raw);
        while !list_r.is_empty() {
            let cert_data = list_r.read_vector24(1, 0x00FF_FFFF)?.to_vec();
            let extensions = Extensions::decode(&mut list_r)?;
            certificate_list.push(CertificateEntry {
                cert_data,
                extensions,
            });
        }

        Ok(Self {
            certificate_request_context,
            certificate_list,
        })
    }

    /// The DER chain, leaf first.
    pub fn chain(&self) -> Vec<Vec<u8>> {
        self.certificate_list
            .iter()
            .map(|e| e.cert_data.clone())
            .collect()
    }
}
