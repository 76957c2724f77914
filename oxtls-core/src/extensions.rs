//! Extension container and per-message allow-masks.
//!
//! Each handshake message may only carry a fixed set of extensions
//! (RFC 8446 Section 4.2, figure 7). The engine checks every received
//! extension code against the mask for the message being parsed, records
//! it in a bit-set, and rejects duplicates.

use crate::codec::{put_vector16, Reader};
use crate::error::{ProtocolError, Result};
use crate::protocol::ExtensionType;
use bytes::{BufMut, BytesMut};

/// A single raw extension (type code + opaque body).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    /// Extension type code as it appeared on the wire.
    pub ext_type: u16,

    /// Extension data
    pub data: Vec<u8>,
}

impl Extension {
    /// Create a new extension from a known type.
    pub fn new(ext_type: ExtensionType, data: Vec<u8>) -> Self {
        Self {
            ext_type: ext_type.to_u16(),
            data,
        }
    }

    /// The known extension type, if the code is one we understand.
    pub fn known_type(&self) -> Option<ExtensionType> {
        ExtensionType::from_u16(self.ext_type)
    }

    /// Encode as `<type:u16><len:u16><body>`.
    pub fn encode_into(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u16(self.ext_type);
        put_vector16(buf, &self.data)
    }
}

/// Ordered extension list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extensions {
    extensions: Vec<Extension>,
}

impl Extensions {
    /// Create a new empty extension list.
    pub fn new() -> Self {
        Self {
            extensions: Vec::new(),
        }
    }

    /// Append an extension.
    pub fn add(&mut self, extension: Extension) {
        self.extensions.push(extension);
    }

    /// Get an extension by type.
    pub fn get(&self, ext_type: ExtensionType) -> Option<&Extension> {
        self.extensions
            .iter()
            .find(|e| e.ext_type == ext_type.to_u16())
    }

    /// Check if an extension is present.
    pub fn has(&self, ext_type: ExtensionType) -> bool {
        self.get(ext_type).is_some()
    }

    /// Iterate over the extensions in wire order.
    pub fn iter(&self) -> impl Iterator<Item = &Extension> {
        self.extensions.iter()
    }

    /// Number of extensions.
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Check if the extension list is empty.
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Encode as `<total_len:u16><Extension…>`.
    pub fn encode_into(&self, buf: &mut BytesMut) -> Result<()> {
        let mut body = BytesMut::new();
        for ext in &self.extensions {
            ext.encode_into(&mut body)?;
        }
        put_vector16(buf, &body)
    }

    /// Decode an extension block, rejecting duplicate codes.
    ///
    /// The reader must be positioned at the two-byte total length.
    pub fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let block = r.read_vector16(0, u16::MAX as usize)?;
        let mut inner = Reader::new(block);
        let mut extensions = Vec::new();
        while !inner.is_empty() {
            let ext_type = inner.read_u16()?;
            let data = inner.read_vector16(0, u16::MAX as usize)?.to_vec();
            if extensions.iter().any(|e: &Extension| e.ext_type == ext_type) {
                return Err(ProtocolError::IllegalParameter.into());
            }
            extensions.push(Extension { ext_type, data });
        }
        Ok(Self { extensions })
    }
}

/// Bit-set of extension codes seen in (or written to) one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtensionMask(u64);

/// Bit used for extension codes outside the known set.
const UNRECOGNIZED_BIT: u64 = 1 << 63;

fn mask_bit(ext: ExtensionType) -> u64 {
    match ext {
        ExtensionType::ServerName => 1 << 0,
        ExtensionType::SupportedGroups => 1 << 1,
        ExtensionType::SignatureAlgorithms => 1 << 2,
        ExtensionType::ApplicationLayerProtocolNegotiation => 1 << 3,
        ExtensionType::PreSharedKey => 1 << 4,
        ExtensionType::EarlyData => 1 << 5,
        ExtensionType::SupportedVersions => 1 << 6,
        ExtensionType::Cookie => 1 << 7,
        ExtensionType::PskKeyExchangeModes => 1 << 8,
        ExtensionType::CertificateAuthorities => 1 << 9,
        ExtensionType::SignatureAlgorithmsCert => 1 << 10,
        ExtensionType::KeyShare => 1 << 11,
    }
}

impl ExtensionMask {
    /// The empty mask.
    pub const NONE: ExtensionMask = ExtensionMask(0);

    /// Mark an extension as seen.
    pub fn insert(&mut self, ext: ExtensionType) {
        self.0 |= mask_bit(ext);
    }

    /// Check whether an extension was seen.
    pub fn contains(&self, ext: ExtensionType) -> bool {
        self.0 & mask_bit(ext) != 0
    }

    fn with(mut self, ext: ExtensionType) -> Self {
        self.insert(ext);
        self
    }

    fn with_unrecognized(mut self) -> Self {
        self.0 |= UNRECOGNIZED_BIT;
        self
    }

    fn allows_unrecognized(&self) -> bool {
        self.0 & UNRECOGNIZED_BIT != 0
    }
}

/// The message contexts that carry extensions on the client side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionContext {
    /// ClientHello (sent)
    ClientHello,
    /// ServerHello (received)
    ServerHello,
    /// HelloRetryRequest (received, ServerHello-shaped)
    HelloRetryRequest,
    /// EncryptedExtensions (received)
    EncryptedExtensions,
    /// CertificateRequest (received)
    CertificateRequest,
    /// NewSessionTicket (received)
    NewSessionTicket,
}

/// Allow-mask for a message context (RFC 8446 Section 4.2).
pub fn allowed_extensions(context: ExtensionContext) -> ExtensionMask {
    match context {
        ExtensionContext::ClientHello => ExtensionMask::NONE
            .with(ExtensionType::SupportedVersions)
            .with(ExtensionType::KeyShare)
            .with(ExtensionType::SupportedGroups)
            .with(ExtensionType::SignatureAlgorithms)
            .with(ExtensionType::ServerName)
            .with(ExtensionType::ApplicationLayerProtocolNegotiation)
            .with(ExtensionType::Cookie)
            .with(ExtensionType::PskKeyExchangeModes)
            .with(ExtensionType::PreSharedKey)
            .with(ExtensionType::EarlyData),
        ExtensionContext::ServerHello => ExtensionMask::NONE
            .with(ExtensionType::SupportedVersions)
            .with(ExtensionType::KeyShare)
            .with(ExtensionType::PreSharedKey),
        ExtensionContext::HelloRetryRequest => ExtensionMask::NONE
            .with(ExtensionType::SupportedVersions)
            .with(ExtensionType::KeyShare)
            .with(ExtensionType::Cookie),
        ExtensionContext::EncryptedExtensions => ExtensionMask::NONE
            .with(ExtensionType::ServerName)
            .with(ExtensionType::SupportedGroups)
            .with(ExtensionType::ApplicationLayerProtocolNegotiation)
            .with(ExtensionType::EarlyData)
            .with_unrecognized(),
        ExtensionContext::CertificateRequest => ExtensionMask::NONE
            .with(ExtensionType::SignatureAlgorithms)
            .with(ExtensionType::SignatureAlgorithmsCert)
            .with(ExtensionType::CertificateAuthorities)
            .with_unrecognized(),
        ExtensionContext::NewSessionTicket => {
            ExtensionMask::NONE.with(ExtensionType::EarlyData).with_unrecognized()
        },
    }
}

/// Outcome of checking one received extension against its message context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionDisposition {
    /// Known and allowed; the caller should parse it.
    Parse(ExtensionType),
    /// Tolerated but not interpreted in this message.
    Ignore,
}

/// Check a received extension code against the context's allow-mask and
/// record it in `received`.
///
/// Disallowed codes are a fatal `unsupported_extension`; a code already
/// present in `received` is a duplicate and a fatal `illegal_parameter`.
pub fn check_received_extension(
    context: ExtensionContext,
    ext_code: u16,
    received: &mut ExtensionMask,
) -> Result<ExtensionDisposition> {
    let allowed = allowed_extensions(context);
    match ExtensionType::from_u16(ext_code) {
        Some(ext) => {
            if !allowed.contains(ext) {
                tracing::debug!(
                    "extension {:?} not allowed in {:?}",
                    ext,
                    context
                );
                return Err(ProtocolError::UnsupportedExtension.into());
            }
            if received.contains(ext) {
                return Err(ProtocolError::IllegalParameter.into());
            }
            received.insert(ext);
            Ok(ExtensionDisposition::Parse(ext))
        },
        None => {
            if allowed.allows_unrecognized() {
                Ok(ExtensionDisposition::Ignore)
            } else {
                tracing::debug!(
                    "unrecognized extension {:#06x} in {:?}",
                    ext_code,
                    context
                );
                Err(ProtocolError::UnsupportedExtension.into())
            }
        },
    }
}
