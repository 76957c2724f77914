//! Typed extension bodies: ClientHello encoders and server-message parsers.
//!
//! The same extension code can have different body shapes depending on the
//! carrying message (`supported_versions`, `key_share`), so every parser
//! here is explicit about its message context instead of guessing from the
//! body length.

use crate::codec::{put_vector16, put_vector8, Reader};
use crate::error::{ProtocolError, Result};
use crate::extensions::Extension;
use crate::protocol::{ExtensionType, ProtocolVersion};
use bytes::{BufMut, BytesMut};
use oxtls_crypto::{NamedGroup, SignatureScheme};

/// PSK key exchange mode (RFC 8446 Section 4.2.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PskKeyExchangeMode {
    /// PSK-only key exchange
    PskKe = 0,

    /// PSK with (EC)DHE key exchange
    PskDheKe = 1,
}

impl PskKeyExchangeMode {
    /// Convert from wire format (u8).
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(PskKeyExchangeMode::PskKe),
            1 => Some(PskKeyExchangeMode::PskDheKe),
            _ => None,
        }
    }

    /// Convert to wire format (u8).
    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Key share entry (group + opaque key exchange data).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyShareEntry {
    /// Named group of the share.
    pub group: NamedGroup,
    /// Public key bytes in the group's wire encoding.
    pub key_exchange: Vec<u8>,
}

// --- ClientHello encoders -------------------------------------------------

/// supported_versions: 0x0304 first, 0x0303 additionally when the config
/// still accepts TLS 1.2.
pub fn build_supported_versions(min_version: ProtocolVersion) -> Result<Extension> {
    let mut body = BytesMut::new();
    let mut versions = BytesMut::new();
    versions.put_u16(ProtocolVersion::Tls13.to_u16());
    if min_version <= ProtocolVersion::Tls12 {
        versions.put_u16(ProtocolVersion::Tls12.to_u16());
    }
    put_vector8(&mut body, &versions)?;
    Ok(Extension::new(
        ExtensionType::SupportedVersions,
        body.to_vec(),
    ))
}

/// supported_groups: the configured preference list.
pub fn build_supported_groups(groups: &[NamedGroup]) -> Result<Extension> {
    let mut list = BytesMut::new();
    for group in groups {
        list.put_u16(group.to_u16());
    }
    let mut body = BytesMut::new();
    put_vector16(&mut body, &list)?;
    Ok(Extension::new(ExtensionType::SupportedGroups, body.to_vec()))
}

/// signature_algorithms: the configured preference list.
pub fn build_signature_algorithms(schemes: &[SignatureScheme]) -> Result<Extension> {
    let mut list = BytesMut::new();
    for scheme in schemes {
        list.put_u16(scheme.to_u16());
    }
    let mut body = BytesMut::new();
    put_vector16(&mut body, &list)?;
    Ok(Extension::new(
        ExtensionType::SignatureAlgorithms,
        body.to_vec(),
    ))
}

/// server_name: a single host_name entry.
pub fn build_server_name(name: &str) -> Result<Extension> {
    let mut entry = BytesMut::new();
    entry.put_u8(0); // NameType host_name
    put_vector16(&mut entry, name.as_bytes())?;
    let mut body = BytesMut::new();
    put_vector16(&mut body, &entry)?;
    Ok(Extension::new(ExtensionType::ServerName, body.to_vec()))
}

/// application_layer_protocol_negotiation: the configured protocol list.
pub fn build_alpn(protocols: &[String]) -> Result<Extension> {
    let mut list = BytesMut::new();
    for protocol in protocols {
        put_vector8(&mut list, protocol.as_bytes())?;
    }
    let mut body = BytesMut::new();
    put_vector16(&mut body, &list)?;
    Ok(Extension::new(
        ExtensionType::ApplicationLayerProtocolNegotiation,
        body.to_vec(),
    ))
}

/// cookie: verbatim echo of the value received in a HelloRetryRequest.
pub fn build_cookie(cookie: &[u8]) -> Result<Extension> {
    let mut body = BytesMut::new();
    put_vector16(&mut body, cookie)?;
    Ok(Extension::new(ExtensionType::Cookie, body.to_vec()))
}

/// psk_key_exchange_modes: the locally enabled PSK modes.
pub fn build_psk_key_exchange_modes(modes: &[PskKeyExchangeMode]) -> Result<Extension> {
    let mut list = BytesMut::new();
    for mode in modes {
        list.put_u8(mode.to_u8());
    }
    let mut body = BytesMut::new();
    put_vector8(&mut body, &list)?;
    Ok(Extension::new(
        ExtensionType::PskKeyExchangeModes,
        body.to_vec(),
    ))
}

/// key_share: exactly one entry, for the group we generated a key for.
pub fn build_key_share(group: NamedGroup, public_key: &[u8]) -> Result<Extension> {
    let mut entry = BytesMut::new();
    entry.put_u16(group.to_u16());
    put_vector16(&mut entry, public_key)?;
    let mut body = BytesMut::new();
    put_vector16(&mut body, &entry)?;
    Ok(Extension::new(ExtensionType::KeyShare, body.to_vec()))
}

/// early_data: empty body in ClientHello.
pub fn build_early_data() -> Extension {
    Extension::new(ExtensionType::EarlyData, Vec::new())
}

// --- Server-message parsers -----------------------------------------------

/// supported_versions in ServerHello / HRR: exactly 0x0304.
pub fn parse_supported_versions_server(data: &[u8]) -> Result<ProtocolVersion> {
    let mut r = Reader::new(data);
    let raw = r.read_u16()?;
    r.expect_end()?;
    if raw != ProtocolVersion::Tls13.to_u16() {
        return Err(ProtocolError::IllegalParameter.into());
    }
    Ok(ProtocolVersion::Tls13)
}

/// key_share in ServerHello: a single entry.
///
/// The group is returned raw so the caller can distinguish "not the group
/// we offered" from "group we cannot name".
pub fn parse_key_share_server(data: &[u8]) -> Result<(u16, Vec<u8>)> {
    let mut r = Reader::new(data);
    let group = r.read_u16()?;
    let key_exchange = r.read_vector16(1, u16::MAX as usize)?.to_vec();
    r.expect_end()?;
    Ok((group, key_exchange))
}

/// key_share in HelloRetryRequest: just the selected group.
pub fn parse_key_share_hrr(data: &[u8]) -> Result<u16> {
    let mut r = Reader::new(data);
    let group = r.read_u16()?;
    r.expect_end()?;
    Ok(group)
}

/// cookie in HelloRetryRequest.
pub fn parse_cookie(data: &[u8]) -> Result<Vec<u8>> {
    let mut r = Reader::new(data);
    let cookie = r.read_vector16(1, u16::MAX as usize)?.to_vec();
    r.expect_end()?;
    Ok(cookie)
}

/// pre_shared_key in ServerHello: the selected identity index.
pub fn parse_pre_shared_key_server(data: &[u8]) -> Result<u16> {
    let mut r = Reader::new(data);
    let selected_identity = r.read_u16()?;
    r.expect_end()?;
    Ok(selected_identity)
}

/// ALPN in EncryptedExtensions: a single-entry ProtocolNameList.
pub fn parse_alpn_server(data: &[u8]) -> Result<Vec<u8>> {
    let mut r = Reader::new(data);
    let list = r.read_vector16(2, u16::MAX as usize)?;
    r.expect_end()?;
    let mut inner = Reader::new(list);
    let protocol = inner.read_vector8(1, 255)?.to_vec();
    // The server selects exactly one protocol
    inner.expect_end().map_err(|_| ProtocolError::IllegalParameter)?;
    Ok(protocol)
}

/// early_data in EncryptedExtensions: body must be empty.
pub fn parse_early_data_encrypted_extensions(data: &[u8]) -> Result<()> {
    if !data.is_empty() {
        return Err(ProtocolError::DecodeError.into());
    }
    Ok(())
}

/// early_data in NewSessionTicket: a 4-byte max_early_data_size.
pub fn parse_early_data_new_session_ticket(data: &[u8]) -> Result<u32> {
    let mut r = Reader::new(data);
    let max_early_data_size = r.read_u32()?;
    r.expect_end()?;
    Ok(max_early_data_size)
}

/// signature_algorithms in CertificateRequest.
///
/// Unknown scheme codepoints are skipped; an empty result is a handshake
/// failure for the caller to raise once certificate selection runs.
pub fn parse_signature_algorithms(data: &[u8]) -> Result<Vec<SignatureScheme>> {
    let mut r = Reader::new(data);
    let list = r.read_vector16(2, u16::MAX as usize)?;
    r.expect_end()?;
    if list.len() % 2 != 0 {
        return Err(ProtocolError::DecodeError.into());
    }
    let mut inner = Reader::new(list);
    let mut schemes = Vec::new();
    while !inner.is_empty() {
        if let Some(scheme) = SignatureScheme::from_u16(inner.read_u16()?) {
            schemes.push(scheme);
        }
    }
    Ok(schemes)
}
