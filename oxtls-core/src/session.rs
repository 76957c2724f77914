//! Negotiated session state that survives the handshake.

use crate::cipher::CipherSuite;
use crate::protocol::ProtocolVersion;
use crate::psk::TicketFlags;
use zeroize::Zeroizing;

/// Result of a completed (or handed-off) negotiation.
///
/// Populated incrementally by the state machine; the ticket fields are
/// refreshed by every NewSessionTicket the server sends.
pub struct Session {
    /// Negotiated protocol version.
    pub version: Option<ProtocolVersion>,
    /// Negotiated cipher suite.
    pub cipher_suite: Option<CipherSuite>,
    /// Negotiated ALPN protocol.
    pub alpn_protocol: Option<Vec<u8>>,
    /// Latest session ticket blob from the server.
    pub ticket: Option<Vec<u8>>,
    /// Ticket lifetime in seconds.
    pub ticket_lifetime: u32,
    /// Ticket age obfuscation value.
    pub ticket_age_add: u32,
    /// Receipt timestamp (seconds since UNIX epoch), when a clock was
    /// configured.
    pub ticket_received: Option<u64>,
    /// Ticket permission flags.
    pub ticket_flags: TicketFlags,
    /// Resumption master secret (RFC 8446 Section 7.1).
    pub resumption_master_secret: Option<Zeroizing<Vec<u8>>>,
    /// Resumption PSK derived from the latest ticket's nonce.
    pub resumption_key: Option<Zeroizing<Vec<u8>>>,
    /// Whether the server accepted early data.
    pub early_data_accepted: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("version", &self.version)
            .field("cipher_suite", &self.cipher_suite)
            .field("alpn_protocol", &self.alpn_protocol)
            .field("ticket_lifetime", &self.ticket_lifetime)
            .field("ticket_flags", &self.ticket_flags)
            .field("early_data_accepted", &self.early_data_accepted)
            .finish_non_exhaustive()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self {
            version: None,
            cipher_suite: None,
            alpn_protocol: None,
            ticket: None,
            ticket_lifetime: 0,
            ticket_age_add: 0,
            ticket_received: None,
            ticket_flags: TicketFlags::default(),
            resumption_master_secret: None,
            resumption_key: None,
            early_data_accepted: false,
        }
    }
}
