//! Record-layer boundary.
//!
//! The handshake engine is transport-agnostic: framing, encryption and
//! fragmentation live behind [`RecordIo`]. The engine hands over encoded
//! handshake messages, installs traffic keys at the key-schedule
//! transition points, and pends fatal alerts for the record layer to
//! serialize on its next write.

use crate::error::{AlertDescription, Result};
use crate::messages::HandshakeMessage;
use oxtls_crypto::AeadAlgorithm;
use zeroize::Zeroizing;

/// AEAD key material for one direction of the connection.
pub struct TrafficKeys {
    /// AEAD algorithm of the negotiated cipher suite.
    pub aead: AeadAlgorithm,
    /// AEAD key.
    pub key: Zeroizing<Vec<u8>>,
    /// Per-record IV base.
    pub iv: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for TrafficKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrafficKeys")
            .field("aead", &self.aead)
            .finish_non_exhaustive()
    }
}

/// Interface the handshake engine drives.
///
/// `fetch_handshake_message` returning `Ok(None)` and
/// `send_handshake_message` returning `Ok(false)` are the want-read /
/// want-write indications; the caller re-invokes `step()` once the
/// transport is ready again.
pub trait RecordIo {
    /// Fetch the next complete inbound handshake message, or `None` when
    /// more transport reads are needed.
    fn fetch_handshake_message(&mut self) -> Result<Option<HandshakeMessage>>;

    /// Queue an encoded handshake message (header included) for sending.
    ///
    /// Returns `false` when the transport cannot take the message yet.
    fn send_handshake_message(&mut self, encoded: &[u8]) -> Result<bool>;

    /// Install the inbound decryption transform. Takes effect with the
    /// very next received record.
    fn set_inbound_transform(&mut self, keys: TrafficKeys) -> Result<()>;

    /// Install the outbound encryption transform.
    fn set_outbound_transform(&mut self, keys: TrafficKeys) -> Result<()>;

    /// Emit one dummy ChangeCipherSpec record (middlebox compatibility).
    fn write_change_cipher_spec(&mut self) -> Result<()>;

    /// Queue a fatal alert to be serialized on the next write.
    fn pend_fatal_alert(&mut self, alert: AlertDescription);
}
