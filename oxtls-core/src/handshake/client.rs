//! TLS 1.3 client handshake state machine.
//!
//! Drives the client from the first ClientHello until application traffic
//! keys are installed in both directions, then ingests post-handshake
//! NewSessionTicket messages.
//!
//! ```text
//! Start ── ClientHello ──> WaitServerHello
//!              ^                │
//!              │  (HRR, once)   ├──> Tls12Handoff
//!              └────────────────┤
//!                               v
//!                    WaitEncryptedExtensions
//!                               │ (PSK modes skip certificates)
//!                WaitCertCr / WaitCertificate / WaitCertVerify
//!                               │
//!                         WaitFinished
//!                               │
//!        [EndOfEarlyData] [dummy CCS] client Certificate*/Finished
//!                               │
//!                       Wrapup ──> Connected ──> NewSessionTicket*
//! ```
//!
//! One `step()` call runs exactly one state; all state effects of an
//! inbound message land only after the whole message validated.

use crate::cipher::CipherSuite;
use crate::config::ClientConfig;
use crate::error::{alert_for_error, ProtocolError, Result};
use crate::extension_types::{
    build_alpn, build_cookie, build_early_data, build_key_share, build_psk_key_exchange_modes,
    build_server_name, build_signature_algorithms, build_supported_groups,
    build_supported_versions, parse_alpn_server, parse_cookie,
    parse_early_data_encrypted_extensions, parse_early_data_new_session_ticket,
    parse_key_share_hrr, parse_key_share_server, parse_pre_shared_key_server,
    parse_signature_algorithms, parse_supported_versions_server, PskKeyExchangeMode,
};
use crate::extensions::{
    check_received_extension, Extension, ExtensionContext, ExtensionDisposition, ExtensionMask,
    Extensions,
};
use crate::key_schedule::KeySchedule;
use crate::messages::{
    Certificate, CertificateRequest, CertificateVerify, EncryptedExtensions, EndOfEarlyData,
    Finished, HandshakeMessage, NewSessionTicket, ServerHello,
};
use crate::protocol::{ExtensionType, HandshakeType, ProtocolVersion};
use crate::psk::{
    derive_resumption_psk, offered_psks, OfferedPsk, PreSharedKeyExtension, PskBinder, TicketFlags,
};
use crate::record::{RecordIo, TrafficKeys};
use crate::session::Session;
use crate::transcript::{compute_verify_data, TranscriptHash};
use crate::handshake::{ClientState, StepEvent};
use oxtls_crypto::{CryptoProvider, NamedGroup, PrivateKey};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// First seven bytes of the RFC 8446 Section 4.1.3 downgrade sentinels.
const DOWNGRADE_MAGIC: [u8; 7] = *b"DOWNGRD";

/// Negotiated key-exchange mode, decided by the ServerHello extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyExchangeMode {
    Psk,
    Ephemeral,
    PskEphemeral,
}

impl KeyExchangeMode {
    fn uses_psk(self) -> bool {
        matches!(self, KeyExchangeMode::Psk | KeyExchangeMode::PskEphemeral)
    }

    fn uses_ephemeral(self) -> bool {
        matches!(
            self,
            KeyExchangeMode::Ephemeral | KeyExchangeMode::PskEphemeral
        )
    }
}

/// Client-side TLS 1.3 handshake engine for one connection.
///
/// Holds a borrow of the shared configuration for its whole lifetime; all
/// mutable state is owned and torn down with the value.
pub struct ClientConnection<'c> {
    config: &'c ClientConfig,
    state: ClientState,

    transcript: TranscriptHash,
    key_schedule: Option<KeySchedule>,
    cipher_suite: Option<CipherSuite>,

    /// ClientHello.random ‖ ServerHello.random.
    randbytes: [u8; 64],
    session_id: Vec<u8>,

    /// Group the current key share was generated for.
    offered_group: Option<NamedGroup>,
    ephemeral_key: Option<PrivateKey>,
    /// Public half of the current key share, resent verbatim on a
    /// cookie-only retry.
    key_share_public: Option<Vec<u8>>,
    cookie: Option<Vec<u8>>,

    sent_extensions: ExtensionMask,
    received_extensions: ExtensionMask,
    hello_retry_request_count: u8,
    /// Cipher suite announced by the HRR; the final ServerHello must
    /// repeat it.
    hrr_cipher_suite: Option<u16>,

    offered: Vec<OfferedPsk>,
    selected_psk: Option<usize>,
    server_key_share: Option<Vec<u8>>,
    key_exchange_mode: Option<KeyExchangeMode>,

    client_auth: bool,
    certificate_request_context: Vec<u8>,
    peer_signature_schemes: Vec<oxtls_crypto::SignatureScheme>,
    server_cert_chain: Vec<Vec<u8>>,

    early_data_offered: bool,

    /// The ServerHello retained for a TLS 1.2 stack after a handoff.
    retained_server_hello: Option<Vec<u8>>,

    /// Encoded message waiting on a want-write transport, with the state
    /// to enter once it leaves.
    pending_send: Option<(Vec<u8>, ClientState)>,

    session: Session,
}

impl<'c> ClientConnection<'c> {
    /// Create a handshake for one connection.
    pub fn new(config: &'c ClientConfig) -> Self {
        let hash = config.cipher_suites[0].hash_algorithm();
        Self {
            config,
            state: ClientState::Start,
            transcript: TranscriptHash::new(hash),
            key_schedule: None,
            cipher_suite: None,
            randbytes: [0u8; 64],
            session_id: Vec::new(),
            offered_group: None,
            ephemeral_key: None,
            key_share_public: None,
            cookie: None,
            sent_extensions: ExtensionMask::NONE,
            received_extensions: ExtensionMask::NONE,
            hello_retry_request_count: 0,
            hrr_cipher_suite: None,
            offered: Vec::new(),
            selected_psk: None,
            server_key_share: None,
            key_exchange_mode: None,
            client_auth: false,
            certificate_request_context: Vec::new(),
            peer_signature_schemes: Vec::new(),
            server_cert_chain: Vec::new(),
            early_data_offered: false,
            retained_server_hello: None,
            pending_send: None,
            session: Session::default(),
        }
    }

    /// Current state.
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Whether the handshake completed.
    pub fn is_connected(&self) -> bool {
        self.state == ClientState::Connected
    }

    /// The negotiated session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The raw ServerHello body retained for a legacy TLS 1.2 handler
    /// after a handoff.
    pub fn retained_server_hello(&self) -> Option<&[u8]> {
        self.retained_server_hello.as_deref()
    }

    /// Run one state's work.
    ///
    /// On any fatal condition a pending alert is queued on the record
    /// layer, the state becomes `Failed`, and the error is returned;
    /// states never retry.
    pub fn step(
        &mut self,
        provider: &dyn CryptoProvider,
        io: &mut dyn RecordIo,
    ) -> Result<StepEvent> {
        if self.state == ClientState::Failed {
            return Err(ProtocolError::InternalError.into());
        }
        match self.step_inner(provider, io) {
            Ok(event) => Ok(event),
            Err(error) => {
                tracing::warn!("handshake failed in {:?}: {}", self.state, error);
                io.pend_fatal_alert(alert_for_error(&error));
                self.teardown();
                Err(error)
            },
        }
    }

    fn step_inner(
        &mut self,
        provider: &dyn CryptoProvider,
        io: &mut dyn RecordIo,
    ) -> Result<StepEvent> {
        // A message stuck on a full transport goes out before anything else
        if let Some((encoded, next)) = self.pending_send.take() {
            if !io.send_handshake_message(&encoded)? {
                self.pending_send = Some((encoded, next));
                return Ok(StepEvent::WantIo);
            }
            self.state = next;
            return Ok(StepEvent::Progressed);
        }

        match self.state {
            ClientState::Start => self.write_client_hello(provider, io),
            ClientState::CcsBeforeSecondClientHello => {
                io.write_change_cipher_spec()?;
                self.state = ClientState::Start;
                Ok(StepEvent::Progressed)
            },
            ClientState::WaitServerHello => self.process_server_hello(provider, io),
            ClientState::WaitEncryptedExtensions => {
                self.process_encrypted_extensions(provider, io)
            },
            ClientState::WaitCertCr => self.process_certificate_or_request(provider, io),
            ClientState::WaitCertificate => {
                match self.fetch_expected(io, HandshakeType::Certificate)? {
                    None => Ok(StepEvent::WantIo),
                    Some(msg) => {
                        self.process_server_certificate(&msg)?;
                        Ok(StepEvent::Progressed)
                    },
                }
            },
            ClientState::WaitCertVerify => self.process_certificate_verify(provider, io),
            ClientState::WaitFinished => self.process_server_finished(provider, io),
            ClientState::SendEndOfEarlyData => self.write_end_of_early_data(io),
            ClientState::CcsAfterServerFinished => {
                if self.config.compat_mode {
                    io.write_change_cipher_spec()?;
                }
                self.enter_client_flight(provider, io)?;
                Ok(StepEvent::Progressed)
            },
            ClientState::SendClientCertificate => self.write_client_certificate(io),
            ClientState::SendClientCertVerify => self.write_client_cert_verify(provider, io),
            ClientState::SendClientFinished => self.write_client_finished(provider, io),
            ClientState::Wrapup => self.wrapup(provider, io),
            ClientState::Connected => self.process_post_handshake(provider, io),
            ClientState::Tls12Handoff => Ok(StepEvent::HandoffTls12),
            ClientState::Failed => Err(ProtocolError::InternalError.into()),
        }
    }

    /// Drop every transient secret; entered on any fatal error.
    fn teardown(&mut self) {
        self.ephemeral_key = None;
        self.offered.clear();
        self.cookie = None;
        self.state = ClientState::Failed;
    }

    // --- outbound: ClientHello ------------------------------------------

    fn write_client_hello(
        &mut self,
        provider: &dyn CryptoProvider,
        io: &mut dyn RecordIo,
    ) -> Result<StepEvent> {
        use crate::messages::ClientHello;

        let config = self.config;
        let first_flight = self.hello_retry_request_count == 0;

        let offers = offered_psks(config);
        if offers.is_empty() && !config.key_exchange_modes.any_ephemeral() {
            // Pure-PSK configuration with nothing offerable cannot proceed
            return Err(ProtocolError::HandshakeFailure.into());
        }

        if first_flight {
            provider.random().fill(&mut self.randbytes[..32])?;
            // A non-empty legacy session id makes the flight look like a
            // TLS 1.2 resumption to middleboxes
            self.session_id = if config.compat_mode {
                provider.random().generate(32)?
            } else {
                Vec::new()
            };
        }

        let mut random = [0u8; 32];
        random.copy_from_slice(&self.randbytes[..32]);
        let mut hello = ClientHello::new(random, config.cipher_suites.clone());
        hello.legacy_session_id = self.session_id.clone();

        let mut sent = ExtensionMask::NONE;
        let mut extensions = Extensions::new();

        extensions.add(build_supported_versions(config.min_version)?);
        sent.insert(ExtensionType::SupportedVersions);

        if let Some(name) = &config.server_name {
            extensions.add(build_server_name(name)?);
            sent.insert(ExtensionType::ServerName);
        }

        if config.key_exchange_modes.any_ephemeral() {
            extensions.add(build_supported_groups(&config.supported_groups)?);
            sent.insert(ExtensionType::SupportedGroups);

            let group = self.pick_key_share_group(provider)?;
            // A cookie-only retry resends the share unchanged; a group
            // switch kills the old private key before generating anew
            if self.ephemeral_key.is_none()
                || self.key_share_public.is_none()
                || self.offered_group != Some(group)
            {
                self.ephemeral_key = None;
                let kex = provider.key_exchange(group)?;
                let (private, public) = kex.generate_keypair()?;
                self.ephemeral_key = Some(private);
                self.key_share_public = Some(public.as_bytes().to_vec());
                self.offered_group = Some(group);
            }
            let public = self
                .key_share_public
                .as_ref()
                .ok_or(ProtocolError::InternalError)?;
            extensions.add(build_key_share(group, public)?);
            sent.insert(ExtensionType::KeyShare);
        }

        if config.key_exchange_modes.any_ephemeral() {
            // A key-share offer means the server may fall back to full
            // certificate authentication, so it needs our scheme list
            extensions.add(build_signature_algorithms(&config.signature_schemes)?);
            sent.insert(ExtensionType::SignatureAlgorithms);
        }

        if !config.alpn_protocols.is_empty() {
            extensions.add(build_alpn(&config.alpn_protocols)?);
            sent.insert(ExtensionType::ApplicationLayerProtocolNegotiation);
        }

        if let Some(cookie) = &self.cookie {
            extensions.add(build_cookie(cookie)?);
            sent.insert(ExtensionType::Cookie);
        }

        if config.key_exchange_modes.any_psk() {
            let mut modes = Vec::new();
            if config.key_exchange_modes.psk_ephemeral {
                modes.push(PskKeyExchangeMode::PskDheKe);
            }
            if config.key_exchange_modes.psk {
                modes.push(PskKeyExchangeMode::PskKe);
            }
            extensions.add(build_psk_key_exchange_modes(&modes)?);
            sent.insert(ExtensionType::PskKeyExchangeModes);
        }

        let mut psk_ext = None;
        if !offers.is_empty() {
            if config.enable_early_data && first_flight {
                extensions.add(build_early_data());
                sent.insert(ExtensionType::EarlyData);
                self.early_data_offered = true;
            }

            // pre_shared_key goes last, binders still zeroed
            let ext = PreSharedKeyExtension::for_offers(&offers)?;
            let mut body = bytes::BytesMut::new();
            ext.encode_with_zeroed_binders(&mut body)?;
            extensions.add(Extension::new(ExtensionType::PreSharedKey, body.to_vec()));
            sent.insert(ExtensionType::PreSharedKey);
            psk_ext = Some(ext);
        }

        hello.extensions = extensions;
        self.sent_extensions = sent;

        let mut encoded =
            HandshakeMessage::new(HandshakeType::ClientHello, hello.encode()?).encode()?;

        if let Some(ext) = &psk_ext {
            self.fill_binders(provider, ext, &offers, &mut encoded)?;
        } else {
            self.transcript.update(&encoded);
        }
        self.offered = offers;

        tracing::debug!(
            "ClientHello out ({} bytes, retry {})",
            encoded.len(),
            self.hello_retry_request_count
        );
        self.send(io, encoded, ClientState::WaitServerHello)
    }

    /// Pick the group for the single key-share entry: the HRR selection
    /// when present, else the first configured group the crypto backend
    /// supports.
    fn pick_key_share_group(&self, provider: &dyn CryptoProvider) -> Result<NamedGroup> {
        if let Some(group) = self.offered_group {
            if provider.supports_group(group) {
                return Ok(group);
            }
        }
        self.config
            .supported_groups
            .iter()
            .copied()
            .find(|g| provider.supports_group(*g))
            .ok_or_else(|| ProtocolError::HandshakeFailure.into())
    }

    /// RFC 8446 Section 4.2.11.2: hash the ClientHello up to the binders
    /// list, compute each binder under its PSK's hash, overwrite the
    /// reserved bytes, then feed the binder bytes.
    fn fill_binders(
        &mut self,
        provider: &dyn CryptoProvider,
        ext: &PreSharedKeyExtension,
        offers: &[OfferedPsk],
        encoded: &mut [u8],
    ) -> Result<()> {
        let binders_len = ext.binders_list_len();
        let truncated_len = encoded
            .len()
            .checked_sub(binders_len)
            .ok_or(ProtocolError::InternalError)?;

        self.transcript.update(&encoded[..truncated_len]);

        let mut pos = truncated_len + 2;
        for offer in offers {
            let transcript_hash = self.transcript.hash_with(provider, offer.hash_algorithm)?;
            let binder = PskBinder::compute(provider, offer, &transcript_hash)?;
            pos += 1; // length byte, already written
            encoded[pos..pos + binder.binder.len()].copy_from_slice(&binder.binder);
            pos += binder.binder.len();
        }

        self.transcript.update(&encoded[truncated_len..]);
        Ok(())
    }

    fn send(
        &mut self,
        io: &mut dyn RecordIo,
        encoded: Vec<u8>,
        next: ClientState,
    ) -> Result<StepEvent> {
        if io.send_handshake_message(&encoded)? {
            self.state = next;
            Ok(StepEvent::Progressed)
        } else {
            self.pending_send = Some((encoded, next));
            Ok(StepEvent::WantIo)
        }
    }

    fn fetch_expected(
        &mut self,
        io: &mut dyn RecordIo,
        expected: HandshakeType,
    ) -> Result<Option<HandshakeMessage>> {
        match io.fetch_handshake_message()? {
            None => Ok(None),
            Some(msg) if msg.msg_type == expected => Ok(Some(msg)),
            Some(msg) => {
                tracing::warn!("expected {:?}, got {:?}", expected, msg.msg_type);
                Err(ProtocolError::UnexpectedMessage.into())
            },
        }
    }

    // --- inbound: ServerHello / HelloRetryRequest -----------------------

    fn process_server_hello(
        &mut self,
        provider: &dyn CryptoProvider,
        io: &mut dyn RecordIo,
    ) -> Result<StepEvent> {
        let msg = match self.fetch_expected(io, HandshakeType::ServerHello)? {
            None => return Ok(StepEvent::WantIo),
            Some(msg) => msg,
        };
        let hello = ServerHello::decode(&msg.payload)?;

        // Classify before anything else: a hello without supported_versions
        // is a TLS 1.2 (or older) selection
        if !hello.extensions.has(ExtensionType::SupportedVersions) {
            return self.handoff_tls12(&msg, &hello);
        }

        if hello.legacy_session_id_echo != self.session_id {
            return Err(ProtocolError::IllegalParameter.into());
        }

        if hello.is_hello_retry_request() {
            self.process_hello_retry_request(provider, &msg, &hello)?;
            return Ok(StepEvent::Progressed);
        }

        let suite = hello
            .known_cipher_suite()
            .filter(|s| self.config.cipher_suites.contains(s))
            .ok_or(ProtocolError::IllegalParameter)?;
        // After an HRR the server is pinned to the suite it announced
        if let Some(hrr_suite) = self.hrr_cipher_suite {
            if hrr_suite != hello.cipher_suite {
                return Err(ProtocolError::IllegalParameter.into());
            }
        }

        self.randbytes[32..].copy_from_slice(&hello.random);
        self.cipher_suite = Some(suite);
        self.session.cipher_suite = Some(suite);
        self.transcript.restart_with(suite.hash_algorithm());

        self.received_extensions = ExtensionMask::NONE;
        let mut selected_identity = None;
        for ext in hello.extensions.iter() {
            let disposition = check_received_extension(
                ExtensionContext::ServerHello,
                ext.ext_type,
                &mut self.received_extensions,
            )?;
            let known = match disposition {
                ExtensionDisposition::Parse(known) => known,
                ExtensionDisposition::Ignore => continue,
            };
            // The server may only echo what we sent (RFC 8446 4.1.3)
            if !self.sent_extensions.contains(known) {
                return Err(ProtocolError::UnsupportedExtension.into());
            }
            match known {
                ExtensionType::SupportedVersions => {
                    parse_supported_versions_server(&ext.data)?;
                },
                ExtensionType::KeyShare => {
                    let (group, key_exchange) = parse_key_share_server(&ext.data)?;
                    let offered = self
                        .offered_group
                        .ok_or(ProtocolError::HandshakeFailure)?;
                    if group != offered.to_u16() {
                        return Err(ProtocolError::HandshakeFailure.into());
                    }
                    self.server_key_share = Some(key_exchange);
                },
                ExtensionType::PreSharedKey => {
                    let index = parse_pre_shared_key_server(&ext.data)?;
                    if usize::from(index) >= self.offered.len() {
                        return Err(ProtocolError::IllegalParameter.into());
                    }
                    selected_identity = Some(usize::from(index));
                },
                _ => unreachable!("not in the ServerHello allow-mask"),
            }
        }
        self.selected_psk = selected_identity;

        // Whole message validated: transcript and key schedule may move
        self.transcript.update(&msg.encode()?);

        let mode = self.decide_key_exchange_mode()?;
        self.key_exchange_mode = Some(mode);
        tracing::debug!("negotiated {:?} with {}", mode, suite.name());

        if let Some(index) = self.selected_psk {
            if self.offered[index].hash_algorithm != suite.hash_algorithm() {
                return Err(ProtocolError::IllegalParameter.into());
            }
        }

        let mut key_schedule = KeySchedule::new(suite);
        let psk: Option<Zeroizing<Vec<u8>>> = self
            .selected_psk
            .map(|i| self.offered[i].secret.clone());
        key_schedule.init_early_secret(
            provider,
            psk.as_ref().map(|p| p.as_slice()).unwrap_or(&[]),
        )?;

        let hash_len = suite.hash_algorithm().output_size();
        let shared = if mode.uses_ephemeral() {
            let group = self.offered_group.ok_or(ProtocolError::InternalError)?;
            let private = self
                .ephemeral_key
                .as_ref()
                .ok_or(ProtocolError::InternalError)?;
            let peer = self
                .server_key_share
                .as_ref()
                .ok_or(ProtocolError::InternalError)?;
            let kex = provider.key_exchange(group)?;
            let secret = kex.exchange(private, peer)?;
            Zeroizing::new(secret.as_bytes().to_vec())
        } else {
            Zeroizing::new(vec![0u8; hash_len])
        };
        key_schedule.derive_handshake_secret(provider, &shared)?;

        let transcript_hash = self.transcript.current_hash(provider)?;
        key_schedule.derive_handshake_traffic_secrets(provider, &transcript_hash)?;

        // Decryption starts with the very next record
        let keys = self.traffic_keys(
            provider,
            &key_schedule,
            key_schedule
                .server_handshake_traffic_secret()
                .ok_or(ProtocolError::InternalError)?,
        )?;
        io.set_inbound_transform(keys)?;

        self.key_schedule = Some(key_schedule);
        self.state = ClientState::WaitEncryptedExtensions;
        Ok(StepEvent::Progressed)
    }

    /// RFC 8446 Section 4.1.3 downgrade guard, then hand the connection to
    /// a TLS 1.2 stack.
    fn handoff_tls12(&mut self, msg: &HandshakeMessage, hello: &ServerHello) -> Result<StepEvent> {
        let tail = &hello.random[24..];
        if tail[..7] == DOWNGRADE_MAGIC && (tail[7] == 0x00 || tail[7] == 0x01) {
            tracing::warn!("downgrade sentinel in ServerHello.random");
            return Err(ProtocolError::IllegalParameter.into());
        }
        if self.config.min_version > ProtocolVersion::Tls12 {
            return Err(ProtocolError::IllegalParameter.into());
        }

        self.ephemeral_key = None;
        self.retained_server_hello = Some(msg.payload.clone());
        self.session.version = Some(ProtocolVersion::Tls12);
        self.state = ClientState::Tls12Handoff;
        tracing::info!("server selected TLS 1.2, handing off");
        Ok(StepEvent::HandoffTls12)
    }

    fn process_hello_retry_request(
        &mut self,
        provider: &dyn CryptoProvider,
        msg: &HandshakeMessage,
        hello: &ServerHello,
    ) -> Result<()> {
        if self.hello_retry_request_count > 0 {
            tracing::warn!("second HelloRetryRequest");
            return Err(ProtocolError::UnexpectedMessage.into());
        }
        if !self.config.key_exchange_modes.any_ephemeral() {
            // Nothing a retry could change in pure-PSK key exchange
            return Err(ProtocolError::IllegalParameter.into());
        }

        let suite = hello
            .known_cipher_suite()
            .filter(|s| self.config.cipher_suites.contains(s))
            .ok_or(ProtocolError::IllegalParameter)?;

        self.received_extensions = ExtensionMask::NONE;
        let mut new_group = None;
        let mut new_cookie = None;
        for ext in hello.extensions.iter() {
            let disposition = check_received_extension(
                ExtensionContext::HelloRetryRequest,
                ext.ext_type,
                &mut self.received_extensions,
            )?;
            let known = match disposition {
                ExtensionDisposition::Parse(known) => known,
                ExtensionDisposition::Ignore => continue,
            };
            match known {
                ExtensionType::SupportedVersions => {
                    parse_supported_versions_server(&ext.data)?;
                },
                ExtensionType::KeyShare => {
                    let raw = parse_key_share_hrr(&ext.data)?;
                    let group =
                        NamedGroup::from_u16(raw).ok_or(ProtocolError::IllegalParameter)?;
                    if !self.config.supported_groups.contains(&group) {
                        return Err(ProtocolError::IllegalParameter.into());
                    }
                    // A retry that asks for the share we already sent is
                    // a protocol violation
                    if Some(group) == self.offered_group {
                        return Err(ProtocolError::IllegalParameter.into());
                    }
                    new_group = Some(group);
                },
                ExtensionType::Cookie => {
                    new_cookie = Some(parse_cookie(&ext.data)?);
                },
                _ => unreachable!("not in the HelloRetryRequest allow-mask"),
            }
        }

        if new_group.is_none() && new_cookie.is_none() {
            return Err(ProtocolError::IllegalParameter.into());
        }

        // Validated: commit, rebuild the transcript around message_hash
        self.cipher_suite = Some(suite);
        self.hrr_cipher_suite = Some(hello.cipher_suite);
        self.transcript.restart_with(suite.hash_algorithm());
        self.transcript.reset_for_hello_retry(provider)?;
        self.transcript.update(&msg.encode()?);

        if let Some(group) = new_group {
            self.ephemeral_key = None;
            self.key_share_public = None;
            self.offered_group = Some(group);
            tracing::debug!("retrying with {}", group.name());
        }
        if let Some(cookie) = new_cookie {
            tracing::debug!("cookie received ({} bytes)", cookie.len());
            self.cookie = Some(cookie);
        }

        // The retried ClientHello never re-offers early data
        self.early_data_offered = false;

        self.hello_retry_request_count = 1;
        self.state = if self.config.compat_mode {
            ClientState::CcsBeforeSecondClientHello
        } else {
            ClientState::Start
        };
        Ok(())
    }

    /// RFC 8446 Section 4.1.1: the joint presence of pre_shared_key and
    /// key_share decides the mode, filtered by the enabled modes.
    ///
    /// A plain key-share answer is acceptable under any ephemeral-capable
    /// mode: offering a key share commits the client to the certificate
    /// fallback a server takes when it ignores the PSKs.
    fn decide_key_exchange_mode(&self) -> Result<KeyExchangeMode> {
        let modes = &self.config.key_exchange_modes;
        let mode = match (self.selected_psk.is_some(), self.server_key_share.is_some()) {
            (false, false) => return Err(ProtocolError::HandshakeFailure.into()),
            (true, false) => (modes.psk).then_some(KeyExchangeMode::Psk),
            (false, true) => modes.any_ephemeral().then_some(KeyExchangeMode::Ephemeral),
            (true, true) => (modes.psk_ephemeral).then_some(KeyExchangeMode::PskEphemeral),
        };
        mode.ok_or_else(|| ProtocolError::HandshakeFailure.into())
    }

    fn traffic_keys(
        &self,
        provider: &dyn CryptoProvider,
        key_schedule: &KeySchedule,
        secret: &[u8],
    ) -> Result<TrafficKeys> {
        let (key, iv) = key_schedule.derive_traffic_keys(provider, secret)?;
        Ok(TrafficKeys {
            aead: key_schedule.cipher_suite().aead_algorithm(),
            key,
            iv,
        })
    }

    // --- inbound: encrypted server flight -------------------------------

    fn process_encrypted_extensions(
        &mut self,
        provider: &dyn CryptoProvider,
        io: &mut dyn RecordIo,
    ) -> Result<StepEvent> {
        let msg = match self.fetch_expected(io, HandshakeType::EncryptedExtensions)? {
            None => return Ok(StepEvent::WantIo),
            Some(msg) => msg,
        };
        let ee = EncryptedExtensions::decode(&msg.payload)?;

        self.received_extensions = ExtensionMask::NONE;
        let mut alpn = None;
        let mut early_data_accepted = false;
        for ext in ee.extensions.iter() {
            let disposition = check_received_extension(
                ExtensionContext::EncryptedExtensions,
                ext.ext_type,
                &mut self.received_extensions,
            )?;
            let known = match disposition {
                ExtensionDisposition::Parse(known) => known,
                ExtensionDisposition::Ignore => continue,
            };
            if !self.sent_extensions.contains(known) {
                return Err(ProtocolError::UnsupportedExtension.into());
            }
            match known {
                ExtensionType::ApplicationLayerProtocolNegotiation => {
                    let protocol = parse_alpn_server(&ext.data)?;
                    let offered = self
                        .config
                        .alpn_protocols
                        .iter()
                        .any(|p| p.as_bytes() == protocol.as_slice());
                    if !offered {
                        return Err(ProtocolError::NoApplicationProtocol.into());
                    }
                    alpn = Some(protocol);
                },
                ExtensionType::EarlyData => {
                    parse_early_data_encrypted_extensions(&ext.data)?;
                    if !self.early_data_offered {
                        return Err(ProtocolError::UnsupportedExtension.into());
                    }
                    early_data_accepted = true;
                },
                // Content-free acknowledgements of offers we made
                ExtensionType::ServerName | ExtensionType::SupportedGroups => {},
                _ => unreachable!("not in the EncryptedExtensions allow-mask"),
            }
        }

        self.transcript.update(&msg.encode()?);
        self.session.alpn_protocol = alpn;
        self.session.early_data_accepted = early_data_accepted;
        if early_data_accepted {
            tracing::debug!("server accepted early data");
        }

        let mode = self.key_exchange_mode.ok_or(ProtocolError::InternalError)?;
        self.state = if mode.uses_psk() {
            // PSK authenticates the server; no certificate flight
            ClientState::WaitFinished
        } else {
            ClientState::WaitCertCr
        };
        Ok(StepEvent::Progressed)
    }

    fn process_certificate_or_request(
        &mut self,
        _provider: &dyn CryptoProvider,
        io: &mut dyn RecordIo,
    ) -> Result<StepEvent> {
        let msg = match io.fetch_handshake_message()? {
            None => return Ok(StepEvent::WantIo),
            Some(msg) => msg,
        };
        match msg.msg_type {
            HandshakeType::CertificateRequest => {
                self.process_certificate_request(&msg)?;
                Ok(StepEvent::Progressed)
            },
            HandshakeType::Certificate => {
                self.process_server_certificate(&msg)?;
                Ok(StepEvent::Progressed)
            },
            _ => Err(ProtocolError::UnexpectedMessage.into()),
        }
    }

    fn process_certificate_request(&mut self, msg: &HandshakeMessage) -> Result<()> {
        let request = CertificateRequest::decode(&msg.payload)?;

        self.received_extensions = ExtensionMask::NONE;
        let mut schemes = None;
        for ext in request.extensions.iter() {
            let disposition = check_received_extension(
                ExtensionContext::CertificateRequest,
                ext.ext_type,
                &mut self.received_extensions,
            )?;
            if let ExtensionDisposition::Parse(ExtensionType::SignatureAlgorithms) = disposition {
                schemes = Some(parse_signature_algorithms(&ext.data)?);
            }
        }
        // signature_algorithms is the one mandatory extension here
        let schemes = schemes.ok_or(ProtocolError::MissingExtension)?;

        self.transcript.update(&msg.encode()?);
        self.client_auth = true;
        self.certificate_request_context = request.certificate_request_context;
        self.peer_signature_schemes = schemes;
        self.state = ClientState::WaitCertificate;
        tracing::debug!("server requested client authentication");
        Ok(())
    }

    fn process_server_certificate(&mut self, msg: &HandshakeMessage) -> Result<()> {
        let certificate = Certificate::decode(&msg.payload)?;
        if !certificate.certificate_request_context.is_empty() {
            // Server certificates always carry an empty context
            return Err(ProtocolError::IllegalParameter.into());
        }
        let chain = certificate.chain();
        if chain.is_empty() {
            return Err(ProtocolError::DecodeError.into());
        }
        self.config
            .certificate_verifier
            .verify_chain(&chain, self.config.server_name.as_deref())?;

        self.transcript.update(&msg.encode()?);
        self.server_cert_chain = chain;
        self.state = ClientState::WaitCertVerify;
        Ok(())
    }

    fn process_certificate_verify(
        &mut self,
        provider: &dyn CryptoProvider,
        io: &mut dyn RecordIo,
    ) -> Result<StepEvent> {
        let msg = match self.fetch_expected(io, HandshakeType::CertificateVerify)? {
            None => return Ok(StepEvent::WantIo),
            Some(msg) => msg,
        };
        let cert_verify = CertificateVerify::decode(&msg.payload)?;

        if !self.config.signature_schemes.contains(&cert_verify.algorithm) {
            return Err(ProtocolError::IllegalParameter.into());
        }

        // The signature covers the transcript up to (excluding) this
        // message
        let transcript_hash = self.transcript.current_hash(provider)?;
        let content = CertificateVerify::signed_content(true, &transcript_hash);
        let leaf = self
            .server_cert_chain
            .first()
            .ok_or(ProtocolError::InternalError)?;
        self.config.certificate_verifier.verify_signature(
            leaf,
            cert_verify.algorithm,
            &content,
            &cert_verify.signature,
        )?;

        self.transcript.update(&msg.encode()?);
        self.state = ClientState::WaitFinished;
        Ok(StepEvent::Progressed)
    }

    fn process_server_finished(
        &mut self,
        provider: &dyn CryptoProvider,
        io: &mut dyn RecordIo,
    ) -> Result<StepEvent> {
        let msg = match self.fetch_expected(io, HandshakeType::Finished)? {
            None => return Ok(StepEvent::WantIo),
            Some(msg) => msg,
        };
        let finished = Finished::decode(&msg.payload)?;

        let suite = self.cipher_suite.ok_or(ProtocolError::InternalError)?;
        let transcript_hash = self.transcript.current_hash(provider)?;
        let key_schedule = self
            .key_schedule
            .as_mut()
            .ok_or(ProtocolError::InternalError)?;
        let server_secret = key_schedule
            .server_handshake_traffic_secret()
            .ok_or(ProtocolError::InternalError)?;
        let expected = compute_verify_data(
            provider,
            suite.hash_algorithm(),
            server_secret,
            &transcript_hash,
        )?;
        let matches: bool = expected
            .ct_eq(&finished.verify_data)
            .into();
        if !matches {
            return Err(ProtocolError::DecryptError.into());
        }

        self.transcript.update(&msg.encode()?);

        // Application secrets bind the transcript through server Finished
        let transcript_hash = self.transcript.current_hash(provider)?;
        key_schedule.derive_master_secret(provider)?;
        key_schedule.derive_application_traffic_secrets(provider, &transcript_hash)?;

        // Inbound flips to application keys immediately; outbound only
        // after our own Finished
        let server_app_secret = key_schedule
            .server_application_traffic_secret()
            .ok_or(ProtocolError::InternalError)?
            .to_vec();
        let key_schedule = self
            .key_schedule
            .as_ref()
            .ok_or(ProtocolError::InternalError)?;
        let keys = self.traffic_keys(provider, key_schedule, &server_app_secret)?;
        io.set_inbound_transform(keys)?;

        tracing::debug!("server Finished verified");

        if self.session.early_data_accepted {
            self.state = ClientState::SendEndOfEarlyData;
        } else if self.config.compat_mode {
            self.state = ClientState::CcsAfterServerFinished;
        } else {
            self.enter_client_flight(provider, io)?;
        }
        Ok(StepEvent::Progressed)
    }

    // --- outbound: client flight ----------------------------------------

    fn write_end_of_early_data(&mut self, io: &mut dyn RecordIo) -> Result<StepEvent> {
        let encoded = HandshakeMessage::new(
            HandshakeType::EndOfEarlyData,
            EndOfEarlyData.encode()?,
        )
        .encode()?;
        self.transcript.update(&encoded);
        self.send(io, encoded, ClientState::CcsAfterServerFinished)
    }

    /// Install the outbound handshake transform and pick the first message
    /// of the client flight.
    fn enter_client_flight(
        &mut self,
        provider: &dyn CryptoProvider,
        io: &mut dyn RecordIo,
    ) -> Result<()> {
        let key_schedule = self
            .key_schedule
            .as_ref()
            .ok_or(ProtocolError::InternalError)?;
        let client_secret = key_schedule
            .client_handshake_traffic_secret()
            .ok_or(ProtocolError::InternalError)?;
        let keys = self.traffic_keys(provider, key_schedule, client_secret)?;
        io.set_outbound_transform(keys)?;

        self.state = if self.client_auth {
            ClientState::SendClientCertificate
        } else {
            ClientState::SendClientFinished
        };
        Ok(())
    }

    fn write_client_certificate(&mut self, io: &mut dyn RecordIo) -> Result<StepEvent> {
        let chain = self
            .config
            .client_credentials
            .as_ref()
            .map(|c| c.certificate_chain.clone())
            .unwrap_or_default();
        let has_certificate = !chain.is_empty();
        let certificate = Certificate::new(self.certificate_request_context.clone(), chain);
        let encoded =
            HandshakeMessage::new(HandshakeType::Certificate, certificate.encode()?).encode()?;
        self.transcript.update(&encoded);

        let next = if has_certificate {
            ClientState::SendClientCertVerify
        } else {
            tracing::debug!("no client certificate available, sending empty chain");
            ClientState::SendClientFinished
        };
        self.send(io, encoded, next)
    }

    fn write_client_cert_verify(
        &mut self,
        provider: &dyn CryptoProvider,
        io: &mut dyn RecordIo,
    ) -> Result<StepEvent> {
        let credentials = self
            .config
            .client_credentials
            .as_ref()
            .ok_or(ProtocolError::InternalError)?;
        if !self
            .peer_signature_schemes
            .contains(&credentials.scheme)
        {
            return Err(ProtocolError::HandshakeFailure.into());
        }

        let transcript_hash = self.transcript.current_hash(provider)?;
        let content = CertificateVerify::signed_content(false, &transcript_hash);
        let signer = provider.signer(credentials.scheme)?;
        let signature = signer.sign(&credentials.private_key, &content)?;

        let cert_verify = CertificateVerify::new(credentials.scheme, signature);
        let encoded =
            HandshakeMessage::new(HandshakeType::CertificateVerify, cert_verify.encode()?)
                .encode()?;
        self.transcript.update(&encoded);
        self.send(io, encoded, ClientState::SendClientFinished)
    }

    fn write_client_finished(
        &mut self,
        provider: &dyn CryptoProvider,
        io: &mut dyn RecordIo,
    ) -> Result<StepEvent> {
        let suite = self.cipher_suite.ok_or(ProtocolError::InternalError)?;
        let key_schedule = self
            .key_schedule
            .as_ref()
            .ok_or(ProtocolError::InternalError)?;
        let client_secret = key_schedule
            .client_handshake_traffic_secret()
            .ok_or(ProtocolError::InternalError)?;

        let transcript_hash = self.transcript.current_hash(provider)?;
        let verify_data = compute_verify_data(
            provider,
            suite.hash_algorithm(),
            client_secret,
            &transcript_hash,
        )?;
        let encoded = HandshakeMessage::new(
            HandshakeType::Finished,
            Finished::new(verify_data).encode()?,
        )
        .encode()?;
        self.transcript.update(&encoded);
        self.send(io, encoded, ClientState::Wrapup)
    }

    fn wrapup(
        &mut self,
        provider: &dyn CryptoProvider,
        io: &mut dyn RecordIo,
    ) -> Result<StepEvent> {
        // Resumption master binds the transcript through client Finished
        let transcript_hash = self.transcript.current_hash(provider)?;
        let key_schedule = self
            .key_schedule
            .as_mut()
            .ok_or(ProtocolError::InternalError)?;
        key_schedule.derive_resumption_master_secret(provider, &transcript_hash)?;
        self.session.resumption_master_secret = key_schedule
            .resumption_master_secret()
            .map(|s| Zeroizing::new(s.to_vec()));

        let key_schedule = self
            .key_schedule
            .as_ref()
            .ok_or(ProtocolError::InternalError)?;
        let client_app_secret = key_schedule
            .client_application_traffic_secret()
            .ok_or(ProtocolError::InternalError)?;
        let keys = self.traffic_keys(provider, key_schedule, client_app_secret)?;
        io.set_outbound_transform(keys)?;

        self.session.version = Some(ProtocolVersion::Tls13);
        self.state = ClientState::Connected;
        tracing::info!("handshake complete");
        Ok(StepEvent::HandshakeOver)
    }

    // --- post-handshake -------------------------------------------------

    fn process_post_handshake(
        &mut self,
        provider: &dyn CryptoProvider,
        io: &mut dyn RecordIo,
    ) -> Result<StepEvent> {
        let msg = match io.fetch_handshake_message()? {
            None => return Ok(StepEvent::WantIo),
            Some(msg) => msg,
        };
        match msg.msg_type {
            HandshakeType::NewSessionTicket => {
                self.process_new_session_ticket(provider, &msg)?;
                Ok(StepEvent::NewSessionTicket)
            },
            other => {
                tracing::warn!("unhandled post-handshake message {:?}", other);
                Err(ProtocolError::UnexpectedMessage.into())
            },
        }
    }

    fn process_new_session_ticket(
        &mut self,
        provider: &dyn CryptoProvider,
        msg: &HandshakeMessage,
    ) -> Result<()> {
        let ticket = NewSessionTicket::decode(&msg.payload)?;

        self.received_extensions = ExtensionMask::NONE;
        let mut allows_early_data = false;
        for ext in ticket.extensions.iter() {
            let disposition = check_received_extension(
                ExtensionContext::NewSessionTicket,
                ext.ext_type,
                &mut self.received_extensions,
            )?;
            if let ExtensionDisposition::Parse(ExtensionType::EarlyData) = disposition {
                let max = parse_early_data_new_session_ticket(&ext.data)?;
                tracing::debug!("ticket allows {} bytes of early data", max);
                allows_early_data = true;
            }
        }

        let suite = self.cipher_suite.ok_or(ProtocolError::InternalError)?;
        let resumption_master = self
            .session
            .resumption_master_secret
            .as_ref()
            .ok_or(ProtocolError::InternalError)?;
        let resumption_key = derive_resumption_psk(
            provider,
            suite.hash_algorithm(),
            resumption_master,
            &ticket.ticket_nonce,
        )?;

        let mut flags = TicketFlags::from_modes(&self.config.key_exchange_modes);
        if allows_early_data {
            flags = flags.union(TicketFlags::ALLOW_EARLY_DATA);
        }

        // Any prior ticket is superseded
        self.session.ticket = Some(ticket.ticket);
        self.session.ticket_lifetime = ticket.ticket_lifetime;
        self.session.ticket_age_add = ticket.ticket_age_add;
        self.session.ticket_received = self.config.clock.as_ref().map(|c| c.now_secs());
        self.session.ticket_flags = flags;
        self.session.resumption_key = Some(resumption_key);
        tracing::debug!(
            "session ticket stored (lifetime {} s)",
            ticket.ticket_lifetime
        );
        Ok(())
    }
}
