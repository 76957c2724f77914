//! Shared test harness: an in-memory record layer and a minimal scripted
//! server built on the crate's own key schedule.

// Each integration-test binary uses its own subset of these helpers.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use oxtls_core::cipher::CipherSuite;
use oxtls_core::config::{CertificateVerifier, ClientConfig, ClientConfigBuilder};
use oxtls_core::error::{AlertDescription, Error, Result};
use oxtls_core::extensions::{Extension, Extensions};
use oxtls_core::key_schedule::KeySchedule;
use oxtls_core::messages::{ClientHello, HandshakeMessage};
use oxtls_core::protocol::{ExtensionType, HandshakeType};
use oxtls_core::record::{RecordIo, TrafficKeys};
use oxtls_core::transcript::{compute_verify_data, TranscriptHash};
use oxtls_crypto::{CryptoProvider, NamedGroup, SignatureScheme};
use oxtls_crypto_rustcrypto::{ed25519_public_key, RustCryptoProvider};

/// Scripted in-memory record layer.
///
/// Inbound messages are queued by the test; everything the client sends,
/// installs or pends is recorded for assertions.
#[derive(Default)]
pub struct TestIo {
    pub inbound: VecDeque<HandshakeMessage>,
    pub sent: Vec<HandshakeMessage>,
    pub sent_raw: Vec<Vec<u8>>,
    pub inbound_transforms: Vec<TrafficKeys>,
    pub outbound_transforms: Vec<TrafficKeys>,
    pub ccs_writes: usize,
    pub alerts: Vec<AlertDescription>,
    /// Number of sends to refuse (want-write) before accepting.
    pub refuse_sends: usize,
}

impl TestIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_inbound(&mut self, msg: HandshakeMessage) {
        self.inbound.push_back(msg);
    }

    pub fn last_sent(&self) -> &HandshakeMessage {
        self.sent.last().expect("nothing was sent")
    }
}

impl RecordIo for TestIo {
    fn fetch_handshake_message(&mut self) -> Result<Option<HandshakeMessage>> {
        Ok(self.inbound.pop_front())
    }

    fn send_handshake_message(&mut self, encoded: &[u8]) -> Result<bool> {
        if self.refuse_sends > 0 {
            self.refuse_sends -= 1;
            return Ok(false);
        }
        self.sent_raw.push(encoded.to_vec());
        self.sent.push(HandshakeMessage::decode(encoded)?);
        Ok(true)
    }

    fn set_inbound_transform(&mut self, keys: TrafficKeys) -> Result<()> {
        self.inbound_transforms.push(keys);
        Ok(())
    }

    fn set_outbound_transform(&mut self, keys: TrafficKeys) -> Result<()> {
        self.outbound_transforms.push(keys);
        Ok(())
    }

    fn write_change_cipher_spec(&mut self) -> Result<()> {
        self.ccs_writes += 1;
        Ok(())
    }

    fn pend_fatal_alert(&mut self, alert: AlertDescription) {
        self.alerts.push(alert);
    }
}

/// Clock pinned to a fixed instant.
pub struct FixedClock(pub u64);

impl oxtls_core::config::Clock for FixedClock {
    fn now_secs(&self) -> u64 {
        self.0
    }
}

/// Verifier that accepts a chain whose leaf equals the expected blob and
/// checks CertificateVerify with Ed25519.
pub struct TestVerifier {
    pub expected_leaf: Vec<u8>,
}

impl CertificateVerifier for TestVerifier {
    fn verify_chain(&self, chain: &[Vec<u8>], _server_name: Option<&str>) -> Result<()> {
        if chain.first().map(|c| c.as_slice()) == Some(self.expected_leaf.as_slice()) {
            Ok(())
        } else {
            Err(Error::CryptoError("unexpected certificate chain".into()))
        }
    }

    fn verify_signature(
        &self,
        leaf_certificate: &[u8],
        scheme: SignatureScheme,
        message: &[u8],
        signature: &[u8],
    ) -> Result<()> {
        let provider = RustCryptoProvider::new();
        let signer = provider.signer(scheme)?;
        signer.verify(leaf_certificate, message, signature)?;
        Ok(())
    }
}

/// Fixed Ed25519 seed for the simulated server's credential.
pub const SERVER_KEY_SEED: [u8; 32] = [0x51; 32];

/// The simulated server's "certificate": the raw Ed25519 public key,
/// interpreted by [`TestVerifier`].
pub fn server_leaf_certificate() -> Vec<u8> {
    ed25519_public_key(&SERVER_KEY_SEED).unwrap()
}

/// Client config wired for the simulated server.
pub fn test_config() -> ClientConfigBuilder {
    ClientConfig::builder()
        .with_server_name("test.example")
        .with_certificate_verifier(Arc::new(TestVerifier {
            expected_leaf: server_leaf_certificate(),
        }))
}

/// Raw extension data from a decoded ClientHello.
pub fn extension_data(hello: &ClientHello, ext: ExtensionType) -> Option<Vec<u8>> {
    hello.extensions.get(ext).map(|e| e.data.clone())
}

/// First key-share entry offered by the ClientHello: (group, public key).
pub fn client_key_share(hello: &ClientHello) -> Option<(u16, Vec<u8>)> {
    let data = extension_data(hello, ExtensionType::KeyShare)?;
    // KeyShareClientHello: <list len u16> <group u16> <key len u16> <key>
    let group = u16::from_be_bytes([data[2], data[3]]);
    let key_len = u16::from_be_bytes([data[4], data[5]]) as usize;
    Some((group, data[6..6 + key_len].to_vec()))
}

/// Build a ServerHello-shaped body.
pub fn server_hello_body(
    random: [u8; 32],
    session_id_echo: &[u8],
    cipher_suite: u16,
    extensions: &Extensions,
) -> Vec<u8> {
    use bytes::{BufMut, BytesMut};
    let mut buf = BytesMut::new();
    buf.put_u16(0x0303);
    buf.put_slice(&random);
    buf.put_u8(session_id_echo.len() as u8);
    buf.put_slice(session_id_echo);
    buf.put_u16(cipher_suite);
    buf.put_u8(0);
    extensions.encode_into(&mut buf).unwrap();
    buf.to_vec()
}

/// supported_versions(0x0304) in its ServerHello shape.
pub fn ext_supported_versions_sh() -> Extension {
    Extension::new(ExtensionType::SupportedVersions, vec![0x03, 0x04])
}

/// key_share in its ServerHello shape.
pub fn ext_key_share_sh(group: u16, public_key: &[u8]) -> Extension {
    let mut data = Vec::new();
    data.extend_from_slice(&group.to_be_bytes());
    data.extend_from_slice(&(public_key.len() as u16).to_be_bytes());
    data.extend_from_slice(public_key);
    Extension::new(ExtensionType::KeyShare, data)
}

/// key_share in its HelloRetryRequest shape.
pub fn ext_key_share_hrr(group: u16) -> Extension {
    Extension::new(ExtensionType::KeyShare, group.to_be_bytes().to_vec())
}

/// pre_shared_key in its ServerHello shape.
pub fn ext_pre_shared_key_sh(selected_identity: u16) -> Extension {
    Extension::new(
        ExtensionType::PreSharedKey,
        selected_identity.to_be_bytes().to_vec(),
    )
}

/// cookie extension for a HelloRetryRequest.
pub fn ext_cookie(cookie: &[u8]) -> Extension {
    let mut data = Vec::new();
    data.extend_from_slice(&(cookie.len() as u16).to_be_bytes());
    data.extend_from_slice(cookie);
    Extension::new(ExtensionType::Cookie, data)
}

/// Extensions container from a list.
pub fn extensions(list: Vec<Extension>) -> Extensions {
    let mut exts = Extensions::new();
    for ext in list {
        exts.add(ext);
    }
    exts
}

/// Frame a handshake message body.
pub fn hs_msg(msg_type: HandshakeType, body: Vec<u8>) -> HandshakeMessage {
    HandshakeMessage::new(msg_type, body)
}

/// Minimal scripted TLS 1.3 server: mirrors the transcript and key
/// schedule so Finished and CertificateVerify values genuinely verify.
pub struct ServerSim {
    pub provider: RustCryptoProvider,
    pub suite: CipherSuite,
    pub transcript: TranscriptHash,
    pub key_schedule: KeySchedule,
    pub server_random: [u8; 32],
}

impl ServerSim {
    pub fn new(suite: CipherSuite) -> Self {
        Self {
            provider: RustCryptoProvider::new(),
            suite,
            transcript: TranscriptHash::new(suite.hash_algorithm()),
            key_schedule: KeySchedule::new(suite),
            server_random: [0x5A; 32],
        }
    }

    /// Absorb raw handshake-message bytes into the mirrored transcript.
    pub fn absorb(&mut self, raw: &[u8]) {
        self.transcript.update(raw);
    }

    /// Answer a ClientHello with a ServerHello carrying our key share
    /// (and optionally a selected PSK), deriving the handshake secrets on
    /// the way.
    pub fn server_hello(
        &mut self,
        client_hello_raw: &[u8],
        psk: Option<(u16, &[u8])>,
    ) -> HandshakeMessage {
        let parsed = HandshakeMessage::decode(client_hello_raw).unwrap();
        let hello = ClientHello::decode(&parsed.payload).unwrap();
        let (group_raw, client_public) = client_key_share(&hello).unwrap();
        let group = NamedGroup::from_u16(group_raw).unwrap();

        let kex = self.provider.key_exchange(group).unwrap();
        let (server_private, server_public) = kex.generate_keypair().unwrap();
        let shared = kex.exchange(&server_private, &client_public).unwrap();

        let mut exts = vec![
            ext_supported_versions_sh(),
            ext_key_share_sh(group_raw, server_public.as_bytes()),
        ];
        if let Some((index, _)) = psk {
            exts.push(ext_pre_shared_key_sh(index));
        }
        let body = server_hello_body(
            self.server_random,
            &hello.legacy_session_id,
            self.suite.to_u16(),
            &extensions(exts),
        );
        let msg = hs_msg(HandshakeType::ServerHello, body);

        self.absorb(client_hello_raw);
        self.absorb(&msg.encode().unwrap());

        let psk_secret = psk.map(|(_, s)| s.to_vec()).unwrap_or_default();
        self.key_schedule
            .init_early_secret(&self.provider, &psk_secret)
            .unwrap();
        self.key_schedule
            .derive_handshake_secret(&self.provider, shared.as_bytes())
            .unwrap();
        let hash = self.transcript.current_hash(&self.provider).unwrap();
        self.key_schedule
            .derive_handshake_traffic_secrets(&self.provider, &hash)
            .unwrap();
        msg
    }

    /// ServerHello for pure-PSK key exchange: selected identity, no key
    /// share.
    pub fn server_hello_psk_only(
        &mut self,
        client_hello_raw: &[u8],
        selected_identity: u16,
        psk_secret: &[u8],
    ) -> HandshakeMessage {
        let parsed = HandshakeMessage::decode(client_hello_raw).unwrap();
        let hello = ClientHello::decode(&parsed.payload).unwrap();

        let exts = vec![
            ext_supported_versions_sh(),
            ext_pre_shared_key_sh(selected_identity),
        ];
        let body = server_hello_body(
            self.server_random,
            &hello.legacy_session_id,
            self.suite.to_u16(),
            &extensions(exts),
        );
        let msg = hs_msg(HandshakeType::ServerHello, body);

        self.absorb(client_hello_raw);
        self.absorb(&msg.encode().unwrap());

        self.key_schedule
            .init_early_secret(&self.provider, psk_secret)
            .unwrap();
        let zeros = vec![0u8; self.suite.hash_algorithm().output_size()];
        self.key_schedule
            .derive_handshake_secret(&self.provider, &zeros)
            .unwrap();
        let hash = self.transcript.current_hash(&self.provider).unwrap();
        self.key_schedule
            .derive_handshake_traffic_secrets(&self.provider, &hash)
            .unwrap();
        msg
    }

    /// EncryptedExtensions with the given extensions, absorbed.
    pub fn encrypted_extensions(&mut self, exts: Extensions) -> HandshakeMessage {
        use bytes::BytesMut;
        let mut buf = BytesMut::new();
        exts.encode_into(&mut buf).unwrap();
        let msg = hs_msg(HandshakeType::EncryptedExtensions, buf.to_vec());
        self.absorb(&msg.encode().unwrap());
        msg
    }

    /// Server Certificate carrying the simulated leaf.
    pub fn certificate(&mut self) -> HandshakeMessage {
        let certificate =
            oxtls_core::messages::Certificate::new(Vec::new(), vec![server_leaf_certificate()]);
        let msg = hs_msg(HandshakeType::Certificate, certificate.encode().unwrap());
        self.absorb(&msg.encode().unwrap());
        msg
    }

    /// CertificateVerify signed over the mirrored transcript.
    pub fn certificate_verify(&mut self) -> HandshakeMessage {
        use oxtls_core::messages::CertificateVerify;
        let hash = self.transcript.current_hash(&self.provider).unwrap();
        let content = CertificateVerify::signed_content(true, &hash);
        let signer = self.provider.signer(SignatureScheme::Ed25519).unwrap();
        let signature = signer.sign(&SERVER_KEY_SEED, &content).unwrap();
        let cert_verify = CertificateVerify::new(SignatureScheme::Ed25519, signature);
        let msg = hs_msg(HandshakeType::CertificateVerify, cert_verify.encode().unwrap());
        self.absorb(&msg.encode().unwrap());
        msg
    }

    /// Server Finished over the mirrored transcript; also derives the
    /// application secrets like a real server would.
    pub fn finished(&mut self) -> HandshakeMessage {
        let hash = self.transcript.current_hash(&self.provider).unwrap();
        let secret = self
            .key_schedule
            .server_handshake_traffic_secret()
            .unwrap()
            .to_vec();
        let verify_data =
            compute_verify_data(&self.provider, self.suite.hash_algorithm(), &secret, &hash)
                .unwrap();
        let msg = hs_msg(HandshakeType::Finished, verify_data);
        self.absorb(&msg.encode().unwrap());

        let hash = self.transcript.current_hash(&self.provider).unwrap();
        self.key_schedule.derive_master_secret(&self.provider).unwrap();
        self.key_schedule
            .derive_application_traffic_secrets(&self.provider, &hash)
            .unwrap();
        msg
    }

    /// Check the client's Finished against the mirrored transcript.
    ///
    /// The mirrored transcript must not yet contain the client Finished.
    pub fn expect_client_finished(&mut self, client_finished: &HandshakeMessage) {
        let hash = self.transcript.current_hash(&self.provider).unwrap();
        let secret = self
            .key_schedule
            .client_handshake_traffic_secret()
            .unwrap()
            .to_vec();
        let expected =
            compute_verify_data(&self.provider, self.suite.hash_algorithm(), &secret, &hash)
                .unwrap();
        assert_eq!(client_finished.payload, expected, "client Finished mismatch");
        self.absorb(&client_finished.encode().unwrap());
    }
}

/// Drive `step()` until it stops making progress or the predicate hits.
pub fn run_until<F>(
    conn: &mut oxtls_core::ClientConnection<'_>,
    provider: &dyn CryptoProvider,
    io: &mut TestIo,
    mut stop: F,
) -> oxtls_core::StepEvent
where
    F: FnMut(oxtls_core::StepEvent) -> bool,
{
    loop {
        let event = conn.step(provider, io).expect("handshake step failed");
        if stop(event) || event == oxtls_core::StepEvent::WantIo {
            return event;
        }
    }
}
