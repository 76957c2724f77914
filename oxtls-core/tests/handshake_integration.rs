//! Full-handshake integration tests against the scripted server.

mod common;

use common::*;
use oxtls_core::cipher::CipherSuite;
use oxtls_core::config::{ClientCredentials, KeyExchangeModes};
use oxtls_core::extensions::{Extension, Extensions};
use oxtls_core::protocol::ExtensionType;
use oxtls_core::{ClientConnection, ClientState, StepEvent};
use oxtls_crypto::{CryptoProvider, SignatureScheme};
use oxtls_crypto_rustcrypto::{ed25519_public_key, RustCryptoProvider};
use zeroize::Zeroizing;

/// Drive a complete certificate-authenticated handshake; returns the io
/// and server sim for post-handshake assertions.
fn complete_handshake(
    config: &oxtls_core::ClientConfig,
) -> (ClientConnection<'_>, TestIo, ServerSim) {
    let provider = RustCryptoProvider::new();
    let mut conn = ClientConnection::new(config);
    let mut io = TestIo::new();
    let mut server = ServerSim::new(CipherSuite::Aes128GcmSha256);

    // ClientHello out
    assert_eq!(conn.step(&provider, &mut io).unwrap(), StepEvent::Progressed);
    assert_eq!(conn.state(), ClientState::WaitServerHello);
    let ch_raw = io.sent_raw[0].clone();

    // Server flight in
    let sh = server.server_hello(&ch_raw, None);
    io.push_inbound(sh);
    let ee = server.encrypted_extensions(Extensions::new());
    io.push_inbound(ee);
    let cert = server.certificate();
    io.push_inbound(cert);
    let cv = server.certificate_verify();
    io.push_inbound(cv);
    let fin = server.finished();
    io.push_inbound(fin);

    // Client runs to completion
    let event = run_until(&mut conn, &provider, &mut io, |e| {
        e == StepEvent::HandshakeOver
    });
    assert_eq!(event, StepEvent::HandshakeOver);
    assert!(conn.is_connected());

    // The client's flight ends with its Finished; check it against the
    // mirrored schedule (absorbing any client certificate first)
    let client_msgs: Vec<_> = io.sent_raw[1..].to_vec();
    for raw in &client_msgs[..client_msgs.len() - 1] {
        server.absorb(raw);
    }
    let client_finished = io.last_sent().clone();
    server.expect_client_finished(&client_finished);

    (conn, io, server)
}

#[test]
fn test_full_handshake_reaches_connected() {
    let config = test_config().build().unwrap();
    let (conn, io, _server) = complete_handshake(&config);

    // Transforms: handshake inbound, application inbound, handshake
    // outbound, application outbound
    assert_eq!(io.inbound_transforms.len(), 2);
    assert_eq!(io.outbound_transforms.len(), 2);
    assert!(io.alerts.is_empty());
    assert_eq!(io.ccs_writes, 0);

    let session = conn.session();
    assert_eq!(session.version, Some(oxtls_core::ProtocolVersion::Tls13));
    assert_eq!(session.cipher_suite, Some(CipherSuite::Aes128GcmSha256));
    let resumption = session.resumption_master_secret.as_ref().unwrap();
    assert_eq!(resumption.len(), 32);
    assert!(resumption.iter().any(|&b| b != 0));
}

#[test]
fn test_client_hello_shape() {
    let config = test_config()
        .with_alpn_protocols(&["h2", "http/1.1"])
        .build()
        .unwrap();
    let provider = RustCryptoProvider::new();
    let mut conn = ClientConnection::new(&config);
    let mut io = TestIo::new();
    conn.step(&provider, &mut io).unwrap();

    let msg = io.last_sent();
    assert_eq!(msg.msg_type, oxtls_core::HandshakeType::ClientHello);
    let hello = oxtls_core::messages::ClientHello::decode(&msg.payload).unwrap();

    assert!(hello.legacy_session_id.is_empty());
    assert!(extension_data(&hello, ExtensionType::SupportedVersions).is_some());
    assert!(extension_data(&hello, ExtensionType::SupportedGroups).is_some());
    assert!(extension_data(&hello, ExtensionType::SignatureAlgorithms).is_some());
    assert!(extension_data(&hello, ExtensionType::ServerName).is_some());
    assert!(
        extension_data(&hello, ExtensionType::ApplicationLayerProtocolNegotiation).is_some()
    );
    let (group, key) = client_key_share(&hello).unwrap();
    assert_eq!(group, 0x001D, "x25519 preferred");
    assert_eq!(key.len(), 32);
    // No PSK configured: no pre_shared_key, but the enabled psk_dhe_ke
    // mode is still advertised for future tickets
    assert!(extension_data(&hello, ExtensionType::PreSharedKey).is_none());
    assert_eq!(
        extension_data(&hello, ExtensionType::PskKeyExchangeModes).unwrap(),
        vec![0x01, 0x01]
    );
}

#[test]
fn test_compat_mode_emits_ccs_and_session_id() {
    let config = test_config().with_compat_mode(true).build().unwrap();
    let provider = RustCryptoProvider::new();
    let mut conn = ClientConnection::new(&config);
    let mut io = TestIo::new();
    let mut server = ServerSim::new(CipherSuite::Aes128GcmSha256);

    conn.step(&provider, &mut io).unwrap();
    let ch_raw = io.sent_raw[0].clone();
    let hello = {
        let msg = oxtls_core::messages::HandshakeMessage::decode(&ch_raw).unwrap();
        oxtls_core::messages::ClientHello::decode(&msg.payload).unwrap()
    };
    assert_eq!(hello.legacy_session_id.len(), 32);

    let sh = server.server_hello(&ch_raw, None);
    io.push_inbound(sh);
    io.push_inbound(server.encrypted_extensions(Extensions::new()));
    io.push_inbound(server.certificate());
    io.push_inbound(server.certificate_verify());
    io.push_inbound(server.finished());

    let event = run_until(&mut conn, &provider, &mut io, |e| {
        e == StepEvent::HandshakeOver
    });
    assert_eq!(event, StepEvent::HandshakeOver);
    // One dummy CCS after the server Finished (no HRR in this run)
    assert_eq!(io.ccs_writes, 1);
}

#[test]
fn test_client_authentication() {
    let client_seed = [0x77u8; 32];
    let client_cert = ed25519_public_key(&client_seed).unwrap();
    let config = test_config()
        .with_client_credentials(ClientCredentials {
            certificate_chain: vec![client_cert.clone()],
            private_key: Zeroizing::new(client_seed.to_vec()),
            scheme: SignatureScheme::Ed25519,
        })
        .build()
        .unwrap();

    let provider = RustCryptoProvider::new();
    let mut conn = ClientConnection::new(&config);
    let mut io = TestIo::new();
    let mut server = ServerSim::new(CipherSuite::Aes128GcmSha256);

    conn.step(&provider, &mut io).unwrap();
    let ch_raw = io.sent_raw[0].clone();

    io.push_inbound(server.server_hello(&ch_raw, None));
    io.push_inbound(server.encrypted_extensions(Extensions::new()));

    // CertificateRequest with signature_algorithms listing ed25519
    let mut cr_exts = Extensions::new();
    cr_exts.add(Extension::new(
        ExtensionType::SignatureAlgorithms,
        vec![0x00, 0x02, 0x08, 0x07],
    ));
    let cr_body = {
        use bytes::BytesMut;
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x04, 0xAA, 0xBB, 0xCC, 0xDD]); // context
        cr_exts.encode_into(&mut buf).unwrap();
        buf.to_vec()
    };
    let cr = hs_msg(oxtls_core::HandshakeType::CertificateRequest, cr_body);
    server.absorb(&cr.encode().unwrap());
    io.push_inbound(cr);

    io.push_inbound(server.certificate());
    io.push_inbound(server.certificate_verify());
    io.push_inbound(server.finished());

    let event = run_until(&mut conn, &provider, &mut io, |e| {
        e == StepEvent::HandshakeOver
    });
    assert_eq!(event, StepEvent::HandshakeOver);

    // Client flight: Certificate, CertificateVerify, Finished
    let types: Vec<_> = io.sent[1..].iter().map(|m| m.msg_type).collect();
    assert_eq!(
        types,
        vec![
            oxtls_core::HandshakeType::Certificate,
            oxtls_core::HandshakeType::CertificateVerify,
            oxtls_core::HandshakeType::Finished,
        ]
    );

    // The client Certificate echoes the request context and carries the
    // configured chain
    let client_cert_msg =
        oxtls_core::messages::Certificate::decode(&io.sent[1].payload).unwrap();
    assert_eq!(
        client_cert_msg.certificate_request_context,
        vec![0xAA, 0xBB, 0xCC, 0xDD]
    );
    assert_eq!(client_cert_msg.chain(), vec![client_cert.clone()]);

    // And its CertificateVerify checks out against the client public key
    let cv = oxtls_core::messages::CertificateVerify::decode(&io.sent[2].payload).unwrap();
    let mut transcript = server.transcript.clone();
    // Mirror: everything up to (excluding) the client CertificateVerify
    for raw in &io.sent_raw[1..2] {
        transcript.update(raw);
    }
    let hash = transcript.current_hash(&server.provider).unwrap();
    let content =
        oxtls_core::messages::CertificateVerify::signed_content(false, &hash);
    let signer = server.provider.signer(SignatureScheme::Ed25519).unwrap();
    signer.verify(&client_cert, &content, &cv.signature).unwrap();

    server.absorb(&io.sent_raw[1]);
    server.absorb(&io.sent_raw[2]);
    server.expect_client_finished(&io.sent[3].clone());
}

#[test]
fn test_want_write_resends_same_bytes() {
    let config = test_config().build().unwrap();
    let provider = RustCryptoProvider::new();
    let mut conn = ClientConnection::new(&config);
    let mut io = TestIo::new();
    io.refuse_sends = 1;

    assert_eq!(conn.step(&provider, &mut io).unwrap(), StepEvent::WantIo);
    assert!(io.sent.is_empty());

    // The retried step delivers the identical ClientHello
    assert_eq!(conn.step(&provider, &mut io).unwrap(), StepEvent::Progressed);
    assert_eq!(io.sent.len(), 1);
    assert_eq!(conn.state(), ClientState::WaitServerHello);
}

#[test]
fn test_want_read_reports_want_io() {
    let config = test_config().build().unwrap();
    let provider = RustCryptoProvider::new();
    let mut conn = ClientConnection::new(&config);
    let mut io = TestIo::new();

    conn.step(&provider, &mut io).unwrap();
    // No ServerHello queued yet
    assert_eq!(conn.step(&provider, &mut io).unwrap(), StepEvent::WantIo);
    assert_eq!(conn.state(), ClientState::WaitServerHello);
}

#[test]
fn test_mode_neither_psk_nor_key_share_is_handshake_failure() {
    let config = test_config().build().unwrap();
    let provider = RustCryptoProvider::new();
    let mut conn = ClientConnection::new(&config);
    let mut io = TestIo::new();

    conn.step(&provider, &mut io).unwrap();
    let msg = oxtls_core::messages::HandshakeMessage::decode(&io.sent_raw[0]).unwrap();
    let hello = oxtls_core::messages::ClientHello::decode(&msg.payload).unwrap();

    // supported_versions alone: no key exchange material at all
    let body = server_hello_body(
        [0x33; 32],
        &hello.legacy_session_id,
        CipherSuite::Aes128GcmSha256.to_u16(),
        &extensions(vec![ext_supported_versions_sh()]),
    );
    io.push_inbound(hs_msg(oxtls_core::HandshakeType::ServerHello, body));

    let err = conn.step(&provider, &mut io).unwrap_err();
    assert!(matches!(
        err,
        oxtls_core::Error::ProtocolError(oxtls_core::error::ProtocolError::HandshakeFailure)
    ));
}

#[test]
fn test_mode_psk_only_rejected_when_pure_psk_disabled() {
    // psk_dhe_ke enabled, psk_ke disabled: a ServerHello that takes the
    // PSK but drops the key share fails the mode filter
    let mut ticket = oxtls_core::psk::StoredTicket {
        ticket: b"t".to_vec(),
        psk: Zeroizing::new(vec![0x42; 32]),
        cipher_suite: CipherSuite::Aes128GcmSha256,
        received_at: None,
        lifetime: 7200,
        age_add: 0,
        flags: oxtls_core::psk::TicketFlags::ALLOW_PSK_EPHEMERAL,
    };
    ticket.flags = ticket
        .flags
        .union(oxtls_core::psk::TicketFlags::ALLOW_PSK);
    let config = test_config()
        .with_ticket(ticket)
        .with_clock(None)
        .build()
        .unwrap();

    let provider = RustCryptoProvider::new();
    let mut conn = ClientConnection::new(&config);
    let mut io = TestIo::new();

    conn.step(&provider, &mut io).unwrap();
    let msg = oxtls_core::messages::HandshakeMessage::decode(&io.sent_raw[0]).unwrap();
    let hello = oxtls_core::messages::ClientHello::decode(&msg.payload).unwrap();

    let body = server_hello_body(
        [0x33; 32],
        &hello.legacy_session_id,
        CipherSuite::Aes128GcmSha256.to_u16(),
        &extensions(vec![
            ext_supported_versions_sh(),
            ext_pre_shared_key_sh(0),
        ]),
    );
    io.push_inbound(hs_msg(oxtls_core::HandshakeType::ServerHello, body));

    let err = conn.step(&provider, &mut io).unwrap_err();
    assert!(matches!(
        err,
        oxtls_core::Error::ProtocolError(oxtls_core::error::ProtocolError::HandshakeFailure)
    ));
}

#[test]
fn test_mode_filter_rejects_psk_ephemeral_when_disabled() {
    // Pure-PSK and plain-ephemeral modes enabled, psk_dhe_ke disabled:
    // the client still offers both a key share and a PSK, so a server
    // taking both at once must fail the mode filter.
    let ticket = oxtls_core::psk::StoredTicket {
        ticket: b"t".to_vec(),
        psk: Zeroizing::new(vec![0x42; 32]),
        cipher_suite: CipherSuite::Aes128GcmSha256,
        received_at: None,
        lifetime: 7200,
        age_add: 0,
        flags: oxtls_core::psk::TicketFlags::ALLOW_PSK,
    };
    let config = test_config()
        .with_key_exchange_modes(KeyExchangeModes {
            psk: true,
            psk_ephemeral: false,
            ephemeral: true,
        })
        .with_ticket(ticket)
        .with_clock(None)
        .build()
        .unwrap();
    let provider = RustCryptoProvider::new();
    let mut conn = ClientConnection::new(&config);
    let mut io = TestIo::new();
    let mut server = ServerSim::new(CipherSuite::Aes128GcmSha256);

    conn.step(&provider, &mut io).unwrap();
    let ch_raw = io.sent_raw[0].clone();
    io.push_inbound(server.server_hello(&ch_raw, Some((0, &[0x42; 32]))));

    let err = conn.step(&provider, &mut io).unwrap_err();
    assert!(matches!(
        err,
        oxtls_core::Error::ProtocolError(oxtls_core::error::ProtocolError::HandshakeFailure)
    ));
    assert_eq!(
        io.alerts,
        vec![oxtls_core::error::AlertDescription::HandshakeFailure]
    );
    assert_eq!(conn.state(), ClientState::Failed);
}
