//! HelloRetryRequest flows: cookie echo, key-share regeneration, the
//! one-retry limit, and transcript reset.

mod common;

use common::*;
use oxtls_core::cipher::CipherSuite;
use oxtls_core::error::{AlertDescription, ProtocolError};
use oxtls_core::extensions::Extensions;
use oxtls_core::messages::{ClientHello, HandshakeMessage, HELLO_RETRY_REQUEST_RANDOM};
use oxtls_core::protocol::{ExtensionType, HandshakeType};
use oxtls_core::{ClientConnection, ClientState, Error, StepEvent};
use oxtls_crypto_rustcrypto::RustCryptoProvider;

fn hrr_message(session_id_echo: &[u8], exts: Extensions) -> HandshakeMessage {
    let body = server_hello_body(
        HELLO_RETRY_REQUEST_RANDOM,
        session_id_echo,
        CipherSuite::Aes128GcmSha256.to_u16(),
        &exts,
    );
    hs_msg(HandshakeType::ServerHello, body)
}

fn decode_client_hello(raw: &[u8]) -> ClientHello {
    let msg = HandshakeMessage::decode(raw).unwrap();
    ClientHello::decode(&msg.payload).unwrap()
}

#[test]
fn test_hrr_full_handshake_with_group_switch_and_cookie() {
    let config = test_config().build().unwrap();
    let provider = RustCryptoProvider::new();
    let mut conn = ClientConnection::new(&config);
    let mut io = TestIo::new();

    conn.step(&provider, &mut io).unwrap();
    let ch1_raw = io.sent_raw[0].clone();
    let ch1 = decode_client_hello(&ch1_raw);
    let (group1, key1) = client_key_share(&ch1).unwrap();
    assert_eq!(group1, 0x001D);

    let cookie = vec![0xC0, 0x0C, 0x1E, 0x55];
    let hrr = hrr_message(
        &ch1.legacy_session_id,
        extensions(vec![
            ext_supported_versions_sh(),
            ext_key_share_hrr(0x0017),
            ext_cookie(&cookie),
        ]),
    );
    let hrr_raw = hrr.encode().unwrap();
    io.push_inbound(hrr);

    // HRR absorbed, second ClientHello out
    conn.step(&provider, &mut io).unwrap();
    assert_eq!(conn.state(), ClientState::Start);
    conn.step(&provider, &mut io).unwrap();
    assert_eq!(conn.state(), ClientState::WaitServerHello);

    let ch2_raw = io.sent_raw[1].clone();
    let ch2 = decode_client_hello(&ch2_raw);

    // Cookie echoed byte-exactly
    let cookie_ext = extension_data(&ch2, ExtensionType::Cookie).unwrap();
    assert_eq!(&cookie_ext[2..], cookie.as_slice());
    assert_eq!(
        u16::from_be_bytes([cookie_ext[0], cookie_ext[1]]) as usize,
        cookie.len()
    );

    // New share for the selected group, different from the first
    let (group2, key2) = client_key_share(&ch2).unwrap();
    assert_eq!(group2, 0x0017);
    assert_ne!(key1, key2);

    // Server side mirrors the RFC 8446 4.4.1 transcript reset and the
    // handshake completes, proving both sides agree on the transcript
    let mut server = ServerSim::new(CipherSuite::Aes128GcmSha256);
    server.transcript.update(&ch1_raw);
    server
        .transcript
        .reset_for_hello_retry(&server.provider)
        .unwrap();
    server.transcript.update(&hrr_raw);

    io.push_inbound(server.server_hello(&ch2_raw, None));
    io.push_inbound(server.encrypted_extensions(Extensions::new()));
    io.push_inbound(server.certificate());
    io.push_inbound(server.certificate_verify());
    io.push_inbound(server.finished());

    let event = run_until(&mut conn, &provider, &mut io, |e| {
        e == StepEvent::HandshakeOver
    });
    assert_eq!(event, StepEvent::HandshakeOver);

    let client_finished = io.last_sent().clone();
    server.expect_client_finished(&client_finished);
}

#[test]
fn test_second_hrr_is_fatal() {
    let config = test_config().build().unwrap();
    let provider = RustCryptoProvider::new();
    let mut conn = ClientConnection::new(&config);
    let mut io = TestIo::new();

    conn.step(&provider, &mut io).unwrap();
    let ch1 = decode_client_hello(&io.sent_raw[0].clone());

    let hrr = |echo: &[u8]| {
        hrr_message(
            echo,
            extensions(vec![
                ext_supported_versions_sh(),
                ext_key_share_hrr(0x0017),
            ]),
        )
    };
    io.push_inbound(hrr(&ch1.legacy_session_id));
    conn.step(&provider, &mut io).unwrap();
    conn.step(&provider, &mut io).unwrap(); // second ClientHello

    io.push_inbound(hrr(&ch1.legacy_session_id));
    let err = conn.step(&provider, &mut io).unwrap_err();
    assert!(matches!(
        err,
        Error::ProtocolError(ProtocolError::UnexpectedMessage)
    ));
    assert_eq!(io.alerts, vec![AlertDescription::UnexpectedMessage]);
    assert_eq!(conn.state(), ClientState::Failed);
}

#[test]
fn test_hrr_without_changes_is_fatal() {
    let config = test_config().build().unwrap();
    let provider = RustCryptoProvider::new();
    let mut conn = ClientConnection::new(&config);
    let mut io = TestIo::new();

    conn.step(&provider, &mut io).unwrap();
    let ch1 = decode_client_hello(&io.sent_raw[0].clone());

    // Neither a new group nor a cookie: the retry changes nothing
    io.push_inbound(hrr_message(
        &ch1.legacy_session_id,
        extensions(vec![ext_supported_versions_sh()]),
    ));
    let err = conn.step(&provider, &mut io).unwrap_err();
    assert!(matches!(
        err,
        Error::ProtocolError(ProtocolError::IllegalParameter)
    ));
    assert_eq!(io.alerts, vec![AlertDescription::IllegalParameter]);
}

#[test]
fn test_hrr_selecting_offered_group_is_fatal() {
    let config = test_config().build().unwrap();
    let provider = RustCryptoProvider::new();
    let mut conn = ClientConnection::new(&config);
    let mut io = TestIo::new();

    conn.step(&provider, &mut io).unwrap();
    let ch1 = decode_client_hello(&io.sent_raw[0].clone());
    let (group1, _) = client_key_share(&ch1).unwrap();

    io.push_inbound(hrr_message(
        &ch1.legacy_session_id,
        extensions(vec![
            ext_supported_versions_sh(),
            ext_key_share_hrr(group1),
        ]),
    ));
    let err = conn.step(&provider, &mut io).unwrap_err();
    assert!(matches!(
        err,
        Error::ProtocolError(ProtocolError::IllegalParameter)
    ));
}

#[test]
fn test_hrr_group_not_offered_is_fatal() {
    let config = test_config().build().unwrap();
    let provider = RustCryptoProvider::new();
    let mut conn = ClientConnection::new(&config);
    let mut io = TestIo::new();

    conn.step(&provider, &mut io).unwrap();
    let ch1 = decode_client_hello(&io.sent_raw[0].clone());

    // secp521r1 is not in the default supported_groups list
    io.push_inbound(hrr_message(
        &ch1.legacy_session_id,
        extensions(vec![
            ext_supported_versions_sh(),
            ext_key_share_hrr(0x0019),
        ]),
    ));
    assert!(conn.step(&provider, &mut io).is_err());
}

#[test]
fn test_hrr_compat_mode_ccs_before_second_hello() {
    let config = test_config().with_compat_mode(true).build().unwrap();
    let provider = RustCryptoProvider::new();
    let mut conn = ClientConnection::new(&config);
    let mut io = TestIo::new();

    conn.step(&provider, &mut io).unwrap();
    let ch1 = decode_client_hello(&io.sent_raw[0].clone());

    io.push_inbound(hrr_message(
        &ch1.legacy_session_id,
        extensions(vec![
            ext_supported_versions_sh(),
            ext_key_share_hrr(0x0017),
        ]),
    ));
    conn.step(&provider, &mut io).unwrap();
    assert_eq!(conn.state(), ClientState::CcsBeforeSecondClientHello);
    assert_eq!(io.ccs_writes, 0);

    conn.step(&provider, &mut io).unwrap();
    assert_eq!(io.ccs_writes, 1);
    assert_eq!(conn.state(), ClientState::Start);

    conn.step(&provider, &mut io).unwrap();
    assert_eq!(conn.state(), ClientState::WaitServerHello);
    assert_eq!(io.sent.len(), 2);
}

#[test]
fn test_hrr_cookie_only_retry() {
    let config = test_config().build().unwrap();
    let provider = RustCryptoProvider::new();
    let mut conn = ClientConnection::new(&config);
    let mut io = TestIo::new();

    conn.step(&provider, &mut io).unwrap();
    let ch1_raw = io.sent_raw[0].clone();
    let ch1 = decode_client_hello(&ch1_raw);
    let (group1, key1) = client_key_share(&ch1).unwrap();

    io.push_inbound(hrr_message(
        &ch1.legacy_session_id,
        extensions(vec![
            ext_supported_versions_sh(),
            ext_cookie(&[0x01, 0x02]),
        ]),
    ));
    conn.step(&provider, &mut io).unwrap();
    conn.step(&provider, &mut io).unwrap();

    // A cookie-only retry keeps the share unchanged
    let ch2 = decode_client_hello(&io.sent_raw[1].clone());
    let (group2, key2) = client_key_share(&ch2).unwrap();
    assert_eq!(group1, group2);
    assert_eq!(key1, key2);
    assert!(extension_data(&ch2, ExtensionType::Cookie).is_some());
}
