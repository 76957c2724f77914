//! # oxtls core
//!
//! Client-side TLS 1.3 handshake engine (RFC 8446).
//!
//! The crate drives a client through the full 1-RTT handshake, including
//! HelloRetryRequest, PSK resumption with binders, optional client
//! authentication, middlebox-compatibility mode, downgrade detection, and
//! post-handshake NewSessionTicket ingestion. Everything around it is an
//! injected collaborator:
//!
//! - the **record layer** (framing and record protection) sits behind
//!   [`record::RecordIo`];
//! - **cryptographic primitives** sit behind
//!   [`oxtls_crypto::CryptoProvider`];
//! - **certificate validation** sits behind
//!   [`config::CertificateVerifier`].
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          application / embedder         │
//! └──────────────┬──────────────────────────┘
//!                │  ClientConnection::step()
//! ┌──────────────▼──────────────────────────┐
//! │        oxtls-core (this crate)          │
//! │   state machine · extensions · PSKs     │
//! │   key schedule · transcript · codecs    │
//! └───────┬──────────────────────┬──────────┘
//!         │ RecordIo             │ CryptoProvider
//! ┌───────▼────────┐    ┌────────▼──────────┐
//! │  record layer  │    │   oxtls-crypto    │
//! └────────────────┘    └───────────────────┘
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    unused_qualifications
)]
#![forbid(unsafe_code)]

// Re-export the crypto interface
pub use oxtls_crypto;

pub mod alert;
pub mod cipher;
pub mod codec;
pub mod config;
pub mod error;
pub mod extension_types;
pub mod extensions;
pub mod handshake;
pub mod key_schedule;
pub mod messages;
pub mod protocol;
pub mod psk;
pub mod record;
pub mod session;
pub mod transcript;

pub use cipher::CipherSuite;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{Error, Result};
pub use handshake::{ClientConnection, ClientState, StepEvent};
pub use protocol::{ContentType, HandshakeType, ProtocolVersion};
pub use session::Session;
