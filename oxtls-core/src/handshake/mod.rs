//! Client handshake state machine.

pub mod client;

pub use client::ClientConnection;

/// Client handshake state (RFC 8446 appendix A.1, client side).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Ready to send the (first or retried) ClientHello.
    Start,
    /// Emit the dummy CCS before the second ClientHello (compat mode).
    CcsBeforeSecondClientHello,
    /// Waiting for ServerHello or HelloRetryRequest.
    WaitServerHello,
    /// Waiting for EncryptedExtensions.
    WaitEncryptedExtensions,
    /// Waiting for CertificateRequest or Certificate.
    WaitCertCr,
    /// Waiting for the server Certificate.
    WaitCertificate,
    /// Waiting for CertificateVerify.
    WaitCertVerify,
    /// Waiting for the server Finished.
    WaitFinished,
    /// Send EndOfEarlyData (early data was accepted).
    SendEndOfEarlyData,
    /// Emit the dummy CCS after the server Finished (compat mode).
    CcsAfterServerFinished,
    /// Send the client Certificate (client auth requested).
    SendClientCertificate,
    /// Send the client CertificateVerify (non-empty certificate sent).
    SendClientCertVerify,
    /// Send the client Finished.
    SendClientFinished,
    /// Derive the application secrets' tail and close out the handshake.
    Wrapup,
    /// Handshake complete; post-handshake messages may arrive.
    Connected,
    /// Server selected TLS 1.2; the retained ServerHello belongs to a
    /// legacy handler.
    Tls12Handoff,
    /// Terminal failure; the connection is dead.
    Failed,
}

/// Outcome of one `step()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    /// Progress was made; call `step()` again.
    Progressed,
    /// The record layer needs transport I/O before more progress.
    WantIo,
    /// The handshake finished; application keys are installed both ways.
    HandshakeOver,
    /// A NewSessionTicket was ingested; the caller may persist the
    /// session now.
    NewSessionTicket,
    /// The server negotiated TLS 1.2; hand the connection to a legacy
    /// stack.
    HandoffTls12,
}
