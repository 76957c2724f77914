//! Client connection configuration.
//!
//! The compile-time feature gates of classic embedded TLS stacks (PSK
//! modes, tickets, early data, middlebox compatibility, time) are runtime
//! fields here; the state machine consults them and skips the states they
//! disable.

use crate::cipher::{CipherSuite, DEFAULT_CIPHER_SUITES};
use crate::error::{Error, Result};
use crate::protocol::ProtocolVersion;
use crate::psk::{ExternalPsk, StoredTicket};
use oxtls_crypto::{NamedGroup, SignatureScheme};
use std::sync::Arc;
use zeroize::Zeroizing;

/// Wall-clock source for ticket ages.
///
/// Absent a clock, obfuscated ticket ages are sent as zero.
pub trait Clock: Send + Sync {
    /// Seconds since the UNIX epoch.
    fn now_secs(&self) -> u64;
}

/// Clock backed by `std::time::SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Certificate chain validation, delegated to the embedder.
///
/// X.509 parsing and trust-anchor policy live behind this trait; the
/// handshake engine only sequences the calls.
pub trait CertificateVerifier: Send + Sync {
    /// Validate the peer's certificate chain (leaf first).
    fn verify_chain(&self, chain: &[Vec<u8>], server_name: Option<&str>) -> Result<()>;

    /// Verify the CertificateVerify signature made by the chain's leaf.
    fn verify_signature(
        &self,
        leaf_certificate: &[u8],
        scheme: SignatureScheme,
        message: &[u8],
        signature: &[u8],
    ) -> Result<()>;
}

/// Verifier that refuses every chain; the secure default until the
/// embedder installs a real one.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectAllVerifier;

impl CertificateVerifier for RejectAllVerifier {
    fn verify_chain(&self, _chain: &[Vec<u8>], _server_name: Option<&str>) -> Result<()> {
        Err(Error::InvalidConfig(
            "no certificate verifier configured".into(),
        ))
    }

    fn verify_signature(
        &self,
        _leaf_certificate: &[u8],
        _scheme: SignatureScheme,
        _message: &[u8],
        _signature: &[u8],
    ) -> Result<()> {
        Err(Error::InvalidConfig(
            "no certificate verifier configured".into(),
        ))
    }
}

/// Enabled key-exchange modes.
///
/// `psk` and `psk_ephemeral` gate the PSK offer; `ephemeral` gates the
/// key_share offer. At least one must be enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyExchangeModes {
    /// Pure PSK (psk_ke)
    pub psk: bool,
    /// PSK with ephemeral (EC)DHE (psk_dhe_ke)
    pub psk_ephemeral: bool,
    /// Certificate-authenticated ephemeral (EC)DHE
    pub ephemeral: bool,
}

impl Default for KeyExchangeModes {
    fn default() -> Self {
        Self {
            psk: false,
            psk_ephemeral: true,
            ephemeral: true,
        }
    }
}

impl KeyExchangeModes {
    /// Whether any PSK-based mode is enabled.
    pub fn any_psk(&self) -> bool {
        self.psk || self.psk_ephemeral
    }

    /// Whether any mode using an ephemeral key share is enabled.
    pub fn any_ephemeral(&self) -> bool {
        self.ephemeral || self.psk_ephemeral
    }

    /// Whether any mode at all is enabled.
    pub fn any(&self) -> bool {
        self.psk || self.psk_ephemeral || self.ephemeral
    }
}

/// Client certificate and signing key for mutual authentication.
pub struct ClientCredentials {
    /// DER certificate chain, leaf first.
    pub certificate_chain: Vec<Vec<u8>>,
    /// Private key bytes for the leaf certificate.
    pub private_key: Zeroizing<Vec<u8>>,
    /// Scheme the key signs with.
    pub scheme: SignatureScheme,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("certificate_chain", &self.certificate_chain.len())
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}

/// Read-only configuration shared by every handshake started from it.
pub struct ClientConfig {
    /// Lowest TLS version the client accepts.
    pub min_version: ProtocolVersion,
    /// Highest TLS version the client offers.
    pub max_version: ProtocolVersion,
    /// Offered cipher suites, in preference order.
    pub cipher_suites: Vec<CipherSuite>,
    /// Supported groups, in preference order.
    pub supported_groups: Vec<NamedGroup>,
    /// Supported signature schemes, in preference order.
    pub signature_schemes: Vec<SignatureScheme>,
    /// Enabled key-exchange modes.
    pub key_exchange_modes: KeyExchangeModes,
    /// Static out-of-band PSK.
    pub external_psk: Option<ExternalPsk>,
    /// Session ticket from a prior connection.
    pub ticket: Option<StoredTicket>,
    /// Whether ticket-based resumption may be offered.
    pub enable_resumption: bool,
    /// ALPN protocols to offer, in preference order.
    pub alpn_protocols: Vec<String>,
    /// Server name for SNI and certificate validation.
    pub server_name: Option<String>,
    /// Credentials for client authentication.
    pub client_credentials: Option<ClientCredentials>,
    /// Certificate chain validator (owns the trust anchors).
    pub certificate_verifier: Arc<dyn CertificateVerifier>,
    /// Offer early data when a PSK permits it.
    pub enable_early_data: bool,
    /// Middlebox compatibility mode: dummy CCS records and a non-empty
    /// legacy session id.
    pub compat_mode: bool,
    /// Wall clock for ticket ages; `None` sends obfuscated age zero.
    pub clock: Option<Arc<dyn Clock>>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("min_version", &self.min_version)
            .field("max_version", &self.max_version)
            .field("cipher_suites", &self.cipher_suites)
            .field("supported_groups", &self.supported_groups)
            .field("key_exchange_modes", &self.key_exchange_modes)
            .field("compat_mode", &self.compat_mode)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    /// Create a configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for [`ClientConfig`].
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self {
            config: ClientConfig {
                min_version: ProtocolVersion::Tls13,
                max_version: ProtocolVersion::Tls13,
                cipher_suites: DEFAULT_CIPHER_SUITES.to_vec(),
                supported_groups: vec![NamedGroup::X25519, NamedGroup::Secp256r1],
                signature_schemes: vec![
                    SignatureScheme::Ed25519,
                    SignatureScheme::EcdsaSecp256r1Sha256,
                    SignatureScheme::EcdsaSecp384r1Sha384,
                    SignatureScheme::RsaPssRsaeSha256,
                    SignatureScheme::RsaPssRsaeSha384,
                ],
                key_exchange_modes: KeyExchangeModes::default(),
                external_psk: None,
                ticket: None,
                enable_resumption: true,
                alpn_protocols: Vec::new(),
                server_name: None,
                client_credentials: None,
                certificate_verifier: Arc::new(RejectAllVerifier),
                enable_early_data: false,
                compat_mode: false,
                clock: Some(Arc::new(SystemClock)),
            },
        }
    }
}

impl std::fmt::Debug for ClientConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ClientConfigBuilder {
    /// Set the accepted TLS version range.
    pub fn with_versions(mut self, min: ProtocolVersion, max: ProtocolVersion) -> Self {
        self.config.min_version = min;
        self.config.max_version = max;
        self
    }

    /// Set the cipher suite preference list.
    pub fn with_cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.config.cipher_suites = suites.to_vec();
        self
    }

    /// Set the supported-groups preference list.
    pub fn with_supported_groups(mut self, groups: &[NamedGroup]) -> Self {
        self.config.supported_groups = groups.to_vec();
        self
    }

    /// Set the signature scheme preference list.
    pub fn with_signature_schemes(mut self, schemes: &[SignatureScheme]) -> Self {
        self.config.signature_schemes = schemes.to_vec();
        self
    }

    /// Set the enabled key-exchange modes.
    pub fn with_key_exchange_modes(mut self, modes: KeyExchangeModes) -> Self {
        self.config.key_exchange_modes = modes;
        self
    }

    /// Configure a static external PSK.
    pub fn with_external_psk(mut self, psk: ExternalPsk) -> Self {
        self.config.external_psk = Some(psk);
        self
    }

    /// Configure a session ticket for resumption.
    pub fn with_ticket(mut self, ticket: StoredTicket) -> Self {
        self.config.ticket = Some(ticket);
        self
    }

    /// Enable or disable ticket resumption offers.
    pub fn with_resumption(mut self, enable: bool) -> Self {
        self.config.enable_resumption = enable;
        self
    }

    /// Set the ALPN protocol list.
    pub fn with_alpn_protocols(mut self, protocols: &[&str]) -> Self {
        self.config.alpn_protocols = protocols.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Set the server name (SNI).
    pub fn with_server_name(mut self, name: &str) -> Self {
        self.config.server_name = Some(name.to_string());
        self
    }

    /// Configure client credentials for mutual authentication.
    pub fn with_client_credentials(mut self, credentials: ClientCredentials) -> Self {
        self.config.client_credentials = Some(credentials);
        self
    }

    /// Install the certificate verifier.
    pub fn with_certificate_verifier(mut self, verifier: Arc<dyn CertificateVerifier>) -> Self {
        self.config.certificate_verifier = verifier;
        self
    }

    /// Enable early-data offers.
    pub fn with_early_data(mut self, enable: bool) -> Self {
        self.config.enable_early_data = enable;
        self
    }

    /// Enable middlebox compatibility mode.
    pub fn with_compat_mode(mut self, enable: bool) -> Self {
        self.config.compat_mode = enable;
        self
    }

    /// Install a wall clock, or `None` to send obfuscated ticket age 0.
    pub fn with_clock(mut self, clock: Option<Arc<dyn Clock>>) -> Self {
        self.config.clock = clock;
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<ClientConfig> {
        let config = self.config;
        if config.cipher_suites.is_empty() {
            return Err(Error::InvalidConfig("no cipher suites configured".into()));
        }
        if config.max_version < ProtocolVersion::Tls13 {
            return Err(Error::InvalidConfig(
                "TLS 1.3 must be within the offered version range".into(),
            ));
        }
        if config.min_version > config.max_version {
            return Err(Error::InvalidConfig("min_version above max_version".into()));
        }
        if !config.key_exchange_modes.any() {
            return Err(Error::InvalidConfig(
                "no key exchange mode enabled".into(),
            ));
        }
        if config.key_exchange_modes.any_ephemeral() && config.supported_groups.is_empty() {
            return Err(Error::InvalidConfig(
                "ephemeral key exchange enabled but no supported groups".into(),
            ));
        }
        Ok(config)
    }
}
