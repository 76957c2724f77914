//! TLS 1.3 Key Schedule (RFC 8446 Section 7.1).
//!
//! ```text
//!              0
//!              |
//!              v
//!   PSK ->  HKDF-Extract = Early Secret
//!              |
//!              +-----> Derive-Secret(., "ext binder" | "res binder", "")
//!              |                     = binder_key
//!              v
//!        Derive-Secret(., "derived", "")
//!              |
//!              v
//!   (EC)DHE -> HKDF-Extract = Handshake Secret
//!              |
//!              +-----> Derive-Secret(., "c hs traffic", CH..SH)
//!              +-----> Derive-Secret(., "s hs traffic", CH..SH)
//!              v
//!        Derive-Secret(., "derived", "")
//!              |
//!              v
//!   0 -> HKDF-Extract = Master Secret
//!              |
//!              +-----> Derive-Secret(., "c ap traffic", CH..server Finished)
//!              +-----> Derive-Secret(., "s ap traffic", CH..server Finished)
//!              +-----> Derive-Secret(., "res master",   CH..client Finished)
//! ```

use crate::cipher::CipherSuite;
use crate::error::{Error, Result};
use oxtls_crypto::{CryptoProvider, HashAlgorithm};
use zeroize::Zeroizing;

/// HKDF-Expand-Label (RFC 8446 Section 7.1).
///
/// ```text
/// struct {
///     uint16 length = Length;
///     opaque label<7..255> = "tls13 " + Label;
///     opaque context<0..255> = Context;
/// } HkdfLabel;
/// ```
pub fn hkdf_expand_label(
    provider: &dyn CryptoProvider,
    algorithm: HashAlgorithm,
    secret: &[u8],
    label: &[u8],
    context: &[u8],
    length: usize,
) -> Result<Vec<u8>> {
    if length > u16::MAX as usize || label.len() > 255 - 6 || context.len() > 255 {
        return Err(Error::InternalError("HkdfLabel field too large".into()));
    }

    let mut hkdf_label = Vec::with_capacity(4 + 6 + label.len() + context.len());
    hkdf_label.extend_from_slice(&(length as u16).to_be_bytes());
    hkdf_label.push((6 + label.len()) as u8);
    hkdf_label.extend_from_slice(b"tls13 ");
    hkdf_label.extend_from_slice(label);
    hkdf_label.push(context.len() as u8);
    hkdf_label.extend_from_slice(context);

    let kdf = provider.kdf(algorithm.to_kdf_algorithm())?;
    Ok(kdf.expand(secret, &hkdf_label, length)?)
}

/// TLS 1.3 key schedule for one connection.
///
/// Tracks the extract chain (early, handshake, master) and the traffic
/// secrets derived from it. Every stored secret is zeroized on drop.
pub struct KeySchedule {
    cipher_suite: CipherSuite,
    hash_algorithm: HashAlgorithm,
    hash_len: usize,
    early_secret: Option<Zeroizing<Vec<u8>>>,
    handshake_secret: Option<Zeroizing<Vec<u8>>>,
    master_secret: Option<Zeroizing<Vec<u8>>>,
    client_handshake_traffic_secret: Option<Zeroizing<Vec<u8>>>,
    server_handshake_traffic_secret: Option<Zeroizing<Vec<u8>>>,
    client_application_traffic_secret: Option<Zeroizing<Vec<u8>>>,
    server_application_traffic_secret: Option<Zeroizing<Vec<u8>>>,
    resumption_master_secret: Option<Zeroizing<Vec<u8>>>,
}

impl std::fmt::Debug for KeySchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySchedule")
            .field("cipher_suite", &self.cipher_suite)
            .finish_non_exhaustive()
    }
}

impl KeySchedule {
    /// Create a new key schedule for the given cipher suite.
    pub fn new(cipher_suite: CipherSuite) -> Self {
        let hash_algorithm = cipher_suite.hash_algorithm();
        Self {
            cipher_suite,
            hash_algorithm,
            hash_len: hash_algorithm.output_size(),
            early_secret: None,
            handshake_secret: None,
            master_secret: None,
            client_handshake_traffic_secret: None,
            server_handshake_traffic_secret: None,
            client_application_traffic_secret: None,
            server_application_traffic_secret: None,
            resumption_master_secret: None,
        }
    }

    /// The cipher suite this schedule derives keys for.
    pub fn cipher_suite(&self) -> CipherSuite {
        self.cipher_suite
    }

    /// Initialize the early secret from a PSK, or from zero when no PSK is
    /// in play.
    pub fn init_early_secret(&mut self, provider: &dyn CryptoProvider, psk: &[u8]) -> Result<()> {
        let kdf = provider.kdf(self.hash_algorithm.to_kdf_algorithm())?;
        let ikm = if psk.is_empty() {
            Zeroizing::new(vec![0u8; self.hash_len])
        } else {
            Zeroizing::new(psk.to_vec())
        };
        let salt = vec![0u8; self.hash_len];
        self.early_secret = Some(Zeroizing::new(kdf.extract(&salt, &ikm)));
        Ok(())
    }

    /// Derive the binder key from the early secret.
    ///
    /// `"ext binder"` for external PSKs, `"res binder"` for resumption PSKs
    /// (RFC 8446 Section 4.2.11.2).
    pub fn derive_binder_key(
        &self,
        provider: &dyn CryptoProvider,
        is_external: bool,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let early = self
            .early_secret
            .as_ref()
            .ok_or_else(|| Error::InternalError("Early secret not initialized".into()))?;
        let label: &[u8] = if is_external {
            b"ext binder"
        } else {
            b"res binder"
        };
        let empty_hash = empty_transcript_hash(provider, self.hash_algorithm)?;
        Ok(Zeroizing::new(hkdf_expand_label(
            provider,
            self.hash_algorithm,
            early,
            label,
            &empty_hash,
            self.hash_len,
        )?))
    }

    /// Derive the handshake secret, mixing in the (EC)DHE shared secret.
    ///
    /// For pure-PSK key exchange pass a zero-filled buffer of hash length.
    pub fn derive_handshake_secret(
        &mut self,
        provider: &dyn CryptoProvider,
        shared_secret: &[u8],
    ) -> Result<()> {
        let early = self
            .early_secret
            .as_ref()
            .ok_or_else(|| Error::InternalError("Early secret not initialized".into()))?;
        let kdf = provider.kdf(self.hash_algorithm.to_kdf_algorithm())?;
        let empty_hash = empty_transcript_hash(provider, self.hash_algorithm)?;
        let derived = hkdf_expand_label(
            provider,
            self.hash_algorithm,
            early,
            b"derived",
            &empty_hash,
            self.hash_len,
        )?;
        self.handshake_secret = Some(Zeroizing::new(kdf.extract(&derived, shared_secret)));
        Ok(())
    }

    /// Derive the master secret.
    pub fn derive_master_secret(&mut self, provider: &dyn CryptoProvider) -> Result<()> {
        let handshake = self
            .handshake_secret
            .as_ref()
            .ok_or_else(|| Error::InternalError("Handshake secret not initialized".into()))?;
        let kdf = provider.kdf(self.hash_algorithm.to_kdf_algorithm())?;
        let empty_hash = empty_transcript_hash(provider, self.hash_algorithm)?;
        let derived = hkdf_expand_label(
            provider,
            self.hash_algorithm,
            handshake,
            b"derived",
            &empty_hash,
            self.hash_len,
        )?;
        let ikm = vec![0u8; self.hash_len];
        self.master_secret = Some(Zeroizing::new(kdf.extract(&derived, &ikm)));
        Ok(())
    }

    fn derive_secret(
        &self,
        provider: &dyn CryptoProvider,
        secret: &[u8],
        label: &[u8],
        transcript_hash: &[u8],
    ) -> Result<Vec<u8>> {
        hkdf_expand_label(
            provider,
            self.hash_algorithm,
            secret,
            label,
            transcript_hash,
            self.hash_len,
        )
    }

    /// Derive both handshake traffic secrets from the CH..SH transcript.
    pub fn derive_handshake_traffic_secrets(
        &mut self,
        provider: &dyn CryptoProvider,
        transcript_hash: &[u8],
    ) -> Result<()> {
        let handshake = self
            .handshake_secret
            .as_ref()
            .ok_or_else(|| Error::InternalError("Handshake secret not initialized".into()))?;
        let client = self.derive_secret(provider, handshake, b"c hs traffic", transcript_hash)?;
        let server = self.derive_secret(provider, handshake, b"s hs traffic", transcript_hash)?;
        self.client_handshake_traffic_secret = Some(Zeroizing::new(client));
        self.server_handshake_traffic_secret = Some(Zeroizing::new(server));
        Ok(())
    }

    /// Derive both application traffic secrets from the CH..server Finished
    /// transcript.
    pub fn derive_application_traffic_secrets(
        &mut self,
        provider: &dyn CryptoProvider,
        transcript_hash: &[u8],
    ) -> Result<()> {
        let master = self
            .master_secret
            .as_ref()
            .ok_or_else(|| Error::InternalError("Master secret not initialized".into()))?;
        let client = self.derive_secret(provider, master, b"c ap traffic", transcript_hash)?;
        let server = self.derive_secret(provider, master, b"s ap traffic", transcript_hash)?;
        self.client_application_traffic_secret = Some(Zeroizing::new(client));
        self.server_application_traffic_secret = Some(Zeroizing::new(server));
        Ok(())
    }

    /// Derive and store the resumption master secret from the CH..client
    /// Finished transcript.
    pub fn derive_resumption_master_secret(
        &mut self,
        provider: &dyn CryptoProvider,
        transcript_hash: &[u8],
    ) -> Result<()> {
        let master = self
            .master_secret
            .as_ref()
            .ok_or_else(|| Error::InternalError("Master secret not initialized".into()))?;
        let secret = self.derive_secret(provider, master, b"res master", transcript_hash)?;
        self.resumption_master_secret = Some(Zeroizing::new(secret));
        Ok(())
    }

    /// Derive AEAD traffic keys from a traffic secret.
    ///
    /// key = HKDF-Expand-Label(Secret, "key", "", key_length)
    /// iv  = HKDF-Expand-Label(Secret, "iv", "", iv_length)
    pub fn derive_traffic_keys(
        &self,
        provider: &dyn CryptoProvider,
        traffic_secret: &[u8],
    ) -> Result<(Zeroizing<Vec<u8>>, Zeroizing<Vec<u8>>)> {
        let key = hkdf_expand_label(
            provider,
            self.hash_algorithm,
            traffic_secret,
            b"key",
            &[],
            self.cipher_suite.key_length(),
        )?;
        let iv = hkdf_expand_label(
            provider,
            self.hash_algorithm,
            traffic_secret,
            b"iv",
            &[],
            self.cipher_suite.iv_length(),
        )?;
        Ok((Zeroizing::new(key), Zeroizing::new(iv)))
    }

    /// Get the client handshake traffic secret.
    pub fn client_handshake_traffic_secret(&self) -> Option<&[u8]> {
        self.client_handshake_traffic_secret
            .as_ref()
            .map(|s| s.as_slice())
    }

    /// Get the server handshake traffic secret.
    pub fn server_handshake_traffic_secret(&self) -> Option<&[u8]> {
        self.server_handshake_traffic_secret
            .as_ref()
            .map(|s| s.as_slice())
    }

    /// Get the client application traffic secret.
    pub fn client_application_traffic_secret(&self) -> Option<&[u8]> {
        self.client_application_traffic_secret
            .as_ref()
            .map(|s| s.as_slice())
    }

    /// Get the server application traffic secret.
    pub fn server_application_traffic_secret(&self) -> Option<&[u8]> {
        self.server_application_traffic_secret
            .as_ref()
            .map(|s| s.as_slice())
    }

    /// Get the resumption master secret.
    pub fn resumption_master_secret(&self) -> Option<&[u8]> {
        self.resumption_master_secret
            .as_ref()
            .map(|s| s.as_slice())
    }
}

fn empty_transcript_hash(
    provider: &dyn CryptoProvider,
    algorithm: HashAlgorithm,
) -> Result<Vec<u8>> {
    let hasher = provider.hash(algorithm)?;
    Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_schedule_creation() {
        let ks = KeySchedule::new(CipherSuite::Aes256GcmSha384);
        assert_eq!(ks.hash_len, 48);
        assert_eq!(ks.hash_algorithm, HashAlgorithm::Sha384);
        assert!(ks.client_handshake_traffic_secret().is_none());
    }

    #[test]
    fn test_secrets_unavailable_before_derivation() {
        let mut ks = KeySchedule::new(CipherSuite::Aes128GcmSha256);
        let provider = NoProvider;
        // Handshake secret requires the early secret first
        assert!(ks.derive_handshake_secret(&provider, &[0u8; 32]).is_err());
        assert!(ks.derive_master_secret(&provider).is_err());
    }

    /// Provider stub that fails every call; only exercises ordering checks.
    struct NoProvider;

    impl CryptoProvider for NoProvider {
        fn hash(&self, _: HashAlgorithm) -> oxtls_crypto::Result<Box<dyn oxtls_crypto::Hash>> {
            Err(oxtls_crypto::Error::UnsupportedAlgorithm("hash".into()))
        }
        fn hmac(
            &self,
            _: HashAlgorithm,
            _: &[u8],
        ) -> oxtls_crypto::Result<Box<dyn oxtls_crypto::Hmac>> {
            Err(oxtls_crypto::Error::UnsupportedAlgorithm("hmac".into()))
        }
        fn kdf(
            &self,
            _: oxtls_crypto::KdfAlgorithm,
        ) -> oxtls_crypto::Result<Box<dyn oxtls_crypto::Kdf>> {
            Err(oxtls_crypto::Error::UnsupportedAlgorithm("kdf".into()))
        }
        fn random(&self) -> &dyn oxtls_crypto::Random {
            unreachable!("ordering tests never draw randomness")
        }
        fn key_exchange(
            &self,
            _: oxtls_crypto::NamedGroup,
        ) -> oxtls_crypto::Result<Box<dyn oxtls_crypto::KeyExchange>> {
            Err(oxtls_crypto::Error::UnsupportedAlgorithm("kex".into()))
        }
        fn signer(
            &self,
            _: oxtls_crypto::SignatureScheme,
        ) -> oxtls_crypto::Result<Box<dyn oxtls_crypto::Signer>> {
            Err(oxtls_crypto::Error::UnsupportedAlgorithm("signer".into()))
        }
    }
}
