//! Transcript hash management (RFC 8446 Section 4.4.1).
//!
//! The transcript is a running hash over the raw handshake-message bytes.
//! Feeds are byte-exact rather than message-exact so the ClientHello writer
//! can stop at the start of the PSK binders, snapshot, and resume.

use crate::error::Result;
use crate::protocol::HandshakeType;
use oxtls_crypto::{CryptoProvider, HashAlgorithm};

/// Running transcript hash.
#[derive(Debug, Clone)]
pub struct TranscriptHash {
    algorithm: HashAlgorithm,
    /// Raw byte chunks in feed order.
    chunks: Vec<Vec<u8>>,
    /// Cached hash over all chunks (invalidated on update).
    cached_hash: Option<Vec<u8>>,
}

impl TranscriptHash {
    /// Create a new transcript hash with the specified algorithm.
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            chunks: Vec::new(),
            cached_hash: None,
        }
    }

    /// Get the hash algorithm being used.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Feed raw handshake bytes.
    ///
    /// The bytes need not align with message boundaries; the binder
    /// construction feeds a truncated ClientHello and later the binder
    /// bytes separately.
    pub fn update(&mut self, bytes: &[u8]) {
        self.chunks.push(bytes.to_vec());
        self.cached_hash = None;
    }

    /// Compute (and cache) the current transcript hash.
    pub fn current_hash(&mut self, provider: &dyn CryptoProvider) -> Result<Vec<u8>> {
        if let Some(ref hash) = self.cached_hash {
            return Ok(hash.clone());
        }
        let mut hasher = provider.hash(self.algorithm)?;
        for chunk in &self.chunks {
            hasher.update(chunk);
        }
        let hash = hasher.finalize();
        self.cached_hash = Some(hash.clone());
        Ok(hash)
    }

    /// Hash the fed bytes under an arbitrary algorithm, leaving the
    /// running state untouched.
    ///
    /// Binder computation needs this: each offered PSK binds with its own
    /// hash, which may differ from the transcript's current algorithm.
    pub fn hash_with(
        &self,
        provider: &dyn CryptoProvider,
        algorithm: HashAlgorithm,
    ) -> Result<Vec<u8>> {
        let mut hasher = provider.hash(algorithm)?;
        for chunk in &self.chunks {
            hasher.update(chunk);
        }
        Ok(hasher.finalize())
    }

    /// Restart the transcript under a different hash algorithm.
    ///
    /// Used when the ServerHello selects a suite with a different hash than
    /// the one assumed while writing the ClientHello; previously fed bytes
    /// are re-hashed under the new algorithm.
    pub fn restart_with(&mut self, algorithm: HashAlgorithm) {
        if self.algorithm != algorithm {
            self.algorithm = algorithm;
            self.cached_hash = None;
        }
    }

    /// Replace the transcript with the synthetic `message_hash` message
    /// (RFC 8446 Section 4.4.1), applied when a HelloRetryRequest arrives:
    ///
    /// ```text
    /// Transcript-Hash(ClientHello1, HelloRetryRequest, ...)
    ///   = Hash(message_hash || 00 00 Hash.length || Hash(ClientHello1),
    ///          HelloRetryRequest, ...)
    /// ```
    pub fn reset_for_hello_retry(&mut self, provider: &dyn CryptoProvider) -> Result<()> {
        let hash = self.current_hash(provider)?;
        let mut synthetic = Vec::with_capacity(4 + hash.len());
        synthetic.push(HandshakeType::MessageHash.to_u8());
        synthetic.extend_from_slice(&[0, 0, hash.len() as u8]);
        synthetic.extend_from_slice(&hash);
        self.chunks.clear();
        self.cached_hash = None;
        self.chunks.push(synthetic);
        Ok(())
    }

    /// Check if the transcript is empty.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Compute Finished verify data (RFC 8446 Section 4.4.4).
///
/// ```text
/// finished_key = HKDF-Expand-Label(BaseKey, "finished", "", Hash.length)
/// verify_data  = HMAC(finished_key, Transcript-Hash(Handshake Context))
/// ```
pub fn compute_verify_data(
    provider: &dyn CryptoProvider,
    algorithm: HashAlgorithm,
    base_key: &[u8],
    transcript_hash: &[u8],
) -> Result<Vec<u8>> {
    let hash_len = algorithm.output_size();
    let finished_key = crate::key_schedule::hkdf_expand_label(
        provider,
        algorithm,
        base_key,
        b"finished",
        &[],
        hash_len,
    )?;
    let mut hmac = provider.hmac(algorithm, &finished_key)?;
    hmac.update(transcript_hash);
    Ok(hmac.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_accumulates_chunks() {
        let mut transcript = TranscriptHash::new(HashAlgorithm::Sha256);
        assert!(transcript.is_empty());
        transcript.update(b"chunk1");
        transcript.update(b"chunk2");
        assert!(!transcript.is_empty());
    }

    #[test]
    fn test_restart_with_same_algorithm_keeps_cache_semantics() {
        let mut transcript = TranscriptHash::new(HashAlgorithm::Sha256);
        transcript.update(b"data");
        transcript.restart_with(HashAlgorithm::Sha256);
        assert_eq!(transcript.algorithm(), HashAlgorithm::Sha256);
        transcript.restart_with(HashAlgorithm::Sha384);
        assert_eq!(transcript.algorithm(), HashAlgorithm::Sha384);
    }
}
