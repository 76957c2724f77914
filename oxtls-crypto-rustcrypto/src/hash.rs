//! Hash implementations using the `sha2` crate.

use oxtls_crypto::{Hash, HashAlgorithm, Result};
use sha2::{Digest, Sha256, Sha384, Sha512};

/// Create a hash instance for the specified algorithm.
pub(crate) fn create_hash(algorithm: HashAlgorithm) -> Result<Box<dyn Hash>> {
    match algorithm {
        HashAlgorithm::Sha256 => Ok(Box::new(Sha2Hash::<Sha256>::new(algorithm))),
        HashAlgorithm::Sha384 => Ok(Box::new(Sha2Hash::<Sha384>::new(algorithm))),
        HashAlgorithm::Sha512 => Ok(Box::new(Sha2Hash::<Sha512>::new(algorithm))),
    }
}

struct Sha2Hash<D: Digest> {
    digest: D,
    algorithm: HashAlgorithm,
}

impl<D: Digest> Sha2Hash<D> {
    fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            digest: D::new(),
            algorithm,
        }
    }
}

impl<D: Digest + Send> Hash for Sha2Hash<D> {
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.digest, data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.digest.finalize().to_vec()
    }

    fn output_size(&self) -> usize {
        self.algorithm.output_size()
    }

    fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

/// One-shot hash helper used by the other modules.
pub(crate) fn hash_once(algorithm: HashAlgorithm, data: &[u8]) -> Result<Vec<u8>> {
    let mut hash = create_hash(algorithm)?;
    hash.update(data);
    Ok(hash.finalize())
}
