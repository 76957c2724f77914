//! HKDF implementations using the `hkdf` crate.

use hkdf::Hkdf;
use oxtls_crypto::{Error, Kdf, KdfAlgorithm, Result};
use sha2::{Sha256, Sha384, Sha512};

/// Create a KDF instance for the specified algorithm.
pub(crate) fn create_kdf(algorithm: KdfAlgorithm) -> Result<Box<dyn Kdf>> {
    match algorithm {
        KdfAlgorithm::HkdfSha256 => Ok(Box::new(HkdfSha256Kdf)),
        KdfAlgorithm::HkdfSha384 => Ok(Box::new(HkdfSha384Kdf)),
        KdfAlgorithm::HkdfSha512 => Ok(Box::new(HkdfSha512Kdf)),
    }
}

macro_rules! hkdf_kdf {
    ($name:ident, $hash:ty, $alg:expr) => {
        struct $name;

        impl Kdf for $name {
            fn extract(&self, salt: &[u8], ikm: &[u8]) -> Vec<u8> {
                let (prk, _) = Hkdf::<$hash>::extract(Some(salt), ikm);
                prk.to_vec()
            }

            fn expand(&self, prk: &[u8], info: &[u8], length: usize) -> Result<Vec<u8>> {
                let hk = Hkdf::<$hash>::from_prk(prk).map_err(|_| Error::InvalidKeyLength)?;
                let mut okm = vec![0u8; length];
                hk.expand(info, &mut okm).map_err(|_| Error::InvalidLength)?;
                Ok(okm)
            }

            fn algorithm(&self) -> KdfAlgorithm {
                $alg
            }
        }
    };
}

hkdf_kdf!(HkdfSha256Kdf, Sha256, KdfAlgorithm::HkdfSha256);
hkdf_kdf!(HkdfSha384Kdf, Sha384, KdfAlgorithm::HkdfSha384);
hkdf_kdf!(HkdfSha512Kdf, Sha512, KdfAlgorithm::HkdfSha512);
