//! HMAC implementations using the `hmac` crate.

use hmac::{Hmac as HmacGeneric, Mac};
use oxtls_crypto::{Error, HashAlgorithm, Hmac, Result};
use sha2::{Sha256, Sha384, Sha512};

type HmacSha256 = HmacGeneric<Sha256>;
type HmacSha384 = HmacGeneric<Sha384>;
type HmacSha512 = HmacGeneric<Sha512>;

/// Create an HMAC instance keyed with `key`.
pub(crate) fn create_hmac(algorithm: HashAlgorithm, key: &[u8]) -> Result<Box<dyn Hmac>> {
    match algorithm {
        HashAlgorithm::Sha256 => Ok(Box::new(RcHmac {
            mac: HmacSha256::new_from_slice(key).map_err(|_| Error::InvalidKeyLength)?,
            algorithm,
        })),
        HashAlgorithm::Sha384 => Ok(Box::new(RcHmac {
            mac: HmacSha384::new_from_slice(key).map_err(|_| Error::InvalidKeyLength)?,
            algorithm,
        })),
        HashAlgorithm::Sha512 => Ok(Box::new(RcHmac {
            mac: HmacSha512::new_from_slice(key).map_err(|_| Error::InvalidKeyLength)?,
            algorithm,
        })),
    }
}

struct RcHmac<M: Mac> {
    mac: M,
    algorithm: HashAlgorithm,
}

impl<M: Mac + Send> Hmac for RcHmac<M> {
    fn update(&mut self, data: &[u8]) {
        self.mac.update(data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.mac.finalize().into_bytes().to_vec()
    }

    fn output_size(&self) -> usize {
        self.algorithm.output_size()
    }

    fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}
