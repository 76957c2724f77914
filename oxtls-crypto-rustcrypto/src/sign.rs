//! Signature implementations (Ed25519).

use ed25519_dalek::{Signer as _, Verifier as _};
use oxtls_crypto::{Error, Result, SignatureScheme, Signer};

/// Create a signer for the specified scheme.
pub(crate) fn create_signer(scheme: SignatureScheme) -> Result<Box<dyn Signer>> {
    match scheme {
        SignatureScheme::Ed25519 => Ok(Box::new(Ed25519Signer)),
        _ => Err(Error::UnsupportedAlgorithm(format!(
            "signature scheme {:?}",
            scheme
        ))),
    }
}

/// Derive the Ed25519 public key for a 32-byte seed.
///
/// Exposed for tests that need a verifying key matching a raw private key.
pub fn ed25519_public_key(private_key: &[u8]) -> Result<Vec<u8>> {
    let seed: [u8; 32] = private_key
        .try_into()
        .map_err(|_| Error::InvalidPrivateKey)?;
    let signing = ed25519_dalek::SigningKey::from_bytes(&seed);
    Ok(signing.verifying_key().to_bytes().to_vec())
}

#[derive(Debug)]
struct Ed25519Signer;

impl Signer for Ed25519Signer {
    fn sign(&self, private_key: &[u8], message: &[u8]) -> Result<Vec<u8>> {
        let seed: [u8; 32] = private_key
            .try_into()
            .map_err(|_| Error::InvalidPrivateKey)?;
        let signing = ed25519_dalek::SigningKey::from_bytes(&seed);
        Ok(signing.sign(message).to_bytes().to_vec())
    }

    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
        let public: [u8; 32] = public_key.try_into().map_err(|_| Error::InvalidPublicKey)?;
        let verifying = ed25519_dalek::VerifyingKey::from_bytes(&public)
            .map_err(|_| Error::InvalidPublicKey)?;
        let sig_bytes: [u8; 64] = signature
            .try_into()
            .map_err(|_| Error::SignatureVerificationFailed)?;
        let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);
        verifying
            .verify(message, &sig)
            .map_err(|_| Error::SignatureVerificationFailed)
    }

    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::Ed25519
    }
}
