//! Key exchange implementations (X25519, ECDH P-256).

use oxtls_crypto::{
    key_exchange::{NamedGroup, PrivateKey, PublicKey, SharedSecret},
    Error, KeyExchange, Result,
};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::OsRng;

/// Create a key exchange instance for the specified group.
pub(crate) fn create_key_exchange(group: NamedGroup) -> Result<Box<dyn KeyExchange>> {
    match group {
        NamedGroup::X25519 => Ok(Box::new(X25519Kex)),
        NamedGroup::Secp256r1 => Ok(Box::new(EcdhP256)),
        NamedGroup::X448 | NamedGroup::Secp384r1 | NamedGroup::Secp521r1 => Err(
            Error::UnsupportedAlgorithm(format!("key exchange group {:?}", group)),
        ),
    }
}

/// X25519 Diffie-Hellman (RFC 7748), the TLS 1.3 mandatory group.
#[derive(Debug)]
struct X25519Kex;

impl KeyExchange for X25519Kex {
    fn generate_keypair(&self) -> Result<(PrivateKey, PublicKey)> {
        let secret = x25519_dalek::StaticSecret::random_from_rng(OsRng);
        let public = x25519_dalek::PublicKey::from(&secret);
        Ok((
            PrivateKey::from_bytes(secret.to_bytes().to_vec()),
            PublicKey::from_bytes(public.as_bytes().to_vec()),
        ))
    }

    fn exchange(&self, private_key: &PrivateKey, peer_public_key: &[u8]) -> Result<SharedSecret> {
        let private: [u8; 32] = private_key
            .as_bytes()
            .try_into()
            .map_err(|_| Error::InvalidPrivateKey)?;
        let peer: [u8; 32] = peer_public_key
            .try_into()
            .map_err(|_| Error::InvalidPublicKey)?;
        let secret = x25519_dalek::StaticSecret::from(private);
        let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(peer));
        // An all-zero output means the peer sent a low-order point
        if shared.as_bytes().iter().all(|&b| b == 0) {
            return Err(Error::KeyExchangeFailed);
        }
        Ok(SharedSecret::from_bytes(shared.as_bytes().to_vec()))
    }

    fn group(&self) -> NamedGroup {
        NamedGroup::X25519
    }
}

/// ECDH on NIST P-256, with uncompressed SEC1 point encoding.
#[derive(Debug)]
struct EcdhP256;

impl KeyExchange for EcdhP256 {
    fn generate_keypair(&self) -> Result<(PrivateKey, PublicKey)> {
        let secret = p256::SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        let encoded = public.to_encoded_point(false);
        Ok((
            PrivateKey::from_bytes(secret.to_bytes().to_vec()),
            PublicKey::from_bytes(encoded.as_bytes().to_vec()),
        ))
    }

    fn exchange(&self, private_key: &PrivateKey, peer_public_key: &[u8]) -> Result<SharedSecret> {
        let secret = p256::SecretKey::from_slice(private_key.as_bytes())
            .map_err(|_| Error::InvalidPrivateKey)?;
        let peer =
            p256::PublicKey::from_sec1_bytes(peer_public_key).map_err(|_| Error::InvalidPublicKey)?;
        let shared =
            p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());
        Ok(SharedSecret::from_bytes(
            shared.raw_secret_bytes().to_vec(),
        ))
    }

    fn group(&self) -> NamedGroup {
        NamedGroup::Secp256r1
    }
}
