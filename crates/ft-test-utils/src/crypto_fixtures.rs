//! Deterministic cryptographic fixtures for testing
//!
//! The same seed always produces the same Ed25519 key pair.

use base64::engine::general_purpose;
use base64::Engine;
use ring::signature::{Ed25519KeyPair, KeyPair};
use secrecy::SecretString;
use thiserror::Error;
use token_service::signer::{Ed25519Signer, DEFAULT_CLOCK_SKEW};

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),
}

fn seed_bytes(seed: u8) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    bytes[0] = seed;
    for (i, byte) in bytes.iter_mut().enumerate().skip(1) {
        *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
    }
    bytes
}

/// Deterministic Ed25519 key for `seed`.
///
/// Returns `(raw_public_key, private_key_pkcs8)`.
pub fn test_signing_key(seed: u8) -> Result<(Vec<u8>, Vec<u8>), FixtureError> {
    let seed = seed_bytes(seed);
    let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed)
        .map_err(|e| FixtureError::Crypto(format!("Failed to generate test keypair: {e:?}")))?;
    Ok((key_pair.public_key().as_ref().to_vec(), build_pkcs8_from_seed(&seed)))
}

/// Base64 PKCS#8 key in the `TOKEN_SIGNING_KEY` format.
pub fn test_signing_key_base64(seed: u8) -> Result<SecretString, FixtureError> {
    let (_, pkcs8) = test_signing_key(seed)?;
    Ok(SecretString::from(general_purpose::STANDARD.encode(pkcs8)))
}

/// Production signer over the deterministic key for `seed`.
pub fn test_signer(seed: u8) -> Ed25519Signer {
    let (_, pkcs8) = test_signing_key(seed).unwrap();
    Ed25519Signer::from_pkcs8(&pkcs8, DEFAULT_CLOCK_SKEW).unwrap()
}

/// PKCS#8 v1 document (RFC 5208) wrapping a raw Ed25519 seed.
fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    let mut pkcs8 = Vec::with_capacity(48);
    // SEQUENCE, 46 bytes
    pkcs8.extend_from_slice(&[0x30, 0x2e]);
    // version INTEGER 0
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);
    // AlgorithmIdentifier { OID 1.3.101.112 }
    pkcs8.extend_from_slice(&[0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70]);
    // privateKey OCTET STRING { OCTET STRING seed }
    pkcs8.extend_from_slice(&[0x04, 0x22, 0x04, 0x20]);
    pkcs8.extend_from_slice(seed);
    pkcs8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_key_is_deterministic() {
        let (pub1, priv1) = test_signing_key(1).unwrap();
        let (pub2, priv2) = test_signing_key(1).unwrap();
        assert_eq!(pub1, pub2);
        assert_eq!(priv1, priv2);
        assert_eq!(priv1.len(), 48);
    }

    #[test]
    fn test_different_seeds_produce_different_keys() {
        let (pub1, _) = test_signing_key(1).unwrap();
        let (pub2, _) = test_signing_key(2).unwrap();
        assert_ne!(pub1, pub2);
    }

    #[test]
    fn test_fixture_key_loads_into_signer() {
        let signer = test_signer(7);
        let again = test_signer(7);
        assert_eq!(signer.key_id(), again.key_id());
    }
}
