//! Crypto primitives (§4.1): ElGamal over the 2048-bit MODP group, AES-256-CBC,
//! SHA-256, and the multi-algorithm signature suites used to sign
//! RouterIdentity/RouterInfo/LeaseSet and tunnel-build clove certs.

pub mod aes_cbc;
pub mod elgamal;
pub mod rng;
pub mod signature;

pub use signature::{EncType, SigType, Signature, SigningPrivateKey, SigningPublicKey};

use sha2::{Digest, Sha256};

use crate::constants::ELGAMAL_KEY_LEN;

pub fn sha256(buf: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(buf));
    out
}

/// A 256-byte ElGamal public (crypto) key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PublicKey(pub [u8; ELGAMAL_KEY_LEN]);

impl PublicKey {
    pub fn from_secret(sk: &PrivateKey) -> Self {
        PublicKey(elgamal::public_from_private(&sk.0))
    }

    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() != ELGAMAL_KEY_LEN {
            return None;
        }
        let mut out = [0u8; ELGAMAL_KEY_LEN];
        out.copy_from_slice(buf);
        Some(PublicKey(out))
    }
}

/// A 256-byte ElGamal private key.
#[derive(Clone)]
pub struct PrivateKey(pub [u8; ELGAMAL_KEY_LEN]);

impl PrivateKey {
    pub fn new() -> Self {
        PrivateKey(elgamal::generate_private_key())
    }
}

impl Default for PrivateKey {
    fn default() -> Self {
        Self::new()
    }
}
