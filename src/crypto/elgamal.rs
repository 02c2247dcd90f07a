//! ElGamal encrypt/decrypt over the 2048-bit MODP group (§3, §4.1).
//!
//! I2P identities carry a 256-byte ElGamal public key; the private key is
//! a 256-byte exponent. Plaintext blocks are always exactly
//! [`constants::ELGAMAL_PLAINTEXT_LEN`] bytes; ciphertext blocks are always
//! exactly [`constants::ELGAMAL_CIPHERTEXT_LEN`] bytes, formed as
//! `0x00 ‖ a[256] ‖ 0x00 ‖ b[256]` where `a = g^k mod p`, `b = y^k * m mod p`.
//!
//! The 222-byte plaintext is embedded in the 255-byte exponent message `m`
//! as `0xFF ‖ SHA-256(payload)[32] ‖ payload[222]`, following the padding
//! scheme real I2P routers use so decryption can detect a corrupted or
//! mismatched key before trusting the recovered payload.

use lazy_static::lazy_static;
use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use sha2::{Digest, Sha256};

use crate::constants::{ELGAMAL_CIPHERTEXT_LEN, ELGAMAL_KEY_LEN, ELGAMAL_PLAINTEXT_LEN};
use crate::error::{Error, Result};

lazy_static! {
    /// RFC 3526 MODP Group 14 (2048-bit), the standard prime I2P's ElGamal
    /// keys are drawn from.
    static ref P: BigUint = BigUint::parse_bytes(
        concat!(
            "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD",
            "129024E088A67CC74020BBEA63B139B22514A08798E3404DDEF9519",
            "B3CD3A431B302B0A6DF25F14374FE1356D6D51C245E485B576625E7",
            "EC6F44C42E9A637ED6B0BFF5CB6F406B7EDEE386BFB5A899FA5AE9F2",
            "4117C4B1FE649286651ECE45B3DC2007CB8A163BF0598DA48361C55",
            "D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB9ED",
            "529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E",
            "36CE3BE39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9D",
            "E2BCBF6955817183995497CEA956AE515D2261898FA051015728E5A",
            "8AACAA68FFFFFFFFFFFFFFFF"
        )
        .as_bytes(),
        16
    )
    .expect("valid hex constant");
    static ref G: BigUint = BigUint::from(2u32);
}

fn pad_left(mut bytes: Vec<u8>, len: usize) -> Vec<u8> {
    if bytes.len() < len {
        let mut padded = vec![0u8; len - bytes.len()];
        padded.append(&mut bytes);
        padded
    } else {
        bytes
    }
}

pub fn generate_private_key() -> [u8; ELGAMAL_KEY_LEN] {
    let mut rng = rand::thread_rng();
    let x = rng.gen_biguint_below(&P);
    let bytes = pad_left(x.to_bytes_be(), ELGAMAL_KEY_LEN);
    let mut out = [0u8; ELGAMAL_KEY_LEN];
    out.copy_from_slice(&bytes);
    out
}

pub fn public_from_private(sk: &[u8; ELGAMAL_KEY_LEN]) -> [u8; ELGAMAL_KEY_LEN] {
    let x = BigUint::from_bytes_be(sk);
    let y = G.modpow(&x, &P);
    let bytes = pad_left(y.to_bytes_be(), ELGAMAL_KEY_LEN);
    let mut out = [0u8; ELGAMAL_KEY_LEN];
    out.copy_from_slice(&bytes);
    out
}

/// Encrypt a 222-byte plaintext block for the given public key, producing a
/// 514-byte ciphertext block.
pub fn encrypt(
    pk: &[u8; ELGAMAL_KEY_LEN],
    plaintext: &[u8; ELGAMAL_PLAINTEXT_LEN],
) -> [u8; ELGAMAL_CIPHERTEXT_LEN] {
    let y = BigUint::from_bytes_be(pk);

    let mut m_bytes = Vec::with_capacity(255);
    m_bytes.push(0xFFu8);
    m_bytes.extend_from_slice(&Sha256::digest(&plaintext[..]));
    m_bytes.extend_from_slice(&plaintext[..]);
    debug_assert_eq!(m_bytes.len(), 255);
    let m = BigUint::from_bytes_be(&m_bytes);

    let mut rng = rand::thread_rng();
    let k = loop {
        let candidate = rng.gen_biguint_below(&P);
        if !candidate.is_zero() {
            break candidate;
        }
    };

    let a = G.modpow(&k, &P);
    let b = (&m * y.modpow(&k, &P)) % &*P;

    let a_bytes = pad_left(a.to_bytes_be(), ELGAMAL_KEY_LEN);
    let b_bytes = pad_left(b.to_bytes_be(), ELGAMAL_KEY_LEN);

    let mut out = [0u8; ELGAMAL_CIPHERTEXT_LEN];
    out[0] = 0;
    out[1..1 + ELGAMAL_KEY_LEN].copy_from_slice(&a_bytes);
    out[1 + ELGAMAL_KEY_LEN] = 0;
    out[2 + ELGAMAL_KEY_LEN..].copy_from_slice(&b_bytes);
    out
}

/// Decrypt a 514-byte ciphertext block, returning the original 222-byte
/// plaintext. Fails with [`Error::Crypto`] if the recovered value does not
/// carry the expected marker byte and payload hash (wrong key, corrupted
/// ciphertext, or an attacker-forged block).
pub fn decrypt(
    sk: &[u8; ELGAMAL_KEY_LEN],
    ciphertext: &[u8; ELGAMAL_CIPHERTEXT_LEN],
) -> Result<[u8; ELGAMAL_PLAINTEXT_LEN]> {
    let a = BigUint::from_bytes_be(&ciphertext[1..1 + ELGAMAL_KEY_LEN]);
    let b = BigUint::from_bytes_be(&ciphertext[2 + ELGAMAL_KEY_LEN..]);
    let x = BigUint::from_bytes_be(sk);

    // m = b * a^(p-1-x) mod p  (a^-x mod p via Fermat's little theorem)
    let one = BigUint::one();
    let exp = &*P - &one - &x;
    let s_inv = a.modpow(&exp, &P);
    let m = (&b * &s_inv) % &*P;

    let m_bytes = pad_left(m.to_bytes_be(), 255);
    if m_bytes[0] != 0xFF {
        return Err(Error::crypto("elgamal_decrypt", "bad marker byte"));
    }
    let expected_hash = &m_bytes[1..33];
    let payload = &m_bytes[33..255];
    let actual_hash = Sha256::digest(payload);
    if expected_hash != actual_hash.as_slice() {
        return Err(Error::crypto("elgamal_decrypt", "payload hash mismatch"));
    }

    let mut out = [0u8; ELGAMAL_PLAINTEXT_LEN];
    out.copy_from_slice(payload);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rng::rand_bytes;

    #[test]
    fn round_trips() {
        let sk = generate_private_key();
        let pk = public_from_private(&sk);

        let mut plaintext = [0u8; ELGAMAL_PLAINTEXT_LEN];
        rand_bytes(&mut plaintext);

        let ct = encrypt(&pk, &plaintext);
        assert_eq!(ct.len(), ELGAMAL_CIPHERTEXT_LEN);
        let recovered = decrypt(&sk, &ct).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let sk = generate_private_key();
        let pk = public_from_private(&sk);
        let other_sk = generate_private_key();

        let mut plaintext = [0u8; ELGAMAL_PLAINTEXT_LEN];
        rand_bytes(&mut plaintext);
        let ct = encrypt(&pk, &plaintext);

        assert!(decrypt(&other_sk, &ct).is_err());
    }
}
