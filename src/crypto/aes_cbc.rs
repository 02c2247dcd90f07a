//! AES-256-CBC, used unpadded throughout the router core: every buffer
//! handed in is already a multiple of the 16-byte block size (build
//! records, tunnel-data payloads, garlic AES blocks are all pre-sized), so
//! encryption/decryption happen in place with no padding oracle surface.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::error::{Error, Result};

type Enc = cbc::Encryptor<aes::Aes256>;
type Dec = cbc::Decryptor<aes::Aes256>;

/// Encrypts `buf` in place under CBC mode. `buf.len()` must be a multiple
/// of 16; returns `Error::Crypto` otherwise (a logic bug, not attacker
/// input, since all callers size their buffers from fixed record lengths).
pub fn encrypt(key: &[u8; 32], iv: &[u8; 16], buf: &mut [u8]) -> Result<()> {
    if buf.len() % 16 != 0 {
        return Err(Error::crypto("aes256_cbc_enc", "buffer not block-aligned"));
    }
    let mut enc = Enc::new(key.into(), iv.into());
    for block in buf.chunks_mut(16) {
        enc.encrypt_block_mut(block.into());
    }
    Ok(())
}

pub fn decrypt(key: &[u8; 32], iv: &[u8; 16], buf: &mut [u8]) -> Result<()> {
    if buf.len() % 16 != 0 {
        return Err(Error::crypto("aes256_cbc_dec", "buffer not block-aligned"));
    }
    let mut dec = Dec::new(key.into(), iv.into());
    for block in buf.chunks_mut(16) {
        dec.decrypt_block_mut(block.into());
    }
    Ok(())
}

/// Single-block AES-ECB-style encryption used for tunnel-data IV
/// obfuscation (§4.7): "decrypt IV with iv_key (AES single block)".
pub fn encrypt_block(key: &[u8; 32], block: &mut [u8; 16]) {
    let enc = Enc::new(key.into(), &[0u8; 16].into());
    enc.encrypt_block_mut(block.into());
}

pub fn decrypt_block(key: &[u8; 32], block: &mut [u8; 16]) {
    let dec = Dec::new(key.into(), &[0u8; 16].into());
    dec.decrypt_block_mut(block.into());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_multi_block() {
        let key = [7u8; 32];
        let iv = [9u8; 16];
        let original = vec![42u8; 64];
        let mut buf = original.clone();
        encrypt(&key, &iv, &mut buf).unwrap();
        assert_ne!(buf, original);
        decrypt(&key, &iv, &mut buf).unwrap();
        assert_eq!(buf, original);
    }

    #[test]
    fn rejects_unaligned_buffers() {
        let key = [0u8; 32];
        let iv = [0u8; 16];
        let mut buf = vec![0u8; 17];
        assert!(encrypt(&key, &iv, &mut buf).is_err());
    }
}
