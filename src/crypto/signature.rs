//! Multi-algorithm signing (§3, §4.1, §4.3).
//!
//! I2P identities are signed under one of several algorithms, selected by
//! `signing_key_type`. EdDSA-Ed25519 is the required default for newly
//! generated identities; DSA-SHA1, ECDSA-P256/P384/P521 and
//! RSA-SHA256/384/512 are retained for compatibility with existing
//! identities on the network. Every variant is reached through the same
//! `sign`/`verify` surface so callers (RouterIdentity, RouterInfo,
//! LeaseSet) never branch on algorithm themselves.

use dsa::signature::{Signer as DsaSignerTrait, Verifier as DsaVerifierTrait};
use ecdsa::signature::{Signer as EcdsaSignerTrait, Verifier as EcdsaVerifierTrait};
use ed25519_dalek::Signer as EdSignerTrait;
use ed25519_dalek::Verifier as EdVerifierTrait;
use rsa::signature::{SignatureEncoding, Signer as RsaSignerTrait, Verifier as RsaVerifierTrait};

use crate::error::{Error, Result};

/// Encryption algorithm for a Destination/RouterIdentity's crypto key.
/// Only ElGamal is implemented by this core (§3); the enum exists so
/// `KeyCertificate` can name the encryption type alongside the signing
/// type, matching the wire layout.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EncType {
    ElGamal2048,
}

impl EncType {
    pub fn code(self) -> u16 {
        match self {
            EncType::ElGamal2048 => 0,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(EncType::ElGamal2048),
            _ => None,
        }
    }

    pub fn key_len(self) -> usize {
        match self {
            EncType::ElGamal2048 => 256,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SigType {
    DsaSha1,
    EcdsaSha256P256,
    EcdsaSha384P384,
    EcdsaSha512P521,
    RsaSha2562048,
    RsaSha3843072,
    RsaSha5124096,
    Ed25519,
}

impl SigType {
    pub fn code(self) -> u16 {
        match self {
            SigType::DsaSha1 => 0,
            SigType::EcdsaSha256P256 => 1,
            SigType::EcdsaSha384P384 => 2,
            SigType::EcdsaSha512P521 => 3,
            SigType::RsaSha2562048 => 4,
            SigType::RsaSha3843072 => 5,
            SigType::RsaSha5124096 => 6,
            SigType::Ed25519 => 7,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(SigType::DsaSha1),
            1 => Some(SigType::EcdsaSha256P256),
            2 => Some(SigType::EcdsaSha384P384),
            3 => Some(SigType::EcdsaSha512P521),
            4 => Some(SigType::RsaSha2562048),
            5 => Some(SigType::RsaSha3843072),
            6 => Some(SigType::RsaSha5124096),
            7 => Some(SigType::Ed25519),
            _ => None,
        }
    }

    pub fn public_key_len(self) -> usize {
        match self {
            SigType::DsaSha1 => 128,
            SigType::EcdsaSha256P256 => 64,
            SigType::EcdsaSha384P384 => 96,
            SigType::EcdsaSha512P521 => 132,
            SigType::RsaSha2562048 => 256,
            SigType::RsaSha3843072 => 384,
            SigType::RsaSha5124096 => 512,
            SigType::Ed25519 => 32,
        }
    }

    pub fn signature_len(self) -> usize {
        match self {
            SigType::DsaSha1 => 40,
            SigType::EcdsaSha256P256 => 64,
            SigType::EcdsaSha384P384 => 96,
            SigType::EcdsaSha512P521 => 132,
            SigType::RsaSha2562048 => 256,
            SigType::RsaSha3843072 => 384,
            SigType::RsaSha5124096 => 512,
            SigType::Ed25519 => 64,
        }
    }

    pub fn private_key_len(self) -> usize {
        match self {
            SigType::DsaSha1 => 20,
            SigType::EcdsaSha256P256 => 32,
            SigType::EcdsaSha384P384 => 48,
            SigType::EcdsaSha512P521 => 66,
            SigType::RsaSha2562048 => 512,
            SigType::RsaSha3843072 => 768,
            SigType::RsaSha5124096 => 1024,
            SigType::Ed25519 => 32,
        }
    }

    /// Bytes of public-key material that overflow the identity's fixed
    /// 128-byte signing-key area and must be carried in the key
    /// certificate extension instead (§3).
    pub fn pad_len(self, _enc: &EncType) -> usize {
        self.public_key_len().saturating_sub(128)
    }
}

pub struct Signature(Vec<u8>);

impl Signature {
    pub fn from_bytes(b: &[u8]) -> Self {
        Signature(b.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Clone for Signature {
    fn clone(&self) -> Self {
        Signature(self.0.clone())
    }
}
impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({} bytes)", self.0.len())
    }
}

#[derive(Clone)]
pub enum SigningPublicKey {
    DsaSha1(Box<dsa::VerifyingKey>),
    EcdsaSha256P256(p256::ecdsa::VerifyingKey),
    EcdsaSha384P384(p384::ecdsa::VerifyingKey),
    EcdsaSha512P521(p521::ecdsa::VerifyingKey),
    RsaSha2562048(Box<rsa::pkcs1v15::VerifyingKey<sha2::Sha256>>),
    RsaSha3843072(Box<rsa::pkcs1v15::VerifyingKey<sha2::Sha384>>),
    RsaSha5124096(Box<rsa::pkcs1v15::VerifyingKey<sha2::Sha512>>),
    Ed25519(ed25519_dalek::VerifyingKey),
}

impl PartialEq for SigningPublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}
impl std::fmt::Debug for SigningPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningPublicKey({:?}, {} bytes)", self.sig_type(), self.to_bytes().len())
    }
}

impl SigningPublicKey {
    pub fn sig_type(&self) -> SigType {
        match self {
            SigningPublicKey::DsaSha1(_) => SigType::DsaSha1,
            SigningPublicKey::EcdsaSha256P256(_) => SigType::EcdsaSha256P256,
            SigningPublicKey::EcdsaSha384P384(_) => SigType::EcdsaSha384P384,
            SigningPublicKey::EcdsaSha512P521(_) => SigType::EcdsaSha512P521,
            SigningPublicKey::RsaSha2562048(_) => SigType::RsaSha2562048,
            SigningPublicKey::RsaSha3843072(_) => SigType::RsaSha3843072,
            SigningPublicKey::RsaSha5124096(_) => SigType::RsaSha5124096,
            SigningPublicKey::Ed25519(_) => SigType::Ed25519,
        }
    }

    pub fn from_bytes(ty: SigType, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ty.public_key_len() {
            return Err(Error::parse("SigningPublicKey::from_bytes", "bad length"));
        }
        Ok(match ty {
            SigType::DsaSha1 => {
                let (p, q, g) = dsa_domain_params();
                let y = num_bigint::BigUint::from_bytes_be(bytes);
                let components = dsa::Components::from_components(p, q, g)
                    .map_err(|e| Error::parse("SigningPublicKey::from_bytes", e.to_string()))?;
                let vk = dsa::VerifyingKey::from_components(components, y)
                    .map_err(|e| Error::parse("SigningPublicKey::from_bytes", e.to_string()))?;
                SigningPublicKey::DsaSha1(Box::new(vk))
            }
            SigType::EcdsaSha256P256 => {
                SigningPublicKey::EcdsaSha256P256(ecdsa_p256_from_raw(bytes)?)
            }
            SigType::EcdsaSha384P384 => {
                SigningPublicKey::EcdsaSha384P384(ecdsa_p384_from_raw(bytes)?)
            }
            SigType::EcdsaSha512P521 => {
                SigningPublicKey::EcdsaSha512P521(ecdsa_p521_from_raw(bytes)?)
            }
            SigType::RsaSha2562048 => SigningPublicKey::RsaSha2562048(Box::new(
                rsa::pkcs1v15::VerifyingKey::new(rsa_pubkey_from_raw(bytes)?),
            )),
            SigType::RsaSha3843072 => SigningPublicKey::RsaSha3843072(Box::new(
                rsa::pkcs1v15::VerifyingKey::new(rsa_pubkey_from_raw(bytes)?),
            )),
            SigType::RsaSha5124096 => SigningPublicKey::RsaSha5124096(Box::new(
                rsa::pkcs1v15::VerifyingKey::new(rsa_pubkey_from_raw(bytes)?),
            )),
            SigType::Ed25519 => {
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| Error::parse("SigningPublicKey::from_bytes", "bad length"))?;
                let vk = ed25519_dalek::VerifyingKey::from_bytes(&arr)
                    .map_err(|e| Error::parse("SigningPublicKey::from_bytes", e.to_string()))?;
                SigningPublicKey::Ed25519(vk)
            }
        })
    }

    pub fn from_secret(sk: &SigningPrivateKey) -> Result<Self> {
        Ok(match sk {
            SigningPrivateKey::DsaSha1(s) => SigningPublicKey::DsaSha1(Box::new(s.verifying_key().clone())),
            SigningPrivateKey::EcdsaSha256P256(s) => {
                SigningPublicKey::EcdsaSha256P256(*s.verifying_key())
            }
            SigningPrivateKey::EcdsaSha384P384(s) => {
                SigningPublicKey::EcdsaSha384P384(*s.verifying_key())
            }
            SigningPrivateKey::EcdsaSha512P521(s) => {
                SigningPublicKey::EcdsaSha512P521(*s.verifying_key())
            }
            SigningPrivateKey::RsaSha2562048(s) => SigningPublicKey::RsaSha2562048(Box::new(
                rsa::pkcs1v15::VerifyingKey::new(s.as_ref().to_public_key()),
            )),
            SigningPrivateKey::RsaSha3843072(s) => SigningPublicKey::RsaSha3843072(Box::new(
                rsa::pkcs1v15::VerifyingKey::new(s.as_ref().to_public_key()),
            )),
            SigningPrivateKey::RsaSha5124096(s) => SigningPublicKey::RsaSha5124096(Box::new(
                rsa::pkcs1v15::VerifyingKey::new(s.as_ref().to_public_key()),
            )),
            SigningPrivateKey::Ed25519(s) => SigningPublicKey::Ed25519(s.verifying_key()),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            SigningPublicKey::DsaSha1(k) => pad_left(k.y().to_bytes_be(), 128),
            SigningPublicKey::EcdsaSha256P256(k) => {
                k.to_encoded_point(false).as_bytes()[1..].to_vec()
            }
            SigningPublicKey::EcdsaSha384P384(k) => {
                k.to_encoded_point(false).as_bytes()[1..].to_vec()
            }
            SigningPublicKey::EcdsaSha512P521(k) => {
                k.to_encoded_point(false).as_bytes()[1..].to_vec()
            }
            SigningPublicKey::RsaSha2562048(k) => {
                pad_left(k.as_ref().n().to_bytes_be(), 256)
            }
            SigningPublicKey::RsaSha3843072(k) => {
                pad_left(k.as_ref().n().to_bytes_be(), 384)
            }
            SigningPublicKey::RsaSha5124096(k) => {
                pad_left(k.as_ref().n().to_bytes_be(), 512)
            }
            SigningPublicKey::Ed25519(k) => k.to_bytes().to_vec(),
        }
    }

    pub fn verify(&self, msg: &[u8], sig: &Signature) -> Result<()> {
        let ok = match self {
            SigningPublicKey::DsaSha1(k) => {
                let s = decode_dsa_sig(sig.as_bytes())?;
                DsaVerifierTrait::verify(k.as_ref(), msg, &s).is_ok()
            }
            SigningPublicKey::EcdsaSha256P256(k) => {
                match p256::ecdsa::Signature::from_slice(sig.as_bytes()) {
                    Ok(s) => EcdsaVerifierTrait::verify(k, msg, &s).is_ok(),
                    Err(_) => false,
                }
            }
            SigningPublicKey::EcdsaSha384P384(k) => {
                match p384::ecdsa::Signature::from_slice(sig.as_bytes()) {
                    Ok(s) => EcdsaVerifierTrait::verify(k, msg, &s).is_ok(),
                    Err(_) => false,
                }
            }
            SigningPublicKey::EcdsaSha512P521(k) => {
                match p521::ecdsa::Signature::from_slice(sig.as_bytes()) {
                    Ok(s) => EcdsaVerifierTrait::verify(k, msg, &s).is_ok(),
                    Err(_) => false,
                }
            }
            SigningPublicKey::RsaSha2562048(k) => match rsa::pkcs1v15::Signature::try_from(sig.as_bytes()) {
                Ok(s) => RsaVerifierTrait::verify(k.as_ref(), msg, &s).is_ok(),
                Err(_) => false,
            },
            SigningPublicKey::RsaSha3843072(k) => match rsa::pkcs1v15::Signature::try_from(sig.as_bytes()) {
                Ok(s) => RsaVerifierTrait::verify(k.as_ref(), msg, &s).is_ok(),
                Err(_) => false,
            },
            SigningPublicKey::RsaSha5124096(k) => match rsa::pkcs1v15::Signature::try_from(sig.as_bytes()) {
                Ok(s) => RsaVerifierTrait::verify(k.as_ref(), msg, &s).is_ok(),
                Err(_) => false,
            },
            SigningPublicKey::Ed25519(k) => {
                match ed25519_dalek::Signature::from_slice(sig.as_bytes()) {
                    Ok(s) => EdVerifierTrait::verify(k, msg, &s).is_ok(),
                    Err(_) => false,
                }
            }
        };
        if ok {
            Ok(())
        } else {
            Err(Error::verify("signature::verify", "signature mismatch"))
        }
    }
}

#[derive(Clone)]
pub enum SigningPrivateKey {
    DsaSha1(Box<dsa::SigningKey>),
    EcdsaSha256P256(p256::ecdsa::SigningKey),
    EcdsaSha384P384(p384::ecdsa::SigningKey),
    EcdsaSha512P521(p521::ecdsa::SigningKey),
    RsaSha2562048(Box<rsa::pkcs1v15::SigningKey<sha2::Sha256>>),
    RsaSha3843072(Box<rsa::pkcs1v15::SigningKey<sha2::Sha384>>),
    RsaSha5124096(Box<rsa::pkcs1v15::SigningKey<sha2::Sha512>>),
    Ed25519(ed25519_dalek::SigningKey),
}

impl SigningPrivateKey {
    pub fn generate(ty: SigType) -> Self {
        let mut rng = rand::rngs::OsRng;
        match ty {
            SigType::DsaSha1 => {
                let (p, q, g) = dsa_domain_params();
                let components = dsa::Components::from_components(p, q, g)
                    .expect("valid I2P DSA domain parameters");
                let sk = dsa::SigningKey::generate(&mut rng, components);
                SigningPrivateKey::DsaSha1(Box::new(sk))
            }
            SigType::EcdsaSha256P256 => {
                SigningPrivateKey::EcdsaSha256P256(p256::ecdsa::SigningKey::random(&mut rng))
            }
            SigType::EcdsaSha384P384 => {
                SigningPrivateKey::EcdsaSha384P384(p384::ecdsa::SigningKey::random(&mut rng))
            }
            SigType::EcdsaSha512P521 => {
                SigningPrivateKey::EcdsaSha512P521(p521::ecdsa::SigningKey::random(&mut rng))
            }
            SigType::RsaSha2562048 => SigningPrivateKey::RsaSha2562048(Box::new(
                rsa::pkcs1v15::SigningKey::new(
                    rsa::RsaPrivateKey::new(&mut rng, 2048).expect("rsa keygen"),
                ),
            )),
            SigType::RsaSha3843072 => SigningPrivateKey::RsaSha3843072(Box::new(
                rsa::pkcs1v15::SigningKey::new(
                    rsa::RsaPrivateKey::new(&mut rng, 3072).expect("rsa keygen"),
                ),
            )),
            SigType::RsaSha5124096 => SigningPrivateKey::RsaSha5124096(Box::new(
                rsa::pkcs1v15::SigningKey::new(
                    rsa::RsaPrivateKey::new(&mut rng, 4096).expect("rsa keygen"),
                ),
            )),
            SigType::Ed25519 => {
                SigningPrivateKey::Ed25519(ed25519_dalek::SigningKey::generate(&mut rng))
            }
        }
    }

    pub fn sig_type(&self) -> SigType {
        match self {
            SigningPrivateKey::DsaSha1(_) => SigType::DsaSha1,
            SigningPrivateKey::EcdsaSha256P256(_) => SigType::EcdsaSha256P256,
            SigningPrivateKey::EcdsaSha384P384(_) => SigType::EcdsaSha384P384,
            SigningPrivateKey::EcdsaSha512P521(_) => SigType::EcdsaSha512P521,
            SigningPrivateKey::RsaSha2562048(_) => SigType::RsaSha2562048,
            SigningPrivateKey::RsaSha3843072(_) => SigType::RsaSha3843072,
            SigningPrivateKey::RsaSha5124096(_) => SigType::RsaSha5124096,
            SigningPrivateKey::Ed25519(_) => SigType::Ed25519,
        }
    }

    pub fn sign(&self, msg: &[u8]) -> Signature {
        match self {
            SigningPrivateKey::DsaSha1(k) => {
                let sig: dsa::Signature = DsaSignerTrait::sign(k.as_ref(), msg);
                Signature::from_bytes(&encode_dsa_sig(&sig))
            }
            SigningPrivateKey::EcdsaSha256P256(k) => {
                let sig: p256::ecdsa::Signature = EcdsaSignerTrait::sign(k, msg);
                Signature::from_bytes(&sig.to_bytes())
            }
            SigningPrivateKey::EcdsaSha384P384(k) => {
                let sig: p384::ecdsa::Signature = EcdsaSignerTrait::sign(k, msg);
                Signature::from_bytes(&sig.to_bytes())
            }
            SigningPrivateKey::EcdsaSha512P521(k) => {
                let sig: p521::ecdsa::Signature = EcdsaSignerTrait::sign(k, msg);
                Signature::from_bytes(&sig.to_bytes())
            }
            SigningPrivateKey::RsaSha2562048(k) => {
                let sig = RsaSignerTrait::sign(k.as_ref(), msg);
                Signature::from_bytes(&sig.to_vec())
            }
            SigningPrivateKey::RsaSha3843072(k) => {
                let sig = RsaSignerTrait::sign(k.as_ref(), msg);
                Signature::from_bytes(&sig.to_vec())
            }
            SigningPrivateKey::RsaSha5124096(k) => {
                let sig = RsaSignerTrait::sign(k.as_ref(), msg);
                Signature::from_bytes(&sig.to_vec())
            }
            SigningPrivateKey::Ed25519(k) => {
                let sig = EdSignerTrait::sign(k, msg);
                Signature::from_bytes(&sig.to_bytes())
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            SigningPrivateKey::DsaSha1(k) => pad_left(k.x().to_bytes_be(), 20),
            SigningPrivateKey::EcdsaSha256P256(k) => k.to_bytes().to_vec(),
            SigningPrivateKey::EcdsaSha384P384(k) => k.to_bytes().to_vec(),
            SigningPrivateKey::EcdsaSha512P521(k) => k.to_bytes().to_vec(),
            SigningPrivateKey::RsaSha2562048(k) => k.as_ref().to_pkcs1_der_vec(),
            SigningPrivateKey::RsaSha3843072(k) => k.as_ref().to_pkcs1_der_vec(),
            SigningPrivateKey::RsaSha5124096(k) => k.as_ref().to_pkcs1_der_vec(),
            SigningPrivateKey::Ed25519(k) => k.to_bytes().to_vec(),
        }
    }
}

/// Helper used only by the byte-oriented `to_bytes` impls above; the `rsa`
/// crate key types don't expose a fixed-width raw encoding; this keeps the
/// trait object boundary simple for on-disk `router.keys` persistence. Full
/// PKCS#1 DER round-tripping for RSA private keys is handled by the `rsa`
/// crate itself when loading from `router.keys`.
trait ToPkcs1DerVec {
    fn to_pkcs1_der_vec(&self) -> Vec<u8>;
}
impl ToPkcs1DerVec for rsa::RsaPrivateKey {
    fn to_pkcs1_der_vec(&self) -> Vec<u8> {
        use rsa::pkcs1::EncodeRsaPrivateKey;
        self.to_pkcs1_der()
            .map(|d| d.as_bytes().to_vec())
            .unwrap_or_default()
    }
}

fn pad_left(mut bytes: Vec<u8>, len: usize) -> Vec<u8> {
    if bytes.len() < len {
        let mut padded = vec![0u8; len - bytes.len()];
        padded.append(&mut bytes);
        padded
    } else if bytes.len() > len {
        bytes[bytes.len() - len..].to_vec()
    } else {
        bytes
    }
}

fn ecdsa_p256_from_raw(bytes: &[u8]) -> Result<p256::ecdsa::VerifyingKey> {
    let mut sec1 = vec![0x04u8];
    sec1.extend_from_slice(bytes);
    p256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1)
        .map_err(|e| Error::parse("ecdsa_p256", e.to_string()))
}
fn ecdsa_p384_from_raw(bytes: &[u8]) -> Result<p384::ecdsa::VerifyingKey> {
    let mut sec1 = vec![0x04u8];
    sec1.extend_from_slice(bytes);
    p384::ecdsa::VerifyingKey::from_sec1_bytes(&sec1)
        .map_err(|e| Error::parse("ecdsa_p384", e.to_string()))
}
fn ecdsa_p521_from_raw(bytes: &[u8]) -> Result<p521::ecdsa::VerifyingKey> {
    let mut sec1 = vec![0x04u8];
    sec1.extend_from_slice(bytes);
    p521::ecdsa::VerifyingKey::from_sec1_bytes(&sec1)
        .map_err(|e| Error::parse("ecdsa_p521", e.to_string()))
}

fn rsa_pubkey_from_raw(bytes: &[u8]) -> Result<rsa::RsaPublicKey> {
    let n = rsa::BigUint::from_bytes_be(bytes);
    let e = rsa::BigUint::from(65537u32);
    rsa::RsaPublicKey::new(n, e).map_err(|e| Error::parse("rsa_pubkey", e.to_string()))
}

fn decode_dsa_sig(bytes: &[u8]) -> Result<dsa::Signature> {
    if bytes.len() != 40 {
        return Err(Error::parse("decode_dsa_sig", "expected 40 bytes"));
    }
    let r = num_bigint::BigUint::from_bytes_be(&bytes[0..20]);
    let s = num_bigint::BigUint::from_bytes_be(&bytes[20..40]);
    dsa::Signature::from_components(r, s)
        .map_err(|e| Error::parse("decode_dsa_sig", e.to_string()))
}

fn encode_dsa_sig(sig: &dsa::Signature) -> Vec<u8> {
    let mut out = Vec::with_capacity(40);
    out.extend_from_slice(&pad_left(sig.r().to_bytes_be(), 20));
    out.extend_from_slice(&pad_left(sig.s().to_bytes_be(), 20));
    out
}

/// I2P's fixed 1024-bit DSA domain parameters (p, q, g), shared by every
/// legacy DSA-SHA1 identity on the network (§3): a 1024-bit prime modulus
/// `p` with `q` (a 160-bit prime) dividing `p - 1`, and a generator `g`
/// of order `q` in the multiplicative group mod `p`.
fn dsa_domain_params() -> (num_bigint::BigUint, num_bigint::BigUint, num_bigint::BigUint) {
    use num_bigint::BigUint;
    let p = BigUint::parse_bytes(
        concat!(
            "C2686B2BA4FEC031A0F959704FDD2C32B722F8FA9D8E922B27B59B31D61B18250803",
            "81E94CF3F6C2B965711D5293A3AF853674D4532ADBD5075602B357825EF665DF3F17",
            "AE179FC533C14E6166B92131A9AAECDF987609F520F809835B188239F14231F1C6F6",
            "FC6DD90678F6395BA8A93C85904B460016A1501B4D1D44973BFF"
        )
        .as_bytes(),
        16,
    )
    .expect("valid hex");
    let q = BigUint::parse_bytes(b"A5DFC28FEF4CA1E286744CD8EED9D29D684046B7", 16).expect("valid hex");
    let g = BigUint::parse_bytes(
        concat!(
            "A58C59A62396C21B028E1A3F8EFEE4201232CBC6C5296AF4121B4ECBE5A01A1BDCAA",
            "39D8141304AB62F88143B877A3940B0253D0B4ED8D68608FEA63FF36C316985FC383",
            "54868FBBC102F0D085CE181D85BC95E07D27F68E3CCEF1F3017FD7F5A81B324D3938",
            "0F97F66430311E3DD713B5C51971730813E18A96FCCD9510A002"
        )
        .as_bytes(),
        16,
    )
    .expect("valid hex");
    (p, q, g)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ed25519_roundtrip() {
        let sk = SigningPrivateKey::generate(SigType::Ed25519);
        let pk = SigningPublicKey::from_secret(&sk).unwrap();
        let msg = b"From anonimal, with love <3";
        let sig = sk.sign(msg);
        assert!(pk.verify(msg, &sig).is_ok());

        let bad_msg = vec![0u8; msg.len()];
        assert!(pk.verify(&bad_msg, &sig).is_err());

        let bad_sig = Signature::from_bytes(&vec![0u8; sig.as_bytes().len()]);
        assert!(pk.verify(msg, &bad_sig).is_err());
    }

    #[test]
    fn ecdsa_p256_roundtrip() {
        let sk = SigningPrivateKey::generate(SigType::EcdsaSha256P256);
        let pk = SigningPublicKey::from_secret(&sk).unwrap();
        let msg = b"hello tunnel build";
        let sig = sk.sign(msg);
        assert!(pk.verify(msg, &sig).is_ok());
    }
}
