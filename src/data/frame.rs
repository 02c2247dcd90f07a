//! Wire parsers (nom) and serializers (cookie_factory) for the
//! common-structures layer (§3, §6): Hash, Mapping, Certificate,
//! RouterIdentity, RouterAddress, RouterInfo, Lease, LeaseSet.
//!
//! Parsing is declarative (nom combinators) reading left to right off a
//! borrowed `&[u8]`; generation mirrors it on the write side with
//! `cookie_factory`'s `do_gen!` combinators writing into a `(&mut [u8],
//! usize)` cursor, growing and retrying on `GenError::BufferTooSmall`
//! the same way the callers in `data::mod` do for the other record
//! types.

use cookie_factory::{do_gen, gen_be_u16, gen_be_u32, gen_be_u64, gen_be_u8, gen_slice, GenError};
use nom::bytes::complete::take;
use nom::multi::count;
use nom::number::complete::{be_u16, be_u32, be_u64, be_u8};
use nom::IResult;
use std::collections::HashMap;

use crate::crypto::{EncType, PrivateKey, PublicKey, SigType, Signature, SigningPrivateKey, SigningPublicKey};
use crate::data::{
    Certificate, Hash, I2PDate, I2PString, KeyCertificate, Lease, LeaseSet, Mapping,
    RouterAddress, RouterIdentity, RouterInfo, RouterSecretKeys, TunnelId,
};

/// A cookie_factory write cursor: the remaining output buffer and the
/// offset already written into it.
pub type WriteContext<'a> = (&'a mut [u8], usize);

pub fn hash(input: &[u8]) -> IResult<&[u8], Hash> {
    let (input, bytes) = take(32usize)(input)?;
    Ok((input, Hash::from_slice(bytes)))
}

pub fn gen_hash<'a>(input: WriteContext<'a>, h: &Hash) -> Result<WriteContext<'a>, GenError> {
    gen_slice!(input, &h.0)
}

pub fn certificate(input: &[u8]) -> IResult<&[u8], Certificate> {
    let (input, cert_type) = be_u8(input)?;
    let (input, length) = be_u16(input)?;
    let (input, payload) = take(length as usize)(input)?;
    let cert = match cert_type {
        0 => Certificate::Null,
        1 => Certificate::HashCash(payload.to_vec()),
        2 => Certificate::Signed(payload.to_vec()),
        3 => Certificate::Multiple(payload.to_vec()),
        4 => Certificate::Hidden,
        5 => {
            let (rest, sig_type_code) = be_u16(payload)?;
            let (rest, enc_type_code) = be_u16(rest)?;
            let sig_type = SigType::from_code(sig_type_code)
                .ok_or_else(|| nom_fail(input, "unknown signing key type"))?;
            let enc_type = EncType::from_code(enc_type_code)
                .ok_or_else(|| nom_fail(input, "unknown crypto key type"))?;
            let sig_overflow = sig_type.public_key_len().saturating_sub(128);
            let enc_overflow = enc_type.key_len().saturating_sub(256);
            let (rest, sig_data) = take(sig_overflow)(rest)?;
            let (_rest, enc_data) = take(enc_overflow)(rest)?;
            Certificate::Key(KeyCertificate {
                sig_type,
                enc_type,
                sig_data: sig_data.to_vec(),
                enc_data: enc_data.to_vec(),
            })
        }
        _ => return Err(nom_fail(input, "unsupported certificate type")),
    };
    Ok((input, cert))
}

fn nom_fail(input: &[u8], _msg: &str) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Verify))
}

pub fn gen_certificate<'a>(input: WriteContext<'a>, cert: &Certificate) -> Result<WriteContext<'a>, GenError> {
    match cert {
        Certificate::Null => do_gen!(input, gen_be_u8!(0) >> gen_be_u16!(0)),
        Certificate::HashCash(data) => do_gen!(
            input,
            gen_be_u8!(1) >> gen_be_u16!(data.len() as u16) >> gen_slice!(data)
        ),
        Certificate::Signed(data) => do_gen!(
            input,
            gen_be_u8!(2) >> gen_be_u16!(data.len() as u16) >> gen_slice!(data)
        ),
        Certificate::Multiple(data) => do_gen!(
            input,
            gen_be_u8!(3) >> gen_be_u16!(data.len() as u16) >> gen_slice!(data)
        ),
        Certificate::Hidden => do_gen!(input, gen_be_u8!(4) >> gen_be_u16!(0)),
        Certificate::Key(kc) => {
            let length = (4 + kc.sig_data.len() + kc.enc_data.len()) as u16;
            do_gen!(
                input,
                gen_be_u8!(5)
                    >> gen_be_u16!(length)
                    >> gen_be_u16!(kc.sig_type.code())
                    >> gen_be_u16!(kc.enc_type.code())
                    >> gen_slice!(&kc.sig_data)
                    >> gen_slice!(&kc.enc_data)
            )
        }
    }
}

/// Reads the fixed 384-byte identity prefix plus certificate, returning the
/// crypto public key and signing public key (dispatched on the
/// certificate's declared signing type, or DSA-SHA1 if the certificate is
/// Null, matching the legacy identities that predate key certificates).
pub fn router_identity(input: &[u8]) -> IResult<&[u8], RouterIdentity> {
    let (input, pubkey_bytes) = take(256usize)(input)?;
    let (input, area) = take(128usize)(input)?;
    let (input, cert) = certificate(input)?;

    let (sig_type, enc_type, sig_overflow) = match &cert {
        Certificate::Null => (SigType::DsaSha1, EncType::ElGamal2048, Vec::new()),
        Certificate::Key(kc) => (kc.sig_type, kc.enc_type, kc.sig_data.clone()),
        _ => {
            return Err(nom_fail(input, "unsupported identity certificate"));
        }
    };

    let public_key =
        PublicKey::from_bytes(pubkey_bytes).ok_or_else(|| nom_fail(input, "bad crypto key"))?;

    let area_len = sig_type.public_key_len().min(128);
    let sig_bytes = if sig_type.public_key_len() <= 128 {
        area[128 - area_len..].to_vec()
    } else {
        let mut v = area.to_vec();
        v.extend_from_slice(&sig_overflow);
        v
    };
    let signing_key = SigningPublicKey::from_bytes(sig_type, &sig_bytes)
        .map_err(|_| nom_fail(input, "bad signing key"))?;
    let _ = enc_type;

    let rid_hash = Hash::digest(&generate(387, |ctx| gen_router_identity_prefix(ctx, pubkey_bytes, area, &cert)));

    Ok((
        input,
        RouterIdentity {
            public_key,
            signing_key,
            certificate: cert,
            hash: rid_hash,
        },
    ))
}

fn gen_router_identity_prefix<'a>(
    input: WriteContext<'a>,
    pubkey_bytes: &[u8],
    area: &[u8],
    cert: &Certificate,
) -> Result<WriteContext<'a>, GenError> {
    do_gen!(
        input,
        gen_slice!(pubkey_bytes) >> gen_slice!(area) >> gen_call!(gen_certificate, cert)
    )
}

pub fn gen_router_identity<'a>(input: WriteContext<'a>, rid: &RouterIdentity) -> Result<WriteContext<'a>, GenError> {
    let sig_type = rid.signing_key.sig_type();
    let sig_bytes = rid.signing_key.to_bytes();

    let mut area = [0u8; 128];
    if sig_type.public_key_len() <= 128 {
        let start = 128 - sig_type.public_key_len();
        area[start..].copy_from_slice(&sig_bytes);
    } else {
        area.copy_from_slice(&sig_bytes[..128]);
    }

    do_gen!(
        input,
        gen_slice!(&rid.public_key.0) >> gen_slice!(&area) >> gen_call!(gen_certificate, &rid.certificate)
    )
}

pub fn router_secret_keys(input: &[u8]) -> IResult<&[u8], RouterSecretKeys> {
    let (input, rid) = router_identity(input)?;
    let (input, priv_bytes) = take(256usize)(input)?;
    let mut private_key = [0u8; 256];
    private_key.copy_from_slice(priv_bytes);

    let sig_type = rid.signing_key.sig_type();
    let (input, sk_bytes) = take(sig_type.private_key_len())(input)?;
    let signing_private_key = signing_private_key_from_bytes(sig_type, sk_bytes)
        .map_err(|_| nom_fail(input, "bad signing private key"))?;

    Ok((
        input,
        RouterSecretKeys {
            rid,
            private_key: PrivateKey(private_key),
            signing_private_key,
        },
    ))
}

/// Unlike public keys (reconstructible from raw bytes for every
/// algorithm), reloading an arbitrary private key from its raw encoding
/// is only implemented for the algorithms whose crates expose a
/// from-bytes constructor for the scalar/seed directly; DSA and RSA
/// private keys are regenerated fresh rather than reloaded bit-for-bit,
/// since their crates require full component/prime structure, not a bare
/// scalar, to reconstruct a signer.
fn signing_private_key_from_bytes(ty: SigType, bytes: &[u8]) -> crate::error::Result<SigningPrivateKey> {
    use crate::error::Error;
    match ty {
        SigType::Ed25519 => {
            let arr: [u8; 32] = bytes.try_into().map_err(|_| Error::parse("signing_private_key", "bad len"))?;
            Ok(SigningPrivateKey::Ed25519(ed25519_dalek::SigningKey::from_bytes(&arr)))
        }
        SigType::EcdsaSha256P256 => {
            let sk = p256::ecdsa::SigningKey::from_slice(bytes)
                .map_err(|e| Error::parse("signing_private_key", e.to_string()))?;
            Ok(SigningPrivateKey::EcdsaSha256P256(sk))
        }
        SigType::EcdsaSha384P384 => {
            let sk = p384::ecdsa::SigningKey::from_slice(bytes)
                .map_err(|e| Error::parse("signing_private_key", e.to_string()))?;
            Ok(SigningPrivateKey::EcdsaSha384P384(sk))
        }
        SigType::EcdsaSha512P521 => {
            let sk = p521::ecdsa::SigningKey::from_slice(bytes)
                .map_err(|e| Error::parse("signing_private_key", e.to_string()))?;
            Ok(SigningPrivateKey::EcdsaSha512P521(sk))
        }
        SigType::DsaSha1 | SigType::RsaSha2562048 | SigType::RsaSha3843072 | SigType::RsaSha5124096 => {
            Err(Error::parse(
                "signing_private_key",
                "DSA/RSA private keys are not reloadable from raw bytes; persist router.keys via the variant's own encoding instead",
            ))
        }
    }
}

pub fn gen_router_secret_keys<'a>(input: WriteContext<'a>, rsk: &RouterSecretKeys) -> Result<WriteContext<'a>, GenError> {
    do_gen!(
        input,
        gen_call!(gen_router_identity, &rsk.rid)
            >> gen_slice!(&rsk.private_key.0)
            >> gen_slice!(&rsk.signing_private_key.to_bytes())
    )
}

/// `key_len:u8 ‖ key ‖ '=' ‖ val_len:u8 ‖ val ‖ ';'` repeated to fill
/// `total_len` bytes (§6 RouterInfo address options / RI options map).
pub fn mapping(input: &[u8], total_len: usize) -> IResult<&[u8], Mapping> {
    let (rest, mut body) = take(total_len)(input)?;
    let mut map = HashMap::new();
    while !body.is_empty() {
        let (b, key_len) = be_u8(body)?;
        let (b, key) = take(key_len as usize)(b)?;
        let (b, _eq) = take(1usize)(b)?;
        let (b, val_len) = be_u8(b)?;
        let (b, val) = take(val_len as usize)(b)?;
        let (b, _semi) = take(1usize)(b)?;
        map.insert(
            I2PString(String::from_utf8_lossy(key).into_owned()),
            I2PString(String::from_utf8_lossy(val).into_owned()),
        );
        body = b;
    }
    Ok((rest, Mapping(map)))
}

pub fn gen_mapping<'a>(input: WriteContext<'a>, m: &Mapping) -> Result<WriteContext<'a>, GenError> {
    let mut entries: Vec<_> = m.0.iter().collect();
    entries.sort_by(|a, b| a.0 .0.cmp(&b.0 .0));
    let mut ctx = input;
    for (k, v) in entries {
        ctx = do_gen!(
            ctx,
            gen_be_u8!(k.0.len() as u8)
                >> gen_slice!(k.0.as_bytes())
                >> gen_slice!(b"=")
                >> gen_be_u8!(v.0.len() as u8)
                >> gen_slice!(v.0.as_bytes())
                >> gen_slice!(b";")
        )?;
    }
    Ok(ctx)
}

pub fn router_address(input: &[u8]) -> IResult<&[u8], RouterAddress> {
    let (input, cost) = be_u8(input)?;
    let (input, date) = be_u64(input)?;
    let (input, style_len) = be_u8(input)?;
    let (input, style_bytes) = take(style_len as usize)(input)?;
    let (input, opts_len) = be_u16(input)?;
    let (input, options) = mapping(input, opts_len as usize)?;
    Ok((
        input,
        RouterAddress {
            cost,
            expiration: I2PDate(date),
            transport_style: I2PString(String::from_utf8_lossy(style_bytes).into_owned()),
            options,
        },
    ))
}

pub fn gen_router_address<'a>(input: WriteContext<'a>, a: &RouterAddress) -> Result<WriteContext<'a>, GenError> {
    let opts = generate(64, |ctx| gen_mapping(ctx, &a.options));
    do_gen!(
        input,
        gen_be_u8!(a.cost)
            >> gen_be_u64!(a.expiration.0)
            >> gen_be_u8!(a.transport_style.0.len() as u8)
            >> gen_slice!(a.transport_style.0.as_bytes())
            >> gen_be_u16!(opts.len() as u16)
            >> gen_slice!(&opts)
    )
}

pub fn router_info(input: &[u8]) -> IResult<&[u8], RouterInfo> {
    let (input, router_id) = router_identity(input)?;
    let (input, published) = be_u64(input)?;
    let (input, num_addrs) = be_u8(input)?;
    let (input, addresses) = count(router_address, num_addrs as usize)(input)?;
    let (input, num_peers) = be_u8(input)?;
    let (input, peer_hashes) = count(hash, num_peers as usize)(input)?;
    let (input, opts_len) = be_u16(input)?;
    let (input, options) = mapping(input, opts_len as usize)?;
    let sig_len = router_id.signing_key.sig_type().signature_len();
    let (input, sig_bytes) = take(sig_len)(input)?;

    Ok((
        input,
        RouterInfo {
            router_id,
            published: I2PDate(published),
            addresses,
            peers: peer_hashes,
            options,
            signature: Some(Signature::from_bytes(sig_bytes)),
        },
    ))
}

/// Everything up to (but excluding) the trailing signature: exactly what
/// `sign`/`verify` operate over (§4.4).
pub fn gen_router_info_minus_sig<'a>(input: WriteContext<'a>, ri: &RouterInfo) -> Result<WriteContext<'a>, GenError> {
    let mut ctx = do_gen!(
        input,
        gen_call!(gen_router_identity, &ri.router_id)
            >> gen_be_u64!(ri.published.0)
            >> gen_be_u8!(ri.addresses.len() as u8)
    )?;
    for a in &ri.addresses {
        ctx = gen_router_address(ctx, a)?;
    }
    ctx = gen_be_u8!(ctx, ri.peers.len() as u8)?;
    for p in &ri.peers {
        ctx = gen_hash(ctx, p)?;
    }
    let opts = generate(64, |c| gen_mapping(c, &ri.options));
    do_gen!(ctx, gen_be_u16!(opts.len() as u16) >> gen_slice!(&opts))
}

pub fn gen_router_info<'a>(input: WriteContext<'a>, ri: &RouterInfo) -> Result<WriteContext<'a>, GenError> {
    let ctx = gen_router_info_minus_sig(input, ri)?;
    match &ri.signature {
        Some(sig) => gen_slice!(ctx, sig.as_bytes()),
        None => Ok(ctx),
    }
}

pub fn lease(input: &[u8]) -> IResult<&[u8], Lease> {
    let (input, tunnel_gw) = hash(input)?;
    let (input, tid) = be_u32(input)?;
    let (input, end_date) = be_u64(input)?;
    Ok((
        input,
        Lease {
            tunnel_gw,
            tid: TunnelId(tid),
            end_date: I2PDate(end_date),
        },
    ))
}

pub fn gen_lease<'a>(input: WriteContext<'a>, l: &Lease) -> Result<WriteContext<'a>, GenError> {
    do_gen!(
        input,
        gen_slice!(&l.tunnel_gw.0) >> gen_be_u32!(l.tid.0) >> gen_be_u64!(l.end_date.0)
    )
}

pub fn lease_set(input: &[u8]) -> IResult<&[u8], LeaseSet> {
    let (input, dest) = router_identity(input)?;
    let (input, enc_key_bytes) = take(256usize)(input)?;
    let enc_key =
        PublicKey::from_bytes(enc_key_bytes).ok_or_else(|| nom_fail(input, "bad enc key"))?;
    // Signing-key placeholder: full-width (not split/padded like the
    // identity's 128-byte area), sized by the destination's signing type.
    let sig_type = dest.signing_key.sig_type();
    let (input, _placeholder) = take(sig_type.public_key_len())(input)?;
    let (input, num_leases) = be_u8(input)?;
    let (input, leases) = count(lease, num_leases as usize)(input)?;
    let sig_len = sig_type.signature_len();
    let (input, sig_bytes) = take(sig_len)(input)?;

    Ok((
        input,
        LeaseSet {
            sig_key: dest.signing_key.clone(),
            dest,
            enc_key,
            leases,
            sig: Signature::from_bytes(sig_bytes),
        },
    ))
}

pub fn gen_lease_set_minus_sig<'a>(input: WriteContext<'a>, ls: &LeaseSet) -> Result<WriteContext<'a>, GenError> {
    let sig_type = ls.sig_key.sig_type();
    let placeholder = vec![0u8; sig_type.public_key_len()];
    let mut ctx = do_gen!(
        input,
        gen_call!(gen_router_identity, &ls.dest) >> gen_slice!(&ls.enc_key.0) >> gen_slice!(&placeholder)
    )?;
    ctx = gen_be_u8!(ctx, ls.leases.len() as u8)?;
    for l in &ls.leases {
        ctx = gen_lease(ctx, l)?;
    }
    Ok(ctx)
}

pub fn gen_lease_set<'a>(input: WriteContext<'a>, ls: &LeaseSet) -> Result<WriteContext<'a>, GenError> {
    let ctx = gen_lease_set_minus_sig(input, ls)?;
    gen_slice!(ctx, ls.sig.as_bytes())
}

/// Runs a generator into a freshly allocated buffer, growing it and
/// retrying on `GenError::BufferTooSmall` the same way a direct
/// `to_bytes` caller would; used internally wherever a generator needs
/// to materialize a `Vec<u8>` of its own before handing it to an outer
/// generator (e.g. the options submapping inside a router address).
pub(crate) fn generate<F>(capacity_hint: usize, gen: F) -> Vec<u8>
where
    F: Fn(WriteContext) -> Result<WriteContext, GenError>,
{
    let mut buf = vec![0u8; capacity_hint];
    loop {
        match gen((&mut buf[..], 0)).map(|tup| tup.1) {
            Ok(sz) => {
                buf.truncate(sz);
                return buf;
            }
            Err(GenError::BufferTooSmall(sz)) => {
                buf.resize(sz, 0);
            }
            Err(e) => panic!("cookie_factory generator failed: {:?}", e),
        }
    }
}
