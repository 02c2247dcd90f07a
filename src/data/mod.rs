//! Common structures shared by every I2P protocol layer: identities,
//! certificates, RouterInfo, LeaseSet, and their primitive fields (§3, §6).

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

use crate::constants;
use crate::crypto::{
    EncType, PrivateKey, PublicKey, SigType, Signature, SigningPrivateKey, SigningPublicKey,
};
use crate::error::{Error, Result};

pub(crate) mod frame;

/// SHA-256 digest of some canonical byte sequence; doubles as the
/// network address (IdentHash) and as a generic opaque 32-byte value
/// (tunnel gateway hashes, routing keys).
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub fn from_bytes(buf: &[u8; 32]) -> Self {
        Hash(*buf)
    }

    pub fn from_slice(buf: &[u8]) -> Self {
        let mut x = [0u8; 32];
        x.copy_from_slice(buf);
        Hash(x)
    }

    pub fn digest(buf: &[u8]) -> Self {
        let mut hasher = Sha256::default();
        hasher.update(buf);
        Hash::from_slice(&hasher.finalize())
    }

    /// Returns `self XOR other`, used for the routing-key proximity metric
    /// (§4.5); compared as a big-endian unsigned 256-bit integer.
    pub fn xor(&self, other: &Hash) -> Hash {
        let mut out = [0u8; 32];
        for i in 0..32 {
            out[i] = self.0[i] ^ other.0[i];
        }
        Hash(out)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", constants::I2P_BASE64.encode(&self.0))
    }
}

impl PartialOrd for Hash {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Hash {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

/// Milliseconds since the Unix epoch; zero means undefined/null (§3).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct I2PDate(pub u64);

impl I2PDate {
    pub fn from_system_time(t: SystemTime) -> Self {
        let d = t.duration_since(UNIX_EPOCH).unwrap_or_default();
        I2PDate(d.as_secs() * 1_000 + u64::from(d.subsec_millis()))
    }

    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct I2PString(pub String);

impl I2PString {
    pub fn new(s: &str) -> Self {
        I2PString(String::from(s))
    }

    pub fn to_csv(&self) -> Vec<Self> {
        self.0.split(',').map(Self::new).collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Mapping(pub HashMap<I2PString, I2PString>);

impl Mapping {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&I2PString::new(key)).map(|v| v.0.as_str())
    }
}

/// A one-time-use cookie selecting a cached garlic AES session key (§3,
/// §4.9). `creation_time_s` drives the incoming/outgoing tag-lifetime
/// expiry policy.
#[derive(Clone, Debug)]
pub struct SessionTag {
    pub tag: [u8; 32],
    pub creation_time_s: u64,
}

impl SessionTag {
    pub fn new(tag: [u8; 32], creation_time_s: u64) -> Self {
        SessionTag {
            tag,
            creation_time_s,
        }
    }

    pub fn is_expired(&self, now_s: u64, lifetime_s: u64) -> bool {
        now_s.saturating_sub(self.creation_time_s) >= lifetime_s
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct TunnelId(pub u32);

/// Carries the real signing/crypto algorithm identifiers and any key
/// material that overflows the identity's fixed 128-byte signing-key
/// area (§3, §6).
#[derive(Clone, Debug, PartialEq)]
pub struct KeyCertificate {
    pub sig_type: SigType,
    pub enc_type: EncType,
    pub sig_data: Vec<u8>,
    pub enc_data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Certificate {
    Null,
    HashCash(Vec<u8>),
    Hidden,
    Signed(Vec<u8>),
    Multiple(Vec<u8>),
    Key(KeyCertificate),
}

impl Certificate {
    pub fn code(&self) -> u8 {
        match self {
            Certificate::Null => constants::NULL_CERT,
            Certificate::HashCash(_) => constants::HASH_CERT,
            Certificate::Hidden => constants::HIDDEN_CERT,
            Certificate::Signed(_) => constants::SIGNED_CERT,
            Certificate::Multiple(_) => constants::MULTI_CERT,
            Certificate::Key(_) => constants::KEY_CERT,
        }
    }
}

/// Uniquely identifies a router (or, aliased as [`Destination`], a local
/// communication endpoint): an ElGamal crypto key, a signing key of any
/// supported algorithm, and the certificate that names the algorithm
/// when it isn't the legacy DSA-SHA1 default (§3, §4.3).
#[derive(Clone, Debug, PartialEq)]
pub struct RouterIdentity {
    pub public_key: PublicKey,
    pub signing_key: SigningPublicKey,
    pub certificate: Certificate,
    hash: Hash,
}

/// A Destination is wire- and invariant-identical to a RouterIdentity
/// (§3); the two names distinguish "router on the network" from "local
/// endpoint addressed by a LeaseSet" at the type level.
pub type Destination = RouterIdentity;

impl RouterIdentity {
    pub fn from_secrets(private_key: &PrivateKey, signing_private_key: &SigningPrivateKey) -> Self {
        let public_key = PublicKey::from_secret(private_key);
        let signing_key = SigningPublicKey::from_secret(signing_private_key)
            .expect("freshly generated key pair always yields a public key");
        let certificate = match signing_key.sig_type() {
            SigType::DsaSha1 => Certificate::Null,
            other => Certificate::Key(KeyCertificate {
                sig_type: other,
                enc_type: EncType::ElGamal2048,
                sig_data: vec![0u8; other.pad_len(&EncType::ElGamal2048)],
                enc_data: vec![],
            }),
        };
        let mut rid = RouterIdentity {
            public_key,
            signing_key,
            certificate,
            hash: Hash::from_bytes(&[0u8; 32]),
        };
        rid.hash = Hash::digest(&frame::generate(387, |ctx| frame::gen_router_identity(ctx, &rid)));
        rid
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        match frame::router_identity(buf) {
            Ok((_, rid)) => Ok(rid),
            Err(_) => Err(Error::parse("RouterIdentity::from_bytes", "malformed identity")),
        }
    }

    pub fn from_file(path: &str) -> io::Result<Self> {
        let mut f = File::open(path)?;
        let mut data = Vec::new();
        f.read_to_end(&mut data)?;
        Self::from_bytes(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        frame::generate(387, |ctx| frame::gen_router_identity(ctx, self))
    }

    pub fn to_file(&self, path: &str) -> io::Result<()> {
        let mut f = File::create(path)?;
        f.write_all(&self.to_bytes())
    }

    /// `IdentHash(identity) = SHA-256(canonical bytes including
    /// certificate)` (§3), computed once at construction/parse time.
    pub fn hash(&self) -> &Hash {
        &self.hash
    }
}

/// Key material for a RouterIdentity: the public identity plus both
/// private halves (§6 `router.keys`).
#[derive(Clone)]
pub struct RouterSecretKeys {
    pub rid: RouterIdentity,
    pub private_key: PrivateKey,
    pub signing_private_key: SigningPrivateKey,
}

impl RouterSecretKeys {
    /// Generates a fresh identity using the required default signing
    /// algorithm for new identities, EdDSA-Ed25519 (§3).
    pub fn generate() -> Self {
        Self::generate_with(SigType::Ed25519)
    }

    pub fn generate_with(sig_type: SigType) -> Self {
        let private_key = PrivateKey::new();
        let signing_private_key = SigningPrivateKey::generate(sig_type);
        RouterSecretKeys {
            rid: RouterIdentity::from_secrets(&private_key, &signing_private_key),
            private_key,
            signing_private_key,
        }
    }

    pub fn from_file(path: &str) -> io::Result<Self> {
        let mut f = File::open(path)?;
        let mut data = Vec::new();
        f.read_to_end(&mut data)?;
        match frame::router_secret_keys(&data[..]) {
            Ok((_, rsk)) => Ok(rsk),
            Err(e) => Err(io::Error::new(io::ErrorKind::InvalidData, format!("{:?}", e))),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        frame::generate(643, |ctx| frame::gen_router_secret_keys(ctx, self))
    }

    pub fn to_file(&self, path: &str) -> io::Result<()> {
        let mut f = File::create(path)?;
        f.write_all(&self.to_bytes())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Lease {
    pub tunnel_gw: Hash,
    pub tid: TunnelId,
    pub end_date: I2PDate,
}

/// Signed bundle of a destination's current inbound tunnel endpoints
/// (§3, §4.4).
#[derive(Clone, Debug, PartialEq)]
pub struct LeaseSet {
    pub dest: Destination,
    pub enc_key: PublicKey,
    pub sig_key: SigningPublicKey,
    pub leases: Vec<Lease>,
    pub sig: Signature,
}

impl LeaseSet {
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        match frame::lease_set(buf) {
            Ok((_, ls)) => Ok(ls),
            Err(_) => Err(Error::parse("LeaseSet::from_bytes", "malformed lease set")),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        frame::generate(512, |ctx| frame::gen_lease_set(ctx, self))
    }

    pub fn sign(&mut self, spk: &SigningPrivateKey) {
        let msg = frame::generate(512, |ctx| frame::gen_lease_set_minus_sig(ctx, self));
        self.sig = spk.sign(&msg);
    }

    pub fn verify(&self) -> Result<()> {
        let msg = frame::generate(512, |ctx| frame::gen_lease_set_minus_sig(ctx, self));
        self.sig_key.verify(&msg, &self.sig)
    }

    /// Leases whose `end_date_ms` is in the future; `with_threshold`
    /// subtracts [`constants::LEASE_EXPIRY_THRESHOLD_MS`] first, so a
    /// lease about to expire is excluded slightly early (§4.4).
    pub fn non_expired_leases(&self, now_ms: u64, with_threshold: bool) -> Vec<&Lease> {
        let threshold = if with_threshold {
            constants::LEASE_EXPIRY_THRESHOLD_MS
        } else {
            0
        };
        self.leases
            .iter()
            .filter(|l| l.end_date.0.saturating_sub(threshold) > now_ms)
            .collect()
    }
}

/// A way to reach a router through a transport (§3, §6).
#[derive(Clone, Debug, PartialEq)]
pub struct RouterAddress {
    pub cost: u8,
    pub expiration: I2PDate,
    pub transport_style: I2PString,
    pub options: Mapping,
}

impl RouterAddress {
    pub fn new(transport_style: &I2PString, addr: SocketAddr) -> Self {
        let mut options = HashMap::new();
        options.insert(I2PString::new("host"), I2PString::new(&addr.ip().to_string()));
        options.insert(I2PString::new("port"), I2PString::new(&addr.port().to_string()));
        RouterAddress {
            cost: 0,
            expiration: I2PDate(0),
            transport_style: transport_style.clone(),
            options: Mapping(options),
        }
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key)
    }

    pub fn set_option(&mut self, key: I2PString, value: I2PString) {
        self.options.0.insert(key, value);
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        let host = self.options.get("host")?;
        let port = self.options.get("port")?;
        match (host.parse(), port.parse()) {
            (Ok(ip), Ok(port)) => Some(SocketAddr::new(ip, port)),
            _ => None,
        }
    }

    pub fn mtu(&self) -> Option<u16> {
        self.option("mtu").and_then(|s| s.parse().ok())
    }

    /// The base64-encoded SSU introducer key in slot `n` (`i{n}key`),
    /// when this address lists one (§6).
    pub fn introducer(&self, n: u8) -> Option<(String, u16, String, String)> {
        let host = self.option(&format!("i{n}host"))?.to_string();
        let port = self.option(&format!("i{n}port"))?.to_string();
        let tag = self.option(&format!("i{n}tag"))?.to_string();
        let key = self.option(&format!("i{n}key"))?.to_string();
        Some((host, port.parse().unwrap_or(0), tag, key))
    }
}

/// What a router publishes about itself for the network to see: the
/// other netDb-stored descriptor besides LeaseSet (§3, §4.4).
#[derive(Clone, Debug, PartialEq)]
pub struct RouterInfo {
    pub router_id: RouterIdentity,
    pub published: I2PDate,
    pub addresses: Vec<RouterAddress>,
    pub peers: Vec<Hash>,
    pub options: Mapping,
    pub signature: Option<Signature>,
}

impl RouterInfo {
    pub fn new(rid: RouterIdentity) -> Self {
        RouterInfo {
            router_id: rid,
            published: I2PDate::now(),
            addresses: Vec::new(),
            peers: Vec::new(),
            options: Mapping(HashMap::new()),
            signature: None,
        }
    }

    pub fn set_addresses(&mut self, addrs: Vec<RouterAddress>) {
        self.addresses = addrs;
        self.signature = None;
    }

    pub fn set_caps(&mut self, caps: &str) {
        self.options
            .0
            .insert(I2PString::new("caps"), I2PString::new(caps));
        self.signature = None;
    }

    pub fn caps(&self) -> &str {
        self.options.get("caps").unwrap_or("")
    }

    /// Whether the caps string carries `flag`, derived directly from the
    /// parsed options rather than tracked separately at construction
    /// time (§4.4, §6).
    pub fn caps_contains(&self, flag: char) -> bool {
        self.caps().contains(flag)
    }

    pub fn is_floodfill(&self) -> bool {
        self.caps_contains(constants::CAP_FLOODFILL)
    }

    pub fn is_high_bandwidth(&self) -> bool {
        self.caps_contains(constants::CAP_HIGH_BANDWIDTH_O)
            || self.caps_contains(constants::CAP_HIGH_BANDWIDTH_P)
            || self.caps_contains(constants::CAP_HIGH_BANDWIDTH_X)
    }

    pub fn is_hidden(&self) -> bool {
        self.caps_contains(constants::CAP_HIDDEN)
    }

    pub fn is_reachable(&self) -> bool {
        self.caps_contains(constants::CAP_REACHABLE) && !self.addresses.is_empty()
    }

    pub fn address<F>(&self, style: &I2PString, filter: F) -> Option<RouterAddress>
    where
        F: Fn(&RouterAddress) -> bool,
    {
        self.addresses
            .iter()
            .filter(|a| a.transport_style == *style)
            .find(|a| filter(a))
            .cloned()
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        match frame::router_info(buf) {
            Ok((_, ri)) => Ok(ri),
            Err(_) => Err(Error::parse("RouterInfo::from_bytes", "malformed router info")),
        }
    }

    pub fn from_file(path: &str) -> io::Result<Self> {
        let mut f = File::open(path)?;
        let mut data = Vec::new();
        f.read_to_end(&mut data)?;
        Self::from_bytes(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        frame::generate(1024, |ctx| frame::gen_router_info(ctx, self))
    }

    pub fn to_file(&self, path: &str) -> io::Result<()> {
        let mut f = File::create(path)?;
        f.write_all(&self.to_bytes())
    }

    fn signature_bytes(&self) -> Vec<u8> {
        frame::generate(1024, |ctx| frame::gen_router_info_minus_sig(ctx, self))
    }

    pub fn sign(&mut self, spk: &SigningPrivateKey) {
        let msg = self.signature_bytes();
        self.signature = Some(spk.sign(&msg));
    }

    /// Signature verification failure marks the RI unreachable at the
    /// call site; it never panics (§4.4, §7).
    pub fn verify(&self) -> Result<()> {
        match &self.signature {
            Some(s) => {
                let msg = self.signature_bytes();
                self.router_id.signing_key.verify(&msg, s)
            }
            None => Err(Error::verify("RouterInfo::verify", "no signature present")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::crypto::SigType;

    #[test]
    fn hash_xor() {
        let h0 = Hash::from_bytes(&[0u8; 32]);
        let h1 = Hash::from_bytes(&[1u8; 32]);
        let h2 = Hash::from_bytes(&[2u8; 32]);
        let h3 = Hash::from_bytes(&[3u8; 32]);
        assert_eq!(h0.xor(&h1), h1);
        assert_eq!(h1.xor(&h2), h3);
        assert_eq!(h3.xor(&h1), h2);
    }

    #[test]
    fn i2pstring_to_csv() {
        let s1 = I2PString::new("a-b,c/d,1,2");
        assert_eq!(
            s1.to_csv(),
            vec![
                I2PString::new("a-b"),
                I2PString::new("c/d"),
                I2PString::new("1"),
                I2PString::new("2"),
            ]
        );
    }

    #[test]
    fn identity_round_trips_ed25519() {
        let rsk = RouterSecretKeys::generate_with(SigType::Ed25519);
        let bytes = rsk.rid.to_bytes();
        let parsed = RouterIdentity::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, rsk.rid);
        assert_eq!(parsed.hash(), rsk.rid.hash());
        assert_eq!(parsed.hash(), &Hash::digest(&bytes));
    }

    #[test]
    fn identity_round_trips_ecdsa_p256() {
        let rsk = RouterSecretKeys::generate_with(SigType::EcdsaSha256P256);
        let bytes = rsk.rid.to_bytes();
        let parsed = RouterIdentity::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, rsk.rid);
    }

    #[test]
    fn router_address_options() {
        let style = I2PString::new("test");
        let mut ra = RouterAddress::new(&style, "127.0.0.1:0".parse().unwrap());
        assert!(ra.option("key").is_none());
        ra.set_option(I2PString::new("key"), I2PString::new("value"));
        assert_eq!(ra.option("key"), Some("value"));
    }

    #[test]
    fn router_info_sign_and_verify() {
        let rsk = RouterSecretKeys::generate();
        let mut ri = RouterInfo::new(rsk.rid);
        ri.set_addresses(vec![RouterAddress::new(
            &I2PString::new("NTCP2"),
            "127.0.0.1:12345".parse().unwrap(),
        )]);
        ri.set_caps("OR");
        assert!(ri.signature.is_none());
        ri.sign(&rsk.signing_private_key);
        assert!(ri.signature.is_some());
        assert!(ri.verify().is_ok());

        let bytes = ri.to_bytes();
        let parsed = RouterInfo::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, ri);
        assert!(parsed.verify().is_ok());
        assert!(parsed.is_reachable());
    }

    #[test]
    fn router_info_verify_fails_on_tamper() {
        let rsk = RouterSecretKeys::generate();
        let mut ri = RouterInfo::new(rsk.rid);
        ri.sign(&rsk.signing_private_key);
        ri.set_caps("XfR");
        assert!(ri.verify().is_err());
    }

    #[test]
    fn lease_set_non_expired_leases_threshold_is_subset() {
        let rsk = RouterSecretKeys::generate();
        let dest = rsk.rid;
        let enc_sk = PrivateKey::new();
        let enc_key = PublicKey::from_secret(&enc_sk);
        let mut ls = LeaseSet {
            sig_key: dest.signing_key.clone(),
            dest,
            enc_key,
            leases: vec![
                Lease {
                    tunnel_gw: Hash::from_bytes(&[1u8; 32]),
                    tid: TunnelId(1),
                    end_date: I2PDate(100_000),
                },
                Lease {
                    tunnel_gw: Hash::from_bytes(&[2u8; 32]),
                    tid: TunnelId(2),
                    end_date: I2PDate(100_000 + constants::LEASE_EXPIRY_THRESHOLD_MS / 2),
                },
            ],
            sig: Signature::from_bytes(&[]),
        };
        ls.sign(&rsk.signing_private_key);
        assert!(ls.verify().is_ok());

        let now = 100_000 - 1;
        let without = ls.non_expired_leases(now, false);
        let with = ls.non_expired_leases(now, true);
        assert!(with.len() <= without.len());
    }
}
