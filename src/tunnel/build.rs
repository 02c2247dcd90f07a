//! Tunnel build protocol (C6, §4.6): client-side record construction and
//! reply decryption, plus the participating-hop decision for an inbound
//! build request.

use cookie_factory::{do_gen, gen_be_u32, gen_be_u8, gen_slice};

use crate::constants::{
    BUILD_RECORD_CLEARTEXT_LEN, BUILD_RECORD_LEN, MAX_NUM_TRANSIT_TUNNELS,
};
use crate::crypto::rng::{rand_u32, rand_vec, shuffled_indices};
use crate::crypto::{aes_cbc, elgamal, sha256, PrivateKey, PublicKey};
use crate::data::frame::generate;
use crate::data::Hash;
use crate::error::{Error, Result};

/// Bit flags packed into offset 184 of the build-record cleartext (§6).
pub mod flags {
    pub const OUTBOUND_ENDPOINT: u8 = 1 << 7;
    pub const INBOUND_GATEWAY: u8 = 1 << 6;
}

pub mod status {
    pub const ACCEPT: u8 = crate::constants::BUILD_STATUS_ACCEPT;
    pub const PROBABILISTIC_REJECT: u8 = crate::constants::BUILD_STATUS_PROBABILISTIC_REJECT;
    pub const OVERLOAD_REJECT: u8 = crate::constants::BUILD_STATUS_OVERLOAD_REJECT;
    pub const BANDWIDTH_REJECT: u8 = crate::constants::BUILD_STATUS_BANDWIDTH_REJECT;
    pub const CRITICAL_REJECT: u8 = crate::constants::BUILD_STATUS_CRITICAL_REJECT;
}

/// One hop's view of a tunnel being built: its crypto material and its
/// slot in the shuffled record permutation (§4.6 step 2-3).
#[derive(Clone, Debug)]
pub struct BuildHop {
    pub ident: Hash,
    pub crypto_key: PublicKey,
    pub receive_tunnel_id: u32,
    pub next_tunnel_id: u32,
    pub next_ident: Hash,
    pub layer_key: [u8; 32],
    pub iv_key: [u8; 32],
    pub reply_key: [u8; 32],
    pub reply_iv: [u8; 16],
    pub flags: u8,
    pub send_msg_id: u32,
    pub record_index: usize,
}

fn fresh_symmetric_material() -> ([u8; 32], [u8; 32], [u8; 32], [u8; 16]) {
    let mut layer_key = [0u8; 32];
    let mut iv_key = [0u8; 32];
    let mut reply_key = [0u8; 32];
    let mut reply_iv = [0u8; 16];
    crate::crypto::rng::rand_bytes(&mut layer_key);
    crate::crypto::rng::rand_bytes(&mut iv_key);
    crate::crypto::rng::rand_bytes(&mut reply_key);
    crate::crypto::rng::rand_bytes(&mut reply_iv);
    (layer_key, iv_key, reply_key, reply_iv)
}

/// Builds the plan for a tunnel of `num_hops` hops reaching `peers` in
/// order. `last_is_reply_msg_id` marks the last hop's `send_msg_id` as
/// `reply_msg_id`; earlier hops get random ids (§4.6 step 3).
pub fn plan_hops(
    peers: &[(Hash, PublicKey)],
    reply_msg_id: u32,
    now_s: u32,
) -> Vec<BuildHop> {
    let n = peers.len();
    let mut hops = Vec::with_capacity(n);
    for (i, (ident, crypto_key)) in peers.iter().enumerate() {
        let (layer_key, iv_key, reply_key, reply_iv) = fresh_symmetric_material();
        let is_last = i + 1 == n;
        let next_ident = if is_last {
            Hash::from_bytes(&[0u8; 32])
        } else {
            peers[i + 1].0.clone()
        };
        let mut flags = 0u8;
        if i == 0 {
            flags |= flags::INBOUND_GATEWAY;
        }
        if is_last {
            flags |= flags::OUTBOUND_ENDPOINT;
        }
        hops.push(BuildHop {
            ident: ident.clone(),
            crypto_key: crypto_key.clone(),
            receive_tunnel_id: rand_u32(),
            next_tunnel_id: rand_u32(),
            next_ident,
            layer_key,
            iv_key,
            reply_key,
            reply_iv,
            flags,
            send_msg_id: if is_last { reply_msg_id } else { rand_u32() },
            record_index: 0,
            // `request_time` uses the second-granularity the wire format
            // specifies; stashed via now_s captured at plan time.
        });
        let _ = now_s;
    }
    hops
}

fn cleartext_for(hop: &BuildHop, now_s: u32) -> [u8; BUILD_RECORD_CLEARTEXT_LEN] {
    let bytes = generate(BUILD_RECORD_CLEARTEXT_LEN, |input| {
        do_gen!(
            input,
            gen_be_u32!(hop.receive_tunnel_id)
                >> gen_slice!(&hop.ident.0)
                >> gen_be_u32!(hop.next_tunnel_id)
                >> gen_slice!(&hop.next_ident.0)
                >> gen_slice!(&hop.layer_key)
                >> gen_slice!(&hop.iv_key)
                >> gen_slice!(&hop.reply_key)
                >> gen_slice!(&hop.reply_iv)
                >> gen_be_u8!(hop.flags)
                >> gen_be_u32!(now_s)
                >> gen_be_u32!(hop.send_msg_id)
        )
    });
    // Bytes 193..222 stay zero padding: `generate` zero-fills its buffer
    // up front and the chain above only writes the first 193.
    let mut out = [0u8; BUILD_RECORD_CLEARTEXT_LEN];
    out[..bytes.len()].copy_from_slice(&bytes);
    out
}

fn parse_cleartext(buf: &[u8; BUILD_RECORD_CLEARTEXT_LEN]) -> BuildHop {
    BuildHop {
        ident: Hash::from_slice(&buf[4..36]),
        crypto_key: PublicKey::from_bytes(&[0u8; 256]).unwrap(),
        receive_tunnel_id: u32::from_be_bytes(buf[0..4].try_into().unwrap()),
        next_tunnel_id: u32::from_be_bytes(buf[36..40].try_into().unwrap()),
        next_ident: Hash::from_slice(&buf[40..72]),
        layer_key: buf[72..104].try_into().unwrap(),
        iv_key: buf[104..136].try_into().unwrap(),
        reply_key: buf[136..168].try_into().unwrap(),
        reply_iv: buf[168..184].try_into().unwrap(),
        flags: buf[184],
        send_msg_id: u32::from_be_bytes(buf[189..193].try_into().unwrap()),
        record_index: 0,
    }
}

/// The build record's ElGamal slot is 512 bytes (§6), two shorter than
/// [`elgamal::encrypt`]'s 514-byte output: the codec's two separator
/// bytes (always zero) aren't carried on the wire here, only `a[256] ‖
/// b[256]`. `strip_separators`/`restore_separators` convert between the
/// two.
fn strip_separators(ct: &[u8; crate::constants::ELGAMAL_CIPHERTEXT_LEN]) -> [u8; 512] {
    let mut out = [0u8; 512];
    out[0..256].copy_from_slice(&ct[1..257]);
    out[256..512].copy_from_slice(&ct[258..514]);
    out
}

fn restore_separators(buf: &[u8; 512]) -> [u8; crate::constants::ELGAMAL_CIPHERTEXT_LEN] {
    let mut ct = [0u8; crate::constants::ELGAMAL_CIPHERTEXT_LEN];
    ct[1..257].copy_from_slice(&buf[0..256]);
    ct[258..514].copy_from_slice(&buf[256..512]);
    ct
}

fn encrypt_record(pk: &PublicKey, cleartext: &[u8; BUILD_RECORD_CLEARTEXT_LEN]) -> [u8; BUILD_RECORD_LEN] {
    let ct = elgamal::encrypt(&pk.0, cleartext);
    let mut out = [0u8; BUILD_RECORD_LEN];
    out[16..].copy_from_slice(&strip_separators(&ct));
    out
}

/// A tunnel build in flight: the hop plan plus the 528-byte records as
/// they'll be wrapped in a VariableTunnelBuild message (§4.6).
pub struct TunnelBuild {
    pub hops: Vec<BuildHop>,
    pub records: Vec<[u8; BUILD_RECORD_LEN]>,
    pub outbound: bool,
}

impl TunnelBuild {
    /// `Tunnel::build(reply_msg_id, outbound?)` (§4.6 steps 1-6).
    pub fn build(
        peers: &[(Hash, PublicKey)],
        reply_msg_id: u32,
        outbound: bool,
        now_s: u32,
    ) -> TunnelBuild {
        let total_records = peers.len().max(crate::constants::MIN_BUILD_RECORDS);
        let perm = shuffled_indices(total_records);
        let mut records: Vec<[u8; BUILD_RECORD_LEN]> = (0..total_records)
            .map(|_| {
                let mut r = [0u8; BUILD_RECORD_LEN];
                crate::crypto::rng::rand_bytes(&mut r);
                r
            })
            .collect();

        let mut hops = plan_hops(peers, reply_msg_id, now_s);
        for (i, hop) in hops.iter_mut().enumerate() {
            hop.record_index = perm[i];
            let cleartext = cleartext_for(hop, now_s);
            records[perm[i]] = encrypt_record(&hop.crypto_key, &cleartext);
        }

        // Forward transform (§4.6 step 5): walking hops from last back to
        // first excluding the first, pre-decrypt every later hop's record
        // with this hop's reply key so the hop's own re-encryption on the
        // way back lands on the intended ciphertext.
        for i in (1..hops.len()).rev() {
            let hop = &hops[i];
            for later in &hops[i + 1..] {
                let idx = later.record_index;
                let _ = aes_cbc::decrypt(&hop.reply_key, &hop.reply_iv, &mut records[idx]);
            }
        }

        TunnelBuild {
            hops,
            records,
            outbound,
        }
    }

    /// `handle_build_response(reply_bytes)` (§4.6 steps 1-3). Returns
    /// `Ok(true)` if every hop accepted, `Ok(false)` if any hop rejected
    /// (with the rejecting hop's ident and status code).
    pub fn handle_build_response(&self, records: &mut [[u8; BUILD_RECORD_LEN]]) -> Result<Vec<(Hash, u8)>> {
        for i in (0..self.hops.len()).rev() {
            let hop = &self.hops[i];
            for earlier_and_self in &self.hops[..=i] {
                let idx = earlier_and_self.record_index;
                aes_cbc::decrypt(&hop.reply_key, &hop.reply_iv, &mut records[idx])?;
            }
        }
        let mut results = Vec::with_capacity(self.hops.len());
        for hop in &self.hops {
            let status = records[hop.record_index][BUILD_RECORD_LEN - 1];
            results.push((hop.ident.clone(), status));
        }
        Ok(results)
    }
}

/// Decision made by a transit hop on an inbound TunnelBuild record
/// addressed to it (§4.6 "Participating side").
#[derive(Clone, Debug)]
pub struct TransitDecision {
    pub status: u8,
    pub receive_tunnel_id: u32,
    pub next_tunnel_id: u32,
    pub next_ident: Hash,
    pub layer_key: [u8; 32],
    pub iv_key: [u8; 32],
    pub flags: u8,
}

/// Locates and decrypts the record addressed to `our_hash`, then applies
/// the accept/reject policy. Returns `None` if no record in `records`
/// is addressed to us.
pub fn handle_build_request_records(
    records: &[[u8; BUILD_RECORD_LEN]],
    our_hash: &Hash,
    our_private_key: &PrivateKey,
    accepts_tunnels: bool,
    current_transit_tunnels: usize,
    bandwidth_exceeded: bool,
) -> Result<Option<(usize, TransitDecision, [u8; 32], [u8; 16])>> {
    let truncated = &our_hash.0[0..16];
    for (idx, record) in records.iter().enumerate() {
        if &record[0..16] != truncated {
            continue;
        }
        let mut stripped = [0u8; 512];
        stripped.copy_from_slice(&record[16..]);
        let ct = restore_separators(&stripped);
        let cleartext = elgamal::decrypt(&our_private_key.0, &ct)?;
        let hop = parse_cleartext(&cleartext);

        // §4.6 "Participating side": every refusal reason reports the same
        // status code, 30, so a rejected peer can't distinguish why.
        let status = if !accepts_tunnels || current_transit_tunnels >= MAX_NUM_TRANSIT_TUNNELS || bandwidth_exceeded {
            status::BANDWIDTH_REJECT
        } else {
            status::ACCEPT
        };

        let decision = TransitDecision {
            status,
            receive_tunnel_id: hop.receive_tunnel_id,
            next_tunnel_id: hop.next_tunnel_id,
            next_ident: hop.next_ident,
            layer_key: hop.layer_key,
            iv_key: hop.iv_key,
            flags: hop.flags,
        };
        return Ok(Some((idx, decision, hop.reply_key, hop.reply_iv)));
    }
    Ok(None)
}

/// Builds this hop's reply record and AES-CBC-encrypts every record in
/// `records` (this one included) in place under the build request's
/// reply key, unchained across records (§4.6 "Build a reply record").
pub fn build_reply_records(
    records: &mut [[u8; BUILD_RECORD_LEN]],
    our_record_index: usize,
    status: u8,
    reply_key: &[u8; 32],
    reply_iv: &[u8; 16],
) -> Result<()> {
    let mut reply = [0u8; BUILD_RECORD_LEN];
    let random_part = rand_vec(495);
    reply[32..32 + 495].copy_from_slice(&random_part);
    reply[BUILD_RECORD_LEN - 1] = status;
    let digest = sha256(&reply[32..]);
    reply[0..32].copy_from_slice(&digest);
    records[our_record_index] = reply;

    for record in records.iter_mut() {
        aes_cbc::encrypt(reply_key, reply_iv, record)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;

    fn hop_keypair() -> (Hash, PrivateKey, PublicKey) {
        let sk = PrivateKey::new();
        let pk = PublicKey::from_secret(&sk);
        let ident = Hash::digest(&pk.0);
        (ident, sk, pk)
    }

    #[test]
    fn build_allocates_at_least_min_records() {
        let peers: Vec<_> = (0..2)
            .map(|_| {
                let (ident, _, pk) = hop_keypair();
                (ident, pk)
            })
            .collect();
        let tb = TunnelBuild::build(&peers, 42, false, 1_700_000_000);
        assert_eq!(tb.records.len(), crate::constants::MIN_BUILD_RECORDS);
        assert_eq!(tb.hops.len(), 2);
    }

    #[test]
    fn transit_hop_finds_and_decrypts_its_record() {
        let (ident, sk, pk) = hop_keypair();
        let peers = vec![(ident.clone(), pk)];
        let tb = TunnelBuild::build(&peers, 7, true, 1_700_000_000);
        let mut records = tb.records.clone();

        let (idx, decision, _reply_key, _reply_iv) =
            handle_build_request_records(&records, &ident, &sk, true, 0, false)
                .unwrap()
                .expect("record addressed to us");
        assert_eq!(decision.status, status::ACCEPT);
        assert_eq!(idx, tb.hops[0].record_index);
        let _ = &mut records;
    }

    #[test]
    fn transit_hop_rejects_when_not_accepting_tunnels() {
        let (ident, sk, pk) = hop_keypair();
        let peers = vec![(ident.clone(), pk)];
        let tb = TunnelBuild::build(&peers, 7, true, 1_700_000_000);

        let (_, decision, _, _) =
            handle_build_request_records(&tb.records, &ident, &sk, false, 0, false)
                .unwrap()
                .unwrap();
        assert_eq!(decision.status, status::BANDWIDTH_REJECT);
    }

    #[test]
    fn single_hop_round_trip_status_matches() {
        let (ident, sk, pk) = hop_keypair();
        let peers = vec![(ident.clone(), pk)];
        let tb = TunnelBuild::build(&peers, 7, true, 1_700_000_000);
        let mut records = tb.records.clone();

        let (idx, _decision, reply_key, reply_iv) =
            handle_build_request_records(&records, &ident, &sk, true, 0, false)
                .unwrap()
                .unwrap();
        build_reply_records(&mut records, idx, status::ACCEPT, &reply_key, &reply_iv).unwrap();

        let results = tb.handle_build_response(&mut records).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1, status::ACCEPT);
    }
}
