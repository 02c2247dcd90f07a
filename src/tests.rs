//! End-to-end scenario tests exercising the core's public API the way a
//! single module-level test wouldn't: an identity round trip through the
//! wire codec, sign/verify tamper-detection, routing-key determinism,
//! floodfill proximity ordering, and a transit hop's reject path on a
//! tunnel build record.

use pretty_assertions::assert_eq;

use crate::crypto::{PrivateKey, PublicKey, SigType, SigningPrivateKey, SigningPublicKey};
use crate::data::{Hash, RouterAddress, RouterInfo, RouterSecretKeys, I2PString};
use crate::netdb::{routing_key, NetworkDatabase};
use crate::tunnel::build::{build_reply_records, handle_build_request_records, status, TunnelBuild};

#[test]
fn identity_round_trips_through_wire_bytes_with_ed25519_lengths() {
    let keys = RouterSecretKeys::generate_with(SigType::Ed25519);
    assert_eq!(keys.rid.signing_key.to_bytes().len(), SigType::Ed25519.public_key_len());
    assert_eq!(SigType::Ed25519.public_key_len(), 32);
    assert_eq!(SigType::Ed25519.private_key_len(), 32);
    assert_eq!(SigType::Ed25519.signature_len(), 64);

    let bytes = keys.rid.to_bytes();
    let reloaded = crate::data::RouterIdentity::from_bytes(&bytes).unwrap();
    assert_eq!(reloaded.to_bytes(), bytes);
    assert_eq!(reloaded.hash(), keys.rid.hash());
}

#[test]
fn ed25519_sign_verify_rejects_tampered_message_or_signature() {
    let sk = SigningPrivateKey::generate(SigType::Ed25519);
    let pk = SigningPublicKey::from_secret(&sk).unwrap();
    let msg = b"From anonimal, with love <3";

    let sig = sk.sign(msg);
    assert!(pk.verify(msg, &sig).is_ok());

    let zero_msg = vec![0u8; msg.len()];
    assert!(pk.verify(&zero_msg, &sig).is_err());

    let zero_sig = crate::crypto::Signature::from_bytes(&vec![0u8; sig.as_bytes().len()]);
    assert!(pk.verify(msg, &zero_sig).is_err());
}

#[test]
fn routing_key_is_deterministic_for_nonzero_hash_and_rejects_zero() {
    let h = Hash::from_bytes(&[0x42u8; 32]);
    let now_ms = 1_700_000_000_000u64;
    let k1 = routing_key(&h, now_ms).unwrap();
    let k2 = routing_key(&h, now_ms).unwrap();
    assert_eq!(k1, k2);

    assert!(routing_key(&Hash::from_bytes(&[0u8; 32]), now_ms).is_err());
}

fn floodfill_ri(seed: u8) -> RouterInfo {
    let rsk = RouterSecretKeys::generate_with(SigType::Ed25519);
    let mut ri = RouterInfo::new(rsk.rid.clone());
    ri.set_addresses(vec![RouterAddress::new(
        &I2PString::new("NTCP2"),
        format!("10.0.0.{seed}:4444").parse().unwrap(),
    )]);
    ri.set_caps("fO");
    ri.sign(&rsk.signing_private_key);
    ri
}

#[test]
fn closest_floodfill_returns_minimal_xor_metric_then_the_next_closest() {
    let self_hash = Hash::from_bytes(&[0xAAu8; 32]);
    let mut netdb = NetworkDatabase::new(self_hash);
    let now_ms = 1_700_000_000_000u64;

    let mut hashes = Vec::new();
    for seed in 1..=3u8 {
        let ri = floodfill_ri(seed);
        hashes.push(ri.router_id.hash().clone());
        netdb.store_router_info(ri).unwrap();
    }

    let target = Hash::from_bytes(&[0x55u8; 32]);
    let rk = routing_key(&target, now_ms).unwrap();
    let mut by_metric: Vec<_> = hashes.iter().map(|h| (rk.xor(h), h.clone())).collect();
    by_metric.sort_by(|a, b| a.0.cmp(&b.0));

    let first = netdb.closest_floodfill(&target, &[], now_ms).unwrap().unwrap();
    assert_eq!(&first, &by_metric[0].1);

    let second = netdb
        .closest_floodfill(&target, &[first.clone()], now_ms)
        .unwrap()
        .unwrap();
    assert_eq!(&second, &by_metric[1].1);
}

#[test]
fn transit_hop_refusing_tunnels_writes_status_30_and_encrypts_every_record_once() {
    let sk = PrivateKey::new();
    let pk = PublicKey::from_secret(&sk);
    let ident = Hash::digest(&pk.0);

    let peers = vec![(ident.clone(), pk)];
    let tb = TunnelBuild::build(&peers, 99, true, 1_700_000_000);
    let mut records = tb.records.clone();

    let (idx, decision, reply_key, reply_iv) =
        handle_build_request_records(&records, &ident, &sk, false, 0, false)
            .unwrap()
            .expect("record addressed to us");
    assert_eq!(decision.status, status::BANDWIDTH_REJECT);
    assert_eq!(status::BANDWIDTH_REJECT, 30);

    let before = records.clone();
    build_reply_records(&mut records, idx, decision.status, &reply_key, &reply_iv).unwrap();

    // Every record, including ones this hop has no view into, was
    // encrypted exactly once under the build request's reply key/iv.
    for (i, (after, original)) in records.iter().zip(before.iter()).enumerate() {
        let mut expect = *original;
        if i == idx {
            // The reply record itself was overwritten before encryption;
            // we can't compare it against the original build record.
            continue;
        }
        crate::crypto::aes_cbc::encrypt(&reply_key, &reply_iv, &mut expect).unwrap();
        assert_eq!(after, &expect);
    }

    let results = tb.handle_build_response(&mut records.clone()).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].1, status::BANDWIDTH_REJECT);
}
