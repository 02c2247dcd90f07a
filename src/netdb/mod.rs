//! NetDb (C5, §4.5): the in-memory RouterInfo/LeaseSet store, floodfill
//! selection, the lookup state machine, and the maintenance timers that
//! drive expiry, publish and exploratory fill. A single task owns
//! mutation (§5); this module is written as a plain struct with `&mut
//! self` mutators so the owning task can wrap it behind its message
//! queue without the store itself depending on any particular executor.

pub mod reseed;
pub mod requests;

use std::collections::HashMap;
use std::sync::Arc;

use crate::constants;
use crate::data::{Hash, LeaseSet, RouterInfo};
use crate::error::{Error, Result};

pub use requests::RequestedDestination;

/// Civil (year, month, day) for a day count since the Unix epoch, per
/// Howard Hinnant's `civil_from_days` algorithm — avoids pulling in a
/// calendar crate for the single `yyyymmdd-UTC` string the routing key
/// needs (§3, §4.5).
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

/// `SHA-256(ident_hash ‖ yyyymmdd-UTC)`. Rotates daily; floodfill
/// responsibility is derived from proximity to this key, not to the
/// identity hash directly (§3, §4.5).
pub fn routing_key(ident: &Hash, now_ms: u64) -> Result<Hash> {
    if ident.is_zero() {
        return Err(Error::parse("routing_key", "ident hash must be non-zero"));
    }
    let days = (now_ms / 1000 / 86_400) as i64;
    let (y, m, d) = civil_from_days(days);
    let datestr = format!("{:04}{:02}{:02}", y, m, d);
    let mut buf = Vec::with_capacity(32 + datestr.len());
    buf.extend_from_slice(&ident.0);
    buf.extend_from_slice(datestr.as_bytes());
    Ok(Hash::digest(&buf))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProfileBucket {
    Fast,
    Average,
    Bad,
}

/// Per-peer reputation, maintained from tunnel-build and tunnel-test
/// outcomes; consulted by peer selection (§4.8) and not itself part of
/// the wire protocol.
#[derive(Clone, Debug, Default)]
pub struct PeerProfile {
    pub accepted_builds: u64,
    pub rejected_builds: u64,
    pub failed_tests: u64,
    pub last_seen_ms: u64,
}

impl PeerProfile {
    pub fn bucket(&self) -> ProfileBucket {
        if self.failed_tests > 3 || self.rejected_builds > self.accepted_builds.max(1) * 3 {
            ProfileBucket::Bad
        } else if self.accepted_builds > 10 && self.failed_tests == 0 {
            ProfileBucket::Fast
        } else {
            ProfileBucket::Average
        }
    }
}

pub struct NetworkDatabase {
    self_hash: Hash,
    routers: HashMap<Hash, Arc<RouterInfo>>,
    lease_sets: HashMap<Hash, Arc<LeaseSet>>,
    floodfills: Vec<Hash>,
    profiles: HashMap<Hash, PeerProfile>,
    requests: HashMap<Hash, RequestedDestination>,
}

impl NetworkDatabase {
    pub fn new(self_hash: Hash) -> Self {
        NetworkDatabase {
            self_hash,
            routers: HashMap::new(),
            lease_sets: HashMap::new(),
            floodfills: Vec::new(),
            profiles: HashMap::new(),
            requests: HashMap::new(),
        }
    }

    pub fn router_count(&self) -> usize {
        self.routers.len()
    }

    pub fn get_router(&self, hash: &Hash) -> Option<Arc<RouterInfo>> {
        self.routers.get(hash).cloned()
    }

    pub fn get_lease_set(&self, hash: &Hash) -> Option<Arc<LeaseSet>> {
        self.lease_sets.get(hash).cloned()
    }

    pub fn profile(&self, hash: &Hash) -> PeerProfile {
        self.profiles.get(hash).cloned().unwrap_or_default()
    }

    /// Validates the signature before storing; verification failure is a
    /// local drop, never a panic (§4.5, §7).
    pub fn store_router_info(&mut self, ri: RouterInfo) -> Result<()> {
        ri.verify()?;
        let hash = ri.router_id.hash().clone();
        if ri.is_floodfill() && !self.floodfills.contains(&hash) {
            self.floodfills.push(hash.clone());
        }
        if !ri.is_floodfill() {
            self.floodfills.retain(|h| h != &hash);
        }
        self.routers.insert(hash, Arc::new(ri));
        Ok(())
    }

    pub fn store_lease_set(&mut self, ls: LeaseSet) -> Result<()> {
        ls.verify()?;
        let hash = ls.dest.hash().clone();
        self.lease_sets.insert(hash, Arc::new(ls));
        Ok(())
    }

    pub fn remove_router(&mut self, hash: &Hash) {
        self.routers.remove(hash);
        self.floodfills.retain(|h| h != hash);
    }

    /// Expiry scan per §4.5: introducer-dependent RIs older than 1h are
    /// dropped; otherwise the age threshold depends on total known-router
    /// count and whether this router is itself a floodfill.
    pub fn expire(&mut self, now_ms: u64, self_is_floodfill: bool) -> Vec<Hash> {
        let total = self.routers.len();
        let mut expired = Vec::new();
        for (hash, ri) in self.routers.iter() {
            let age = now_ms.saturating_sub(ri.published.0);
            let uses_introducer = ri
                .addresses
                .iter()
                .any(|a| a.option("i0host").is_some());
            let unreachable = if uses_introducer && age > constants::NETDB_EXPIRY_INTRODUCER_AGE_MS {
                true
            } else if total > constants::NETDB_EXPIRY_MIN_KNOWN
                && age > constants::NETDB_EXPIRY_GRACE_MIN
            {
                if self_is_floodfill {
                    age > constants::NETDB_EXPIRY_FLOODFILL_AGE_MS
                } else if total > constants::NETDB_EXPIRY_BAND_HIGH {
                    age > constants::NETDB_EXPIRY_HIGH_AGE_MS
                } else if total > constants::NETDB_EXPIRY_BAND_MID {
                    age > constants::NETDB_EXPIRY_MID_AGE_MS
                } else {
                    false
                }
            } else {
                false
            };
            if unreachable {
                expired.push(hash.clone());
            }
        }
        for hash in &expired {
            self.remove_router(hash);
        }
        expired
    }

    pub fn sweep_expired_lease_sets(&mut self, now_ms: u64) {
        self.lease_sets
            .retain(|_, ls| !ls.non_expired_leases(now_ms, false).is_empty());
    }

    /// Smallest `routing_key(target) XOR ident_hash(ff)` among floodfills
    /// not in `excluded`, compared as an unsigned big-endian integer
    /// (§4.5, testable property 5).
    pub fn closest_floodfill(&self, target: &Hash, excluded: &[Hash], now_ms: u64) -> Result<Option<Hash>> {
        Ok(self.closest_floodfills(target, 1, excluded, now_ms)?.into_iter().next())
    }

    pub fn closest_floodfills(
        &self,
        target: &Hash,
        n: usize,
        excluded: &[Hash],
        now_ms: u64,
    ) -> Result<Vec<Hash>> {
        let rk = routing_key(target, now_ms)?;
        let mut candidates: Vec<(Hash, Hash)> = self
            .floodfills
            .iter()
            .filter(|h| !excluded.contains(h))
            .map(|h| (rk.xor(h), h.clone()))
            .collect();
        candidates.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(candidates.into_iter().take(n).map(|(_, h)| h).collect())
    }

    /// Up to three router hashes closest to `target`: non-floodfill peers
    /// for an exploratory reply, floodfill peers otherwise (§4.5).
    pub fn closest_for_search_reply(&self, target: &Hash, exploratory: bool, now_ms: u64) -> Result<Vec<Hash>> {
        if exploratory {
            let rk = routing_key(target, now_ms)?;
            let mut candidates: Vec<(Hash, Hash)> = self
                .routers
                .keys()
                .filter(|h| !self.floodfills.contains(h))
                .map(|h| (rk.xor(h), h.clone()))
                .collect();
            candidates.sort_by(|a, b| a.0.cmp(&b.0));
            Ok(candidates.into_iter().take(3).map(|(_, h)| h).collect())
        } else {
            self.closest_floodfills(target, 3, &[], now_ms)
        }
    }

    /// `num = clamp(800/|routers|, 1, 9)` random targets for the
    /// exploratory fill timer (§4.5).
    pub fn exploratory_target_count(&self) -> usize {
        let n = self.routers.len().max(1);
        (800 / n).clamp(1, 9)
    }

    pub fn explore_interval_ms(&self) -> u64 {
        if self.routers.len() >= constants::NETDB_EXPLORE_SLOW_THRESHOLD {
            constants::NETDB_EXPLORE_INTERVAL_SLOW_S * 1000
        } else {
            constants::NETDB_EXPLORE_INTERVAL_S * 1000
        }
    }

    pub fn needs_reseed(&self) -> bool {
        self.routers.len() < constants::NETDB_MIN_ROUTERS_BEFORE_RESEED
    }

    pub fn create_request(
        &mut self,
        dest: Hash,
        exploratory: bool,
        now_ms: u64,
    ) -> Option<&mut RequestedDestination> {
        if self.requests.contains_key(&dest) {
            return None;
        }
        self.requests.insert(
            dest.clone(),
            RequestedDestination::new(dest.clone(), exploratory, now_ms),
        );
        self.requests.get_mut(&dest)
    }

    pub fn request(&self, dest: &Hash) -> Option<&RequestedDestination> {
        self.requests.get(dest)
    }

    pub fn complete_request(&mut self, dest: &Hash) -> Option<RequestedDestination> {
        self.requests.remove(dest)
    }

    /// Enforces the per-request retry/fail deadlines (§4.5, §5); returns
    /// the hashes of requests that just failed outright.
    pub fn manage_requests(&mut self, now_ms: u64) -> (Vec<Hash>, Vec<Hash>) {
        let mut to_retry = Vec::new();
        let mut to_fail = Vec::new();
        for (dest, req) in self.requests.iter_mut() {
            if now_ms.saturating_sub(req.created_ms) > constants::LOOKUP_FAIL_MS {
                to_fail.push(dest.clone());
            } else if now_ms.saturating_sub(req.last_sent_ms) > constants::LOOKUP_RETRY_MS {
                req.last_sent_ms = now_ms;
                to_retry.push(dest.clone());
            }
        }
        for dest in &to_fail {
            self.requests.remove(dest);
        }
        (to_retry, to_fail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SigType;
    use crate::data::{RouterAddress, RouterSecretKeys};

    fn floodfill_ri(tag: u8) -> RouterInfo {
        let rsk = RouterSecretKeys::generate_with(SigType::Ed25519);
        let mut ri = RouterInfo::new(rsk.rid);
        ri.set_addresses(vec![RouterAddress::new(
            &crate::data::I2PString::new("NTCP2"),
            format!("127.0.0.{}:4444", tag).parse().unwrap(),
        )]);
        ri.set_caps("fOR");
        ri.sign(&rsk.signing_private_key);
        ri
    }

    #[test]
    fn closest_floodfill_matches_xor_metric() {
        let self_hash = Hash::from_bytes(&[0xAAu8; 32]);
        let mut db = NetworkDatabase::new(self_hash);
        let now = 1_700_000_000_000u64;

        let mut hashes = Vec::new();
        for i in 1..=3u8 {
            let ri = floodfill_ri(i);
            hashes.push(ri.router_id.hash().clone());
            db.store_router_info(ri).unwrap();
        }

        let target = Hash::from_bytes(&[0x55u8; 32]);
        let rk = routing_key(&target, now).unwrap();
        let mut by_metric: Vec<_> = hashes.iter().map(|h| (rk.xor(h), h.clone())).collect();
        by_metric.sort_by(|a, b| a.0.cmp(&b.0));

        let closest = db.closest_floodfill(&target, &[], now).unwrap().unwrap();
        assert_eq!(closest, by_metric[0].1);

        let next = db
            .closest_floodfill(&target, std::slice::from_ref(&closest), now)
            .unwrap()
            .unwrap();
        assert_eq!(next, by_metric[1].1);
    }

    #[test]
    fn routing_key_rejects_zero_hash() {
        assert!(routing_key(&Hash::from_bytes(&[0u8; 32]), 0).is_err());
    }

    #[test]
    fn exploratory_target_count_is_clamped() {
        let db = NetworkDatabase::new(Hash::from_bytes(&[1u8; 32]));
        assert_eq!(db.exploratory_target_count(), 9);
    }

    #[test]
    fn store_router_info_rejects_bad_signature() {
        let mut db = NetworkDatabase::new(Hash::from_bytes(&[1u8; 32]));
        let rsk = RouterSecretKeys::generate();
        let mut ri = RouterInfo::new(rsk.rid);
        ri.sign(&rsk.signing_private_key);
        ri.set_caps("tampered-after-signing");
        assert!(db.store_router_info(ri).is_err());
    }

    #[test]
    fn manage_requests_retries_then_fails() {
        let mut db = NetworkDatabase::new(Hash::from_bytes(&[1u8; 32]));
        let dest = Hash::from_bytes(&[9u8; 32]);
        db.create_request(dest.clone(), false, 0).unwrap();

        let (retry, fail) = db.manage_requests(constants::LOOKUP_RETRY_MS + 1);
        assert_eq!(retry, vec![dest.clone()]);
        assert!(fail.is_empty());

        let (_, fail) = db.manage_requests(constants::LOOKUP_FAIL_MS + 1);
        assert_eq!(fail, vec![dest]);
        assert!(db.request(&fail[0]).is_none());
    }
}
