//! Tunnel pool maintenance and peer selection (C8, §4.8): how a
//! destination keeps its inbound/outbound tunnel counts topped up,
//! schedules test traffic, and ages tunnels out.

use std::collections::HashMap;

use crate::data::{Hash, RouterInfo};
use crate::netdb::{NetworkDatabase, PeerProfile, ProfileBucket};
use crate::tunnel::runtime::{EstablishedTunnel, TunnelRole};

use crate::crypto::rng::{rand_u32_in, shuffle};

/// Identifies which local destination a [`TunnelPool`] serves. Every
/// router runs one always-on `Exploratory` pool with no associated
/// destination, used to give netDb exploration lookups somewhere to go
/// out through and as the default reply path for a `DatabaseLookup`
/// that named no reply tunnel of its own; every other pool belongs to
/// a specific local destination's LeaseSet.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum TunnelPoolId {
    Exploratory,
    Destination(Hash),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PoolTunnelState {
    Building,
    Established,
    Expiring,
    TestFailed,
    Failed,
}

pub struct PoolTunnel {
    pub tunnel: EstablishedTunnel,
    pub state: PoolTunnelState,
}

/// Target counts and peer-selection policy for one destination's
/// tunnels (§4.8).
#[derive(Clone, Debug)]
pub struct TunnelPoolConfig {
    pub num_inbound_hops: usize,
    pub num_outbound_hops: usize,
    pub num_inbound_tunnels: usize,
    pub num_outbound_tunnels: usize,
    pub explicit_peers: Option<Vec<Hash>>,
    pub exploratory: bool,
}

impl Default for TunnelPoolConfig {
    fn default() -> Self {
        TunnelPoolConfig {
            num_inbound_hops: 3,
            num_outbound_hops: 3,
            num_inbound_tunnels: 2,
            num_outbound_tunnels: 2,
            explicit_peers: None,
            exploratory: false,
        }
    }
}

pub struct TunnelPool {
    pub config: TunnelPoolConfig,
    pub inbound: HashMap<u32, PoolTunnel>,
    pub outbound: HashMap<u32, PoolTunnel>,
    /// `msg_id -> (outbound_id, inbound_id)` for an in-flight test pair
    /// (§4.8 "Run a test cycle").
    pub pending_tests: HashMap<u32, (u32, u32)>,
}

impl TunnelPoolConfig {
    /// Configuration for the router's always-on [`TunnelPoolId::Exploratory`]
    /// pool: otherwise identical to the default, just flagged so peer
    /// selection and build-record purpose bytes treat it accordingly
    /// (§4.8).
    pub fn exploratory() -> Self {
        TunnelPoolConfig {
            exploratory: true,
            ..Default::default()
        }
    }
}

impl TunnelPool {
    pub fn new(config: TunnelPoolConfig) -> Self {
        TunnelPool {
            config,
            inbound: HashMap::new(),
            outbound: HashMap::new(),
            pending_tests: HashMap::new(),
        }
    }

    fn established_count(tunnels: &HashMap<u32, PoolTunnel>) -> usize {
        tunnels
            .values()
            .filter(|t| t.state == PoolTunnelState::Established)
            .count()
    }

    /// How many more inbound/outbound tunnels must be built to reach
    /// target counts (§4.8 maintenance step 1).
    pub fn deficits(&self) -> (usize, usize) {
        let in_have = Self::established_count(&self.inbound);
        let out_have = Self::established_count(&self.outbound);
        (
            self.config.num_inbound_tunnels.saturating_sub(in_have),
            self.config.num_outbound_tunnels.saturating_sub(out_have),
        )
    }

    /// Per-tunnel aging pass (§4.8 maintenance step 2): which tunnels
    /// need a recreate build submitted, and which should be marked
    /// Expiring right now.
    pub fn maintenance_actions(&mut self, now_ms: u64) -> (Vec<u32>, Vec<u32>) {
        let mut to_recreate = Vec::new();
        let mut to_expire = Vec::new();
        for tunnels in [&mut self.inbound, &mut self.outbound] {
            for (id, pt) in tunnels.iter_mut() {
                if pt.state != PoolTunnelState::Established {
                    continue;
                }
                if pt.tunnel.needs_recreate(now_ms) {
                    pt.tunnel.recreated = true;
                    to_recreate.push(*id);
                }
                if pt.tunnel.is_expiring(now_ms) {
                    pt.state = PoolTunnelState::Expiring;
                    to_expire.push(*id);
                }
            }
        }
        (to_recreate, to_expire)
    }

    /// Pairs every established outbound tunnel with every established
    /// inbound tunnel for a test round, keyed by a fresh `msg_id`
    /// (§4.8 "Run a test cycle").
    pub fn start_test_cycle(&mut self, msg_id_seed: u32) -> Vec<(u32, u32, u32)> {
        // Tunnels still under test (Established, Expiring, or already
        // TestFailed once) are retried; Building/Failed are excluded.
        let testable = |s: PoolTunnelState| {
            matches!(
                s,
                PoolTunnelState::Established | PoolTunnelState::Expiring | PoolTunnelState::TestFailed
            )
        };
        let out_ids: Vec<u32> = self
            .outbound
            .iter()
            .filter(|(_, t)| testable(t.state))
            .map(|(id, _)| *id)
            .collect();
        let in_ids: Vec<u32> = self
            .inbound
            .iter()
            .filter(|(_, t)| testable(t.state))
            .map(|(id, _)| *id)
            .collect();

        let mut pairs = Vec::new();
        let mut msg_id = msg_id_seed;
        for out_id in &out_ids {
            for in_id in &in_ids {
                self.pending_tests.insert(msg_id, (*out_id, *in_id));
                pairs.push((msg_id, *out_id, *in_id));
                msg_id = msg_id.wrapping_add(1);
            }
        }
        pairs
    }

    /// A DeliveryStatus echo for `msg_id` arrived: both tunnels in the
    /// pair are confirmed live again.
    pub fn test_ack(&mut self, msg_id: u32) {
        if let Some((out_id, in_id)) = self.pending_tests.remove(&msg_id) {
            if let Some(t) = self.outbound.get_mut(&out_id) {
                t.state = PoolTunnelState::Established;
            }
            if let Some(t) = self.inbound.get_mut(&in_id) {
                t.state = PoolTunnelState::Established;
            }
        }
    }

    /// Un-acked test pairs advance TestFailed → Failed and are evicted
    /// (§4.8). Call once per maintenance cycle after a test round's
    /// deadline has passed.
    pub fn sweep_failed_tests(&mut self) -> Vec<u32> {
        let stale: Vec<u32> = self.pending_tests.keys().copied().collect();
        let mut evicted = Vec::new();
        for msg_id in stale {
            if let Some((out_id, in_id)) = self.pending_tests.remove(&msg_id) {
                for (id, tunnels) in [(out_id, &mut self.outbound), (in_id, &mut self.inbound)] {
                    if let Some(t) = tunnels.get_mut(&id) {
                        t.state = match t.state {
                            PoolTunnelState::Established | PoolTunnelState::Expiring => {
                                PoolTunnelState::TestFailed
                            }
                            PoolTunnelState::TestFailed => PoolTunnelState::Failed,
                            other => other,
                        };
                        if t.state == PoolTunnelState::Failed {
                            evicted.push(id);
                        }
                    }
                }
            }
        }
        self.inbound.retain(|id, t| t.state != PoolTunnelState::Failed || !evicted.contains(id));
        self.outbound.retain(|id, t| t.state != PoolTunnelState::Failed || !evicted.contains(id));
        evicted
    }
}

/// Selects `need` hops for a new tunnel, in forwarding order
/// (gateway-first); the caller reverses for inbound tunnels before use
/// (§4.8 "Peer selection").
pub fn select_peers(
    netdb: &NetworkDatabase,
    candidates: &[RouterInfo],
    need: usize,
    exploratory: bool,
    active_transport_peers: &[Hash],
) -> Vec<Hash> {
    let mut selected = Vec::new();
    let mut previous_hop: Option<Hash> = None;
    let mut remaining = need;

    if active_transport_peers.len() > 25 {
        if let Some(well_profiled) = active_transport_peers.iter().find(|h| {
            netdb.profile(h).bucket() != ProfileBucket::Bad
        }) {
            selected.push(well_profiled.clone());
            previous_hop = Some(well_profiled.clone());
            remaining = remaining.saturating_sub(1);
        }
    }

    let mut pool: Vec<&RouterInfo> = candidates.iter().collect();
    shuffle(&mut pool);

    for _ in 0..remaining {
        let pick = pool
            .iter()
            .find(|ri| {
                let hash = ri.router_id.hash();
                Some(hash) != previous_hop.as_ref()
                    && netdb.profile(hash).bucket() != ProfileBucket::Bad
                    && (exploratory || ri.is_high_bandwidth())
            })
            .or_else(|| pool.iter().find(|ri| Some(ri.router_id.hash()) != previous_hop.as_ref()));

        match pick {
            Some(ri) => {
                let hash = ri.router_id.hash().clone();
                pool.retain(|r| r.router_id.hash() != &hash);
                previous_hop = Some(hash.clone());
                selected.push(hash);
            }
            None => break,
        }
    }
    selected
}

/// Reverses a forwarding-order hop list into the order an inbound
/// tunnel's build records are addressed in, so the endpoint is self
/// (§4.8 step 4).
pub fn reverse_for_inbound(mut hops: Vec<Hash>) -> Vec<Hash> {
    hops.reverse();
    hops
}

/// Shuffles and validates an explicit peer list against the netDb;
/// returns the peers not currently resolvable so the caller can trigger
/// lookups (§4.8 "Explicit peers").
pub fn validate_explicit_peers(netdb: &NetworkDatabase, peers: &[Hash]) -> (Vec<Hash>, Vec<Hash>) {
    let mut shuffled = peers.to_vec();
    shuffle(&mut shuffled);
    let mut resolved = Vec::new();
    let mut missing = Vec::new();
    for h in shuffled {
        if netdb.get_router(&h).is_some() {
            resolved.push(h);
        } else {
            missing.push(h);
        }
    }
    (resolved, missing)
}

pub fn fresh_msg_id_seed() -> u32 {
    rand_u32_in(1, u32::MAX)
}

impl PartialEq for PoolTunnelState {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SigType;
    use crate::data::{RouterAddress, RouterSecretKeys};
    use crate::tunnel::runtime::HopCrypto;

    fn ri(caps: &str) -> RouterInfo {
        let rsk = RouterSecretKeys::generate_with(SigType::Ed25519);
        let mut ri = RouterInfo::new(rsk.rid);
        ri.set_addresses(vec![RouterAddress::new(
            &crate::data::I2PString::new("NTCP2"),
            "127.0.0.1:4444".parse().unwrap(),
        )]);
        ri.set_caps(caps);
        ri.sign(&rsk.signing_private_key);
        ri
    }

    #[test]
    fn exploratory_pool_id_is_distinct_from_destination_pools() {
        let dest = Hash::from_bytes(&[1u8; 32]);
        assert_ne!(TunnelPoolId::Exploratory, TunnelPoolId::Destination(dest.clone()));
        assert_eq!(TunnelPoolId::Destination(dest.clone()), TunnelPoolId::Destination(dest));

        let pool = TunnelPool::new(TunnelPoolConfig::exploratory());
        assert!(pool.config.exploratory);
    }

    #[test]
    fn deficits_reflect_established_counts() {
        let cfg = TunnelPoolConfig {
            num_inbound_tunnels: 2,
            num_outbound_tunnels: 2,
            ..TunnelPoolConfig::default()
        };
        let pool = TunnelPool::new(cfg);
        assert_eq!(pool.deficits(), (2, 2));
    }

    #[test]
    fn select_peers_prefers_high_bandwidth_for_non_exploratory() {
        let netdb = NetworkDatabase::new(Hash::from_bytes(&[1u8; 32]));
        let candidates = vec![ri("OR"), ri("OR"), ri("KR")];
        let selected = select_peers(&netdb, &candidates, 2, false, &[]);
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_cycle_ack_restores_established_state() {
        let mut pool = TunnelPool::new(TunnelPoolConfig::default());
        pool.outbound.insert(
            1,
            PoolTunnel {
                tunnel: EstablishedTunnel::new(1, vec![HopCrypto { layer_key: [0; 32], iv_key: [0; 32] }], TunnelRole::Gateway, 0),
                state: PoolTunnelState::Established,
            },
        );
        pool.inbound.insert(
            2,
            PoolTunnel {
                tunnel: EstablishedTunnel::new(2, vec![HopCrypto { layer_key: [0; 32], iv_key: [0; 32] }], TunnelRole::Endpoint, 0),
                state: PoolTunnelState::Established,
            },
        );
        let pairs = pool.start_test_cycle(100);
        assert_eq!(pairs.len(), 1);
        let msg_id = pairs[0].0;
        pool.test_ack(msg_id);
        assert!(pool.pending_tests.is_empty());
        assert_eq!(pool.outbound[&1].state, PoolTunnelState::Established);
    }

    #[test]
    fn unacked_tests_escalate_to_failed_and_evict() {
        let mut pool = TunnelPool::new(TunnelPoolConfig::default());
        pool.outbound.insert(
            1,
            PoolTunnel {
                tunnel: EstablishedTunnel::new(1, vec![], TunnelRole::Gateway, 0),
                state: PoolTunnelState::Established,
            },
        );
        pool.inbound.insert(
            2,
            PoolTunnel {
                tunnel: EstablishedTunnel::new(2, vec![], TunnelRole::Endpoint, 0),
                state: PoolTunnelState::Established,
            },
        );
        pool.start_test_cycle(1);
        pool.sweep_failed_tests();
        assert_eq!(pool.outbound[&1].state, PoolTunnelState::TestFailed);

        pool.start_test_cycle(1);
        pool.sweep_failed_tests();
        assert!(!pool.outbound.contains_key(&1));
    }
}
