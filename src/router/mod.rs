//! Router context (C10, §4.10): the process-wide handle owning local
//! identity, the current RouterInfo snapshot, reachability status, and
//! the dispatch of inbound I2NP messages into NetDb (C5), garlic
//! routing (C9), and the tunnel subsystem (C6/C7/C8). §5 assigns
//! NetDb, the tunnel manager, and each local destination their own
//! task with an inbound message queue; [`Context`] is the shared state
//! those tasks read through snapshots and mutate through their own
//! owned component, never through a process global.

use std::sync::{Arc, Mutex, RwLock};

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::config::RouterConfig;
use crate::constants;
use crate::crypto::rng::{rand_u32, rand_vec};
use crate::crypto::PublicKey;
use crate::data::{Hash, I2PDate, LeaseSet, RouterInfo, RouterSecretKeys};
use crate::error::{Error, Result};
use crate::garlic::{CloveRequest, GarlicDestination};
use crate::i2np::{
    delivery, DatabaseLookupPayload, DatabaseSearchReplyPayload, DatabaseStorePayload,
    DeliveryStatusPayload, Message, MessageType, TunnelGatewayPayload,
};
use crate::netdb::NetworkDatabase;
use crate::transport::Transport;

/// Network-reachability classification the router advertises/acts on
/// (§4.10). Distinct from [`RouterInfo::is_reachable`], which reflects
/// what was last published; `RouterStatus` is this process's current
/// live assessment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RouterStatus {
    Ok,
    Testing,
    Firewalled,
}

/// One inbound I2NP message the Context handed to the tunnel
/// subsystem's queue because dispatch itself doesn't hold tunnel state
/// (§5 "Tunnel manager task ... consumes an inbound message queue").
#[derive(Debug)]
pub struct TunnelInbound {
    pub from: Hash,
    pub msg: Message,
}

/// A message produced while handling dispatch that the embedder's
/// transport should deliver to `to`.
#[derive(Debug)]
pub struct Outgoing {
    pub to: Hash,
    pub msg: Message,
}

/// The process-wide router handle (§4.10). Long-lived state each task
/// owns outright (the netDb maps, the transit-tunnel table, a
/// destination's garlic sessions) lives behind its own lock taken only
/// for the duration of a single operation, never held across an
/// `.await`; `Context` itself is cheap to clone (`Arc`) into every
/// task.
pub struct Context {
    pub keys: RouterSecretKeys,
    ri: RwLock<Arc<RouterInfo>>,
    status: RwLock<RouterStatus>,
    accepts_tunnels: RwLock<bool>,
    config: RwLock<RouterConfig>,
    last_ri_update_ms: RwLock<u64>,
    pub netdb: Arc<RwLock<NetworkDatabase>>,
    pub garlic: Arc<Mutex<GarlicDestination>>,
    pub transport: Arc<dyn Transport>,
    tunnel_tx: mpsc::UnboundedSender<TunnelInbound>,
}

impl Context {
    /// Builds a Context around a freshly loaded or generated identity.
    /// `tunnel_tx` is the send half of the tunnel manager task's inbound
    /// queue (§5); the caller owns the matching receiver and its task.
    pub fn new(
        keys: RouterSecretKeys,
        ri: RouterInfo,
        config: RouterConfig,
        transport: Arc<dyn Transport>,
        tunnel_tx: mpsc::UnboundedSender<TunnelInbound>,
    ) -> Self {
        let self_hash = ri.router_id.hash().clone();
        Context {
            keys,
            ri: RwLock::new(Arc::new(ri)),
            status: RwLock::new(RouterStatus::Testing),
            accepts_tunnels: RwLock::new(config.accepts_tunnels),
            config: RwLock::new(config),
            last_ri_update_ms: RwLock::new(0),
            netdb: Arc::new(RwLock::new(NetworkDatabase::new(self_hash))),
            garlic: Arc::new(Mutex::new(GarlicDestination::new())),
            transport,
            tunnel_tx,
        }
    }

    /// The current RouterInfo snapshot. Readers get a reference-counted,
    /// immutable copy; [`Context::update_router_info`] swaps in a new one
    /// rather than mutating this one in place (§5 "RouterInfo objects
    /// handed to other tasks are immutable snapshots").
    pub fn router_info(&self) -> Arc<RouterInfo> {
        self.ri.read().unwrap().clone()
    }

    pub fn status(&self) -> RouterStatus {
        *self.status.read().unwrap()
    }

    pub fn set_status(&self, status: RouterStatus) {
        *self.status.write().unwrap() = status;
    }

    pub fn accepts_tunnels(&self) -> bool {
        *self.accepts_tunnels.read().unwrap()
    }

    pub fn set_accepts_tunnels(&self, accept: bool) {
        *self.accepts_tunnels.write().unwrap() = accept;
    }

    /// Re-signs and persists the current RouterInfo if the on-disk copy
    /// is older than 30 minutes or `force` marks a material change
    /// (address/caps update) (§4.10).
    pub fn update_router_info(&self, now_ms: u64, force: bool) -> Result<()> {
        let stale = now_ms.saturating_sub(*self.last_ri_update_ms.read().unwrap()) > 30 * 60 * 1000;
        if !stale && !force {
            return Ok(());
        }

        let reachable = matches!(self.status(), RouterStatus::Ok);
        let mut next = (*self.router_info()).clone();
        let caps = self.config.read().unwrap().caps(reachable);
        next.set_caps(&caps);
        next.published = I2PDate(now_ms);
        next.sign(&self.keys.signing_private_key);

        let path = self.config.read().unwrap().data_dir.join("router.info");
        next.to_file(path.to_string_lossy().as_ref())
            .map_err(|e| Error::io("update_router_info", e))?;

        *self.ri.write().unwrap() = Arc::new(next);
        *self.last_ri_update_ms.write().unwrap() = now_ms;
        info!("republished RouterInfo at {now_ms}ms");
        Ok(())
    }

    /// `DatabaseStore`/`DatabaseLookup`/`DatabaseSearchReply` go to NetDb
    /// (C5); `Garlic` unwraps through C9 and its cloves are fed back
    /// through this same dispatch; everything tunnel-shaped is handed to
    /// the tunnel manager's queue (C6/C7/C8) (§2 Control flow, §4.10).
    pub fn dispatch(&self, from: Hash, msg: Message, now_ms: u64) -> Result<Vec<Outgoing>> {
        match msg.msg_type {
            MessageType::DatabaseStore => self.handle_database_store(from, &msg.payload, now_ms),
            MessageType::DatabaseLookup => self.handle_database_lookup(from, &msg.payload, now_ms),
            MessageType::DatabaseSearchReply => self.handle_database_search_reply(&msg.payload, now_ms),
            MessageType::Garlic => self.handle_garlic(from, &msg.payload, now_ms),
            MessageType::DeliveryStatus => self.handle_delivery_status(from, &msg.payload, now_ms),
            MessageType::TunnelData
            | MessageType::TunnelGateway
            | MessageType::TunnelBuild
            | MessageType::TunnelBuildReply
            | MessageType::VariableTunnelBuild
            | MessageType::VariableTunnelBuildReply => {
                self.forward_to_tunnel_manager(from, msg);
                Ok(Vec::new())
            }
            MessageType::Data => {
                debug!("dropping Data message from {from}: no local destination wired");
                Ok(Vec::new())
            }
        }
    }

    /// Hands each reply `dispatch` computed to the transport (§4.10): the
    /// core decides *what* to send and to whom, the embedder's transport
    /// decides *how*. Send failures are logged and otherwise ignored —
    /// a dead peer here is no different from one that never replies.
    pub fn send_all(&self, outgoing: Vec<Outgoing>) {
        for out in outgoing {
            if let Err(e) = self.transport.send(&out.to, out.msg.to_bytes()) {
                debug!("transport send to {} failed: {e}", out.to);
            }
        }
    }

    fn forward_to_tunnel_manager(&self, from: Hash, msg: Message) {
        if self.tunnel_tx.send(TunnelInbound { from, msg }).is_err() {
            warn!("tunnel manager task is gone; dropping message");
        }
    }

    fn handle_database_store(&self, _from: Hash, payload: &[u8], now_ms: u64) -> Result<Vec<Outgoing>> {
        let ds = DatabaseStorePayload::from_bytes(payload)?;
        let mut stored_ri = None;
        match ds.ds_type {
            0 => {
                let ri_bytes = gunzip(&ds.data)?;
                let ri = RouterInfo::from_bytes(&ri_bytes)?;
                self.netdb.write().unwrap().store_router_info(ri.clone())?;
                stored_ri = Some(ri);
            }
            1 => {
                let ls = LeaseSet::from_bytes(&ds.data)?;
                self.netdb.write().unwrap().store_lease_set(ls)?;
            }
            other => return Err(Error::parse("DatabaseStore", format!("unknown ds_type {other}"))),
        }

        let mut out = Vec::new();
        if let (Some(_token), Some(gateway)) = (ds.reply_token, ds.reply_gateway.clone()) {
            let ack = DeliveryStatusPayload {
                msg_id: rand_u32(),
                timestamp_ms: now_ms,
            };
            out.push(Outgoing {
                to: gateway,
                msg: Message::build(MessageType::DeliveryStatus, ack.to_bytes(), None, now_ms),
            });

            if let Some(ri) = stored_ri {
                let self_hash = self.router_info().router_id.hash().clone();
                let netdb = self.netdb.read().unwrap();
                let floodfills = netdb.closest_floodfills(&ds.key, 3, &[self_hash], now_ms)?;
                let store = DatabaseStorePayload {
                    key: ds.key.clone(),
                    ds_type: 0,
                    reply_token: None,
                    reply_tunnel: None,
                    reply_gateway: None,
                    data: gzip(&ri.to_bytes()),
                };
                let store_bytes = store.to_bytes();
                for ff in floodfills {
                    out.push(Outgoing {
                        to: ff,
                        msg: Message::build(MessageType::DatabaseStore, store_bytes.clone(), None, now_ms),
                    });
                }
            }
        }
        Ok(out)
    }

    fn handle_database_lookup(&self, _from: Hash, payload: &[u8], now_ms: u64) -> Result<Vec<Outgoing>> {
        let lookup = DatabaseLookupPayload::from_bytes(payload)?;
        let netdb = self.netdb.read().unwrap();

        let store = if let Some(ri) = netdb.get_router(&lookup.key) {
            Some(DatabaseStorePayload {
                key: lookup.key.clone(),
                ds_type: 0,
                reply_token: None,
                reply_tunnel: None,
                reply_gateway: None,
                data: gzip(&ri.to_bytes()),
            })
        } else {
            netdb.get_lease_set(&lookup.key).map(|ls| DatabaseStorePayload {
                key: lookup.key.clone(),
                ds_type: 1,
                reply_token: None,
                reply_tunnel: None,
                reply_gateway: None,
                data: ls.to_bytes(),
            })
        };

        let inner_msg = match store {
            Some(payload) => Message::build(MessageType::DatabaseStore, payload.to_bytes(), None, now_ms),
            None => {
                let exploratory = lookup.flags & crate::i2np::lookup_flags::EXPLORATORY != 0;
                let peers = netdb.closest_for_search_reply(&lookup.key, exploratory, now_ms)?;
                let reply = DatabaseSearchReplyPayload {
                    key: lookup.key.clone(),
                    peers,
                    from: self.router_info().router_id.hash().clone(),
                };
                Message::build(MessageType::DatabaseSearchReply, reply.to_bytes(), None, now_ms)
            }
        };

        // Encrypted-reply: the requester supplied a session key and tag
        // for a reply tunnel, so wrap the reply in a one-off garlic
        // session instead of sending the bare I2NP message (§4.5).
        let msg = match (
            lookup.flags & crate::i2np::lookup_flags::ENCRYPTED_REPLY != 0,
            lookup.reply_key,
            lookup.reply_tag,
            lookup.reply_tunnel,
        ) {
            (true, Some(reply_key), Some(reply_tag), Some(_reply_tunnel)) => {
                let wrapped = crate::garlic::wrap_one_off(&reply_key, &reply_tag, inner_msg.to_bytes(), now_ms)?;
                Message::build(MessageType::Garlic, wrapped, None, now_ms)
            }
            _ => inner_msg,
        };
        Ok(vec![Outgoing {
            to: lookup.from,
            msg,
        }])
    }

    fn handle_database_search_reply(&self, payload: &[u8], now_ms: u64) -> Result<Vec<Outgoing>> {
        let reply = DatabaseSearchReplyPayload::from_bytes(payload)?;
        let mut netdb = self.netdb.write().unwrap();
        for peer in reply.peers {
            if netdb.get_router(&peer).is_none() {
                netdb.create_request(peer, false, now_ms);
            }
        }
        Ok(Vec::new())
    }

    /// A DeliveryStatus ack with no explicit session hint in the wire
    /// payload (§6): first offered to every garlic session this
    /// destination maintains, since only one can hold a matching
    /// pending-tag-batch entry; otherwise forwarded to the tunnel
    /// manager as a candidate tunnel-test ack (§4.8, §4.9).
    fn handle_delivery_status(&self, from: Hash, payload: &[u8], now_ms: u64) -> Result<Vec<Outgoing>> {
        let ack = DeliveryStatusPayload::from_bytes(payload)?;
        let consumed = self.garlic.lock().unwrap().ack_any_tag_batch(ack.msg_id);
        if !consumed {
            self.forward_to_tunnel_manager(
                from,
                Message::build(MessageType::DeliveryStatus, payload.to_vec(), Some(ack.msg_id), now_ms),
            );
        }
        Ok(Vec::new())
    }

    /// Unwraps a Garlic message and feeds every clove onward by its
    /// delivery instructions: a local clove is parsed as a further I2NP
    /// message and fed back through dispatch; a tunnel clove is
    /// forwarded to the tunnel manager as a TunnelGateway; a
    /// destination/router clove is handed to the transport directly (§2
    /// Control flow: "garlic to C9 ... which unwraps to further I2NP
    /// messages fed back through C10").
    fn handle_garlic(&self, from: Hash, payload: &[u8], now_ms: u64) -> Result<Vec<Outgoing>> {
        let cloves = self
            .garlic
            .lock()
            .unwrap()
            .handle_garlic_message(payload, &self.keys.private_key, now_ms)?;

        let mut out = Vec::new();
        for clove in cloves {
            match clove.delivery.flag {
                f if f == delivery::LOCAL => {
                    if let Ok(inner) = Message::parse(&clove.payload) {
                        out.extend(self.dispatch(from.clone(), inner, now_ms)?);
                    }
                }
                f if f == delivery::TUNNEL => {
                    let tunnel_id = clove.delivery.tunnel_id.map(|t| t.0).unwrap_or(0);
                    let payload = TunnelGatewayPayload {
                        tunnel_id,
                        data: clove.payload,
                    }
                    .to_bytes();
                    self.forward_to_tunnel_manager(
                        from.clone(),
                        Message::build(MessageType::TunnelGateway, payload, None, now_ms),
                    );
                }
                f if f == delivery::DESTINATION || f == delivery::ROUTER => {
                    if let Some(dest) = clove.delivery.dest_hash {
                        out.push(Outgoing {
                            to: dest,
                            msg: Message::build(MessageType::Data, clove.payload, None, now_ms),
                        });
                    }
                }
                other => debug!("clove with unknown delivery flag {other}; dropping"),
            }
        }
        Ok(out)
    }

    /// Wraps `payload` for `dest` through the garlic layer (§4.9).
    pub fn send_garlic(
        &self,
        dest_hash: &Hash,
        dest_pub_key: &PublicKey,
        clove: CloveRequest,
        ack_inbound_tunnel: Option<(Hash, crate::data::TunnelId)>,
        own_leaseset: Option<(&LeaseSet, &Hash)>,
        now_ms: u64,
    ) -> Result<Vec<u8>> {
        self.garlic.lock().unwrap().wrap_single_message(
            dest_hash,
            dest_pub_key,
            clove,
            ack_inbound_tunnel,
            own_leaseset,
            now_ms,
        )
    }
}

fn gzip(data: &[u8]) -> Vec<u8> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    let _ = enc.write_all(data);
    enc.finish().unwrap_or_default()
}

fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::read::GzDecoder;
    use std::io::Read;
    let mut dec = GzDecoder::new(data);
    let mut out = Vec::new();
    dec.read_to_end(&mut out)
        .map_err(|e| Error::parse("gunzip", e.to_string()))?;
    Ok(out)
}

fn now_ms() -> u64 {
    I2PDate::now().0
}

/// Drives NetDb's maintenance timers and the inbound queue dispatch
/// forwards to it (§4.5, §5 "NetDb task"). Runs until `rx` closes.
pub async fn run_netdb_task(ctx: Arc<Context>, mut rx: mpsc::UnboundedReceiver<(Hash, Message)>) {
    let mut manage_requests = interval(Duration::from_secs(constants::NETDB_MANAGE_REQUESTS_INTERVAL_S));
    let mut explore = interval(Duration::from_secs(constants::NETDB_EXPLORE_INTERVAL_S));
    manage_requests.set_missed_tick_behavior(MissedTickBehavior::Delay);
    explore.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Some((from, msg)) => match ctx.dispatch(from, msg, now_ms()) {
                        Ok(outgoing) => ctx.send_all(outgoing),
                        Err(e) => debug!("netdb dispatch error: {e}"),
                    },
                    None => break,
                }
            }
            _ = manage_requests.tick() => {
                let (_retry, failed) = ctx.netdb.write().unwrap().manage_requests(now_ms());
                for dest in failed {
                    debug!("lookup for {dest} failed: deadline elapsed");
                }
            }
            _ = explore.tick() => {
                let mut netdb = ctx.netdb.write().unwrap();
                let n = netdb.exploratory_target_count();
                for _ in 0..n {
                    let target = Hash::digest(&rand_vec(32));
                    netdb.create_request(target, true, now_ms());
                }
            }
        }
    }
}

/// Owns nothing of its own; periodically republishes RouterInfo when
/// stale and otherwise just drains whatever dispatch forwarded it
/// (§4.10, §5). A production embedder also drives [`tunnel::pool`] and
/// [`tunnel::build`] maintenance from this loop once transit-tunnel
/// state is wired in; this core exposes those as pure functions rather
/// than owning the task itself.
///
/// [`tunnel::pool`]: crate::tunnel::pool
/// [`tunnel::build`]: crate::tunnel::build
pub async fn run_tunnel_manager_task(ctx: Arc<Context>, mut rx: mpsc::UnboundedReceiver<TunnelInbound>) {
    let mut republish = interval(Duration::from_secs(60));
    republish.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Some(TunnelInbound { from, msg }) => {
                        debug!("tunnel manager received {:?} from {from}", msg.msg_type);
                    }
                    None => break,
                }
            }
            _ = republish.tick() => {
                if let Err(e) = ctx.update_router_info(now_ms(), false) {
                    warn!("update_router_info failed: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SigType;
    use crate::transport::NullTransport;

    fn fresh_context() -> Context {
        let keys = RouterSecretKeys::generate_with(SigType::Ed25519);
        let ri = RouterInfo::new(keys.rid.clone());
        let (tx, _rx) = mpsc::unbounded_channel();
        Context::new(keys, ri, RouterConfig::default(), Arc::new(NullTransport), tx)
    }

    #[test]
    fn fresh_context_starts_in_testing_status() {
        let ctx = fresh_context();
        assert_eq!(ctx.status(), RouterStatus::Testing);
        assert!(ctx.accepts_tunnels());
    }

    #[test]
    fn database_store_of_valid_router_info_populates_netdb() {
        let ctx = fresh_context();
        let peer_keys = RouterSecretKeys::generate_with(SigType::Ed25519);
        let mut peer_ri = RouterInfo::new(peer_keys.rid.clone());
        peer_ri.sign(&peer_keys.signing_private_key);
        let peer_hash = peer_ri.router_id.hash().clone();

        let payload = DatabaseStorePayload {
            key: peer_hash.clone(),
            ds_type: 0,
            reply_token: None,
            reply_tunnel: None,
            reply_gateway: None,
            data: gzip(&peer_ri.to_bytes()),
        };
        let msg = Message::build(MessageType::DatabaseStore, payload.to_bytes(), None, 1_000);
        let out = ctx.dispatch(peer_hash.clone(), msg, 1_000).unwrap();
        assert!(out.is_empty());
        assert!(ctx.netdb.read().unwrap().get_router(&peer_hash).is_some());
    }

    #[test]
    fn database_store_with_reply_token_queues_delivery_status() {
        let ctx = fresh_context();
        let peer_keys = RouterSecretKeys::generate_with(SigType::Ed25519);
        let mut peer_ri = RouterInfo::new(peer_keys.rid.clone());
        peer_ri.sign(&peer_keys.signing_private_key);
        let gateway = Hash::from_bytes(&[9u8; 32]);

        let payload = DatabaseStorePayload {
            key: peer_ri.router_id.hash().clone(),
            ds_type: 0,
            reply_token: Some(42),
            reply_tunnel: Some(crate::data::TunnelId(1)),
            reply_gateway: Some(gateway.clone()),
            data: gzip(&peer_ri.to_bytes()),
        };
        let msg = Message::build(MessageType::DatabaseStore, payload.to_bytes(), None, 1_000);
        let out = ctx.dispatch(Hash::from_bytes(&[1u8; 32]), msg, 1_000).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, gateway);
        assert_eq!(out[0].msg.msg_type, MessageType::DeliveryStatus);
    }

    #[test]
    fn database_store_with_reply_token_also_floods_closest_floodfills() {
        let ctx = fresh_context();

        for i in 1..=3u8 {
            let ff_keys = RouterSecretKeys::generate_with(SigType::Ed25519);
            let mut ff_ri = RouterInfo::new(ff_keys.rid.clone());
            ff_ri.set_caps("fO");
            ff_ri.sign(&ff_keys.signing_private_key);
            let _ = i;
            ctx.netdb.write().unwrap().store_router_info(ff_ri).unwrap();
        }

        let peer_keys = RouterSecretKeys::generate_with(SigType::Ed25519);
        let mut peer_ri = RouterInfo::new(peer_keys.rid.clone());
        peer_ri.sign(&peer_keys.signing_private_key);
        let gateway = Hash::from_bytes(&[9u8; 32]);

        let payload = DatabaseStorePayload {
            key: peer_ri.router_id.hash().clone(),
            ds_type: 0,
            reply_token: Some(42),
            reply_tunnel: Some(crate::data::TunnelId(1)),
            reply_gateway: Some(gateway.clone()),
            data: gzip(&peer_ri.to_bytes()),
        };
        let msg = Message::build(MessageType::DatabaseStore, payload.to_bytes(), None, 1_000);
        let out = ctx.dispatch(Hash::from_bytes(&[1u8; 32]), msg, 1_000).unwrap();

        assert_eq!(out.len(), 4, "ack plus up to three floodfill stores");
        assert_eq!(out[0].msg.msg_type, MessageType::DeliveryStatus);
        for flood in &out[1..] {
            assert_eq!(flood.msg.msg_type, MessageType::DatabaseStore);
        }
    }

    #[test]
    fn database_lookup_for_known_router_replies_with_database_store() {
        let ctx = fresh_context();
        let peer_keys = RouterSecretKeys::generate_with(SigType::Ed25519);
        let mut peer_ri = RouterInfo::new(peer_keys.rid.clone());
        peer_ri.sign(&peer_keys.signing_private_key);
        let peer_hash = peer_ri.router_id.hash().clone();
        ctx.netdb.write().unwrap().store_router_info(peer_ri).unwrap();

        let requester = Hash::from_bytes(&[3u8; 32]);
        let lookup = DatabaseLookupPayload {
            key: peer_hash,
            from: requester.clone(),
            flags: crate::i2np::lookup_flags::ROUTER_INFO,
            reply_tunnel: None,
            reply_key: None,
            reply_tag: None,
            excluded: vec![],
        };
        let msg = Message::build(MessageType::DatabaseLookup, lookup.to_bytes(), None, 2_000);
        let out = ctx.dispatch(requester.clone(), msg, 2_000).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, requester);
        assert_eq!(out[0].msg.msg_type, MessageType::DatabaseStore);
    }

    #[test]
    fn database_lookup_for_unknown_key_replies_with_search_reply() {
        let ctx = fresh_context();
        let requester = Hash::from_bytes(&[3u8; 32]);
        let lookup = DatabaseLookupPayload {
            key: Hash::from_bytes(&[7u8; 32]),
            from: requester.clone(),
            flags: crate::i2np::lookup_flags::ROUTER_INFO,
            reply_tunnel: None,
            reply_key: None,
            reply_tag: None,
            excluded: vec![],
        };
        let msg = Message::build(MessageType::DatabaseLookup, lookup.to_bytes(), None, 2_000);
        let out = ctx.dispatch(requester, msg, 2_000).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].msg.msg_type, MessageType::DatabaseSearchReply);
    }

    #[test]
    fn database_lookup_with_encrypted_reply_wraps_reply_in_garlic() {
        let ctx = fresh_context();
        let peer_keys = RouterSecretKeys::generate_with(SigType::Ed25519);
        let mut peer_ri = RouterInfo::new(peer_keys.rid.clone());
        peer_ri.sign(&peer_keys.signing_private_key);
        let peer_hash = peer_ri.router_id.hash().clone();
        ctx.netdb.write().unwrap().store_router_info(peer_ri).unwrap();

        let requester = Hash::from_bytes(&[3u8; 32]);
        let reply_key = [6u8; 32];
        let reply_tag = [7u8; 32];
        let lookup = DatabaseLookupPayload {
            key: peer_hash,
            from: requester.clone(),
            flags: crate::i2np::lookup_flags::ROUTER_INFO | crate::i2np::lookup_flags::ENCRYPTED_REPLY,
            reply_tunnel: Some(crate::data::TunnelId(5)),
            reply_key: Some(reply_key),
            reply_tag: Some(reply_tag),
            excluded: vec![],
        };
        let msg = Message::build(MessageType::DatabaseLookup, lookup.to_bytes(), None, 2_000);
        let out = ctx.dispatch(requester.clone(), msg, 2_000).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, requester);
        assert_eq!(out[0].msg.msg_type, MessageType::Garlic);

        let mut listener = crate::garlic::GarlicDestination::new();
        listener.expect_incoming_tag(reply_tag, reply_key, 1);
        let cloves = listener
            .handle_garlic_message(&out[0].msg.payload, &ctx.keys.private_key, 2_000)
            .unwrap();
        assert_eq!(cloves.len(), 1);
        let inner = Message::parse(&cloves[0].payload).unwrap();
        assert_eq!(inner.msg_type, MessageType::DatabaseStore);
    }

    #[test]
    fn tunnel_shaped_messages_are_forwarded_not_handled_locally() {
        let ctx = fresh_context();
        let msg = Message::build(MessageType::TunnelData, vec![0u8; 10], None, 1_000);
        let out = ctx.dispatch(Hash::from_bytes(&[2u8; 32]), msg, 1_000).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn garlic_local_clove_is_fed_back_through_dispatch() {
        let ctx = fresh_context();

        let peer_keys = RouterSecretKeys::generate_with(SigType::Ed25519);
        let mut peer_ri = RouterInfo::new(peer_keys.rid.clone());
        peer_ri.sign(&peer_keys.signing_private_key);
        let peer_hash = peer_ri.router_id.hash().clone();
        let ds = DatabaseStorePayload {
            key: peer_hash.clone(),
            ds_type: 0,
            reply_token: None,
            reply_tunnel: None,
            reply_gateway: None,
            data: gzip(&peer_ri.to_bytes()),
        };
        let inner = Message::build(MessageType::DatabaseStore, ds.to_bytes(), None, 1_000).to_bytes();

        let our_hash = ctx.router_info().router_id.hash().clone();
        let our_pub = ctx.router_info().router_id.public_key.clone();
        let clove = CloveRequest {
            delivery: crate::garlic::DeliveryInstructions::local(),
            payload: inner,
        };
        let wrapped = ctx
            .send_garlic(&our_hash, &our_pub, clove, None, None, 1_000)
            .unwrap();

        let garlic_msg = Message::build(MessageType::Garlic, wrapped, None, 1_000);
        let out = ctx.dispatch(peer_hash.clone(), garlic_msg, 1_000).unwrap();
        assert!(out.is_empty());
        assert!(ctx.netdb.read().unwrap().get_router(&peer_hash).is_some());
    }

    #[test]
    fn update_router_info_republishes_when_forced_and_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let keys = RouterSecretKeys::generate_with(SigType::Ed25519);
        let ri = RouterInfo::new(keys.rid.clone());
        let mut config = RouterConfig::default();
        config.data_dir = dir.path().to_path_buf();
        let (tx, _rx) = mpsc::unbounded_channel();
        let ctx = Context::new(keys, ri, config, Arc::new(NullTransport), tx);

        assert!(ctx.router_info().signature.is_none());
        ctx.update_router_info(1_000, true).unwrap();
        assert!(ctx.router_info().signature.is_some());
        assert!(dir.path().join("router.info").exists());

        assert!(ctx.update_router_info(1_001, false).is_ok());
    }
}
