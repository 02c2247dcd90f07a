//! Garlic routing (C9, §4.9): per-destination session-tag cache, ElGamal
//! fallback, clove assembly and the receive-side unwrap. A session lets a
//! sender skip the expensive ElGamal step on every message by handing the
//! recipient a batch of one-time-use tags keyed to a shared AES session
//! key; the recipient recognizes a tag on a later message and decrypts
//! with the cached key instead of attempting ElGamal.

use std::collections::{HashMap, VecDeque};

use cookie_factory::{do_gen, gen_be_u32, gen_be_u64, gen_be_u8, gen_slice, GenError};

use crate::constants;
use crate::crypto::rng::{rand_bytes, rand_u32, rand_vec};
use crate::crypto::{aes_cbc, elgamal, sha256, PrivateKey, PublicKey};
use crate::data::frame::{generate, WriteContext};
use crate::data::{Hash, LeaseSet, SessionTag, TunnelId};
use crate::error::{Error, Result};
use crate::i2np::{delivery, DatabaseStorePayload, DeliveryStatusPayload};

/// A clove's delivery instructions: where the receiving router should
/// send the unwrapped I2NP message (§3, §4.9).
#[derive(Clone, Debug, PartialEq)]
pub struct DeliveryInstructions {
    pub flag: u8,
    pub dest_hash: Option<Hash>,
    pub tunnel_id: Option<TunnelId>,
}

impl DeliveryInstructions {
    pub fn local() -> Self {
        DeliveryInstructions {
            flag: delivery::LOCAL,
            dest_hash: None,
            tunnel_id: None,
        }
    }

    pub fn destination(dest: Hash) -> Self {
        DeliveryInstructions {
            flag: delivery::DESTINATION,
            dest_hash: Some(dest),
            tunnel_id: None,
        }
    }

    pub fn tunnel(gateway: Hash, tunnel_id: TunnelId) -> Self {
        DeliveryInstructions {
            flag: delivery::TUNNEL,
            dest_hash: Some(gateway),
            tunnel_id: Some(tunnel_id),
        }
    }

    fn gen<'a>(&self, input: WriteContext<'a>) -> std::result::Result<WriteContext<'a>, GenError> {
        let mut ctx = gen_be_u8!(input, self.flag)?;
        if let Some(h) = &self.dest_hash {
            ctx = gen_slice!(ctx, &h.0)?;
        }
        if let Some(t) = &self.tunnel_id {
            ctx = gen_be_u32!(ctx, t.0)?;
        }
        Ok(ctx)
    }

    fn from_bytes(buf: &[u8], off: &mut usize) -> Result<Self> {
        if *off >= buf.len() {
            return Err(Error::parse("DeliveryInstructions", "truncated flag"));
        }
        let flag = buf[*off];
        *off += 1;
        let needs_hash = flag == delivery::DESTINATION || flag == delivery::ROUTER || flag == delivery::TUNNEL;
        let dest_hash = if needs_hash {
            if *off + 32 > buf.len() {
                return Err(Error::parse("DeliveryInstructions", "truncated hash"));
            }
            let h = Hash::from_slice(&buf[*off..*off + 32]);
            *off += 32;
            Some(h)
        } else {
            None
        };
        let tunnel_id = if flag == delivery::TUNNEL {
            if *off + 4 > buf.len() {
                return Err(Error::parse("DeliveryInstructions", "truncated tunnel id"));
            }
            let t = u32::from_be_bytes(buf[*off..*off + 4].try_into().unwrap());
            *off += 4;
            Some(TunnelId(t))
        } else {
            None
        };
        Ok(DeliveryInstructions {
            flag,
            dest_hash,
            tunnel_id,
        })
    }
}

/// One independently-routed payload inside a garlic message (§3, §4.9).
#[derive(Clone, Debug, PartialEq)]
pub struct Clove {
    pub delivery: DeliveryInstructions,
    pub payload: Vec<u8>,
    pub clove_id: u32,
    pub expiration_ms: u64,
    pub cert: [u8; 3],
}

impl Clove {
    fn gen<'a>(&self, input: WriteContext<'a>) -> std::result::Result<WriteContext<'a>, GenError> {
        let ctx = self.delivery.gen(input)?;
        do_gen!(
            ctx,
            gen_be_u32!(self.payload.len() as u32)
                >> gen_slice!(&self.payload)
                >> gen_be_u32!(self.clove_id)
                >> gen_be_u64!(self.expiration_ms)
                >> gen_slice!(&self.cert)
        )
    }

    fn from_bytes(buf: &[u8], off: &mut usize) -> Result<Self> {
        let delivery = DeliveryInstructions::from_bytes(buf, off)?;
        if *off + 4 > buf.len() {
            return Err(Error::parse("Clove", "truncated payload length"));
        }
        let len = u32::from_be_bytes(buf[*off..*off + 4].try_into().unwrap()) as usize;
        *off += 4;
        if *off + len > buf.len() {
            return Err(Error::parse("Clove", "truncated payload"));
        }
        let payload = buf[*off..*off + len].to_vec();
        *off += len;
        if *off + 4 + 8 + 3 > buf.len() {
            return Err(Error::parse("Clove", "truncated trailer"));
        }
        let clove_id = u32::from_be_bytes(buf[*off..*off + 4].try_into().unwrap());
        *off += 4;
        let expiration_ms = u64::from_be_bytes(buf[*off..*off + 8].try_into().unwrap());
        *off += 8;
        let mut cert = [0u8; 3];
        cert.copy_from_slice(&buf[*off..*off + 3]);
        *off += 3;
        Ok(Clove {
            delivery,
            payload,
            clove_id,
            expiration_ms,
            cert,
        })
    }
}

/// What the caller wants delivered; [`GarlicDestination::wrap_single_message`]
/// fills in `clove_id`/`expiration_ms`/`cert`.
pub struct CloveRequest {
    pub delivery: DeliveryInstructions,
    pub payload: Vec<u8>,
}

impl CloveRequest {
    fn into_clove(self, now_ms: u64) -> Clove {
        Clove {
            delivery: self.delivery,
            payload: self.payload,
            clove_id: rand_u32(),
            expiration_ms: now_ms + constants::I2NP_DEFAULT_EXPIRATION_MS,
            cert: [0u8; 3],
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LeaseSetUpdateStatus {
    UpToDate,
    Updated,
    Submitted,
    DoNotSend,
}

/// Per-remote-destination outbound session state (§3, §4.9 "Per-destination
/// session"). Owned by the [`GarlicDestination`] that installed it.
pub struct GarlicSession {
    session_key: [u8; 32],
    established: bool,
    tags: VecDeque<SessionTag>,
    pending_tags_by_msg_id: HashMap<u32, Vec<SessionTag>>,
    leaseset_status: LeaseSetUpdateStatus,
    leaseset_submitted_ms: Option<u64>,
}

impl GarlicSession {
    fn new() -> Self {
        GarlicSession {
            session_key: [0u8; 32],
            established: false,
            tags: VecDeque::new(),
            pending_tags_by_msg_id: HashMap::new(),
            leaseset_status: LeaseSetUpdateStatus::UpToDate,
            leaseset_submitted_ms: None,
        }
    }

    /// Testable property 7: `k` successive wraps each consume a distinct
    /// tag; the `(k+1)`-th call falls back to ElGamal.
    pub fn usable_tags(&self) -> usize {
        self.tags.len()
    }

    pub fn mark_leaseset_updated(&mut self) {
        if self.leaseset_status != LeaseSetUpdateStatus::DoNotSend {
            self.leaseset_status = LeaseSetUpdateStatus::Updated;
        }
    }

    pub fn mark_leaseset_do_not_send(&mut self) {
        self.leaseset_status = LeaseSetUpdateStatus::DoNotSend;
    }

    /// Whether an already-submitted LeaseSet needs re-attaching because
    /// the 4 s ack wait has elapsed without confirmation (§4.9, §5).
    pub fn leaseset_needs_resend(&self, now_ms: u64) -> bool {
        self.leaseset_status == LeaseSetUpdateStatus::Submitted
            && self
                .leaseset_submitted_ms
                .map(|t| now_ms.saturating_sub(t) >= constants::GARLIC_LEASESET_ACK_MS)
                .unwrap_or(false)
    }

    pub fn confirm_leaseset(&mut self) {
        if self.leaseset_status == LeaseSetUpdateStatus::Submitted {
            self.leaseset_status = LeaseSetUpdateStatus::UpToDate;
        }
    }
}

impl PartialEq for LeaseSetUpdateStatus {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

fn iv_from_seed(seed: &[u8]) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv.copy_from_slice(&sha256(seed)[0..16]);
    iv
}

/// Owns every outbound session this local destination maintains, plus the
/// cache of tags this destination has handed out and still expects to see
/// on inbound messages (§3 Ownership: "Session keys are owned by the
/// GarlicDestination that installed them").
pub struct GarlicDestination {
    sessions: HashMap<Hash, GarlicSession>,
    incoming_tags: HashMap<[u8; 32], ([u8; 32], u64)>,
}

impl GarlicDestination {
    pub fn new() -> Self {
        GarlicDestination {
            sessions: HashMap::new(),
            incoming_tags: HashMap::new(),
        }
    }

    pub fn session(&mut self, dest: &Hash) -> &mut GarlicSession {
        self.sessions.entry(dest.clone()).or_insert_with(GarlicSession::new)
    }

    /// `WrapSingleMessage(inner)` (§4.9): assembles the caller's clove plus
    /// whatever ack/leaseset cloves are due, AES-encrypts the block under
    /// the session's tag or a fresh ElGamal-wrapped key, and returns the
    /// Garlic I2NP payload ready for [`crate::i2np::Message::build`].
    pub fn wrap_single_message(
        &mut self,
        dest_hash: &Hash,
        dest_pub_key: &PublicKey,
        caller_clove: CloveRequest,
        ack_inbound_tunnel: Option<(Hash, TunnelId)>,
        own_leaseset: Option<(&LeaseSet, &Hash)>,
        now_ms: u64,
    ) -> Result<Vec<u8>> {
        let now_s = now_ms / 1000;
        let session = self.sessions.entry(dest_hash.clone()).or_insert_with(GarlicSession::new);

        let mut prefix = Vec::new();
        let key;
        let iv;
        if let Some(tag) = session.tags.pop_front() {
            prefix.extend_from_slice(&tag.tag);
            key = session.session_key;
            iv = iv_from_seed(&tag.tag);
        } else {
            let mut session_key = [0u8; 32];
            rand_bytes(&mut session_key);
            session.session_key = session_key;
            session.established = true;

            let mut pre_iv = [0u8; 32];
            rand_bytes(&mut pre_iv);
            let mut block = [0u8; constants::GARLIC_ELGAMAL_BLOCK_LEN];
            block[0..32].copy_from_slice(&session_key);
            block[32..64].copy_from_slice(&pre_iv);
            rand_bytes(&mut block[64..]);

            let ct = elgamal::encrypt(&dest_pub_key.0, &block);
            prefix.extend_from_slice(&ct);
            key = session_key;
            iv = iv_from_seed(&pre_iv);
        }

        let low_water = constants::GARLIC_NUM_TAGS * 2 / 3;
        let mut new_tags = Vec::new();
        if session.tags.len() <= low_water {
            for _ in 0..constants::GARLIC_NUM_TAGS {
                let mut raw = [0u8; 32];
                rand_bytes(&mut raw);
                let tag = SessionTag::new(raw, now_s);
                session.tags.push_back(tag.clone());
                new_tags.push(tag);
            }
        }

        let mut cloves = Vec::new();
        if !new_tags.is_empty() {
            let ack_msg_id = rand_u32();
            if let Some((gateway, tunnel_id)) = ack_inbound_tunnel {
                let ack_payload = DeliveryStatusPayload {
                    msg_id: ack_msg_id,
                    timestamp_ms: now_ms,
                }
                .to_bytes();
                cloves.push(Clove {
                    delivery: DeliveryInstructions::tunnel(gateway, tunnel_id),
                    payload: ack_payload,
                    clove_id: rand_u32(),
                    expiration_ms: now_ms + constants::I2NP_DEFAULT_EXPIRATION_MS,
                    cert: [0u8; 3],
                });
            }
            session.pending_tags_by_msg_id.insert(ack_msg_id, new_tags.clone());
        }

        if session.leaseset_status == LeaseSetUpdateStatus::Updated {
            if let Some((ls, our_hash)) = own_leaseset {
                let ds_payload = DatabaseStorePayload {
                    key: our_hash.clone(),
                    ds_type: 1,
                    reply_token: None,
                    reply_tunnel: None,
                    reply_gateway: None,
                    data: ls.to_bytes(),
                }
                .to_bytes();
                cloves.push(Clove {
                    delivery: DeliveryInstructions::local(),
                    payload: ds_payload,
                    clove_id: rand_u32(),
                    expiration_ms: now_ms + constants::I2NP_DEFAULT_EXPIRATION_MS,
                    cert: [0u8; 3],
                });
                session.leaseset_status = LeaseSetUpdateStatus::Submitted;
                session.leaseset_submitted_ms = Some(now_ms);
            }
        }

        cloves.push(caller_clove.into_clove(now_ms));

        let cloves_section = generate(512, |input| {
            let mut ctx = gen_be_u8!(input, cloves.len() as u8)?;
            for c in &cloves {
                ctx = c.gen(ctx)?;
            }
            Ok(ctx)
        });

        let mut block = Vec::new();
        block.extend_from_slice(&(new_tags.len() as u16).to_be_bytes());
        for t in &new_tags {
            block.extend_from_slice(&t.tag);
        }
        block.extend_from_slice(&(cloves_section.len() as u32).to_be_bytes());
        block.extend_from_slice(&sha256(&cloves_section));
        block.push(0u8);
        block.extend_from_slice(&cloves_section);

        let pad = (16 - block.len() % 16) % 16;
        block.extend_from_slice(&rand_vec(pad));

        aes_cbc::encrypt(&key, &iv, &mut block)?;

        let mut out = prefix;
        out.extend_from_slice(&block);
        Ok(out)
    }

    /// A DeliveryStatus ack for `msg_id` arrived: the tag batch attached to
    /// that message is confirmed delivered. No action is needed beyond
    /// dropping the bookkeeping entry — the tags are already live in
    /// `session.tags` from the moment they were sent.
    pub fn tag_batch_acked(&mut self, dest_hash: &Hash, msg_id: u32) {
        if let Some(session) = self.sessions.get_mut(dest_hash) {
            session.pending_tags_by_msg_id.remove(&msg_id);
        }
    }

    /// Same as [`GarlicDestination::tag_batch_acked`] for callers that only
    /// have the `msg_id` off the wire, with no per-destination hint (§6):
    /// every session is checked since only one can hold a matching entry.
    /// Returns whether any session consumed it.
    pub fn ack_any_tag_batch(&mut self, msg_id: u32) -> bool {
        for session in self.sessions.values_mut() {
            if session.pending_tags_by_msg_id.remove(&msg_id).is_some() {
                return true;
            }
        }
        false
    }

    /// Receive path (§4.9 `handle_garlic_message`): try the session-tag
    /// cache, fall back to ElGamal, validate the payload hash, install any
    /// newly advertised tags, and return the cloves for dispatch by
    /// delivery type (left to the caller, per §4.9).
    pub fn handle_garlic_message(
        &mut self,
        buf: &[u8],
        our_private_key: &PrivateKey,
        now_ms: u64,
    ) -> Result<Vec<Clove>> {
        let now_s = now_ms / 1000;
        let leading_tag = if buf.len() >= 32 {
            let mut tag = [0u8; 32];
            tag.copy_from_slice(&buf[0..32]);
            if self.incoming_tags.contains_key(&tag) {
                Some(tag)
            } else {
                None
            }
        } else {
            None
        };
        let (key, iv, body) = if let Some(tag) = leading_tag {
            let (session_key, _) = self.incoming_tags.remove(&tag).unwrap();
            (session_key, iv_from_seed(&tag), &buf[32..])
        } else {
            if buf.len() < constants::ELGAMAL_CIPHERTEXT_LEN {
                return Err(Error::parse("handle_garlic_message", "too short for ElGamal block"));
            }
            let mut ct = [0u8; constants::ELGAMAL_CIPHERTEXT_LEN];
            ct.copy_from_slice(&buf[0..constants::ELGAMAL_CIPHERTEXT_LEN]);
            let block = elgamal::decrypt(&our_private_key.0, &ct)?;
            let mut session_key = [0u8; 32];
            session_key.copy_from_slice(&block[0..32]);
            let pre_iv = &block[32..64];
            (session_key, iv_from_seed(pre_iv), &buf[constants::ELGAMAL_CIPHERTEXT_LEN..])
        };

        let mut block = body.to_vec();
        if block.len() % 16 != 0 {
            return Err(Error::parse("handle_garlic_message", "AES block misaligned"));
        }
        aes_cbc::decrypt(&key, &iv, &mut block)?;

        if block.len() < 2 {
            return Err(Error::parse("handle_garlic_message", "truncated tag count"));
        }
        let tag_count = u16::from_be_bytes(block[0..2].try_into().unwrap()) as usize;
        let mut off = 2;
        let mut fresh_tags = Vec::with_capacity(tag_count);
        for _ in 0..tag_count {
            if off + 32 > block.len() {
                return Err(Error::parse("handle_garlic_message", "truncated tags"));
            }
            let mut tag = [0u8; 32];
            tag.copy_from_slice(&block[off..off + 32]);
            off += 32;
            fresh_tags.push(tag);
        }

        if off + 4 + 32 + 1 > block.len() {
            return Err(Error::parse("handle_garlic_message", "truncated payload header"));
        }
        let payload_len = u32::from_be_bytes(block[off..off + 4].try_into().unwrap()) as usize;
        off += 4;
        let mut payload_hash = [0u8; 32];
        payload_hash.copy_from_slice(&block[off..off + 32]);
        off += 32;
        let _flag = block[off];
        off += 1;

        if off + payload_len > block.len() {
            return Err(Error::verify("handle_garlic_message", "payload_len exceeds buffer"));
        }
        let cloves_section = &block[off..off + payload_len];
        if sha256(cloves_section) != payload_hash {
            return Err(Error::verify("handle_garlic_message", "payload hash mismatch"));
        }

        for tag in fresh_tags {
            self.incoming_tags.insert(tag, (key, now_s));
        }
        self.prune_incoming_tags(now_s);

        if cloves_section.is_empty() {
            return Err(Error::parse("handle_garlic_message", "no cloves"));
        }
        let num_cloves = cloves_section[0] as usize;
        let mut coff = 1;
        let mut cloves = Vec::with_capacity(num_cloves);
        for _ in 0..num_cloves {
            cloves.push(Clove::from_bytes(cloves_section, &mut coff)?);
        }
        Ok(cloves)
    }

    /// Registers a tag this destination expects to see on an inbound
    /// garlic message, keyed to `key`, without going through the normal
    /// ElGamal-then-tag-batch flow. Used by a DatabaseLookup requester
    /// that handed its own session key/tag to a floodfill for a one-off
    /// encrypted reply (§4.5, [`wrap_one_off`]).
    pub fn expect_incoming_tag(&mut self, tag: [u8; 32], key: [u8; 32], now_s: u64) {
        self.incoming_tags.insert(tag, (key, now_s));
    }

    /// Drops incoming tags past the 16-minute epoch boundary (§3, §4.9).
    pub fn prune_incoming_tags(&mut self, now_s: u64) {
        self.incoming_tags
            .retain(|_, (_, created_s)| now_s.saturating_sub(*created_s) < constants::INCOMING_TAG_LIFETIME_S);
    }
}

/// Wraps `payload` as a single local-delivery clove in a garlic message
/// keyed to a caller-supplied session key and tag, with no tag
/// replenishment and no ack/leaseset cloves attached (§4.5 DatabaseLookup
/// "Encrypted-reply flag": "wrap the reply in a one-off garlic session
/// using the supplied session key and a single session tag").
pub fn wrap_one_off(session_key: &[u8; 32], tag: &[u8; 32], payload: Vec<u8>, now_ms: u64) -> Result<Vec<u8>> {
    let clove = Clove {
        delivery: DeliveryInstructions::local(),
        payload,
        clove_id: rand_u32(),
        expiration_ms: now_ms + constants::I2NP_DEFAULT_EXPIRATION_MS,
        cert: [0u8; 3],
    };
    let cloves_section = generate(256, |input| {
        let ctx = gen_be_u8!(input, 1u8)?;
        clove.gen(ctx)
    });

    let mut block = Vec::new();
    block.extend_from_slice(&0u16.to_be_bytes());
    block.extend_from_slice(&(cloves_section.len() as u32).to_be_bytes());
    block.extend_from_slice(&sha256(&cloves_section));
    block.push(0u8);
    block.extend_from_slice(&cloves_section);

    let pad = (16 - block.len() % 16) % 16;
    block.extend_from_slice(&rand_vec(pad));

    let iv = iv_from_seed(tag);
    aes_cbc::encrypt(session_key, &iv, &mut block)?;

    let mut out = tag.to_vec();
    out.extend_from_slice(&block);
    Ok(out)
}

impl Default for GarlicDestination {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;

    fn dest_keypair() -> (PrivateKey, PublicKey, Hash) {
        let sk = PrivateKey::new();
        let pk = PublicKey::from_secret(&sk);
        let hash = Hash::digest(&pk.0);
        (sk, pk, hash)
    }

    #[test]
    fn wrap_and_unwrap_round_trips_via_elgamal_fallback() {
        let (sk, pk, hash) = dest_keypair();
        let mut sender = GarlicDestination::new();
        let mut receiver = GarlicDestination::new();

        let clove = CloveRequest {
            delivery: DeliveryInstructions::local(),
            payload: b"hello garlic".to_vec(),
        };
        let wrapped = sender
            .wrap_single_message(&hash, &pk, clove, None, None, 1_000)
            .unwrap();

        let cloves = receiver.handle_garlic_message(&wrapped, &sk, 1_000).unwrap();
        assert_eq!(cloves.len(), 1);
        assert_eq!(cloves[0].payload, b"hello garlic");
    }

    #[test]
    fn session_tags_are_consumed_one_time_use() {
        let (sk, pk, hash) = dest_keypair();
        let mut sender = GarlicDestination::new();
        let mut receiver = GarlicDestination::new();

        let first = CloveRequest {
            delivery: DeliveryInstructions::local(),
            payload: b"first".to_vec(),
        };
        let wrapped = sender
            .wrap_single_message(&hash, &pk, first, None, None, 1_000)
            .unwrap();
        receiver.handle_garlic_message(&wrapped, &sk, 1_000).unwrap();

        let have_tags = sender.session(&hash).usable_tags();
        assert!(have_tags > 0, "first message should have minted a tag batch");

        let second = CloveRequest {
            delivery: DeliveryInstructions::local(),
            payload: b"second".to_vec(),
        };
        let wrapped2 = sender
            .wrap_single_message(&hash, &pk, second, None, None, 2_000)
            .unwrap();
        // Tag-keyed messages are shorter than a fresh ElGamal block (32-byte
        // tag vs. 514-byte ciphertext prefix).
        assert!(wrapped2.len() < wrapped.len());

        let cloves = receiver.handle_garlic_message(&wrapped2, &sk, 2_000).unwrap();
        assert_eq!(cloves[0].payload, b"second");
        assert_eq!(sender.session(&hash).usable_tags(), have_tags - 1);
    }

    #[test]
    fn tampered_aes_block_fails_payload_hash_check() {
        let (sk, pk, hash) = dest_keypair();
        let mut sender = GarlicDestination::new();
        let mut receiver = GarlicDestination::new();

        let clove = CloveRequest {
            delivery: DeliveryInstructions::local(),
            payload: b"tamper me".to_vec(),
        };
        let mut wrapped = sender
            .wrap_single_message(&hash, &pk, clove, None, None, 1_000)
            .unwrap();
        let last = wrapped.len() - 1;
        wrapped[last] ^= 0xFF;

        assert!(receiver.handle_garlic_message(&wrapped, &sk, 1_000).is_err());
    }

    #[test]
    fn leaseset_update_triggers_database_store_clove_and_resend_window() {
        let (sk, pk, hash) = dest_keypair();
        let rsk = crate::data::RouterSecretKeys::generate();
        let enc_sk = PrivateKey::new();
        let enc_key = PublicKey::from_secret(&enc_sk);
        let mut ls = LeaseSet {
            sig_key: rsk.rid.signing_key.clone(),
            dest: rsk.rid.clone(),
            enc_key,
            leases: vec![],
            sig: crate::crypto::Signature::from_bytes(&[]),
        };
        ls.sign(&rsk.signing_private_key);
        let our_hash = rsk.rid.hash().clone();

        let mut sender = GarlicDestination::new();
        sender.session(&hash).mark_leaseset_updated();

        let clove = CloveRequest {
            delivery: DeliveryInstructions::local(),
            payload: b"data".to_vec(),
        };
        let wrapped = sender
            .wrap_single_message(&hash, &pk, clove, None, Some((&ls, &our_hash)), 5_000)
            .unwrap();

        let mut receiver = GarlicDestination::new();
        let cloves = receiver.handle_garlic_message(&wrapped, &sk, 5_000).unwrap();
        assert_eq!(cloves.len(), 2, "expected the caller clove plus a DatabaseStore clove");

        assert!(!sender.session(&hash).leaseset_needs_resend(5_000));
        assert!(sender
            .session(&hash)
            .leaseset_needs_resend(5_000 + constants::GARLIC_LEASESET_ACK_MS));
    }

    #[test]
    fn wrap_one_off_is_recognized_via_pre_registered_tag() {
        let session_key = [3u8; 32];
        let tag = [4u8; 32];
        let wrapped = wrap_one_off(&session_key, &tag, b"db store reply".to_vec(), 1_000).unwrap();

        let mut requester = GarlicDestination::new();
        requester.expect_incoming_tag(tag, session_key, 1);
        let (sk, _pk, _hash) = dest_keypair();
        let cloves = requester.handle_garlic_message(&wrapped, &sk, 1_000).unwrap();
        assert_eq!(cloves.len(), 1);
        assert_eq!(cloves[0].payload, b"db store reply");
    }
}
