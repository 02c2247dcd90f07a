//! I2NP message framing (§3, §4.2, §6): a fixed 16-byte header wrapping a
//! typed, expiring payload. Framing only validates the checksum and
//! reports expiration informationally; the decision to drop an expired
//! or malformed message belongs to the consumer (§4.2, §7).

use cookie_factory::{do_gen, gen_be_u16, gen_be_u32, gen_be_u64, gen_be_u8, gen_slice, GenError};
use sha2::{Digest, Sha256};

use crate::crypto::rng::rand_u32;
use crate::data::frame::generate;
use crate::data::{Hash, TunnelId};
use crate::error::{Error, Result};

pub const HEADER_LEN: usize = 16;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MessageType {
    DatabaseStore,
    DatabaseLookup,
    DatabaseSearchReply,
    DeliveryStatus,
    Garlic,
    TunnelData,
    TunnelGateway,
    Data,
    TunnelBuild,
    TunnelBuildReply,
    VariableTunnelBuild,
    VariableTunnelBuildReply,
}

impl MessageType {
    pub fn code(self) -> u8 {
        match self {
            MessageType::DatabaseStore => 1,
            MessageType::DatabaseLookup => 2,
            MessageType::DatabaseSearchReply => 3,
            MessageType::DeliveryStatus => 10,
            MessageType::Garlic => 11,
            MessageType::TunnelData => 18,
            MessageType::TunnelGateway => 19,
            MessageType::Data => 20,
            MessageType::TunnelBuild => 21,
            MessageType::TunnelBuildReply => 22,
            MessageType::VariableTunnelBuild => 23,
            MessageType::VariableTunnelBuildReply => 24,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        Ok(match code {
            1 => MessageType::DatabaseStore,
            2 => MessageType::DatabaseLookup,
            3 => MessageType::DatabaseSearchReply,
            10 => MessageType::DeliveryStatus,
            11 => MessageType::Garlic,
            18 => MessageType::TunnelData,
            19 => MessageType::TunnelGateway,
            20 => MessageType::Data,
            21 => MessageType::TunnelBuild,
            22 => MessageType::TunnelBuildReply,
            23 => MessageType::VariableTunnelBuild,
            24 => MessageType::VariableTunnelBuildReply,
            _ => return Err(Error::parse("MessageType::from_code", "unknown I2NP type")),
        })
    }
}

#[derive(Clone, Debug)]
pub struct Message {
    pub msg_type: MessageType,
    pub msg_id: u32,
    pub expiration_ms: u64,
    pub payload: Vec<u8>,
}

impl Message {
    /// `expiration_ms = now_ms + 60_000` when not overridden; `msg_id`
    /// drawn from the CSPRNG when not given (§4.2).
    pub fn build(
        msg_type: MessageType,
        payload: Vec<u8>,
        msg_id: Option<u32>,
        now_ms: u64,
    ) -> Message {
        Message {
            msg_type,
            msg_id: msg_id.unwrap_or_else(rand_u32),
            expiration_ms: now_ms + crate::constants::I2NP_DEFAULT_EXPIRATION_MS,
            payload,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let checksum = Sha256::digest(&self.payload)[0];
        generate(HEADER_LEN + self.payload.len(), |input| {
            do_gen!(
                input,
                gen_be_u8!(self.msg_type.code())
                    >> gen_be_u32!(self.msg_id)
                    >> gen_be_u64!(self.expiration_ms)
                    >> gen_be_u16!(self.payload.len() as u16)
                    >> gen_be_u8!(checksum)
                    >> gen_slice!(&self.payload)
            )
        })
    }

    pub fn parse(buf: &[u8]) -> Result<Message> {
        if buf.len() < HEADER_LEN {
            return Err(Error::parse("Message::parse", "truncated header"));
        }
        let msg_type = MessageType::from_code(buf[0])?;
        let msg_id = u32::from_be_bytes(buf[1..5].try_into().unwrap());
        let expiration_ms = u64::from_be_bytes(buf[5..13].try_into().unwrap());
        let size = u16::from_be_bytes(buf[13..15].try_into().unwrap()) as usize;
        let checksum = buf[15];
        let payload = buf
            .get(HEADER_LEN..HEADER_LEN + size)
            .ok_or_else(|| Error::parse("Message::parse", "truncated payload"))?;
        let actual = Sha256::digest(payload)[0];
        if actual != checksum {
            return Err(Error::parse("Message::parse", "bad checksum"));
        }
        Ok(Message {
            msg_type,
            msg_id,
            expiration_ms,
            payload: payload.to_vec(),
        })
    }

    /// Informational only (§4.2): framing never drops on this by itself.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.expiration_ms
    }
}

/// Delivery-instruction flag byte shared by DatabaseLookup and garlic
/// clove delivery instructions (§4.5, §4.9).
pub mod delivery {
    pub const LOCAL: u8 = 0;
    pub const DESTINATION: u8 = 1;
    pub const ROUTER: u8 = 2;
    pub const TUNNEL: u8 = 3;
}

/// DatabaseLookup lookup-type flag bits (§4.5).
pub mod lookup_flags {
    pub const ROUTER_INFO: u8 = 0;
    pub const LEASE_SET: u8 = 1 << 1;
    pub const EXPLORATORY: u8 = 1 << 2;
    pub const ENCRYPTED_REPLY: u8 = 1 << 3;
}

#[derive(Clone, Debug)]
pub struct DatabaseStorePayload {
    pub key: Hash,
    /// 0 = RouterInfo (gzipped), 1 = LeaseSet.
    pub ds_type: u8,
    pub reply_token: Option<u32>,
    pub reply_tunnel: Option<TunnelId>,
    pub reply_gateway: Option<Hash>,
    pub data: Vec<u8>,
}

impl DatabaseStorePayload {
    pub fn to_bytes(&self) -> Vec<u8> {
        let token = self.reply_token.unwrap_or(0);
        let reply_tunnel = self.reply_tunnel.unwrap_or(TunnelId(0)).0;
        let reply_gateway = self.reply_gateway.clone().unwrap_or_else(|| Hash::from_bytes(&[0; 32]));
        generate(37 + self.data.len(), |input| {
            let mut ctx = do_gen!(
                input,
                gen_slice!(&self.key.0) >> gen_be_u8!(self.ds_type) >> gen_be_u32!(token)
            )?;
            if token != 0 {
                ctx = do_gen!(ctx, gen_be_u32!(reply_tunnel) >> gen_slice!(&reply_gateway.0))?;
            }
            do_gen!(
                ctx,
                gen_be_u16!(self.data.len() as u16) >> gen_slice!(&self.data)
            )
        })
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < 37 {
            return Err(Error::parse("DatabaseStorePayload", "truncated"));
        }
        let key = Hash::from_slice(&buf[0..32]);
        let ds_type = buf[32];
        let token = u32::from_be_bytes(buf[33..37].try_into().unwrap());
        let mut off = 37;
        let (reply_tunnel, reply_gateway) = if token != 0 {
            if buf.len() < off + 36 {
                return Err(Error::parse("DatabaseStorePayload", "truncated reply fields"));
            }
            let tid = TunnelId(u32::from_be_bytes(buf[off..off + 4].try_into().unwrap()));
            let gw = Hash::from_slice(&buf[off + 4..off + 36]);
            off += 36;
            (Some(tid), Some(gw))
        } else {
            (None, None)
        };
        if buf.len() < off + 2 {
            return Err(Error::parse("DatabaseStorePayload", "truncated length"));
        }
        let len = u16::from_be_bytes(buf[off..off + 2].try_into().unwrap()) as usize;
        off += 2;
        let data = buf
            .get(off..off + len)
            .ok_or_else(|| Error::parse("DatabaseStorePayload", "truncated data"))?
            .to_vec();
        Ok(DatabaseStorePayload {
            key,
            ds_type,
            reply_token: if token != 0 { Some(token) } else { None },
            reply_tunnel,
            reply_gateway,
            data,
        })
    }
}

#[derive(Clone, Debug)]
pub struct DatabaseLookupPayload {
    pub key: Hash,
    pub from: Hash,
    pub flags: u8,
    pub reply_tunnel: Option<TunnelId>,
    /// Session key/tag for a one-off garlic-wrapped reply, present when
    /// [`lookup_flags::ENCRYPTED_REPLY`] is set (§4.5 "Encrypted-reply
    /// flag").
    pub reply_key: Option<[u8; 32]>,
    pub reply_tag: Option<[u8; 32]>,
    pub excluded: Vec<Hash>,
}

impl DatabaseLookupPayload {
    pub fn to_bytes(&self) -> Vec<u8> {
        generate(65 + self.excluded.len() * 32, |input| {
            let mut ctx = do_gen!(
                input,
                gen_slice!(&self.key.0) >> gen_slice!(&self.from.0) >> gen_be_u8!(self.flags)
            )?;
            if self.flags & lookup_flags::ENCRYPTED_REPLY != 0 || self.reply_tunnel.is_some() {
                ctx = gen_be_u32!(ctx, self.reply_tunnel.unwrap_or(TunnelId(0)).0)?;
            }
            if self.flags & lookup_flags::ENCRYPTED_REPLY != 0 {
                ctx = do_gen!(
                    ctx,
                    gen_slice!(&self.reply_key.unwrap_or([0u8; 32]))
                        >> gen_slice!(&self.reply_tag.unwrap_or([0u8; 32]))
                )?;
            }
            ctx = gen_be_u16!(ctx, self.excluded.len() as u16)?;
            for h in &self.excluded {
                ctx = gen_slice!(ctx, &h.0)?;
            }
            Ok(ctx)
        })
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < 65 {
            return Err(Error::parse("DatabaseLookupPayload", "truncated"));
        }
        let key = Hash::from_slice(&buf[0..32]);
        let from = Hash::from_slice(&buf[32..64]);
        let flags = buf[64];
        let mut off = 65;
        let encrypted_reply = flags & lookup_flags::ENCRYPTED_REPLY != 0;

        let reply_tunnel = if encrypted_reply {
            if buf.len() < off + 4 {
                return Err(Error::parse("DatabaseLookupPayload", "truncated reply tunnel"));
            }
            let tid = TunnelId(u32::from_be_bytes(buf[off..off + 4].try_into().unwrap()));
            off += 4;
            Some(tid)
        } else {
            None
        };

        let (reply_key, reply_tag) = if encrypted_reply {
            if buf.len() < off + 64 {
                return Err(Error::parse("DatabaseLookupPayload", "truncated reply key/tag"));
            }
            let mut key = [0u8; 32];
            key.copy_from_slice(&buf[off..off + 32]);
            off += 32;
            let mut tag = [0u8; 32];
            tag.copy_from_slice(&buf[off..off + 32]);
            off += 32;
            (Some(key), Some(tag))
        } else {
            (None, None)
        };

        if buf.len() < off + 2 {
            return Err(Error::parse("DatabaseLookupPayload", "truncated excluded count"));
        }
        let n = u16::from_be_bytes(buf[off..off + 2].try_into().unwrap()) as usize;
        off += 2;
        if buf.len() < off + n * 32 {
            return Err(Error::parse("DatabaseLookupPayload", "truncated excluded"));
        }
        let mut excluded = Vec::with_capacity(n);
        for i in 0..n {
            let o = off + i * 32;
            excluded.push(Hash::from_slice(&buf[o..o + 32]));
        }

        Ok(DatabaseLookupPayload {
            key,
            from,
            flags,
            reply_tunnel,
            reply_key,
            reply_tag,
            excluded,
        })
    }
}

#[derive(Clone, Debug)]
pub struct DatabaseSearchReplyPayload {
    pub key: Hash,
    pub peers: Vec<Hash>,
    pub from: Hash,
}

impl DatabaseSearchReplyPayload {
    pub fn to_bytes(&self) -> Vec<u8> {
        generate(33 + self.peers.len() * 32, |input| {
            let mut ctx = do_gen!(
                input,
                gen_slice!(&self.key.0) >> gen_be_u8!(self.peers.len() as u8)
            )?;
            for p in &self.peers {
                ctx = gen_slice!(ctx, &p.0)?;
            }
            gen_slice!(ctx, &self.from.0)
        })
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < 33 {
            return Err(Error::parse("DatabaseSearchReplyPayload", "truncated"));
        }
        let key = Hash::from_slice(&buf[0..32]);
        let n = buf[32] as usize;
        let need = 33 + n * 32 + 32;
        if buf.len() < need {
            return Err(Error::parse("DatabaseSearchReplyPayload", "truncated peers"));
        }
        let mut peers = Vec::with_capacity(n);
        for i in 0..n {
            let off = 33 + i * 32;
            peers.push(Hash::from_slice(&buf[off..off + 32]));
        }
        let from = Hash::from_slice(&buf[33 + n * 32..33 + n * 32 + 32]);
        Ok(DatabaseSearchReplyPayload { key, peers, from })
    }
}

#[derive(Clone, Debug)]
pub struct DeliveryStatusPayload {
    pub msg_id: u32,
    pub timestamp_ms: u64,
}

impl DeliveryStatusPayload {
    pub fn to_bytes(&self) -> Vec<u8> {
        generate(12, |input| {
            do_gen!(input, gen_be_u32!(self.msg_id) >> gen_be_u64!(self.timestamp_ms))
        })
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < 12 {
            return Err(Error::parse("DeliveryStatusPayload", "truncated"));
        }
        Ok(DeliveryStatusPayload {
            msg_id: u32::from_be_bytes(buf[0..4].try_into().unwrap()),
            timestamp_ms: u64::from_be_bytes(buf[4..12].try_into().unwrap()),
        })
    }
}

/// `VariableTunnelBuild`/`VariableTunnelBuildReply` payload: a
/// count-prefixed list of 528-byte records (§6).
#[derive(Clone, Debug)]
pub struct VariableTunnelBuildPayload {
    pub records: Vec<[u8; crate::constants::BUILD_RECORD_LEN]>,
}

impl VariableTunnelBuildPayload {
    pub fn to_bytes(&self) -> Vec<u8> {
        generate(1 + self.records.len() * crate::constants::BUILD_RECORD_LEN, |input| {
            let mut ctx = gen_be_u8!(input, self.records.len() as u8)?;
            for r in &self.records {
                ctx = gen_slice!(ctx, r)?;
            }
            Ok(ctx)
        })
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.is_empty() {
            return Err(Error::parse("VariableTunnelBuildPayload", "truncated"));
        }
        let n = buf[0] as usize;
        let rec_len = crate::constants::BUILD_RECORD_LEN;
        if buf.len() < 1 + n * rec_len {
            return Err(Error::parse("VariableTunnelBuildPayload", "truncated records"));
        }
        let mut records = Vec::with_capacity(n);
        for i in 0..n {
            let off = 1 + i * rec_len;
            let mut rec = [0u8; 528];
            rec.copy_from_slice(&buf[off..off + rec_len]);
            records.push(rec);
        }
        Ok(VariableTunnelBuildPayload { records })
    }
}

/// Fixed-8-hop `TunnelBuild`/`TunnelBuildReply`: identical wire shape to
/// the variable form with the record count implied rather than written.
pub const FIXED_BUILD_RECORDS: usize = 8;

#[derive(Clone, Debug)]
pub struct TunnelDataPayload {
    pub tunnel_id: u32,
    pub iv: [u8; 16],
    pub data: [u8; crate::constants::TUNNEL_DATA_PAYLOAD_LEN],
}

impl TunnelDataPayload {
    pub fn to_bytes(&self) -> Vec<u8> {
        generate(crate::constants::TUNNEL_DATA_MSG_LEN, |input| {
            do_gen!(
                input,
                gen_be_u32!(self.tunnel_id) >> gen_slice!(&self.iv) >> gen_slice!(&self.data)
            )
        })
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() != crate::constants::TUNNEL_DATA_MSG_LEN {
            return Err(Error::parse("TunnelDataPayload", "bad length"));
        }
        let tunnel_id = u32::from_be_bytes(buf[0..4].try_into().unwrap());
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&buf[4..20]);
        let mut data = [0u8; crate::constants::TUNNEL_DATA_PAYLOAD_LEN];
        data.copy_from_slice(&buf[20..]);
        Ok(TunnelDataPayload { tunnel_id, iv, data })
    }
}

#[derive(Clone, Debug)]
pub struct TunnelGatewayPayload {
    pub tunnel_id: u32,
    pub data: Vec<u8>,
}

impl TunnelGatewayPayload {
    pub fn to_bytes(&self) -> Vec<u8> {
        generate(6 + self.data.len(), |input| {
            do_gen!(
                input,
                gen_be_u32!(self.tunnel_id) >> gen_be_u16!(self.data.len() as u16) >> gen_slice!(&self.data)
            )
        })
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < 6 {
            return Err(Error::parse("TunnelGatewayPayload", "truncated"));
        }
        let tunnel_id = u32::from_be_bytes(buf[0..4].try_into().unwrap());
        let len = u16::from_be_bytes(buf[4..6].try_into().unwrap()) as usize;
        let data = buf
            .get(6..6 + len)
            .ok_or_else(|| Error::parse("TunnelGatewayPayload", "truncated data"))?
            .to_vec();
        Ok(TunnelGatewayPayload { tunnel_id, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_round_trips() {
        let msg = Message::build(MessageType::DeliveryStatus, vec![1, 2, 3, 4], Some(42), 1_000);
        let bytes = msg.to_bytes();
        let parsed = Message::parse(&bytes).unwrap();
        assert_eq!(parsed.msg_type, MessageType::DeliveryStatus);
        assert_eq!(parsed.msg_id, 42);
        assert_eq!(parsed.payload, vec![1, 2, 3, 4]);
        assert!(!parsed.is_expired(1_000));
        assert!(parsed.is_expired(1_000 + crate::constants::I2NP_DEFAULT_EXPIRATION_MS + 1));
    }

    #[test]
    fn message_rejects_bad_checksum() {
        let msg = Message::build(MessageType::Garlic, vec![9, 9, 9], None, 0);
        let mut bytes = msg.to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(Message::parse(&bytes).is_err());
    }

    #[test]
    fn database_store_round_trips_without_reply_token() {
        let payload = DatabaseStorePayload {
            key: Hash::from_bytes(&[7u8; 32]),
            ds_type: 0,
            reply_token: None,
            reply_tunnel: None,
            reply_gateway: None,
            data: vec![1, 2, 3],
        };
        let bytes = payload.to_bytes();
        let parsed = DatabaseStorePayload::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.key, payload.key);
        assert_eq!(parsed.data, payload.data);
        assert!(parsed.reply_token.is_none());
    }

    #[test]
    fn database_lookup_round_trips_with_encrypted_reply() {
        let payload = DatabaseLookupPayload {
            key: Hash::from_bytes(&[3u8; 32]),
            from: Hash::from_bytes(&[4u8; 32]),
            flags: lookup_flags::LEASE_SET | lookup_flags::ENCRYPTED_REPLY,
            reply_tunnel: Some(TunnelId(77)),
            reply_key: Some([9u8; 32]),
            reply_tag: Some([8u8; 32]),
            excluded: vec![Hash::from_bytes(&[5u8; 32])],
        };
        let bytes = payload.to_bytes();
        let parsed = DatabaseLookupPayload::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.key, payload.key);
        assert_eq!(parsed.from, payload.from);
        assert_eq!(parsed.reply_tunnel.unwrap().0, 77);
        assert_eq!(parsed.reply_key, payload.reply_key);
        assert_eq!(parsed.reply_tag, payload.reply_tag);
        assert_eq!(parsed.excluded, payload.excluded);
    }

    #[test]
    fn database_store_round_trips_with_reply_token() {
        let payload = DatabaseStorePayload {
            key: Hash::from_bytes(&[7u8; 32]),
            ds_type: 1,
            reply_token: Some(99),
            reply_tunnel: Some(TunnelId(5)),
            reply_gateway: Some(Hash::from_bytes(&[8u8; 32])),
            data: vec![9, 9],
        };
        let bytes = payload.to_bytes();
        let parsed = DatabaseStorePayload::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.reply_token, Some(99));
        assert_eq!(parsed.reply_tunnel.unwrap().0, 5);
    }
}
