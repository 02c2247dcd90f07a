//! Tunnel data-phase runtime (C7, §4.7): per-hop layered AES transform
//! for established tunnels, and client-message fragmentation/reassembly
//! into 1024-byte tunnel-data messages.

use cookie_factory::{gen_be_u32, gen_be_u8, gen_slice, GenError};

use crate::constants::{TUNNEL_DATA_PAYLOAD_LEN, TUNNEL_EXPIRATION_MS};
use crate::crypto::aes_cbc;
use crate::crypto::rng::rand_bytes;
use crate::data::frame::{generate, WriteContext};
use crate::data::Hash;
use crate::error::Result;
use crate::i2np::TunnelDataPayload;

/// Delivery instruction flag bits for a tunnel-message fragment (§4.7).
pub mod delivery_flag {
    pub const LOCAL: u8 = 0;
    pub const ROUTER: u8 = 1;
    pub const TUNNEL: u8 = 2;
    pub const FRAGMENTED: u8 = 1 << 3;
    pub const FIRST_FRAGMENT: u8 = 1 << 4;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TunnelRole {
    Gateway,
    Participant,
    Endpoint,
}

/// One hop's symmetric key material once a build has completed and the
/// hop's ElGamal keys are discarded in favor of the data-phase pair
/// (§4.6 step 3, §4.7).
#[derive(Clone, Debug)]
pub struct HopCrypto {
    pub layer_key: [u8; 32],
    pub iv_key: [u8; 32],
}

/// An established tunnel as seen from one participant: its ordered hop
/// keys (used only at the gateway/participant acting locally — a
/// transit hop holds just its own single `HopCrypto`), role, and
/// lifetime bookkeeping for the pool's expiry policy (§4.8, §8 property
/// 10).
#[derive(Clone, Debug)]
pub struct EstablishedTunnel {
    pub tunnel_id: u32,
    pub hops: Vec<HopCrypto>,
    pub role: TunnelRole,
    pub created_ms: u64,
    pub recreated: bool,
}

impl EstablishedTunnel {
    pub fn new(tunnel_id: u32, hops: Vec<HopCrypto>, role: TunnelRole, created_ms: u64) -> Self {
        EstablishedTunnel {
            tunnel_id,
            hops,
            role,
            created_ms,
            recreated: false,
        }
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.created_ms)
    }

    pub fn is_expiring(&self, now_ms: u64) -> bool {
        self.age_ms(now_ms) + crate::constants::TUNNEL_EXPIRY_THRESHOLD_MS > TUNNEL_EXPIRATION_MS
    }

    pub fn needs_recreate(&self, now_ms: u64) -> bool {
        !self.recreated
            && self.age_ms(now_ms) + crate::constants::TUNNEL_RECREATE_THRESHOLD_MS > TUNNEL_EXPIRATION_MS
    }
}

/// Single-hop transform applied by a transit tunnel to one tunnel-data
/// message: decrypt the IV under `iv_key`, AES-CBC decrypt the payload
/// under `layer_key` with that IV, then re-encrypt the IV (§4.7).
pub fn transform_at_hop(hop: &HopCrypto, msg: &mut TunnelDataPayload) -> Result<()> {
    aes_cbc::decrypt_block(&hop.iv_key, &mut msg.iv);
    aes_cbc::decrypt(&hop.layer_key, &msg.iv, &mut msg.data)?;
    aes_cbc::encrypt_block(&hop.iv_key, &mut msg.iv);
    Ok(())
}

/// Applies a gateway's full layered encryption (all hops, first to
/// last) before the message is sent through the first hop (§4.7): the
/// gateway itself wraps the cleartext through every hop's layer before
/// dispatch, since each transit hop expects to find its own layer on
/// the outside.
pub fn wrap_for_gateway(hops: &[HopCrypto], msg: &mut TunnelDataPayload) -> Result<()> {
    for hop in hops.iter().rev() {
        aes_cbc::decrypt_block(&hop.iv_key, &mut msg.iv);
        aes_cbc::encrypt(&hop.layer_key, &msg.iv, &mut msg.data)?;
        aes_cbc::encrypt_block(&hop.iv_key, &mut msg.iv);
    }
    Ok(())
}

/// One clove-equivalent unit going into a tunnel-message stream: a
/// delivery-addressed message queued at the gateway (§4.7
/// `SendTunnelDataMsg`).
#[derive(Clone, Debug)]
pub struct TunnelMessageBlock {
    pub delivery_flag: u8,
    pub dest_hash: Option<Hash>,
    pub dest_tunnel: Option<u32>,
    pub payload: Vec<u8>,
}

impl TunnelMessageBlock {
    fn instructions_len(&self) -> usize {
        let mut len = 1;
        if self.dest_hash.is_some() {
            len += 32;
        }
        if self.dest_tunnel.is_some() {
            len += 4;
        }
        len
    }

    fn gen_instructions<'a>(
        &self,
        input: WriteContext<'a>,
        fragmented: bool,
        first: bool,
    ) -> std::result::Result<WriteContext<'a>, GenError> {
        let mut flag = self.delivery_flag;
        if fragmented {
            flag |= delivery_flag::FRAGMENTED;
        }
        if first {
            flag |= delivery_flag::FIRST_FRAGMENT;
        }
        let mut ctx = gen_be_u8!(input, flag)?;
        if let Some(h) = &self.dest_hash {
            ctx = gen_slice!(ctx, &h.0)?;
        }
        if let Some(t) = self.dest_tunnel {
            ctx = gen_be_u32!(ctx, t)?;
        }
        Ok(ctx)
    }
}

/// Packs a sequence of [`TunnelMessageBlock`]s into 1004-byte fragment
/// bodies, gateway-side (§4.7). Each block's delivery instructions
/// precede its payload bytes; a block whose instructions + payload
/// don't fit in the remaining space of the current fragment spills
/// into the next fragment with the fragmented/first-fragment bits set
/// and a 2-byte length-prefixed continuation.
pub fn fragment(blocks: &[TunnelMessageBlock]) -> Vec<[u8; TUNNEL_DATA_PAYLOAD_LEN]> {
    let mut fragments = Vec::new();
    let mut current = Vec::with_capacity(TUNNEL_DATA_PAYLOAD_LEN);

    for block in blocks {
        let header_len = block.instructions_len() + 2;
        let mut remaining = &block.payload[..];
        let mut first = true;
        loop {
            if current.len() + header_len > TUNNEL_DATA_PAYLOAD_LEN && !current.is_empty() {
                fragments.push(pad_fragment(&current));
                current.clear();
            }
            let space = TUNNEL_DATA_PAYLOAD_LEN.saturating_sub(current.len() + header_len);
            let take = remaining.len().min(space);
            let fragmented = take < remaining.len();
            let instr = generate(block.instructions_len(), |input| {
                block.gen_instructions(input, fragmented, first)
            });
            current.extend_from_slice(&instr);
            current.extend_from_slice(&(take as u16).to_be_bytes());
            current.extend_from_slice(&remaining[..take]);
            remaining = &remaining[take..];
            first = false;
            if remaining.is_empty() {
                break;
            }
            fragments.push(pad_fragment(&current));
            current.clear();
        }
    }
    if !current.is_empty() {
        fragments.push(pad_fragment(&current));
    }
    fragments
}

fn pad_fragment(buf: &[u8]) -> [u8; TUNNEL_DATA_PAYLOAD_LEN] {
    let mut out = [0u8; TUNNEL_DATA_PAYLOAD_LEN];
    out[..buf.len()].copy_from_slice(buf);
    let mut pad = vec![0u8; TUNNEL_DATA_PAYLOAD_LEN - buf.len()];
    rand_bytes(&mut pad);
    out[buf.len()..].copy_from_slice(&pad);
    out
}

/// Endpoint-side reassembly of one fragment into its delivery-addressed
/// blocks, best-effort: malformed instruction bytes truncate the
/// remaining scan rather than erroring, since a corrupted fragment
/// means dropped data, not a parseable failure (§4.7, §7).
pub fn reassemble_fragment(fragment: &[u8; TUNNEL_DATA_PAYLOAD_LEN]) -> Vec<TunnelMessageBlock> {
    let mut out = Vec::new();
    let mut off = 0usize;
    while off < fragment.len() {
        let flag = fragment[off];
        off += 1;
        let dest_hash = if flag & delivery_flag::TUNNEL != 0 || flag & delivery_flag::ROUTER != 0 {
            if off + 32 > fragment.len() {
                break;
            }
            let h = Hash::from_slice(&fragment[off..off + 32]);
            off += 32;
            Some(h)
        } else {
            None
        };
        let dest_tunnel = if flag & delivery_flag::TUNNEL != 0 {
            if off + 4 > fragment.len() {
                break;
            }
            let t = u32::from_be_bytes(fragment[off..off + 4].try_into().unwrap());
            off += 4;
            Some(t)
        } else {
            None
        };
        if off + 2 > fragment.len() {
            break;
        }
        let len = u16::from_be_bytes(fragment[off..off + 2].try_into().unwrap()) as usize;
        off += 2;
        if off + len > fragment.len() || len == 0 {
            break;
        }
        out.push(TunnelMessageBlock {
            delivery_flag: flag,
            dest_hash,
            dest_tunnel,
            payload: fragment[off..off + len].to_vec(),
        });
        off += len;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hop(seed: u8) -> HopCrypto {
        HopCrypto {
            layer_key: [seed; 32],
            iv_key: [seed.wrapping_add(1); 32],
        }
    }

    #[test]
    fn gateway_wrap_and_hop_transform_round_trip() {
        let hops = vec![hop(1), hop(2), hop(3)];
        let mut msg = TunnelDataPayload {
            tunnel_id: 77,
            iv: [5u8; 16],
            data: [9u8; TUNNEL_DATA_PAYLOAD_LEN],
        };
        let original = msg.clone();

        wrap_for_gateway(&hops, &mut msg).unwrap();
        for h in &hops {
            transform_at_hop(h, &mut msg).unwrap();
        }
        assert_eq!(msg.data, original.data);
        assert_eq!(msg.iv, original.iv);
    }

    #[test]
    fn single_block_fits_one_fragment() {
        let block = TunnelMessageBlock {
            delivery_flag: delivery_flag::LOCAL,
            dest_hash: None,
            dest_tunnel: None,
            payload: vec![1, 2, 3, 4, 5],
        };
        let fragments = fragment(&[block]);
        assert_eq!(fragments.len(), 1);
        let blocks = reassemble_fragment(&fragments[0]);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].payload, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn oversized_block_spans_multiple_fragments() {
        let block = TunnelMessageBlock {
            delivery_flag: delivery_flag::LOCAL,
            dest_hash: None,
            dest_tunnel: None,
            payload: vec![7u8; TUNNEL_DATA_PAYLOAD_LEN * 2],
        };
        let fragments = fragment(&[block]);
        assert!(fragments.len() >= 2);
    }

    #[test]
    fn tunnel_expiry_flags_follow_age() {
        let t = EstablishedTunnel::new(1, vec![hop(1)], TunnelRole::Endpoint, 0);
        assert!(!t.is_expiring(0));
        assert!(t.is_expiring(TUNNEL_EXPIRATION_MS - crate::constants::TUNNEL_EXPIRY_THRESHOLD_MS + 1));
        assert!(t.needs_recreate(TUNNEL_EXPIRATION_MS - crate::constants::TUNNEL_RECREATE_THRESHOLD_MS + 1));
    }
}
