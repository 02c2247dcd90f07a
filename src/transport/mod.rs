//! Transport boundary (§1, §6): wire-level session establishment
//! (NTCP2/SSU handshakes, framing over TCP/UDP) is explicitly out of
//! scope for the router core. What the core needs from a transport is
//! narrow — hand it a framed I2NP message for a known peer, and be told
//! when one arrives — so this module is only that boundary, not an
//! implementation.
//!
//! Production embedders implement [`Transport`] against real NTCP2/SSU
//! sessions; [`router::Context`](crate::router::Context) holds a handle
//! to whatever implementation the embedder supplies.

use std::fmt;

use bytes::Bytes;

use crate::data::Hash;
use crate::error::Result;

/// One framed I2NP message (already produced by [`crate::i2np::Message::to_bytes`])
/// together with the peer it arrived from or is bound for.
#[derive(Clone, Debug)]
pub struct Frame {
    pub peer: Hash,
    pub bytes: Bytes,
}

/// What the router core needs from the transport layer (§1 Non-goals,
/// §6 "CLI, HTTP proxies, ... are external; they interact with the core
/// only via ..."). NTCP2/SSU session establishment, framing and
/// congestion control all live behind this trait.
pub trait Transport: Send + Sync {
    /// Hands a framed I2NP message to the transport for delivery to
    /// `peer`. Returns once the transport has accepted the frame for
    /// sending, not once it's been acknowledged by the peer.
    fn send(&self, peer: &Hash, frame: Vec<u8>) -> Result<()>;
}

/// A `Transport` that accepts every send and discards it; used by tests
/// and by any embedder that hasn't wired a real transport yet.
#[derive(Default)]
pub struct NullTransport;

impl fmt::Debug for NullTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NullTransport")
    }
}

impl Transport for NullTransport {
    fn send(&self, _peer: &Hash, _frame: Vec<u8>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_transport_accepts_everything() {
        let t = NullTransport;
        assert!(t.send(&Hash::from_bytes(&[1u8; 32]), vec![1, 2, 3]).is_ok());
    }
}
