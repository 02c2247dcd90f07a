//! Protocol-level constants inherited verbatim from the network
//! specification. These are wire-format and tuning constants, not
//! implementation choices: changing them breaks interoperability or
//! diverges from the reference peer-selection/expiry behavior.

use data_encoding::{Encoding, Specification};
use lazy_static::lazy_static;

lazy_static! {
    /// I2P's base64 alphabet: standard base64 with `-`/`~` substituted for
    /// `+`/`/`, so identifiers are filesystem- and URL-safe.
    pub static ref I2P_BASE64: Encoding = {
        let mut spec = Specification::new();
        spec.symbols
            .push_str("ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-~");
        spec.padding = Some('=');
        spec.encoding().expect("valid base64 spec")
    };

    /// I2P's base32 alphabet, used for `.b32.i2p` addresses.
    pub static ref I2P_BASE32: Encoding = {
        let mut spec = Specification::new();
        spec.symbols.push_str("abcdefghijklmnopqrstuvwxyz234567");
        spec.encoding().expect("valid base32 spec")
    };
}

// Certificate type codes (RouterIdentity / Destination certificate, §3).
pub const NULL_CERT: u8 = 0;
pub const HASH_CERT: u8 = 1;
pub const SIGNED_CERT: u8 = 2;
pub const MULTI_CERT: u8 = 3;
pub const HIDDEN_CERT: u8 = 4;
pub const KEY_CERT: u8 = 5;

/// Byte length of the fixed RouterIdentity/Destination prefix that precedes
/// the certificate: 256-byte ElGamal public key + 128 bytes of
/// signing-key-or-padding space.
pub const IDENTITY_PREFIX_LEN: usize = 384;

/// ElGamal public/private key size in bytes (2048-bit MODP).
pub const ELGAMAL_KEY_LEN: usize = 256;

/// ElGamal plaintext block size before encryption (§4.1).
pub const ELGAMAL_PLAINTEXT_LEN: usize = 222;

/// ElGamal ciphertext block size after encryption (two 256-byte
/// components with 10 bytes of zero padding each, per spec §4.1).
pub const ELGAMAL_CIPHERTEXT_LEN: usize = 514;

/// Tunnel build record size (§3).
pub const BUILD_RECORD_LEN: usize = 528;

/// Cleartext size of a tunnel build record before ElGamal encryption.
pub const BUILD_RECORD_CLEARTEXT_LEN: usize = 222;

/// Minimum number of build records in a VariableTunnelBuild message,
/// regardless of hop count (§4.6 step 1).
pub const MIN_BUILD_RECORDS: usize = 5;

/// I2NP tunnel data message size (§4.7).
pub const TUNNEL_DATA_MSG_LEN: usize = 1024;
pub const TUNNEL_DATA_PAYLOAD_LEN: usize = 1004;

/// Default I2NP message expiration offset from send time.
pub const I2NP_DEFAULT_EXPIRATION_MS: u64 = 60_000;

/// Tunnel lifetime constants (§3).
pub const TUNNEL_EXPIRATION_MS: u64 = 10 * 60 * 1000;
pub const TUNNEL_EXPIRY_THRESHOLD_MS: u64 = 60 * 1000;
pub const TUNNEL_RECREATE_THRESHOLD_MS: u64 = 90 * 1000;
pub const TUNNEL_BUILD_TIMEOUT_MS: u64 = 30 * 1000;

/// Session tag lifetimes (§3).
pub const INCOMING_TAG_LIFETIME_S: u64 = 16 * 60;
pub const OUTGOING_TAG_LIFETIME_S: u64 = 12 * 60;

/// Lease expiry threshold subtracted from `end_date_ms` (§4.4).
pub const LEASE_EXPIRY_THRESHOLD_MS: u64 = 60 * 1000;

/// NetDb maintenance cadence (§4.5).
pub const NETDB_MANAGE_REQUESTS_INTERVAL_S: u64 = 15;
pub const NETDB_SAVE_INTERVAL_S: u64 = 60;
pub const NETDB_PUBLISH_INTERVAL_S: u64 = 40 * 60;
pub const NETDB_EXPLORE_INTERVAL_S: u64 = 30;
pub const NETDB_EXPLORE_INTERVAL_SLOW_S: u64 = 90;
pub const NETDB_EXPLORE_SLOW_THRESHOLD: usize = 2500;
pub const NETDB_MIN_ROUTERS_BEFORE_RESEED: usize = 25;

/// NetDb expiry thresholds (§4.5): total known router count bands and the
/// router-age threshold that applies within each band.
pub const NETDB_EXPIRY_GRACE_MIN: u64 = 10 * 60 * 1000;
pub const NETDB_EXPIRY_MIN_KNOWN: usize = 75;
pub const NETDB_EXPIRY_BAND_HIGH: usize = 300;
pub const NETDB_EXPIRY_BAND_MID: usize = 120;
pub const NETDB_EXPIRY_FLOODFILL_AGE_MS: u64 = 60 * 60 * 1000;
pub const NETDB_EXPIRY_HIGH_AGE_MS: u64 = 30 * 60 * 60 * 1000;
pub const NETDB_EXPIRY_MID_AGE_MS: u64 = 72 * 60 * 60 * 1000;
pub const NETDB_EXPIRY_INTRODUCER_AGE_MS: u64 = 60 * 60 * 1000;

/// Lookup state-machine deadlines (§4.5).
pub const LOOKUP_RETRY_MS: u64 = 5 * 1000;
pub const LOOKUP_FAIL_MS: u64 = 60 * 1000;
pub const LOOKUP_MAX_EXCLUDED: usize = 7;

/// Garlic leaseset-submission ack wait (§4.9).
pub const GARLIC_LEASESET_ACK_MS: u64 = 4 * 1000;

/// Number of session tags minted in one batch when a garlic session runs
/// low; a batch is replenished once remaining tags drop to 2/3 of this
/// (§4.9).
pub const GARLIC_NUM_TAGS: usize = 40;

/// Garlic AES block size for the fixed portion preceding the session-tag
/// count: the ElGamal-encrypted block carries `session_key[32] ‖
/// pre_iv[32] ‖ padding[158]`, which is exactly the 222-byte ElGamal
/// plaintext size (§4.9).
pub const GARLIC_ELGAMAL_BLOCK_LEN: usize = ELGAMAL_PLAINTEXT_LEN;

/// Transit tunnel build rejection status codes (§4.6, §6).
pub const BUILD_STATUS_ACCEPT: u8 = 0;
pub const BUILD_STATUS_PROBABILISTIC_REJECT: u8 = 10;
pub const BUILD_STATUS_OVERLOAD_REJECT: u8 = 20;
pub const BUILD_STATUS_BANDWIDTH_REJECT: u8 = 30;
pub const BUILD_STATUS_CRITICAL_REJECT: u8 = 50;

/// Default local resource limits.
pub const MAX_NUM_TRANSIT_TUNNELS: usize = 2500;

/// Capability-string alphabet (§6).
pub const CAP_FLOODFILL: char = 'f';
pub const CAP_HIGH_BANDWIDTH_O: char = 'O';
pub const CAP_HIGH_BANDWIDTH_P: char = 'P';
pub const CAP_HIGH_BANDWIDTH_X: char = 'X';
pub const CAP_LOW_BANDWIDTH_K: char = 'K';
pub const CAP_LOW_BANDWIDTH_L: char = 'L';
pub const CAP_LOW_BANDWIDTH_M: char = 'M';
pub const CAP_LOW_BANDWIDTH_N: char = 'N';
pub const CAP_HIDDEN: char = 'H';
pub const CAP_REACHABLE: char = 'R';
pub const CAP_UNREACHABLE: char = 'U';
pub const CAP_SSU_TESTING: char = 'B';
pub const CAP_SSU_INTRODUCER: char = 'C';

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_roundtrips() {
        let data = b"From anonimal, with love <3";
        let enc = I2P_BASE64.encode(data);
        assert!(!enc.contains('+'));
        assert!(!enc.contains('/'));
        let dec = I2P_BASE64.decode(enc.as_bytes()).unwrap();
        assert_eq!(dec, data);
    }
}
