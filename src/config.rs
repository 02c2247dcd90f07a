//! Router configuration the core observes (§6). CLI parsing, path
//! resolution and tunnel-config-file parsing are external concerns; this
//! struct is the boundary the core reads from.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum BandwidthClass {
    /// 'K': < 12 KBps
    Low,
    /// 'L': 12-48 KBps
    LowMedium,
    /// 'M': 48-64 KBps
    Medium,
    /// 'N': 64-128 KBps
    MediumHigh,
    /// 'O': 128-256 KBps, tier 3 "high bandwidth"
    High,
    /// 'P': 256-2000 KBps
    VeryHigh,
    /// 'X': unlimited
    Unlimited,
}

impl BandwidthClass {
    pub fn cap_char(self) -> char {
        match self {
            BandwidthClass::Low => constants::CAP_LOW_BANDWIDTH_K,
            BandwidthClass::LowMedium => constants::CAP_LOW_BANDWIDTH_L,
            BandwidthClass::Medium => constants::CAP_LOW_BANDWIDTH_M,
            BandwidthClass::MediumHigh => constants::CAP_LOW_BANDWIDTH_N,
            BandwidthClass::High => constants::CAP_HIGH_BANDWIDTH_O,
            BandwidthClass::VeryHigh => constants::CAP_HIGH_BANDWIDTH_P,
            BandwidthClass::Unlimited => constants::CAP_HIGH_BANDWIDTH_X,
        }
    }

    /// Whether this class counts as "high-bandwidth" for peer selection
    /// (§4.8 step 3: prefer high-bandwidth routers for hop selection).
    pub fn is_high_bandwidth(self) -> bool {
        matches!(
            self,
            BandwidthClass::High | BandwidthClass::VeryHigh | BandwidthClass::Unlimited
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Advertise the floodfill (`f`) capability and run the publish
    /// schedule (§4.5).
    pub floodfill: bool,
    pub bandwidth: BandwidthClass,
    /// Advertise and accept IPv6 addresses.
    pub v6: bool,
    /// Where to fetch an initial RouterInfo set from when the netDb is
    /// nearly empty. The fetch itself (an SU3 file) is out of scope; this
    /// is handed to a `Reseeder` implementation.
    pub reseed_from: Option<String>,
    pub reseed_skip_ssl_check: bool,
    /// Whether this router accepts participation in transit tunnels.
    pub accepts_tunnels: bool,
    /// Root data directory: `router.info`, `router.keys`, and `netDb/`
    /// live under here.
    pub data_dir: PathBuf,
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            floodfill: false,
            bandwidth: BandwidthClass::High,
            v6: false,
            reseed_from: None,
            reseed_skip_ssl_check: false,
            accepts_tunnels: true,
            data_dir: PathBuf::from("."),
        }
    }
}

impl RouterConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Derive the RouterInfo capability string (§6) from the current
    /// configuration plus reachability, which is supplied by the caller
    /// (router context tracks `RouterStatus` at runtime).
    pub fn caps(&self, reachable: bool) -> String {
        let mut caps = String::new();
        if self.floodfill {
            caps.push(constants::CAP_FLOODFILL);
        }
        caps.push(self.bandwidth.cap_char());
        caps.push(if reachable {
            constants::CAP_REACHABLE
        } else {
            constants::CAP_UNREACHABLE
        });
        caps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_reflect_floodfill_and_bandwidth() {
        let mut cfg = RouterConfig::default();
        cfg.floodfill = true;
        cfg.bandwidth = BandwidthClass::Unlimited;
        let caps = cfg.caps(true);
        assert!(caps.contains('f'));
        assert!(caps.contains('X'));
        assert!(caps.contains('R'));
    }

    #[test]
    fn parses_from_toml() {
        let toml = r#"
            floodfill = true
            bandwidth = "High"
            v6 = false
            reseed_skip_ssl_check = false
            accepts_tunnels = true
            data_dir = "/tmp/kovri"
        "#;
        let cfg = RouterConfig::from_toml_str(toml).unwrap();
        assert!(cfg.floodfill);
        assert_eq!(cfg.bandwidth, BandwidthClass::High);
    }
}
