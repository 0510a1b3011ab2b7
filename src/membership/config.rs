//! Protocol configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{MembershipError, Result};

/// Timers and limits of the membership protocol, measured in ticks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Table size at which admission switches to sampled replies and
    /// gossip/JoinAck stop adding entries
    pub group_max: usize,

    /// Ticks without an update before an entry is suspected
    pub timeout: i64,

    /// Ticks between suspicion and removal
    pub t_cleanup: i64,

    /// Flood depth of JoinAck and Fail messages
    pub ttl: i64,

    /// Grace period after admission before failure checks run
    pub t_fail: i64,

    /// Gossip entries older than this many ticks are discarded on receipt
    pub gossip_staleness: i64,

    /// Bit shift applied to every body word on the wire; 0 gives a plain codec
    pub noise_shift: u32,

    /// Only flood a Fail notice the first time the failed endpoint is observed
    pub suppress_duplicate_floods: bool,

    /// Seed for the JoinReply sampling RNG (entropy when unset)
    pub sample_seed: Option<u64>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            group_max: 5,
            timeout: 5,
            t_cleanup: 5,
            ttl: 2,
            t_fail: 5,
            gossip_staleness: 2,
            noise_shift: 16,
            suppress_duplicate_floods: false,
            sample_seed: None,
        }
    }
}

impl ProtocolConfig {
    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.sample_seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.group_max < 2 {
            return Err(MembershipError::InvalidConfig(format!(
                "group_max must be at least 2, got {}",
                self.group_max
            )));
        }
        if self.noise_shift > 32 {
            return Err(MembershipError::InvalidConfig(format!(
                "noise_shift must be at most 32, got {}",
                self.noise_shift
            )));
        }
        for (name, value) in [
            ("timeout", self.timeout),
            ("t_cleanup", self.t_cleanup),
            ("ttl", self.ttl),
            ("t_fail", self.t_fail),
            ("gossip_staleness", self.gossip_staleness),
        ] {
            if value < 0 {
                return Err(MembershipError::InvalidConfig(format!(
                    "{} must not be negative, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}
