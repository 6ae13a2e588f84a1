use crate::chaos::RandomStall;
use std::time::Duration;

/// Fixed construction parameters of an election. There is no command line or environment
/// surface; callers build one of these (usually from `Default`) and hand it to the supervisor.
#[derive(Clone, Debug, PartialEq)]
pub struct ElectionConfig {
    /// namespace shared by all competing actors; store keys are derived from it
    pub shard: String,
    /// number of actors the supervisor starts
    pub actors: usize,
    /// lifetime of the lease granted by a renewal
    pub lease_ttl: Duration,
    /// chance that a leader stalls before renewing
    pub stall_probability: f64,
    /// a stall lasts this many lease lifetimes
    pub stall_multiplier: u32,
    /// base URL of the coordination store
    pub endpoint: String,
    /// replayable randomness when set
    pub seed: Option<u64>,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            shard: "shard-5".to_owned(),
            actors: 30,
            lease_ttl: Duration::from_secs(1),
            stall_probability: RandomStall::DEFAULT_PROBABILITY,
            stall_multiplier: 10,
            endpoint: "http://127.0.0.1:4001".to_owned(),
            seed: None,
        }
    }
}

impl ElectionConfig {
    pub fn leader_key(&self) -> String {
        leader_key(&self.shard)
    }

    pub fn broadcast_key(&self) -> String {
        broadcast_key(&self.shard)
    }

    pub fn stall(&self) -> Duration {
        self.lease_ttl * self.stall_multiplier
    }
}

/// The key whose value names the current leaseholder.
pub fn leader_key(shard: &str) -> String {
    format!("{}-leader", shard)
}

/// Best-effort notification of a leadership change.
pub fn broadcast_key(shard: &str) -> String {
    format!("{}-broadcast", shard)
}
