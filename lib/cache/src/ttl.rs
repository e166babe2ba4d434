use std::time::Duration;

use ahash::AHashMap;

use crate::entry::Capability;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Per-capability time-to-live. TTL is a property of the capability, not of
/// the cache: flood zones barely move, market trends go stale in weeks.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    ttls: AHashMap<Capability, Duration>,
}

impl TtlPolicy {
    #[must_use]
    pub fn new(ttls: AHashMap<Capability, Duration>) -> Self {
        Self { ttls }
    }

    /// Build a policy from a days-per-capability map, as configuration
    /// files express it. Capabilities absent from the map keep the default.
    #[must_use]
    pub fn from_days(days: &AHashMap<Capability, u64>) -> Self {
        let mut policy = Self::default();
        for (capability, d) in days {
            policy.ttls.insert(*capability, DAY * (*d as u32));
        }
        policy
    }

    #[must_use]
    pub fn ttl(&self, capability: Capability) -> Duration {
        self.ttls
            .get(&capability)
            .copied()
            .unwrap_or(DAY * 30)
    }
}

impl Default for TtlPolicy {
    /// Production defaults: sales 30 d, vision 90 d, market 30 d, flood 365 d.
    fn default() -> Self {
        let mut ttls = AHashMap::new();
        ttls.insert(Capability::Sales, DAY * 30);
        ttls.insert(Capability::Vision, DAY * 90);
        ttls.insert(Capability::Market, DAY * 30);
        ttls.insert(Capability::Flood, DAY * 365);
        Self { ttls }
    }
}
