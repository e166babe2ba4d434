//! Capability tags and their payload shapes.
//!
//! Each slow external lookup is one capability with a declared payload
//! shape. The closed enum replaces open-ended JSON blobs: the cache keeps
//! its blob-plus-timestamp semantics while consumers get static checking.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// External lookup capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Sales,
    Vision,
    Market,
    Flood,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Sales,
        Capability::Vision,
        Capability::Market,
        Capability::Flood,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Sales => "sales",
            Capability::Vision => "vision",
            Capability::Market => "market",
            Capability::Flood => "flood",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded sale of a nearby property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleComp {
    pub address: String,
    pub sale_price: f64,
    pub sale_date: Option<String>,
    pub sqft: Option<f64>,
    pub price_per_sqft: Option<f64>,
    pub year_built: Option<u16>,
    pub source: String,
    pub distance_miles: Option<f64>,
}

/// Sales comparables from a sales-data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesComps {
    pub comps: Vec<SaleComp>,
}

/// A condition defect detected from imagery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionIssue {
    pub label: String,
    pub deduction: f64,
    pub confidence: f32,
}

/// Imagery-derived condition report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionReport {
    pub issues: Vec<ConditionIssue>,
}

impl ConditionReport {
    #[must_use]
    pub fn total_deduction(&self) -> f64 {
        self.issues.iter().map(|i| i.deduction).sum()
    }
}

/// Market value estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStats {
    pub estimated_value: f64,
    pub range_low: f64,
    pub range_high: f64,
    pub source: String,
}

/// Flood zone determination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloodDetermination {
    pub zone: String,
    pub subtype: Option<String>,
    pub high_risk: bool,
    pub source: String,
}

/// Capability-tagged payload blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "capability", rename_all = "lowercase")]
pub enum CapabilityPayload {
    Sales(SalesComps),
    Vision(ConditionReport),
    Market(MarketStats),
    Flood(FloodDetermination),
}

impl CapabilityPayload {
    #[must_use]
    pub fn capability(&self) -> Capability {
        match self {
            CapabilityPayload::Sales(_) => Capability::Sales,
            CapabilityPayload::Vision(_) => Capability::Vision,
            CapabilityPayload::Market(_) => Capability::Market,
            CapabilityPayload::Flood(_) => Capability::Flood,
        }
    }

    /// Semantic-failure check: a provider that answers with nothing usable
    /// has failed even though the transport succeeded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            CapabilityPayload::Sales(s) => s.comps.is_empty(),
            CapabilityPayload::Vision(_) => false,
            CapabilityPayload::Market(m) => m.estimated_value <= 0.0,
            CapabilityPayload::Flood(f) => f.zone.is_empty(),
        }
    }
}

/// A cached payload with its fetch timestamp.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: CapabilityPayload,
    pub fetched_at: SystemTime,
}

impl CacheEntry {
    #[must_use]
    pub fn new(payload: CapabilityPayload) -> Self {
        Self {
            payload,
            fetched_at: SystemTime::now(),
        }
    }

    /// Valid iff `now - fetched_at < ttl`. A clock that moved backwards
    /// leaves the entry valid rather than spuriously expiring it.
    #[must_use]
    pub fn is_valid(&self, now: SystemTime, ttl: Duration) -> bool {
        match now.duration_since(self.fetched_at) {
            Ok(age) => age < ttl,
            Err(_) => true,
        }
    }
}
