//! Engine configuration.
//!
//! Provider chains, per-provider timeouts and cache TTLs are configuration,
//! not code. The demo binary loads this from a JSON file; embedders build
//! it programmatically.

use std::path::Path;

use ahash::AHashMap;
use equitx_cache::{Capability, TtlPolicy};
use equitx_providers::ProviderConfig;
use serde::{Deserialize, Serialize};

/// Scoped-query tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Initial top-K requested from the index.
    pub k: usize,
    /// Comparables the selector actually needs post-filtering.
    pub min_results: usize,
    /// Apply the (district, neighborhood) post-filter.
    pub scope_filter: bool,
    /// Widen K automatically when the post-filter starves the result.
    pub widen: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            k: 50,
            min_results: 10,
            scope_filter: true,
            widen: true,
        }
    }
}

/// Floor-selection tuning, mirrored into the core selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    pub min_similarity: f32,
    pub floor_fraction: f64,
    pub min_count: usize,
    pub max_comps: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_year_gap: Option<u16>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.8,
            floor_fraction: 0.25,
            min_count: 3,
            max_comps: 10,
            max_year_gap: Some(20),
        }
    }
}

impl SelectionConfig {
    #[must_use]
    pub fn to_selector(&self) -> equitx_core::SelectorConfig {
        equitx_core::SelectorConfig {
            min_similarity: self.min_similarity,
            floor_fraction: self.floor_fraction,
            min_count: self.min_count,
            max_comps: self.max_comps,
            max_year_gap: self.max_year_gap,
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    /// Cache TTL per capability, in days. Missing capabilities keep the
    /// production defaults.
    #[serde(default)]
    pub ttl_days: AHashMap<Capability, u64>,
    /// Ordered provider chain per capability. A capability with no chain is
    /// skipped during enrichment.
    #[serde(default)]
    pub providers: AHashMap<Capability, Vec<ProviderConfig>>,
    /// Window, in days, within which a deed transfer counts as a recent
    /// sale.
    #[serde(default = "default_sale_recency_days")]
    pub sale_recency_days: i64,
}

fn default_sale_recency_days() -> i64 {
    730
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            query: QueryConfig::default(),
            selection: SelectionConfig::default(),
            ttl_days: AHashMap::new(),
            providers: AHashMap::new(),
            sale_recency_days: default_sale_recency_days(),
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    #[must_use]
    pub fn ttl_policy(&self) -> TtlPolicy {
        TtlPolicy::from_days(&self.ttl_days)
    }
}
