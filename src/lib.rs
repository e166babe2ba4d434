//! # equitx
//!
//! Comparable-parcel discovery for valuation protests: given a subject
//! parcel, find the set of comparable parcels that best supports a
//! valuation-reduction argument, and shield every slow external lookup
//! behind a staleness-aware cache with provider failover.
//!
//! ## Pipeline
//!
//! Raw parcel record → normalized feature vector → ANN index query → equity
//! floor selection → cache-backed enrichment → comparable set plus a
//! capability manifest.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use equitx::prelude::*;
//!
//! # async fn example(parcels: Vec<Parcel>, subject: Parcel) -> equitx::Result<()> {
//! let scheme = FeatureScheme::v1();
//! let records: Vec<IndexRecord> = parcels
//!     .iter()
//!     .filter_map(|p| scheme.normalize(p).ok().map(|v| IndexRecord::from_parcel(p, v)))
//!     .collect();
//!
//! let index = Arc::new(ParcelIndex::build(IndexConfig::default(), records)?);
//! let engine = DiscoveryEngine::new(index, EngineConfig::default());
//!
//! let result = engine.discover(&subject).await?;
//! println!("floor value: {:?}", result.comparables.floor_value);
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Structure
//!
//! - [`equitx_core`] - normalization scheme, HNSW index, floor selector
//! - [`equitx_cache`] - capability payloads, TTL cache, single-flight manager
//! - [`equitx_providers`] - provider trait and failover chains
//! - [`equitx_engine`] - the discovery coordinator

// Re-export core types
pub use equitx_core::{
    ComparableCandidate, Coordinates, EquityComparable, EquityComparableSet, Error, FeatureScheme,
    FeatureVector, IndexConfig, IndexRecord, Metric, Parcel, ParcelId, ParcelIndex, QueryOptions,
    Result, Scope, SelectionRule, SelectionStatus, SelectorConfig, ValuationRecord,
    CURRENT_SCHEME_VERSION, FEATURE_DIM, INDEX_METRIC, MAX_K,
};

// Re-export cache
pub use equitx_cache::{
    CacheManager, CacheStatus, Capability, CapabilityPayload, FetchOptions, TtlPolicy,
};

// Re-export providers
pub use equitx_providers::{
    ChainResponse, FixtureProvider, Provider, ProviderAttempt, ProviderChain, ProviderConfig,
    ProviderRequest,
};

// Re-export engine
pub use equitx_engine::{
    CapabilityManifest, CapabilityOutcome, DiscoveryEngine, DiscoveryOptions, DiscoveryResult,
    EngineConfig, EnrichmentBundle,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CacheManager, CacheStatus, Capability, CapabilityManifest, CapabilityOutcome,
        CapabilityPayload, ComparableCandidate, DiscoveryEngine, DiscoveryOptions, DiscoveryResult,
        EngineConfig, EquityComparable, EquityComparableSet, Error, FeatureScheme, FeatureVector,
        FetchOptions, FixtureProvider, IndexConfig, IndexRecord, Parcel, ParcelId, ParcelIndex,
        Provider, ProviderChain, ProviderConfig, QueryOptions, Result, Scope, SelectionRule,
        SelectionStatus, TtlPolicy, INDEX_METRIC,
    };
}
