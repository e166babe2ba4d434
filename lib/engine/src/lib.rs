//! # equitx Engine
//!
//! The discovery coordinator: one request flows raw parcel → normalized
//! vector → index query → equity floor selection → cache-backed capability
//! enrichment, and comes back as a [`DiscoveryResult`] whose manifest says
//! exactly which capabilities succeeded, were cached, or degraded.
//!
//! - [`DiscoveryEngine`] - composes the core index, cache and provider chains
//! - [`EngineConfig`] - query/selection tuning, TTLs, provider chains
//! - [`facts`] - read-only deed history and watch registry

pub mod config;
pub mod discovery;
pub mod facts;

pub use config::{EngineConfig, QueryConfig, SelectionConfig};
pub use discovery::{
    AssessmentDelta, CapabilityManifest, CapabilityOutcome, DiscoveryEngine, DiscoveryOptions,
    DiscoveryResult, EnrichmentBundle,
};
pub use facts::{
    recently_sold, DeedHistory, DeedRecord, InMemoryDeeds, InMemoryWatches, WatchRecord,
    WatchRegistry,
};
