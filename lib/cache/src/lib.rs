//! # equitx Cache
//!
//! Staleness-aware cache for the slow external lookups the discovery engine
//! depends on: sales comparables, imagery condition analysis, market stats,
//! flood determinations.
//!
//! - [`Capability`] / [`CapabilityPayload`] - closed set of capability-tagged
//!   payload shapes
//! - [`TtlPolicy`] - per-capability time-to-live
//! - [`CacheStore`] - per-parcel blob + fetched-at storage
//! - [`CacheManager`] - TTL checks plus single-flight fetch collapsing
//!
//! ## Example
//!
//! ```rust,no_run
//! use equitx_cache::{CacheManager, Capability, CapabilityPayload, FetchOptions, FloodDetermination};
//! use equitx_core::ParcelId;
//!
//! # async fn example() -> equitx_core::Result<()> {
//! let manager = CacheManager::default();
//! let subject = ParcelId::new("0660640130020");
//!
//! let (payload, status) = manager
//!     .get_or_fetch(&subject, Capability::Flood, FetchOptions::default(), || async {
//!         // Slow provider call goes here.
//!         Ok(CapabilityPayload::Flood(FloodDetermination {
//!             zone: "X".to_string(),
//!             subtype: None,
//!             high_risk: false,
//!             source: "FEMA NFHL".to_string(),
//!         }))
//!     })
//!     .await?;
//! # let _ = (payload, status);
//! # Ok(())
//! # }
//! ```

pub mod entry;
pub mod manager;
pub mod store;
pub mod ttl;

pub use entry::{
    CacheEntry, Capability, CapabilityPayload, ConditionIssue, ConditionReport,
    FloodDetermination, MarketStats, SaleComp, SalesComps,
};
pub use manager::{CacheManager, CacheStatus, FetchOptions};
pub use store::CacheStore;
pub use ttl::TtlPolicy;
