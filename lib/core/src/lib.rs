//! # equitx Core
//!
//! Core library for the equitx comparable-discovery engine.
//!
//! This crate provides the numeric and indexing layer:
//!
//! - [`FeatureScheme`] - Versioned normalization of parcel attributes
//! - [`FeatureVector`] - Fixed-dimension scheme-tagged feature vector
//! - [`ParcelIndex`] - HNSW approximate nearest neighbor index
//! - [`select_floor`] / [`select_nearest`] - Equity comparable selection
//!
//! ## Example
//!
//! ```rust
//! use equitx_core::{
//!     FeatureScheme, IndexConfig, IndexRecord, Parcel, ParcelId, ParcelIndex, QueryOptions,
//! };
//!
//! let scheme = FeatureScheme::v1();
//! let subject = Parcel {
//!     id: ParcelId::new("0660640130020"),
//!     district: "HCAD".to_string(),
//!     address: "825 TOWN AND COUNTRY LN".to_string(),
//!     neighborhood_code: "8014".to_string(),
//!     building_area: Some(3748.0),
//!     year_built: Some(2018),
//!     building_grade: Some("B+".to_string()),
//!     land_area: Some(5663.0),
//!     appraised_value: 850_000.0,
//!     market_value: 850_000.0,
//!     valuation_history: Vec::new(),
//!     coordinates: None,
//! };
//!
//! let vector = scheme.normalize(&subject).unwrap();
//! let index = ParcelIndex::build(
//!     IndexConfig::default(),
//!     vec![IndexRecord::from_parcel(&subject, vector.clone())],
//! )
//! .unwrap();
//!
//! let opts = QueryOptions { exclude: Some(subject.id.clone()), ..Default::default() };
//! let candidates = index.query_scoped(&vector, &subject.scope(), &opts).unwrap();
//! ```

pub mod background;
pub mod error;
mod hnsw;
pub mod index;
pub mod metric;
pub mod parcel;
pub mod scheme;
pub mod selector;
pub mod vector;

pub use background::{schedule_rebuild, BackgroundJob, BackgroundJobSystem, IndexRebuildJob};
pub use error::{Error, Result};
pub use index::{ComparableCandidate, IndexConfig, IndexRecord, ParcelIndex, QueryOptions, MAX_K};
pub use metric::{Metric, INDEX_METRIC};
pub use parcel::{Coordinates, Parcel, ParcelId, Scope, ValuationRecord};
pub use scheme::{grade_score, FeatureScheme, CURRENT_SCHEME_VERSION, FEATURE_DIM};
pub use selector::{
    select_floor, select_nearest, EquityComparable, EquityComparableSet, SelectionRule,
    SelectionStatus, SelectorConfig,
};
pub use vector::FeatureVector;
