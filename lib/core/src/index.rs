//! Similarity index over parcel feature vectors.
//!
//! [`ParcelIndex`] wraps the HNSW graph with the invariants the engine
//! depends on: one live entry per parcel, one normalization-scheme version
//! per index, one distance metric for both build and query, and a scoped
//! query path that post-filters instead of pushing predicates into the
//! similarity scan.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hnsw::HnswGraph;
use crate::metric::{Metric, INDEX_METRIC};
use crate::parcel::{Coordinates, Parcel, ParcelId, Scope};
use crate::scheme::{CURRENT_SCHEME_VERSION, FEATURE_DIM};
use crate::vector::FeatureVector;

/// Hard cap on `k` for any single index query, bounding tail latency.
pub const MAX_K: usize = 200;

/// One parcel's live entry in the index: the vector plus the attributes the
/// selector needs without a round trip back to the parcel store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: ParcelId,
    pub vector: FeatureVector,
    pub scope: Scope,
    pub appraised_value: f64,
    pub building_area: Option<f64>,
    pub year_built: Option<u16>,
    pub coordinates: Option<Coordinates>,
}

impl IndexRecord {
    /// Pair a parcel snapshot with its normalized vector.
    #[must_use]
    pub fn from_parcel(parcel: &Parcel, vector: FeatureVector) -> Self {
        Self {
            id: parcel.id.clone(),
            vector,
            scope: parcel.scope(),
            appraised_value: parcel.appraised_value,
            building_area: parcel.building_area,
            year_built: parcel.year_built,
            coordinates: parcel.coordinates,
        }
    }
}

/// A ranked index hit. Similarity is the documented monotonic transform of
/// distance, so sorting by similarity descending equals sorting by distance
/// ascending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparableCandidate {
    pub id: ParcelId,
    pub scope: Scope,
    pub appraised_value: f64,
    pub building_area: Option<f64>,
    pub year_built: Option<u16>,
    pub coordinates: Option<Coordinates>,
    pub distance: f32,
    pub similarity: f32,
}

impl ComparableCandidate {
    fn from_hit(record: &IndexRecord, distance: f32, metric: Metric) -> Self {
        Self {
            id: record.id.clone(),
            scope: record.scope.clone(),
            appraised_value: record.appraised_value,
            building_area: record.building_area,
            year_built: record.year_built,
            coordinates: record.coordinates,
            distance,
            similarity: metric.similarity(distance),
        }
    }
}

/// Index configuration. The metric defaults to [`INDEX_METRIC`] and the
/// query path asserts it still matches at every call.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub scheme_version: u32,
    pub vector_dim: usize,
    pub metric: Metric,
    pub max_connections: usize,
    pub max_layers: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            scheme_version: CURRENT_SCHEME_VERSION,
            vector_dim: FEATURE_DIM,
            metric: INDEX_METRIC,
            max_connections: 16,
            max_layers: 3,
        }
    }
}

/// Options for the scoped query path. One path, flag-driven; no parallel
/// query variants.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Initial top-K to request from the graph.
    pub k: usize,
    /// Result count the caller actually needs after post-filtering.
    pub min_results: usize,
    /// Apply the (district, neighborhood) post-filter.
    pub scope_filter: bool,
    /// Double K and retry (capped at [`MAX_K`]) while post-filtering drops
    /// the result below `min_results`.
    pub widen: bool,
    /// Excluded parcel, normally the subject itself: the index returns the
    /// subject as its own nearest neighbor otherwise.
    pub exclude: Option<ParcelId>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            k: 50,
            min_results: 10,
            scope_filter: true,
            widen: true,
            exclude: None,
        }
    }
}

/// Read-mostly similarity index shared across discovery requests.
///
/// Writers replace entries wholesale (remove + insert under the write lock);
/// a reader observes the old entry or the new one, never a torn mix.
pub struct ParcelIndex {
    config: IndexConfig,
    entries: RwLock<AHashMap<ParcelId, Arc<IndexRecord>>>,
    graph: RwLock<HnswGraph>,
    built: RwLock<bool>,
    rebuilding: AtomicBool,
}

impl ParcelIndex {
    #[must_use]
    pub fn new(config: IndexConfig) -> Self {
        let graph = HnswGraph::new(config.metric, config.max_connections, config.max_layers);
        Self {
            config,
            entries: RwLock::new(AHashMap::new()),
            graph: RwLock::new(graph),
            built: RwLock::new(false),
            rebuilding: AtomicBool::new(false),
        }
    }

    /// Build an index from a batch of entries.
    pub fn build(config: IndexConfig, records: Vec<IndexRecord>) -> Result<Self> {
        let index = Self::new(config);
        for record in records {
            index.upsert(record)?;
        }
        index.ensure_built();
        Ok(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    #[inline]
    pub fn scheme_version(&self) -> u32 {
        self.config.scheme_version
    }

    fn validate(&self, record: &IndexRecord) -> Result<()> {
        if record.vector.scheme_version() != self.config.scheme_version {
            return Err(Error::SchemeMismatch {
                expected: self.config.scheme_version,
                actual: record.vector.scheme_version(),
            });
        }
        if record.vector.dim() != self.config.vector_dim {
            return Err(Error::InvalidDimension {
                expected: self.config.vector_dim,
                actual: record.vector.dim(),
            });
        }
        Ok(())
    }

    /// Insert or replace a parcel's entry.
    pub fn upsert(&self, record: IndexRecord) -> Result<()> {
        self.validate(&record)?;
        let record = Arc::new(record);
        self.entries
            .write()
            .insert(record.id.clone(), record.clone());
        if *self.built.read() {
            self.graph.write().insert(record);
        }
        Ok(())
    }

    /// Drop a parcel's entry entirely.
    pub fn remove(&self, id: &ParcelId) -> bool {
        let existed = self.entries.write().remove(id).is_some();
        if existed {
            self.graph.write().remove(id);
        }
        existed
    }

    /// Build the graph from staged entries if it has not been built yet.
    pub fn ensure_built(&self) {
        let mut built = self.built.write();
        if *built {
            return;
        }
        let entries = self.entries.read();
        if entries.is_empty() {
            return;
        }
        let mut graph = self.graph.write();
        for record in entries.values() {
            graph.insert(record.clone());
        }
        *built = true;
    }

    /// Rebuild the graph from the given entries and swap it in atomically.
    ///
    /// Runs synchronously; the background worker calls this off the request
    /// path. Queries running concurrently see the old graph until the swap.
    pub fn rebuild(&self, records: Vec<IndexRecord>) -> Result<()> {
        let mut fresh =
            HnswGraph::new(self.config.metric, self.config.max_connections, self.config.max_layers);
        let mut fresh_entries = AHashMap::with_capacity(records.len());
        for record in records {
            if let Err(err) = self.validate(&record) {
                // A bad batch leaves the live graph untouched.
                self.rebuilding.store(false, Ordering::Release);
                return Err(err);
            }
            let record = Arc::new(record);
            fresh_entries.insert(record.id.clone(), record.clone());
            fresh.insert(record);
        }
        *self.entries.write() = fresh_entries;
        *self.graph.write() = fresh;
        *self.built.write() = true;
        self.rebuilding.store(false, Ordering::Release);
        Ok(())
    }

    /// Mark a rebuild in flight. Returns false if one is already running.
    pub(crate) fn begin_rebuild(&self) -> bool {
        self.rebuilding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_rebuilding(&self) -> bool {
        self.rebuilding.load(Ordering::Acquire)
    }

    /// Unconstrained top-K query, ordered by distance ascending.
    pub fn query(&self, vector: &FeatureVector, k: usize) -> Result<Vec<ComparableCandidate>> {
        if self.config.metric != INDEX_METRIC {
            return Err(Error::InvalidArgument(format!(
                "index metric {:?} disagrees with the query metric {INDEX_METRIC:?}",
                self.config.metric
            )));
        }
        if k == 0 || k > MAX_K {
            return Err(Error::InvalidArgument(format!(
                "k must be in 1..={MAX_K}, got {k}"
            )));
        }
        if vector.scheme_version() != self.config.scheme_version {
            return Err(Error::SchemeMismatch {
                expected: self.config.scheme_version,
                actual: vector.scheme_version(),
            });
        }
        if !*self.built.read() {
            return Err(Error::IndexUnavailable);
        }

        let graph = self.graph.read();
        debug_assert_eq!(graph.metric(), INDEX_METRIC);
        Ok(graph
            .search(vector.as_slice(), k)
            .into_iter()
            .map(|(record, dist)| ComparableCandidate::from_hit(&record, dist, self.config.metric))
            .collect())
    }

    /// Scoped query: unconstrained top-K first, then the scope filter as a
    /// post-filter, widening K while the filtered result is too small.
    ///
    /// Pushing the scope predicate into the similarity scan is what makes
    /// the underlying engine abandon the approximate index, so the filter
    /// never travels with the query.
    pub fn query_scoped(
        &self,
        vector: &FeatureVector,
        scope: &Scope,
        opts: &QueryOptions,
    ) -> Result<Vec<ComparableCandidate>> {
        let mut k = opts.k.min(MAX_K);
        loop {
            let mut candidates = self.query(vector, k)?;
            if let Some(exclude) = &opts.exclude {
                candidates.retain(|c| &c.id != exclude);
            }
            if opts.scope_filter {
                candidates.retain(|c| &c.scope == scope);
            }
            if candidates.len() >= opts.min_results || !opts.widen || k >= MAX_K {
                return Ok(candidates);
            }
            k = (k * 2).min(MAX_K);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parcel::Scope;

    fn record(account: &str, area_component: f32, neighborhood: &str) -> IndexRecord {
        IndexRecord {
            id: ParcelId::new(account),
            vector: FeatureVector::new(vec![area_component, 1.0, 0.5, 0.01], 1),
            scope: Scope {
                district: "HCAD".to_string(),
                neighborhood_code: neighborhood.to_string(),
            },
            appraised_value: 300_000.0,
            building_area: Some(2000.0),
            year_built: Some(2005),
            coordinates: None,
        }
    }

    fn build_index(n: usize) -> ParcelIndex {
        let records = (0..n)
            .map(|i| {
                let nbhd = if i % 2 == 0 { "8014" } else { "9901" };
                record(&format!("acct-{i}"), i as f32 * 0.05, nbhd)
            })
            .collect();
        ParcelIndex::build(IndexConfig::default(), records).unwrap()
    }

    #[test]
    fn test_query_sorted_by_similarity_descending() {
        let index = build_index(40);
        let query = FeatureVector::new(vec![0.5, 1.0, 0.5, 0.01], 1);
        let results = index.query(&query, 10).unwrap();
        assert_eq!(results.len(), 10);
        for pair in results.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
            assert!(pair[0].similarity >= pair[1].similarity);
        }
    }

    #[test]
    fn test_k_out_of_bounds_is_invalid_argument() {
        let index = build_index(5);
        let query = FeatureVector::new(vec![0.5, 1.0, 0.5, 0.01], 1);
        assert!(matches!(
            index.query(&query, MAX_K + 1),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(index.query(&query, 0), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_unbuilt_index_is_unavailable() {
        let index = ParcelIndex::new(IndexConfig::default());
        let query = FeatureVector::new(vec![0.5, 1.0, 0.5, 0.01], 1);
        assert!(matches!(index.query(&query, 5), Err(Error::IndexUnavailable)));
    }

    #[test]
    fn test_scheme_mismatch_rejected_at_insert() {
        let index = ParcelIndex::new(IndexConfig::default());
        let mut bad = record("acct-x", 0.5, "8014");
        bad.vector = FeatureVector::new(vec![0.5, 1.0, 0.5, 0.01], 2);
        assert!(matches!(
            index.upsert(bad),
            Err(Error::SchemeMismatch { expected: 1, actual: 2 })
        ));
    }

    #[test]
    fn test_scoped_query_widens_until_satisfied() {
        let index = build_index(60);
        let query = FeatureVector::new(vec![1.4, 1.0, 0.5, 0.01], 1);
        let scope = Scope {
            district: "HCAD".to_string(),
            neighborhood_code: "8014".to_string(),
        };
        // k=4 unconstrained hits will mostly be the wrong neighborhood; the
        // widening loop must still come back with ten in-scope comps.
        let opts = QueryOptions {
            k: 4,
            min_results: 10,
            scope_filter: true,
            widen: true,
            exclude: None,
        };
        let results = index.query_scoped(&query, &scope, &opts).unwrap();
        assert!(results.len() >= 10);
        assert!(results.iter().all(|c| c.scope == scope));
    }

    #[test]
    fn test_scoped_query_excludes_subject() {
        let index = build_index(20);
        let query = FeatureVector::new(vec![0.0, 1.0, 0.5, 0.01], 1);
        let scope = Scope {
            district: "HCAD".to_string(),
            neighborhood_code: "8014".to_string(),
        };
        let opts = QueryOptions {
            exclude: Some(ParcelId::new("acct-0")),
            ..QueryOptions::default()
        };
        let results = index.query_scoped(&query, &scope, &opts).unwrap();
        assert!(results.iter().all(|c| c.id.as_str() != "acct-0"));
    }

    #[test]
    fn test_upsert_after_build_replaces_live_entry() {
        let index = build_index(10);
        let mut replacement = record("acct-2", 3.9, "8014");
        replacement.appraised_value = 1.0;
        index.upsert(replacement).unwrap();
        assert_eq!(index.len(), 10);

        let query = FeatureVector::new(vec![3.9, 1.0, 0.5, 0.01], 1);
        let results = index.query(&query, 3).unwrap();
        assert_eq!(results[0].id.as_str(), "acct-2");
        assert_eq!(results[0].appraised_value, 1.0);
    }
}
