//! Comparable discovery coordinator.
//!
//! One request runs normalize → index query → floor selection → enrichment,
//! strictly in that order; the four capability enrichments inside the last
//! step run concurrently. Per-capability failures degrade that capability's
//! contribution and are recorded in the manifest; only normalization and
//! index errors abort the request, and neither corrupts shared state.

use std::sync::Arc;

use ahash::AHashMap;
use equitx_cache::{
    CacheManager, CacheStatus, Capability, CapabilityPayload, ConditionReport,
    FetchOptions, FloodDetermination, MarketStats, SalesComps,
};
use equitx_core::{
    select_floor, select_nearest, EquityComparableSet, FeatureScheme, Parcel, ParcelId,
    ParcelIndex, QueryOptions, Result, SelectionRule,
};
use equitx_providers::{ProviderChain, ProviderRequest};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::facts::{recently_sold, DeedHistory, WatchRegistry};

/// How one capability fared during enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityOutcome {
    /// Fetched from a provider during this request.
    Fresh,
    /// Served from a valid cache entry.
    Cached,
    /// Expired cache entry served after a failed fetch (degraded mode).
    Stale,
    /// No usable data; the reason travels with it.
    Failed(String),
    /// No provider chain configured for the capability.
    Skipped,
}

/// Per-capability record of what the result actually contains, so the
/// report assembler can render partial evidence honestly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityManifest {
    entries: AHashMap<Capability, CapabilityOutcome>,
}

impl CapabilityManifest {
    pub fn record(&mut self, capability: Capability, outcome: CapabilityOutcome) {
        self.entries.insert(capability, outcome);
    }

    #[must_use]
    pub fn outcome(&self, capability: Capability) -> Option<&CapabilityOutcome> {
        self.entries.get(&capability)
    }

    /// True when the capability produced data, cached or fresh or stale.
    #[must_use]
    pub fn available(&self, capability: Capability) -> bool {
        matches!(
            self.entries.get(&capability),
            Some(CapabilityOutcome::Fresh | CapabilityOutcome::Cached | CapabilityOutcome::Stale)
        )
    }
}

/// The capability payloads gathered for a subject.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentBundle {
    pub sales: Option<SalesComps>,
    pub vision: Option<ConditionReport>,
    pub market: Option<MarketStats>,
    pub flood: Option<FloodDetermination>,
}

impl EnrichmentBundle {
    fn absorb(&mut self, payload: CapabilityPayload) {
        match payload {
            CapabilityPayload::Sales(p) => self.sales = Some(p),
            CapabilityPayload::Vision(p) => self.vision = Some(p),
            CapabilityPayload::Market(p) => self.market = Some(p),
            CapabilityPayload::Flood(p) => self.flood = Some(p),
        }
    }
}

/// Assessment movement read from the watch registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentDelta {
    pub baseline_appraised: f64,
    pub baseline_year: u16,
    pub latest_appraised: f64,
    pub latest_year: u16,
    pub change_pct: Option<f64>,
    pub alert_threshold_pct: f64,
}

/// Everything one discovery request produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub subject: ParcelId,
    pub comparables: EquityComparableSet,
    pub enrichment: EnrichmentBundle,
    pub manifest: CapabilityManifest,
    pub assessment: Option<AssessmentDelta>,
}

/// Per-request knobs.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub rule: SelectionRule,
    /// Override the configured similarity bar, e.g. when retrying after an
    /// `Insufficient` result.
    pub min_similarity: Option<f32>,
    pub force_refresh: bool,
    pub allow_stale: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            rule: SelectionRule::Floor,
            min_similarity: None,
            force_refresh: false,
            allow_stale: false,
        }
    }
}

/// Composes the index, selector, cache and provider chains into one
/// discovery entry point. Shared across concurrent requests.
pub struct DiscoveryEngine {
    index: Arc<ParcelIndex>,
    cache: Arc<CacheManager>,
    chains: AHashMap<Capability, Arc<ProviderChain>>,
    deeds: Option<Arc<dyn DeedHistory>>,
    watches: Option<Arc<dyn WatchRegistry>>,
    scheme: FeatureScheme,
    config: EngineConfig,
}

impl DiscoveryEngine {
    #[must_use]
    pub fn new(index: Arc<ParcelIndex>, config: EngineConfig) -> Self {
        let cache = Arc::new(CacheManager::new(config.ttl_policy()));
        Self {
            index,
            cache,
            chains: AHashMap::new(),
            deeds: None,
            watches: None,
            scheme: FeatureScheme::v1(),
            config,
        }
    }

    #[must_use]
    pub fn with_chain(mut self, chain: ProviderChain) -> Self {
        self.chains.insert(chain.capability(), Arc::new(chain));
        self
    }

    #[must_use]
    pub fn with_deeds(mut self, deeds: Arc<dyn DeedHistory>) -> Self {
        self.deeds = Some(deeds);
        self
    }

    #[must_use]
    pub fn with_watches(mut self, watches: Arc<dyn WatchRegistry>) -> Self {
        self.watches = Some(watches);
        self
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    #[must_use]
    pub fn index(&self) -> &Arc<ParcelIndex> {
        &self.index
    }

    /// Run one discovery with default options.
    pub async fn discover(&self, subject: &Parcel) -> Result<DiscoveryResult> {
        self.discover_with(subject, DiscoveryOptions::default()).await
    }

    /// Run one discovery request.
    pub async fn discover_with(
        &self,
        subject: &Parcel,
        options: DiscoveryOptions,
    ) -> Result<DiscoveryResult> {
        // 1. Normalize. A parcel that cannot be normalized cannot be
        //    compared; this is the one caller-facing hard failure besides an
        //    unavailable index.
        let vector = self.scheme.normalize(subject)?;

        // 2. Unconstrained top-K, then scope post-filter with widening.
        let query_opts = QueryOptions {
            k: self.config.query.k,
            min_results: self.config.query.min_results,
            scope_filter: self.config.query.scope_filter,
            widen: self.config.query.widen,
            exclude: Some(subject.id.clone()),
        };
        let candidates = self
            .index
            .query_scoped(&vector, &subject.scope(), &query_opts)?;
        info!(
            subject = %subject.id,
            candidates = candidates.len(),
            "index query complete"
        );

        // 3. Select the comparable set.
        let mut selector_config = self.config.selection.to_selector();
        if let Some(min_similarity) = options.min_similarity {
            selector_config.min_similarity = min_similarity;
        }
        let mut comparables = match options.rule {
            SelectionRule::Floor => select_floor(subject, &candidates, &selector_config),
            SelectionRule::Nearest => select_nearest(subject, &candidates, &selector_config),
        };
        if !comparables.is_sufficient() {
            warn!(
                subject = %subject.id,
                found = comparables.comparables.len(),
                "comparable set is insufficient; caller may relax min_similarity"
            );
        }

        // 4. Sale-recency marks from the deed history.
        if let Some(deeds) = &self.deeds {
            for comp in &mut comparables.comparables {
                if let Some(sale_date) = deeds.last_sale_date(&comp.candidate.id) {
                    comp.recently_sold =
                        recently_sold(&sale_date, self.config.sale_recency_days);
                }
            }
        }

        // 5. Capability enrichment, concurrently across capabilities.
        let fetch_options = FetchOptions {
            force_refresh: options.force_refresh,
            allow_stale: options.allow_stale,
        };
        let (sales, vision, market, flood) = tokio::join!(
            self.enrich(subject, Capability::Sales, fetch_options),
            self.enrich(subject, Capability::Vision, fetch_options),
            self.enrich(subject, Capability::Market, fetch_options),
            self.enrich(subject, Capability::Flood, fetch_options),
        );

        let mut manifest = CapabilityManifest::default();
        let mut enrichment = EnrichmentBundle::default();
        for (capability, (payload, outcome)) in Capability::ALL
            .into_iter()
            .zip([sales, vision, market, flood])
        {
            if let Some(payload) = payload {
                enrichment.absorb(payload);
            }
            manifest.record(capability, outcome);
        }

        // 6. Assessment movement, read-only from the watch registry.
        let assessment = self
            .watches
            .as_ref()
            .and_then(|w| w.watch_for(&subject.id, &subject.district))
            .map(|record| AssessmentDelta {
                change_pct: record.change_pct(),
                baseline_appraised: record.baseline_appraised,
                baseline_year: record.baseline_year,
                latest_appraised: record.latest_appraised,
                latest_year: record.latest_year,
                alert_threshold_pct: record.alert_threshold_pct,
            });

        Ok(DiscoveryResult {
            subject: subject.id.clone(),
            comparables,
            enrichment,
            manifest,
            assessment,
        })
    }

    /// Fetch one capability through the cache and its provider chain.
    async fn enrich(
        &self,
        subject: &Parcel,
        capability: Capability,
        options: FetchOptions,
    ) -> (Option<CapabilityPayload>, CapabilityOutcome) {
        let Some(chain) = self.chains.get(&capability) else {
            return (None, CapabilityOutcome::Skipped);
        };

        let chain = chain.clone();
        let request = ProviderRequest {
            subject: subject.id.clone(),
            capability,
            address: subject.address.clone(),
            district: subject.district.clone(),
            coordinates: subject.coordinates,
        };

        let fetched = self
            .cache
            .get_or_fetch(&subject.id, capability, options, move || async move {
                chain.invoke(&request).await.map(|response| response.payload)
            })
            .await;

        match fetched {
            Ok((payload, CacheStatus::Hit)) => (Some(payload), CapabilityOutcome::Cached),
            Ok((payload, CacheStatus::Refreshed)) => (Some(payload), CapabilityOutcome::Fresh),
            Ok((payload, CacheStatus::Stale)) => (Some(payload), CapabilityOutcome::Stale),
            Err(err) => {
                warn!(subject = %subject.id, %capability, %err, "capability degraded");
                (None, CapabilityOutcome::Failed(err.to_string()))
            }
        }
    }
}
