//! Staleness-aware cache manager with single-flight fetch collapsing.
//!
//! `get_or_fetch` is the one entry point for every slow external lookup.
//! Concurrent callers for the same (subject, capability) collapse into a
//! single in-flight fetch and all receive its result; the fetch itself runs
//! on a detached task, so a waiter that gives up (timeout, cancellation)
//! never cancels the fetch for the waiters still interested.

use std::future::Future;
use std::sync::Arc;
use std::time::SystemTime;

use ahash::AHashMap;
use equitx_core::{Error, ParcelId, Result};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use crate::entry::{Capability, CapabilityPayload};
use crate::store::CacheStore;
use crate::ttl::TtlPolicy;

type FlightKey = (ParcelId, Capability);
type FlightResult = std::result::Result<CapabilityPayload, Error>;

/// Per-call cache behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Skip the freshness check and always fetch.
    pub force_refresh: bool,
    /// When the fetch fails, serve an expired entry if one exists. The
    /// result is marked [`CacheStatus::Stale`]; stale data is never served
    /// silently.
    pub allow_stale: bool,
}

/// Where the returned payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Valid cached entry, no external call.
    Hit,
    /// Fetched (or joined an in-flight fetch) during this call.
    Refreshed,
    /// Expired entry served in degraded mode after a failed fetch.
    Stale,
}

/// TTL-keyed cache of external lookup results, shared across requests.
pub struct CacheManager {
    store: Arc<CacheStore>,
    ttls: TtlPolicy,
    flights: Arc<Mutex<AHashMap<FlightKey, broadcast::Sender<FlightResult>>>>,
}

impl CacheManager {
    #[must_use]
    pub fn new(ttls: TtlPolicy) -> Self {
        Self {
            store: Arc::new(CacheStore::new()),
            ttls,
            flights: Arc::new(Mutex::new(AHashMap::new())),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Bulk invalidation across all capabilities for the given subjects.
    pub fn reset_subjects(&self, subjects: &[ParcelId]) {
        self.store.reset_subjects(subjects);
    }

    /// Return the cached payload or run `fetch` exactly once to refresh it.
    ///
    /// A caller-supplied deadline belongs around the returned future
    /// (`tokio::time::timeout(d, manager.get_or_fetch(...))`); abandoning
    /// the wait leaves the fetch running for the other waiters and the
    /// result still lands in the store.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        subject: &ParcelId,
        capability: Capability,
        options: FetchOptions,
        fetch: F,
    ) -> Result<(CapabilityPayload, CacheStatus)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FlightResult> + Send + 'static,
    {
        let ttl = self.ttls.ttl(capability);

        if !options.force_refresh {
            if let Some(entry) = self.store.get(subject, capability) {
                if entry.is_valid(SystemTime::now(), ttl) {
                    debug!(%subject, %capability, "cache hit");
                    return Ok((entry.payload, CacheStatus::Hit));
                }
                debug!(%subject, %capability, "cache entry expired");
            }
        }

        let key: FlightKey = (subject.clone(), capability);
        let mut rx = {
            let mut flights = self.flights.lock();
            if let Some(tx) = flights.get(&key) {
                // Join the in-flight fetch. Subscribing under the same lock
                // that guards flight removal guarantees the result is still
                // ahead of us.
                tx.subscribe()
            } else {
                // A flight may have completed between the store probe above
                // and this lock; its result is already in the store.
                if !options.force_refresh {
                    if let Some(entry) = self.store.get(subject, capability) {
                        if entry.is_valid(SystemTime::now(), ttl) {
                            return Ok((entry.payload, CacheStatus::Refreshed));
                        }
                    }
                }

                let (tx, rx) = broadcast::channel(1);
                flights.insert(key.clone(), tx.clone());
                drop(flights);

                let store = self.store.clone();
                let flights = self.flights.clone();
                let flight_subject = subject.clone();
                let fut = fetch();
                tokio::spawn(async move {
                    let result = fut.await;
                    if let Ok(payload) = &result {
                        store.put(&flight_subject, payload.clone());
                    }
                    // Remove the flight before publishing: every waiter that
                    // found this sender has already subscribed, and callers
                    // arriving later will find the stored entry.
                    flights.lock().remove(&key);
                    let _ = tx.send(result);
                });
                rx
            }
        };

        match rx.recv().await {
            Ok(Ok(payload)) => Ok((payload, CacheStatus::Refreshed)),
            Ok(Err(err)) => self.degrade(subject, capability, options, err),
            Err(_) => {
                // The fetch task died without publishing.
                let err = Error::ProviderError {
                    provider: capability.to_string(),
                    message: "fetch aborted before completion".to_string(),
                };
                self.degrade(subject, capability, options, err)
            }
        }
    }

    /// Degraded mode: serve an expired entry only when the caller opted in.
    fn degrade(
        &self,
        subject: &ParcelId,
        capability: Capability,
        options: FetchOptions,
        err: Error,
    ) -> Result<(CapabilityPayload, CacheStatus)> {
        if options.allow_stale {
            if let Some(entry) = self.store.get(subject, capability) {
                debug!(%subject, %capability, "serving stale entry after failed fetch");
                return Ok((entry.payload, CacheStatus::Stale));
            }
        }
        Err(err)
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(TtlPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{FloodDetermination, MarketStats};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn flood(zone: &str) -> CapabilityPayload {
        CapabilityPayload::Flood(FloodDetermination {
            zone: zone.to_string(),
            subtype: None,
            high_risk: zone.starts_with('A') || zone.starts_with('V'),
            source: "FEMA NFHL".to_string(),
        })
    }

    fn market(value: f64) -> CapabilityPayload {
        CapabilityPayload::Market(MarketStats {
            estimated_value: value,
            range_low: value * 0.95,
            range_high: value * 1.05,
            source: "fixture".to_string(),
        })
    }

    #[tokio::test]
    async fn test_hit_skips_fetch() {
        let manager = CacheManager::default();
        let subject = ParcelId::new("acct-1");
        manager.store().put(&subject, flood("X"));

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_fetch = calls.clone();
        let (payload, status) = manager
            .get_or_fetch(&subject, Capability::Flood, FetchOptions::default(), move || {
                calls_in_fetch.fetch_add(1, Ordering::SeqCst);
                async { Ok(flood("AE")) }
            })
            .await
            .unwrap();

        assert_eq!(status, CacheStatus::Hit);
        assert_eq!(payload, flood("X"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_entry_triggers_refresh() {
        let manager = CacheManager::default();
        let subject = ParcelId::new("acct-1");
        let ttl = Duration::from_secs(365 * 24 * 3600);
        manager.store().put_at(
            &subject,
            flood("X"),
            SystemTime::now() - ttl - Duration::from_secs(1),
        );

        let (payload, status) = manager
            .get_or_fetch(&subject, Capability::Flood, FetchOptions::default(), || async {
                Ok(flood("AE"))
            })
            .await
            .unwrap();

        assert_eq!(status, CacheStatus::Refreshed);
        assert_eq!(payload, flood("AE"));
        // The refresh overwrote the stored entry.
        let entry = manager.store().get(&subject, Capability::Flood).unwrap();
        assert_eq!(entry.payload, flood("AE"));
    }

    #[tokio::test]
    async fn test_entry_just_inside_ttl_is_valid() {
        let manager = CacheManager::default();
        let subject = ParcelId::new("acct-1");
        let ttl = Duration::from_secs(365 * 24 * 3600);
        manager.store().put_at(
            &subject,
            flood("X"),
            SystemTime::now() - ttl + Duration::from_secs(1),
        );

        let (_, status) = manager
            .get_or_fetch(&subject, Capability::Flood, FetchOptions::default(), || async {
                panic!("fetch must not run for a valid entry")
            })
            .await
            .unwrap();
        assert_eq!(status, CacheStatus::Hit);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_valid_entry() {
        let manager = CacheManager::default();
        let subject = ParcelId::new("acct-1");
        manager.store().put(&subject, market(400_000.0));

        let options = FetchOptions { force_refresh: true, ..Default::default() };
        let (payload, status) = manager
            .get_or_fetch(&subject, Capability::Market, options, || async {
                Ok(market(425_000.0))
            })
            .await
            .unwrap();

        assert_eq!(status, CacheStatus::Refreshed);
        assert_eq!(payload, market(425_000.0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_collapse_to_one_fetch() {
        let manager = Arc::new(CacheManager::default());
        let subject = ParcelId::new("acct-1");
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            let subject = subject.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                manager
                    .get_or_fetch(&subject, Capability::Market, FetchOptions::default(), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(market(410_000.0))
                    })
                    .await
            }));
        }

        for handle in handles {
            let (payload, _) = handle.await.unwrap().unwrap();
            assert_eq!(payload, market(410_000.0));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1, "fetch must run exactly once");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_the_error() {
        let manager = Arc::new(CacheManager::default());
        let subject = ParcelId::new("acct-1");
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let manager = manager.clone();
            let subject = subject.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                manager
                    .get_or_fetch(&subject, Capability::Sales, FetchOptions::default(), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err(Error::ProviderError {
                            provider: "rentcast".to_string(),
                            message: "upstream 500".to_string(),
                        })
                    })
                    .await
            }));
        }

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, Error::ProviderError { .. }));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_allow_stale_serves_expired_entry_on_failure() {
        let manager = CacheManager::default();
        let subject = ParcelId::new("acct-1");
        let ttl = Duration::from_secs(365 * 24 * 3600);
        manager.store().put_at(
            &subject,
            flood("AE"),
            SystemTime::now() - ttl - Duration::from_secs(60),
        );

        let options = FetchOptions { allow_stale: true, ..Default::default() };
        let (payload, status) = manager
            .get_or_fetch(&subject, Capability::Flood, options, || async {
                Err(Error::ProviderTimeout { provider: "fema".to_string() })
            })
            .await
            .unwrap();

        assert_eq!(status, CacheStatus::Stale);
        assert_eq!(payload, flood("AE"));
    }

    #[tokio::test]
    async fn test_failure_without_stale_optin_propagates() {
        let manager = CacheManager::default();
        let subject = ParcelId::new("acct-1");

        let err = manager
            .get_or_fetch(&subject, Capability::Vision, FetchOptions::default(), || async {
                Err(Error::ProviderTimeout { provider: "streetview".to_string() })
            })
            .await
            .unwrap_err();
        assert_eq!(err, Error::ProviderTimeout { provider: "streetview".to_string() });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancelled_waiter_does_not_cancel_fetch() {
        let manager = Arc::new(CacheManager::default());
        let subject = ParcelId::new("acct-1");

        let impatient = {
            let manager = manager.clone();
            let subject = subject.clone();
            tokio::spawn(async move {
                tokio::time::timeout(
                    Duration::from_millis(10),
                    manager.get_or_fetch(&subject, Capability::Vision, FetchOptions::default(), || async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(CapabilityPayload::Vision(crate::entry::ConditionReport {
                            issues: Vec::new(),
                        }))
                    }),
                )
                .await
            })
        };

        // The impatient waiter times out...
        assert!(impatient.await.unwrap().is_err());

        // ...but the fetch it started still completes and lands in the store.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(manager.store().get(&subject, Capability::Vision).is_some());
    }
}
