//! Ordered provider failover.
//!
//! Providers for a capability are tried strictly in configured priority
//! order. A provider fails on timeout, transport error, or a semantically
//! empty response; the chain then advances and never revisits it within the
//! same logical request. Attempts are recorded for observability only and
//! die with the request.

use std::sync::Arc;

use equitx_cache::{Capability, CapabilityPayload};
use equitx_core::{Error, Result};
use tracing::{info, warn};

use crate::provider::{Provider, ProviderConfig, ProviderRequest};

/// Outcome of one provider attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Timeout,
    Error(String),
    /// Transport succeeded but the response carried nothing usable.
    EmptyResult,
}

/// One attempt in the failover sequence. Ephemeral: logged, returned to the
/// caller for the manifest, never persisted.
#[derive(Debug, Clone)]
pub struct ProviderAttempt {
    pub provider: String,
    pub outcome: AttemptOutcome,
}

/// Successful chain invocation.
#[derive(Debug, Clone)]
pub struct ChainResponse {
    pub payload: CapabilityPayload,
    pub provider_used: String,
    pub attempts: Vec<ProviderAttempt>,
}

/// An ordered list of interchangeable providers for one capability.
pub struct ProviderChain {
    capability: Capability,
    providers: Vec<(ProviderConfig, Arc<dyn Provider>)>,
}

impl ProviderChain {
    #[must_use]
    pub fn new(capability: Capability, providers: Vec<(ProviderConfig, Arc<dyn Provider>)>) -> Self {
        Self {
            capability,
            providers,
        }
    }

    #[inline]
    #[must_use]
    pub fn capability(&self) -> Capability {
        self.capability
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Try each provider in priority order and return the first success.
    ///
    /// Exhausting the chain yields [`Error::AllProvidersExhausted`]; the
    /// caller treats the capability as unavailable for this request rather
    /// than aborting discovery.
    pub async fn invoke(&self, request: &ProviderRequest) -> Result<ChainResponse> {
        let mut attempts: Vec<ProviderAttempt> = Vec::with_capacity(self.providers.len());

        for (config, provider) in &self.providers {
            let outcome = match tokio::time::timeout(config.timeout(), provider.invoke(request)).await
            {
                Err(_elapsed) => AttemptOutcome::Timeout,
                Ok(Err(err)) => AttemptOutcome::Error(err.to_string()),
                Ok(Ok(payload)) if payload.is_empty() => AttemptOutcome::EmptyResult,
                Ok(Ok(payload)) => {
                    attempts.push(ProviderAttempt {
                        provider: config.id.clone(),
                        outcome: AttemptOutcome::Success,
                    });
                    info!(
                        capability = %self.capability,
                        provider = %config.id,
                        attempts = attempts.len(),
                        "provider chain succeeded"
                    );
                    return Ok(ChainResponse {
                        payload,
                        provider_used: config.id.clone(),
                        attempts,
                    });
                }
            };

            warn!(
                capability = %self.capability,
                provider = %config.id,
                ?outcome,
                "provider attempt failed, advancing"
            );
            attempts.push(ProviderAttempt {
                provider: config.id.clone(),
                outcome,
            });
        }

        warn!(
            capability = %self.capability,
            attempts = attempts.len(),
            "all providers exhausted"
        );
        Err(Error::AllProvidersExhausted {
            capability: self.capability.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use equitx_cache::{MarketStats, SalesComps};
    use equitx_core::ParcelId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct StaticProvider {
        id: String,
        result: std::result::Result<CapabilityPayload, Error>,
        calls: AtomicUsize,
    }

    impl StaticProvider {
        fn ok(id: &str, payload: CapabilityPayload) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                result: Ok(payload),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                result: Err(Error::ProviderError {
                    provider: id.to_string(),
                    message: "upstream 500".to_string(),
                }),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Provider for StaticProvider {
        fn id(&self) -> &str {
            &self.id
        }

        async fn invoke(&self, _request: &ProviderRequest) -> Result<CapabilityPayload> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl Provider for SlowProvider {
        fn id(&self) -> &str {
            "slow"
        }

        async fn invoke(&self, _request: &ProviderRequest) -> Result<CapabilityPayload> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!("the chain times this attempt out first")
        }
    }

    fn market(value: f64) -> CapabilityPayload {
        CapabilityPayload::Market(MarketStats {
            estimated_value: value,
            range_low: value,
            range_high: value,
            source: "test".to_string(),
        })
    }

    fn request(capability: Capability) -> ProviderRequest {
        ProviderRequest {
            subject: ParcelId::new("acct-1"),
            capability,
            address: "825 TOWN AND COUNTRY LN".to_string(),
            district: "HCAD".to_string(),
            coordinates: None,
        }
    }

    #[tokio::test]
    async fn test_fallback_to_second_provider() {
        let a = StaticProvider::failing("a");
        let b = StaticProvider::ok("b", market(400_000.0));
        let chain = ProviderChain::new(
            Capability::Market,
            vec![
                (ProviderConfig::new("a", 5), a.clone() as Arc<dyn Provider>),
                (ProviderConfig::new("b", 5), b.clone() as Arc<dyn Provider>),
            ],
        );

        let response = chain.invoke(&request(Capability::Market)).await.unwrap();
        assert_eq!(response.provider_used, "b");
        assert_eq!(response.payload, market(400_000.0));
        assert_eq!(response.attempts.len(), 2);
        assert_eq!(response.attempts[0].outcome, AttemptOutcome::Error("Provider 'a' failed: upstream 500".to_string()));
        assert_eq!(response.attempts[1].outcome, AttemptOutcome::Success);
        // No retry of the failed provider within the request.
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_failing_is_exhausted() {
        let chain = ProviderChain::new(
            Capability::Market,
            vec![
                (ProviderConfig::new("a", 5), StaticProvider::failing("a") as Arc<dyn Provider>),
                (ProviderConfig::new("b", 5), StaticProvider::failing("b") as Arc<dyn Provider>),
            ],
        );

        let err = chain.invoke(&request(Capability::Market)).await.unwrap_err();
        assert_eq!(
            err,
            Error::AllProvidersExhausted { capability: "market".to_string() }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_advances_chain() {
        let chain = ProviderChain::new(
            Capability::Market,
            vec![
                (ProviderConfig::new("slow", 1), Arc::new(SlowProvider) as Arc<dyn Provider>),
                (
                    ProviderConfig::new("fast", 5),
                    StaticProvider::ok("fast", market(380_000.0)) as Arc<dyn Provider>,
                ),
            ],
        );

        let response = chain.invoke(&request(Capability::Market)).await.unwrap();
        assert_eq!(response.provider_used, "fast");
        assert_eq!(response.attempts[0].outcome, AttemptOutcome::Timeout);
    }

    #[tokio::test]
    async fn test_empty_response_is_a_failure() {
        let empty = StaticProvider::ok("empty", CapabilityPayload::Sales(SalesComps { comps: Vec::new() }));
        let chain = ProviderChain::new(
            Capability::Sales,
            vec![(ProviderConfig::new("empty", 5), empty as Arc<dyn Provider>)],
        );

        let err = chain.invoke(&request(Capability::Sales)).await.unwrap_err();
        assert!(matches!(err, Error::AllProvidersExhausted { .. }));
    }

    #[tokio::test]
    async fn test_first_success_stops_the_chain() {
        let a = StaticProvider::ok("a", market(400_000.0));
        let b = StaticProvider::ok("b", market(999_999.0));
        let chain = ProviderChain::new(
            Capability::Market,
            vec![
                (ProviderConfig::new("a", 5), a.clone() as Arc<dyn Provider>),
                (ProviderConfig::new("b", 5), b.clone() as Arc<dyn Provider>),
            ],
        );

        let response = chain.invoke(&request(Capability::Market)).await.unwrap();
        assert_eq!(response.provider_used, "a");
        assert_eq!(b.calls.load(Ordering::SeqCst), 0);
    }
}
