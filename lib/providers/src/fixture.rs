//! Canned-payload provider for demos and offline runs.
//!
//! Keyless environments still need the full discovery path to work, so the
//! fixture provider answers from a static payload table the way a real
//! adapter would answer from its API.

use async_trait::async_trait;
use equitx_cache::{
    Capability, CapabilityPayload, ConditionIssue, ConditionReport, FloodDetermination,
    MarketStats, SaleComp, SalesComps,
};
use equitx_core::{Error, Result};

use crate::provider::{Provider, ProviderRequest};

pub struct FixtureProvider {
    id: String,
    payloads: ahash::AHashMap<Capability, CapabilityPayload>,
}

impl FixtureProvider {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payloads: ahash::AHashMap::new(),
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: CapabilityPayload) -> Self {
        self.payloads.insert(payload.capability(), payload);
        self
    }

    /// A provider preloaded with plausible demo payloads for every
    /// capability.
    #[must_use]
    pub fn demo(id: impl Into<String>) -> Self {
        Self::new(id)
            .with_payload(CapabilityPayload::Sales(SalesComps {
                comps: vec![
                    SaleComp {
                        address: "818 WYCLIFFE DR".to_string(),
                        sale_price: 742_500.0,
                        sale_date: Some("2025-03-14".to_string()),
                        sqft: Some(3610.0),
                        price_per_sqft: Some(205.7),
                        year_built: Some(2016),
                        source: "fixture".to_string(),
                        distance_miles: Some(0.4),
                    },
                    SaleComp {
                        address: "902 PLUM VALLEY DR".to_string(),
                        sale_price: 715_000.0,
                        sale_date: Some("2024-11-02".to_string()),
                        sqft: Some(3544.0),
                        price_per_sqft: Some(201.7),
                        year_built: Some(2017),
                        source: "fixture".to_string(),
                        distance_miles: Some(0.7),
                    },
                ],
            }))
            .with_payload(CapabilityPayload::Vision(ConditionReport {
                issues: vec![
                    ConditionIssue {
                        label: "Roof Wear".to_string(),
                        deduction: 5000.0,
                        confidence: 0.85,
                    },
                    ConditionIssue {
                        label: "Peeling Paint".to_string(),
                        deduction: 3000.0,
                        confidence: 0.75,
                    },
                ],
            }))
            .with_payload(CapabilityPayload::Market(MarketStats {
                estimated_value: 805_000.0,
                range_low: 770_000.0,
                range_high: 845_000.0,
                source: "fixture".to_string(),
            }))
            .with_payload(CapabilityPayload::Flood(FloodDetermination {
                zone: "X".to_string(),
                subtype: Some("AREA OF MINIMAL FLOOD HAZARD".to_string()),
                high_risk: false,
                source: "FEMA NFHL".to_string(),
            }))
    }
}

#[async_trait]
impl Provider for FixtureProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn invoke(&self, request: &ProviderRequest) -> Result<CapabilityPayload> {
        self.payloads
            .get(&request.capability)
            .cloned()
            .ok_or_else(|| Error::ProviderError {
                provider: self.id.clone(),
                message: format!("no fixture payload for capability '{}'", request.capability),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equitx_core::ParcelId;

    #[tokio::test]
    async fn test_demo_serves_every_capability() {
        let provider = FixtureProvider::demo("fixture");
        for capability in Capability::ALL {
            let request = ProviderRequest {
                subject: ParcelId::new("acct-1"),
                capability,
                address: "1 TEST LN".to_string(),
                district: "HCAD".to_string(),
                coordinates: None,
            };
            let payload = provider.invoke(&request).await.unwrap();
            assert_eq!(payload.capability(), capability);
            assert!(!payload.is_empty());
        }
    }
}
