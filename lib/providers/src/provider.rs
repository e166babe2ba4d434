use std::time::Duration;

use async_trait::async_trait;
use equitx_cache::{Capability, CapabilityPayload};
use equitx_core::{Coordinates, ParcelId, Result};
use serde::{Deserialize, Serialize};

/// Configuration for one provider in a capability chain.
///
/// Endpoint and credential references are opaque here; resolving them is the
/// provider adapter's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Stable provider identifier, e.g. "rentcast" or "fema-nfhl".
    pub id: String,
    /// Per-attempt timeout in seconds. An attempt exceeding it counts as a
    /// provider failure and the chain advances.
    pub timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_ref: Option<String>,
}

impl ProviderConfig {
    #[must_use]
    pub fn new(id: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            id: id.into(),
            timeout_secs,
            endpoint: None,
            credential_ref: None,
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// What a provider gets to work with for one lookup.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub subject: ParcelId,
    pub capability: Capability,
    pub address: String,
    pub district: String,
    pub coordinates: Option<Coordinates>,
}

/// One interchangeable external data source.
///
/// Adapters own their transport and any internal retries; the chain never
/// re-tries a provider that reported failure within the same logical
/// request.
#[async_trait]
pub trait Provider: Send + Sync {
    fn id(&self) -> &str;

    async fn invoke(&self, request: &ProviderRequest) -> Result<CapabilityPayload>;
}
