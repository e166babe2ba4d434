//! # equitx Providers
//!
//! Provider-failover layer: each external capability (sales data, imagery
//! condition analysis, market stats, flood determination) has an ordered
//! chain of interchangeable providers. The chain tries them strictly in
//! priority order with a per-provider timeout and returns the first usable
//! response; a chain that runs dry degrades the capability instead of
//! failing the discovery request.
//!
//! - [`Provider`] - one external data source
//! - [`ProviderConfig`] - id, timeout, endpoint/credential references
//! - [`ProviderChain`] - the failover orchestrator
//! - [`FixtureProvider`] - canned payloads for demos and offline runs

pub mod chain;
pub mod fixture;
pub mod provider;

pub use chain::{AttemptOutcome, ChainResponse, ProviderAttempt, ProviderChain};
pub use fixture::FixtureProvider;
pub use provider::{Provider, ProviderConfig, ProviderRequest};
