//! Metrics configuration.

use super::defaults::{
    default_dashboard_cache_refresh_interval_secs, default_dashboard_cache_ttl_secs,
};
use serde::{Deserialize, Serialize};

/// Metrics configuration for the `/_debug/storage` snapshot cache (spec §10).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub dashboard_cache_refresh_interval_secs: u64,
    pub dashboard_cache_ttl_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            dashboard_cache_refresh_interval_secs: default_dashboard_cache_refresh_interval_secs(),
            dashboard_cache_ttl_secs: default_dashboard_cache_ttl_secs(),
        }
    }
}
