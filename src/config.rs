//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sync::BackoffPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub backoff: BackoffConfig,
    /// Page size for snapshot fetches, initial and `load_more` alike.
    pub page_limit: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            page_limit: 50,
        }
    }
}

/// Reconnect delay: doubles from `base_ms` per failed attempt, capped at
/// `max_ms`. The low cap keeps recovery latency interactive after a server
/// restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_ms: u64,
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 1_000,
            max_ms: 8_000,
        }
    }
}

impl BackoffConfig {
    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_millis(self.base_ms.max(1)),
            max: Duration::from_millis(self.max_ms.max(self.base_ms.max(1))),
        }
    }
}
