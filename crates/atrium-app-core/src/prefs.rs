// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persisted sync preferences (timeouts, backoff, endpoints, toast policy).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Saved preferences for the sync engine and its transports.
///
/// Missing fields fall back to defaults so older config files keep loading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncPrefs {
    /// Global timeout for a transaction's network call.
    pub transaction_timeout_ms: u64,
    /// Fixed delay before a realtime channel resubscribes after a transport error.
    pub resubscribe_backoff_ms: u64,
    /// Prefix for client-generated temporary ids.
    pub temp_id_prefix: String,
    /// How long failure toasts stay visible.
    pub error_toast_ttl_ms: u64,
    /// Maximum queued toasts.
    pub toast_capacity: usize,
    /// Base URL of the persistence API.
    pub api_base_url: Option<String>,
    /// Unix socket of the realtime host.
    pub realtime_socket: Option<String>,
}

impl Default for SyncPrefs {
    fn default() -> Self {
        Self {
            transaction_timeout_ms: 15_000,
            resubscribe_backoff_ms: 3_000,
            temp_id_prefix: "tmp-".to_string(),
            error_toast_ttl_ms: 6_000,
            toast_capacity: 32,
            api_base_url: None,
            realtime_socket: None,
        }
    }
}

impl SyncPrefs {
    /// Transaction timeout as a `Duration`.
    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }

    /// Resubscribe backoff as a `Duration`.
    pub fn resubscribe_backoff(&self) -> Duration {
        Duration::from_millis(self.resubscribe_backoff_ms)
    }

    /// Error toast TTL as a `Duration`.
    pub fn error_toast_ttl(&self) -> Duration {
        Duration::from_millis(self.error_toast_ttl_ms)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let prefs: SyncPrefs =
            serde_json::from_str(r#"{"transaction_timeout_ms": 500}"#).unwrap();
        assert_eq!(prefs.transaction_timeout(), Duration::from_millis(500));
        assert_eq!(prefs.temp_id_prefix, "tmp-");
        assert_eq!(prefs.resubscribe_backoff(), Duration::from_secs(3));
    }
}
