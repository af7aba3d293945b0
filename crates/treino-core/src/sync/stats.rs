//! Sync counters
//!
//! Both ends keep a small set of counters so callers (and the `status`
//! command) can tell what the link has been doing.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// What the sender has done since it was created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SenderStats {
    /// Payloads handed to the live path
    pub messages_sent: u64,
    /// Payloads written to a context slot
    pub contexts_updated: u64,
    /// Syncs dropped because the link was not activated
    pub skipped_inactive: u64,
    /// Payloads that could not be encoded or handed off
    pub failed: u64,
    /// Time of the last successful hand-off on either path
    pub last_delivery_at: Option<DateTime<Utc>>,
}

impl SenderStats {
    pub fn delivered(&self) -> u64 {
        self.messages_sent + self.contexts_updated
    }
}

/// What the receiver has applied since it was created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReceiverStats {
    /// Collection snapshots published
    pub collections_applied: u64,
    /// Collection snapshots older than the one already published
    pub stale_ignored: u64,
    /// Assets written to the mirror's storage
    pub assets_stored: u64,
    /// Payloads that failed to decode or store
    pub rejected: u64,
    /// Time the last collection snapshot was published
    pub last_applied_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivered_counts_both_paths() {
        let stats = SenderStats {
            messages_sent: 2,
            contexts_updated: 3,
            ..Default::default()
        };
        assert_eq!(stats.delivered(), 5);
    }

    #[test]
    fn test_stats_serialize_for_status_output() {
        let json = serde_json::to_value(ReceiverStats::default()).unwrap();
        assert_eq!(json["collections_applied"], 0);
        assert!(json["last_applied_at"].is_null());
    }
}
