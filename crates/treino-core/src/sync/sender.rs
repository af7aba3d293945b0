//! Authoritative side of the sync channel
//!
//! Every sync carries the full payload. When the peer is live it goes out as
//! an immediate message; otherwise it replaces the latest context for its
//! slot, so only the newest snapshot is ever waiting for the mirror.
//! Nothing here reports failure to the caller: errors are logged and
//! counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::link::{ActivationState, ContextSlot, PeerLink};
use super::payload::SyncPayload;
use super::stats::SenderStats;
use crate::models::WorkoutGroup;

/// What happened to a single sync request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Link not activated; nothing was sent
    Skipped,
    /// Handed to the live path
    Sent,
    /// Written to the context slot
    ContextUpdated,
    /// Encoding or hand-off failed; the payload was dropped
    Failed,
}

/// Pushes collection snapshots and images to the mirror
pub struct SyncSender {
    link: Arc<dyn PeerLink>,
    origin: Uuid,
    sequence: AtomicU64,
    stats: Mutex<SenderStats>,
}

impl SyncSender {
    pub fn new(link: Arc<dyn PeerLink>) -> Self {
        Self {
            link,
            origin: Uuid::new_v4(),
            sequence: AtomicU64::new(0),
            stats: Mutex::new(SenderStats::default()),
        }
    }

    /// Start link activation; failures are logged
    pub fn activate(&self) {
        match self.link.activate() {
            Ok(()) => debug!("Link activation requested"),
            Err(e) => warn!("Link activation failed: {}", e),
        }
    }

    pub fn activation_state(&self) -> ActivationState {
        self.link.activation_state()
    }

    pub fn subscribe_activation(&self) -> watch::Receiver<ActivationState> {
        self.link.subscribe_activation()
    }

    pub fn link(&self) -> &Arc<dyn PeerLink> {
        &self.link
    }

    /// Session id stamped on every collection this sender pushes
    pub fn origin(&self) -> Uuid {
        self.origin
    }

    pub fn stats(&self) -> SenderStats {
        self.lock_stats().clone()
    }

    /// Push the whole collection to the mirror
    pub fn sync_collection(&self, groups: &[WorkoutGroup]) -> SendOutcome {
        if !self.is_active() {
            return SendOutcome::Skipped;
        }

        let payload = match SyncPayload::collection(self.origin, self.next_sequence(), groups) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode collection: {}", e);
                self.lock_stats().failed += 1;
                return SendOutcome::Failed;
            }
        };

        self.deliver(&payload, ContextSlot::Collection)
    }

    /// Push a single named image to the mirror
    pub fn transfer_asset(&self, bytes: &[u8], file_name: &str) -> SendOutcome {
        if !self.is_active() {
            return SendOutcome::Skipped;
        }

        let payload = SyncPayload::asset(file_name, bytes.to_vec());
        self.deliver(&payload, ContextSlot::asset(file_name))
    }

    fn is_active(&self) -> bool {
        if self.link.activation_state() == ActivationState::Activated {
            return true;
        }
        debug!("Link not activated, skipping sync");
        self.lock_stats().skipped_inactive += 1;
        false
    }

    fn deliver(&self, payload: &SyncPayload, slot: ContextSlot) -> SendOutcome {
        let bytes = match payload.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to encode {} payload: {}", payload.kind(), e);
                self.lock_stats().failed += 1;
                return SendOutcome::Failed;
            }
        };
        let size = bytes.len();

        // No fallback to the context path: a lost message is superseded by the next sync
        let outcome = if self.link.is_reachable() {
            match self.link.send_message(bytes) {
                Ok(()) => SendOutcome::Sent,
                Err(e) => {
                    debug!("Dropped {} message: {}", payload.kind(), e);
                    SendOutcome::Failed
                }
            }
        } else {
            let name = slot.name();
            match self.link.update_context(slot, bytes) {
                Ok(()) => SendOutcome::ContextUpdated,
                Err(e) => {
                    warn!("Failed to update {} context: {}", name, e);
                    SendOutcome::Failed
                }
            }
        };

        let mut stats = self.lock_stats();
        match outcome {
            SendOutcome::Sent => stats.messages_sent += 1,
            SendOutcome::ContextUpdated => stats.contexts_updated += 1,
            SendOutcome::Failed => stats.failed += 1,
            SendOutcome::Skipped => {}
        }
        if matches!(outcome, SendOutcome::Sent | SendOutcome::ContextUpdated) {
            stats.last_delivery_at = Some(Utc::now());
            info!("Synced {} payload ({} bytes, {:?})", payload.kind(), size, outcome);
        }

        outcome
    }

    /// Next ordering key: wall-clock milliseconds, forced to increase
    fn next_sequence(&self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let previous = self
            .sequence
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }

    fn lock_stats(&self) -> MutexGuard<'_, SenderStats> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::link::{Delivery, DeliveryMode, Inbox};
    use crate::sync::memory::{pair, MemoryInbox, MemoryLink};
    use crate::sync::payload::decode_collection;

    fn setup() -> (Arc<MemoryLink>, MemoryInbox, SyncSender) {
        let (link, inbox) = pair();
        let link = Arc::new(link);
        let sender = SyncSender::new(link.clone());
        (link, inbox, sender)
    }

    fn groups(names: &[&str]) -> Vec<WorkoutGroup> {
        names
            .iter()
            .map(|n| WorkoutGroup::new(n, None).unwrap())
            .collect()
    }

    fn decode_groups(delivery: &Delivery) -> Vec<WorkoutGroup> {
        match SyncPayload::decode(&delivery.payload).unwrap() {
            SyncPayload::Collection { data, .. } => decode_collection(&data).unwrap(),
            other => panic!("Expected collection, got {}", other.kind()),
        }
    }

    #[test]
    fn test_sync_before_activation_is_noop() {
        let (_link, mut inbox, sender) = setup();

        let outcome = sender.sync_collection(&groups(&["Push"]));

        assert_eq!(outcome, SendOutcome::Skipped);
        assert!(inbox.drain().is_empty());
        assert_eq!(sender.stats().skipped_inactive, 1);
        assert_eq!(sender.transfer_asset(b"img", "a.jpg"), SendOutcome::Skipped);
    }

    #[test]
    fn test_reachable_peer_gets_message() {
        let (_link, mut inbox, sender) = setup();
        sender.activate();
        inbox.set_reachable(true);

        let sent = groups(&["Push", "Pull"]);
        assert_eq!(sender.sync_collection(&sent), SendOutcome::Sent);

        let deliveries = inbox.drain();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].mode, DeliveryMode::Message);
        assert_eq!(decode_groups(&deliveries[0]), sent);

        let stats = sender.stats();
        assert_eq!(stats.messages_sent, 1);
        assert!(stats.last_delivery_at.is_some());
    }

    #[test]
    fn test_unreachable_peer_sees_only_latest_collection() {
        let (_link, mut inbox, sender) = setup();
        sender.activate();

        let first = groups(&["C1"]);
        let second = groups(&["C2a", "C2b"]);
        assert_eq!(sender.sync_collection(&first), SendOutcome::ContextUpdated);
        assert_eq!(sender.sync_collection(&second), SendOutcome::ContextUpdated);

        let deliveries = inbox.drain();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(
            deliveries[0].mode,
            DeliveryMode::Context(ContextSlot::Collection)
        );
        assert_eq!(decode_groups(&deliveries[0]), second);
        assert_eq!(sender.stats().contexts_updated, 2);
    }

    #[test]
    fn test_unreachable_peer_keeps_every_image() {
        let (_link, mut inbox, sender) = setup();
        sender.activate();

        sender.transfer_asset(b"first", "a.jpg");
        sender.transfer_asset(b"second", "b.jpg");

        let payloads: Vec<SyncPayload> = inbox
            .drain()
            .iter()
            .map(|d| SyncPayload::decode(&d.payload).unwrap())
            .collect();
        assert_eq!(
            payloads,
            vec![
                SyncPayload::asset("a.jpg", b"first".to_vec()),
                SyncPayload::asset("b.jpg", b"second".to_vec())
            ]
        );
    }

    #[test]
    fn test_collections_carry_sender_origin() {
        let (_link, mut inbox, sender) = setup();
        sender.activate();
        sender.sync_collection(&groups(&["A"]));

        let deliveries = inbox.drain();
        match SyncPayload::decode(&deliveries[0].payload).unwrap() {
            SyncPayload::Collection { origin, .. } => assert_eq!(origin, sender.origin()),
            other => panic!("Expected collection, got {}", other.kind()),
        }

        let (link, _inbox) = pair();
        assert_ne!(SyncSender::new(Arc::new(link)).origin(), sender.origin());
    }

    #[test]
    fn test_asset_does_not_replace_pending_collection() {
        let (_link, mut inbox, sender) = setup();
        sender.activate();

        let sent = groups(&["Legs"]);
        sender.sync_collection(&sent);
        sender.transfer_asset(&[0xff, 0xd8], "squat.jpg");

        let deliveries = inbox.drain();
        assert_eq!(deliveries.len(), 2);
        assert_eq!(decode_groups(&deliveries[0]), sent);
        assert_eq!(
            SyncPayload::decode(&deliveries[1].payload).unwrap(),
            SyncPayload::asset("squat.jpg", vec![0xff, 0xd8])
        );
    }

    #[test]
    fn test_dropped_peer_gets_context() {
        let (link, inbox, sender) = setup();
        sender.activate();
        inbox.set_reachable(true);
        drop(inbox);

        // Peer gone: reachability drops and the context cell still accepts writes
        assert!(!link.is_reachable());
        assert_eq!(
            sender.sync_collection(&groups(&["Gone"])),
            SendOutcome::ContextUpdated
        );
    }

    #[test]
    fn test_sequence_increases() {
        let (_link, _inbox, sender) = setup();
        let a = sender.next_sequence();
        let b = sender.next_sequence();
        let c = sender.next_sequence();
        assert!(a < b && b < c);
    }
}
