//! Mirror side of the sync channel
//!
//! Applies whatever arrives, no matter which path carried it:
//!
//! - A collection snapshot replaces the published collection in one step and
//!   wakes every subscriber. Snapshots from the same sending session that
//!   are older than the one already published are ignored, so a late
//!   context cannot roll back a newer message. A snapshot from a new session
//!   (the authoritative device restarted) is always applied, whatever its
//!   clock says.
//! - An asset is written to the mirror's storage and cached.
//!
//! Bad payloads are logged and dropped; published state is never touched by
//! a payload that fails to decode.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::link::{Delivery, Inbox};
use super::memory::MemoryInbox;
use super::payload::{decode_collection, SyncPayload};
use super::stats::ReceiverStats;
use crate::assets::AssetCache;
use crate::models::{Locator, WorkoutGroup};

/// A published collection
pub type Snapshot = Arc<Vec<WorkoutGroup>>;

/// Result of handling one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    CollectionApplied,
    StaleIgnored,
    AssetStored,
    Rejected,
}

/// Receives payloads and owns the mirror's published state
pub struct SyncReceiver {
    state: watch::Sender<Snapshot>,
    assets: Arc<AssetCache>,
    /// Origin and sequence of the published snapshot
    last_applied: Option<(Uuid, u64)>,
    stats: ReceiverStats,
}

impl SyncReceiver {
    pub fn new(assets: Arc<AssetCache>) -> Self {
        let (state, _) = watch::channel(Snapshot::default());
        Self {
            state,
            assets,
            last_applied: None,
            stats: ReceiverStats::default(),
        }
    }

    /// Observe published snapshots; the current one is available immediately
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.state.subscribe()
    }

    /// The currently published collection
    pub fn groups(&self) -> Snapshot {
        Arc::clone(&self.state.borrow())
    }

    pub fn assets(&self) -> &Arc<AssetCache> {
        &self.assets
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    /// Apply a single delivery
    pub fn handle(&mut self, delivery: &Delivery) -> ApplyOutcome {
        let payload = match SyncPayload::decode(&delivery.payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Ignoring undecodable payload ({:?}): {}", delivery.mode, e);
                return self.reject();
            }
        };
        debug!("Received {} payload via {:?}", payload.kind(), delivery.mode);

        match payload {
            SyncPayload::Collection {
                origin,
                sequence,
                data,
            } => self.apply_collection(origin, sequence, &data),
            SyncPayload::Asset { file_name, data } => self.store_asset(&file_name, &data),
        }
    }

    /// Apply everything the inbox already holds, without waiting
    ///
    /// Returns the number of deliveries handled.
    pub fn pump<I: Inbox + ?Sized>(&mut self, inbox: &mut I) -> usize {
        let deliveries = inbox.drain();
        for delivery in &deliveries {
            self.handle(delivery);
        }
        deliveries.len()
    }

    /// Apply deliveries as they arrive until the link end is dropped
    pub async fn run(&mut self, mut inbox: MemoryInbox) {
        info!("Receiver started");
        while let Some(delivery) = inbox.recv().await {
            self.handle(&delivery);
        }
        info!(
            "Receiver stopped after {} collections, {} assets",
            self.stats.collections_applied, self.stats.assets_stored
        );
    }

    /// Run on a tokio task, handing the receiver back when the link closes
    pub fn spawn(mut self, inbox: MemoryInbox) -> JoinHandle<Self> {
        tokio::spawn(async move {
            self.run(inbox).await;
            self
        })
    }

    fn apply_collection(&mut self, origin: Uuid, sequence: u64, data: &[u8]) -> ApplyOutcome {
        if let Some((last_origin, last)) = self.last_applied {
            if origin == last_origin && sequence <= last {
                debug!("Ignoring stale collection {} (have {})", sequence, last);
                self.stats.stale_ignored += 1;
                return ApplyOutcome::StaleIgnored;
            }
        }

        let groups = match decode_collection(data) {
            Ok(groups) => groups,
            Err(e) => {
                warn!("Ignoring invalid collection: {}", e);
                return self.reject();
            }
        };

        info!("Applied collection with {} groups", groups.len());
        self.state.send_replace(Arc::new(groups));
        self.last_applied = Some((origin, sequence));
        self.stats.collections_applied += 1;
        self.stats.last_applied_at = Some(Utc::now());
        ApplyOutcome::CollectionApplied
    }

    fn store_asset(&mut self, file_name: &str, data: &[u8]) -> ApplyOutcome {
        let locator = match Locator::new(file_name) {
            Ok(locator) => locator,
            Err(e) => {
                warn!("Ignoring asset {:?}: {}", file_name, e);
                return self.reject();
            }
        };

        if !self.assets.put(data, &locator) {
            return self.reject();
        }
        self.stats.assets_stored += 1;
        ApplyOutcome::AssetStored
    }

    fn reject(&mut self) -> ApplyOutcome {
        self.stats.rejected += 1;
        ApplyOutcome::Rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::link::{ContextSlot, PeerLink};
    use crate::sync::memory::pair;
    use crate::sync::sender::SyncSender;
    use std::time::Duration;
    use tempfile::TempDir;

    fn receiver(temp: &TempDir) -> SyncReceiver {
        SyncReceiver::new(Arc::new(AssetCache::new(temp.path(), 50)))
    }

    const SESSION: Uuid = Uuid::from_u128(0x7e57);

    fn collection(sequence: u64, names: &[&str]) -> Delivery {
        collection_from(SESSION, sequence, names)
    }

    fn collection_from(origin: Uuid, sequence: u64, names: &[&str]) -> Delivery {
        let groups: Vec<WorkoutGroup> = names
            .iter()
            .map(|n| WorkoutGroup::new(n, None).unwrap())
            .collect();
        let bytes = SyncPayload::collection(origin, sequence, &groups)
            .unwrap()
            .encode()
            .unwrap();
        Delivery::message(bytes)
    }

    fn names(snapshot: &Snapshot) -> Vec<String> {
        snapshot.iter().map(|g| g.name.clone()).collect()
    }

    #[test]
    fn test_collection_replaces_state_and_notifies() {
        let temp = TempDir::new().unwrap();
        let mut receiver = receiver(&temp);
        let mut rx = receiver.subscribe();
        assert!(rx.borrow().is_empty());

        let outcome = receiver.handle(&collection(1, &["Push", "Pull"]));

        assert_eq!(outcome, ApplyOutcome::CollectionApplied);
        assert!(rx.has_changed().unwrap());
        assert_eq!(names(&rx.borrow_and_update()), vec!["Push", "Pull"]);
        assert_eq!(receiver.stats().collections_applied, 1);
        assert!(receiver.stats().last_applied_at.is_some());
    }

    #[test]
    fn test_stale_collection_is_ignored() {
        let temp = TempDir::new().unwrap();
        let mut receiver = receiver(&temp);

        receiver.handle(&collection(10, &["New"]));
        let outcome = receiver.handle(&collection(5, &["Old"]));

        assert_eq!(outcome, ApplyOutcome::StaleIgnored);
        assert_eq!(names(&receiver.groups()), vec!["New"]);
        assert_eq!(receiver.stats().stale_ignored, 1);
    }

    #[test]
    fn test_restarted_sender_with_earlier_clock_is_applied() {
        let temp = TempDir::new().unwrap();
        let mut receiver = receiver(&temp);
        receiver.handle(&collection(5_000, &["Before restart"]));

        let restarted = Uuid::from_u128(0xbeef);
        let outcome = receiver.handle(&collection_from(restarted, 1_000, &["After restart"]));
        assert_eq!(outcome, ApplyOutcome::CollectionApplied);
        assert_eq!(names(&receiver.groups()), vec!["After restart"]);

        // Ordering still holds within the new session
        let outcome = receiver.handle(&collection_from(restarted, 900, &["Late"]));
        assert_eq!(outcome, ApplyOutcome::StaleIgnored);
        assert_eq!(names(&receiver.groups()), vec!["After restart"]);
    }

    #[test]
    fn test_garbled_payload_leaves_state_untouched() {
        let temp = TempDir::new().unwrap();
        let mut receiver = receiver(&temp);
        receiver.handle(&collection(1, &["Keep"]));
        let rx = receiver.subscribe();

        let outcome = receiver.handle(&Delivery::message(b"garbage".to_vec()));
        assert_eq!(outcome, ApplyOutcome::Rejected);

        let bad_json = SyncPayload::Collection {
            origin: SESSION,
            sequence: 2,
            data: b"{not json".to_vec(),
        };
        let outcome = receiver.handle(&Delivery::message(bad_json.encode().unwrap()));
        assert_eq!(outcome, ApplyOutcome::Rejected);

        assert!(!rx.has_changed().unwrap());
        assert_eq!(names(&receiver.groups()), vec!["Keep"]);
        assert_eq!(receiver.stats().rejected, 2);
    }

    #[test]
    fn test_asset_is_stored_and_cached() {
        let temp = TempDir::new().unwrap();
        let mut receiver = receiver(&temp);
        let payload = SyncPayload::asset("row.jpg", vec![1, 2, 3]);

        let outcome = receiver.handle(&Delivery::context(
            ContextSlot::asset("row.jpg"),
            payload.encode().unwrap(),
        ));

        assert_eq!(outcome, ApplyOutcome::AssetStored);
        assert!(temp.path().join("row.jpg").exists());
        let locator = Locator::new("row.jpg").unwrap();
        assert!(receiver.assets().contains(&locator));
        assert_eq!(&*receiver.assets().get(&locator).unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_asset_with_path_in_name_is_rejected() {
        let temp = TempDir::new().unwrap();
        let mut receiver = receiver(&temp);
        let payload = SyncPayload::asset("../escape.jpg", vec![1]);

        let outcome = receiver.handle(&Delivery::message(payload.encode().unwrap()));

        assert_eq!(outcome, ApplyOutcome::Rejected);
        assert!(!temp.path().parent().unwrap().join("escape.jpg").exists());
    }

    #[test]
    fn test_pump_applies_latest_context_only() {
        let temp = TempDir::new().unwrap();
        let mut receiver = receiver(&temp);
        let (link, mut inbox) = pair();
        let sender = SyncSender::new(Arc::new(link));
        sender.activate();

        sender.sync_collection(&[WorkoutGroup::new("C1", None).unwrap()]);
        sender.sync_collection(&[WorkoutGroup::new("C2", None).unwrap()]);

        assert_eq!(receiver.pump(&mut inbox), 1);
        assert_eq!(names(&receiver.groups()), vec!["C2"]);
        assert_eq!(receiver.pump(&mut inbox), 0);
    }

    #[tokio::test]
    async fn test_spawned_receiver_follows_sender() {
        let temp = TempDir::new().unwrap();
        let receiver = receiver(&temp);
        let mut rx = receiver.subscribe();
        let (link, inbox) = pair();
        inbox.set_reachable(true);
        let link = Arc::new(link);
        let sender = SyncSender::new(link.clone());

        let handle = receiver.spawn(inbox);
        sender.activate();
        sender.sync_collection(&[WorkoutGroup::new("Live", None).unwrap()]);

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(names(&rx.borrow_and_update()), vec!["Live"]);

        drop(sender);
        drop(link);
        let receiver = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(receiver.stats().collections_applied, 1);
        assert!(!receiver.subscribe().borrow().is_empty());
    }

    #[test]
    fn test_link_trait_object_is_usable() {
        let (link, _inbox) = pair();
        let link: Arc<dyn PeerLink> = Arc::new(link);
        assert!(!link.is_reachable());
    }
}
