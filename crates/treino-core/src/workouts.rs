//! Collection mutation API
//!
//! `Workouts` is the single owner of the workout collection on the
//! authoritative device. Every mutation follows the same order:
//!
//! 1. change the in-memory collection
//! 2. save it to the local store
//! 3. publish the new snapshot to subscribers
//! 4. push it to the mirror
//!
//! Steps 2 and 4 never fail the mutation; their errors are logged. Only
//! input validation is reported to the caller. Operations that name a group
//! or exercise that does not exist leave everything unchanged.
//!
//! ## Usage
//!
//! ```ignore
//! let mut workouts = Workouts::open_with_config(&config, link)?;
//! let push = workouts.add_group("Push", Some("Monday".into()))?;
//! workouts.add_exercise(ExerciseDraft::new("Bench", 4, 8), push)?;
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use crate::assets::AssetCache;
use crate::config::Config;
use crate::models::{move_elements, Exercise, ExerciseDraft, Locator, WorkoutError, WorkoutGroup};
use crate::storage::LocalStore;
use crate::sync::{PeerLink, SendOutcome, Snapshot, SyncSender};

/// Owner of the workout collection on the authoritative device
pub struct Workouts {
    groups: Vec<WorkoutGroup>,
    store: LocalStore,
    assets: Arc<AssetCache>,
    sender: SyncSender,
    published: watch::Sender<Snapshot>,
}

impl Workouts {
    /// Load the stored collection and publish it
    pub fn new(store: LocalStore, assets: Arc<AssetCache>, sender: SyncSender) -> Self {
        let groups = store.load();
        debug!("Loaded {} workout groups", groups.len());
        let (published, _) = watch::channel(Arc::new(groups.clone()));

        Self {
            groups,
            store,
            assets,
            sender,
            published,
        }
    }

    /// Open the store and asset cache described by `config`
    ///
    /// The link is activated when sync is enabled; otherwise every sync is a
    /// no-op.
    pub fn open_with_config(config: &Config, link: Arc<dyn PeerLink>) -> Result<Self> {
        let store = LocalStore::open(config).context("Failed to open workout store")?;
        let assets = Arc::new(AssetCache::new(
            config.image_dir(),
            config.asset_cache_capacity,
        ));
        let sender = SyncSender::new(link);
        if config.sync_enabled {
            sender.activate();
        }

        Ok(Self::new(store, assets, sender))
    }

    // ==================== Queries ====================

    pub fn groups(&self) -> &[WorkoutGroup] {
        &self.groups
    }

    pub fn group(&self, id: Uuid) -> Option<&WorkoutGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Observe published snapshots; the current one is available immediately
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.published.subscribe()
    }

    pub fn assets(&self) -> &Arc<AssetCache> {
        &self.assets
    }

    pub fn sender(&self) -> &SyncSender {
        &self.sender
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    // ==================== Group Operations ====================

    /// Append a new, empty group and return its id
    pub fn add_group(
        &mut self,
        name: &str,
        suggested_day: Option<String>,
    ) -> Result<Uuid, WorkoutError> {
        let group = WorkoutGroup::new(name, suggested_day)?;
        let id = group.id;
        self.groups.push(group);
        info!("Added workout group {}", id);
        self.commit();
        Ok(id)
    }

    /// Replace the group with the same id, keeping its position
    pub fn update_group(&mut self, group: WorkoutGroup) -> Result<(), WorkoutError> {
        let group = group.validated()?;
        let Some(slot) = self.groups.iter_mut().find(|g| g.id == group.id) else {
            debug!("Update of unknown group {} ignored", group.id);
            return Ok(());
        };

        let before = images_of(slot);
        *slot = group;
        self.commit();
        self.release_images(before);
        Ok(())
    }

    /// Remove a group and its exercises
    pub fn delete_group(&mut self, id: Uuid) {
        let Some(index) = self.groups.iter().position(|g| g.id == id) else {
            debug!("Delete of unknown group {} ignored", id);
            return;
        };

        let removed = self.groups.remove(index);
        info!("Deleted workout group {}", id);
        self.commit();
        self.release_images(images_of(&removed));
    }

    // ==================== Exercise Operations ====================

    /// Append a new exercise to one group
    ///
    /// Returns the new exercise id, or `None` when the group does not exist.
    pub fn add_exercise(
        &mut self,
        draft: ExerciseDraft,
        group_id: Uuid,
    ) -> Result<Option<Uuid>, WorkoutError> {
        let exercise = Exercise::from_draft(draft)?;
        let Some(group) = self.group_mut(group_id) else {
            debug!("Add to unknown group {} ignored", group_id);
            return Ok(None);
        };

        let id = exercise.id;
        group.exercises.push(exercise);
        self.commit();
        Ok(Some(id))
    }

    /// Replace the exercise with the same id inside one group
    pub fn update_exercise(
        &mut self,
        exercise: Exercise,
        group_id: Uuid,
    ) -> Result<(), WorkoutError> {
        let exercise = exercise.validated()?;
        let Some(slot) = self
            .group_mut(group_id)
            .and_then(|g| g.exercises.iter_mut().find(|e| e.id == exercise.id))
        else {
            debug!("Update of unknown exercise {} ignored", exercise.id);
            return Ok(());
        };

        let before = slot.image_locator.clone();
        *slot = exercise;
        self.commit();
        self.release_images(before.into_iter().collect());
        Ok(())
    }

    pub fn delete_exercise(&mut self, exercise_id: Uuid, group_id: Uuid) {
        let Some(group) = self.group_mut(group_id) else {
            return;
        };
        let Some(index) = group.exercises.iter().position(|e| e.id == exercise_id) else {
            return;
        };

        let removed = group.exercises.remove(index);
        self.commit();
        self.release_images(removed.image_locator.into_iter().collect());
    }

    /// Reorder exercises inside one group
    ///
    /// The exercises at `from` end up as a block starting at `to`.
    /// Out-of-range indices are ignored and `to` is clamped.
    pub fn move_exercise(&mut self, from: &[usize], to: usize, group_id: Uuid) {
        let Some(group) = self.group_mut(group_id) else {
            return;
        };

        let before: Vec<Uuid> = group.exercises.iter().map(|e| e.id).collect();
        move_elements(&mut group.exercises, from, to);
        if group.exercises.iter().map(|e| e.id).eq(before) {
            return;
        }
        self.commit();
    }

    // ==================== Images ====================

    /// Save an image under a fresh locator and send it to the mirror
    pub fn store_image(&self, bytes: &[u8]) -> Locator {
        let locator = Locator::generate();
        self.assets.put(bytes, &locator);
        self.sender.transfer_asset(bytes, locator.as_str());
        locator
    }

    /// Image bytes for a locator, `None` when missing
    pub fn resolve_image(&self, locator: &Locator) -> Option<Arc<[u8]>> {
        self.assets.get(locator)
    }

    // ==================== Sync ====================

    /// Push the current collection again, e.g. after pairing
    ///
    /// Every image the collection refers to is sent again too, so a mirror
    /// that missed a transfer can fill the gap. Returns the outcome for the
    /// collection itself.
    pub fn resync(&self) -> SendOutcome {
        let outcome = self.sender.sync_collection(&self.groups);
        if outcome == SendOutcome::Skipped {
            return outcome;
        }

        let mut sent = 0;
        for locator in referenced_images(&self.groups) {
            let Some(bytes) = self.assets.get(locator) else {
                debug!("Image {} missing locally, not resent", locator);
                continue;
            };
            if self.sender.transfer_asset(&bytes, locator.as_str()) != SendOutcome::Failed {
                sent += 1;
            }
        }
        info!("Resynced collection and {} image(s)", sent);
        outcome
    }

    fn group_mut(&mut self, id: Uuid) -> Option<&mut WorkoutGroup> {
        self.groups.iter_mut().find(|g| g.id == id)
    }

    /// Persist, publish, then propagate the current collection
    fn commit(&mut self) {
        self.store.save(&self.groups);
        self.published.send_replace(Arc::new(self.groups.clone()));
        self.sender.sync_collection(&self.groups);
    }

    /// Delete image files no exercise refers to any more
    fn release_images(&self, candidates: Vec<Locator>) {
        for locator in candidates {
            let in_use = self
                .groups
                .iter()
                .flat_map(|g| &g.exercises)
                .any(|e| e.image_locator.as_ref() == Some(&locator));
            if !in_use {
                debug!("Releasing image {}", locator);
                self.assets.remove(&locator);
            }
        }
    }
}

/// Distinct image locators in collection order
fn referenced_images(groups: &[WorkoutGroup]) -> Vec<&Locator> {
    let mut locators: Vec<&Locator> = Vec::new();
    for locator in groups
        .iter()
        .flat_map(|g| &g.exercises)
        .filter_map(|e| e.image_locator.as_ref())
    {
        if !locators.contains(&locator) {
            locators.push(locator);
        }
    }
    locators
}

fn images_of(group: &WorkoutGroup) -> Vec<Locator> {
    group
        .exercises
        .iter()
        .filter_map(|e| e.image_locator.clone())
        .collect()
}
