//! Directory-backed link
//!
//! Both roles share a directory holding one file per context slot:
//! `collection.ctx` for the collection and `asset-<file name>.ctx` for each
//! image. Files are replaced atomically, so a reader sees either the
//! previous context or the new one. There is no live path: the link never
//! reports the peer as reachable, so every sync lands in a context file.
//!
//! Each file is a CBOR record carrying a fresh generation id. The inbox
//! remembers the last collection generation it handed out and skips it on
//! the next read. Image files are removed once handed out, since the mirror
//! keeps its own copy.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use super::link::{ActivationState, ContextSlot, Delivery, Inbox, LinkError, PeerLink};
use crate::models::Locator;
use crate::storage::files::{atomic_write, read_file, remove_file};
use crate::storage::{StorageError, StorageResult};

const CONTEXT_EXTENSION: &str = ".ctx";
const COLLECTION_FILE: &str = "collection.ctx";
const ASSET_PREFIX: &str = "asset-";

/// On-disk form of a context slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ContextRecord {
    generation: Uuid,
    written_at: DateTime<Utc>,
    #[serde(with = "serde_bytes")]
    payload: Vec<u8>,
}

impl ContextRecord {
    fn new(payload: Vec<u8>) -> Self {
        Self {
            generation: Uuid::new_v4(),
            written_at: Utc::now(),
            payload,
        }
    }

    fn encode(&self) -> StorageResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes).map_err(|e| StorageError::InvalidFormat {
            key: "context".to_string(),
            details: e.to_string(),
        })?;
        Ok(bytes)
    }

    fn decode(bytes: &[u8], path: &Path) -> StorageResult<Self> {
        ciborium::from_reader(bytes).map_err(|e| StorageError::InvalidFormat {
            key: path.display().to_string(),
            details: e.to_string(),
        })
    }
}

/// File for a slot, `None` when an image name cannot be a file name
fn slot_path(dir: &Path, slot: &ContextSlot) -> Option<PathBuf> {
    match slot {
        ContextSlot::Collection => Some(dir.join(COLLECTION_FILE)),
        ContextSlot::Asset(file_name) if Locator::is_valid_name(file_name) => Some(dir.join(
            format!("{}{}{}", ASSET_PREFIX, file_name, CONTEXT_EXTENSION),
        )),
        ContextSlot::Asset(_) => None,
    }
}

/// Slot a context file belongs to; other files in the directory are ignored
fn slot_for_file(file_name: &str) -> Option<ContextSlot> {
    if file_name == COLLECTION_FILE {
        return Some(ContextSlot::Collection);
    }
    let asset = file_name
        .strip_prefix(ASSET_PREFIX)?
        .strip_suffix(CONTEXT_EXTENSION)?;
    Locator::is_valid_name(asset).then(|| ContextSlot::asset(asset))
}

/// Every slot with a context file, collection first
fn list_slots(dir: &Path) -> Vec<ContextSlot> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to list link directory {:?}: {}", dir, e);
            }
            return Vec::new();
        }
    };

    let mut slots: Vec<ContextSlot> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| slot_for_file(&entry.file_name().to_string_lossy()))
        .collect();
    slots.sort();
    slots
}

/// Read a slot file; `Ok(None)` when nothing has been written yet
fn read_record(path: &Path) -> StorageResult<Option<ContextRecord>> {
    match read_file(path) {
        Ok(bytes) => ContextRecord::decode(&bytes, path).map(Some),
        Err(StorageError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Authoritative end of a directory link
pub struct DirectoryLink {
    dir: PathBuf,
    activation: watch::Sender<ActivationState>,
}

impl DirectoryLink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let (activation, _) = watch::channel(ActivationState::Inactive);
        Self {
            dir: dir.into(),
            activation,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Contexts written but not necessarily picked up, with their write time
    pub fn pending_contexts(&self) -> Vec<(ContextSlot, DateTime<Utc>)> {
        list_slots(&self.dir)
            .into_iter()
            .filter_map(|slot| {
                let path = slot_path(&self.dir, &slot)?;
                match read_record(&path) {
                    Ok(record) => record.map(|r| (slot, r.written_at)),
                    Err(e) => {
                        warn!("Unreadable {} context: {}", slot.name(), e);
                        None
                    }
                }
            })
            .collect()
    }
}

impl PeerLink for DirectoryLink {
    fn activate(&self) -> Result<(), LinkError> {
        fs::create_dir_all(&self.dir).map_err(|source| StorageError::CreateDirectory {
            path: self.dir.clone(),
            source,
        })?;
        self.activation.send_replace(ActivationState::Activated);
        debug!("Directory link activated at {:?}", self.dir);
        Ok(())
    }

    fn activation_state(&self) -> ActivationState {
        *self.activation.borrow()
    }

    fn subscribe_activation(&self) -> watch::Receiver<ActivationState> {
        self.activation.subscribe()
    }

    fn is_reachable(&self) -> bool {
        false
    }

    fn send_message(&self, _payload: Vec<u8>) -> Result<(), LinkError> {
        Err(LinkError::NotReachable)
    }

    fn update_context(&self, slot: ContextSlot, payload: Vec<u8>) -> Result<(), LinkError> {
        let path = slot_path(&self.dir, &slot).ok_or_else(|| LinkError::InvalidSlot(slot.name()))?;
        let record = ContextRecord::new(payload);
        let bytes = record.encode()?;
        atomic_write(&path, &bytes)?;
        debug!(
            "Wrote {} context {} ({} bytes)",
            slot.name(),
            record.generation,
            bytes.len()
        );
        Ok(())
    }
}

/// Mirror end of a directory link
pub struct DirectoryInbox {
    dir: PathBuf,
    seen: HashMap<ContextSlot, Uuid>,
}

impl DirectoryInbox {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            seen: HashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Inbox for DirectoryInbox {
    fn drain(&mut self) -> Vec<Delivery> {
        let mut out = Vec::new();

        for slot in list_slots(&self.dir) {
            let Some(path) = slot_path(&self.dir, &slot) else {
                continue;
            };
            let record = match read_record(&path) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Skipping {} context: {}", slot.name(), e);
                    continue;
                }
            };

            if self.seen.get(&slot) == Some(&record.generation) {
                continue;
            }

            debug!(
                "Picked up {} context {} written {}",
                slot.name(),
                record.generation,
                record.written_at
            );
            if let ContextSlot::Asset(_) = slot {
                if let Err(e) = remove_file(&path) {
                    warn!("Failed to remove {} context: {}", slot.name(), e);
                }
            }
            out.push(Delivery::context(slot.clone(), record.payload));
            self.seen.insert(slot, record.generation);
        }

        out
    }
}
