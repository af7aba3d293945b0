//! Sync between the authoritative device and its mirror
//!
//! The authoritative device owns the workout collection and pushes full
//! snapshots (and images) to a read-only mirror.
//!
//! ## Flow
//!
//! 1. A mutation calls [`SyncSender::sync_collection`]
//! 2. The sender encodes a [`SyncPayload`] and hands it to a [`PeerLink`]:
//!    as a message when the peer is live, otherwise into the latest context
//!    for its [`ContextSlot`]
//! 3. On the mirror, [`SyncReceiver`] drains an [`Inbox`] and publishes the
//!    newest snapshot
//!
//! ## Links
//!
//! - [`memory::pair`]: in-process, for embedding and tests
//! - [`DirectoryLink`] / [`DirectoryInbox`]: context files in a shared
//!   directory, used by the CLI

mod directory;
mod link;
pub mod memory;
pub mod payload;
mod receiver;
mod sender;
mod stats;

pub use directory::{DirectoryInbox, DirectoryLink};
pub use link::{ActivationState, ContextSlot, Delivery, DeliveryMode, Inbox, LinkError, PeerLink};
pub use memory::{MemoryInbox, MemoryLink};
pub use payload::{PayloadError, SyncPayload};
pub use receiver::{ApplyOutcome, Snapshot, SyncReceiver};
pub use sender::{SendOutcome, SyncSender};
pub use stats::{ReceiverStats, SenderStats};
