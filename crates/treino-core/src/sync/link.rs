//! Link between the two devices
//!
//! A link offers two ways to move bytes to the peer:
//!
//! - **Message**: immediate and best-effort, only while the peer is
//!   reachable. At most once, no reply.
//! - **Context**: a durable cell per [`ContextSlot`] holding only the most
//!   recent payload. The peer picks up the latest value when it next checks
//!   in; older values are replaced, never queued.
//!
//! The sending side implements [`PeerLink`]; the receiving side implements
//! [`Inbox`].

use tokio::sync::watch;

use thiserror::Error;

use crate::storage::StorageError;

/// Link activation lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    /// Not activated yet, or the peer went away
    Inactive,
    /// Ready to deliver
    Activated,
}

/// Independent latest-value cells on a link
///
/// The collection has one cell. Each image has its own cell keyed by file
/// name, so an image transfer never replaces a pending collection snapshot
/// or another pending image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContextSlot {
    Collection,
    Asset(String),
}

impl ContextSlot {
    pub fn asset(file_name: impl Into<String>) -> Self {
        ContextSlot::Asset(file_name.into())
    }

    /// Payload kind carried by the slot
    pub fn kind(&self) -> &'static str {
        match self {
            ContextSlot::Collection => "collection",
            ContextSlot::Asset(_) => "asset",
        }
    }

    /// Display name, e.g. `collection` or `asset:squat.jpg`
    pub fn name(&self) -> String {
        match self {
            ContextSlot::Collection => "collection".to_string(),
            ContextSlot::Asset(file_name) => format!("asset:{}", file_name),
        }
    }
}

/// Errors from link operations
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Peer is not reachable")]
    NotReachable,

    #[error("Link is closed")]
    Closed,

    #[error("Invalid context slot: {0}")]
    InvalidSlot(String),

    #[error("Link storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Sending side of a link
///
/// All operations are non-blocking so callers never wait on the peer.
pub trait PeerLink: Send + Sync {
    /// Start activation; completion is reported through
    /// [`PeerLink::subscribe_activation`]
    fn activate(&self) -> Result<(), LinkError>;

    fn activation_state(&self) -> ActivationState;

    /// Watch activation state changes
    fn subscribe_activation(&self) -> watch::Receiver<ActivationState>;

    /// Whether the peer is live right now
    fn is_reachable(&self) -> bool;

    /// Best-effort immediate delivery
    fn send_message(&self, payload: Vec<u8>) -> Result<(), LinkError>;

    /// Replace the latest context in `slot`
    fn update_context(&self, slot: ContextSlot, payload: Vec<u8>) -> Result<(), LinkError>;
}

/// How a payload reached the receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryMode {
    Message,
    Context(ContextSlot),
}

/// A payload handed to the receiving side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub mode: DeliveryMode,
    pub payload: Vec<u8>,
}

impl Delivery {
    pub fn message(payload: Vec<u8>) -> Self {
        Self {
            mode: DeliveryMode::Message,
            payload,
        }
    }

    pub fn context(slot: ContextSlot, payload: Vec<u8>) -> Self {
        Self {
            mode: DeliveryMode::Context(slot),
            payload,
        }
    }
}

/// Receiving side of a link
pub trait Inbox {
    /// Everything delivered since the last call, without waiting
    ///
    /// Each context slot yields at most its latest unseen value, the
    /// collection slot first.
    fn drain(&mut self) -> Vec<Delivery>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_names() {
        assert_eq!(ContextSlot::Collection.name(), "collection");
        assert_eq!(ContextSlot::asset("row.jpg").name(), "asset:row.jpg");
        assert_eq!(ContextSlot::asset("row.jpg").kind(), "asset");
    }

    #[test]
    fn test_collection_slot_sorts_first() {
        let mut slots = vec![
            ContextSlot::asset("b.jpg"),
            ContextSlot::Collection,
            ContextSlot::asset("a.jpg"),
        ];
        slots.sort();
        assert_eq!(
            slots,
            vec![
                ContextSlot::Collection,
                ContextSlot::asset("a.jpg"),
                ContextSlot::asset("b.jpg")
            ]
        );
    }

    #[test]
    fn test_delivery_constructors() {
        let d = Delivery::context(ContextSlot::asset("a.jpg"), vec![1, 2]);
        assert_eq!(d.mode, DeliveryMode::Context(ContextSlot::asset("a.jpg")));
        assert_eq!(Delivery::message(vec![]).mode, DeliveryMode::Message);
    }
}
