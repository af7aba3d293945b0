//! In-process link
//!
//! [`pair`] connects a [`MemoryLink`] (authoritative side) to a
//! [`MemoryInbox`] (mirror side) inside one process. Messages travel over an
//! unbounded queue. Contexts live in a shared map holding the latest unread
//! value per slot; a `watch` counter wakes the inbox when one is written.
//! The mirror side decides whether it is reachable.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, watch};
use tracing::debug;

use super::link::{ActivationState, ContextSlot, Delivery, Inbox, LinkError, PeerLink};

/// Unread contexts, shared by both ends
type ContextCells = Arc<Mutex<BTreeMap<ContextSlot, Vec<u8>>>>;

fn lock_cells(cells: &ContextCells) -> MutexGuard<'_, BTreeMap<ContextSlot, Vec<u8>>> {
    cells.lock().unwrap_or_else(|e| e.into_inner())
}

/// Create a connected link/inbox pair
///
/// The link starts inactive and the peer starts unreachable.
pub fn pair() -> (MemoryLink, MemoryInbox) {
    let (message_tx, message_rx) = mpsc::unbounded_channel();
    let (activation_tx, _) = watch::channel(ActivationState::Inactive);
    let (written_tx, written_rx) = watch::channel(0u64);
    let reachable = Arc::new(AtomicBool::new(false));
    let contexts = ContextCells::default();

    let link = MemoryLink {
        messages: message_tx,
        contexts: Arc::clone(&contexts),
        written: written_tx,
        activation: activation_tx,
        reachable: Arc::clone(&reachable),
    };
    let inbox = MemoryInbox {
        messages: Some(message_rx),
        contexts,
        written: Some(written_rx),
        reachable,
    };

    (link, inbox)
}

/// Authoritative end of an in-process link
pub struct MemoryLink {
    messages: mpsc::UnboundedSender<Vec<u8>>,
    contexts: ContextCells,
    written: watch::Sender<u64>,
    activation: watch::Sender<ActivationState>,
    reachable: Arc<AtomicBool>,
}

impl MemoryLink {
    /// Simulate the pairing going away
    pub fn deactivate(&self) {
        self.activation.send_replace(ActivationState::Inactive);
    }

    fn peer_gone(&self) -> bool {
        self.messages.is_closed()
    }
}

impl PeerLink for MemoryLink {
    fn activate(&self) -> Result<(), LinkError> {
        if self.peer_gone() {
            return Err(LinkError::Closed);
        }
        self.activation.send_replace(ActivationState::Activated);
        debug!("Memory link activated");
        Ok(())
    }

    fn activation_state(&self) -> ActivationState {
        *self.activation.borrow()
    }

    fn subscribe_activation(&self) -> watch::Receiver<ActivationState> {
        self.activation.subscribe()
    }

    fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst) && !self.peer_gone()
    }

    fn send_message(&self, payload: Vec<u8>) -> Result<(), LinkError> {
        if !self.is_reachable() {
            return Err(LinkError::NotReachable);
        }
        self.messages.send(payload).map_err(|_| LinkError::Closed)
    }

    fn update_context(&self, slot: ContextSlot, payload: Vec<u8>) -> Result<(), LinkError> {
        lock_cells(&self.contexts).insert(slot, payload);
        self.written.send_modify(|count| *count += 1);
        Ok(())
    }
}

/// Mirror end of an in-process link
pub struct MemoryInbox {
    messages: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
    contexts: ContextCells,
    written: Option<watch::Receiver<u64>>,
    reachable: Arc<AtomicBool>,
}

impl MemoryInbox {
    /// Mark the mirror as live (app in the foreground) or not
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    /// Wait for the next delivery
    ///
    /// Returns `None` once the link end has been dropped and everything
    /// pending has been handed out.
    pub async fn recv(&mut self) -> Option<Delivery> {
        loop {
            if let Some(delivery) = self.next_pending() {
                return Some(delivery);
            }

            let has_messages = self.messages.is_some();
            let has_contexts = self.written.is_some();
            let messages = self.messages.as_mut();
            let written = self.written.as_mut();

            tokio::select! {
                msg = async move { messages?.recv().await }, if has_messages => {
                    match msg {
                        Some(payload) => return Some(Delivery::message(payload)),
                        None => self.messages = None,
                    }
                }
                changed = async move { written?.changed().await.ok() }, if has_contexts => {
                    if changed.is_none() {
                        self.written = None;
                    }
                }
                else => return None,
            }
        }
    }

    /// One pending delivery: unread contexts first, then queued messages
    fn next_pending(&mut self) -> Option<Delivery> {
        if let Some((slot, payload)) = lock_cells(&self.contexts).pop_first() {
            return Some(Delivery::context(slot, payload));
        }
        self.messages
            .as_mut()
            .and_then(|rx| rx.try_recv().ok())
            .map(Delivery::message)
    }
}

impl Inbox for MemoryInbox {
    fn drain(&mut self) -> Vec<Delivery> {
        let mut out = Vec::new();
        while let Some(delivery) = self.next_pending() {
            out.push(delivery);
        }
        out
    }
}
