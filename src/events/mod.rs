//! Domain events and listener fan-out
//!
//! Two independent subscriber categories: group-lifecycle events and
//! contact/subscription events. Dispatch takes a snapshot of the
//! subscriber set under the lock, releases it, then invokes every
//! listener synchronously in registration order. A failing listener is
//! logged and never prevents delivery to the listeners after it.

use crate::domain::{Contact, Group, GroupId, ScreenName};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Group-lifecycle event kinds
#[derive(Debug, Clone)]
pub enum GroupEventKind {
    /// A group was materialized locally, with any contacts the server
    /// announced alongside it
    Created { group: Group, position: usize },

    /// A group (and implicitly its contacts) left the mirrored tree
    Removed { group: Group },

    /// A group's display name actually changed
    Renamed {
        id: GroupId,
        old_name: String,
        new_name: String,
    },

    /// The top-level group order was replaced
    Reordered { order: Vec<GroupId> },
}

/// A deduplicated group-lifecycle event
#[derive(Debug, Clone)]
pub struct GroupEvent {
    /// Process-wide monotonically increasing sequence number; lets a
    /// listener that already processed an event ignore a redelivery
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub kind: GroupEventKind,
}

/// Contact/subscription event kinds
#[derive(Debug, Clone)]
pub enum ContactEventKind {
    Created {
        group: GroupId,
        contact: Contact,
        position: usize,
    },
    Removed {
        group: GroupId,
        contact: Contact,
    },
    Reordered {
        group: GroupId,
        order: Vec<ScreenName>,
    },
}

/// A deduplicated contact/subscription event
#[derive(Debug, Clone)]
pub struct ContactEvent {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub kind: ContactEventKind,
}

/// Subscriber for group-lifecycle events
pub trait GroupListener: Send + Sync {
    fn handle(&self, event: &GroupEvent) -> anyhow::Result<()>;
}

/// Subscriber for contact/subscription events
pub trait ContactListener: Send + Sync {
    fn handle(&self, event: &ContactEvent) -> anyhow::Result<()>;
}

/// Thread-safe subscriber sets with snapshot-based fan-out.
///
/// The two sets are guarded by independent locks, held only for the
/// mutation or the snapshot copy and never nested, so a listener is free
/// to subscribe or unsubscribe from inside a dispatch.
pub struct ListenerRegistry {
    group_listeners: Mutex<Vec<Arc<dyn GroupListener>>>,
    contact_listeners: Mutex<Vec<Arc<dyn ContactListener>>>,
    seq: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            group_listeners: Mutex::new(Vec::new()),
            contact_listeners: Mutex::new(Vec::new()),
            seq: AtomicU64::new(0),
        }
    }

    pub fn subscribe_group(&self, listener: Arc<dyn GroupListener>) {
        self.group_listeners.lock().unwrap().push(listener);
    }

    /// Remove a group listener by identity; unknown listeners are ignored
    pub fn unsubscribe_group(&self, listener: &Arc<dyn GroupListener>) {
        self.group_listeners
            .lock()
            .unwrap()
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub fn subscribe_contact(&self, listener: Arc<dyn ContactListener>) {
        self.contact_listeners.lock().unwrap().push(listener);
    }

    pub fn unsubscribe_contact(&self, listener: &Arc<dyn ContactListener>) {
        self.contact_listeners
            .lock()
            .unwrap()
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Stamp and fan out a group event; returns it for callers that want
    /// the assigned sequence number
    pub fn dispatch_group(&self, kind: GroupEventKind) -> GroupEvent {
        let event = GroupEvent {
            seq: self.next_seq(),
            at: Utc::now(),
            kind,
        };
        trace!(seq = event.seq, "dispatching group event: {:?}", event.kind);

        let snapshot: Vec<_> = self.group_listeners.lock().unwrap().clone();
        for listener in snapshot {
            if let Err(e) = listener.handle(&event) {
                warn!(seq = event.seq, "group listener failed: {e:#}");
            }
        }
        event
    }

    /// Stamp and fan out a contact event
    pub fn dispatch_contact(&self, kind: ContactEventKind) -> ContactEvent {
        let event = ContactEvent {
            seq: self.next_seq(),
            at: Utc::now(),
            kind,
        };
        trace!(
            seq = event.seq,
            "dispatching contact event: {:?}",
            event.kind
        );

        let snapshot: Vec<_> = self.contact_listeners.lock().unwrap().clone();
        for listener in snapshot {
            if let Err(e) = listener.handle(&event) {
                warn!(seq = event.seq, "contact listener failed: {e:#}");
            }
        }
        event
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

enum QueuedEvent {
    Group(GroupEventKind),
    Contact(ContactEventKind),
}

/// FIFO queue for events synthesized off the ingest path.
///
/// Synthesized confirmations (the already-exists shortcut) must not run
/// on the requesting caller's thread, or a listener that issues new
/// requests would deadlock against itself. One queue drained by a single
/// task keeps delivery FIFO per subscriber.
pub struct DispatchQueue {
    tx: mpsc::UnboundedSender<QueuedEvent>,
}

impl DispatchQueue {
    /// Spawn the drain task; dropping the returned queue lets the task
    /// finish delivering whatever is already enqueued and exit
    pub fn start(registry: Arc<ListenerRegistry>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            while let Some(queued) = rx.recv().await {
                match queued {
                    QueuedEvent::Group(kind) => {
                        registry.dispatch_group(kind);
                    }
                    QueuedEvent::Contact(kind) => {
                        registry.dispatch_contact(kind);
                    }
                }
            }
            debug!("dispatch queue drained and stopped");
        });
        (Self { tx }, handle)
    }

    pub fn enqueue_group(&self, kind: GroupEventKind) {
        if self.tx.send(QueuedEvent::Group(kind)).is_err() {
            warn!("dispatch queue is stopped; dropping group event");
        }
    }

    pub fn enqueue_contact(&self, kind: ContactEventKind) {
        if self.tx.send(QueuedEvent::Contact(kind)).is_err() {
            warn!("dispatch queue is stopped; dropping contact event");
        }
    }
}
