//! roster-core
//!
//! Mirror-and-notify engine for a server-stored buddy list: keeps a
//! local, observable copy of the remote two-level tree (groups of
//! contacts) and converts the source's low-level, possibly out-of-order
//! change notifications into a small set of deduplicated domain events.
//!
//! The remote source is always authoritative: local mutation requests
//! are forwarded through [`source::RosterSource`] and only take effect
//! once echoed back as a notification into [`ingest::ChangeIngester`].

pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod ingest;
pub mod logging;
pub mod ordering;
pub mod source;
pub mod tree;

pub use config::RosterConfig;
pub use domain::{Contact, Group, GroupId, RootGroup, ScreenName};
pub use error::{Result, RosterError};
pub use events::{
    ContactEvent, ContactEventKind, ContactListener, GroupEvent, GroupEventKind, GroupListener,
};
pub use ingest::{ChangeIngester, SyncPhase};
pub use source::{ListChange, RemoteBuddy, RemoteGroup, RosterSource};

use crate::events::{DispatchQueue, ListenerRegistry};
use crate::tree::MirrorTree;
use std::sync::{Arc, Mutex as StdMutex, OnceLock};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The main context for one mirrored buddy list.
///
/// Owns the tree, the listener registry, and the dispatch queue; exposes
/// subscription, read-only traversal, and the outward mutation facade.
/// Created once per mirrored session and discarded whole when the
/// session ends.
pub struct RosterMirror {
    config: RosterConfig,

    /// Single-writer lock over the mirrored tree; every ingestion
    /// handler holds it for its whole read-modify-write
    tree: Arc<Mutex<MirrorTree>>,

    /// Subscriber sets for the two event categories
    listeners: Arc<ListenerRegistry>,

    /// Callback surface handed to the external source
    ingester: Arc<ChangeIngester>,

    /// Bound authoritative source, set once by `initialize`
    source: OnceLock<Arc<dyn RosterSource>>,

    /// FIFO queue for synthesized confirmations, live between
    /// `initialize` and `shutdown`
    queue: StdMutex<Option<(DispatchQueue, JoinHandle<()>)>>,
}

impl RosterMirror {
    /// Create an engine with no source bound yet
    pub fn new(config: RosterConfig) -> Self {
        let tree = Arc::new(Mutex::new(MirrorTree::new()));
        let listeners = Arc::new(ListenerRegistry::new());
        let ingester = Arc::new(ChangeIngester::new(tree.clone(), listeners.clone(), &config));
        Self {
            config,
            tree,
            listeners,
            ingester,
            source: OnceLock::new(),
            queue: StdMutex::new(None),
        }
    }

    /// One-time binding to the authoritative source.
    ///
    /// Starts the dispatch queue, then asks the source to deliver its
    /// retroactive snapshot into the ingester; the engine is `Live` once
    /// that first full enumeration returns.
    pub async fn initialize(&self, source: Arc<dyn RosterSource>) -> Result<()> {
        if self.source.set(source.clone()).is_err() {
            return Err(RosterError::AlreadyInitialized);
        }
        self.ingester.bind_source(source.clone());

        let (queue, task) = DispatchQueue::start(self.listeners.clone());
        *self.queue.lock().unwrap() = Some((queue, task));

        info!("Binding roster source, requesting initial enumeration");
        self.ingester.set_phase(SyncPhase::Syncing);
        if let Err(e) = source.start(self.ingester.clone()).await {
            self.ingester.set_phase(SyncPhase::Uninitialized);
            return Err(e.into());
        }
        self.ingester.set_phase(SyncPhase::Live);

        let groups = self.tree.lock().await.group_count();
        info!(groups, "Roster mirror is live");
        Ok(())
    }

    /// Callback surface for the external source to push notifications
    pub fn ingester(&self) -> Arc<ChangeIngester> {
        self.ingester.clone()
    }

    /// Current lifecycle phase of the mirrored session
    pub fn phase(&self) -> SyncPhase {
        self.ingester.phase()
    }

    pub fn config(&self) -> &RosterConfig {
        &self.config
    }

    // ---- subscriptions ------------------------------------------------

    pub fn subscribe_group_listener(&self, listener: Arc<dyn GroupListener>) {
        self.listeners.subscribe_group(listener);
    }

    pub fn unsubscribe_group_listener(&self, listener: &Arc<dyn GroupListener>) {
        self.listeners.unsubscribe_group(listener);
    }

    pub fn subscribe_contact_listener(&self, listener: Arc<dyn ContactListener>) {
        self.listeners.subscribe_contact(listener);
    }

    pub fn unsubscribe_contact_listener(&self, listener: &Arc<dyn ContactListener>) {
        self.listeners.unsubscribe_contact(listener);
    }

    // ---- read-only traversal ------------------------------------------
    //
    // Reads lock, clone the requested nodes, and release; callers never
    // hold references into the live tree and never observe a
    // half-applied mutation.

    /// Snapshot of the top-level groups (with their contacts) in
    /// current local order
    pub async fn root_snapshot(&self) -> Vec<Group> {
        self.tree.lock().await.groups().to_vec()
    }

    pub async fn find_group(&self, id: GroupId) -> Option<Group> {
        self.tree.lock().await.find_group(id).cloned()
    }

    /// Locate a contact anywhere in the tree, returning its owning group id
    pub async fn find_contact(&self, screen_name: &ScreenName) -> Option<(GroupId, Contact)> {
        self.tree
            .lock()
            .await
            .find_contact(screen_name)
            .map(|(owner, contact)| (owner, contact.clone()))
    }

    pub async fn group_count(&self) -> usize {
        self.tree.lock().await.group_count()
    }

    // ---- mutation facade ----------------------------------------------
    //
    // Requests are forwarded to the source fire-and-forget; the local
    // tree only changes when the confirmation arrives back through the
    // ingester. The one exception is the already-exists shortcut, which
    // synthesizes its confirmation through the dispatch queue.

    /// Request a new contact under the default location (the first
    /// top-level group)
    pub async fn request_add_contact(&self, screen_name: &str) -> Result<()> {
        let parent = {
            let tree = self.tree.lock().await;
            tree.first_group_id().ok_or_else(|| {
                warn!(screen_name, "no group to place the new contact under");
                RosterError::NoParentGroup
            })?
        };
        self.request_add_contact_in(parent, screen_name).await
    }

    /// Request a new contact under `parent`.
    ///
    /// If the identity already exists anywhere in the tree, no request
    /// goes to the source; a `ContactCreated` confirmation is synthesized
    /// through the dispatch queue instead, so callers observe a uniform
    /// notification either way - and never on their own call path.
    pub async fn request_add_contact_in(&self, parent: GroupId, screen_name: &str) -> Result<()> {
        let screen_name = ScreenName::new(screen_name);

        let existing = {
            let tree = self.tree.lock().await;
            match tree.find_contact(&screen_name) {
                Some((owner, contact)) => {
                    let position = tree
                        .find_group(owner)
                        .and_then(|g| g.find_contact_index(&screen_name))
                        .unwrap_or(0);
                    Some((owner, contact.clone(), position))
                }
                None => {
                    if tree.find_group(parent).is_none() {
                        return Err(RosterError::InvalidTarget(parent.to_string()));
                    }
                    None
                }
            }
        };

        if let Some((owner, contact, position)) = existing {
            debug!(buddy = %screen_name, "contact already mirrored, synthesizing confirmation");
            let queue = self.queue.lock().unwrap();
            let (queue, _) = queue.as_ref().ok_or(RosterError::NotInitialized)?;
            queue.enqueue_contact(ContactEventKind::Created {
                group: owner,
                contact,
                position,
            });
            return Ok(());
        }

        let source = self.source.get().ok_or(RosterError::NotInitialized)?;
        if let Err(e) = source.add_buddy(parent, &screen_name).await {
            warn!(buddy = %screen_name, "contact creation not accepted by source: {e}");
        }
        Ok(())
    }

    /// Request creation of a new server-stored group
    pub async fn request_create_group(&self, name: &str) -> Result<()> {
        let source = self.source.get().ok_or(RosterError::NotInitialized)?;
        if let Err(e) = source.create_group(name).await {
            warn!(name, "group creation not accepted by source: {e}");
        }
        Ok(())
    }

    /// Request removal of a group and its buddies
    pub async fn request_remove_group(&self, group: GroupId) -> Result<()> {
        if self.tree.lock().await.find_group(group).is_none() {
            return Err(RosterError::InvalidTarget(group.to_string()));
        }
        let source = self.source.get().ok_or(RosterError::NotInitialized)?;
        if let Err(e) = source.delete_group(group).await {
            warn!(group = %group, "group removal not accepted by source: {e}");
        }
        Ok(())
    }

    /// Request a group rename
    pub async fn request_rename_group(&self, group: GroupId, new_name: &str) -> Result<()> {
        if self.tree.lock().await.find_group(group).is_none() {
            return Err(RosterError::InvalidTarget(group.to_string()));
        }
        let source = self.source.get().ok_or(RosterError::NotInitialized)?;
        if let Err(e) = source.rename_group(group, new_name).await {
            warn!(group = %group, "group rename not accepted by source: {e}");
        }
        Ok(())
    }

    /// Request moving a contact under a different group
    pub async fn request_move_contact(&self, screen_name: &str, new_parent: GroupId) -> Result<()> {
        let screen_name = ScreenName::new(screen_name);
        {
            let tree = self.tree.lock().await;
            if tree.find_contact(&screen_name).is_none() {
                return Err(RosterError::InvalidTarget(screen_name.to_string()));
            }
            if tree.find_group(new_parent).is_none() {
                return Err(RosterError::InvalidTarget(new_parent.to_string()));
            }
        }
        let source = self.source.get().ok_or(RosterError::NotInitialized)?;
        if let Err(e) = source.move_buddy(&screen_name, new_parent).await {
            warn!(buddy = %screen_name, "contact move not accepted by source: {e}");
        }
        Ok(())
    }

    /// End the mirrored session: drain and stop the dispatch queue, then
    /// discard the whole tree atomically
    pub async fn shutdown(&self) {
        info!("Shutting down roster mirror");

        let stopped = self.queue.lock().unwrap().take();
        if let Some((queue, task)) = stopped {
            drop(queue);
            if let Err(e) = task.await {
                warn!("dispatch queue task ended abnormally: {e}");
            }
        }

        self.tree.lock().await.clear();
        self.ingester.set_phase(SyncPhase::Uninitialized);
    }
}
