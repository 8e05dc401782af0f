//! ChangeIngester - applies source notifications to the mirror
//!
//! One notification is applied fully before the next is accepted: every
//! handler takes the single-writer tree lock for its whole
//! read-modify-write, then releases it before fanning the resulting
//! domain event out to listeners. Lookup misses that are expected under
//! eventual consistency (late or duplicate notifications) are logged and
//! swallowed; the mirror self-heals on the next consistent snapshot.

use crate::domain::{Contact, Group, GroupId, ScreenName};
use crate::events::{ContactEventKind, GroupEventKind, ListenerRegistry};
use crate::ordering::resolve_insert_index;
use crate::source::{ListChange, RemoteBuddy, RemoteGroup, RosterSource};
use crate::tree::{MirrorTree, TreeError};
use std::sync::{Arc, OnceLock, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, error, trace, warn};

/// Lifecycle of a mirrored session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No source bound yet
    Uninitialized,
    /// The source is delivering its retroactive snapshot. Nothing is
    /// buffered; notifications are applied immediately in every phase.
    Syncing,
    /// First full enumeration complete
    Live,
}

/// Applies one `ListChange` at a time to the mirrored tree and fans the
/// corresponding domain event out through the registry
pub struct ChangeIngester {
    tree: Arc<Mutex<MirrorTree>>,
    listeners: Arc<ListenerRegistry>,
    source: OnceLock<Arc<dyn RosterSource>>,
    phase: RwLock<SyncPhase>,
    track_presence: bool,
    suppress_noop_renames: bool,
}

impl ChangeIngester {
    pub(crate) fn new(
        tree: Arc<Mutex<MirrorTree>>,
        listeners: Arc<ListenerRegistry>,
        config: &crate::config::RosterConfig,
    ) -> Self {
        Self {
            tree,
            listeners,
            source: OnceLock::new(),
            phase: RwLock::new(SyncPhase::Uninitialized),
            track_presence: config.track_presence,
            suppress_noop_renames: config.suppress_noop_renames,
        }
    }

    /// Current phase of the mirrored session (diagnostic only)
    pub fn phase(&self) -> SyncPhase {
        *self.phase.read().unwrap()
    }

    pub(crate) fn set_phase(&self, phase: SyncPhase) {
        *self.phase.write().unwrap() = phase;
    }

    pub(crate) fn bind_source(&self, source: Arc<dyn RosterSource>) -> bool {
        self.source.set(source).is_ok()
    }

    /// Apply one notification from the authoritative source.
    ///
    /// Never fails: protocol-level inconsistencies are logged and the
    /// affected change dropped, leaving the prior state intact.
    pub async fn apply(&self, change: ListChange) {
        match change {
            ListChange::GroupAdded {
                group,
                global_order,
                buddies,
            } => self.on_group_added(group, global_order, buddies).await,
            ListChange::GroupRemoved { id } => self.on_group_removed(id).await,
            ListChange::GroupRenamed { id, new_name } => self.on_group_renamed(id, new_name).await,
            ListChange::GroupsReordered { new_order } => self.on_groups_reordered(new_order).await,
            ListChange::BuddyAdded {
                group,
                global_order,
                buddy,
            } => self.on_buddy_added(group, global_order, buddy).await,
            ListChange::BuddyRemoved { group, screen_name } => {
                self.on_buddy_removed(group, screen_name).await
            }
            ListChange::BuddiesReordered { group, new_order } => {
                self.on_buddies_reordered(group, new_order).await
            }
        }
    }

    async fn on_group_added(
        &self,
        remote: RemoteGroup,
        global_order: Vec<GroupId>,
        buddies: Vec<RemoteBuddy>,
    ) {
        trace!(group = %remote.id, name = remote.name, "group added: {} buddies", buddies.len());

        let (snapshot, position) = {
            let mut tree = self.tree.lock().await;

            let declared_index = global_order
                .iter()
                .position(|id| *id == remote.id)
                .unwrap_or_else(|| {
                    debug!(group = %remote.id, "group missing from its own declared order");
                    0
                });
            let position = resolve_insert_index(&global_order, declared_index, |id| {
                tree.find_group_index(*id)
            });

            let position = match tree.insert_group(position, Group::new(remote.id, remote.name)) {
                Ok(position) => position,
                Err(e) => {
                    // duplicate identity here means the source re-announced a
                    // group we already hold; a sequencing bug worth investigating
                    error!(group = %remote.id, "dropping group addition: {e}");
                    return;
                }
            };

            // children present at creation time go through the same
            // insertion path as a buddy notification so they are not lost
            for (index, buddy) in buddies.iter().enumerate() {
                let contact = Contact::new(buddy.screen_name.clone(), buddy.alias.clone());
                if let Err(e) = tree.insert_contact(remote.id, index, contact) {
                    warn!(group = %remote.id, "skipping announced buddy: {e}");
                }
            }

            // insert_group guarantees the group is present
            let snapshot = tree
                .find_group(remote.id)
                .cloned()
                .expect("group inserted above");
            (snapshot, position)
        };

        for buddy in &buddies {
            self.track_buddy(&buddy.screen_name).await;
        }

        self.listeners.dispatch_group(GroupEventKind::Created {
            group: snapshot,
            position,
        });
    }

    async fn on_group_removed(&self, id: GroupId) {
        let removed = {
            let mut tree = self.tree.lock().await;
            match tree.remove_group(id) {
                Ok(group) => group,
                Err(TreeError::NotFound(_)) => {
                    // late or duplicate notification for a group already gone
                    debug!(group = %id, "removal of unknown group ignored");
                    return;
                }
                Err(e) => {
                    error!(group = %id, "dropping group removal: {e}");
                    return;
                }
            }
        };

        // one GroupRemoved covers the group's contacts; no per-contact events
        self.listeners
            .dispatch_group(GroupEventKind::Removed { group: removed });
    }

    async fn on_group_renamed(&self, id: GroupId, new_name: String) {
        let old_name = {
            let mut tree = self.tree.lock().await;
            let Some(group) = tree.find_group_mut(id) else {
                debug!(group = %id, "rename of unknown group ignored");
                return;
            };

            // the source fires rename notifications that carry no actual
            // change; the snapshot comparison filters them out
            if self.suppress_noop_renames && group.name_snapshot() == new_name {
                trace!(group = %id, name = new_name, "group name unchanged, suppressing");
                return;
            }

            let old_name = group.name_snapshot().to_string();
            group.commit_name(&new_name);
            old_name
        };

        self.listeners.dispatch_group(GroupEventKind::Renamed {
            id,
            old_name,
            new_name,
        });
    }

    async fn on_groups_reordered(&self, new_order: Vec<GroupId>) {
        let applied = {
            let mut tree = self.tree.lock().await;
            match tree.reorder_root(&new_order) {
                Ok(applied) => applied,
                Err(e) => {
                    warn!("dropping inconsistent group reorder: {e}");
                    return;
                }
            }
        };

        self.listeners
            .dispatch_group(GroupEventKind::Reordered { order: applied });
    }

    async fn on_buddy_added(&self, group: GroupId, global_order: Vec<ScreenName>, buddy: RemoteBuddy) {
        let (contact, position) = {
            let mut tree = self.tree.lock().await;
            let Some(parent) = tree.find_group(group) else {
                // cannot be routed; the group may arrive later
                debug!(group = %group, buddy = %buddy.screen_name, "no parent group for buddy");
                return;
            };

            let declared_index = global_order
                .iter()
                .position(|sn| *sn == buddy.screen_name)
                .unwrap_or_else(|| {
                    debug!(buddy = %buddy.screen_name, "buddy missing from its own declared order");
                    0
                });
            let position = resolve_insert_index(&global_order, declared_index, |sn| {
                parent.find_contact_index(sn)
            });

            let contact = Contact::new(buddy.screen_name.clone(), buddy.alias.clone());
            let position = match tree.insert_contact(group, position, contact.clone()) {
                Ok(position) => position,
                Err(e) => {
                    error!(group = %group, buddy = %buddy.screen_name, "dropping buddy addition: {e}");
                    return;
                }
            };
            (contact, position)
        };

        self.track_buddy(&contact.screen_name).await;

        self.listeners.dispatch_contact(ContactEventKind::Created {
            group,
            contact,
            position,
        });
    }

    async fn on_buddy_removed(&self, group: GroupId, screen_name: ScreenName) {
        let removed = {
            let mut tree = self.tree.lock().await;
            match tree.remove_contact(group, &screen_name) {
                Ok(contact) => contact,
                Err(TreeError::NotFound(missing)) => {
                    debug!(group = %group, buddy = %screen_name, "removal of unknown contact ignored: {missing}");
                    return;
                }
                Err(e) => {
                    error!(group = %group, buddy = %screen_name, "dropping buddy removal: {e}");
                    return;
                }
            }
        };

        self.untrack_buddy(&screen_name).await;

        self.listeners.dispatch_contact(ContactEventKind::Removed {
            group,
            contact: removed,
        });
    }

    async fn on_buddies_reordered(&self, group: GroupId, new_order: Vec<ScreenName>) {
        let applied = {
            let mut tree = self.tree.lock().await;
            match tree.reorder_children(group, &new_order) {
                Ok(applied) => applied,
                Err(TreeError::NotFound(missing)) => {
                    debug!(group = %group, "reorder for unknown group ignored: {missing}");
                    return;
                }
                Err(e) => {
                    warn!(group = %group, "dropping inconsistent contact reorder: {e}");
                    return;
                }
            }
        };

        self.listeners.dispatch_contact(ContactEventKind::Reordered {
            group,
            order: applied,
        });
    }

    async fn track_buddy(&self, screen_name: &ScreenName) {
        if !self.track_presence {
            return;
        }
        if let Some(source) = self.source.get() {
            if let Err(e) = source.track_buddy(screen_name).await {
                debug!(buddy = %screen_name, "property tracking registration failed: {e}");
            }
        }
    }

    async fn untrack_buddy(&self, screen_name: &ScreenName) {
        if !self.track_presence {
            return;
        }
        if let Some(source) = self.source.get() {
            if let Err(e) = source.untrack_buddy(screen_name).await {
                debug!(buddy = %screen_name, "property tracking removal failed: {e}");
            }
        }
    }
}
