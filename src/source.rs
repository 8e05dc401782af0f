//! Seam to the external authoritative source
//!
//! The wire protocol lives behind `RosterSource`: the engine forwards
//! mutation requests through it and receives low-level change
//! notifications back through `ChangeIngester::apply`. Requests are
//! fire-and-forget - a rejected request simply never echoes back as a
//! notification, and the local tree never reflects it.

use crate::domain::{GroupId, ScreenName};
use crate::ingest::ChangeIngester;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Handle to a remote group as carried by notifications
#[derive(Debug, Clone)]
pub struct RemoteGroup {
    pub id: GroupId,
    pub name: String,
}

/// Handle to a remote buddy as carried by notifications
#[derive(Debug, Clone)]
pub struct RemoteBuddy {
    pub screen_name: ScreenName,
    pub alias: Option<String>,
}

impl RemoteBuddy {
    pub fn new(screen_name: &str, alias: Option<&str>) -> Self {
        Self {
            screen_name: ScreenName::new(screen_name),
            alias: alias.map(str::to_string),
        }
    }
}

/// One low-level change notification from the authoritative source.
///
/// Insertions carry the full sibling order as the source currently
/// declares it; the order may reference entries the engine has not been
/// told about yet.
#[derive(Debug, Clone)]
pub enum ListChange {
    GroupAdded {
        group: RemoteGroup,
        /// Declared top-level order, including the new group
        global_order: Vec<GroupId>,
        /// Buddies already members of the group when it was announced
        buddies: Vec<RemoteBuddy>,
    },
    GroupRemoved {
        id: GroupId,
    },
    GroupRenamed {
        id: GroupId,
        /// The source's current name for the group; renames that carry
        /// no actual change are expected and suppressed
        new_name: String,
    },
    GroupsReordered {
        new_order: Vec<GroupId>,
    },
    BuddyAdded {
        group: GroupId,
        /// Declared contact order within the group, including the new buddy
        global_order: Vec<ScreenName>,
        buddy: RemoteBuddy,
    },
    BuddyRemoved {
        group: GroupId,
        screen_name: ScreenName,
    },
    BuddiesReordered {
        group: GroupId,
        new_order: Vec<ScreenName>,
    },
}

/// Errors surfaced by the source when a forwarded request cannot even be
/// submitted. Asynchronous rejections after submission are invisible to
/// this engine by design.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("source rejected the request: {0}")]
    Rejected(String),

    #[error("source is not connected")]
    Disconnected,
}

/// The external system of record for group/contact existence and order
#[async_trait]
pub trait RosterSource: Send + Sync {
    /// One-time binding: deliver the retroactive snapshot of the server
    /// list into `ingester`, notification by notification, then return.
    /// The engine treats the return as the end of the first full
    /// enumeration.
    async fn start(&self, ingester: Arc<ChangeIngester>) -> Result<(), SourceError>;

    /// Request addition of a buddy under a group
    async fn add_buddy(&self, group: GroupId, screen_name: &ScreenName)
        -> Result<(), SourceError>;

    /// Request creation of a new server-stored group
    async fn create_group(&self, name: &str) -> Result<(), SourceError>;

    /// Request removal of a group and its buddies
    async fn delete_group(&self, group: GroupId) -> Result<(), SourceError>;

    /// Request a group rename
    async fn rename_group(&self, group: GroupId, new_name: &str) -> Result<(), SourceError>;

    /// Request moving a buddy under a different group
    async fn move_buddy(
        &self,
        screen_name: &ScreenName,
        new_parent: GroupId,
    ) -> Result<(), SourceError>;

    /// Register interest in a buddy's property changes
    async fn track_buddy(&self, screen_name: &ScreenName) -> Result<(), SourceError>;

    /// Drop interest in a buddy's property changes
    async fn untrack_buddy(&self, screen_name: &ScreenName) -> Result<(), SourceError>;
}
