//! MirrorTree - the owned in-memory copy of the server roster
//!
//! Pure data plus structural invariants: no I/O, no locking, no event
//! dispatch. Callers (the ingester) serialize access; every operation
//! here is a plain read-modify-write on owned data.

pub mod error;

pub use error::{Result, TreeError};

use crate::domain::{Contact, Group, GroupId, RootGroup, ScreenName};
use std::collections::HashSet;
use tracing::trace;

/// Local mirror of the remote buddy list: a root group owning the
/// ordered sequence of top-level groups, each owning its contacts.
///
/// Invariants:
/// - no two groups share a `GroupId`
/// - no two contacts anywhere in the tree share a `ScreenName`
/// - child order is always a locally materialized view of server order
#[derive(Debug, Clone, Default)]
pub struct MirrorTree {
    root: RootGroup,
}

impl MirrorTree {
    pub fn new() -> Self {
        Self {
            root: RootGroup::new(),
        }
    }

    pub fn root(&self) -> &RootGroup {
        &self.root
    }

    pub fn groups(&self) -> &[Group] {
        self.root.groups()
    }

    pub fn group_count(&self) -> usize {
        self.root.group_count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.group_count() == 0
    }

    /// Identity of the first top-level group, the default parent for
    /// contact creation requests that name no group
    pub fn first_group_id(&self) -> Option<GroupId> {
        self.root.groups().first().map(|g| g.id)
    }

    /// Insert `group` at `position` (clamped to `[0, len]`); returns the
    /// index actually used
    pub fn insert_group(&mut self, position: usize, group: Group) -> Result<usize> {
        if self.find_group(group.id).is_some() {
            return Err(TreeError::DuplicateIdentity(group.id.to_string()));
        }
        let groups = self.root.groups_mut();
        let position = position.min(groups.len());
        groups.insert(position, group);
        Ok(position)
    }

    /// Remove a group by identity; the removed group (with its contacts)
    /// is returned for the event payload
    pub fn remove_group(&mut self, id: GroupId) -> Result<Group> {
        let index = self
            .find_group_index(id)
            .ok_or_else(|| TreeError::NotFound(id.to_string()))?;
        Ok(self.root.groups_mut().remove(index))
    }

    pub fn find_group(&self, id: GroupId) -> Option<&Group> {
        self.root.groups().iter().find(|g| g.id == id)
    }

    pub(crate) fn find_group_mut(&mut self, id: GroupId) -> Option<&mut Group> {
        self.root.groups_mut().iter_mut().find(|g| g.id == id)
    }

    pub fn find_group_index(&self, id: GroupId) -> Option<usize> {
        self.root.groups().iter().position(|g| g.id == id)
    }

    /// Scan every group for a contact; returns the owning group id and
    /// the contact
    pub fn find_contact(&self, screen_name: &ScreenName) -> Option<(GroupId, &Contact)> {
        self.root
            .groups()
            .iter()
            .find_map(|g| g.find_contact(screen_name).map(|c| (g.id, c)))
    }

    /// Insert a contact into `group` at `position` (clamped); enforces
    /// tree-wide identity uniqueness. Returns the index actually used.
    pub fn insert_contact(
        &mut self,
        group: GroupId,
        position: usize,
        contact: Contact,
    ) -> Result<usize> {
        if self.find_contact(&contact.screen_name).is_some() {
            return Err(TreeError::DuplicateIdentity(
                contact.screen_name.to_string(),
            ));
        }
        let group = self
            .find_group_mut(group)
            .ok_or_else(|| TreeError::NotFound(group.to_string()))?;
        Ok(group.insert_contact_at(position, contact))
    }

    /// Remove a contact from `group` by identity; returns the removed
    /// contact for the event payload
    pub fn remove_contact(&mut self, group: GroupId, screen_name: &ScreenName) -> Result<Contact> {
        let group = self
            .find_group_mut(group)
            .ok_or_else(|| TreeError::NotFound(group.to_string()))?;
        let index = group
            .find_contact_index(screen_name)
            .ok_or_else(|| TreeError::NotFound(screen_name.to_string()))?;
        Ok(group.remove_contact_at(index))
    }

    /// Atomically replace the top-level group order.
    ///
    /// Entries in `new_order` that do not correspond to a known group are
    /// dropped first (the server list may reference groups not yet
    /// materialized locally). After filtering, the order must be a
    /// permutation of the current groups or the reorder is rejected and
    /// the prior order kept. Returns the applied order.
    pub fn reorder_root(&mut self, new_order: &[GroupId]) -> Result<Vec<GroupId>> {
        let known: Vec<GroupId> = new_order
            .iter()
            .copied()
            .filter(|id| self.find_group(*id).is_some())
            .collect();
        if known.len() != new_order.len() {
            trace!(
                dropped = new_order.len() - known.len(),
                "dropping not-yet-materialized entries from group reorder"
            );
        }
        Self::check_permutation(&known, self.root.group_count(), "root")?;

        let mut remaining = std::mem::take(self.root.groups_mut());
        let groups = self.root.groups_mut();
        for id in &known {
            // position is always found: permutation was checked above
            if let Some(pos) = remaining.iter().position(|g| g.id == *id) {
                groups.push(remaining.remove(pos));
            }
        }
        Ok(known)
    }

    /// Atomically replace a group's contact order, with the same
    /// filter-then-permutation-check contract as `reorder_root`
    pub fn reorder_children(
        &mut self,
        group: GroupId,
        new_order: &[ScreenName],
    ) -> Result<Vec<ScreenName>> {
        let target = self
            .find_group_mut(group)
            .ok_or_else(|| TreeError::NotFound(group.to_string()))?;

        let known: Vec<ScreenName> = new_order
            .iter()
            .filter(|sn| target.find_contact(sn).is_some())
            .cloned()
            .collect();
        Self::check_permutation(&known, target.contact_count(), &group.to_string())?;

        let mut remaining = target.take_contacts();
        let mut reordered = Vec::with_capacity(known.len());
        for sn in &known {
            if let Some(pos) = remaining.iter().position(|c| &c.screen_name == sn) {
                reordered.push(remaining.remove(pos));
            }
        }
        target.set_contacts(reordered);
        Ok(known)
    }

    /// Discard the whole mirrored tree; there is no partial teardown
    pub fn clear(&mut self) {
        self.root = RootGroup::new();
    }

    fn check_permutation<T: std::hash::Hash + Eq>(
        filtered: &[T],
        expected_len: usize,
        scope: &str,
    ) -> Result<()> {
        if filtered.len() != expected_len {
            return Err(TreeError::InvalidOrder(scope.to_string()));
        }
        let mut seen = HashSet::with_capacity(filtered.len());
        if !filtered.iter().all(|entry| seen.insert(entry)) {
            return Err(TreeError::InvalidOrder(scope.to_string()));
        }
        Ok(())
    }
}
