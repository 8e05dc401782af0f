//! Group - a server-stored group of contacts

use super::contact::{Contact, ScreenName};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque server-assigned group identifier.
///
/// Equality is by id, never by display name - the server may rename a
/// group without changing its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "grp:{}", self.0)
    }
}

/// A mirrored server group and its locally materialized contacts.
///
/// The contact sequence only contains buddies the engine has been told
/// about; server order is reconciled on insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// Remote identity of this group
    pub id: GroupId,

    /// Current display name
    pub name: String,

    /// Name as of the last rename we reported. The source fires rename
    /// notifications that carry no actual change; comparing against
    /// this snapshot filters them out.
    name_snapshot: String,

    /// Contacts in locally materialized server order
    contacts: Vec<Contact>,
}

impl Group {
    /// Create an empty mirrored group
    pub fn new(id: GroupId, name: String) -> Self {
        Self {
            id,
            name_snapshot: name.clone(),
            name,
            contacts: Vec::new(),
        }
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    /// Find a contact of this group by identity
    pub fn find_contact(&self, screen_name: &ScreenName) -> Option<&Contact> {
        self.contacts
            .iter()
            .find(|c| &c.screen_name == screen_name)
    }

    /// Index of a contact within this group, if present
    pub fn find_contact_index(&self, screen_name: &ScreenName) -> Option<usize> {
        self.contacts
            .iter()
            .position(|c| &c.screen_name == screen_name)
    }

    pub fn name_snapshot(&self) -> &str {
        &self.name_snapshot
    }

    /// Apply a confirmed rename and refresh the spurious-rename snapshot
    pub(crate) fn commit_name(&mut self, new_name: &str) {
        self.name = new_name.to_string();
        self.name_snapshot = new_name.to_string();
    }

    /// Insert a contact at `position`, clamped to `[0, len]`; returns
    /// the index actually used
    pub(crate) fn insert_contact_at(&mut self, position: usize, contact: Contact) -> usize {
        let position = position.min(self.contacts.len());
        self.contacts.insert(position, contact);
        position
    }

    pub(crate) fn remove_contact_at(&mut self, index: usize) -> Contact {
        self.contacts.remove(index)
    }

    pub(crate) fn set_contacts(&mut self, contacts: Vec<Contact>) {
        self.contacts = contacts;
    }

    pub(crate) fn take_contacts(&mut self) -> Vec<Contact> {
        std::mem::take(&mut self.contacts)
    }
}

/// The distinguished parentless group owning the ordered sequence of
/// top-level groups. Created once per mirrored session and discarded
/// whole when the session ends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RootGroup {
    groups: Vec<Group>,
}

impl RootGroup {
    pub fn new() -> Self {
        Self { groups: Vec::new() }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub(crate) fn groups_mut(&mut self) -> &mut Vec<Group> {
        &mut self.groups
    }
}
