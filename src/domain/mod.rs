//! Pure data model for the mirrored buddy list
//!
//! These types carry no I/O and no locking; ownership is strictly
//! top-down (root owns groups, groups own contacts). Upward traversal
//! happens through the owning `GroupId` carried by events, never
//! through back-pointers.

pub mod contact;
pub mod group;

pub use contact::{Contact, ScreenName};
pub use group::{Group, GroupId, RootGroup};
