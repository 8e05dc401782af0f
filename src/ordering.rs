//! Server-order reconciliation for piecemeal announcements
//!
//! When the source reports a new entry it also declares the full sibling
//! order as it currently knows it. That order may reference entries the
//! engine has not materialized yet, so the new entry is placed directly
//! after its nearest predecessor that *is* known locally. Applied to
//! every announcement, this keeps the local order a subsequence of the
//! latest declared order and converges as the remaining entries arrive.

/// Compute the local insertion index for the entry at `new_index` within
/// `global_order`.
///
/// `local_index_of` maps a declared entry to its current local index,
/// returning `None` for entries not yet materialized. The rule:
/// scan the declared order backward from the new entry; the first
/// locally-known predecessor at local index `p` yields `p + 1`; with no
/// known predecessor the entry goes to the front.
pub fn resolve_insert_index<T, F>(global_order: &[T], new_index: usize, local_index_of: F) -> usize
where
    F: Fn(&T) -> Option<usize>,
{
    let new_index = new_index.min(global_order.len());
    global_order[..new_index]
        .iter()
        .rev()
        .find_map(|entry| local_index_of(entry))
        .map_or(0, |p| p + 1)
}
