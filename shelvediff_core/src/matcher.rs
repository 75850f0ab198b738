//! Outer join of two shelvesets' pending changes by normalized path.

use std::collections::BTreeMap;

use tracing::debug;

use crate::api::{ComparisonRow, PendingChange, ShelvesetSnapshot};
use crate::path_key::{normalize, PathKey};

type Sides<'a> = (Option<&'a PendingChange>, Option<&'a PendingChange>);

/// Align `left` and `right` into comparison rows.
///
/// Every normalized path present on either side yields exactly one row. When
/// a side lists the same path twice, the later entry wins. Rows come out in
/// ascending key order regardless of the input order, so identical inputs
/// always produce identical output.
#[must_use]
pub fn match_changes(left: &[PendingChange], right: &[PendingChange]) -> Vec<ComparisonRow> {
    let mut slots: BTreeMap<PathKey, Sides<'_>> = BTreeMap::new();
    for change in left {
        slots.entry(normalize(&change.server_path)).or_default().0 = Some(change);
    }
    for change in right {
        slots.entry(normalize(&change.server_path)).or_default().1 = Some(change);
    }

    let rows: Vec<ComparisonRow> = slots
        .into_iter()
        .filter_map(|(key, (l, r))| ComparisonRow::new(key.into_string(), l.cloned(), r.cloned()))
        .collect();
    debug!(
        left = left.len(),
        right = right.len(),
        rows = rows.len(),
        "matched shelveset changes"
    );
    rows
}

/// [`match_changes`] over two fetched snapshots.
#[must_use]
pub fn match_snapshots(left: &ShelvesetSnapshot, right: &ShelvesetSnapshot) -> Vec<ComparisonRow> {
    match_changes(&left.changes, &right.changes)
}
