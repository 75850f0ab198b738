//! Case-insensitive substring filtering of comparison rows.

use crate::api::ComparisonRow;

/// Filter over the server paths of comparison rows.
///
/// A row matches when either side's server path contains the query,
/// ignoring case. An empty query matches every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowFilter {
    needle: String,
}

impl RowFilter {
    /// Build a filter for `query`.
    #[must_use]
    pub fn new(query: &str) -> Self {
        Self {
            needle: query.to_lowercase(),
        }
    }

    /// Whether the filter lets every row through.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    /// Test a single row.
    #[must_use]
    pub fn matches(&self, row: &ComparisonRow) -> bool {
        self.is_empty()
            || contains_folded(row.left_path(), &self.needle)
            || contains_folded(row.right_path(), &self.needle)
    }

    /// Lazily yield the rows that match, in their original order.
    pub fn apply<'s, 'r: 's>(
        &'s self,
        rows: &'r [ComparisonRow],
    ) -> impl Iterator<Item = &'r ComparisonRow> + 's {
        rows.iter().filter(move |row| self.matches(row))
    }
}

/// Rows of `rows` matching `query`, preserving order.
#[must_use]
pub fn filter_rows<'a>(rows: &'a [ComparisonRow], query: &str) -> Vec<&'a ComparisonRow> {
    let filter = RowFilter::new(query);
    rows.iter().filter(|row| filter.matches(row)).collect()
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    !haystack.is_empty() && haystack.to_lowercase().contains(needle)
}
