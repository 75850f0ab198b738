use serde::{Deserialize, Serialize};

use super::change::PendingChange;

/// Which sides of a comparison row carry a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    /// Path only exists in the left shelveset.
    LeftOnly,
    /// Path only exists in the right shelveset.
    RightOnly,
    /// Path exists in both shelvesets.
    Both,
}

/// One aligned path across two shelvesets.
///
/// At least one side is present in rows built by [`ComparisonRow::new`] or
/// deserialized from serde input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawComparisonRow")]
pub struct ComparisonRow {
    /// Normalized path key shared by both sides.
    pub key: String,
    /// Change from the left shelveset, if the path exists there.
    #[serde(default)]
    pub left: Option<PendingChange>,
    /// Change from the right shelveset, if the path exists there.
    #[serde(default)]
    pub right: Option<PendingChange>,
}

#[derive(Deserialize)]
struct RawComparisonRow {
    key: String,
    #[serde(default)]
    left: Option<PendingChange>,
    #[serde(default)]
    right: Option<PendingChange>,
}

impl TryFrom<RawComparisonRow> for ComparisonRow {
    type Error = String;

    fn try_from(raw: RawComparisonRow) -> Result<Self, Self::Error> {
        let key = raw.key;
        Self::new(key.clone(), raw.left, raw.right)
            .ok_or_else(|| format!("comparison row '{key}' has neither a left nor a right side"))
    }
}

impl ComparisonRow {
    /// Build a row, refusing one with neither side present.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        left: Option<PendingChange>,
        right: Option<PendingChange>,
    ) -> Option<Self> {
        if left.is_none() && right.is_none() {
            return None;
        }
        Some(Self {
            key: key.into(),
            left,
            right,
        })
    }

    /// Classify the row by which sides are present.
    #[must_use]
    pub fn status(&self) -> RowStatus {
        match (&self.left, &self.right) {
            (Some(_), Some(_)) => RowStatus::Both,
            (Some(_), None) => RowStatus::LeftOnly,
            _ => RowStatus::RightOnly,
        }
    }

    /// Server path shown for the left side, empty when absent.
    #[must_use]
    pub fn left_path(&self) -> &str {
        self.left.as_ref().map_or("", |c| c.server_path.as_str())
    }

    /// Server path shown for the right side, empty when absent.
    #[must_use]
    pub fn right_path(&self) -> &str {
        self.right.as_ref().map_or("", |c| c.server_path.as_str())
    }
}
