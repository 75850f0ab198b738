use serde::{Deserialize, Serialize};

use super::change::PendingChange;

/// Listing entry for a shelveset before its changes are fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShelvesetInfo {
    /// Opaque identifier understood by the backend that listed the shelveset.
    pub id: String,
    /// Display name of the shelveset.
    pub name: String,
    /// Account that owns the shelveset.
    #[serde(default)]
    pub owner: String,
    /// Unix timestamp (seconds) when the shelveset was created.
    #[serde(default)]
    pub created_at: i64,
}

impl ShelvesetInfo {
    /// Construct a listing entry.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        owner: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner: owner.into(),
            created_at,
        }
    }
}

/// Immutable view of one shelveset and its pending changes at fetch time.
///
/// A refresh produces a new snapshot; holders of an older value keep a
/// consistent, if stale, view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShelvesetSnapshot {
    /// The shelveset the changes belong to.
    pub info: ShelvesetInfo,
    /// Changes in backend order.
    #[serde(default)]
    pub changes: Vec<PendingChange>,
}

impl ShelvesetSnapshot {
    /// Pair listing metadata with fetched changes.
    pub const fn new(info: ShelvesetInfo, changes: Vec<PendingChange>) -> Self {
        Self { info, changes }
    }

    /// Display name of the shelveset.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Owner of the shelveset.
    pub fn owner(&self) -> &str {
        &self.info.owner
    }

    /// Creation timestamp (unix seconds).
    pub const fn created_at(&self) -> i64 {
        self.info.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeType;

    #[test]
    fn snapshot_round_trip() {
        let snapshot = ShelvesetSnapshot::new(
            ShelvesetInfo::new("42", "Fix login", "DOMAIN\\alice", 1_700_000_000),
            vec![PendingChange::new("$/App/Login.cs", 12, ChangeType::Edit)
                .with_content_ref("blob-1")],
        );

        let json = serde_json::to_string(&snapshot).expect("serialize snapshot");
        let decoded: ShelvesetSnapshot = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(snapshot, decoded);
        assert_eq!(decoded.name(), "Fix login");
        assert_eq!(decoded.owner(), "DOMAIN\\alice");
        assert_eq!(decoded.created_at(), 1_700_000_000);
    }

    #[test]
    fn info_defaults() {
        let json = r#"{ "id": "7", "name": "wip" }"#;
        let info: ShelvesetInfo = serde_json::from_str(json).expect("deserialize info");
        assert!(info.owner.is_empty());
        assert_eq!(info.created_at, 0);
    }
}
