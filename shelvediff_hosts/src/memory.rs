use std::collections::HashMap;
use std::io::{Cursor, Read};

use shelvediff_api::{extension_key, PendingChange, ShelvesetInfo, ShelvesetSnapshot, ToolEntry};
use shelvediff_host_api::{HostError, HostResult, ShelvesetBackend, ToolConfigStore};

/// Backend holding shelvesets in memory; useful for hosts without a server
/// connection and for exercising the comparison flow without one.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    current_user: String,
    shelvesets: Vec<ShelvesetSnapshot>,
    contents: HashMap<String, Vec<u8>>,
    workspace: Option<ShelvesetSnapshot>,
}

impl MemoryBackend {
    /// Create an empty backend whose default owner is `current_user`.
    #[must_use]
    pub fn new(current_user: impl Into<String>) -> Self {
        Self {
            current_user: current_user.into(),
            ..Self::default()
        }
    }

    /// Add a shelveset with its changes.
    #[must_use]
    pub fn with_shelveset(mut self, info: ShelvesetInfo, changes: Vec<PendingChange>) -> Self {
        self.shelvesets.push(ShelvesetSnapshot::new(info, changes));
        self
    }

    /// Register the bytes served for `content_ref`.
    #[must_use]
    pub fn with_content(
        mut self,
        content_ref: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        self.contents.insert(content_ref.into(), bytes.into());
        self
    }

    /// Set the pseudo-shelveset returned for the working copy.
    #[must_use]
    pub fn with_workspace(mut self, snapshot: ShelvesetSnapshot) -> Self {
        self.workspace = Some(snapshot);
        self
    }
}

impl ShelvesetBackend for MemoryBackend {
    fn id(&self) -> &'static str {
        "memory"
    }

    fn list_shelvesets(&self, owner: Option<&str>) -> HostResult<Vec<ShelvesetInfo>> {
        let owner = owner
            .filter(|o| !o.trim().is_empty())
            .unwrap_or(self.current_user.as_str())
            .to_lowercase();
        Ok(self
            .shelvesets
            .iter()
            .filter(|s| s.info.owner.to_lowercase() == owner)
            .map(|s| s.info.clone())
            .collect())
    }

    fn pending_changes(&self, shelveset: &ShelvesetInfo) -> HostResult<Vec<PendingChange>> {
        self.shelvesets
            .iter()
            .find(|s| s.info.id == shelveset.id)
            .map(|s| s.changes.clone())
            .ok_or_else(|| HostError::not_found(format!("shelveset '{}'", shelveset.name)))
    }

    fn workspace_changes(&self) -> HostResult<Option<ShelvesetSnapshot>> {
        Ok(self.workspace.clone())
    }

    fn download_content(&self, change: &PendingChange) -> HostResult<Box<dyn Read + Send>> {
        match &change.content_ref {
            Some(content_ref) => self
                .contents
                .get(content_ref)
                .map(|bytes| Box::new(Cursor::new(bytes.clone())) as Box<dyn Read + Send>)
                .ok_or_else(|| HostError::not_found(format!("content for {}", change.server_path))),
            None if change.change_type.is_removal() => Ok(Box::new(Cursor::new(Vec::new()))),
            None => Err(HostError::not_found(format!(
                "content for {}",
                change.server_path
            ))),
        }
    }
}

/// Tool configuration held in a map, keyed by canonical extension.
#[derive(Debug, Default, Clone)]
pub struct MemoryToolStore {
    entries: HashMap<String, ToolEntry>,
}

impl MemoryToolStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the entry for `extension` (or `"*"`).
    #[must_use]
    pub fn with_tool(mut self, extension: &str, entry: ToolEntry) -> Self {
        self.insert(extension, entry);
        self
    }

    /// Add or replace the entry for `extension` (or `"*"`).
    pub fn insert(&mut self, extension: &str, entry: ToolEntry) {
        self.entries.insert(extension_key(extension), entry);
    }
}

impl ToolConfigStore for MemoryToolStore {
    fn lookup(&self, key: &str) -> Option<ToolEntry> {
        self.entries.get(&extension_key(key)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelvediff_api::ChangeType;

    fn backend() -> MemoryBackend {
        MemoryBackend::new("alice")
            .with_shelveset(
                ShelvesetInfo::new("1", "first", "Alice", 10),
                vec![PendingChange::new("$/a.cs", 1, ChangeType::Edit).with_content_ref("c1")],
            )
            .with_shelveset(ShelvesetInfo::new("2", "other", "bob", 20), Vec::new())
            .with_content("c1", "class A {}")
    }

    #[test]
    fn lists_current_user_by_default() {
        let backend = backend();
        let mine = backend.list_shelvesets(None).expect("list");
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].name, "first");

        let bobs = backend.list_shelvesets(Some("BOB")).expect("list");
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].id, "2");
    }

    #[test]
    fn downloads_registered_content() {
        let backend = backend();
        let info = ShelvesetInfo::new("1", "first", "Alice", 10);
        let changes = backend.pending_changes(&info).expect("changes");

        let mut text = String::new();
        backend
            .download_content(&changes[0])
            .expect("download")
            .read_to_string(&mut text)
            .expect("read");
        assert_eq!(text, "class A {}");
    }

    #[test]
    fn missing_shelveset_and_content_are_not_found() {
        let backend = backend();
        let missing = ShelvesetInfo::new("9", "gone", "alice", 0);
        assert!(matches!(
            backend.pending_changes(&missing),
            Err(HostError::NotFound { .. })
        ));

        let orphan = PendingChange::new("$/b.cs", 1, ChangeType::Add);
        assert!(matches!(
            backend.download_content(&orphan),
            Err(HostError::NotFound { .. })
        ));

        let deleted = PendingChange::new("$/c.cs", 1, ChangeType::Delete);
        assert!(backend.download_content(&deleted).is_ok());
    }

    #[test]
    fn tool_store_keys_are_case_insensitive() {
        let store = MemoryToolStore::new().with_tool("CS", ToolEntry::new("meld", "%1 %2"));
        assert!(store.lookup(".cs").is_some());
        assert!(store.lookup(".Cs").is_some());
        assert!(store.lookup("*").is_none());
    }
}
