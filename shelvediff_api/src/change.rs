use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Kind of pending change recorded by the version-control backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// File is new in the shelveset.
    Add,
    /// File content was modified.
    Edit,
    /// File was removed.
    Delete,
    /// File moved to a new server path.
    Rename,
    /// File was copied or branched from another path.
    Branch,
    /// A previously deleted file was restored.
    Undelete,
    /// File kind changed (e.g., regular file to symlink).
    TypeChange,
}

impl ChangeType {
    /// Whether the change leaves no content behind at its server path.
    #[must_use]
    pub const fn is_removal(self) -> bool {
        matches!(self, Self::Delete)
    }
}

/// A single file change captured in a shelveset at fetch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    /// Path of the item on the version-control server.
    pub server_path: String,
    /// Working-copy location of the item, when the backend knows one.
    #[serde(default)]
    pub local_path: Option<Utf8PathBuf>,
    /// Backend revision number associated with the change.
    #[serde(default)]
    pub version: i64,
    /// What happened to the item.
    pub change_type: ChangeType,
    /// Extension of the item including the leading dot, or empty.
    #[serde(default)]
    pub file_extension: String,
    /// Opaque token the producing backend uses to locate the shelved content.
    #[serde(default)]
    pub content_ref: Option<String>,
}

impl PendingChange {
    /// Create a change for `server_path`, deriving the extension from the path.
    #[must_use]
    pub fn new(server_path: impl Into<String>, version: i64, change_type: ChangeType) -> Self {
        let server_path = server_path.into();
        let file_extension = extension_of(&server_path);
        Self {
            server_path,
            local_path: None,
            version,
            change_type,
            file_extension,
            content_ref: None,
        }
    }

    /// Attach a working-copy path.
    #[must_use]
    pub fn with_local_path(mut self, local_path: impl Into<Utf8PathBuf>) -> Self {
        self.local_path = Some(local_path.into());
        self
    }

    /// Attach a backend content token.
    #[must_use]
    pub fn with_content_ref(mut self, content_ref: impl Into<String>) -> Self {
        self.content_ref = Some(content_ref.into());
        self
    }

    /// Final component of the server path.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.server_path
            .rsplit(is_separator)
            .next()
            .unwrap_or(&self.server_path)
    }
}

/// Extension of the last path component, including the leading dot.
///
/// Returns an empty string when the name has no extension, ends with a dot,
/// or is a dotfile such as `.gitignore`.
#[must_use]
pub fn extension_of(path: &str) -> String {
    let name = path.rsplit(is_separator).next().unwrap_or(path);
    match name.rfind('.') {
        Some(0) | None => String::new(),
        Some(idx) if idx + 1 == name.len() => String::new(),
        Some(idx) => name[idx..].to_string(),
    }
}

const fn is_separator(c: char) -> bool {
    matches!(c, '/' | '\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_taken_from_last_component() {
        assert_eq!(extension_of("$/Project/src/Main.cs"), ".cs");
        assert_eq!(extension_of("dir.d/Makefile"), "");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("src\\lib.RS"), ".RS");
        assert_eq!(extension_of(".gitignore"), "");
        assert_eq!(extension_of("trailing."), "");
    }

    #[test]
    fn new_derives_extension_and_file_name() {
        let change = PendingChange::new("$/Team/App/Program.cs", 7, ChangeType::Edit);
        assert_eq!(change.file_extension, ".cs");
        assert_eq!(change.file_name(), "Program.cs");
        assert!(change.local_path.is_none());
        assert!(change.content_ref.is_none());
    }

    #[test]
    fn pending_change_defaults() {
        let json = r#"{
            "server_path": "$/Team/readme.md",
            "change_type": "add"
        }"#;

        let change: PendingChange = serde_json::from_str(json).expect("deserialize change");
        assert_eq!(change.server_path, "$/Team/readme.md");
        assert_eq!(change.change_type, ChangeType::Add);
        assert_eq!(change.version, 0);
        assert!(change.file_extension.is_empty());
        assert!(change.local_path.is_none());
    }

    #[test]
    fn change_type_uses_snake_case() {
        let json = serde_json::to_string(&ChangeType::TypeChange).expect("serialize");
        assert_eq!(json, "\"type_change\"");
        assert!(ChangeType::Delete.is_removal());
        assert!(!ChangeType::Rename.is_removal());
    }
}
