use serde::{Deserialize, Serialize};

/// Key under which the fallback tool entry is stored.
pub const WILDCARD_EXTENSION: &str = "*";

/// Canonical store key for an extension: lowercase with a leading dot.
///
/// The wildcard and the empty string are returned unchanged (trimmed).
#[must_use]
pub fn extension_key(extension: &str) -> String {
    let trimmed = extension.trim();
    if trimmed.is_empty() || trimmed == WILDCARD_EXTENSION {
        return trimmed.to_string();
    }
    let lower = trimmed.to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{lower}")
    }
}

/// Raw value read from a tool configuration store.
///
/// Either field may be missing; only entries with both are usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ToolEntry {
    /// Executable to launch.
    #[serde(default)]
    pub command: Option<String>,
    /// Argument template containing `%1`, `%2`, `%6`, `%7` placeholders.
    #[serde(default)]
    pub arguments: Option<String>,
}

impl ToolEntry {
    /// Construct a fully configured entry.
    pub fn new(command: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            arguments: Some(arguments.into()),
        }
    }
}

/// A usable external diff tool resolved for an extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Extension the entry was found under, or `"*"` for the fallback.
    pub extension_pattern: String,
    /// Executable to launch.
    pub command: String,
    /// Argument template.
    pub arguments_template: String,
}

impl ToolConfig {
    /// Promote a store entry to a tool configuration.
    ///
    /// Returns `None` unless both command and arguments are present and
    /// non-blank.
    #[must_use]
    pub fn from_entry(extension_pattern: impl Into<String>, entry: ToolEntry) -> Option<Self> {
        let command = entry.command.filter(|c| !c.trim().is_empty())?;
        let arguments_template = entry.arguments.filter(|a| !a.trim().is_empty())?;
        Some(Self {
            extension_pattern: extension_pattern.into(),
            command,
            arguments_template,
        })
    }

    /// Whether this is the wildcard fallback entry.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.extension_pattern == WILDCARD_EXTENSION
    }
}

/// When temporary files produced for a comparison are deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum CleanupPolicy {
    /// Delete as soon as the tool has been launched or the viewer opened.
    #[default]
    Immediate,
    /// Keep the files until the launched tool exits, up to `timeout_secs`.
    AfterToolExit {
        /// Upper bound on how long to wait for the tool.
        timeout_secs: u64,
    },
}
