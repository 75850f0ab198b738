//! Selection of an external diff tool by file extension.

use tracing::debug;

use crate::api::{extension_key, extension_of, ToolConfig, WILDCARD_EXTENSION};
use crate::hosts::ToolConfigStore;

/// Values substituted into a tool's argument template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolArguments<'a> {
    /// `%1`: path of the left file.
    pub left_path: &'a str,
    /// `%2`: path of the right file.
    pub right_path: &'a str,
    /// `%6`: label of the left file.
    pub left_label: &'a str,
    /// `%7`: label of the right file.
    pub right_label: &'a str,
}

/// Find the external tool configured for `extension`.
///
/// The exact extension entry wins over the `"*"` entry. Entries lacking a
/// command or an argument template are skipped. `None` means no external
/// tool is configured and the caller should fall back to the built-in viewer.
#[must_use]
pub fn resolve(extension: &str, store: &dyn ToolConfigStore) -> Option<ToolConfig> {
    let key = extension_key(extension);
    let exact = if key.is_empty() || key == WILDCARD_EXTENSION {
        None
    } else {
        lookup(store, &key)
    };

    let resolved = exact.or_else(|| lookup(store, WILDCARD_EXTENSION));
    match &resolved {
        Some(tool) => debug!(
            extension = %key,
            pattern = %tool.extension_pattern,
            command = %tool.command,
            "resolved diff tool"
        ),
        None => debug!(extension = %key, "no external diff tool configured"),
    }
    resolved
}

/// Extension used to pick a tool for a pair of files, with its leading dot.
///
/// The left file's extension wins; the right file's is used when the left
/// has none. Empty when neither file has one.
#[must_use]
pub fn lookup_extension(left: &str, right: &str) -> String {
    let extension = extension_of(left);
    if extension.is_empty() {
        extension_of(right)
    } else {
        extension
    }
}

fn lookup(store: &dyn ToolConfigStore, key: &str) -> Option<ToolConfig> {
    let entry = store.lookup(key)?;
    let tool = ToolConfig::from_entry(key, entry);
    if tool.is_none() {
        debug!(key, "ignoring partially configured diff tool entry");
    }
    tool
}

/// Expand `%1`, `%2`, `%6` and `%7` in `template`.
///
/// The template is scanned once from left to right; substituted values are
/// never rescanned, so a path containing `%2` stays intact. Every other `%`
/// sequence, including the base/merge tokens `%3`-`%5`, `%8` and `%9`, is
/// copied through unchanged.
#[must_use]
pub fn expand_arguments(template: &str, args: &ToolArguments<'_>) -> String {
    let mut expanded = String::with_capacity(template.len() + 64);
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            expanded.push(c);
            continue;
        }
        let value = match chars.peek() {
            Some('1') => Some(args.left_path),
            Some('2') => Some(args.right_path),
            Some('6') => Some(args.left_label),
            Some('7') => Some(args.right_label),
            _ => None,
        };
        match value {
            Some(value) => {
                chars.next();
                expanded.push_str(value);
            }
            None => expanded.push('%'),
        }
    }

    expanded
}
