//! Canonical keys for matching server paths across shelvesets.

use std::fmt;

/// Case-folded server path used to align changes from two shelvesets.
///
/// Ordering is lexicographic over the folded text, which makes it
/// case-insensitive with respect to the original paths.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathKey(String);

impl PathKey {
    /// Borrow the folded path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take ownership of the folded path.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PathKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Fold a server path into its matching key.
///
/// Server paths are case-insensitive in the version-control backend, so the
/// key is the Unicode lowercase form. Separators are left untouched and the
/// filesystem is never consulted.
#[must_use]
pub fn normalize(server_path: &str) -> PathKey {
    PathKey(server_path.to_lowercase())
}
