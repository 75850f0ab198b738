//! Core library for comparing the pending changes of two shelvesets.
//!
//! The crate is layered around four responsibilities:
//! - matching two shelvesets' changes into comparison rows by normalized path
//! - resolving an external diff tool by file extension
//! - materializing both sides of a row as local files and launching the tool
//! - filtering the row list by a path substring
//!
//! Version control, tool settings, process launching and the built-in
//! viewer are host collaborators reached through the traits in [`hosts`].

#![warn(
    clippy::all,
    clippy::cargo,
    clippy::nursery,
    clippy::pedantic,
    missing_docs
)]
#![cfg_attr(
    not(test),
    deny(
        clippy::dbg_macro,
        clippy::expect_used,
        clippy::panic,
        clippy::print_stderr,
        clippy::print_stdout,
        clippy::todo,
        clippy::unwrap_used
    )
)]

/// Shared data models.
pub mod api;
/// Explicit entry point bundling the host collaborators.
pub mod context;
/// Row filtering by path substring.
pub mod filter;
/// Host collaborator traits and their stock implementations.
pub mod hosts;
/// Pairing of pending changes into comparison rows.
pub mod matcher;
/// Path normalization used as the matching key.
pub mod path_key;
/// Git stash backend.
pub mod repository;
/// External diff tool resolution and argument expansion.
pub mod resolver;
/// Materialization of rows and tool launching.
pub mod session;

pub use context::{BackgroundTask, ComparerContext, ComparerContextBuilder};
pub use filter::{filter_rows, RowFilter};
pub use matcher::{match_changes, match_snapshots};
pub use path_key::{normalize, PathKey};
pub use repository::GitStashBackend;
pub use resolver::{expand_arguments, lookup_extension, resolve, ToolArguments};
pub use session::{
    CompareOutcome, ComparisonSession, MaterializedFile, SessionOptions, ToolLaunch,
};

use hosts::HostError;

/// Common result type for the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the core library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A shelveset backend call failed.
    #[error("backend '{backend}' failed: {source}")]
    Backend {
        /// Identifier of the backend.
        backend: String,
        /// Error reported by the backend.
        #[source]
        source: HostError,
    },
    /// Shelved content could not be retrieved.
    #[error("failed to download {path}: {source}")]
    Download {
        /// Server path of the change.
        path: String,
        /// Error reported by the backend.
        #[source]
        source: HostError,
    },
    /// A temporary comparison file could not be created or written.
    #[error("failed to write temporary file in {path}: {source}")]
    TempFile {
        /// Temporary file or directory involved.
        path: String,
        /// Source I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The external diff tool could not be started.
    #[error("failed to launch diff tool '{command}': {source}")]
    Launch {
        /// Configured command.
        command: String,
        /// Error reported by the launcher.
        #[source]
        source: HostError,
    },
    /// The built-in comparison view could not be opened.
    #[error("failed to open compare view: {source}")]
    Viewer {
        /// Error reported by the viewer.
        #[source]
        source: HostError,
    },
    /// Neither an external tool nor a built-in viewer is available.
    #[error("no diff tool configured for '{extension}' and no built-in viewer available")]
    NoCompareTool {
        /// Extension used for the lookup.
        extension: String,
    },
    /// A comparison row carried neither a left nor a right change.
    #[error("comparison row '{key}' has neither a left nor a right side")]
    EmptyRow {
        /// Normalized path key of the row.
        key: String,
    },
    /// Underlying git operation failed.
    #[error("git error: {source}")]
    Git {
        /// Original libgit2 error.
        #[from]
        source: git2::Error,
    },
    /// Provided path does not correspond to a git repository.
    #[error("path does not reference a git repository: {path}")]
    NotARepository {
        /// Path that failed to resolve to a repository.
        path: String,
    },
    /// Bare repositories have no working tree to compare against.
    #[error("repository at {path} is bare and unsupported")]
    BareRepository {
        /// Path of the repository lacking a working tree.
        path: String,
    },
    /// Filesystem interaction failed.
    #[error("failed to access {path}: {source}")]
    Io {
        /// Filesystem path involved in the failed operation.
        path: String,
        /// Source I/O error returned by the standard library.
        #[source]
        source: std::io::Error,
    },
    /// A background task was cancelled before its result was taken.
    #[error("operation cancelled")]
    Cancelled,
    /// Internal invariant violated.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}
