//! Interfaces the shelvediff core expects its host to provide.
//!
//! The core never talks to a version-control server, a settings store, the
//! operating system's process table, or a UI directly; it goes through the
//! traits below so each can be swapped without touching comparison logic.

mod types;

use std::io::Read;
use std::time::Duration;

use shelvediff_api::{PendingChange, ShelvesetInfo, ShelvesetSnapshot, ToolEntry};

pub use types::{CompareRequest, HostError, HostResult};

/// Source of shelvesets and their shelved content.
pub trait ShelvesetBackend: Send + Sync {
    /// Stable identifier used in errors and logging.
    fn id(&self) -> &'static str;

    /// List the shelvesets owned by `owner`, or by the current user when `None`.
    ///
    /// # Errors
    ///
    /// Implementors should surface transport or backend failures.
    fn list_shelvesets(&self, owner: Option<&str>) -> HostResult<Vec<ShelvesetInfo>>;

    /// Fetch the pending changes recorded in a shelveset.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::NotFound`] when the shelveset no longer exists.
    fn pending_changes(&self, shelveset: &ShelvesetInfo) -> HostResult<Vec<PendingChange>>;

    /// Capture the working copy's uncommitted changes as a pseudo-shelveset.
    ///
    /// Backends without a local workspace return `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Implementors should surface failures reading the workspace.
    fn workspace_changes(&self) -> HostResult<Option<ShelvesetSnapshot>> {
        Ok(None)
    }

    /// Open a stream over the shelved content of `change`.
    ///
    /// # Errors
    ///
    /// Returns backend-defined errors when the content cannot be retrieved.
    fn download_content(&self, change: &PendingChange) -> HostResult<Box<dyn Read + Send>>;
}

/// Read-only lookup of external diff tools keyed by file extension or `"*"`.
pub trait ToolConfigStore: Send + Sync {
    /// Return the raw entry stored under `key`, if any.
    fn lookup(&self, key: &str) -> Option<ToolEntry>;
}

/// Starts external diff tools.
pub trait ProcessLauncher: Send + Sync {
    /// Launch `command` with an already-expanded argument string without
    /// waiting for it to finish.
    ///
    /// # Errors
    ///
    /// Returns an error when the process cannot be started.
    fn launch(&self, command: &str, arguments: &str) -> HostResult<Box<dyn ToolProcess>>;
}

/// Handle to a launched external tool.
pub trait ToolProcess: Send {
    /// Operating-system process id, when known.
    fn id(&self) -> Option<u32>;

    /// Block until the process exits or `timeout` elapses.
    ///
    /// Returns `true` when the process exited within the timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the process state cannot be queried.
    fn wait_for_exit(&mut self, timeout: Duration) -> HostResult<bool>;
}

/// The host's built-in comparison view, used when no external tool is set up.
pub trait CompareViewer: Send + Sync {
    /// Show a comparison of the two files described by `request`.
    ///
    /// # Errors
    ///
    /// Returns an error when the host cannot open the view.
    fn open_compare(&self, request: &CompareRequest) -> HostResult<()>;
}

/// Runs work away from the caller's thread.
///
/// Hosts with thread affinity rules supply their own scheduler here.
pub trait Dispatcher: Send + Sync {
    /// Run `job` at some later point on a host-chosen thread.
    fn dispatch(&self, job: Box<dyn FnOnce() + Send + 'static>);
}
