//! Explicitly constructed entry point wiring the engine to its host.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;

use tracing::{debug, info};

use crate::api::{ComparisonRow, ShelvesetInfo, ShelvesetSnapshot};
use crate::hosts::{
    CompareViewer, Dispatcher, HostResult, ProcessLauncher, ShelvesetBackend, ThreadDispatcher,
    ToolConfigStore,
};
use crate::matcher::match_snapshots;
use crate::session::{CompareOutcome, ComparisonSession, SessionOptions};
use crate::{Error, Result};

/// Collaborators and options shared by every operation of one host.
#[derive(Clone)]
pub struct ComparerContext {
    backend: Arc<dyn ShelvesetBackend>,
    session: ComparisonSession,
    dispatcher: Arc<dyn Dispatcher>,
}

/// Builder for [`ComparerContext`].
pub struct ComparerContextBuilder {
    backend: Arc<dyn ShelvesetBackend>,
    tools: Arc<dyn ToolConfigStore>,
    launcher: Arc<dyn ProcessLauncher>,
    viewer: Option<Arc<dyn CompareViewer>>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    options: SessionOptions,
}

impl ComparerContextBuilder {
    /// Built-in comparison view used when no external tool is configured.
    #[must_use]
    pub fn viewer(mut self, viewer: Arc<dyn CompareViewer>) -> Self {
        self.viewer = Some(viewer);
        self
    }

    /// Scheduler for background fetches, compares and deferred cleanup.
    #[must_use]
    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Temp-file location and cleanup policy.
    #[must_use]
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> ComparerContext {
        let dispatcher = self
            .dispatcher
            .unwrap_or_else(|| Arc::new(ThreadDispatcher));
        let mut session =
            ComparisonSession::new(Arc::clone(&self.backend), self.tools, self.launcher)
                .with_dispatcher(Arc::clone(&dispatcher))
                .with_options(self.options);
        if let Some(viewer) = self.viewer {
            session = session.with_viewer(viewer);
        }
        ComparerContext {
            backend: self.backend,
            session,
            dispatcher,
        }
    }
}

impl ComparerContext {
    /// Start building a context from its required collaborators.
    #[must_use]
    pub fn builder(
        backend: Arc<dyn ShelvesetBackend>,
        tools: Arc<dyn ToolConfigStore>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> ComparerContextBuilder {
        ComparerContextBuilder {
            backend,
            tools,
            launcher,
            viewer: None,
            dispatcher: None,
            options: SessionOptions::default(),
        }
    }

    /// Identifier of the configured backend.
    #[must_use]
    pub fn backend_id(&self) -> &'static str {
        self.backend.id()
    }

    /// Session used for compare actions.
    #[must_use]
    pub const fn session(&self) -> &ComparisonSession {
        &self.session
    }

    /// List shelvesets for up to two owners.
    ///
    /// The first owner's shelvesets come first (blank or `None` means the
    /// backend's current user), newest first. A second owner that is
    /// non-blank and differs from the first contributes a second block, also
    /// newest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Backend`] when the backend cannot list shelvesets.
    pub fn shelvesets(
        &self,
        first_owner: Option<&str>,
        second_owner: Option<&str>,
    ) -> Result<Vec<ShelvesetInfo>> {
        let first_owner = first_owner.map(str::trim).filter(|owner| !owner.is_empty());
        let mut listed = self.list_newest_first(first_owner)?;

        if let Some(second) = second_owner.map(str::trim).filter(|owner| !owner.is_empty()) {
            let same = first_owner.is_some_and(|first| first.eq_ignore_ascii_case(second));
            if same {
                debug!(owner = second, "second owner matches the first; skipping");
            } else {
                listed.extend(self.list_newest_first(Some(second))?);
            }
        }

        info!(count = listed.len(), "listed shelvesets");
        Ok(listed)
    }

    fn list_newest_first(&self, owner: Option<&str>) -> Result<Vec<ShelvesetInfo>> {
        let mut listed = invoke(self.backend.as_ref(), self.backend.list_shelvesets(owner))?;
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listed)
    }

    /// Fetch the pending changes of `info` into a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Backend`] when the backend fails.
    pub fn snapshot(&self, info: &ShelvesetInfo) -> Result<ShelvesetSnapshot> {
        fetch_snapshot(self.backend.as_ref(), info)
    }

    /// Snapshot of the working copy's uncommitted changes, when the backend has one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Backend`] when the backend fails.
    pub fn workspace_snapshot(&self) -> Result<Option<ShelvesetSnapshot>> {
        invoke(self.backend.as_ref(), self.backend.workspace_changes())
    }

    /// Match two snapshots into comparison rows.
    #[must_use]
    pub fn rows(&self, left: &ShelvesetSnapshot, right: &ShelvesetSnapshot) -> Vec<ComparisonRow> {
        match_snapshots(left, right)
    }

    /// Compare one row on the calling thread.
    ///
    /// # Errors
    ///
    /// See [`ComparisonSession::compare`].
    pub fn compare(&self, row: &ComparisonRow) -> Result<CompareOutcome> {
        self.session.compare(row)
    }

    /// Fetch `info` on the dispatcher.
    #[must_use]
    pub fn fetch_in_background(&self, info: ShelvesetInfo) -> BackgroundTask<ShelvesetSnapshot> {
        let backend = Arc::clone(&self.backend);
        self.spawn(move || fetch_snapshot(backend.as_ref(), &info))
    }

    /// Run a compare on the dispatcher.
    ///
    /// Cancelling only discards the outcome; a tool that has already been
    /// launched keeps running.
    #[must_use]
    pub fn compare_in_background(&self, row: ComparisonRow) -> BackgroundTask<CompareOutcome> {
        let session = self.session.clone();
        self.spawn(move || session.compare(&row))
    }

    fn spawn<T, F>(&self, job: F) -> BackgroundTask<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        self.dispatcher.dispatch(Box::new(move || {
            let result = if flag.load(Ordering::SeqCst) {
                Err(Error::Cancelled)
            } else {
                job()
            };
            if sender.send(result).is_err() {
                debug!("background task handle dropped; result discarded");
            }
        }));

        BackgroundTask {
            receiver,
            cancelled,
        }
    }
}

impl fmt::Debug for ComparerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComparerContext")
            .field("backend", &self.backend.id())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// Handle to work running on a [`Dispatcher`].
#[derive(Debug)]
pub struct BackgroundTask<T> {
    receiver: mpsc::Receiver<Result<T>>,
    cancelled: Arc<AtomicBool>,
}

impl<T> BackgroundTask<T> {
    /// Ask the task to stop. A result produced after this point is discarded.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether [`BackgroundTask::cancel`] was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Block until the task finishes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] after [`BackgroundTask::cancel`],
    /// [`Error::Internal`] when the task vanished without a result, or the
    /// task's own error.
    pub fn wait(self) -> Result<T> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let result = self.receiver.recv().map_err(|_| lost_task())?;
        self.settle(result)
    }

    /// Take the result if the task has finished, without blocking.
    ///
    /// Returns `None` while the task is still running. A result is handed
    /// out once; later calls report [`Error::Internal`].
    pub fn try_result(&self) -> Option<Result<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(self.settle(result)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(lost_task())),
        }
    }

    fn settle(&self, result: Result<T>) -> Result<T> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            result
        }
    }
}

fn lost_task() -> Error {
    Error::Internal {
        message: "background task ended without producing a result".to_owned(),
    }
}

fn fetch_snapshot(
    backend: &dyn ShelvesetBackend,
    info: &ShelvesetInfo,
) -> Result<ShelvesetSnapshot> {
    let changes = invoke(backend, backend.pending_changes(info))?;
    debug!(shelveset = %info.name, changes = changes.len(), "fetched shelveset");
    Ok(ShelvesetSnapshot::new(info.clone(), changes))
}

fn invoke<T>(backend: &dyn ShelvesetBackend, result: HostResult<T>) -> Result<T> {
    result.map_err(|source| Error::Backend {
        backend: backend.id().to_owned(),
        source,
    })
}
