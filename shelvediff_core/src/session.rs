//! Materializes both sides of a comparison row and hands them to a diff tool.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::{Builder, TempPath};
use tracing::{debug, info, warn};

use crate::api::{extension_of, CleanupPolicy, ComparisonRow, PendingChange};
use crate::hosts::{
    AppConfig, CompareRequest, CompareViewer, Dispatcher, ProcessLauncher, ShelvesetBackend,
    ThreadDispatcher, ToolConfigStore, ToolProcess,
};
use crate::resolver::{expand_arguments, lookup_extension, resolve, ToolArguments};
use crate::{Error, Result};

const TEMP_PREFIX: &str = "shelvediff-";

/// Knobs controlling where comparison files live and when they go away.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Directory for temporary files; the system temp dir when `None`.
    pub temp_dir: Option<Utf8PathBuf>,
    /// When temporary files are deleted after a launch.
    pub cleanup: CleanupPolicy,
}

impl SessionOptions {
    /// Read the session settings from a loaded configuration file.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            temp_dir: config.temp_dir.as_deref().map(Utf8PathBuf::from),
            cleanup: config.cleanup,
        }
    }
}

/// A local file standing in for one side of a comparison.
///
/// Temporary files were created by the session and are deleted when the
/// value is released or dropped. Working-copy files are never touched.
pub struct MaterializedFile {
    path: Utf8PathBuf,
    temp: Option<TempPath>,
}

impl MaterializedFile {
    fn working(path: Utf8PathBuf) -> Self {
        Self { path, temp: None }
    }

    fn temporary(temp: TempPath) -> Result<Self> {
        let path = Utf8PathBuf::from_path_buf(temp.to_path_buf()).map_err(|path| {
            Error::TempFile {
                path: path.to_string_lossy().into_owned(),
                source: io::Error::new(io::ErrorKind::InvalidData, "path is not valid UTF-8"),
            }
        })?;
        Ok(Self {
            path,
            temp: Some(temp),
        })
    }

    /// Absolute location of the file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Whether the session created the file and owns its deletion.
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }

    /// Delete the file if it is temporary. Failures are logged, not returned.
    pub fn release(mut self) {
        self.delete();
    }

    fn delete(&mut self) {
        let Some(temp) = self.temp.take() else {
            return;
        };
        match temp.close() {
            Ok(()) => debug!(path = %self.path, "deleted comparison file"),
            Err(err) => warn!(path = %self.path, "failed to delete comparison file: {err}"),
        }
    }
}

impl Drop for MaterializedFile {
    fn drop(&mut self) {
        self.delete();
    }
}

impl fmt::Debug for MaterializedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaterializedFile")
            .field("path", &self.path)
            .field("is_temporary", &self.is_temporary())
            .finish()
    }
}

/// External tool started for a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolLaunch {
    /// Command that was launched.
    pub command: String,
    /// Expanded argument string passed to the command.
    pub arguments: String,
    /// Process id reported by the launcher.
    pub pid: Option<u32>,
}

/// What a compare action did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareOutcome {
    /// The launched tool, or `None` when the built-in viewer was used.
    pub tool: Option<ToolLaunch>,
    /// Caption describing the pair of files.
    pub caption: String,
    /// Label of the left side.
    pub left_label: String,
    /// Label of the right side.
    pub right_label: String,
}

struct Side {
    file: MaterializedFile,
    label: String,
}

/// Runs compare actions for rows produced by the matcher.
///
/// Each call to [`ComparisonSession::compare`] allocates its own temporary
/// files, so concurrent compares (even of the same row) do not interfere.
#[derive(Clone)]
pub struct ComparisonSession {
    backend: Arc<dyn ShelvesetBackend>,
    tools: Arc<dyn ToolConfigStore>,
    launcher: Arc<dyn ProcessLauncher>,
    viewer: Option<Arc<dyn CompareViewer>>,
    dispatcher: Arc<dyn Dispatcher>,
    options: SessionOptions,
}

impl ComparisonSession {
    /// Create a session without a built-in viewer, reaping tools on plain threads.
    #[must_use]
    pub fn new(
        backend: Arc<dyn ShelvesetBackend>,
        tools: Arc<dyn ToolConfigStore>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        Self {
            backend,
            tools,
            launcher,
            viewer: None,
            dispatcher: Arc::new(ThreadDispatcher),
            options: SessionOptions::default(),
        }
    }

    /// Use `viewer` when no external tool is configured.
    #[must_use]
    pub fn with_viewer(mut self, viewer: Arc<dyn CompareViewer>) -> Self {
        self.viewer = Some(viewer);
        self
    }

    /// Run deferred cleanup on `dispatcher`.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Replace the session options.
    #[must_use]
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Options in effect.
    #[must_use]
    pub const fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Compare both sides of `row` with the configured tool or viewer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Download`] or [`Error::TempFile`] when a side cannot be
    /// materialized, [`Error::Launch`] when the tool fails to start,
    /// [`Error::Viewer`] when the built-in view fails, and
    /// [`Error::NoCompareTool`] when neither is available. Temporary files
    /// created before the failure are deleted before the error is returned.
    /// A row with neither side present fails with [`Error::EmptyRow`].
    pub fn compare(&self, row: &ComparisonRow) -> Result<CompareOutcome> {
        if row.left.is_none() && row.right.is_none() {
            return Err(Error::EmptyRow {
                key: row.key.clone(),
            });
        }
        info!(key = %row.key, "comparing shelveset row");
        let left = self.materialize(row.left.as_ref())?;
        let right = self.materialize(row.right.as_ref())?;

        let extension = lookup_extension(left.file.path().as_str(), right.file.path().as_str());
        let caption = format!("{} vs {}", row.left_path(), row.right_path());

        let Some(tool) = resolve(&extension, self.tools.as_ref()) else {
            return self.open_builtin(left, right, caption, extension);
        };

        let arguments = expand_arguments(
            &tool.arguments_template,
            &ToolArguments {
                left_path: left.file.path().as_str(),
                right_path: right.file.path().as_str(),
                left_label: &left.label,
                right_label: &right.label,
            },
        );
        let process = self
            .launcher
            .launch(&tool.command, &arguments)
            .map_err(|source| Error::Launch {
                command: tool.command.clone(),
                source,
            })?;
        let pid = process.id();
        info!(command = %tool.command, ?pid, "launched diff tool");

        let outcome = CompareOutcome {
            tool: Some(ToolLaunch {
                command: tool.command,
                arguments,
                pid,
            }),
            caption,
            left_label: left.label,
            right_label: right.label,
        };
        self.release([left.file, right.file], Some(process));
        Ok(outcome)
    }

    fn open_builtin(
        &self,
        left: Side,
        right: Side,
        caption: String,
        extension: String,
    ) -> Result<CompareOutcome> {
        let viewer = self
            .viewer
            .as_ref()
            .ok_or(Error::NoCompareTool { extension })?;

        let request = CompareRequest {
            left_path: left.file.path().to_string(),
            right_path: right.file.path().to_string(),
            caption: caption.clone(),
            tooltip: format!("{}\n{}", left.label, right.label),
            left_label: left.label.clone(),
            right_label: right.label.clone(),
        };
        viewer
            .open_compare(&request)
            .map_err(|source| Error::Viewer { source })?;
        debug!(caption = %request.caption, "opened built-in compare view");

        self.release([left.file, right.file], None);
        Ok(CompareOutcome {
            tool: None,
            caption,
            left_label: left.label,
            right_label: right.label,
        })
    }

    fn materialize(&self, change: Option<&PendingChange>) -> Result<Side> {
        let Some(change) = change else {
            let file = self.create_temp("", |_| Ok(()))?;
            return Ok(Side {
                file,
                label: String::new(),
            });
        };

        if let Some(local) = &change.local_path {
            if local.is_file() {
                debug!(path = %local, "using working-copy file");
                return Ok(Side {
                    label: local.to_string(),
                    file: MaterializedFile::working(local.clone()),
                });
            }
        }

        let mut content = self
            .backend
            .download_content(change)
            .map_err(|source| Error::Download {
                path: change.server_path.clone(),
                source,
            })?;
        let file = self.create_temp(&suffix_for(change), |out| {
            io::copy(&mut content, out)?;
            Ok(())
        })?;
        debug!(
            server_path = %change.server_path,
            path = %file.path(),
            "downloaded shelved content"
        );

        Ok(Side {
            file,
            label: format!("{};{}", change.server_path, change.version),
        })
    }

    fn create_temp<F>(&self, suffix: &str, fill: F) -> Result<MaterializedFile>
    where
        F: FnOnce(&mut fs::File) -> io::Result<()>,
    {
        let mut builder = Builder::new();
        builder.prefix(TEMP_PREFIX).suffix(suffix);

        let location = self
            .options
            .temp_dir
            .as_ref()
            .map_or_else(|| std::env::temp_dir().display().to_string(), ToString::to_string);
        let temp_error = |source| Error::TempFile {
            path: location.clone(),
            source,
        };

        let mut file = match &self.options.temp_dir {
            Some(dir) => {
                fs::create_dir_all(dir).map_err(temp_error)?;
                builder.tempfile_in(dir)
            }
            None => builder.tempfile(),
        }
        .map_err(temp_error)?;

        fill(file.as_file_mut())
            .and_then(|()| file.as_file_mut().flush())
            .map_err(|source| Error::TempFile {
                path: file.path().display().to_string(),
                source,
            })?;

        MaterializedFile::temporary(file.into_temp_path())
    }

    fn release<const N: usize>(
        &self,
        files: [MaterializedFile; N],
        process: Option<Box<dyn ToolProcess>>,
    ) {
        let temporary: Vec<MaterializedFile> = files
            .into_iter()
            .filter(MaterializedFile::is_temporary)
            .collect();

        match (self.options.cleanup, process) {
            (CleanupPolicy::AfterToolExit { timeout_secs }, Some(mut process))
                if !temporary.is_empty() =>
            {
                debug!(timeout_secs, "deferring comparison file cleanup until the tool exits");
                self.dispatcher.dispatch(Box::new(move || {
                    match process.wait_for_exit(Duration::from_secs(timeout_secs)) {
                        Ok(true) => debug!("diff tool exited"),
                        Ok(false) => warn!(
                            timeout_secs,
                            "diff tool still running; deleting comparison files anyway"
                        ),
                        Err(err) => warn!("failed waiting for diff tool: {err}"),
                    }
                    temporary.into_iter().for_each(MaterializedFile::release);
                }));
            }
            _ => temporary.into_iter().for_each(MaterializedFile::release),
        }
    }
}

impl fmt::Debug for ComparisonSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComparisonSession")
            .field("backend", &self.backend.id())
            .field("has_viewer", &self.viewer.is_some())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Temp-file suffix preserving the change's extension.
fn suffix_for(change: &PendingChange) -> String {
    let extension = if change.file_extension.trim().is_empty() {
        extension_of(&change.server_path)
    } else {
        change.file_extension.trim().to_string()
    };
    if extension.is_empty() || extension.starts_with('.') {
        extension
    } else {
        format!(".{extension}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ChangeType;

    #[test]
    fn suffix_prefers_recorded_extension() {
        let mut change = PendingChange::new("$/App/Form.designer.cs", 1, ChangeType::Edit);
        assert_eq!(suffix_for(&change), ".cs");

        change.file_extension = "resx".into();
        assert_eq!(suffix_for(&change), ".resx");

        change.file_extension = String::new();
        change.server_path = "$/App/Makefile".into();
        assert_eq!(suffix_for(&change), "");
    }

    #[test]
    fn temporary_file_is_deleted_on_release() {
        let temp = Builder::new().tempfile().expect("tempfile").into_temp_path();
        let file = MaterializedFile::temporary(temp).expect("utf8 temp path");
        let path = file.path().to_owned();
        assert!(file.is_temporary());
        assert!(path.exists());

        file.release();
        assert!(!path.exists());
    }

    #[test]
    fn working_file_survives_release() {
        let temp = tempfile::NamedTempFile::new().expect("tempfile");
        let path = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");

        let file = MaterializedFile::working(path.clone());
        assert!(!file.is_temporary());
        drop(file);
        assert!(path.exists());
    }

    #[test]
    fn options_follow_config() {
        let config = AppConfig {
            temp_dir: Some("/var/tmp/shelvediff".into()),
            cleanup: CleanupPolicy::AfterToolExit { timeout_secs: 5 },
            ..AppConfig::default()
        };
        let options = SessionOptions::from_config(&config);
        assert_eq!(options.temp_dir.as_deref(), Some(Utf8Path::new("/var/tmp/shelvediff")));
        assert_eq!(options.cleanup, CleanupPolicy::AfterToolExit { timeout_secs: 5 });
    }
}
