//! Shelveset backend over git stashes, built on top of libgit2.
//!
//! Each stash entry plays the role of a shelveset: its author is the owner,
//! its message the name, and the diff against its base commit the pending
//! changes. The working tree's uncommitted changes are exposed as the
//! "Pending Changes" pseudo-shelveset.

use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use camino::Utf8PathBuf;
use git2::{
    Delta, Diff, DiffDelta, DiffFindOptions, DiffOptions, ErrorClass, ErrorCode, Oid,
    Repository as GitRepository,
};
use tracing::debug;

use crate::api::{ChangeType, PendingChange, ShelvesetInfo, ShelvesetSnapshot};
use crate::hosts::{HostError, HostResult, ShelvesetBackend};
use crate::{Error, Result};

/// Identifier of the working-tree pseudo-shelveset.
pub const WORKSPACE_ID: &str = "pending";
/// Display name of the working-tree pseudo-shelveset.
pub const WORKSPACE_NAME: &str = "Pending Changes";

/// Git repository whose stash entries are served as shelvesets.
pub struct GitStashBackend {
    repo: Mutex<GitRepository>,
    root: PathBuf,
}

impl GitStashBackend {
    /// Open the repository containing `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be canonicalized, does not resolve
    /// to a git repository, or resolves to a bare repository.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let original = path.as_ref();
        let canonical = std::fs::canonicalize(original).map_err(|source| Error::Io {
            path: display_path(original),
            source,
        })?;

        let repo = match GitRepository::discover(&canonical) {
            Ok(repo) => repo,
            Err(err)
                if err.class() == ErrorClass::Repository && err.code() == ErrorCode::NotFound =>
            {
                return Err(Error::NotARepository {
                    path: display_path(&canonical),
                })
            }
            Err(err) => return Err(Error::from(err)),
        };

        let root = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::BareRepository {
                path: display_path(&canonical),
            })?;

        debug!(root = %root.display(), "opened git stash backend");
        Ok(Self {
            repo: Mutex::new(repo),
            root,
        })
    }

    /// Absolute path of the working tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find a stash by `stash@{n}`, an object id prefix, or its message.
    ///
    /// Message lookup is a case-insensitive substring match; the newest
    /// matching stash wins. Stashes of every author are considered.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::NotFound`] when nothing matches.
    pub fn find_shelveset(&self, spec: &str) -> HostResult<ShelvesetInfo> {
        let spec = spec.trim();
        let mut repo = self.lock()?;
        let entries = stash_entries(&mut repo)?;

        let index = spec
            .strip_prefix("stash@{")
            .and_then(|rest| rest.strip_suffix('}'))
            .and_then(|n| n.parse::<usize>().ok());
        let found = match index {
            Some(index) => entries.into_iter().find(|entry| entry.index == index),
            None => {
                let needle = spec.to_lowercase();
                let is_oid_prefix =
                    needle.len() >= 4 && needle.chars().all(|c| c.is_ascii_hexdigit());
                let by_oid = entries.iter().position(|entry| {
                    is_oid_prefix && entry.oid.to_string().starts_with(&needle)
                });
                let by_message = || {
                    entries
                        .iter()
                        .position(|entry| entry.message.to_lowercase().contains(&needle))
                };
                by_oid
                    .or_else(by_message)
                    .and_then(|at| entries.into_iter().nth(at))
            }
        };

        let entry = found.ok_or_else(|| HostError::not_found(format!("stash '{spec}'")))?;
        let commit = repo.find_commit(entry.oid).map_err(git_failure)?;
        let author = commit.author();
        Ok(ShelvesetInfo::new(
            entry.oid.to_string(),
            entry.message,
            author.name().unwrap_or_default(),
            commit.time().seconds(),
        ))
    }

    fn lock(&self) -> HostResult<MutexGuard<'_, GitRepository>> {
        self.repo
            .lock()
            .map_err(|_| HostError::message("git repository lock poisoned"))
    }

    fn stash_changes(
        &self,
        repo: &mut GitRepository,
        info: &ShelvesetInfo,
    ) -> HostResult<Vec<PendingChange>> {
        let missing = || HostError::not_found(format!("shelveset '{}'", info.name));
        let oid = Oid::from_str(&info.id).map_err(|_| missing())?;
        let index = stash_entries(repo)?
            .into_iter()
            .find(|entry| entry.oid == oid)
            .map(|entry| entry.index)
            .ok_or_else(missing)?;
        let version = i64::try_from(index).unwrap_or(i64::MAX);

        let commit = repo.find_commit(oid).map_err(git_failure)?;
        let base = commit
            .parent(0)
            .and_then(|parent| parent.tree())
            .map_err(git_failure)?;
        let tree = commit.tree().map_err(git_failure)?;

        let mut diff = repo
            .diff_tree_to_tree(Some(&base), Some(&tree), None)
            .map_err(git_failure)?;
        let mut changes = collect_changes(&mut diff, version, None)?;

        if commit.parent_count() > 2 {
            let untracked = commit
                .parent(2)
                .and_then(|parent| parent.tree())
                .map_err(git_failure)?;
            let mut diff = repo
                .diff_tree_to_tree(None, Some(&untracked), None)
                .map_err(git_failure)?;
            changes.extend(collect_changes(&mut diff, version, None)?);
        }

        debug!(stash = index, changes = changes.len(), "read stash changes");
        Ok(changes)
    }

    fn working_tree_changes(&self, repo: &GitRepository) -> HostResult<Vec<PendingChange>> {
        let head_tree = match repo.head() {
            Ok(head) => Some(head.peel_to_tree().map_err(git_failure)?),
            Err(err) if is_unborn(&err) => None,
            Err(err) => return Err(git_failure(err)),
        };

        let mut opts = DiffOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .show_untracked_content(true);
        let mut diff = repo
            .diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut opts))
            .map_err(git_failure)?;
        collect_changes(&mut diff, 0, Some(&self.root))
    }
}

impl ShelvesetBackend for GitStashBackend {
    fn id(&self) -> &'static str {
        "git-stash"
    }

    fn list_shelvesets(&self, owner: Option<&str>) -> HostResult<Vec<ShelvesetInfo>> {
        let mut repo = self.lock()?;
        let owner = owner
            .map(str::trim)
            .filter(|owner| !owner.is_empty())
            .map(str::to_owned)
            .or_else(|| current_user(&repo));

        let mut listed = Vec::new();
        for entry in stash_entries(&mut repo)? {
            let commit = repo.find_commit(entry.oid).map_err(git_failure)?;
            let author = commit.author();
            let name = author.name().unwrap_or_default();
            let email = author.email().unwrap_or_default();

            if let Some(owner) = &owner {
                if !name.eq_ignore_ascii_case(owner) && !email.eq_ignore_ascii_case(owner) {
                    continue;
                }
            }
            listed.push(ShelvesetInfo::new(
                entry.oid.to_string(),
                entry.message,
                name,
                commit.time().seconds(),
            ));
        }

        debug!(owner = ?owner, count = listed.len(), "listed stashes");
        Ok(listed)
    }

    fn pending_changes(&self, shelveset: &ShelvesetInfo) -> HostResult<Vec<PendingChange>> {
        let mut repo = self.lock()?;
        if shelveset.id == WORKSPACE_ID {
            return self.working_tree_changes(&repo);
        }
        self.stash_changes(&mut repo, shelveset)
    }

    fn workspace_changes(&self) -> HostResult<Option<ShelvesetSnapshot>> {
        let repo = self.lock()?;
        let changes = self.working_tree_changes(&repo)?;
        if changes.is_empty() {
            return Ok(None);
        }

        let owner = current_user(&repo).unwrap_or_default();
        let info = ShelvesetInfo::new(WORKSPACE_ID, WORKSPACE_NAME, owner, unix_now());
        Ok(Some(ShelvesetSnapshot::new(info, changes)))
    }

    fn download_content(&self, change: &PendingChange) -> HostResult<Box<dyn Read + Send>> {
        if let Some(reference) = &change.content_ref {
            let missing = || HostError::not_found(format!("content of {}", change.server_path));
            let oid = Oid::from_str(reference).map_err(|_| missing())?;
            let repo = self.lock()?;
            let blob = repo.find_blob(oid).map_err(|_| missing())?;
            return Ok(Box::new(Cursor::new(blob.content().to_vec())));
        }

        if let Some(local) = change.local_path.as_ref().filter(|path| path.is_file()) {
            let file = File::open(local)
                .map_err(|err| HostError::message(format!("failed to open {local}: {err}")))?;
            return Ok(Box::new(file));
        }

        Ok(Box::new(io::empty()))
    }
}

impl fmt::Debug for GitStashBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitStashBackend")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

struct StashEntry {
    index: usize,
    message: String,
    oid: Oid,
}

fn stash_entries(repo: &mut GitRepository) -> HostResult<Vec<StashEntry>> {
    let mut entries = Vec::new();
    repo.stash_foreach(|index, message, oid| {
        entries.push(StashEntry {
            index,
            message: message.to_owned(),
            oid: *oid,
        });
        true
    })
    .map_err(git_failure)?;
    Ok(entries)
}

fn collect_changes(
    diff: &mut Diff<'_>,
    version: i64,
    workdir: Option<&Path>,
) -> HostResult<Vec<PendingChange>> {
    let mut find = DiffFindOptions::new();
    find.renames(true);
    diff.find_similar(Some(&mut find)).map_err(git_failure)?;

    Ok(diff
        .deltas()
        .filter_map(|delta| change_from_delta(&delta, version, workdir))
        .collect())
}

fn change_from_delta(
    delta: &DiffDelta<'_>,
    version: i64,
    workdir: Option<&Path>,
) -> Option<PendingChange> {
    let change_type = match delta.status() {
        Delta::Added | Delta::Untracked => ChangeType::Add,
        Delta::Modified => ChangeType::Edit,
        Delta::Deleted => ChangeType::Delete,
        Delta::Renamed => ChangeType::Rename,
        Delta::Copied => ChangeType::Branch,
        Delta::Typechange => ChangeType::TypeChange,
        Delta::Unmodified | Delta::Ignored | Delta::Unreadable | Delta::Conflicted => return None,
    };
    let file = if change_type.is_removal() {
        delta.old_file()
    } else {
        delta.new_file()
    };
    let path = file.path()?.to_str()?;
    let mut change = PendingChange::new(path, version, change_type);

    match workdir {
        // Working-tree content is read from disk, not from the object database.
        Some(root) => {
            if let Ok(local) = Utf8PathBuf::from_path_buf(root.join(path)) {
                change = change.with_local_path(local);
            }
        }
        None if !change_type.is_removal() && !file.id().is_zero() => {
            change = change.with_content_ref(file.id().to_string());
        }
        None => {}
    }
    Some(change)
}

fn current_user(repo: &GitRepository) -> Option<String> {
    repo.config()
        .and_then(|config| config.get_string("user.name"))
        .ok()
        .filter(|name| !name.trim().is_empty())
}

fn is_unborn(err: &git2::Error) -> bool {
    matches!(
        (err.class(), err.code()),
        (
            ErrorClass::Reference,
            ErrorCode::NotFound | ErrorCode::UnbornBranch
        )
    )
}

fn git_failure(err: git2::Error) -> HostError {
    HostError::message(format!("git error: {}", err.message()))
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
