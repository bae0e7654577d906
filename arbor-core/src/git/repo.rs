//! Repository lifecycle, branch enumeration and background clone

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use git2::BranchType;

use super::backend::SharedBackend;
use super::branch::{Branch, BranchKind};
use super::clone::CloneTask;
use super::oid::Oid;
use super::remote::Remote;
use crate::config::{CloneSettings, Config};
use crate::error::ErrorKind;
use crate::task::{
    Completion, CompletionNotifier, NoProgress, ProgressReporter, SubscriptionId, TaskExecutor,
    TaskFailure, TaskHandle, TracingProgress,
};
use crate::{Error, Result};

/// A repository handle: owns the backend handle and hands out branches and remotes
///
/// Opening, cloning and closing replace the backend handle in place.
/// Branch handles obtained before a replacement stop working afterwards.
pub struct Repository {
    backend: SharedBackend,
    path: PathBuf,
    executor: TaskExecutor,
    settings: CloneSettings,
    progress: Arc<dyn ProgressReporter>,
    clone_in_flight: Arc<AtomicBool>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository {
    /// Create a closed repository with default settings
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    /// Create a closed repository using `config`
    pub fn with_config(config: &Config) -> Self {
        let progress: Arc<dyn ProgressReporter> = if config.clone.log_progress {
            Arc::new(TracingProgress::new())
        } else {
            Arc::new(NoProgress)
        };

        Self {
            backend: SharedBackend::default(),
            path: PathBuf::new(),
            executor: TaskExecutor::new(CompletionNotifier::new()),
            settings: config.clone.clone(),
            progress,
            clone_in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replace the progress sink used by subsequent clones
    pub fn with_progress(mut self, reporter: impl ProgressReporter + 'static) -> Self {
        self.progress = Arc::new(reporter);
        self
    }

    /// Local path of the working tree (the clone target)
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Set the local path used by the next [`Repository::clone`]
    pub fn set_path(&mut self, path: impl AsRef<Path>) {
        self.path = path.as_ref().to_path_buf();
    }

    /// Settings applied to clones and remote connections
    pub fn settings(&self) -> &CloneSettings {
        &self.settings
    }

    pub fn is_open(&self) -> bool {
        self.backend.lock().is_open()
    }

    /// Whether a clone task for this repository is still running
    pub fn is_busy(&self) -> bool {
        self.clone_in_flight.load(Ordering::SeqCst)
    }

    /// Open the repository at `path`
    ///
    /// The path is remembered as the clone target even when opening fails.
    /// On failure the previously open handle (if any) is left untouched; on
    /// success it is replaced.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.path = path.to_path_buf();

        if self.is_busy() {
            tracing::warn!(path = %path.display(), "Refusing to open while a clone is in progress");
            return Err(Error::Other("A clone is in progress for this repository".to_string()));
        }

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Repository path does not exist");
            return Err(Error::NotFound(format!("Path does not exist: {}", path.display())));
        }

        let repo = git2::Repository::open(path).map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Failed to open repository");
            if e.code() == git2::ErrorCode::NotFound {
                Error::NotFound(format!("Not a git repository: {}", path.display()))
            } else {
                Error::from_git2(e, &format!("open {}", path.display()))
            }
        })?;

        let mut backend = self.backend.lock();
        backend.close();
        backend.install(repo);
        tracing::debug!(path = %path.display(), "Opened repository");
        Ok(())
    }

    /// Clone `url` into [`Repository::path`]
    ///
    /// Closes the current handle, then runs the clone on the caller
    /// (`blocking`) or on a dedicated worker. On success the new handle is
    /// installed before the completion signal fires; on failure the signal
    /// carries the error. The target must be absent or empty; nothing is
    /// cleaned up here.
    ///
    /// A second clone requested while one is in flight is refused: its handle
    /// completes immediately with a failure and the running clone is unaffected.
    pub fn clone(&mut self, url: &str, blocking: bool) -> TaskHandle {
        if self.clone_in_flight.swap(true, Ordering::SeqCst) {
            return self.executor.reject(
                CloneTask::NAME,
                TaskFailure::new(ErrorKind::Internal, "A clone is already in progress for this repository"),
            );
        }

        if self.path.as_os_str().is_empty() {
            self.clone_in_flight.store(false, Ordering::SeqCst);
            return self.executor.reject(
                CloneTask::NAME,
                TaskFailure::new(ErrorKind::NotFound, "No local path set for the clone"),
            );
        }

        self.close();

        let task = CloneTask::new(
            url,
            &self.path,
            blocking,
            self.settings.clone(),
            self.progress.clone(),
            self.backend.clone(),
            self.clone_in_flight.clone(),
        );
        self.executor.exec(task)
    }

    /// Release the backend handle. Safe to call repeatedly.
    pub fn close(&self) {
        if self.backend.lock().close() {
            tracing::debug!(path = %self.path.display(), "Closed repository");
        }
    }

    /// Register a completion handler for tasks run by this repository
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Completion) + Send + Sync + 'static,
    {
        self.executor.notifier().subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.executor.notifier().unsubscribe(id)
    }

    /// All local branch names followed by all remote branch names
    ///
    /// Remote names carry their remote prefix (`origin/x`). Backend order is
    /// kept within each group and nothing is deduplicated.
    pub fn list(&self) -> Result<Vec<String>> {
        self.backend.with_repo(|repo, _| {
            let mut names = branch_names(repo, BranchType::Local)?;
            names.extend(branch_names(repo, BranchType::Remote)?);
            Ok(names)
        })
    }

    /// Log every branch name at info level
    pub fn dump(&self) {
        match self.list() {
            Ok(names) => {
                for name in names {
                    tracing::info!("{}", name);
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to list branches"),
        }
    }

    /// Look up a branch by name, local first, then remote
    pub fn find_branch(&self, name: &str) -> Option<Branch> {
        let found = self.backend.with_repo(|repo, generation| {
            for kind in [BranchKind::Local, BranchKind::Remote] {
                match repo.find_branch(name, kind.into()) {
                    Ok(branch) => {
                        let reference = branch
                            .get()
                            .name()
                            .ok_or_else(|| Error::Other(format!("Branch '{}' has a non-UTF-8 reference name", name)))?
                            .to_string();
                        return Ok(Some(Branch::resolved(
                            self.backend.clone(),
                            generation,
                            name,
                            kind,
                            reference,
                        )));
                    }
                    Err(e) if e.code() == git2::ErrorCode::NotFound => continue,
                    Err(e) => return Err(Error::from_git2(e, &format!("look up branch '{}'", name))),
                }
            }
            Ok(None)
        });

        match found {
            Ok(branch) => {
                if branch.is_none() {
                    tracing::debug!(branch = %name, "Branch not found");
                }
                branch
            }
            Err(e) => {
                tracing::warn!(branch = %name, error = %e, "Branch lookup failed");
                None
            }
        }
    }

    /// Short name of the branch HEAD points at, or an empty string
    ///
    /// Empty when the repository is closed, HEAD is detached or unborn, or
    /// the backend fails.
    pub fn current_branch_name(&self) -> String {
        let result = self.backend.with_repo(|repo, _| {
            let head = repo
                .head()
                .map_err(|e| Error::from_git2(e, "read HEAD"))?;
            if !head.is_branch() {
                return Ok(String::new());
            }
            Ok(head.shorthand().unwrap_or_default().to_string())
        });

        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to resolve current branch");
            String::new()
        })
    }

    /// Commit HEAD resolves to
    pub fn head_oid(&self) -> Result<Oid> {
        self.backend.with_repo(|repo, _| {
            let commit = repo
                .head()
                .and_then(|h| h.peel_to_commit())
                .map_err(|e| Error::from_git2(e, "resolve HEAD"))?;
            Ok(commit.id().into())
        })
    }

    /// Names of the configured remotes
    pub fn remote_names(&self) -> Result<Vec<String>> {
        self.backend.with_repo(|repo, _| {
            let remotes = repo
                .remotes()
                .map_err(|e| Error::from_git2(e, "list remotes"))?;
            Ok(remotes.iter().flatten().map(|s| s.to_string()).collect())
        })
    }

    /// Load the remote `name` from this repository's configuration
    pub fn remote(&self, name: &str) -> Result<Remote> {
        Remote::open(self, name)
    }

    pub(crate) fn backend(&self) -> &SharedBackend {
        &self.backend
    }
}

fn branch_names(repo: &git2::Repository, kind: BranchType) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let branches = repo
        .branches(Some(kind))
        .map_err(|e| Error::from_git2(e, "list branches"))?;

    for branch in branches {
        let (branch, _) = branch.map_err(|e| Error::from_git2(e, "read branch"))?;
        match branch.name() {
            Ok(Some(name)) => names.push(name.to_string()),
            Ok(None) => tracing::warn!("Skipping branch with a non-UTF-8 name"),
            Err(e) => return Err(Error::from_git2(e, "read branch name")),
        }
    }

    Ok(names)
}
