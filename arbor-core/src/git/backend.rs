//! Shared slot holding the repository's backend handle

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{Error, Result};

/// The backend handle plus a generation bumped every time it is replaced or closed
#[derive(Default)]
pub(crate) struct Backend {
    repo: Option<git2::Repository>,
    generation: u64,
}

impl Backend {
    /// Replace whatever is installed with `repo`
    pub(crate) fn install(&mut self, repo: git2::Repository) {
        self.repo = Some(repo);
        self.generation += 1;
    }

    /// Drop the handle. Returns false if nothing was open.
    pub(crate) fn close(&mut self) -> bool {
        if self.repo.take().is_some() {
            self.generation += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.repo.is_some()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

/// Single-owner backend slot shared between a repository and the handles it gives out
///
/// Every access holds the lock for the whole backend call.
#[derive(Clone, Default)]
pub(crate) struct SharedBackend {
    inner: Arc<Mutex<Backend>>,
}

impl SharedBackend {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Backend> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Run `f` against the current handle, with its generation
    pub(crate) fn with_repo<T>(&self, f: impl FnOnce(&git2::Repository, u64) -> Result<T>) -> Result<T> {
        let backend = self.lock();
        let repo = backend
            .repo
            .as_ref()
            .ok_or_else(|| Error::InvalidHandle("repository is not open".to_string()))?;
        f(repo, backend.generation)
    }

    /// Like [`SharedBackend::with_repo`], but only if the handle is still `generation`
    pub(crate) fn with_repo_at<T>(
        &self,
        generation: u64,
        f: impl FnOnce(&git2::Repository) -> Result<T>,
    ) -> Result<T> {
        self.with_repo(|repo, current| {
            if current != generation {
                return Err(Error::InvalidHandle(
                    "repository was reopened or re-cloned since this handle was obtained".to_string(),
                ));
            }
            f(repo)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_closed_slot_rejects_access() {
        let shared = SharedBackend::default();
        let err = shared.with_repo(|_, _| Ok(())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidHandle);
    }

    #[test]
    fn test_generation_tracks_replacement() {
        let temp = TempDir::new().unwrap();
        let shared = SharedBackend::default();

        shared.lock().install(git2::Repository::init(temp.path()).unwrap());
        let first = shared.generation();
        assert!(shared.with_repo_at(first, |_| Ok(())).is_ok());

        shared.lock().install(git2::Repository::open(temp.path()).unwrap());
        let err = shared.with_repo_at(first, |_| Ok(())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidHandle);
    }

    #[test]
    fn test_close_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let shared = SharedBackend::default();
        shared.lock().install(git2::Repository::init(temp.path()).unwrap());

        assert!(shared.lock().close());
        let generation = shared.generation();
        assert!(!shared.lock().close());
        assert_eq!(shared.generation(), generation);
        assert!(!shared.lock().is_open());
    }
}
