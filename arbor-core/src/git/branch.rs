//! Branch handles: fork, switch HEAD, delete

use std::fmt;

use git2::ResetType;

use super::backend::SharedBackend;
use super::oid::Oid;
use crate::{Error, Result};

/// Whether a branch lives under `refs/heads` or `refs/remotes`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchKind {
    Local,
    Remote,
}

impl From<BranchKind> for git2::BranchType {
    fn from(kind: BranchKind) -> Self {
        match kind {
            BranchKind::Local => git2::BranchType::Local,
            BranchKind::Remote => git2::BranchType::Remote,
        }
    }
}

impl fmt::Display for BranchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchKind::Local => f.write_str("local"),
            BranchKind::Remote => f.write_str("remote"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum BranchState {
    /// Resolved against backend handle `generation`
    Valid { reference: String, generation: u64 },
    /// Removed. Terminal.
    Invalid,
}

/// A named pointer to a commit, obtained from [`Repository::find_branch`] or [`Branch::fork`]
///
/// After a successful [`Branch::remove`] the handle is permanently invalid
/// and every operation on it fails with [`ErrorKind::InvalidHandle`]. The
/// same happens once the repository's backend handle has been replaced.
///
/// [`Repository::find_branch`]: super::Repository::find_branch
/// [`ErrorKind::InvalidHandle`]: crate::ErrorKind::InvalidHandle
pub struct Branch {
    backend: SharedBackend,
    name: String,
    kind: BranchKind,
    state: BranchState,
}

impl fmt::Debug for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Branch")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Branch {
    pub(crate) fn resolved(
        backend: SharedBackend,
        generation: u64,
        name: impl Into<String>,
        kind: BranchKind,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            name: name.into(),
            kind,
            state: BranchState::Valid {
                reference: reference.into(),
                generation,
            },
        }
    }

    pub fn kind(&self) -> BranchKind {
        self.kind
    }

    /// Whether the handle can still be used
    pub fn is_valid(&self) -> bool {
        match self.state {
            BranchState::Valid { generation, .. } => {
                let backend = self.backend.lock();
                backend.is_open() && backend.generation() == generation
            }
            BranchState::Invalid => false,
        }
    }

    /// Short branch name (`feature`, `origin/feature`); empty once invalid
    pub fn name(&self) -> String {
        if self.is_valid() {
            self.name.clone()
        } else {
            String::new()
        }
    }

    /// Full reference name (`refs/heads/feature`), if still valid
    pub fn reference_name(&self) -> Option<&str> {
        match &self.state {
            BranchState::Valid { reference, .. } => Some(reference),
            BranchState::Invalid => None,
        }
    }

    fn generation(&self) -> Result<u64> {
        match self.state {
            BranchState::Valid { generation, .. } => Ok(generation),
            BranchState::Invalid => Err(Error::InvalidHandle(format!("branch '{}' has been removed", self.name))),
        }
    }

    /// Run `f` with the backend and this branch's reference, failing on invalid handles
    fn with_reference<T>(
        &self,
        f: impl FnOnce(&git2::Repository, git2::Reference<'_>) -> Result<T>,
    ) -> Result<T> {
        let generation = self.generation()?;
        let reference = self
            .reference_name()
            .ok_or_else(|| Error::InvalidHandle(format!("branch '{}' has been removed", self.name)))?;

        self.backend.with_repo_at(generation, |repo| {
            let found = repo
                .find_reference(reference)
                .map_err(|e| Error::from_git2(e, &format!("branch '{}'", self.name)))?;
            f(repo, found)
        })
    }

    /// Commit this branch currently points at
    pub fn oid(&self) -> Result<Oid> {
        self.with_reference(|_, reference| {
            let commit = reference
                .peel_to_commit()
                .map_err(|e| Error::from_git2(e, &format!("resolve branch '{}'", self.name)))?;
            Ok(commit.id().into())
        })
    }

    /// Whether HEAD currently points at this branch
    pub fn is_head(&self) -> Result<bool> {
        self.with_reference(|repo, reference| {
            let head = match repo.head() {
                Ok(head) => head,
                Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(false),
                Err(e) => return Err(Error::from_git2(e, "read HEAD")),
            };
            Ok(head.is_branch() && head.name() == reference.name())
        })
    }

    /// Create local branch `new_name` at this branch's current commit
    ///
    /// The new branch keeps that commit even if this one later moves or is
    /// deleted. Fails with `AlreadyExists` if `new_name` is taken.
    pub fn fork(&self, new_name: &str) -> Result<Branch> {
        let result = self.with_reference(|repo, reference| {
            let source = reference
                .peel_to_commit()
                .map_err(|e| Error::from_git2(e, &format!("resolve branch '{}'", self.name)))?;

            let created = repo
                .branch(new_name, &source, false)
                .map_err(|e| Error::from_git2(e, &format!("create branch '{}'", new_name)))?;

            let reference = created
                .get()
                .name()
                .ok_or_else(|| Error::Other(format!("Branch '{}' has a non-UTF-8 reference name", new_name)))?
                .to_string();

            tracing::debug!(
                source = %self.name,
                branch = %new_name,
                commit = %source.id(),
                "Forked branch"
            );
            Ok(reference)
        });

        match result.and_then(|reference| Ok((reference, self.generation()?))) {
            Ok((reference, generation)) => Ok(Branch::resolved(
                self.backend.clone(),
                generation,
                new_name,
                BranchKind::Local,
                reference,
            )),
            Err(e) => {
                tracing::warn!(source = %self.name, branch = %new_name, error = %e, "Failed to fork branch");
                Err(e)
            }
        }
    }

    /// Point HEAD at this branch and hard-reset the working tree to its commit
    ///
    /// Uncommitted changes in the working tree are discarded. Only local
    /// branches can become HEAD; remote branches are refused without side effects.
    pub fn make_head(&self) -> Result<()> {
        if self.kind == BranchKind::Remote {
            tracing::warn!(branch = %self.name, "Refusing to make a remote branch HEAD");
            return Err(Error::InvalidHandle(format!(
                "'{}' is a remote branch; fork it into a local branch first",
                self.name
            )));
        }

        let result = self.with_reference(|repo, reference| {
            let refname = reference
                .name()
                .ok_or_else(|| Error::Other(format!("Branch '{}' has a non-UTF-8 reference name", self.name)))?;
            let target = reference
                .peel(git2::ObjectType::Commit)
                .map_err(|e| Error::from_git2(e, &format!("resolve branch '{}'", self.name)))?;

            repo.set_head(refname)
                .map_err(|e| Error::from_git2(e, &format!("set HEAD to '{}'", self.name)))?;

            repo.reset(&target, ResetType::Hard, None).map_err(|e| {
                Error::CheckoutFailed(format!("reset to '{}' ({}): {}", self.name, target.id(), e.message()))
            })?;

            tracing::debug!(branch = %self.name, commit = %target.id(), "Switched HEAD");
            Ok(())
        });

        if let Err(ref e) = result {
            tracing::warn!(branch = %self.name, error = %e, "Failed to make branch HEAD");
        }
        result
    }

    /// Delete the branch; on success this handle becomes permanently invalid
    pub fn remove(&mut self) -> Result<()> {
        let result = self.with_reference(|_, reference| {
            let mut branch = git2::Branch::wrap(reference);
            branch
                .delete()
                .map_err(|e| Error::from_git2(e, &format!("delete branch '{}'", self.name)))
        });

        match result {
            Ok(()) => {
                tracing::debug!(branch = %self.name, "Removed branch");
                self.state = BranchState::Invalid;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(branch = %self.name, error = %e, "Failed to remove branch");
                Err(e)
            }
        }
    }
}
