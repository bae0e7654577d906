//! Fixture repositories for tests, built locally with git2

use std::path::{Path, PathBuf};

use git2::{Repository as Git2Repository, RepositoryInitOptions, Signature};
use tempfile::TempDir;

use super::repo::Repository;

/// Commit `file` with `content` on top of `refname` (creating the ref if unborn)
pub(crate) fn commit_on(repo: &Git2Repository, refname: &str, file: &str, content: &str, message: &str) -> git2::Oid {
    let parent = repo
        .find_reference(refname)
        .ok()
        .and_then(|r| r.peel_to_commit().ok());
    let parent_tree = parent.as_ref().map(|c| c.tree().unwrap());

    let blob = repo.blob(content.as_bytes()).unwrap();
    let mut builder = repo.treebuilder(parent_tree.as_ref()).unwrap();
    builder.insert(file, blob, 0o100644).unwrap();
    let tree = repo.find_tree(builder.write().unwrap()).unwrap();

    let sig = Signature::now("Arbor Test", "test@example.com").unwrap();
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    repo.commit(Some(refname), &sig, &sig, message, &tree, &parents)
        .unwrap()
}

/// An "upstream" repository with `master` and a `feature` branch one commit ahead
pub(crate) struct Upstream {
    pub dir: TempDir,
    pub path: PathBuf,
    pub master: git2::Oid,
    pub feature: git2::Oid,
}

impl Upstream {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("upstream");

        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("master");
        let repo = Git2Repository::init_opts(&path, &opts).unwrap();

        let master = commit_on(&repo, "refs/heads/master", "README.md", "hello\n", "Initial commit");
        repo.branch("feature", &repo.find_commit(master).unwrap(), false)
            .unwrap();
        let feature = commit_on(&repo, "refs/heads/feature", "feature.txt", "feature\n", "Add feature");

        Self {
            dir,
            path,
            master,
            feature,
        }
    }

    pub fn url(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Directory next to the upstream that does not exist yet
    pub fn clone_target(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Blocking clone of `upstream` into a fresh directory
pub(crate) fn cloned(upstream: &Upstream, name: &str) -> (Repository, PathBuf) {
    let target = upstream.clone_target(name);
    let mut repo = Repository::new();
    repo.set_path(&target);
    repo.clone(&upstream.url(), true).wait().unwrap();
    (repo, target)
}

pub(crate) fn read(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok()
}
