//! Clone task and clone URL parsing

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{FetchOptions, RemoteCallbacks};

use super::backend::SharedBackend;
use super::remote::skip_certificate_check;
use crate::config::CloneSettings;
use crate::task::{Phase, Progress, ProgressReporter, Task};
use crate::{Error, Result};

/// Parsed clone source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneUrl {
    /// URL or path handed to the backend
    pub url: String,
    /// Default directory name for the working tree (last path segment, no `.git`)
    pub name: String,
}

impl CloneUrl {
    /// Parse a clone source
    ///
    /// Supports:
    /// - `https://host/owner/repo(.git)` and other `scheme://` URLs
    /// - `git@host:owner/repo.git`
    /// - local paths (`../repo`, `/srv/git/repo.git`)
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::Config("Empty clone URL".to_string()));
        }

        let last_segment = if input.contains("://") {
            let url = url::Url::parse(input)
                .map_err(|e| Error::Config(format!("Invalid clone URL '{}': {}", input, e)))?;
            url.path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
                .map(|s| s.to_string())
        } else if let Some((_, path)) = input.split_once(':').filter(|(host, _)| host.contains('@')) {
            path.trim_end_matches('/').rsplit('/').next().map(|s| s.to_string())
        } else {
            Path::new(input)
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
        };

        let name = last_segment
            .map(|s| s.trim_end_matches(".git").to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "Cannot derive a directory name from '{}'. Pass an explicit target path.",
                    input
                ))
            })?;

        Ok(Self {
            url: input.to_string(),
            name,
        })
    }

    /// Default target directory under `parent`
    pub fn default_target(&self, parent: &Path) -> PathBuf {
        parent.join(&self.name)
    }
}

/// Fetches `url` into `path`, checks out the default branch and installs the result
pub(crate) struct CloneTask {
    url: String,
    path: PathBuf,
    blocking: bool,
    settings: CloneSettings,
    progress: Arc<dyn ProgressReporter>,
    backend: SharedBackend,
    in_flight: Arc<AtomicBool>,
}

impl CloneTask {
    pub(crate) const NAME: &'static str = "clone";

    pub(crate) fn new(
        url: &str,
        path: &Path,
        blocking: bool,
        settings: CloneSettings,
        progress: Arc<dyn ProgressReporter>,
        backend: SharedBackend,
        in_flight: Arc<AtomicBool>,
    ) -> Self {
        Self {
            url: url.to_string(),
            path: path.to_path_buf(),
            blocking,
            settings,
            progress,
            backend,
            in_flight,
        }
    }

    fn fetch_options(&self) -> FetchOptions<'static> {
        let progress = self.progress.clone();
        let mut callbacks = RemoteCallbacks::new();
        callbacks.transfer_progress(move |stats| {
            progress.report(Progress {
                phase: Phase::Transfer,
                completed: stats.received_objects(),
                total: stats.total_objects(),
            });
            true
        });

        if !self.settings.verify_certificates {
            skip_certificate_check(&mut callbacks);
        }

        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(callbacks);
        fetch
    }

    fn checkout_options(&self) -> CheckoutBuilder<'static> {
        let progress = self.progress.clone();
        let mut checkout = CheckoutBuilder::new();
        checkout.progress(move |_path, completed, total| {
            progress.report(Progress {
                phase: Phase::Checkout,
                completed,
                total,
            });
        });
        checkout
    }
}

/// Clone failures are network problems unless the backend says otherwise
fn classify_clone_error(err: git2::Error, url: &str, path: &Path) -> Error {
    let context = format!("clone {} into {}: {}", url, path.display(), err.message());
    match (err.code(), err.class()) {
        (git2::ErrorCode::Exists, _) => Error::AlreadyExists(context),
        (git2::ErrorCode::Conflict, _) | (_, git2::ErrorClass::Checkout) => Error::CheckoutFailed(context),
        _ => Error::ConnectionFailed(context),
    }
}

impl Task for CloneTask {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn is_blocking(&self) -> bool {
        self.blocking
    }

    fn run(&mut self) -> Result<()> {
        tracing::info!(url = %self.url, path = %self.path.display(), "Cloning repository");

        let mut builder = RepoBuilder::new();
        builder
            .fetch_options(self.fetch_options())
            .with_checkout(self.checkout_options());

        if self.settings.remote != "origin" {
            let remote = self.settings.remote.clone();
            builder.remote_create(move |repo, _name, url| repo.remote(&remote, url));
        }

        let repo = builder
            .clone(&self.url, &self.path)
            .map_err(|e| classify_clone_error(e, &self.url, &self.path))?;

        let head = repo
            .head()
            .ok()
            .and_then(|h| h.shorthand().map(|s| s.to_string()))
            .unwrap_or_default();

        self.backend.lock().install(repo);
        tracing::info!(path = %self.path.display(), branch = %head, "Clone done");
        Ok(())
    }
}

impl Drop for CloneTask {
    fn drop(&mut self) {
        // Cleared before the completion fires, so a handler may start another clone.
        self.in_flight.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::git::test_support::Upstream;
    use crate::git::Repository;

    #[test]
    fn test_parse_https() {
        let url = CloneUrl::parse("https://github.com/kylemcdonald/ofxFaceTracker.git").unwrap();
        assert_eq!(url.name, "ofxFaceTracker");
        assert_eq!(url.url, "https://github.com/kylemcdonald/ofxFaceTracker.git");
    }

    #[test]
    fn test_parse_https_trailing_slash() {
        let url = CloneUrl::parse("https://example.com/owner/repo/").unwrap();
        assert_eq!(url.name, "repo");
    }

    #[test]
    fn test_parse_scp_style() {
        let url = CloneUrl::parse("git@github.com:owner/repo.git").unwrap();
        assert_eq!(url.name, "repo");
    }

    #[test]
    fn test_parse_local_path() {
        let url = CloneUrl::parse("/srv/git/project.git").unwrap();
        assert_eq!(url.name, "project");
        assert_eq!(url.default_target(Path::new("/tmp")), PathBuf::from("/tmp/project"));
    }

    #[test]
    fn test_parse_file_url() {
        let url = CloneUrl::parse("file:///srv/git/project").unwrap();
        assert_eq!(url.name, "project");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(CloneUrl::parse("").is_err());
        assert!(CloneUrl::parse("https://example.com/").is_err());
        assert!(CloneUrl::parse("https://exa mple.com/x").is_err());
    }

    #[test]
    fn test_clone_with_custom_remote_name() {
        let upstream = Upstream::new();
        let mut config = Config::default();
        config.clone.remote = "upstream".to_string();

        let mut repo = Repository::with_config(&config);
        repo.set_path(upstream.clone_target("work"));
        repo.clone(&upstream.url(), true).wait().unwrap();

        assert_eq!(repo.remote_names().unwrap(), vec!["upstream".to_string()]);
        assert!(repo.find_branch("upstream/feature").is_some());
    }
}
