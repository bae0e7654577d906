//! Remotes and scoped remote connections

use std::cell::Cell;
use std::fmt;

use git2::{CertificateCheckStatus, Direction, RemoteCallbacks};

use super::backend::SharedBackend;
use super::oid::Oid;
use super::repo::Repository;
use crate::{Error, Result};

/// A head advertised by a remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    /// Full reference name (e.g. `refs/heads/main`, `HEAD`)
    pub name: String,
    pub oid: Oid,
    /// Whether the object already exists in the local repository
    pub is_local: bool,
}

/// Accept any server certificate
pub(super) fn skip_certificate_check(callbacks: &mut RemoteCallbacks<'_>) {
    callbacks.certificate_check(|_, host| {
        tracing::debug!(host = %host, "Skipping certificate verification");
        Ok(CertificateCheckStatus::CertificateOk)
    });
}

/// A named remote loaded from a repository's configuration
///
/// Connect with [`Remote::connect`]; the returned [`Connection`] lists the
/// advertised heads and disconnects when dropped.
pub struct Remote {
    name: String,
    url: String,
    verify_certificates: bool,
    backend: SharedBackend,
    inner: git2::Remote<'static>,
    connected: Cell<bool>,
}

impl fmt::Debug for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Remote")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("verify_certificates", &self.verify_certificates)
            .field("connected", &self.connected.get())
            .finish()
    }
}

impl Remote {
    /// Load remote `name` from `repository`
    pub fn open(repository: &Repository, name: &str) -> Result<Self> {
        let backend = repository.backend().clone();
        let url = backend.with_repo(|repo, _| {
            let remote = repo
                .find_remote(name)
                .map_err(|e| Error::from_git2(e, &format!("remote '{}'", name)))?;
            remote
                .url()
                .map(|u| u.to_string())
                .ok_or_else(|| Error::Config(format!("Remote '{}' has no usable URL", name)))
        })?;

        let inner = git2::Remote::create_detached(url.as_str())
            .map_err(|e| Error::from_git2(e, &format!("load remote '{}'", name)))?;

        tracing::debug!(remote = %name, url = %url, "Loaded remote");
        Ok(Self {
            name: name.to_string(),
            url,
            verify_certificates: repository.settings().verify_certificates,
            backend,
            inner,
            connected: Cell::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn verifies_certificates(&self) -> bool {
        self.verify_certificates
    }

    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    /// Connect for fetching; the connection lasts as long as the guard
    pub fn connect(&mut self) -> Result<Connection<'_>> {
        Connection::new(self)
    }

    /// Invoke `f` once per advertised head over a connection scoped to this call
    pub fn list(&mut self, f: impl FnMut(&RemoteRef)) -> Result<()> {
        self.connect()?.list(f)
    }

    /// Collect every advertised head over a connection scoped to this call
    pub fn list_refs(&mut self) -> Result<Vec<RemoteRef>> {
        self.connect()?.list_refs()
    }
}

/// Live connection to a [`Remote`]; disconnects on drop
pub struct Connection<'a> {
    name: &'a str,
    backend: &'a SharedBackend,
    connected: &'a Cell<bool>,
    conn: git2::RemoteConnection<'static, 'a, 'static>,
}

impl fmt::Debug for Connection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("remote", &self.name)
            .field("connected", &self.connected.get())
            .finish()
    }
}

impl<'a> Connection<'a> {
    pub fn new(remote: &'a mut Remote) -> Result<Self> {
        let Remote {
            name,
            url,
            verify_certificates,
            backend,
            inner,
            connected,
        } = remote;

        let mut callbacks = RemoteCallbacks::new();
        if !*verify_certificates {
            skip_certificate_check(&mut callbacks);
        }

        let conn = inner
            .connect_auth(Direction::Fetch, Some(callbacks), None)
            .map_err(|e| {
                tracing::warn!(remote = %name, url = %url, error = %e, "Failed to connect");
                Error::ConnectionFailed(format!("connect to '{}' ({}): {}", name, url, e.message()))
            })?;

        connected.set(true);
        tracing::debug!(remote = %name, "Connected");
        Ok(Self {
            name: name.as_str(),
            backend,
            connected,
            conn,
        })
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    /// Invoke `f` once per head advertised by the remote
    ///
    /// The repository lock is not held while `f` runs.
    pub fn list(&self, mut f: impl FnMut(&RemoteRef)) -> Result<()> {
        for head in self.list_refs()? {
            f(&head);
        }
        Ok(())
    }

    /// Collect every advertised head
    pub fn list_refs(&self) -> Result<Vec<RemoteRef>> {
        let heads = self.conn.list().map_err(|e| {
            Error::ConnectionFailed(format!("list remote '{}': {}", self.name, e.message()))
        })?;

        let mut refs: Vec<RemoteRef> = heads
            .iter()
            .map(|head| RemoteRef {
                name: head.name().to_string(),
                oid: head.oid().into(),
                is_local: false,
            })
            .collect();

        self.mark_local(&mut refs);
        Ok(refs)
    }

    /// Flag the heads whose objects the local repository already has
    fn mark_local(&self, refs: &mut [RemoteRef]) {
        let result = self.backend.with_repo(|repo, _| {
            let odb = repo
                .odb()
                .map_err(|e| Error::from_git2(e, "open object database"))?;
            for head in refs.iter_mut() {
                head.is_local = odb.exists(head.oid.raw());
            }
            Ok(())
        });

        if let Err(e) = result {
            tracing::debug!(remote = %self.name, error = %e, "Cannot check heads against the local repository");
        }
    }
}

impl Drop for Connection<'_> {
    fn drop(&mut self) {
        // The inner connection disconnects right after this.
        self.connected.set(false);
        tracing::debug!(remote = %self.name, "Disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::git::test_support::{cloned, commit_on, Upstream};
    use crate::ErrorKind;

    #[test]
    fn test_open_loads_url() {
        let upstream = Upstream::new();
        let (repo, _) = cloned(&upstream, "work");

        let remote = repo.remote("origin").unwrap();
        assert_eq!(remote.name(), "origin");
        assert_eq!(remote.url(), upstream.url());
        assert!(remote.verifies_certificates());
        assert!(!remote.is_connected());
    }

    #[test]
    fn test_open_missing_remote() {
        let upstream = Upstream::new();
        let (repo, _) = cloned(&upstream, "work");
        assert_eq!(repo.remote("nope").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_connection_lists_heads_and_disconnects() {
        let upstream = Upstream::new();
        let (repo, _) = cloned(&upstream, "work");
        let mut remote = repo.remote("origin").unwrap();

        {
            let connection = remote.connect().unwrap();
            assert!(connection.is_connected());

            let refs = connection.list_refs().unwrap();
            let feature = refs
                .iter()
                .find(|r| r.name == "refs/heads/feature")
                .unwrap();
            assert_eq!(feature.oid.to_string(), upstream.feature.to_string());
            assert!(feature.is_local);
            assert!(refs.iter().any(|r| r.name == "refs/heads/master" && r.is_local));
        }

        assert!(!remote.is_connected());
    }

    #[test]
    fn test_heads_missing_locally() {
        let upstream = Upstream::new();
        let (repo, _) = cloned(&upstream, "work");

        let raw = git2::Repository::open(&upstream.path).unwrap();
        let fresh = commit_on(&raw, "refs/heads/fresh", "fresh.txt", "fresh\n", "Add fresh");

        let mut remote = repo.remote("origin").unwrap();
        let refs = remote.list_refs().unwrap();

        let head = refs.iter().find(|r| r.name == "refs/heads/fresh").unwrap();
        assert_eq!(head.oid.to_string(), fresh.to_string());
        assert!(!head.is_local);
        assert!(refs.iter().any(|r| r.name == "refs/heads/feature" && r.is_local));
        assert!(!remote.is_connected());
    }

    #[test]
    fn test_connected_inside_list_callback() {
        let upstream = Upstream::new();
        let (repo, _) = cloned(&upstream, "work");
        let mut remote = repo.remote("origin").unwrap();

        let connection = remote.connect().unwrap();
        let mut seen = Vec::new();
        connection
            .list(|head| seen.push((head.name.clone(), connection.is_connected())))
            .unwrap();

        assert!(!seen.is_empty());
        assert!(seen.iter().all(|(_, connected)| *connected));
    }

    #[test]
    fn test_callback_may_use_repository() {
        let upstream = Upstream::new();
        let (repo, _) = cloned(&upstream, "work");
        let mut remote = repo.remote("origin").unwrap();

        let mut found = 0;
        remote
            .list(|head| {
                if let Some(name) = head.name.strip_prefix("refs/heads/") {
                    if repo.find_branch(name).is_some() {
                        found += 1;
                    }
                }
            })
            .unwrap();
        assert_eq!(found, 1);
    }

    #[test]
    fn test_disconnect_on_early_return() {
        fn first_head(remote: &mut Remote) -> Result<String> {
            let connection = remote.connect()?;
            let mut names = Vec::new();
            connection.list(|r| names.push(r.name.clone()))?;
            names
                .into_iter()
                .find(|n| n.starts_with("refs/heads/"))
                .ok_or_else(|| Error::NotFound("no heads".to_string()))
        }

        let upstream = Upstream::new();
        let (repo, _) = cloned(&upstream, "work");
        let mut remote = repo.remote("origin").unwrap();

        assert!(first_head(&mut remote).is_ok());
        assert!(!remote.is_connected());
    }

    #[test]
    fn test_insecure_setting_reaches_remote() {
        let upstream = Upstream::new();
        let (_, target) = cloned(&upstream, "work");

        let config = Config::default().with_cli_overrides(None, true);
        let mut repo = Repository::with_config(&config);
        repo.open(&target).unwrap();

        let mut remote = repo.remote("origin").unwrap();
        assert!(!remote.verifies_certificates());

        let connection = remote.connect().unwrap();
        assert!(connection.list_refs().unwrap().iter().any(|r| r.is_local));
    }

    #[test]
    fn test_connect_failure() {
        let upstream = Upstream::new();
        let (repo, _) = cloned(&upstream, "work");

        let gone = upstream.clone_target("gone");
        repo.backend()
            .with_repo(|raw, _| Ok(raw.remote_set_url("origin", &gone.to_string_lossy())?))
            .unwrap();

        let mut remote = repo.remote("origin").unwrap();
        let err = remote.connect().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
        assert!(!remote.is_connected());
    }
}
