//! Remote command - list the heads a remote advertises

use std::path::Path;

use arbor_core::{Config, Repository};
use clap::Args;

/// Arguments for the ls-remote command
#[derive(Args, Debug)]
pub struct LsRemoteArgs {
    /// Remote name (defaults to the configured clone remote)
    pub remote: Option<String>,
}

impl LsRemoteArgs {
    /// Execute the ls-remote command
    pub async fn execute(&self, repo_path: &Path, verbose: bool, config: &Config) -> anyhow::Result<()> {
        let mut repo = Repository::with_config(config);
        repo.open(repo_path)?;

        let name = self.remote.as_deref().unwrap_or(config.clone.remote.as_str());
        let mut remote = repo.remote(name)?;

        if verbose {
            tracing::info!(
                remote = %remote.name(),
                url = %remote.url(),
                verify_certificates = remote.verifies_certificates(),
                "Connecting"
            );
        }

        let connection = remote.connect()?;
        connection.list(|head| {
            let marker = if head.is_local { "local" } else { "     " };
            println!("{} {} {}", head.oid, marker, head.name);
        })?;

        Ok(())
    }
}
