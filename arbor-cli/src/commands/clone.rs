//! Clone command - Clone a repository, optionally on a background worker

use std::path::PathBuf;

use arbor_core::{CloneUrl, Config, Repository};
use clap::Args;

/// Arguments for the clone command
#[derive(Args, Debug)]
pub struct CloneArgs {
    /// URL or path of the repository to clone
    #[arg(required = true)]
    pub url: String,

    /// Target directory (defaults to the repository name in the current directory)
    pub path: Option<PathBuf>,

    /// Run the clone on a background worker and wait for its completion signal
    #[arg(short, long)]
    pub background: bool,
}

impl CloneArgs {
    /// Execute the clone command
    pub async fn execute(&self, verbose: bool, config: &Config) -> anyhow::Result<()> {
        let parsed = CloneUrl::parse(&self.url)?;
        let target = match &self.path {
            Some(path) => path.clone(),
            None => parsed.default_target(&std::env::current_dir()?),
        };

        let mut repo = Repository::with_config(config);

        if repo.open(&target).is_ok() {
            println!("Repository already present at {}", target.display());
            println!("Current branch: {}", repo.current_branch_name());
            return Ok(());
        }

        if verbose {
            tracing::info!(
                url = %parsed.url,
                target = %target.display(),
                background = self.background,
                "Starting clone"
            );
        }

        let subscription = repo.subscribe(|completion| {
            if completion.is_success() {
                println!("Clone done");
            } else if let Err(failure) = &completion.outcome {
                eprintln!("Clone failed: {}", failure);
            }
        });

        println!("Cloning {} into {}", parsed.url, target.display());
        let handle = if self.background {
            let handle = repo.clone(&parsed.url, false);
            println!("Clone running in the background...");
            handle
        } else {
            tokio::task::block_in_place(|| repo.clone(&parsed.url, true))
        };

        let outcome = handle.await;
        repo.unsubscribe(subscription);

        if let Err(failure) = outcome {
            anyhow::bail!("clone of {} failed: {}", parsed.url, failure);
        }

        println!();
        for name in repo.list()? {
            println!("  {}", name);
        }
        println!("Current branch: {}", repo.current_branch_name());

        Ok(())
    }
}
