//! Branch commands - list, fork, switch and delete branches

use std::path::Path;

use arbor_core::{BranchKind, Config, Repository};
use clap::{Args, Subcommand};

/// Branch management commands
#[derive(Args, Debug)]
pub struct BranchArgs {
    #[command(subcommand)]
    pub command: BranchCommand,
}

#[derive(Subcommand, Debug)]
pub enum BranchCommand {
    /// List local branches, then remote branches
    #[command(visible_alias = "ls")]
    List {
        /// Print as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Show the branch HEAD points at
    Current,

    /// Make a local branch HEAD and hard-reset the working tree to it
    Switch {
        /// Local branch name
        name: String,
    },

    /// Create a local branch at another branch's commit
    Fork {
        /// Source branch (local or remote, e.g. origin/feature)
        source: String,

        /// Name of the new local branch
        name: String,

        /// Make the new branch HEAD afterwards
        #[arg(short, long)]
        switch: bool,
    },

    /// Delete a branch
    Delete {
        /// Branch name
        name: String,
    },
}

impl BranchArgs {
    /// Execute the branch command against the repository at `repo_path`
    pub async fn execute(&self, repo_path: &Path, verbose: bool, config: &Config) -> anyhow::Result<()> {
        let mut repo = Repository::with_config(config);
        repo.open(repo_path)?;

        if verbose {
            tracing::info!(repo = %repo_path.display(), "Opened repository");
        }

        match &self.command {
            BranchCommand::List { json } => list_branches(&repo, *json),
            BranchCommand::Current => {
                println!("{}", repo.current_branch_name());
                Ok(())
            }
            BranchCommand::Switch { name } => switch_branch(&repo, name),
            BranchCommand::Fork {
                source,
                name,
                switch,
            } => fork_branch(&repo, source, name, *switch),
            BranchCommand::Delete { name } => delete_branch(&repo, name),
        }
    }
}

fn list_branches(repo: &Repository, json: bool) -> anyhow::Result<()> {
    let names = repo.list()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&names)?);
        return Ok(());
    }

    let current = repo.current_branch_name();
    for name in names {
        let marker = if name == current { "*" } else { " " };
        println!("{} {}", marker, name);
    }
    Ok(())
}

fn switch_branch(repo: &Repository, name: &str) -> anyhow::Result<()> {
    let branch = repo
        .find_branch(name)
        .ok_or_else(|| anyhow::anyhow!("Branch '{}' not found", name))?;

    if branch.kind() == BranchKind::Remote {
        anyhow::bail!(
            "'{}' is a remote branch. Fork it first: arbor branch fork {} <name> --switch",
            name,
            name
        );
    }

    branch.make_head()?;
    println!("Switched to branch '{}'", repo.current_branch_name());
    Ok(())
}

fn fork_branch(repo: &Repository, source: &str, name: &str, switch: bool) -> anyhow::Result<()> {
    let source_branch = repo
        .find_branch(source)
        .ok_or_else(|| anyhow::anyhow!("Branch '{}' not found", source))?;

    let forked = source_branch.fork(name)?;
    println!("Created branch '{}' at {}", forked.name(), forked.oid()?.short());

    if switch {
        forked.make_head()?;
        println!("Switched to branch '{}'", repo.current_branch_name());
    }
    Ok(())
}

fn delete_branch(repo: &Repository, name: &str) -> anyhow::Result<()> {
    let mut branch = repo
        .find_branch(name)
        .ok_or_else(|| anyhow::anyhow!("Branch '{}' not found", name))?;

    branch.remove()?;
    println!("Deleted branch '{}'", name);
    Ok(())
}
