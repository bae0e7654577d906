//! Arbor CLI - Command line interface for Arbor
//!
//! Clone repositories and fork, switch and delete branches.

mod commands;

use std::path::PathBuf;

use arbor_core::Config;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{BranchArgs, CloneArgs, LsRemoteArgs};

/// Arbor: branch and clone management over libgit2
#[derive(Parser, Debug)]
#[command(name = "arbor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Repository to operate on
    #[arg(short = 'C', long = "repo", global = true, default_value = ".")]
    repo: PathBuf,

    /// Remote name for clones (overrides config and env)
    #[arg(long, global = true, env = "ARBOR_REMOTE")]
    remote: Option<String>,

    /// Skip TLS certificate verification when fetching
    #[arg(long, global = true)]
    insecure: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Clone a repository
    Clone(CloneArgs),

    /// Manage branches
    #[command(visible_alias = "br")]
    Branch(BranchArgs),

    /// List the heads a remote advertises
    LsRemote(LsRemoteArgs),

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    // Load configuration with overrides
    let config = Config::load_with_overrides(cli.remote.clone(), cli.insecure)?;

    if cli.verbose {
        tracing::info!(
            remote = %config.clone.remote,
            verify_certificates = config.clone.verify_certificates,
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("arbor {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Clone(args)) => {
            args.execute(cli.verbose, &config).await?;
        }
        Some(Commands::Branch(args)) => {
            args.execute(&cli.repo, cli.verbose, &config).await?;
        }
        Some(Commands::LsRemote(args)) => {
            args.execute(&cli.repo, cli.verbose, &config).await?;
        }
        Some(Commands::Config) => {
            println!("Arbor Configuration");
            println!("===================");
            println!();
            println!("Clone Settings:");
            println!("  remote: {}", config.clone.remote);
            println!("  verify_certificates: {}", config.clone.verify_certificates);
            println!("  log_progress: {}", config.clone.log_progress);
            println!();
            if let Some(path) = Config::default_config_path() {
                println!("Config file: {}", path.display());
                if path.exists() {
                    println!("  (exists)");
                } else {
                    println!("  (not found - using defaults)");
                }
            }
        }
        None => {
            println!("Arbor - branch and clone management over libgit2");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
