//! Plansync CLI library: exposed for integration tests

pub mod commands;
pub mod context;
pub mod navigator;
pub mod output;
pub mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "plansync")]
#[command(about = "Keep your subscription state in sync", long_about = None)]
#[command(version = plansync_core::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format
    #[arg(long, value_enum, global = true, default_value = "terminal")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize .plansync.toml configuration
    Init {
        /// Path to initialize (default: current directory)
        path: Option<PathBuf>,
    },

    /// Show the current subscription (default command)
    Status,

    /// Start a checkout for a paid plan
    Checkout {
        /// Price identifier at the payment provider
        price_id: String,

        /// Plan tier the price belongs to
        plan_tier: String,
    },

    /// Manage the stored session
    Auth {
        #[command(subcommand)]
        action: Option<commands::auth::AuthAction>,

        /// Sign in with an access token
        #[arg(long)]
        token: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Terminal,
    Json,
}

/// Dispatches a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let dir: &Path = &cwd;

    match cli.command {
        Some(Commands::Init { path }) => commands::init::run(path.as_deref()),
        Some(Commands::Checkout {
            ref price_id,
            ref plan_tier,
        }) => commands::checkout::run(dir, price_id, plan_tier).await,
        Some(Commands::Auth {
            ref action,
            ref token,
        }) => commands::auth::run(dir, action.as_ref(), token.as_deref()).await,
        Some(Commands::Status) | None => commands::status::run(dir, cli.format).await,
    }
}
