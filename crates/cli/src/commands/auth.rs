//! Auth command: manage the stored session

use anyhow::{bail, Result};
use colored::Colorize;
use plansync_core::Identity;
use std::path::Path;

use crate::context::Context;
use crate::output::terminal;
use crate::session::FileSession;

/// Runs `plansync auth` with the given action.
///
/// - `--token <TOKEN>`: verify the token, store the session, show the plan
/// - `status` (default): show who is signed in
/// - `logout`: remove the stored session
pub async fn run(dir: &Path, action: Option<&AuthAction>, token: Option<&str>) -> Result<()> {
    if let Some(t) = token {
        let ctx = Context::load(dir)?;
        return run_set_token(&ctx, t).await;
    }

    let session = FileSession::open_default()?;
    match action {
        Some(AuthAction::Logout) => run_logout(&session),
        Some(AuthAction::Status) | None => run_status(&session),
    }
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum AuthAction {
    /// Show the signed-in user
    Status,
    /// Remove the stored session
    Logout,
}

/// Verifies `token` against the backend, then stores it as the session.
pub async fn run_set_token(ctx: &Context, token: &str) -> Result<()> {
    let coordinator = ctx.backend.coordinator();

    eprint!("  Verifying token... ");
    let user_id = match ctx.client.user_id(token.trim()).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            eprintln!("{}", "rejected".red());
            coordinator.shutdown().await;
            bail!("The backend did not accept this token");
        }
        Err(e) => {
            eprintln!("{}", "failed".red());
            coordinator.shutdown().await;
            return Err(e);
        }
    };
    eprintln!("{}", "done".green());

    ctx.session.save(&Identity {
        user_id: user_id.clone(),
        access_token: token.trim().to_string(),
    })?;
    eprintln!("  {} Signed in as {}", "\u{2713}".green(), user_id.bold());
    eprintln!();

    let result = ctx.backend.fetcher().refresh().await;
    coordinator.shutdown().await;

    for line in terminal::format_entitlement(&result?) {
        eprintln!("{}", line);
    }
    eprintln!();
    Ok(())
}

fn run_status(session: &FileSession) -> Result<()> {
    match session.load() {
        Some(identity) => {
            eprintln!("  {}: {}", "Signed in as".bold(), identity.user_id.cyan());
        }
        None => {
            eprintln!("  {}", "Not signed in.".dimmed());
            eprintln!("  Run {} to sign in.", "plansync auth --token <TOKEN>".bold());
        }
    }
    Ok(())
}

fn run_logout(session: &FileSession) -> Result<()> {
    session.remove()?;
    eprintln!("  {} Signed out.", "\u{2713}".green());
    Ok(())
}
