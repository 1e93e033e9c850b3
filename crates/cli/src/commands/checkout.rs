//! `plansync checkout`: start a paid checkout in the browser

use anyhow::{bail, Result};
use colored::Colorize;
use plansync_core::Error;
use std::path::Path;

use crate::context::Context;

pub async fn run(dir: &Path, price_id: &str, plan_tier: &str) -> Result<()> {
    let ctx = Context::load(dir)?;
    let coordinator = ctx.backend.coordinator();
    let initiator = ctx.backend.checkout_initiator();

    let result = initiator.start_checkout(price_id, plan_tier).await;
    coordinator.shutdown().await;

    match result {
        Ok(redirect) => {
            eprintln!(
                "  {} Checkout started for {}. Finish payment at:",
                "\u{2713}".green(),
                plan_tier.cyan()
            );
            eprintln!("    {}", redirect.url.bold());
            eprintln!("  Run {} afterwards to see your new plan.", "plansync status".bold());
            Ok(())
        }
        Err(Error::AuthRequired) => {
            eprintln!(
                "  {} Sign in first: {}",
                "\u{26a1}".yellow(),
                "plansync auth --token <TOKEN>".bold()
            );
            bail!(Error::AuthRequired)
        }
        Err(e) => Err(e.into()),
    }
}
