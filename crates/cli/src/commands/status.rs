//! `plansync status`: show the current entitlement

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::context::Context;
use crate::output::{json, terminal};
use crate::OutputFormat;

pub async fn run(dir: &Path, format: OutputFormat) -> Result<()> {
    let ctx = Context::load(dir)?;
    let entitlement = ctx.backend.fetcher().current().await?;

    match format {
        OutputFormat::Json => println!("{}", json::render(&entitlement)?),
        OutputFormat::Terminal => {
            for line in terminal::format_entitlement(&entitlement) {
                println!("{}", line);
            }
            if entitlement.is_none() && ctx.session.load().is_none() {
                println!(
                    "  {}",
                    "Not signed in. Run `plansync auth --token <TOKEN>` first.".dimmed()
                );
            }
        }
    }

    Ok(())
}
