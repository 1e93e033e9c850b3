//! Navigation sink for the terminal: open the system browser

use colored::Colorize;
use plansync_core::Navigator;

/// Opens checkout URLs in the default browser, falling back to printing them.
#[derive(Debug, Default)]
pub struct BrowserNavigator;

impl Navigator for BrowserNavigator {
    fn navigate(&self, url: &str) {
        eprintln!("{}", "  Opening checkout in your browser...".bold());
        if let Err(e) = open::that(url) {
            tracing::warn!(error = %e, "could not open browser");
            eprintln!("  {} Could not open browser: {}", "Error:".red().bold(), e);
            eprintln!("  Continue checkout at {}", url.bold());
        }
    }
}
