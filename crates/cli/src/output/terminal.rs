//! Terminal output formatting

use colored::Colorize;
use plansync_core::{Entitlement, SubscriptionStatus};

/// Lines describing the entitlement, without trailing newline.
pub fn format_entitlement(entitlement: &Entitlement) -> Vec<String> {
    let Some(sub) = entitlement else {
        return vec![format!(
            "  {}: {}",
            "Plan".bold(),
            "no active subscription".dimmed()
        )];
    };

    let status = match sub.status {
        SubscriptionStatus::Active => sub.status.to_string().green(),
        SubscriptionStatus::Trialing => sub.status.to_string().cyan(),
        _ => sub.status.to_string().yellow(),
    };

    let mut lines = vec![
        format!("  {}: {}", "Plan".bold(), sub.tier.cyan()),
        format!("  {}: {}", "Status".bold(), status),
    ];
    if let Some(trial_end) = sub.trial_end {
        lines.push(format!(
            "  {}: {}",
            "Trial ends".bold(),
            trial_end.format("%Y-%m-%d")
        ));
    }
    let period_label = if sub.cancel_at_period_end {
        "Cancels on"
    } else {
        "Renews on"
    };
    lines.push(format!(
        "  {}: {}",
        period_label.bold(),
        sub.current_period_end.format("%Y-%m-%d")
    ));
    lines
}
