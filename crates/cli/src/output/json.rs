//! JSON output formatting

use plansync_core::Entitlement;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonStatus {
    /// `true` when an active or trialing subscription exists
    pub entitled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<JsonSubscription>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonSubscription {
    pub id: String,
    pub tier: String,
    pub status: String,
    pub trial_end: Option<String>,
    pub current_period_end: String,
    pub cancel_at_period_end: bool,
}

impl From<&Entitlement> for JsonStatus {
    fn from(entitlement: &Entitlement) -> Self {
        let subscription = entitlement.as_ref().map(|sub| JsonSubscription {
            id: sub.id.clone(),
            tier: sub.tier.clone(),
            status: sub.status.to_string(),
            trial_end: sub.trial_end.map(|t| t.to_rfc3339()),
            current_period_end: sub.current_period_end.to_rfc3339(),
            cancel_at_period_end: sub.cancel_at_period_end,
        });
        Self {
            entitled: subscription.is_some(),
            subscription,
        }
    }
}

pub fn render(entitlement: &Entitlement) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonStatus::from(entitlement))
}
