//! HTTP adapters for a PostgREST-style hosted backend
//!
//! Raw backend codes are classified into [`StoreErrorKind`] here and nowhere
//! else.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;

use crate::config::BackendConfig;
use crate::error::{FunctionError, StoreError, StoreErrorKind};
use crate::types::{CheckoutRequest, CheckoutResponse, Identity, Subscription};

use super::{CheckoutFunction, SubscriptionStore};

/// Asks PostgREST for a single JSON object instead of an array; zero rows
/// then come back as `PGRST116`.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Shared HTTP client for one backend.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: Option<String>,
}

#[derive(Deserialize)]
struct UserResponse {
    id: String,
}

#[derive(Deserialize, Default)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize, Default)]
struct FunctionErrorBody {
    error: Option<String>,
}

impl RestClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            bail!("Backend URL is not configured (set [backend].url or PLANSYNC_URL)");
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
        })
    }

    fn authorized(&self, builder: RequestBuilder, access_token: &str) -> RequestBuilder {
        let builder = builder.header(AUTHORIZATION, format!("Bearer {}", access_token));
        match &self.anon_key {
            Some(key) => builder.header("apikey", key),
            None => builder,
        }
    }

    /// Resolves the user id behind `access_token`. `None` if the backend
    /// rejects the token.
    pub async fn user_id(&self, access_token: &str) -> Result<Option<String>> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let resp = self
            .authorized(self.http.get(url), access_token)
            .send()
            .await
            .context("Failed to reach the auth endpoint")?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Auth endpoint returned HTTP {}: {}", status.as_u16(), body.trim());
        }

        let user: UserResponse = resp
            .json()
            .await
            .context("Invalid response from the auth endpoint")?;
        Ok(Some(user.id))
    }
}

/// Subscription rows served by PostgREST.
#[derive(Debug, Clone)]
pub struct RestSubscriptionStore {
    client: RestClient,
    table: String,
}

impl RestSubscriptionStore {
    pub fn new(client: RestClient, table: &str) -> Self {
        Self {
            client,
            table: table.to_string(),
        }
    }
}

#[async_trait]
impl SubscriptionStore for RestSubscriptionStore {
    async fn find_entitled(
        &self,
        identity: &Identity,
        statuses: &[&str],
    ) -> Result<Subscription, StoreError> {
        let url = format!("{}/rest/v1/{}", self.client.base_url, self.table);
        let query = [
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", identity.user_id)),
            ("status", status_filter(statuses)),
        ];
        let resp = self
            .client
            .authorized(self.client.http.get(url), &identity.access_token)
            .header(ACCEPT, SINGLE_OBJECT)
            .query(&query)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_error_body(status.as_u16(), &body));
        }

        resp.json().await.map_err(|e| {
            StoreError::new(StoreErrorKind::Other, format!("Malformed subscription row: {e}"))
        })
    }
}

/// Remote "create checkout" function served under `/functions/v1/`.
#[derive(Debug, Clone)]
pub struct RestCheckoutFunction {
    client: RestClient,
    function: String,
}

impl RestCheckoutFunction {
    pub fn new(client: RestClient, function: &str) -> Self {
        Self {
            client,
            function: function.to_string(),
        }
    }
}

#[async_trait]
impl CheckoutFunction for RestCheckoutFunction {
    async fn create_checkout(
        &self,
        identity: &Identity,
        request: &CheckoutRequest,
    ) -> Result<CheckoutResponse, FunctionError> {
        let url = format!("{}/functions/v1/{}", self.client.base_url, self.function);
        let resp = self
            .client
            .authorized(self.client.http.post(url), &identity.access_token)
            .json(request)
            .send()
            .await
            .map_err(|e| FunctionError::new(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| FunctionError::new(e.to_string()))?;

        if !status.is_success() {
            return Err(function_error_from_body(&body));
        }
        serde_json::from_str(&body)
            .map_err(|e| FunctionError::new(format!("Malformed checkout response: {e}")))
    }
}

pub(crate) fn status_filter(statuses: &[&str]) -> String {
    format!("in.({})", statuses.join(","))
}

pub(crate) fn classify_error_body(http_status: u16, body: &str) -> StoreError {
    let parsed: PostgrestError = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .unwrap_or_else(|| format!("HTTP {}", http_status));
    StoreError::classify(Some(http_status), parsed.code.as_deref(), message)
}

pub(crate) fn function_error_from_body(body: &str) -> FunctionError {
    let parsed: FunctionErrorBody = serde_json::from_str(body).unwrap_or_default();
    FunctionError {
        message: parsed.error.filter(|m| !m.is_empty()),
    }
}

fn transport_error(e: reqwest::Error) -> StoreError {
    StoreError::new(StoreErrorKind::Transport, e.to_string())
}
