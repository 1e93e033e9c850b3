//! Builds the shared backend from config and the stored session

use anyhow::Result;
use plansync_core::backend::{RestCheckoutFunction, RestClient, RestSubscriptionStore};
use plansync_core::{Backend, PlansyncConfig};
use std::path::Path;
use std::sync::Arc;

use crate::navigator::BrowserNavigator;
use crate::session::FileSession;

pub struct Context {
    pub config: PlansyncConfig,
    pub session: Arc<FileSession>,
    pub client: RestClient,
    pub backend: Backend,
}

impl Context {
    /// Loads `.plansync.toml` from `dir` or its ancestors and the session
    /// from the user's config directory.
    pub fn load(dir: &Path) -> Result<Self> {
        let config = PlansyncConfig::find_and_load(dir)?;
        let session = Arc::new(FileSession::open_default()?);
        Self::new(config, session)
    }

    pub fn new(config: PlansyncConfig, session: Arc<FileSession>) -> Result<Self> {
        let client = RestClient::new(&config.backend)?;
        let store = RestSubscriptionStore::new(client.clone(), &config.backend.subscriptions_table);
        let checkout = RestCheckoutFunction::new(client.clone(), &config.backend.checkout_function);
        let backend = Backend::new(
            session.clone(),
            Arc::new(store),
            Arc::new(checkout),
            Arc::new(BrowserNavigator),
        );
        Ok(Self {
            config,
            session,
            client,
            backend,
        })
    }
}
