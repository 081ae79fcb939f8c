//! Shared application state

use std::sync::Arc;

use crate::assets::{AssetHost, InMemoryAssetHost};
use crate::auth::{GoogleOAuth, JwtKeys};
use crate::config::Config;
use crate::events::EventPublisher;
use crate::repository::{Catalog, MemoryCatalog};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn Catalog>,
    pub assets: Arc<dyn AssetHost>,
    pub events: EventPublisher,
    pub config: Arc<Config>,
    pub jwt: Arc<JwtKeys>,
    /// Present only when Google client credentials are configured.
    pub google: Option<Arc<GoogleOAuth>>,
}

impl AppState {
    pub fn new(config: Config, catalog: Arc<dyn Catalog>, assets: Arc<dyn AssetHost>, events: EventPublisher) -> Self {
        let jwt = Arc::new(JwtKeys::from_config(&config));
        let google = config.google.clone().map(|g| Arc::new(GoogleOAuth::new(g)));
        Self { catalog, assets, events, config: Arc::new(config), jwt, google }
    }

    /// In-memory catalog and asset host, no NATS.
    pub fn in_memory(config: Config) -> Self {
        Self::new(config, Arc::new(MemoryCatalog::new()), Arc::new(InMemoryAssetHost::new()), EventPublisher::disabled())
    }
}
