//! OpenSASE Catalog service

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use opensase_catalog::assets::{AssetHost, CloudinaryHost, InMemoryAssetHost};
use opensase_catalog::events::EventPublisher;
use opensase_catalog::repository::{Catalog, MemoryCatalog, PgCatalog};
use opensase_catalog::services::TrashService;
use opensase_catalog::{api, AppState, Config};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    let catalog: Arc<dyn Catalog> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            Arc::new(PgCatalog::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory catalog");
            Arc::new(MemoryCatalog::new())
        }
    };

    let assets: Arc<dyn AssetHost> = match &config.cloudinary {
        Some(c) => Arc::new(CloudinaryHost::new(c.cloud_name.clone(), c.api_key.clone(), c.api_secret.clone())),
        None => {
            tracing::warn!("Cloudinary credentials not set, uploads are kept in memory");
            Arc::new(InMemoryAssetHost::new())
        }
    };

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, domain events will not be published");
                None
            }
        },
        None => None,
    };

    let port = config.port;
    let reconcile_every = Duration::from_secs(config.asset_reconcile_interval_secs.max(1));
    let state = AppState::new(config, catalog, assets, EventPublisher::new(nats));

    let trash = TrashService::new(&state);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(reconcile_every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match trash.reconcile_orphaned_assets(None).await {
                Ok(r) if r.released > 0 || !r.still_pending.is_empty() => {
                    tracing::info!(released = r.released, pending = r.still_pending.len(), "Orphaned assets reconciled")
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Asset reconciliation failed"),
            }
        }
    });

    let app = api::router(state);
    tracing::info!("🚀 OpenSASE Catalog listening on 0.0.0.0:{}", port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?, app).await?;
    Ok(())
}
