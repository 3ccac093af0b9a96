use mimalloc::MiMalloc;
use sheets_relay::api::{GoogleSheetsApi, build_http_client};
use sheets_relay::db::SqliteCredentialStore;
use sheets_relay::google_oauth::{GoogleOauthEndpoints, TokenManager};
use sheets_relay::service::{
    DurableQueue, LogNotifier, Notifier, SheetsDeliveryClient, WebhookNotifier,
};
use sheets_relay::types::sheets::DeliveryTarget;
use sheets_relay::{Config, RelayState, relay_router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        listen_addr = %cfg.basic.listen_addr,
        database_url = %cfg.basic.database_url,
        data_dir = %cfg.basic.data_dir.display(),
        public_base_url = %cfg.basic.public_base_url,
        spreadsheet_id = %cfg.sheet.spreadsheet_id,
        sheet_name = %cfg.sheet.sheet_name,
        loglevel = %cfg.basic.loglevel,
        admin_key_set = !cfg.basic.admin_key.is_empty(),
        "Configuration loaded"
    );
    if cfg.basic.admin_key.is_empty() {
        warn!("basic.admin_key is empty; admin endpoints will reject every request");
    }

    tokio::fs::create_dir_all(&cfg.basic.data_dir).await?;

    let http = build_http_client(&cfg.delivery)?;

    let store = SqliteCredentialStore::connect(&cfg.basic.database_url).await?;
    if cfg.google.client_id.is_empty() {
        warn!("google.client_id is not configured; authorization cannot start");
    } else {
        store
            .seed_client(&cfg.google.client_id, &cfg.google.client_secret)
            .await?;
    }

    let endpoints = GoogleOauthEndpoints::new(&cfg, http.clone())?;
    let tokens = Arc::new(TokenManager::new(Arc::new(store), Arc::new(endpoints)));

    let api = GoogleSheetsApi::new(http.clone(), cfg.google.sheets_api_base.clone());
    let delivery = Arc::new(SheetsDeliveryClient::new(
        Arc::new(api),
        DeliveryTarget::from(&cfg.sheet),
        &cfg.delivery,
    ));
    let queue = Arc::new(DurableQueue::new(&cfg.basic.data_dir));

    let notifier: Arc<dyn Notifier> = match cfg.notify.webhook_url.clone() {
        Some(url) => Arc::new(WebhookNotifier::new(http.clone(), url)),
        None => Arc::new(LogNotifier),
    };

    // Build axum router and serve
    let state = RelayState::new(tokens, queue, delivery, notifier, &cfg)?;
    let app = relay_router(state);

    let listener = TcpListener::bind(&cfg.basic.listen_addr).await?;
    info!("HTTP server listening on {}", cfg.basic.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}
