use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use news_headlines::collector::{start_collector, Collector};
use news_headlines::config::Config;
use news_headlines::db::Database;
use news_headlines::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "news_headlines=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("HEADLINES_CONFIG").unwrap_or_else(|_| "headlines.toml".to_string());
    let config = if Path::new(&config_path).exists() {
        Config::load(&config_path)?
    } else {
        info!("No configuration at {}, using defaults", config_path);
        Config::default()
    };
    info!(
        "Collector {} for {}",
        if config.collector.enabled { "enabled" } else { "disabled" },
        config.collector.resolved_rss_url()
    );

    // Initialize database
    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| config.database_url.clone());
    let db = Database::new(&database_url).await?;
    db.initialize().await?;
    info!("Database initialized");

    let db = Arc::new(db);

    // Start background collection
    let collector = Arc::new(Collector::new(db.clone(), config.collector.clone())?);
    let delay = collector.config().fixed_delay();
    tokio::spawn(async move {
        start_collector(collector, delay).await;
    });

    let state = Arc::new(AppState { db: db.clone() });
    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Server starting on http://{}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
