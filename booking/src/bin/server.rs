//! Group booking HTTP server.
//!
//! ```bash
//! # Start Postgres, then
//! cargo run --bin server
//! ```

use anyhow::Context;
use groupbook::bootstrap;
use groupbook::server::build_router;
use groupbook::session::BaasSessionResolver;
use groupbook::store::PostgresBookingStore;
use groupbook::sweeper::ExpirySweeper;
use groupbook::Config;
use groupbook_core::environment::SystemClock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,groupbook=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(
        address = %config.server_address(),
        site_origin = %config.server.site_origin,
        "Configuration loaded"
    );

    let store = PostgresBookingStore::connect(
        &config.database.url,
        config.database.max_connections,
        config.database.min_connections,
        Duration::from_secs(config.database.connect_timeout),
    )
    .await
    .context("connecting to Postgres")?;
    store.migrate().await.context("running migrations")?;
    tracing::info!("Database ready");

    let http_timeout = config.request_timeout();
    let provider = bootstrap::email_provider(&config.email, http_timeout)?;
    let sessions = Arc::new(BaasSessionResolver::new(
        &config.auth.base_url,
        config.auth.anon_key.clone(),
        http_timeout,
    )?);

    let state = bootstrap::assemble(
        &config,
        Arc::new(SystemClock),
        Arc::new(store),
        provider,
        sessions,
    );
    let app = Arc::clone(&state.app);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let sweeper = ExpirySweeper::new(
        Arc::clone(app.workflow()),
        Duration::from_secs(config.booking.sweep_interval),
    );
    let sweeper_task = tokio::spawn(sweeper.run(shutdown_tx.subscribe()));

    let listener = tokio::net::TcpListener::bind(config.server_address())
        .await
        .with_context(|| format!("binding {}", config.server_address()))?;
    tracing::info!(address = %config.server_address(), "Listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("serving HTTP")?;

    let _ = shutdown_tx.send(());
    if let Err(e) = sweeper_task.await {
        tracing::warn!(error = %e, "Expiry sweeper ended abnormally");
    }
    if let Err(e) = app
        .shutdown(Duration::from_secs(config.server.shutdown_timeout))
        .await
    {
        tracing::warn!(error = %e, "Effects still running at shutdown");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
