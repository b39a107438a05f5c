//! API server entry point.

use std::sync::Arc;
use std::time::Duration;

use api::config::Config;
use carrier::{CarrierApi, GhnClient};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{FulfillmentStore, InMemoryStore, PostgresStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Spawns the fixed-interval background sweeps: shipment-intent retry,
/// abandoned-payment cancellation, and webhook retention cleanup.
fn spawn_sweeps<S, C>(state: Arc<api::AppState<S, C>>, config: &Config)
where
    S: FulfillmentStore + Clone + Send + Sync + 'static,
    C: CarrierApi + 'static,
{
    let sweep_state = state.clone();
    let sweep_secs = config.sweep_interval_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(sweep_secs));
        loop {
            interval.tick().await;
            if let Err(e) = sweep_state.orchestrator.sweep_pending_shipments().await {
                tracing::warn!(error = %e, "shipment sweep failed");
            }
            if let Err(e) = sweep_state.orchestrator.sweep_stale_payments().await {
                tracing::warn!(error = %e, "stale payment sweep failed");
            }
        }
    });

    let retention_state = state;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            if let Err(e) = retention_state.monitor.run_retention_cleanup(None).await {
                tracing::warn!(error = %e, "webhook retention cleanup failed");
            }
        }
    });
}

async fn serve<S>(store: S, config: Config, metrics_handle: PrometheusHandle)
where
    S: FulfillmentStore + Clone + Send + Sync + 'static,
{
    let carrier = GhnClient::new(config.carrier.clone()).expect("failed to build carrier client");

    // Opportunistic expire-sweep of the carrier address cache.
    let cache_carrier = carrier.clone();
    let cache_ttl = config.carrier.cache_ttl_secs.max(60);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(cache_ttl));
        loop {
            interval.tick().await;
            let removed = cache_carrier.sweep_address_cache().await;
            if removed > 0 {
                tracing::debug!(removed, "expired address cache entries swept");
            }
        }
    });

    let state = api::build_state(store, carrier, &config);

    spawn_sweeps(state.clone(), &config);

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let config = Config::from_env();

    // 3. Pick the store: Postgres when configured, in-memory otherwise
    match config.database_url.clone() {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to database");
            let store = PostgresStore::new(pool);
            store.run_migrations().await.expect("migrations failed");
            serve(store, config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            serve(InMemoryStore::new(), config, metrics_handle).await;
        }
    }
}
