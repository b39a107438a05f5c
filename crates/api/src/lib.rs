//! HTTP surface for the fulfillment saga.
//!
//! Webhook ingestion endpoints, order endpoints, and the admin read surface
//! over monitoring, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use carrier::CarrierApi;
use common::Money;
use gateway::VnpayGateway;
use metrics_exporter_prometheus::PrometheusHandle;
use monitoring::{MonitorConfig, WebhookMonitor};
use saga::{
    InMemoryCatalogService, InMemoryNotificationService, InMemoryVoucherService, Orchestrator,
};
use store::FulfillmentStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// The orchestrator with the stand-in collaborator services.
///
/// Catalog, voucher, and notification are external systems; until their real
/// clients are wired in, the in-memory implementations stand in.
pub type DefaultOrchestrator<S, C> = Orchestrator<
    S,
    C,
    InMemoryCatalogService,
    InMemoryVoucherService,
    InMemoryNotificationService,
>;

/// Shared application state accessible from all handlers.
pub struct AppState<S, C>
where
    S: FulfillmentStore + Clone + Send + Sync + 'static,
    C: CarrierApi + 'static,
{
    pub orchestrator: DefaultOrchestrator<S, C>,
    pub monitor: WebhookMonitor<S>,
    pub store: S,
    pub carrier_webhook_secret: Option<String>,
}

/// Builds the application state, seeding the stand-in catalog and voucher
/// data.
pub fn build_state<S, C>(store: S, carrier: C, config: &Config) -> Arc<AppState<S, C>>
where
    S: FulfillmentStore + Clone + Send + Sync + 'static,
    C: CarrierApi + 'static,
{
    let catalog = InMemoryCatalogService::new();
    catalog.add_product("SKU-001", "Widget", Money::from_cents(1000), 100);
    catalog.add_product("SKU-002", "Gadget", Money::from_cents(2500), 100);

    let vouchers = InMemoryVoucherService::new();
    vouchers.add_percent_voucher("SALE10", 10, Money::zero(), 1000);

    let orchestrator = Orchestrator::new(
        store.clone(),
        VnpayGateway::new(config.gateway.clone()),
        carrier,
        catalog,
        vouchers,
        InMemoryNotificationService::new(),
    );

    let monitor = WebhookMonitor::new(
        store.clone(),
        MonitorConfig {
            retention_days: config.retention_days,
            ..MonitorConfig::default()
        },
    );

    Arc::new(AppState {
        orchestrator,
        monitor,
        store,
        carrier_webhook_secret: config.carrier_webhook_secret.clone(),
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, C>(state: Arc<AppState<S, C>>, metrics_handle: PrometheusHandle) -> Router
where
    S: FulfillmentStore + Clone + Send + Sync + 'static,
    C: CarrierApi + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S, C>))
        .route("/orders/{id}", get(routes::orders::get::<S, C>))
        .route(
            "/orders/{id}/status",
            post(routes::orders::update_status::<S, C>),
        )
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S, C>))
        .route(
            "/orders/{id}/payment",
            get(routes::orders::payment_status::<S, C>),
        )
        .route(
            "/orders/{id}/payment/retry",
            post(routes::orders::retry_payment::<S, C>),
        )
        .route(
            "/orders/{id}/payment/refund",
            post(routes::orders::refund_payment::<S, C>),
        )
        .route(
            "/orders/{id}/shipping/sync",
            post(routes::orders::sync_shipping::<S, C>),
        )
        .route(
            "/webhooks/payment/ipn",
            post(routes::webhooks::payment_ipn::<S, C>),
        )
        .route(
            "/webhooks/payment/vnpay-ipn",
            post(routes::webhooks::payment_ipn::<S, C>),
        )
        .route(
            "/webhooks/shipping/status-update",
            post(routes::webhooks::carrier_status::<S, C>),
        )
        .route(
            "/admin/webhooks/metrics",
            get(routes::admin::metrics_snapshot::<S, C>),
        )
        .route(
            "/admin/webhooks/events",
            get(routes::admin::list_events::<S, C>),
        )
        .route("/admin/webhooks/health", get(routes::admin::health::<S, C>))
        .route("/admin/webhooks/export", get(routes::admin::export::<S, C>))
        .route(
            "/admin/webhooks/cleanup",
            post(routes::admin::cleanup::<S, C>),
        )
        .route("/admin/webhooks/reset", post(routes::admin::reset::<S, C>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
