//! Administrative read surface over monitoring and the durable webhook store.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use carrier::CarrierApi;
use chrono::{DateTime, Utc};
use monitoring::WebhookMetrics;
use serde::{Deserialize, Serialize};
use store::{FulfillmentStore, WebhookEventFilter, WebhookEventRecord, WebhookEventStore};

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub order_ref: Option<String>,
    pub success: Option<bool>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct CleanupRequest {
    pub days: Option<i64>,
}

#[derive(Serialize)]
pub struct EventsResponse {
    pub events: Vec<WebhookEventRecord>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Serialize)]
pub struct HealthStatusResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct CleanupResponse {
    pub removed: u64,
}

impl EventsQuery {
    fn into_filter(self) -> WebhookEventFilter {
        let per_page = self.per_page.clamp(1, 500);
        let page = self.page.max(1);
        WebhookEventFilter {
            order_ref: self.order_ref,
            success: self.success,
            from: self.from,
            to: self.to,
            limit: per_page,
            offset: (page - 1) * per_page,
        }
    }
}

/// GET /admin/webhooks/metrics — rolling metrics snapshot.
pub async fn metrics_snapshot<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
) -> Json<WebhookMetrics>
where
    S: FulfillmentStore + Clone + Send + Sync + 'static,
    C: CarrierApi + 'static,
{
    Json(state.monitor.snapshot().await)
}

/// GET /admin/webhooks/events — paginated durable event listing.
#[tracing::instrument(skip(state))]
pub async fn list_events<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<EventsResponse>, ApiError>
where
    S: FulfillmentStore + Clone + Send + Sync + 'static,
    C: CarrierApi + 'static,
{
    let page = query.page.max(1);
    let per_page = query.per_page.clamp(1, 500);
    let filter = query.into_filter();

    let events = state.store.list_webhook_events(&filter).await?;
    let total = state.store.count_webhook_events(&filter).await?;

    Ok(Json(EventsResponse {
        events,
        total,
        page,
        per_page,
    }))
}

/// GET /admin/webhooks/health — derived tri-level health.
pub async fn health<S, C>(State(state): State<Arc<AppState<S, C>>>) -> Json<HealthStatusResponse>
where
    S: FulfillmentStore + Clone + Send + Sync + 'static,
    C: CarrierApi + 'static,
{
    Json(HealthStatusResponse {
        status: state.monitor.health().await.as_str(),
    })
}

/// GET /admin/webhooks/export?format=csv|json — durable event export.
#[tracing::instrument(skip(state))]
pub async fn export<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError>
where
    S: FulfillmentStore + Clone + Send + Sync + 'static,
    C: CarrierApi + 'static,
{
    let filter = WebhookEventFilter {
        limit: 10_000,
        ..Default::default()
    };
    let events = state.store.list_webhook_events(&filter).await?;

    match query.format.as_deref() {
        Some("csv") => {
            let mut csv = String::from(
                "id,source,order_ref,response_code,duration_ms,success,error,received_at\n",
            );
            for event in &events {
                csv.push_str(&format!(
                    "{},{},{},{},{},{},{},{}\n",
                    event.id,
                    event.source,
                    csv_field(event.order_ref.as_deref()),
                    csv_field(event.response_code.as_deref()),
                    event.duration_ms,
                    event.success,
                    csv_field(event.error.as_deref()),
                    event.received_at.to_rfc3339(),
                ));
            }
            Ok((
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
                csv,
            )
                .into_response())
        }
        _ => Ok(Json(events).into_response()),
    }
}

/// Quotes a CSV field when it contains a delimiter.
fn csv_field(value: Option<&str>) -> String {
    let value = value.unwrap_or("");
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// POST /admin/webhooks/cleanup — on-demand retention cleanup.
#[tracing::instrument(skip(state, req))]
pub async fn cleanup<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    req: Option<Json<CleanupRequest>>,
) -> Result<Json<CleanupResponse>, ApiError>
where
    S: FulfillmentStore + Clone + Send + Sync + 'static,
    C: CarrierApi + 'static,
{
    let days = req.and_then(|Json(r)| r.days);
    let removed = state.monitor.run_retention_cleanup(days).await?;
    Ok(Json(CleanupResponse { removed }))
}

/// POST /admin/webhooks/reset — reset the in-memory aggregates.
pub async fn reset<S, C>(State(state): State<Arc<AppState<S, C>>>) -> StatusCode
where
    S: FulfillmentStore + Clone + Send + Sync + 'static,
    C: CarrierApi + 'static,
{
    state.monitor.reset().await;
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field(Some("plain")), "plain");
        assert_eq!(csv_field(Some("a,b")), "\"a,b\"");
        assert_eq!(csv_field(Some("say \"hi\"")), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field(None), "");
    }

    #[test]
    fn test_events_query_pagination_to_filter() {
        let query = EventsQuery {
            order_ref: None,
            success: Some(false),
            from: None,
            to: None,
            page: 3,
            per_page: 20,
        };
        let filter = query.into_filter();
        assert_eq!(filter.limit, 20);
        assert_eq!(filter.offset, 40);
        assert_eq!(filter.success, Some(false));
    }
}
