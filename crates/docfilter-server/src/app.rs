use crate::metrics::{FIELD_ERRORS_TOTAL, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_SECONDS};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use docfilter_core::{FilterError, FilterSet, FormData};
use docfilter_storage::Catalog;
use prometheus::{Encoder, TextEncoder};
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/sets", get(list_sets))
        .route("/v1/:set/search", get(search))
        .route("/v1/:set/explain", get(explain))
        .route("/v1/:set/form", get(form))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Error body plus status, counted on the way out.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn unknown_set(name: &str) -> Self {
        ApiError {
            status: StatusCode::NOT_FOUND,
            message: format!("unknown filter set: {name}"),
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(e: FilterError) -> Self {
        let status = match &e {
            FilterError::MissingNestedPath(_) | FilterError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            FilterError::IndexNotFound(_) => StatusCode::NOT_FOUND,
            FilterError::Backend(_) => StatusCode::BAD_GATEWAY,
            FilterError::Invalid(_) => StatusCode::BAD_REQUEST,
        };
        if e.is_configuration() {
            error!(error = %e, "filter set misconfigured");
        }
        ApiError {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"error": self.message}))).into_response()
    }
}

fn observe(route: &str, status: StatusCode) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[route, status.as_str()])
        .inc();
}

fn lookup(app: &AppState, name: &str) -> Result<FilterSet, ApiError> {
    app.catalog
        .get(name)
        .cloned()
        .ok_or_else(|| ApiError::unknown_set(name))
}

/// Runs a blocking filter-set call off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: format!("search task failed: {e}"),
    })?
}

fn respond(route: &str, result: Result<JsonValue, ApiError>) -> Response {
    match result {
        Ok(body) => {
            observe(route, StatusCode::OK);
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            observe(route, e.status);
            e.into_response()
        }
    }
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn list_sets(State(app): State<AppState>) -> impl IntoResponse {
    let names: Vec<&str> = app.catalog.names().collect();
    (StatusCode::OK, Json(json!({"sets": names})))
}

async fn search(
    State(app): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Response {
    let _timer = HTTP_REQUEST_SECONDS
        .with_label_values(&["search"])
        .start_timer();
    let result = async move {
        let set = lookup(&app, &name)?;
        blocking(move || {
            let data = FormData(params);
            let bound = set.bind(&data);
            for key in bound.form().errors().keys() {
                FIELD_ERRORS_TOTAL.with_label_values(&[&name, key]).inc();
            }
            let paginated = bound.paginate()?;
            let response = paginated.search.execute()?;
            debug!(set = %name, total = response.total, hits = response.len(), "search served");
            Ok(json!({
                "total": response.total,
                "hits": response.hits,
                "page": paginated.page,
                "errors": bound.form().errors(),
            }))
        })
        .await
    }
    .await;
    respond("search", result)
}

async fn explain(
    State(app): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Response {
    let result = async move {
        let set = lookup(&app, &name)?;
        blocking(move || {
            let data = FormData(params);
            let bound = set.bind(&data);
            let paginated = bound.paginate()?;
            Ok(json!({
                "index": paginated.search.index(),
                "body": paginated.search.to_json(),
                "page": paginated.page,
                "values": bound.form().values(),
                "errors": bound.form().errors(),
            }))
        })
        .await
    }
    .await;
    respond("explain", result)
}

async fn form(State(app): State<AppState>, Path(name): Path<String>) -> Response {
    let result = lookup(&app, &name).map(|set| json!(set.form()));
    respond("form", result)
}

fn encode_metrics() -> Result<String, ApiError> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buf = Vec::new();
    encoder
        .encode(&metric_families, &mut buf)
        .map_err(|e| e.to_string())
        .and_then(|()| String::from_utf8(buf).map_err(|e| e.to_string()))
        .map_err(|message| {
            warn!(error = %message, "metrics encoding failed");
            ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message,
            }
        })
}

async fn metrics() -> Response {
    match encode_metrics() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(e) => e.into_response(),
    }
}
