use std::sync::Arc;

use shuttle_axum::axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::aggregate::Aggregator;
use crate::render::render_page;

const HTML_CONTENT_TYPE: &str = "text/html;charset=UTF-8";
const CACHE_CONTROL: &str = "public, max-age=1209600, stale-while-revalidate=86400";

/// Downstream cache policy for search responses.
pub fn cache_control_header() -> HeaderValue {
    HeaderValue::from_static(CACHE_CONTROL)
}

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
}

impl AppState {
    pub fn new(aggregator: Aggregator) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(search_page))
        .route("/search.json", get(search_json))
        .route("/health", get(|| async { "ok" }))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Default, serde::Deserialize)]
struct SearchParams {
    #[serde(default)]
    search: Option<String>,
}

impl SearchParams {
    fn query(&self) -> &str {
        self.search.as_deref().unwrap_or_default().trim()
    }
}

async fn search_page(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let query = params.query();
    let outcome = state.aggregator.run(query).await;
    let body = render_page(query, &outcome.results, &outcome.stats);
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE)),
            (header::CACHE_CONTROL, cache_control_header()),
        ],
        body,
    )
        .into_response()
}

async fn search_json(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let outcome = state.aggregator.run(params.query()).await;
    ([(header::CACHE_CONTROL, cache_control_header())], Json(outcome)).into_response()
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "404, not found!")
}
