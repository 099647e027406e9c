//! HTTP front end: the single-form page and the two scrape endpoints.

use crate::response::ScrapeResponse;
use crate::service::{ScrapeMode, ScrapeService};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ScrapeService>,
}

impl AppState {
    pub fn new(service: ScrapeService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Body of both scrape endpoints.
#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    #[serde(default)]
    pub url: String,
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/scrape-simple", post(scrape_simple))
        .route("/api/scrape", post(scrape_rendered))
        .with_state(state)
}

/// Start the web server.
pub async fn serve(service: ScrapeService, bind: &str) -> anyhow::Result<()> {
    let app = create_router(AppState::new(service));

    let addr: SocketAddr = bind.parse()?;
    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> &'static str {
    "ok"
}

/// Fetch with user-agent rotation and regex extraction.
async fn scrape_simple(
    State(state): State<AppState>,
    payload: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Response {
    run(state, payload, ScrapeMode::Pattern).await
}

/// Render the page and read offers with CSS selectors.
async fn scrape_rendered(
    State(state): State<AppState>,
    payload: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Response {
    run(state, payload, ScrapeMode::Rendered).await
}

async fn run(
    state: AppState,
    payload: Result<Json<ScrapeRequest>, JsonRejection>,
    mode: ScrapeMode,
) -> Response {
    let Json(request) = match payload {
        Ok(request) => request,
        Err(rejection) => {
            warn!("Rejected scrape request: {}", rejection);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": rejection.body_text() })),
            )
                .into_response();
        }
    };

    let result = state.service.scrape(&request.url, mode).await;
    ScrapeResponse::from_result(result, &request.url, state.service.config()).into_response()
}

impl IntoResponse for ScrapeResponse {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(self.content_type));

        if let Some(filename) = &self.filename {
            match HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename)) {
                Ok(value) => {
                    headers.insert(header::CONTENT_DISPOSITION, value);
                }
                Err(e) => warn!("Dropping Content-Disposition for {:?}: {}", filename, e),
            }
        }

        (self.status, headers, self.body).into_response()
    }
}
