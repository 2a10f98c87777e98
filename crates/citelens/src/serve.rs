//! HTTP viewer.
//!
//! ```text
//! POST /documents?name=…       upload raw bytes, sample citations
//! GET  /citations              sampled citations of the open document
//! GET  /citations/{id}/link    navigation query for one citation
//! GET  /preview/{id}           debounced hover preview of one citation
//! GET  /view?…                 decode a navigation query, relocate it
//! GET  /render?…[&surface=…]   PNG of the page with the overlay drawn
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use citelens_core::{Citation, HighlightQuery, HighlightRegion};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;
use crate::debounce::Debouncer;
use crate::prelude::{eprintln, *};
use crate::render::{RenderOutcome, RenderScheduler};
use crate::session::Session;

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;
const DEFAULT_SURFACE: &str = "main";

#[derive(Debug, clap::Args, Clone)]
pub struct Options {
    /// Host to bind
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    pub port: u16,

    /// Document to open at startup
    #[arg(long)]
    pub open: Option<PathBuf>,
}

pub struct AppState {
    pub session: Session,
    pub debouncer: Debouncer,
    pub scheduler: RenderScheduler,
}

impl AppState {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            session: Session::new(config),
            debouncer: Debouncer::new(config.debounce()),
            scheduler: RenderScheduler::new(),
        }
    }
}

type SharedState = Arc<AppState>;

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/documents", post(upload_document))
        .route("/citations", get(list_citations))
        .route("/citations/{id}/link", get(citation_link))
        .route("/preview/{id}", get(preview_citation))
        .route("/view", get(view))
        .route("/render", get(render_page))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

pub async fn run(options: Options, global: crate::Global) -> Result<()> {
    let config = global.app_config()?;
    let state = Arc::new(AppState::new(&config));

    if let Some(path) = &options.open {
        let open = crate::open_file(&state.session, path).await?;
        if global.verbose {
            eprintln!(
                "Opened {} with {} citations",
                open.document.name,
                open.citations.len()
            );
        }
    }

    let addr = format!("{}:{}", options.host, options.port);
    if global.verbose {
        eprintln!("citelens viewer listening on http://{}", addr);
    }

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| eyre!("Failed to bind to {}: {}", addr, e))?;

    axum::serve(listener, router(state))
        .await
        .map_err(|e| eyre!("Server error: {e}"))?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl From<citelens_core::QueryError> for ApiError {
    fn from(err: citelens_core::QueryError) -> Self {
        ApiError(err.into())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            Error::NoDocument
            | Error::NotOpen(_)
            | Error::UnknownCitation(_)
            | Error::PageNotFound(_) => StatusCode::NOT_FOUND,
            Error::Decode { .. } | Error::UnsupportedFormat(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Query(_) => StatusCode::BAD_REQUEST,
            Error::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        log::warn!("request failed with {status}: {}", self.0);
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub name: String,
}

async fn upload_document(
    State(state): State<SharedState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let open = state.session.open(&params.name, body.to_vec()).await?;
    Ok(Json(open.as_ref()).into_response())
}

async fn list_citations(State(state): State<SharedState>) -> Result<Json<Vec<Citation>>, ApiError> {
    Ok(Json(state.session.citations().await?))
}

async fn citation_link(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let open = state.session.current().await.ok_or(Error::NoDocument)?;
    let citation = open
        .citation(&id)
        .ok_or_else(|| Error::UnknownCitation(id.clone()))?;
    let query = open.link(citation).to_query_string();

    Ok(Json(serde_json::json!({
        "id": id,
        "query": query,
        "url": format!("/view?{query}"),
    })))
}

async fn preview_citation(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let outcome = state
        .debouncer
        .run(|| state.session.relocate_citation(&id))
        .await;

    match outcome {
        Some(located) => Ok(Json(located?).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn view(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let query = HighlightQuery::from_params(&params)?;
    let located = state.session.resolve(&query).await?;
    Ok(Json(located).into_response())
}

async fn render_page(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let query = HighlightQuery::from_params(&params)?;
    let surface = params
        .get("surface")
        .map(String::as_str)
        .unwrap_or(DEFAULT_SURFACE);

    let located = state.session.resolve(&query).await?;
    let Some(HighlightRegion::Box { page, bbox }) = located.relocation.region else {
        return Err(Error::Query("rendering needs a paged query".to_string()).into());
    };
    let job = state.session.render_job(page, Some(bbox)).await?;

    match state.scheduler.render(surface, job).await? {
        RenderOutcome::Rendered(png) => Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response()),
        RenderOutcome::Cancelled => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::report_pdf;
    use std::time::Duration;

    async fn state_with_report() -> SharedState {
        let state = Arc::new(AppState::new(&AppConfig::default()));
        upload_document(
            State(state.clone()),
            Query(UploadParams {
                name: "report.pdf".to_string(),
            }),
            Bytes::from(report_pdf()),
        )
        .await
        .unwrap();
        state
    }

    fn params(query: &str) -> Query<HashMap<String, String>> {
        let map = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Query(map)
    }

    #[tokio::test]
    async fn test_upload_then_list() {
        let state = state_with_report().await;
        let Json(citations) = list_citations(State(state)).await.unwrap();
        assert!(!citations.is_empty() && citations.len() <= 5);
        let value = serde_json::to_value(&citations).unwrap();
        assert_eq!(value[0]["snippet"]["anchor"]["format"], "paged");
    }

    #[tokio::test]
    async fn test_upload_returns_document_and_citations() {
        let state = Arc::new(AppState::new(&AppConfig::default()));
        let response = upload_document(
            State(state.clone()),
            Query(UploadParams {
                name: "report.pdf".to_string(),
            }),
            Bytes::from(report_pdf()),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["document"]["name"], "report.pdf");
        assert_eq!(
            value["citations"].as_array().unwrap().len(),
            state.session.citations().await.unwrap().len()
        );
    }

    #[tokio::test]
    async fn test_list_without_document_is_not_found() {
        let state = Arc::new(AppState::new(&AppConfig::default()));
        let err = list_citations(State(state)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_garbage_is_unprocessable() {
        let state = Arc::new(AppState::new(&AppConfig::default()));
        let err = upload_document(
            State(state),
            Query(UploadParams {
                name: "x.bin".to_string(),
            }),
            Bytes::from_static(&[0xff, 0xfe, 0x00, 0x81]),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_link_round_trips_through_view() {
        let state = state_with_report().await;
        let open = state.session.current().await.unwrap();
        let id = open.citations[0].id.to_string();

        let Json(link) = citation_link(State(state.clone()), Path(id)).await.unwrap();
        let query = link["query"].as_str().unwrap().to_string();
        assert!(query.starts_with("file=report.pdf&page="));

        let parsed = HighlightQuery::parse(&query).unwrap();
        let located = state.session.resolve(&parsed).await.unwrap();
        assert_eq!(located.relocation.context.highlighted(), open.citations[0].snippet.first_line());

        let response = view(State(state), params(&query)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_view_rejects_bad_query() {
        let state = state_with_report().await;
        let err = view(State(state), params("page=1")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_render_returns_png() {
        let state = state_with_report().await;
        let response = render_page(
            State(state),
            params("file=report.pdf&page=1&x=72&y=680&width=200&height=11&surface=main"),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    }

    #[tokio::test(start_paused = true)]
    async fn test_preview_only_latest_hover_answers() {
        let mut config = AppConfig::default();
        config.debounce_ms = 200;
        let state = Arc::new(AppState::new(&config));
        state.session.open("report.pdf", report_pdf()).await.unwrap();
        let id = state.session.citations().await.unwrap()[0].id.to_string();

        let early = {
            let state = state.clone();
            let id = id.clone();
            tokio::spawn(async move { preview_citation(State(state), Path(id)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let late = preview_citation(State(state), Path(id)).await.unwrap();

        assert_eq!(early.await.unwrap().unwrap().status(), StatusCode::NO_CONTENT);
        assert_eq!(late.status(), StatusCode::OK);
    }
}
