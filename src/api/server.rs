use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use rust_embed::Embed;
use serde::Serialize;

use crate::carousel::Carousel;
use crate::config::HttpConfig;
use crate::ingest::{IngestError, Ingestor};
use crate::ring::ClipInfo;

use super::hls;

const UPLOAD_FIELD: &str = "video";
const BYTES_PER_MB: usize = 1024 * 1024;

#[derive(Embed)]
#[folder = "src/assets/"]
struct Assets;

#[derive(Clone)]
pub struct AppState {
    pub carousel: Arc<Carousel>,
    pub ingestor: Arc<Ingestor>,
}

impl AppState {
    pub fn new(carousel: Arc<Carousel>, ingestor: Ingestor) -> Self {
        Self {
            carousel,
            ingestor: Arc::new(ingestor),
        }
    }
}

#[derive(Serialize)]
struct UploadResponse {
    status: &'static str,
    clip: ClipInfo,
}

pub fn router(state: AppState, hls_dir: PathBuf, max_upload_mb: usize) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/assets/{*path}", get(static_handler))
        .route("/live.m3u8", get(live_handler))
        .route("/api/clips", get(clips_handler))
        .route("/api/snapshot.m3u8", get(snapshot_handler))
        .route(
            "/api/upload",
            post(upload_handler).layer(DefaultBodyLimit::max(max_upload_mb * BYTES_PER_MB)),
        )
        .nest_service(hls::HLS_ROUTE, hls::hls_files(&hls_dir))
        .with_state(state)
}

pub async fn start_server(
    state: AppState,
    config: HttpConfig,
    hls_dir: PathBuf,
) -> Result<(), std::io::Error> {
    let app = router(state, hls_dir, config.max_upload_mb);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("starting HTTP server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn index_handler() -> impl IntoResponse {
    match Assets::get("index.html") {
        Some(content) => Html(content.data.to_vec()).into_response(),
        None => (StatusCode::NOT_FOUND, "index.html not found").into_response(),
    }
}

async fn static_handler(Path(path): Path<String>) -> impl IntoResponse {
    match Assets::get(&path) {
        Some(content) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            (
                [(header::CONTENT_TYPE, mime.as_ref())],
                content.data.to_vec(),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

async fn live_handler(State(state): State<AppState>) -> Response {
    hls::live_redirect(&state.carousel)
}

async fn clips_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(state.carousel.clips())
}

async fn snapshot_handler(State(state): State<AppState>) -> Response {
    hls::snapshot_response(state.carousel).await
}

async fn upload_handler(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let data = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(UPLOAD_FIELD) => match field.bytes().await {
                Ok(bytes) => break bytes,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read uploaded file");
                    return (StatusCode::BAD_REQUEST, "failed to read uploaded file")
                        .into_response();
                }
            },
            Ok(Some(_)) => continue,
            Ok(None) => {
                return (
                    StatusCode::BAD_REQUEST,
                    "missing \"video\" file in form-data",
                )
                    .into_response()
            }
            Err(e) => {
                tracing::warn!(error = %e, "malformed multipart upload");
                return (StatusCode::BAD_REQUEST, "malformed form-data").into_response();
            }
        }
    };

    if data.is_empty() {
        return (StatusCode::BAD_REQUEST, "uploaded file is empty").into_response();
    }

    match state.ingestor.ingest(&data).await {
        Ok(clip) => axum::Json(UploadResponse {
            status: "success",
            clip,
        })
        .into_response(),
        Err(e) => ingest_error_response(e),
    }
}

fn ingest_error_response(e: IngestError) -> Response {
    match e {
        IngestError::RingFull => (StatusCode::CONFLICT, "carousel is full").into_response(),
        e @ IngestError::Transcode(_) => {
            tracing::error!(error = %e, "failed to convert upload");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to convert video to HLS format",
            )
                .into_response()
        }
        e @ IngestError::TimedOut(_) => {
            tracing::warn!(error = %e, "upload splice outlived the request");
            (
                StatusCode::GATEWAY_TIMEOUT,
                "HLS playlist update still running, check /api/clips",
            )
                .into_response()
        }
        e => {
            tracing::error!(error = %e, "failed to add upload to carousel");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to update HLS playlist",
            )
                .into_response()
        }
    }
}
