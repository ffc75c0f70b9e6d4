use std::path::Path;
use std::sync::Arc;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeader;

use crate::carousel::Carousel;

pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
pub const HLS_ROUTE: &str = "/hls";

/// Serves the segment directory and live playlist as plain files. Players
/// must re-fetch the playlist on every poll, so nothing is cacheable.
pub fn hls_files(hls_dir: &Path) -> SetResponseHeader<ServeDir, HeaderValue> {
    SetResponseHeader::overriding(
        ServeDir::new(hls_dir),
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache"),
    )
}

/// Points players at the live playlist under whatever name it is configured.
pub fn live_redirect(carousel: &Carousel) -> Response {
    match carousel.playlist_path().file_name().and_then(|n| n.to_str()) {
        Some(name) => Redirect::temporary(&format!("{HLS_ROUTE}/{name}")).into_response(),
        None => {
            tracing::error!(path = %carousel.playlist_path().display(), "playlist path has no file name");
            (StatusCode::INTERNAL_SERVER_ERROR, "no live playlist").into_response()
        }
    }
}

/// The live playlist closed with `#EXT-X-ENDLIST`, for offline players.
pub async fn snapshot_response(carousel: Arc<Carousel>) -> Response {
    match tokio::task::spawn_blocking(move || carousel.snapshot()).await {
        Ok(Ok(Some(playlist))) => (
            [(header::CONTENT_TYPE, PLAYLIST_CONTENT_TYPE)],
            playlist,
        )
            .into_response(),
        Ok(Ok(None)) => (StatusCode::NOT_FOUND, "no clips uploaded yet").into_response(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "failed to read playlist for snapshot");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to read playlist").into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "snapshot task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to read playlist").into_response()
        }
    }
}
