//! Remote media acquisition endpoint.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;
use tokio::sync::mpsc;

use mediaforge_core::fetcher::DownloadProgress;
use mediaforge_core::RemoteSourceDescriptor;

use super::error::ApiError;
use crate::metrics::MEDIA_FETCHES_TOTAL;
use crate::state::AppState;

pub const FILENAME_HEADER: &str = "x-media-filename";
pub const EXTENSION_HEADER: &str = "x-media-extension";

const PROGRESS_BUFFER: usize = 32;

pub async fn media_fetch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RemoteSourceDescriptor>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(source) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let host = log_host(&source.url);
    tracing::info!(host = %host, mode = ?source.mode, "Media fetch requested");

    let (progress_tx, progress_rx) = mpsc::channel(PROGRESS_BUFFER);
    tokio::spawn(log_progress(host.clone(), progress_rx));

    let media = match state.fetcher().fetch(&source, Some(progress_tx)).await {
        Ok(media) => media,
        Err(e) => {
            let outcome = if e.is_client_error() { "rejected" } else { "failure" };
            MEDIA_FETCHES_TOTAL.with_label_values(&["none", outcome]).inc();
            tracing::warn!(host = %host, error = %e, "Media fetch failed");
            return Err(e.into());
        }
    };

    MEDIA_FETCHES_TOTAL
        .with_label_values(&[media.source.as_str(), "success"])
        .inc();
    tracing::info!(
        host = %host,
        source = media.source.as_str(),
        format = %media.format,
        content_length = ?media.content_length,
        "Streaming fetched media"
    );

    let filename = HeaderValue::from_str(&media.filename)
        .unwrap_or_else(|_| HeaderValue::from_static("media"));

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, media.content_type.as_str())
        .header(FILENAME_HEADER, filename)
        .header(EXTENSION_HEADER, media.format.extension())
        .header(header::CACHE_CONTROL, "no-store");
    if let Some(len) = media.content_length {
        builder = builder.header(header::CONTENT_LENGTH, len);
    }

    builder
        .body(Body::from_stream(media.body))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Host part of the requested URL, for logs. Never the full URL.
fn log_host(raw: &str) -> String {
    parse_host(raw).unwrap_or_else(|| "<invalid>".to_string())
}

fn parse_host(raw: &str) -> Option<String> {
    let rest = raw.split_once("://")?.1;
    let authority = rest.split(|c| matches!(c, '/' | '?' | '#')).next()?;
    let host = authority.rsplit('@').next()?;
    (!host.is_empty()).then(|| host.to_string())
}

async fn log_progress(host: String, mut rx: mpsc::Receiver<DownloadProgress>) {
    let mut last_logged = 0u64;
    while let Some(progress) = rx.recv().await {
        if progress.bytes_received - last_logged < 1024 * 1024 {
            continue;
        }
        last_logged = progress.bytes_received;
        tracing::debug!(
            host = %host,
            bytes = progress.bytes_received,
            total = ?progress.total_bytes,
            percent = ?progress.percent(),
            bytes_per_sec = progress.bytes_per_sec,
            eta_secs = ?progress.eta_secs,
            "Download progress"
        );
    }
}
