//! Raw-bytes conversion endpoints backed by the sandboxed transcoders.

use axum::{
    body::{Body, Bytes},
    extract::{rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

use mediaforge_core::transcoder::{TranscodeFamily, TranscodeRequest};

use super::error::ApiError;
use crate::metrics::{CONVERSIONS_IN_FLIGHT, CONVERSIONS_TOTAL, CONVERSION_DURATION};
use crate::state::AppState;

/// Set when the output was rendered from an embedded camera preview.
pub const PREVIEW_HEADER: &str = "x-converted-from-preview";

#[derive(Debug, Deserialize)]
pub struct ConvertQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub quality: Option<f32>,
}

pub async fn convert_raster(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ConvertQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Response, ApiError> {
    convert(state, TranscodeFamily::Raster, query, body).await
}

pub async fn convert_media(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ConvertQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Response, ApiError> {
    convert(state, TranscodeFamily::Media, query, body).await
}

async fn convert(
    state: Arc<AppState>,
    family: TranscodeFamily,
    query: Result<Query<ConvertQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let (from, to) = family.validate_pair(query.from.as_deref(), query.to.as_deref())?;
    if body.is_empty() {
        return Err(ApiError::bad_request("Request body is empty"));
    }
    if let Some(q) = query.quality {
        if !(0.0..=1.0).contains(&q) {
            return Err(ApiError::bad_request("quality must be between 0.0 and 1.0"));
        }
    }

    let label = family.as_str();
    let input_len = body.len();
    tracing::info!(family = label, %from, %to, input_len, "Conversion requested");

    CONVERSIONS_IN_FLIGHT.with_label_values(&[label]).inc();
    let started = Instant::now();
    let result = state
        .transcoder(family)
        .transcode(TranscodeRequest {
            from,
            to,
            input: body,
            quality: query.quality,
        })
        .await;
    CONVERSIONS_IN_FLIGHT.with_label_values(&[label]).dec();
    CONVERSION_DURATION
        .with_label_values(&[label])
        .observe(started.elapsed().as_secs_f64());

    let output = match result {
        Ok(output) => {
            CONVERSIONS_TOTAL.with_label_values(&[label, "success"]).inc();
            output
        }
        Err(e) => {
            let outcome = if e.is_client_error() { "rejected" } else { "failure" };
            CONVERSIONS_TOTAL.with_label_values(&[label, outcome]).inc();
            tracing::warn!(family = label, %from, %to, error = %e, "Conversion failed");
            return Err(e.into());
        }
    };

    tracing::info!(
        family = label,
        %from,
        %to,
        output_len = output.bytes.len(),
        used_preview = output.used_preview,
        "Conversion complete"
    );

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, output.bytes.len());
    if output.used_preview {
        builder = builder.header(PREVIEW_HEADER, "true");
    }

    builder
        .body(Body::from(output.bytes))
        .map_err(|e| ApiError::Internal(e.to_string()))
}
