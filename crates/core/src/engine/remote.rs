//! Remote venue: delegates a job to a mediaforge server.

use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use super::error::ConversionError;
use super::job::{ConversionJob, ConversionResult};
use super::progress::ProgressFn;
use crate::format::OperationKind;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Client for the server's convert endpoints.
///
/// The server answers with one buffer, so results are always `Single`. For a
/// paginated document that buffer is the first page only; the local PDF
/// rasterizer returns every page.
pub struct RemoteVenue {
    client: Client,
    base_url: String,
    timeout_secs: u64,
}

impl RemoteVenue {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, ConversionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ConversionError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_secs,
        })
    }

    /// Path segment of the server service for an operation kind.
    fn service(kind: OperationKind) -> Option<&'static str> {
        if !kind.remote_capable() {
            return None;
        }
        match kind {
            OperationKind::TimeBasedMedia => Some("media"),
            _ => Some("raster"),
        }
    }

    pub fn convert_url(&self, job: &ConversionJob) -> Option<String> {
        let service = Self::service(job.operation_kind())?;
        let mut url = format!(
            "{}/api/v1/{}/convert?from={}&to={}",
            self.base_url,
            service,
            urlencoding::encode(job.source_format().extension()),
            urlencoding::encode(job.target_format().extension()),
        );
        if let Some(quality) = job.quality_hint() {
            url.push_str(&format!("&quality={quality}"));
        }
        Some(url)
    }

    fn transport_error(&self, e: reqwest::Error) -> ConversionError {
        if e.is_timeout() {
            ConversionError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            ConversionError::Transport(e.to_string())
        }
    }

    /// Uploads the payload and streams the converted bytes back. Progress
    /// tracks the download when the server sends a Content-Length.
    pub async fn execute(
        &self,
        job: &ConversionJob,
        progress: &ProgressFn<'_>,
    ) -> Result<ConversionResult, ConversionError> {
        let url = self.convert_url(job).ok_or_else(|| {
            ConversionError::decode_unsupported(format!(
                "no remote service for {}",
                job.operation_kind()
            ))
        })?;

        tracing::debug!(job_id = %job.job_id(), %url, "Submitting remote conversion");

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(job.payload().clone())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("remote error")
                        .to_string()
                });
            return Err(ConversionError::Remote {
                status: status.as_u16(),
                message,
            });
        }
        progress(10.0, Some("uploaded"));

        let total = response.content_length().filter(|len| *len > 0);
        let mut buffer = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.transport_error(e))?;
            buffer.extend_from_slice(&chunk);
            if let Some(total) = total {
                progress(10.0 + 85.0 * (buffer.len() as f32 / total as f32), None);
            }
        }

        if buffer.is_empty() {
            return Err(ConversionError::Remote {
                status: StatusCode::NO_CONTENT.as_u16(),
                message: "empty response".to_string(),
            });
        }

        Ok(ConversionResult::Single { buffer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::MediaFormat;
    use axum::{extract::RawQuery, routing::post, Router};

    #[test]
    fn test_convert_url() {
        let venue = RemoteVenue::new("http://converter.internal:8080/", 5).unwrap();

        let job = ConversionJob::new(MediaFormat::Mp4, MediaFormat::Mkv, vec![1u8], Some(0.5))
            .unwrap();
        assert_eq!(
            venue.convert_url(&job).unwrap(),
            "http://converter.internal:8080/api/v1/media/convert?from=mp4&to=mkv&quality=0.5"
        );

        let job = ConversionJob::new(MediaFormat::Pdf, MediaFormat::Png, vec![1u8], None).unwrap();
        assert!(venue.convert_url(&job).unwrap().contains("/api/v1/raster/convert?from=pdf&to=png"));

        let job = ConversionJob::new(MediaFormat::Csv, MediaFormat::Gz, vec![1u8], None).unwrap();
        assert!(venue.convert_url(&job).is_none());
    }

    #[tokio::test]
    async fn test_paginated_document_returns_single_first_page() {
        let app = Router::new().route(
            "/api/v1/raster/convert",
            post(|RawQuery(query): RawQuery| async move {
                assert_eq!(query.as_deref(), Some("from=pdf&to=png"));
                "page-one"
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let venue = RemoteVenue::new(format!("http://{addr}"), 5).unwrap();
        let job = ConversionJob::new(MediaFormat::Pdf, MediaFormat::Png, b"%PDF-1.4".to_vec(), None)
            .unwrap();
        let result = venue.execute(&job, &|_: f32, _: Option<&str>| {}).await.unwrap();

        assert_eq!(
            result,
            ConversionResult::Single {
                buffer: b"page-one".to_vec()
            }
        );
    }
}
