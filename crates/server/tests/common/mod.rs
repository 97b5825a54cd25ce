//! Common test utilities for in-process endpoint tests.
//!
//! The fixture builds the real router over real transcoders whose binaries
//! are replaced by shell scripts in a temporary directory.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use mediaforge_core::{fetcher::FetcherConfig, transcoder::TranscoderConfig, Config};
use mediaforge_server::{api::create_router, state::AppState};

pub use mediaforge_core::testing::fixtures;

/// Fake `magick`: writes `converted` to the last argument, minus any
/// `format:` prefix.
pub const MAGICK_OK: &str = r#"for last; do :; done
printf 'converted' > "${last#*:}""#;

/// Fake `magick` that leaks the sandbox path on stderr and fails.
pub const MAGICK_FAILS: &str = r#"echo "unable to open $PWD/input.png" >&2; exit 1"#;

pub struct TestFixture {
    pub router: Router,
    pub bin_dir: TempDir,
    pub sandbox_root: TempDir,
    pub fetch_root: TempDir,
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("Response body is not JSON")
    }
}

pub struct FixtureBinaries<'a> {
    pub magick: Option<&'a str>,
    pub ffmpeg: Option<&'a str>,
    pub extractor: Option<&'a str>,
}

impl Default for FixtureBinaries<'_> {
    fn default() -> Self {
        Self {
            magick: Some(MAGICK_OK),
            ffmpeg: Some("exit 1"),
            extractor: Some("exit 1"),
        }
    }
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_binaries(FixtureBinaries::default())
    }

    /// Builds a fixture; `None` keeps the binary name so `PATH` lookup
    /// finds the real tool.
    pub fn with_binaries(binaries: FixtureBinaries<'_>) -> Self {
        let bin_dir = TempDir::new().expect("Failed to create bin dir");
        let sandbox_root = TempDir::new().expect("Failed to create sandbox root");
        let fetch_root = TempDir::new().expect("Failed to create fetch root");

        let script = |name: &str, body: Option<&str>| match body {
            Some(body) => write_script(bin_dir.path(), name, body),
            None => PathBuf::from(name),
        };
        let magick = script("magick", binaries.magick);
        let ffmpeg = script("ffmpeg", binaries.ffmpeg);
        let exiftool = script("exiftool", Some("exit 1"));
        let extractor = script("yt-dlp", binaries.extractor);

        let config = Config {
            transcoder: TranscoderConfig::default()
                .with_binaries(magick, ffmpeg, exiftool)
                .with_sandbox_root(sandbox_root.path().to_path_buf())
                .with_timeout(30),
            fetcher: FetcherConfig::default()
                .with_extractor_path(extractor)
                .with_sandbox_root(fetch_root.path()),
            ..Default::default()
        };

        let state = Arc::new(AppState::from_config(config).expect("Failed to build app state"));

        Self {
            router: create_router(state),
            bin_dir,
            sandbox_root,
            fetch_root,
        }
    }

    pub fn sandboxes_left(&self) -> usize {
        std::fs::read_dir(self.sandbox_root.path())
            .map(|d| d.count())
            .unwrap_or(0)
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_bytes(&self, path: &str, body: Vec<u8>) -> TestResponse {
        self.send(
            Request::post(path)
                .header("content-type", "application/octet-stream")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> TestResponse {
        self.send(
            Request::post(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }
}

#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(not(unix))]
pub fn write_script(dir: &Path, name: &str, _body: &str) -> PathBuf {
    dir.join(name)
}
