//! Remote media acquisition integration tests.
//!
//! A local axum server stands in for remote hosts. The fetcher's client pins
//! `media.test` to it while the guard sees a public address for that name,
//! so redirect validation can be exercised end to end.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Redirect},
    routing::get,
    Router,
};
use futures::StreamExt;
use reqwest::redirect;
use tempfile::TempDir;
use tokio::sync::mpsc;

use mediaforge_core::{
    fetcher::{
        FetchError, FetchMode, FetchSource, FetcherConfig, MediaFetcher, RemoteSourceDescriptor,
    },
    format::MediaFormat,
    testing::StaticResolver,
};

const SONG: &[u8] = &[7u8; 64 * 1024];

struct Remote {
    addr: SocketAddr,
    start_hits: Arc<AtomicUsize>,
}

async fn remote() -> Remote {
    let start_hits = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&start_hits);

    let app = Router::new()
        .route(
            "/song.mp3",
            get(|| async { ([(header::CONTENT_TYPE, "audio/mpeg")], SONG) }),
        )
        .route(
            "/start",
            get(move || {
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Redirect::temporary("http://169.254.169.254/latest/meta-data")
                }
            }),
        )
        .route("/hop", get(|| async { Redirect::temporary("/song.mp3") }))
        .route("/loop", get(|| async { Redirect::temporary("/loop") }))
        .route(
            "/watch",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                    "<html><video src=\"blob:x\"></video></html>",
                )
            }),
        )
        .route("/missing", get(|| async { StatusCode::NOT_FOUND.into_response() }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    Remote { addr, start_hits }
}

fn public_resolver() -> Arc<StaticResolver> {
    let public: IpAddr = "93.184.216.34".parse().unwrap();
    Arc::new(StaticResolver::new().with_host("media.test", vec![public]))
}

fn fetcher(remote: &Remote, config: FetcherConfig, resolver: Arc<StaticResolver>) -> MediaFetcher {
    let client = reqwest::Client::builder()
        .redirect(redirect::Policy::none())
        .resolve("media.test", remote.addr)
        .build()
        .unwrap();
    MediaFetcher::with_parts(config, client, resolver).unwrap()
}

fn source(remote: &Remote, path: &str, mode: FetchMode) -> RemoteSourceDescriptor {
    RemoteSourceDescriptor {
        url: format!("http://media.test:{}{}", remote.addr.port(), path),
        mode,
    }
}

async fn collect(body: mediaforge_core::fetcher::MediaStream) -> Vec<u8> {
    body.fold(Vec::new(), |mut acc, chunk| async move {
        acc.extend_from_slice(&chunk.unwrap());
        acc
    })
    .await
}

#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[tokio::test]
async fn test_direct_media_streams_with_progress() {
    let remote = remote().await;
    let fetcher = fetcher(&remote, FetcherConfig::default(), public_resolver());
    let (tx, mut rx) = mpsc::channel(1024);

    let media = fetcher
        .fetch(&source(&remote, "/song.mp3", FetchMode::Audio), Some(tx))
        .await
        .unwrap();

    assert_eq!(media.source, FetchSource::Direct);
    assert_eq!(media.format, MediaFormat::Mp3);
    assert_eq!(media.filename, "song.mp3");
    assert_eq!(media.content_type, "audio/mpeg");
    assert_eq!(media.content_length, Some(SONG.len() as u64));

    let body = collect(media.body).await;
    assert_eq!(body.len(), SONG.len());

    let mut last = None;
    while let Ok(progress) = rx.try_recv() {
        last = Some(progress);
    }
    let last = last.expect("at least one progress update");
    assert_eq!(last.bytes_received, SONG.len() as u64);
    assert_eq!(last.total_bytes, Some(SONG.len() as u64));
}

#[tokio::test]
async fn test_redirect_to_metadata_address_is_blocked() {
    let remote = remote().await;
    let fetcher = fetcher(&remote, FetcherConfig::default(), public_resolver());

    let err = fetcher
        .fetch(&source(&remote, "/start", FetchMode::Video), None)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::BlockedNetworkTarget { .. }));
    assert!(err.to_string().contains("private"));
    assert_eq!(remote.start_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_relative_redirect_is_revalidated_and_followed() {
    let remote = remote().await;
    let resolver = public_resolver();
    let fetcher = fetcher(&remote, FetcherConfig::default(), resolver.clone());

    let media = fetcher
        .fetch(&source(&remote, "/hop", FetchMode::Audio), None)
        .await
        .unwrap();

    assert_eq!(media.format, MediaFormat::Mp3);
    assert_eq!(collect(media.body).await.len(), SONG.len());
    assert_eq!(resolver.lookups(), 2);
}

#[tokio::test]
async fn test_redirect_limit() {
    let remote = remote().await;
    let config = FetcherConfig::default().with_max_redirects(3);
    let fetcher = fetcher(&remote, config, public_resolver());

    let err = fetcher
        .fetch(&source(&remote, "/loop", FetchMode::Video), None)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Download(_)));
}

#[tokio::test]
async fn test_private_target_is_rejected_before_any_request() {
    let remote = remote().await;
    let resolver = Arc::new(
        StaticResolver::new().with_host("media.test", vec!["10.0.0.7".parse().unwrap()]),
    );
    let fetcher = fetcher(&remote, FetcherConfig::default(), resolver);

    let err = fetcher
        .fetch(&source(&remote, "/start", FetchMode::Video), None)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::BlockedNetworkTarget { .. }));
    assert_eq!(remote.start_hits.load(Ordering::SeqCst), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_page_falls_back_to_extractor_and_cleans_up() {
    let remote = remote().await;
    let bin = TempDir::new().unwrap();
    let sandboxes = TempDir::new().unwrap();
    let extractor = write_script(bin.path(), "yt-dlp", "printf 'fake-mp4-data' > media.mp4");

    let config = FetcherConfig::default()
        .with_extractor_path(&extractor)
        .with_sandbox_root(sandboxes.path());
    let fetcher = fetcher(&remote, config, public_resolver());

    let media = fetcher
        .fetch(&source(&remote, "/watch", FetchMode::Video), None)
        .await
        .unwrap();

    assert_eq!(media.source, FetchSource::Extracted);
    assert_eq!(media.format, MediaFormat::Mp4);
    assert_eq!(media.filename, "watch.mp4");
    assert_eq!(media.content_length, Some(13));
    assert_eq!(std::fs::read_dir(sandboxes.path()).unwrap().count(), 1);

    assert_eq!(collect(media.body).await, b"fake-mp4-data");
    assert_eq!(std::fs::read_dir(sandboxes.path()).unwrap().count(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_failed_extraction_reports_and_cleans_up() {
    let remote = remote().await;
    let bin = TempDir::new().unwrap();
    let sandboxes = TempDir::new().unwrap();
    let extractor = write_script(bin.path(), "yt-dlp", "echo 'ERROR: Unsupported URL' >&2\nexit 1");

    let config = FetcherConfig::default()
        .with_extractor_path(&extractor)
        .with_sandbox_root(sandboxes.path());
    let fetcher = fetcher(&remote, config, public_resolver());

    let err = fetcher
        .fetch(&source(&remote, "/missing", FetchMode::Audio), None)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::ExtractionFailed(_)));
    assert!(err.to_string().contains("Unsupported URL"));
    assert_eq!(std::fs::read_dir(sandboxes.path()).unwrap().count(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_extractor_without_output_is_extraction_failure() {
    let remote = remote().await;
    let bin = TempDir::new().unwrap();
    let sandboxes = TempDir::new().unwrap();
    let extractor = write_script(bin.path(), "yt-dlp", "exit 0");

    let config = FetcherConfig::default()
        .with_extractor_path(&extractor)
        .with_sandbox_root(sandboxes.path());
    let fetcher = fetcher(&remote, config, public_resolver());

    let err = fetcher
        .fetch(&source(&remote, "/watch", FetchMode::Video), None)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::ExtractionFailed(_)));
    assert_eq!(std::fs::read_dir(sandboxes.path()).unwrap().count(), 0);
}
