//! Health, config and metrics endpoints.

mod common;

use common::TestFixture;

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/health").await;

    assert_eq!(response.status, 200);
    let body = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["uptime_secs"].as_i64().unwrap() >= 0);
}

#[tokio::test]
async fn test_config_does_not_disclose_paths() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/config").await;

    assert_eq!(response.status, 200);
    let text = String::from_utf8(response.body.clone()).unwrap();
    assert!(!text.contains(&*fixture.sandbox_root.path().to_string_lossy()));
    assert!(!text.contains(&*fixture.bin_dir.path().to_string_lossy()));
    assert_eq!(response.json()["fetcher"]["allow_private_networks"], false);
}

#[tokio::test]
async fn test_metrics_exposition_counts_requests() {
    let fixture = TestFixture::new();
    fixture.get("/api/v1/health").await;

    let response = fixture.get("/metrics").await;

    assert_eq!(response.status, 200);
    let text = String::from_utf8(response.body).unwrap();
    assert!(text.contains("mediaforge_http_requests_total"));
    assert!(text.contains("path=\"/api/v1/health\""));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/jobs").await;
    assert_eq!(response.status, 404);
}
