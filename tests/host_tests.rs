//! Render host routing tests.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::{Project, TEMPLATE};
use http_body_util::BodyExt;
use static_prerender::RenderHost;
use static_prerender::config::ProjectPaths;
use static_prerender::host::{HostRoutes, router};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;

async fn get(project: &Project, path: &str) -> (StatusCode, Option<String>, String) {
    let routes = HostRoutes::from_paths(&ProjectPaths::from_root(project.root()));
    let response = router(routes)
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.into_body().collect().await.expect("collect body").to_bytes();
    (status, content_type, String::from_utf8_lossy(&body).into_owned())
}

/// Verifies the root and /index.html both serve the template.
#[tokio::test]
async fn test_serves_template() {
    let project = Project::with_targets(&["https://example.org/"]);

    for path in ["/", "/index.html", "/?url=example.org"] {
        let (status, content_type, body) = get(&project, path).await;
        assert_eq!(status, StatusCode::OK, "{}", path);
        assert_eq!(content_type.as_deref(), Some("text/html"));
        assert_eq!(body, TEMPLATE);
    }
}

/// Verifies JSON requests are served from the data directory whatever their prefix.
#[tokio::test]
async fn test_serves_result_json() {
    let project = Project::with_targets(&["https://example.org/"]);

    for path in ["/example.org.json", "/test-result/example.org.json"] {
        let (status, content_type, body) = get(&project, path).await;
        assert_eq!(status, StatusCode::OK, "{}", path);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert!(body.contains("https://example.org/"));
    }
}

/// Verifies the catalog is reachable by its file name.
#[tokio::test]
async fn test_serves_catalog() {
    let project = Project::with_targets(&["https://example.org/"]);

    let (status, _, body) = get(&project, "/statistic.tsv").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with(common::CATALOG_HEADER));
    assert!(body.contains("https://example.org/"));
}

/// Verifies static assets carry a guessed content type.
#[tokio::test]
async fn test_serves_assets() {
    let project = Project::with_targets(&[]);

    let (status, content_type, body) = get(&project, "/styles.css").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/css"));
    assert_eq!(body, "body { margin: 0; }");

    let (_, content_type, _) = get(&project, "/g0v_logo.svg").await;
    assert_eq!(content_type.as_deref(), Some("image/svg+xml"));
}

/// Verifies unknown extensions fall back to plain text.
#[tokio::test]
async fn test_unknown_extension_is_plain_text() {
    let project = Project::with_targets(&[]);
    std::fs::write(project.root().join("notes.zzunknown"), "hello").unwrap();

    let (status, content_type, body) = get(&project, "/notes.zzunknown").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/plain"));
    assert_eq!(body, "hello");
}

/// Verifies missing files, directories and traversal attempts are 404s.
#[tokio::test]
async fn test_not_found() {
    let project = Project::with_targets(&[]);

    for path in ["/missing.css", "/test-result", "/../Cargo.toml", "/%2e%2e/secret"] {
        let (status, _, body) = get(&project, path).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", path);
        assert_eq!(body, "Not Found");
    }
}

/// Verifies a bound host answers plain HTTP over TCP and stops on shutdown.
#[tokio::test]
async fn test_bound_host_serves_requests() {
    let project = Project::with_targets(&[]);
    let host = RenderHost::bind(&project.config(1)).await.unwrap();
    let addr = host.local_addr();

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /styles.css HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200 OK"), "{}", response);
    assert!(response.contains("content-type: text/css"));
    assert!(response.ends_with("body { margin: 0; }"));

    host.shutdown().await;
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}
