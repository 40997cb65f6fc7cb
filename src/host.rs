//! Local HTTP server the browsers render from.
//!
//! The client application fetches its data with relative URLs, so pages must
//! be loaded over HTTP from a server exposing the project layout:
//!
//! | Request path | Served file |
//! |--------------|-------------|
//! | `/`, `/index.html` | master template |
//! | `/<name>.json` | `<data_root>/<name>.json` (by file name) |
//! | `/<catalog file name>` | the catalog |
//! | anything else | file below `asset_root` |
//!
//! Paths that do not resolve to a readable file get `404 Not Found`.
//!
//! # Example
//!
//! ```rust,ignore
//! use static_prerender::{BuildConfig, RenderHost};
//!
//! let host = RenderHost::bind(&BuildConfig::default()).await?;
//! println!("serving at {}", host.base_url());
//! // ... render ...
//! host.shutdown().await;
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use url::Url;

use crate::config::{BuildConfig, ProjectPaths};
use crate::error::{BuildError, Result};

/// Content type used when the extension is unknown.
const FALLBACK_CONTENT_TYPE: &str = "text/plain";

/// How long shutdown waits for in-flight requests.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Maps request paths to files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRoutes {
    /// Served at `/` and `/index.html`.
    pub template: PathBuf,
    /// Root for every other path.
    pub asset_root: PathBuf,
    /// Root for `*.json` requests.
    pub data_root: PathBuf,
    /// Served at `/<file name>`.
    pub catalog: PathBuf,
}

impl HostRoutes {
    /// Routes for a project layout.
    pub fn from_paths(paths: &ProjectPaths) -> Self {
        Self {
            template: paths.template.clone(),
            asset_root: paths.asset_root.clone(),
            data_root: paths.data_root.clone(),
            catalog: paths.catalog.clone(),
        }
    }

    /// Resolve a request path to a file path.
    ///
    /// Returns `None` for paths that cannot be mapped safely (invalid
    /// encoding, parent-directory segments).
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::path::PathBuf;
    /// use static_prerender::config::ProjectPaths;
    /// use static_prerender::host::HostRoutes;
    ///
    /// let routes = HostRoutes::from_paths(&ProjectPaths::from_root("/srv"));
    /// assert_eq!(routes.resolve("/"), Some(PathBuf::from("/srv/index.html")));
    /// assert_eq!(routes.resolve("/a/b.json"), Some(PathBuf::from("/srv/test-result/b.json")));
    /// assert_eq!(routes.resolve("/../etc/passwd"), None);
    /// ```
    pub fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let decoded = urlencoding::decode(request_path).ok()?;
        let relative = decoded.trim_start_matches('/');

        if relative.is_empty() || relative == "index.html" {
            return Some(self.template.clone());
        }

        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }

        let file_name = relative.file_name()?;

        if relative.extension().is_some_and(|ext| ext == "json") {
            return Some(self.data_root.join(file_name));
        }

        if self.catalog.file_name() == Some(file_name) && relative.components().count() == 1 {
            return Some(self.catalog.clone());
        }

        Some(self.asset_root.join(relative))
    }
}

/// Build the render host router.
///
/// Every request goes through one fallback handler; there is no route table.
pub fn router(routes: HostRoutes) -> Router {
    Router::new()
        .fallback(serve_path)
        .with_state(Arc::new(routes))
}

async fn serve_path(State(routes): State<Arc<HostRoutes>>, uri: Uri) -> Response {
    let Some(path) = routes.resolve(uri.path()) else {
        log::debug!("Rejected request path {}", uri.path());
        return not_found();
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let content_type = mime_guess::from_path(&path)
                .first_raw()
                .unwrap_or(FALLBACK_CONTENT_TYPE);
            log::trace!("200 {} -> {}", uri.path(), path.display());
            ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Err(e) => {
            log::debug!("404 {} ({}: {})", uri.path(), path.display(), e);
            not_found()
        }
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

/// A running render host.
///
/// Listens on `127.0.0.1`. Dropping the host stops it; prefer
/// [`shutdown`](Self::shutdown), which also waits for the server task.
#[derive(Debug)]
pub struct RenderHost {
    addr: SocketAddr,
    base_url: Url,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl RenderHost {
    /// Bind the configured port and start serving.
    ///
    /// Port `0` binds an ephemeral port; read it back with
    /// [`local_addr`](Self::local_addr).
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::ServerBind`] if the port cannot be bound.
    pub async fn bind(config: &BuildConfig) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, config.host_port))
            .await
            .map_err(|e| {
                log::error!("❌ Render host could not bind port {}: {}", config.host_port, e);
                BuildError::ServerBind(format!("port {}: {}", config.host_port, e))
            })?;

        let addr = listener
            .local_addr()
            .map_err(|e| BuildError::ServerBind(e.to_string()))?;
        let base_url = Url::parse(&format!("http://{}/", addr))
            .map_err(|e| BuildError::ServerBind(format!("{}: {}", addr, e)))?;

        let app = router(HostRoutes::from_paths(&config.paths));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                log::error!("❌ Render host stopped with error: {}", e);
            }
        });

        log::info!("✅ Render host listening on http://{}", addr);

        Ok(Self {
            addr,
            base_url,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    /// Bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Root URL, e.g. `http://127.0.0.1:3000/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Stop accepting connections and wait for the server task.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let abort = task.abort_handle();
            match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
                Ok(_) => log::info!("✅ Render host stopped"),
                Err(_) => {
                    log::warn!("⚠️ Render host did not stop within {:?}, aborting", SHUTDOWN_GRACE);
                    abort.abort();
                }
            }
        }
    }
}

impl Drop for RenderHost {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn routes() -> HostRoutes {
        HostRoutes::from_paths(&ProjectPaths::from_root("/srv/site"))
    }

    /// Verifies the template is served for the root paths.
    #[test]
    fn test_resolve_template() {
        let routes = routes();
        assert_eq!(routes.resolve("/"), Some(PathBuf::from("/srv/site/index.html")));
        assert_eq!(
            routes.resolve("/index.html"),
            Some(PathBuf::from("/srv/site/index.html"))
        );
    }

    /// Verifies JSON files resolve by file name below the data root.
    #[test]
    fn test_resolve_json() {
        let routes = routes();
        assert_eq!(
            routes.resolve("/test-result/example.org.json"),
            Some(PathBuf::from("/srv/site/test-result/example.org.json"))
        );
        assert_eq!(
            routes.resolve("/summary.json"),
            Some(PathBuf::from("/srv/site/test-result/summary.json"))
        );
    }

    /// Verifies the catalog is served by its file name.
    #[test]
    fn test_resolve_catalog() {
        assert_eq!(
            routes().resolve("/statistic.tsv"),
            Some(PathBuf::from("/srv/site/test-result/statistic.tsv"))
        );
    }

    /// Verifies other paths map below the asset root, percent-decoded.
    #[test]
    fn test_resolve_assets() {
        let routes = routes();
        assert_eq!(
            routes.resolve("/styles.css"),
            Some(PathBuf::from("/srv/site/styles.css"))
        );
        assert_eq!(
            routes.resolve("/img/a%20b.png"),
            Some(PathBuf::from("/srv/site/img/a b.png"))
        );
    }

    /// Verifies traversal attempts are rejected.
    #[test]
    fn test_resolve_rejects_traversal() {
        let routes = routes();
        assert_eq!(routes.resolve("/../secret"), None);
        assert_eq!(routes.resolve("/img/%2e%2e/%2e%2e/secret"), None);
        assert_eq!(routes.resolve("/a/../../b.json"), None);
    }

    /// Verifies binding an ephemeral port and shutting down.
    #[tokio::test]
    async fn test_bind_ephemeral_and_shutdown() {
        let config = crate::BuildConfigBuilder::new().host_port(0).build().unwrap();
        let host = RenderHost::bind(&config).await.unwrap();

        assert_ne!(host.local_addr().port(), 0);
        assert_eq!(host.base_url().host_str(), Some("127.0.0.1"));
        assert_eq!(host.base_url().port(), Some(host.local_addr().port()));
        assert_eq!(host.base_url().path(), "/");

        host.shutdown().await;
    }

    /// Verifies an occupied port is reported as a bind error.
    #[tokio::test]
    async fn test_bind_conflict() {
        let occupied = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .unwrap();
        let port = occupied.local_addr().unwrap().port();

        let config = crate::BuildConfigBuilder::new().host_port(port).build().unwrap();
        let result = RenderHost::bind(&config).await;
        assert!(matches!(result, Err(BuildError::ServerBind(_))));
    }
}
