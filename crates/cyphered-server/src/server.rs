//! Static file server with optional TLS termination
use crate::listing;
use crate::tls;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::{Html, IntoResponse, Response};
use axum::Router;
use http::{header, Method, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum FileServerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cannot serve {0}: not a directory")]
    InvalidRoot(String),

    #[error("TLS error: {0}")]
    TlsError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Failed to bind to {address}: {reason}\n\nTroubleshooting:\n  • Check if another process is using this port: lsof -i :{port}\n  • Try using a different address or port")]
    BindError {
        address: String,
        port: u16,
        reason: String,
    },
}

/// Certificate and key PEM files for HTTPS
#[derive(Debug, Clone)]
pub struct TlsFiles {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct FileServerConfig {
    pub bind_addr: SocketAddr,
    pub root: PathBuf,
    /// Plain HTTP when `None`
    pub tls: Option<TlsFiles>,
}

impl Default for FileServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8443)),
            root: PathBuf::from("./"),
            tls: None,
        }
    }
}

/// A bound, not yet serving, file server
pub struct FileServer {
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    router: Router,
}

impl FileServer {
    /// Check the root, load TLS material and bind the listener.
    ///
    /// TLS files are read here, once; the server never touches them again.
    pub async fn bind(config: FileServerConfig) -> Result<Self, FileServerError> {
        if !config.root.is_dir() {
            return Err(FileServerError::InvalidRoot(
                config.root.display().to_string(),
            ));
        }

        let acceptor = match &config.tls {
            Some(files) => Some(tls::tls_acceptor(&files.cert_path, &files.key_path)?),
            None => None,
        };

        let local_addr = config.bind_addr;
        let listener = TcpListener::bind(local_addr).await.map_err(|e| {
            let port = local_addr.port();
            let address = local_addr.ip().to_string();
            let reason = e.to_string();
            FileServerError::BindError {
                address,
                port,
                reason,
            }
        })?;
        let bound_addr = listener.local_addr()?;

        let scheme = if acceptor.is_some() { "https" } else { "http" };
        info!(
            "Serving {} on {}://{}",
            config.root.display(),
            scheme,
            bound_addr
        );

        Ok(Self {
            listener,
            acceptor,
            router: router(config.root),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, FileServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn is_tls(&self) -> bool {
        self.acceptor.is_some()
    }

    /// Serve until the process ends
    pub async fn serve(self) -> Result<(), FileServerError> {
        match self.acceptor {
            Some(acceptor) => Self::serve_tls(self.listener, acceptor, self.router).await,
            None => {
                axum::serve(self.listener, self.router).await?;
                Ok(())
            }
        }
    }

    async fn serve_tls(
        listener: TcpListener,
        acceptor: TlsAcceptor,
        router: Router,
    ) -> Result<(), FileServerError> {
        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let acceptor = acceptor.clone();
                    let service = TowerToHyperService::new(router.clone());

                    tokio::spawn(async move {
                        if let Err(e) =
                            Self::handle_connection(stream, peer_addr, acceptor, service).await
                        {
                            debug!("HTTPS connection error from {}: {}", peer_addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept HTTPS connection: {}", e);
                }
            }
        }
    }

    async fn handle_connection(
        stream: TcpStream,
        peer_addr: SocketAddr,
        acceptor: TlsAcceptor,
        service: TowerToHyperService<Router>,
    ) -> Result<(), FileServerError> {
        let tls_stream = acceptor
            .accept(stream)
            .await
            .map_err(|e| FileServerError::TlsError(format!("TLS handshake failed: {}", e)))?;
        debug!("TLS handshake completed with {}", peer_addr);

        let builder = auto::Builder::new(TokioExecutor::new());
        builder
            .serve_connection(TokioIo::new(tls_stream), service)
            .await
            .map_err(|e| FileServerError::ConnectionError(e.to_string()))
    }
}

struct ServedDirectory {
    root: PathBuf,
    serve_dir: ServeDir,
}

/// Routes every request to the files under `root`
pub fn router(root: impl Into<PathBuf>) -> Router {
    let root = root.into();
    let state = Arc::new(ServedDirectory {
        serve_dir: ServeDir::new(&root),
        root,
    });

    Router::new()
        .fallback(serve_path)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn serve_path(State(dir): State<Arc<ServedDirectory>>, request: Request) -> Response {
    if request.method() != Method::GET && request.method() != Method::HEAD {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET, HEAD")],
        )
            .into_response();
    }

    let uri_path = request.uri().path().to_string();
    let resolved = listing::decode(&uri_path)
        .and_then(|decoded| Ok((listing::resolve(&dir.root, &decoded)?, decoded)));
    let (fs_path, decoded_path) = match resolved {
        Ok(resolved) => resolved,
        Err(e) => {
            debug!("Rejected request path {}: {:?}", uri_path, e);
            return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
        }
    };

    if decoded_path.ends_with('/') && needs_listing(&fs_path).await {
        return match listing::read_entries(&fs_path).await {
            Ok(entries) => Html(listing::render(&decoded_path, &entries)).into_response(),
            Err(e) => {
                warn!("Failed to list {}: {}", fs_path.display(), e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        };
    }

    // Files, index.html, redirects for directories without a trailing slash, 404s
    match dir.serve_dir.clone().oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

/// A directory without an index.html gets a generated listing
async fn needs_listing(path: &Path) -> bool {
    let is_dir = tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return false;
    }

    !tokio::fs::metadata(path.join("index.html"))
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_server_config_defaults() {
        let config = FileServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8443);
        assert_eq!(config.root, PathBuf::from("./"));
        assert!(config.tls.is_none());
    }

    #[tokio::test]
    async fn test_bind_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileServerConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            root: dir.path().join("nope"),
            tls: None,
        };

        let result = FileServer::bind(config).await;
        assert!(matches!(result, Err(FileServerError::InvalidRoot(_))));
    }

    #[tokio::test]
    async fn test_bind_reports_port_in_use() {
        let dir = tempfile::tempdir().unwrap();
        let first = FileServer::bind(FileServerConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            root: dir.path().to_path_buf(),
            tls: None,
        })
        .await
        .unwrap();
        let taken = first.local_addr().unwrap();

        let second = FileServer::bind(FileServerConfig {
            bind_addr: taken,
            root: dir.path().to_path_buf(),
            tls: None,
        })
        .await;

        match second {
            Err(FileServerError::BindError { port, .. }) => assert_eq!(port, taken.port()),
            Err(other) => panic!("expected bind error, got {}", other),
            Ok(_) => panic!("expected bind error"),
        }
    }

    #[tokio::test]
    async fn test_bind_with_unreadable_tls_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileServerConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            root: dir.path().to_path_buf(),
            tls: Some(TlsFiles {
                cert_path: dir.path().join("cert.pem"),
                key_path: dir.path().join("key.pem"),
            }),
        };

        let result = FileServer::bind(config).await;
        assert!(matches!(result, Err(FileServerError::TlsError(_))));
    }
}
