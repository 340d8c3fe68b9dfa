//! Local static site server for running checks against a build directory

use axum::Router;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tracing::{info, warn};
use url::Url;

use crate::error::{E2eError, E2eResult};

/// Handle to a running site server; shuts down on `stop` or drop
pub struct SiteServer {
    addr: SocketAddr,
    base_url: Url,
    root: PathBuf,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SiteServer {
    /// Serve `root` on an ephemeral loopback port
    pub async fn serve(root: &Path) -> E2eResult<Self> {
        Self::serve_on(root, SocketAddr::from(([127, 0, 0, 1], 0))).await
    }

    pub async fn serve_on(root: &Path, addr: SocketAddr) -> E2eResult<Self> {
        if !root.join("index.html").is_file() {
            return Err(E2eError::Configuration(format!(
                "site directory {} has no index.html",
                root.display()
            )));
        }

        let app = Router::new().fallback_service(ServeDir::new(root));

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let base_url = Url::parse(&format!("http://{}/", addr))?;

        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let shutdown = async {
                let _ = rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                warn!("Site server stopped with error: {}", e);
            }
        });

        info!("Serving {} at {}", root.display(), base_url);

        Ok(Self {
            addr,
            base_url,
            root: root.to_path_buf(),
            shutdown: Some(tx),
            task: Some(task),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stop accepting connections and wait for the server task
    pub async fn stop(mut self) {
        info!("Stopping site server at {}", self.base_url);
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SiteServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
