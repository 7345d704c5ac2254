//! Control surface listener
//!
//! Binds the HTTP control surface and tears the relay down once it stops.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::error::Result;
use crate::server::config::ServerConfig;
use crate::server::routes;
use crate::session::RelayContext;

/// HTTP front end of a relay
pub struct RelayServer {
    config: ServerConfig,
    context: Arc<RelayContext>,
}

impl RelayServer {
    /// Create a new server over the given relay context
    pub fn new(config: ServerConfig, context: Arc<RelayContext>) -> Self {
        Self { config, context }
    }

    /// Get a reference to the relay context
    pub fn context(&self) -> &Arc<RelayContext> {
        &self.context
    }

    /// Configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// The control router
    pub fn router(&self) -> Router {
        routes::router(Arc::clone(&self.context))
    }

    /// Run the server
    ///
    /// This method blocks until the listener fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// The relay context is shut down afterwards, whether serving ended
    /// cleanly or not.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Control surface listening");

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        if let Err(ref e) = result {
            tracing::error!(error = %e, "Control surface failed");
        }

        self.context.shutdown().await;
        result?;
        Ok(())
    }
}
