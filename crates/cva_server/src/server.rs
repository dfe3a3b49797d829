//! Server startup and wiring.
//!
//! Builds the default production wiring: in-memory input and artifact
//! stores, the HTTP pricing client pointed at the configured endpoint, and
//! the run registry, all behind the Axum router.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use cva_core::{InMemoryArtifacts, InMemoryDebugSink, InMemoryStore};
use cva_pipeline::{ArtifactStores, CvaPipeline, InputStores, RunRegistry};
use cva_pricing::HttpPricingClient;

use crate::config::ServerConfig;
use crate::routes::{self, AppState};

/// Server instance that can be started
pub struct Server {
    /// Server configuration
    config: Arc<ServerConfig>,
    /// The built router
    router: Router,
}

impl Server {
    /// Create a new server instance with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        let config = Arc::new(config);

        let pricing = Arc::new(
            HttpPricingClient::new(config.pricer_endpoint.clone())
                .with_timeout(Duration::from_secs(config.pricing_timeout_secs)),
        );
        let inputs = InputStores {
            trades: Arc::new(InMemoryStore::new(cva_core::stores::TRADES)),
            curves: Arc::new(InMemoryStore::new(cva_core::stores::IRCURVES)),
            fixings: Arc::new(InMemoryStore::new(cva_core::stores::FIXINGS)),
            cp_cds: Arc::new(InMemoryStore::new(cva_core::stores::CP_CDS)),
        };
        let artifacts = ArtifactStores {
            csv: Arc::new(InMemoryArtifacts::new(cva_core::stores::CVA_CSV)),
            table: Arc::new(InMemoryArtifacts::new(cva_core::stores::CVA_DATA)),
        };
        let pipeline = Arc::new(CvaPipeline::new(
            pricing,
            Arc::new(RunRegistry::new()),
            inputs,
            artifacts.clone(),
            Arc::new(InMemoryDebugSink::new()),
        ));

        let state = AppState::new(config.clone(), pipeline, artifacts);
        let router = routes::build_router(state);

        Self { config, router }
    }

    /// Get the socket address the server will bind to
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.config.socket_addr().parse()
    }

    /// Get the configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the server
    ///
    /// Binds to the configured host/port and serves requests.
    pub async fn run(self) -> Result<(), std::io::Error> {
        let addr = self
            .socket_addr()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, self.router).await
    }

    /// Run the server with a specific listener
    ///
    /// Useful for testing with a listener bound to port 0.
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, self.router).await
    }

    /// Create a test server and return the bound address
    #[cfg(test)]
    pub async fn spawn_test_server(
        config: ServerConfig,
    ) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = Self::new(config);
        let handle = tokio::spawn(async move {
            server.run_with_listener(listener).await.ok();
        });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        (addr, handle)
    }
}
