//! Pricing service trait and the HTTP JSON implementation.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::{PriceBatchRequest, PriceBatchResponse};

/// Batch-protocol failure. Any of these fails the whole batch (and with it
/// the pipeline stage); per-item problems are handled by the dispatcher.
#[derive(Debug, Error)]
pub enum PricingError {
    /// The service broke the one-output-per-input contract.
    #[error("pricing service returned {got} items for a batch of {sent}")]
    CountMismatch {
        /// Items sent in the request.
        sent: usize,
        /// Items received in the response.
        got: usize,
    },

    /// The batch call did not complete within the configured deadline.
    #[error("pricing batch timed out after {0:?}")]
    Timeout(Duration),

    /// Transport-level failure (connect, send, decode).
    #[error("pricing transport failure: {0}")]
    Transport(String),
}

/// The external pricing engine, reached over a service boundary.
///
/// Implementations must uphold positional correlation: response item *i*
/// values request item *i*. The dispatcher verifies the count; order is the
/// service's responsibility.
pub trait PricingService: Send + Sync + 'static {
    /// Prices one ordered batch.
    fn price_batch(
        &self,
        request: PriceBatchRequest,
    ) -> impl Future<Output = Result<PriceBatchResponse, PricingError>> + Send;
}

/// HTTP JSON client for the pricing engine.
///
/// Posts the batch to a single endpoint and applies a per-batch deadline.
/// A timed-out batch surfaces as [`PricingError::Timeout`] and is handled
/// like any other batch failure.
pub struct HttpPricingClient {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpPricingClient {
    /// Default per-batch deadline, mirroring the engine-side call timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a client for the given endpoint URL.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the per-batch deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The configured endpoint URL.
    #[inline]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl PricingService for HttpPricingClient {
    async fn price_batch(
        &self,
        request: PriceBatchRequest,
    ) -> Result<PriceBatchResponse, PricingError> {
        let call = async {
            let response = self
                .http
                .post(&self.endpoint)
                .json(&request)
                .send()
                .await
                .map_err(|e| PricingError::Transport(e.to_string()))?;

            let response = response
                .error_for_status()
                .map_err(|e| PricingError::Transport(e.to_string()))?;

            response
                .json::<PriceBatchResponse>()
                .await
                .map_err(|e| PricingError::Transport(e.to_string()))
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(PricingError::Timeout(self.timeout)),
        }
    }
}
