//! Route modules for the CVA server
//!
//! Endpoint groups:
//! - health: health check and readiness endpoints
//! - run: CVA run submission and status
//! - downloads: published artifact listing and retrieval

pub mod downloads;
pub mod health;
pub mod run;

use std::sync::Arc;

use axum::Router;

use cva_pipeline::{ArtifactStores, CvaPipeline};
use cva_pricing::PricingService;

use crate::config::ServerConfig;

/// Application state shared across all handlers.
///
/// Generic over the pricing service so route tests can wire an in-process
/// stub instead of the HTTP client.
pub struct AppState<S: PricingService> {
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// The pipeline behind the run endpoints
    pub pipeline: Arc<CvaPipeline<S>>,
    /// Artifact stores served by the download endpoints
    pub artifacts: ArtifactStores,
    /// Server start time for uptime calculation
    pub start_time: std::time::Instant,
}

impl<S: PricingService> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            pipeline: self.pipeline.clone(),
            artifacts: self.artifacts.clone(),
            start_time: self.start_time,
        }
    }
}

impl<S: PricingService> AppState<S> {
    /// Create a new AppState
    pub fn new(
        config: Arc<ServerConfig>,
        pipeline: Arc<CvaPipeline<S>>,
        artifacts: ArtifactStores,
    ) -> Self {
        Self {
            config,
            pipeline,
            artifacts,
            start_time: std::time::Instant::now(),
        }
    }
}

/// Build the main application router by merging all route modules
pub fn build_router<S: PricingService>(state: AppState<S>) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(run::routes())
        .merge(downloads::routes())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use cva_core::{InMemoryArtifacts, InMemoryStore, NullDebugSink};
    use cva_pipeline::{InputStores, RunRegistry};
    use cva_pricing::{PriceBatchRequest, PriceBatchResponse, PricingError};
    use serde_json::Value;

    /// Pricing stub returning a fixed two-period payer schedule per item.
    pub struct StubPricer;

    impl PricingService for StubPricer {
        async fn price_batch(
            &self,
            request: PriceBatchRequest,
        ) -> Result<PriceBatchResponse, PricingError> {
            let items = request
                .items
                .iter()
                .map(|raw| {
                    let item: Value = serde_json::from_str(raw).unwrap();
                    serde_json::json!({
                        "tradeid": item["trade"]["tradeid"],
                        "curvename": item["curve"]["curvename"],
                        "fixlegamount": [100.0, 100.0],
                        "fltlegamount": [180.0, 180.0],
                        "discountvalues": [0.99, 0.98],
                        "legfractions": [0.5, 1.0],
                    })
                    .to_string()
                })
                .collect();
            Ok(PriceBatchResponse { items })
        }
    }

    /// State wired to the stub pricer and seeded in-memory stores.
    pub fn stub_state() -> AppState<StubPricer> {
        let trades = InMemoryStore::new(cva_core::stores::TRADES);
        trades.insert(
            "t000000",
            r#"{"tradeid":"t000000","payer_receiver_flag":1,"counterparty":"ACME"}"#,
        );
        let curves = InMemoryStore::new(cva_core::stores::IRCURVES);
        curves.insert("c0", r#"{"curvename":"curvescenario0000"}"#);
        let fixings = InMemoryStore::new(cva_core::stores::FIXINGS);
        fixings.insert(
            "fixing",
            r#"{"curvename":"libor","fixing_dates":[1454025600],"fixing_rates":[0.0061]}"#,
        );
        let cp_cds = InMemoryStore::new(cva_core::stores::CP_CDS);
        cp_cds.insert(
            "ACME",
            r#"{"ticker":"ACME","shortname":"Acme Corp","date":"2016-01-07",
                "redcode":"49EB20","tier":"SNRFOR","spreads":[0.01],
                "spread_periods":[1.0],"recovery":0.4}"#,
        );

        let artifacts = ArtifactStores {
            csv: Arc::new(InMemoryArtifacts::new(cva_core::stores::CVA_CSV)),
            table: Arc::new(InMemoryArtifacts::new(cva_core::stores::CVA_DATA)),
        };
        let pipeline = Arc::new(CvaPipeline::new(
            Arc::new(StubPricer),
            Arc::new(RunRegistry::new()),
            InputStores {
                trades: Arc::new(trades),
                curves: Arc::new(curves),
                fixings: Arc::new(fixings),
                cp_cds: Arc::new(cp_cds),
            },
            artifacts.clone(),
            Arc::new(NullDebugSink),
        ));

        AppState::new(Arc::new(ServerConfig::default()), pipeline, artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::stub_state;
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_router_merges_all_route_groups() {
        let router = build_router(stub_state());

        let response = router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/downloads")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_returns_404() {
        let router = build_router(stub_state());

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/unknown/path")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
