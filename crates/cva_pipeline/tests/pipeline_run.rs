//! End-to-end pipeline runs against an in-process pricing stub.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;

use cva_core::{ArtifactStore, InMemoryArtifacts, InMemoryDebugSink, InMemoryStore, NullDebugSink};
use cva_pipeline::{ArtifactStores, CvaPipeline, InputStores, PipelineError, RunConfig, RunStatus};
use cva_pricing::{PriceBatchRequest, PriceBatchResponse, PricingError, PricingService};

/// Deterministic stand-in for the pricing engine: a payer swap worth 100 per
/// period over two periods, scaled by the curve scenario index so scenarios
/// differ.
struct StubPricer {
    gate: Option<Arc<tokio::sync::Notify>>,
}

impl StubPricer {
    fn new() -> Self {
        Self { gate: None }
    }

    fn gated(gate: Arc<tokio::sync::Notify>) -> Self {
        Self { gate: Some(gate) }
    }
}

impl PricingService for StubPricer {
    async fn price_batch(
        &self,
        request: PriceBatchRequest,
    ) -> Result<PriceBatchResponse, PricingError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let items = request
            .items
            .iter()
            .map(|raw| {
                let item: Value = serde_json::from_str(raw).unwrap();
                let tradeid = item["trade"]["tradeid"].as_str().unwrap();
                let curvename = item["curve"]["curvename"].as_str().unwrap();
                let scale = 1.0 + curvename.bytes().last().unwrap() as f64 / 100.0;
                serde_json::json!({
                    "tradeid": tradeid,
                    "curvename": curvename,
                    "fixlegamount": [100.0, 100.0],
                    "fltlegamount": [100.0 + 100.0 * scale, 100.0 + 100.0 * scale],
                    "discountvalues": [0.99, 0.98],
                    "legfractions": [0.5, 1.0],
                })
                .to_string()
            })
            .collect();
        Ok(PriceBatchResponse { items })
    }
}

fn seeded_inputs(trades: usize, curves: usize) -> InputStores {
    let trade_store = InMemoryStore::new("trades");
    for i in 0..trades {
        let counterparty = if i % 2 == 0 { "ACME" } else { "ZETA" };
        trade_store.insert(
            format!("t{i:06}"),
            serde_json::json!({
                "tradeid": format!("t{i:06}"),
                "payer_receiver_flag": 1,
                "counterparty": counterparty,
            })
            .to_string(),
        );
    }

    let curve_store = InMemoryStore::new("ircurves");
    for i in 0..curves {
        curve_store.insert(
            format!("c{i}"),
            serde_json::json!({ "curvename": format!("curvescenario{i}") }).to_string(),
        );
    }

    let fixing_store = InMemoryStore::new("fixings");
    fixing_store.insert(
        "fixing",
        serde_json::json!({
            "curvename": "libor",
            "fixing_dates": [1454025600i64],
            "fixing_rates": [0.0061],
        })
        .to_string(),
    );

    let cds_store = InMemoryStore::new("cp_cds");
    for (ticker, shortname) in [("ACME", "Acme Corp"), ("ZETA", "Zeta Plc")] {
        cds_store.insert(
            ticker,
            serde_json::json!({
                "ticker": ticker,
                "shortname": shortname,
                "date": "2016-01-07",
                "redcode": "49EB20",
                "tier": "SNRFOR",
                "spreads": [0.01, 0.012],
                "spread_periods": [0.5, 1.0],
                "recovery": 0.4,
            })
            .to_string(),
        );
    }

    InputStores {
        trades: Arc::new(trade_store),
        curves: Arc::new(curve_store),
        fixings: Arc::new(fixing_store),
        cp_cds: Arc::new(cds_store),
    }
}

fn artifact_stores() -> (ArtifactStores, Arc<InMemoryArtifacts>, Arc<InMemoryArtifacts>) {
    let csv = Arc::new(InMemoryArtifacts::new("cva_csv"));
    let table = Arc::new(InMemoryArtifacts::new("cva_data"));
    let stores = ArtifactStores {
        csv: csv.clone(),
        table: table.clone(),
    };
    (stores, csv, table)
}

fn calc_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2016, 1, 7).unwrap()
}

#[tokio::test]
async fn run_produces_artifacts_for_every_counterparty() {
    let (stores, csv, table) = artifact_stores();
    let pipeline = CvaPipeline::new(
        Arc::new(StubPricer::new()),
        Arc::new(cva_pipeline::RunRegistry::new()),
        seeded_inputs(4, 3),
        stores,
        Arc::new(NullDebugSink),
    );

    let mut config = RunConfig::new(calc_date());
    config.batch_size = 5;
    config.fan_out = 2;
    let report = pipeline.submit(config).await.unwrap();

    assert_eq!(report.priced, 4 * 3);
    assert_eq!(report.dropped, 0);
    assert_eq!(report.trades, 4);
    assert_eq!(report.counterparties, 2);

    let csv_bytes = csv.get(&report.handle.run_id).unwrap();
    let text = String::from_utf8(csv_bytes).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("ACME,Acme Corp,"));
    assert!(lines[1].starts_with("ZETA,Zeta Plc,"));

    let table_bytes = table.get(&report.handle.run_id).unwrap();
    let table_text = String::from_utf8(table_bytes).unwrap();
    assert!(table_text.starts_with("CounterParty Code,CVA,Name,Date,Red Code,Tier"));
    assert_eq!(table_text.lines().count(), 3);

    assert_eq!(
        pipeline.registry().status(calc_date()),
        Some(RunStatus::Completed)
    );
}

#[tokio::test]
async fn duplicate_submission_is_rejected_while_running() {
    let gate = Arc::new(tokio::sync::Notify::new());
    let (stores, _, _) = artifact_stores();
    let pipeline = Arc::new(CvaPipeline::new(
        Arc::new(StubPricer::gated(gate.clone())),
        Arc::new(cva_pipeline::RunRegistry::new()),
        seeded_inputs(2, 2),
        stores,
        Arc::new(NullDebugSink),
    ));

    let first = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.submit(RunConfig::new(calc_date())).await })
    };

    // Wait until the first submission holds the registration.
    while pipeline.registry().status(calc_date()) != Some(RunStatus::Running) {
        tokio::task::yield_now().await;
    }

    let err = pipeline
        .submit(RunConfig::new(calc_date()))
        .await
        .unwrap_err();
    match err {
        PipelineError::DuplicateRun(dup) => {
            assert_eq!(dup.status, RunStatus::Running);
            assert_eq!(dup.name, "cva_run_2016-01-07");
        }
        other => panic!("expected duplicate-run rejection, got {other}"),
    }

    // Release the gated pricing calls and let the first run finish.
    for _ in 0..8 {
        gate.notify_waiters();
        tokio::task::yield_now().await;
    }
    let report = first.await.unwrap().unwrap();
    assert_eq!(report.priced, 4);
    assert_eq!(
        pipeline.registry().status(calc_date()),
        Some(RunStatus::Completed)
    );
}

#[tokio::test]
async fn failed_run_publishes_nothing_and_permits_resubmission() {
    struct BrokenPricer;
    impl PricingService for BrokenPricer {
        async fn price_batch(
            &self,
            _request: PriceBatchRequest,
        ) -> Result<PriceBatchResponse, PricingError> {
            Err(PricingError::Transport("connection refused".to_string()))
        }
    }

    let (stores, csv, _) = artifact_stores();
    let pipeline = CvaPipeline::new(
        Arc::new(BrokenPricer),
        Arc::new(cva_pipeline::RunRegistry::new()),
        seeded_inputs(2, 2),
        stores,
        Arc::new(NullDebugSink),
    );

    let err = pipeline
        .submit(RunConfig::new(calc_date()))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Pricing(_)));
    assert!(csv.keys().is_empty());
    assert_eq!(
        pipeline.registry().status(calc_date()),
        Some(RunStatus::Failed)
    );

    // A failed run is terminal: the date may be resubmitted.
    assert!(pipeline
        .registry()
        .register_if_absent(calc_date())
        .is_ok());
}

#[tokio::test]
async fn debug_mode_persists_every_stage() {
    let debug_sink = Arc::new(InMemoryDebugSink::new());
    let (stores, _, _) = artifact_stores();
    let pipeline = CvaPipeline::new(
        Arc::new(StubPricer::new()),
        Arc::new(cva_pipeline::RunRegistry::new()),
        seeded_inputs(3, 2),
        stores,
        debug_sink.clone(),
    );

    let mut config = RunConfig::new(calc_date());
    config.debug = true;
    let report = pipeline.submit(config).await.unwrap();
    let run_id = &report.handle.run_id;

    assert_eq!(debug_sink.len(&format!("debug_mtm_{run_id}")), 3 * 2);
    assert_eq!(debug_sink.len(&format!("debug_exposure_{run_id}")), 3 * 2);
    assert_eq!(debug_sink.len(&format!("debug_cva_{run_id}")), 3 * 2);
    assert_eq!(debug_sink.len(&format!("debug_tradecva_{run_id}")), 3);
    assert_eq!(debug_sink.len(&format!("debug_counterpartycva_{run_id}")), 2);
}

#[tokio::test]
async fn empty_fixing_store_fails_before_pricing() {
    let inputs = seeded_inputs(1, 1);
    let inputs = InputStores {
        fixings: Arc::new(InMemoryStore::new("fixings")),
        ..inputs
    };
    let (stores, _, _) = artifact_stores();
    let pipeline = CvaPipeline::new(
        Arc::new(StubPricer::new()),
        Arc::new(cva_pipeline::RunRegistry::new()),
        inputs,
        stores,
        Arc::new(NullDebugSink),
    );

    let err = pipeline
        .submit(RunConfig::new(calc_date()))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::MissingFixing));
}
