//! Pipeline runner and run controller.
//!
//! [`CvaPipeline::submit`] registers the run, executes every stage, and
//! transitions the run to completed or failed. Artifacts are published only
//! on completion. Per-record failures inside a stage are logged and dropped;
//! batch-protocol and missing-input failures abort the run.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{error, info, warn};

use cva_core::{
    ArtifactStore, CdsRecord, CurveRecord, CvaRecord, DebugSink, ExposureProfile, FixingRecord,
    MtmResult, SnapshotStore, TradeRecord,
};
use cva_pricing::{price_all, DispatchConfig, PricingService};

use crate::aggregate::{CounterpartyAggregate, TradeAggregate};
use crate::artifacts::{render_csv, render_table};
use crate::cva::cva_record;
use crate::error::PipelineError;
use crate::exposure::exposure_profile;
use crate::join::joined_items;
use crate::registry::{RunHandle, RunRegistry};

/// Parameters of one run submission.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Calculation date the run covers; at most one live run per date.
    pub calc_date: NaiveDate,
    /// Items per pricing batch.
    pub batch_size: usize,
    /// Maximum pricing batches in flight.
    pub fan_out: usize,
    /// Persist every intermediate stage output to the debug sink.
    pub debug: bool,
}

impl RunConfig {
    /// Default parameters for a calculation date.
    pub fn new(calc_date: NaiveDate) -> Self {
        let defaults = DispatchConfig::default();
        Self {
            calc_date,
            batch_size: defaults.batch_size,
            fan_out: defaults.fan_out,
            debug: false,
        }
    }
}

/// The four input snapshot stores feeding a run.
#[derive(Clone)]
pub struct InputStores {
    /// Trade documents.
    pub trades: Arc<dyn SnapshotStore>,
    /// Curve scenario documents.
    pub curves: Arc<dyn SnapshotStore>,
    /// Fixing documents; exactly one is used per run.
    pub fixings: Arc<dyn SnapshotStore>,
    /// Counterparty CDS curve documents.
    pub cp_cds: Arc<dyn SnapshotStore>,
}

/// The two artifact stores a completed run publishes into.
#[derive(Clone)]
pub struct ArtifactStores {
    /// Headerless CSV payloads.
    pub csv: Arc<dyn ArtifactStore>,
    /// Tabular payloads with CDS reference columns.
    pub table: Arc<dyn ArtifactStore>,
}

/// Summary of a completed run.
#[derive(Clone, Debug)]
pub struct RunReport {
    /// The run's registered identity; its id keys the artifacts.
    pub handle: RunHandle,
    /// Pairings priced successfully.
    pub priced: usize,
    /// Items dropped across all stages.
    pub dropped: usize,
    /// Trades with a final CVA.
    pub trades: usize,
    /// Counterparties with a final CVA total.
    pub counterparties: usize,
}

/// The full CVA dataflow behind the run registry.
pub struct CvaPipeline<S: PricingService> {
    pricing: Arc<S>,
    registry: Arc<RunRegistry>,
    inputs: InputStores,
    artifacts: ArtifactStores,
    debug_sink: Arc<dyn DebugSink>,
}

impl<S: PricingService> CvaPipeline<S> {
    /// Wires the pipeline to its collaborators.
    pub fn new(
        pricing: Arc<S>,
        registry: Arc<RunRegistry>,
        inputs: InputStores,
        artifacts: ArtifactStores,
        debug_sink: Arc<dyn DebugSink>,
    ) -> Self {
        Self {
            pricing,
            registry,
            inputs,
            artifacts,
            debug_sink,
        }
    }

    /// The shared run registry.
    #[inline]
    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }

    /// Submits a run for a calculation date and executes it to completion.
    ///
    /// Rejects immediately with [`PipelineError::DuplicateRun`] when a run
    /// for the date is still in flight, performing no partial work.
    pub async fn submit(&self, config: RunConfig) -> Result<RunReport, PipelineError> {
        let handle = self.registry.register_if_absent(config.calc_date)?;
        self.run_registered(handle, config).await
    }

    /// Registers a run and executes it on a background task.
    ///
    /// The duplicate check happens synchronously; the returned handle is
    /// already registered when this returns, so a concurrent submission for
    /// the same date is rejected even though the pipeline has not started.
    pub fn submit_background(
        self: Arc<Self>,
        config: RunConfig,
    ) -> Result<RunHandle, PipelineError> {
        let handle = self.registry.register_if_absent(config.calc_date)?;
        let pipeline = self;
        let registered = handle.clone();
        tokio::spawn(async move {
            // Outcome is reflected in the registry; callers poll the status.
            let _ = pipeline.run_registered(registered, config).await;
        });
        Ok(handle)
    }

    async fn run_registered(
        &self,
        handle: RunHandle,
        config: RunConfig,
    ) -> Result<RunReport, PipelineError> {
        info!(run = %handle.run_id, batch_size = config.batch_size,
              fan_out = config.fan_out, "starting CVA run");

        match self.execute(&handle, &config).await {
            Ok(report) => {
                self.registry.complete(&handle);
                info!(run = %handle.run_id, trades = report.trades,
                      counterparties = report.counterparties, "CVA run completed");
                Ok(report)
            }
            Err(e) => {
                self.registry.fail(&handle);
                error!(run = %handle.run_id, error = %e, "CVA run failed");
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        handle: &RunHandle,
        config: &RunConfig,
    ) -> Result<RunReport, PipelineError> {
        let trades = load_trades(&*self.inputs.trades)?;
        let curves = load_curves(&*self.inputs.curves)?;
        let fixing = load_fixing(&*self.inputs.fixings)?;
        let cds_by_ticker = load_cds(&*self.inputs.cp_cds);

        info!(trades = trades.len(), curves = curves.len(),
              counterparties = cds_by_ticker.len(), "inputs snapshotted");

        // Price the full trade x curve product. The joiner is lazy and the
        // dispatcher streams each completed batch straight into the exposure,
        // CVA and aggregation stages, so only the in-flight pricing window
        // and the per-trade aggregates are ever resident.
        let by_trade: HashMap<&str, (&TradeRecord, i32)> = trades
            .iter()
            .map(|t| (t.tradeid.as_str(), (t, t.payer_receiver_flag)))
            .collect();
        let mut trade_aggs: HashMap<String, TradeAggregate> = HashMap::new();
        let mut stage_dropped = 0usize;

        let calcdate = config.calc_date.to_string();
        let items = joined_items(&calcdate, &trades, &curves, &fixing, config.debug);
        let stats = price_all(
            self.pricing.clone(),
            items,
            DispatchConfig {
                batch_size: config.batch_size,
                fan_out: config.fan_out,
            },
            |batch| {
                stage_dropped +=
                    self.fold_batch(handle, config, &by_trade, &cds_by_ticker, &mut trade_aggs, batch);
            },
        )
        .await?;
        let dropped = stats.dropped + stage_dropped;

        let trade_cvas: Vec<CvaRecord> = trade_aggs
            .into_values()
            .map(TradeAggregate::finish)
            .collect();

        if config.debug {
            let map = format!("debug_tradecva_{}", handle.run_id);
            for record in &trade_cvas {
                self.persist_debug(&map, record.tradeid.clone(), record);
            }
        }

        // Per-counterparty totals.
        let mut totals: HashMap<String, CounterpartyAggregate> = HashMap::new();
        for record in &trade_cvas {
            totals
                .entry(record.counterparty.clone())
                .or_insert_with(|| {
                    let shortname = cds_by_ticker
                        .get(&record.counterparty)
                        .map(|c| c.shortname.clone())
                        .unwrap_or_default();
                    CounterpartyAggregate::new(record.counterparty.clone(), shortname)
                })
                .add(record.cva);
        }
        let totals: Vec<CounterpartyAggregate> = totals.into_values().collect();

        if config.debug {
            let map = format!("debug_counterpartycva_{}", handle.run_id);
            for total in &totals {
                self.persist_debug(&map, total.counterparty.clone(), total);
            }
        }

        // Publish, keyed by the run id.
        self.artifacts.csv.put(&handle.run_id, render_csv(&totals)?);
        self.artifacts
            .table
            .put(&handle.run_id, render_table(&totals, &cds_by_ticker)?);

        Ok(RunReport {
            handle: handle.clone(),
            priced: stats.priced,
            dropped,
            trades: trade_cvas.len(),
            counterparties: totals.len(),
        })
    }

    /// Folds one priced batch through the exposure and CVA stages into the
    /// running per-trade aggregates. Returns the pairings dropped in the
    /// batch.
    fn fold_batch(
        &self,
        handle: &RunHandle,
        config: &RunConfig,
        by_trade: &HashMap<&str, (&TradeRecord, i32)>,
        cds_by_ticker: &HashMap<String, CdsRecord>,
        trade_aggs: &mut HashMap<String, TradeAggregate>,
        batch: Vec<MtmResult>,
    ) -> usize {
        if config.debug {
            let map = format!("debug_mtm_{}", handle.run_id);
            for mtm in &batch {
                self.persist_debug(&map, format!("{},{}", mtm.tradeid, mtm.curvename), mtm);
            }
        }

        // Exposure stage: join the trade's direction and counterparty back
        // on by trade id, then derive the profile.
        let profiles: Vec<ExposureProfile> = batch
            .par_iter()
            .filter_map(|mtm| {
                let Some((trade, flag)) = by_trade.get(mtm.tradeid.as_str()) else {
                    warn!(tradeid = %mtm.tradeid, "priced result for unknown trade, dropping");
                    return None;
                };
                match exposure_profile(mtm, *flag, &trade.counterparty) {
                    Ok(profile) => Some(profile),
                    Err(e) => {
                        warn!(tradeid = %mtm.tradeid, curvename = %mtm.curvename,
                              error = %e, "exposure derivation failed, dropping pairing");
                        None
                    }
                }
            })
            .collect();
        let mut dropped = batch.len() - profiles.len();

        if config.debug {
            let map = format!("debug_exposure_{}", handle.run_id);
            for profile in &profiles {
                self.persist_debug(
                    &map,
                    format!("{},{}", profile.tradeid, profile.curvename),
                    profile,
                );
            }
        }

        // CVA stage.
        let records: Vec<CvaRecord> = profiles
            .par_iter()
            .filter_map(|profile| {
                let Some(cds) = cds_by_ticker.get(&profile.counterparty) else {
                    warn!(tradeid = %profile.tradeid, counterparty = %profile.counterparty,
                          "no CDS curve for counterparty, dropping pairing");
                    return None;
                };
                Some(cva_record(profile, cds))
            })
            .collect();
        dropped += profiles.len() - records.len();

        if config.debug {
            let map = format!("debug_cva_{}", handle.run_id);
            for record in &records {
                self.persist_debug(
                    &map,
                    format!("{},{}", record.tradeid, record.curvename),
                    record,
                );
            }
        }

        // Per-trade average across curve scenarios, partitioned fold merged
        // into the running aggregates with a combining reduce.
        let partial: HashMap<String, TradeAggregate> = records
            .par_iter()
            .fold(HashMap::new, |mut partial, record| {
                partial
                    .entry(record.tradeid.clone())
                    .or_insert_with(|| TradeAggregate::new(record.tradeid.clone()))
                    .add(record);
                partial
            })
            .reduce(HashMap::new, |mut merged, partial| {
                for (tradeid, agg) in partial {
                    match merged.entry(tradeid) {
                        std::collections::hash_map::Entry::Occupied(mut e) => {
                            e.get_mut().combine(&agg)
                        }
                        std::collections::hash_map::Entry::Vacant(e) => {
                            e.insert(agg);
                        }
                    }
                }
                merged
            });
        for (tradeid, agg) in partial {
            match trade_aggs.entry(tradeid) {
                std::collections::hash_map::Entry::Occupied(mut e) => e.get_mut().combine(&agg),
                std::collections::hash_map::Entry::Vacant(e) => {
                    e.insert(agg);
                }
            }
        }

        dropped
    }

    fn persist_debug<T: Serialize>(&self, map: &str, key: String, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => self.debug_sink.put(map, key, json),
            Err(e) => warn!(map, error = %e, "failed to serialise debug entry"),
        }
    }
}

fn load_trades(store: &dyn SnapshotStore) -> Result<Vec<TradeRecord>, PipelineError> {
    let trades = parse_snapshot(store, TradeRecord::from_json);
    if trades.is_empty() {
        return Err(PipelineError::EmptyInput { store: "trades" });
    }
    Ok(trades)
}

fn load_curves(store: &dyn SnapshotStore) -> Result<Vec<CurveRecord>, PipelineError> {
    let curves = parse_snapshot(store, CurveRecord::from_json);
    if curves.is_empty() {
        return Err(PipelineError::EmptyInput { store: "ircurves" });
    }
    Ok(curves)
}

/// Selects the run's fixing. An empty store is a hard failure; more than one
/// record is tolerated with a warning, taking the first by key order.
fn load_fixing(store: &dyn SnapshotStore) -> Result<FixingRecord, PipelineError> {
    let mut snapshot = store.snapshot();
    snapshot.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut fixings = snapshot.iter().filter_map(|(key, json)| {
        match FixingRecord::from_json(json) {
            Ok(fixing) => Some(fixing),
            Err(e) => {
                warn!(store = %store.name(), key = %key, error = %e, "dropping malformed record");
                None
            }
        }
    });
    let first = fixings.next().ok_or(PipelineError::MissingFixing)?;
    if fixings.next().is_some() {
        warn!(store = %store.name(), "multiple fixing records, using first by key order");
    }
    Ok(first)
}

fn load_cds(store: &dyn SnapshotStore) -> HashMap<String, CdsRecord> {
    parse_snapshot(store, CdsRecord::from_json)
        .into_iter()
        .map(|cds| (cds.ticker.clone(), cds))
        .collect()
}

fn parse_snapshot<T>(
    store: &dyn SnapshotStore,
    parse: impl Fn(&str) -> Result<T, cva_core::RecordError>,
) -> Vec<T> {
    store
        .snapshot()
        .into_iter()
        .filter_map(|(key, json)| match parse(&json) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(store = %store.name(), key = %key, error = %e, "dropping malformed record");
                None
            }
        })
        .collect()
}
