//! Bounded fan-out batch dispatcher.
//!
//! Consumes request items lazily, fills batches of `batch_size`, and keeps at
//! most `fan_out` batches in flight. The source iterator is only advanced when
//! a batch slot frees up, and each completed batch is handed to the caller's
//! sink before the next one is buffered, so the dispatcher never holds more
//! than the in-flight window of items or results at any time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

use cva_core::MtmResult;

use crate::client::{PricingError, PricingService};
use crate::protocol::{PriceBatchRequest, PricingRequestItem};

/// Dispatcher tuning knobs.
#[derive(Clone, Copy, Debug)]
pub struct DispatchConfig {
    /// Items per pricing request.
    pub batch_size: usize,
    /// Maximum batches in flight.
    pub fan_out: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 200,
            fan_out: 4,
        }
    }
}

/// Tally of a fully priced item stream.
#[derive(Clone, Copy, Debug, Default)]
pub struct PricingStats {
    /// Successfully parsed, non-errored results handed to the sink.
    pub priced: usize,
    /// Items dropped because the engine flagged them errored or the payload
    /// did not parse.
    pub dropped: usize,
}

/// Prices every item of the stream through the service, handing each
/// completed batch of results to `on_batch` as it arrives.
///
/// Per-item failures (engine `haserrored`, unparseable payload) are logged
/// and tallied in [`PricingStats::dropped`]. Batch-level failures — count
/// mismatch, timeout, transport — abort the whole call: no further batches
/// are issued and the first such error is returned.
pub async fn price_all<S, F>(
    service: Arc<S>,
    items: impl Iterator<Item = PricingRequestItem>,
    config: DispatchConfig,
    mut on_batch: F,
) -> Result<PricingStats, PricingError>
where
    S: PricingService,
    F: FnMut(Vec<MtmResult>),
{
    let batch_size = config.batch_size.max(1);
    let permits = Arc::new(Semaphore::new(config.fan_out.max(1)));
    let failed = Arc::new(AtomicBool::new(false));
    let mut tasks: JoinSet<Result<(Vec<MtmResult>, usize), PricingError>> = JoinSet::new();

    let mut stats = PricingStats::default();
    let mut first_error: Option<PricingError> = None;

    let mut items = items.peekable();
    let mut batch_no = 0usize;
    while items.peek().is_some() {
        if failed.load(Ordering::Acquire) {
            break;
        }

        // Hand finished batches downstream before buffering another, so
        // completed results never pile up in the join set.
        while let Some(joined) = tasks.try_join_next() {
            absorb(joined, &mut stats, &mut on_batch, &mut first_error);
        }

        let batch: Vec<String> = items
            .by_ref()
            .take(batch_size)
            .filter_map(|item| match serde_json::to_string(&item) {
                Ok(json) => Some(json),
                Err(e) => {
                    warn!(error = %e, "skipping unserialisable request item");
                    None
                }
            })
            .collect();
        if batch.is_empty() {
            continue;
        }

        // Blocks until a slot frees up; this is what bounds buffering.
        let permit = permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| PricingError::Transport(e.to_string()))?;

        debug!(batch = batch_no, items = batch.len(), "dispatching pricing batch");
        batch_no += 1;

        let service = service.clone();
        let failed = failed.clone();
        tasks.spawn(async move {
            let sent = batch.len();
            let result = service
                .price_batch(PriceBatchRequest { items: batch })
                .await;
            drop(permit);

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    failed.store(true, Ordering::Release);
                    return Err(e);
                }
            };
            if response.items.len() != sent {
                failed.store(true, Ordering::Release);
                return Err(PricingError::CountMismatch {
                    sent,
                    got: response.items.len(),
                });
            }

            let mut results = Vec::with_capacity(sent);
            let mut dropped = 0usize;
            for item in &response.items {
                match MtmResult::from_json(item) {
                    Ok(mtm) if mtm.haserrored => {
                        warn!(
                            tradeid = %mtm.tradeid,
                            curvename = %mtm.curvename,
                            error = %mtm.error,
                            "pricing engine flagged item errored, dropping"
                        );
                        dropped += 1;
                    }
                    Ok(mtm) => results.push(mtm),
                    Err(e) => {
                        warn!(error = %e, "unparseable pricing response item, dropping");
                        dropped += 1;
                    }
                }
            }
            Ok((results, dropped))
        });
    }

    while let Some(joined) = tasks.join_next().await {
        absorb(joined, &mut stats, &mut on_batch, &mut first_error);
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(stats),
    }
}

fn absorb<F>(
    joined: Result<Result<(Vec<MtmResult>, usize), PricingError>, JoinError>,
    stats: &mut PricingStats,
    on_batch: &mut F,
    first_error: &mut Option<PricingError>,
) where
    F: FnMut(Vec<MtmResult>),
{
    match joined {
        Ok(Ok((results, dropped))) => {
            stats.priced += results.len();
            stats.dropped += dropped;
            if !results.is_empty() {
                on_batch(results);
            }
        }
        Ok(Err(e)) => {
            if first_error.is_none() {
                *first_error = Some(e);
            }
        }
        Err(e) => {
            if first_error.is_none() {
                *first_error = Some(PricingError::Transport(e.to_string()));
            }
        }
    }
}
