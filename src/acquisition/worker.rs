//! # Acquisition Worker
//!
//! The single task that drives the pipeline: pull lines from the transport
//! (or synthesize them in demo mode), parse, merge, publish to observers
//! and hand the result to the persistence sink.
//!
//! One cycle per interval tick; cancellation is checked at every cycle
//! boundary via `tokio::select!`. No failure inside a cycle terminates the
//! loop: transport and persistence errors are reported to the view and the
//! next cycle proceeds.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::demo::DemoGenerator;
use crate::config::AcquisitionConfig;
use crate::parser;
use crate::reading::{ReadingMerger, SensorSnapshot};
use crate::storage::NormalizingSink;
use crate::transport::LineSource;
use crate::view::{LogSeverity, ViewObserver};

/// Poll timeout for draining follow-up lines within one cycle
const DRAIN_POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Everything a worker needs to publish its output
pub(crate) struct WorkerContext {
    pub observers: Vec<Arc<dyn ViewObserver>>,
    pub sink: Option<Arc<NormalizingSink>>,
    pub snapshot_tx: watch::Sender<SensorSnapshot>,
    pub persist_timeout: Duration,
}

impl WorkerContext {
    /// Report a notable event to every observer
    pub(crate) fn report(&self, message: &str, severity: LogSeverity) {
        for observer in &self.observers {
            observer.on_log(message, severity);
        }
    }

    /// Publish a merged snapshot and, when requested, persist it.
    ///
    /// The sink call is bounded by `persist_timeout`; a timeout is a
    /// reported, non-fatal failure.
    async fn publish(&self, snapshot: &SensorSnapshot, persist: bool, raw_line: Option<String>) {
        // send_replace keeps `latest()` fresh even with no subscriber alive
        self.snapshot_tx.send_replace(snapshot.clone());
        for observer in &self.observers {
            observer.on_snapshot(snapshot);
        }

        if !persist {
            return;
        }
        let Some(sink) = &self.sink else {
            return;
        };

        match tokio::time::timeout(
            self.persist_timeout,
            sink.persist_snapshot(snapshot, raw_line),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.report(&format!("Persistence failed: {}", e), LogSeverity::Warning),
            Err(_) => self.report(
                &format!("Persistence timed out after {:?}", self.persist_timeout),
                LogSeverity::Warning,
            ),
        }
    }
}

/// Live acquisition loop bound to an open transport
pub(crate) async fn live_loop(
    mut source: Box<dyn LineSource>,
    ctx: WorkerContext,
    config: AcquisitionConfig,
    token: CancellationToken,
) {
    let mut merger = ReadingMerger::new();
    let mut ticker = interval(config.cycle_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("live acquisition loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                run_live_cycle(source.as_mut(), &mut merger, &ctx, &config).await;
            }
        }
    }
}

/// Demo acquisition loop fed by the synthetic generator
pub(crate) async fn demo_loop(
    mut generator: DemoGenerator,
    ctx: WorkerContext,
    config: AcquisitionConfig,
    token: CancellationToken,
) {
    let mut merger = ReadingMerger::new();
    let mut ticker = interval(config.demo_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("demo acquisition loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                let batch = generator.next_batch();
                let snapshot = merger.apply(&batch);
                ctx.publish(&snapshot, true, None).await;
            }
        }
    }
}

/// One live cycle: poll, drain, parse, merge, publish, persist
async fn run_live_cycle(
    source: &mut dyn LineSource,
    merger: &mut ReadingMerger,
    ctx: &WorkerContext,
    config: &AcquisitionConfig,
) {
    let mut lines: Vec<String> = Vec::new();

    match source.read_line(config.poll_timeout()).await {
        Ok(Some(line)) => lines.push(line),
        Ok(None) => {}
        Err(e) => {
            // Transport may recover; keep polling on the normal cadence
            ctx.report(&format!("Transport read failed: {}", e), LogSeverity::Warning);
            return;
        }
    }

    while lines.len() < config.max_lines_per_cycle && source.has_data() {
        match source.read_line(DRAIN_POLL_TIMEOUT).await {
            Ok(Some(line)) => lines.push(line),
            Ok(None) => break,
            Err(e) => {
                ctx.report(&format!("Transport read failed: {}", e), LogSeverity::Warning);
                break;
            }
        }
    }

    if lines.is_empty() {
        return;
    }

    let mut updates = Vec::new();
    for line in &lines {
        updates.extend(parser::parse(line));
    }

    let snapshot = merger.apply(&updates);

    // Persist only cycles that actually changed a field; the view still
    // sees every cycle that received data
    let persist = !updates.is_empty();
    let raw_line = persist.then(|| lines.join("\n"));
    ctx.publish(&snapshot, persist, raw_line).await;
}
