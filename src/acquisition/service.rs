//! # Acquisition Service
//!
//! The control surface of the pipeline: an explicit state machine over
//! {Idle, Live, Demo} owning at most one worker task at a time.
//!
//! Transitions are strictly serialized: `stop` waits (bounded) for the
//! worker to terminate, and the mode-switching calls stop the previous
//! worker before spawning the next one, so at no instant are a Live and a
//! Demo cycle executing concurrently.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::demo::DemoGenerator;
use super::worker::{demo_loop, live_loop, WorkerContext};
use crate::config::AcquisitionConfig;
use crate::error::Result;
use crate::reading::SensorSnapshot;
use crate::storage::NormalizingSink;
use crate::transport::LineSource;
use crate::view::{LogSeverity, ViewObserver};

/// Acquisition mode; exactly one is active at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionMode {
    Idle,
    Live,
    Demo,
}

/// Handle to the single running worker task
struct WorkerHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

/// Owner of the acquisition lifecycle.
///
/// The controlling task issues `start`/`start_demo`/`stop` and reads
/// published snapshots; it never blocks on the worker except during the
/// bounded `stop` join.
pub struct AcquisitionService {
    config: AcquisitionConfig,
    mode: AcquisitionMode,
    worker: Option<WorkerHandle>,
    observers: Vec<Arc<dyn ViewObserver>>,
    sink: Option<Arc<NormalizingSink>>,
    snapshot_tx: watch::Sender<SensorSnapshot>,
}

impl AcquisitionService {
    pub fn new(config: AcquisitionConfig) -> Self {
        let (snapshot_tx, _) = watch::channel(SensorSnapshot::default());
        Self {
            config,
            mode: AcquisitionMode::Idle,
            worker: None,
            observers: Vec::new(),
            sink: None,
            snapshot_tx,
        }
    }

    /// Register a view observer; called before starting acquisition
    pub fn add_observer(&mut self, observer: Arc<dyn ViewObserver>) {
        self.observers.push(observer);
    }

    /// Attach the persistence sink; called before starting acquisition
    pub fn attach_sink(&mut self, sink: Arc<NormalizingSink>) {
        self.sink = Some(sink);
    }

    /// Currently active mode
    pub fn current_mode(&self) -> AcquisitionMode {
        self.mode
    }

    /// Last published snapshot (retained across stop)
    pub fn latest(&self) -> SensorSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Receiver that observes every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<SensorSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Start live acquisition on an already-open transport.
    ///
    /// No-op (with a reported warning) when already Live; a running Demo
    /// worker is fully stopped first.
    pub async fn start(&mut self, source: Box<dyn LineSource>) -> Result<()> {
        if self.mode == AcquisitionMode::Live {
            self.report("Live acquisition already running, ignoring start", LogSeverity::Warning);
            return Ok(());
        }
        if self.mode == AcquisitionMode::Demo {
            self.stop().await?;
        }

        let token = CancellationToken::new();
        let join = tokio::spawn(live_loop(
            source,
            self.worker_context(),
            self.config.clone(),
            token.clone(),
        ));

        self.worker = Some(WorkerHandle { token, join });
        self.mode = AcquisitionMode::Live;
        self.report("Live acquisition started", LogSeverity::Info);
        Ok(())
    }

    /// Start demo acquisition with synthetic readings.
    ///
    /// No-op (with a reported warning) when already Demo; a running Live
    /// worker is fully stopped first.
    pub async fn start_demo(&mut self) -> Result<()> {
        if self.mode == AcquisitionMode::Demo {
            self.report("Demo mode already running, ignoring start", LogSeverity::Warning);
            return Ok(());
        }
        if self.mode == AcquisitionMode::Live {
            self.stop().await?;
        }

        let token = CancellationToken::new();
        let join = tokio::spawn(demo_loop(
            DemoGenerator::new(),
            self.worker_context(),
            self.config.clone(),
            token.clone(),
        ));

        self.worker = Some(WorkerHandle { token, join });
        self.mode = AcquisitionMode::Demo;
        self.report("Demo mode started", LogSeverity::Info);
        Ok(())
    }

    /// Stop the running worker, waiting (bounded) for the in-flight cycle.
    ///
    /// Idempotent; after return the worker has been observed terminated (or
    /// aborted once the timeout expired) and the transport/generator handle
    /// is released.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            self.mode = AcquisitionMode::Idle;
            return Ok(());
        };

        worker.token.cancel();
        let mut join = worker.join;
        match tokio::time::timeout(self.config.stop_timeout(), &mut join).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.report(&format!("Acquisition worker failed: {}", e), LogSeverity::Error);
            }
            Err(_) => {
                join.abort();
                self.report(
                    &format!(
                        "Acquisition worker did not stop within {:?}, aborted",
                        self.config.stop_timeout()
                    ),
                    LogSeverity::Warning,
                );
            }
        }

        self.mode = AcquisitionMode::Idle;
        self.report("Acquisition stopped", LogSeverity::Info);
        Ok(())
    }

    fn worker_context(&self) -> WorkerContext {
        WorkerContext {
            observers: self.observers.clone(),
            sink: self.sink.clone(),
            snapshot_tx: self.snapshot_tx.clone(),
            persist_timeout: self.config.persist_timeout(),
        }
    }

    fn report(&self, message: &str, severity: LogSeverity) {
        match severity {
            LogSeverity::Info => info!("{}", message),
            LogSeverity::Warning => tracing::warn!("{}", message),
            LogSeverity::Error => tracing::error!("{}", message),
        }
        for observer in &self.observers {
            observer.on_log(message, severity);
        }
    }
}
