//! # View Boundary
//!
//! Callbacks through which the acquisition worker publishes snapshots and
//! notable events to a live view. The collaborator (typically a GUI shell)
//! is responsible for marshaling onto its own UI thread.

use tracing::{debug, error, info, warn};

use crate::reading::SensorSnapshot;

/// Severity attached to a view log message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSeverity {
    Info,
    Warning,
    Error,
}

/// Observer of acquisition output.
///
/// `on_snapshot` fires once per cycle that received data; `on_log` fires on
/// notable events (mode changes, transport and persistence failures). Both
/// are invoked from the worker task and must not block.
pub trait ViewObserver: Send + Sync {
    fn on_snapshot(&self, snapshot: &SensorSnapshot);

    fn on_log(&self, message: &str, severity: LogSeverity);
}

/// Observer that forwards everything to the `tracing` subscriber.
///
/// Used as the default view when the binary runs headless.
pub struct TracingView;

impl ViewObserver for TracingView {
    fn on_snapshot(&self, snapshot: &SensorSnapshot) {
        debug!(?snapshot, "snapshot published");
    }

    fn on_log(&self, message: &str, severity: LogSeverity) {
        match severity {
            LogSeverity::Info => info!("{}", message),
            LogSeverity::Warning => warn!("{}", message),
            LogSeverity::Error => error!("{}", message),
        }
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Observer that records everything it receives, for assertions
    #[derive(Clone, Default)]
    pub struct CollectingView {
        pub snapshots: Arc<Mutex<Vec<SensorSnapshot>>>,
        pub logs: Arc<Mutex<Vec<(String, LogSeverity)>>>,
    }

    impl CollectingView {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn snapshots(&self) -> Vec<SensorSnapshot> {
            self.snapshots.lock().unwrap().clone()
        }

        pub fn logs(&self) -> Vec<(String, LogSeverity)> {
            self.logs.lock().unwrap().clone()
        }
    }

    impl ViewObserver for CollectingView {
        fn on_snapshot(&self, snapshot: &SensorSnapshot) {
            self.snapshots.lock().unwrap().push(snapshot.clone());
        }

        fn on_log(&self, message: &str, severity: LogSeverity) {
            self.logs.lock().unwrap().push((message.to_string(), severity));
        }
    }
}
