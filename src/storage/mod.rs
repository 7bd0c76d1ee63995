//! # Storage Module
//!
//! Handles persistence of normalized telemetry records to JSONL files with
//! rotation.
//!
//! This module handles:
//! - The canonical-keyed persistence record
//! - The storage collaborator boundary
//! - Writing records as JSONL (JSON Lines)
//! - Managing file rotation (max N records per file)
//! - Retaining only the last M files
//! - Key-synonym normalization in front of storage (see [`normalizer`])

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, SensorBridgeError};
use crate::reading::SensorSnapshot;

pub mod normalizer;

pub use normalizer::NormalizingSink;

/// Prefix of every telemetry file written by [`JsonlStorage`]
const TELEMETRY_FILE_PREFIX: &str = "telemetry_";

/// Canonical-keyed record handed to the storage collaborator.
///
/// Built fresh from each published snapshot and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceRecord {
    /// When the record was built
    pub timestamp: DateTime<Utc>,

    pub air_quality: Option<f64>,
    pub distance: Option<f64>,
    pub luminosity: Option<i64>,
    pub uv_index: Option<f64>,
    pub ir_value: Option<i64>,
    pub temperature: Option<f64>,
    pub pressure: Option<i64>,
    pub humidity: Option<i64>,

    /// Raw wire payload the values came from, when available
    pub raw_line: Option<String>,
}

impl PersistenceRecord {
    /// A record with no field values, stamped now
    pub fn new() -> Self {
        Self {
            timestamp: Utc::now(),
            air_quality: None,
            distance: None,
            luminosity: None,
            uv_index: None,
            ir_value: None,
            temperature: None,
            pressure: None,
            humidity: None,
            raw_line: None,
        }
    }

    /// Build a record mirroring a snapshot's fields
    pub fn from_snapshot(snapshot: &SensorSnapshot, raw_line: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            air_quality: snapshot.air_quality,
            distance: snapshot.distance,
            luminosity: snapshot.luminosity,
            uv_index: snapshot.uv_index,
            ir_value: snapshot.ir_value,
            temperature: snapshot.temperature,
            pressure: snapshot.pressure,
            humidity: snapshot.humidity,
            raw_line,
        }
    }

    /// True when at least one field carries a value
    pub fn has_values(&self) -> bool {
        self.air_quality.is_some()
            || self.distance.is_some()
            || self.luminosity.is_some()
            || self.uv_index.is_some()
            || self.ir_value.is_some()
            || self.temperature.is_some()
            || self.pressure.is_some()
            || self.humidity.is_some()
    }
}

impl Default for PersistenceRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Storage collaborator boundary.
///
/// Receives fully normalized, canonical-keyed records; schema concerns
/// belong to the implementation.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn insert(&self, record: &PersistenceRecord) -> Result<()>;
}

/// Rotation bookkeeping guarded by the storage mutex
struct RotationState {
    current: Option<PathBuf>,
    records_in_file: usize,
    file_seq: u64,
}

/// JSONL file storage with rotation.
///
/// Appends one JSON object per record. A new file is started every
/// `max_records_per_file` records; only the newest `max_files_to_keep`
/// files are retained.
pub struct JsonlStorage {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    state: Mutex<RotationState>,
}

impl JsonlStorage {
    pub fn new(
        dir: impl Into<PathBuf>,
        max_records_per_file: usize,
        max_files_to_keep: usize,
    ) -> Self {
        Self {
            dir: dir.into(),
            max_records_per_file,
            max_files_to_keep,
            state: Mutex::new(RotationState {
                current: None,
                records_in_file: 0,
                file_seq: 0,
            }),
        }
    }

    /// Start a new telemetry file and prune old ones
    async fn rotate(&self, state: &mut RotationState) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        // The sequence number keeps names unique and sortable even when
        // several rotations happen within one second.
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let name = format!("{}{}_{:04}.jsonl", TELEMETRY_FILE_PREFIX, stamp, state.file_seq);
        let path = self.dir.join(name);
        state.file_seq += 1;
        state.current = Some(path.clone());
        state.records_in_file = 0;

        // Create the file up front so pruning counts it against the limit
        tokio::fs::File::create(&path).await?;
        info!("Rotated telemetry storage to {}", path.display());

        if let Err(e) = self.prune_old_files(&path).await {
            warn!("Failed to prune old telemetry files: {}", e);
        }

        Ok(path)
    }

    /// Delete the oldest telemetry files beyond the retention limit
    async fn prune_old_files(&self, keep_newest: &Path) -> Result<()> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(TELEMETRY_FILE_PREFIX) && name.ends_with(".jsonl") {
                names.push(name);
            }
        }

        // Names sort chronologically: timestamp then zero-padded sequence
        names.sort_unstable();

        while names.len() > self.max_files_to_keep {
            let victim = self.dir.join(names.remove(0));
            if victim == keep_newest {
                break;
            }
            debug!("Pruning old telemetry file {}", victim.display());
            tokio::fs::remove_file(&victim).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl Storage for JsonlStorage {
    async fn insert(&self, record: &PersistenceRecord) -> Result<()> {
        let line = serde_json::to_string(record)
            .map_err(|e| SensorBridgeError::Storage(format!("record serialization failed: {}", e)))?;

        let mut state = self.state.lock().await;

        let path = match &state.current {
            Some(path) if state.records_in_file < self.max_records_per_file => path.clone(),
            _ => self.rotate(&mut state).await?,
        };

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;

        state.records_in_file += 1;
        Ok(())
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};
    use std::time::Duration;

    /// Mock storage recording every inserted record
    #[derive(Clone, Default)]
    pub struct MockStorage {
        pub inserted: Arc<StdMutex<Vec<PersistenceRecord>>>,
        pub insert_error: Arc<StdMutex<Option<String>>>,
        pub insert_delay: Arc<StdMutex<Option<Duration>>>,
    }

    impl MockStorage {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn inserted(&self) -> Vec<PersistenceRecord> {
            self.inserted.lock().unwrap().clone()
        }

        pub fn set_insert_error(&self, message: impl Into<String>) {
            *self.insert_error.lock().unwrap() = Some(message.into());
        }

        /// Make every insert stall, for persistence-timeout tests
        pub fn set_insert_delay(&self, delay: Duration) {
            *self.insert_delay.lock().unwrap() = Some(delay);
        }
    }

    #[async_trait]
    impl Storage for MockStorage {
        async fn insert(&self, record: &PersistenceRecord) -> Result<()> {
            let delay = *self.insert_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(message) = self.insert_error.lock().unwrap().take() {
                return Err(SensorBridgeError::Storage(message));
            }
            self.inserted.lock().unwrap().push(record.clone());
            Ok(())
        }
    }
}
