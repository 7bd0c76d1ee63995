//! # Key Normalization
//!
//! Resolves the several spellings a field arrives under (canonical keys,
//! legacy shorthand, raw protocol abbreviations) onto one canonical key
//! before anything reaches storage. The mapping is a single declarative
//! table; callers never consult it directly.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use super::{PersistenceRecord, Storage};
use crate::error::{Result, SensorBridgeError};
use crate::parser::FieldKind;
use crate::reading::SensorSnapshot;

/// Literal sentinel meaning "not available"; translated to absent,
/// never persisted as a value
pub const NOT_AVAILABLE: &str = "N/A";

/// Accepted spellings per field, canonical first.
///
/// The first synonym present with a non-null value wins.
const FIELD_SYNONYMS: &[(FieldKind, &[&str])] = &[
    (FieldKind::AirQuality, &["air_quality", "airQuality", "AQ", "aq"]),
    (FieldKind::Distance, &["distance", "dist", "DIST"]),
    (FieldKind::Luminosity, &["luminosity", "lum", "LUM"]),
    (FieldKind::UvIndex, &["uv_index", "uvIndex", "UV"]),
    (FieldKind::IrValue, &["ir_value", "irValue", "IR"]),
    (FieldKind::Temperature, &["temperature", "temp", "TEMP"]),
    (FieldKind::Pressure, &["pressure", "press", "PRESS"]),
    (FieldKind::Humidity, &["humidity", "hum", "HUM"]),
];

/// Accepted spellings for the raw-payload attachment
const RAW_LINE_SYNONYMS: &[&str] = &["raw_line", "rawData", "raw_data", "raw"];

/// Normalizing front of the storage collaborator.
///
/// Builds an immutable canonical-keyed record from whatever keying the
/// caller has, refuses records with no values, and never mutates its input.
pub struct NormalizingSink {
    storage: Arc<dyn Storage>,
}

impl NormalizingSink {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Persist a published snapshot.
    ///
    /// # Errors
    ///
    /// Returns `Storage` error when the snapshot carries no values (the
    /// storage collaborator is not contacted) or when the insert fails.
    pub async fn persist_snapshot(
        &self,
        snapshot: &SensorSnapshot,
        raw_line: Option<String>,
    ) -> Result<()> {
        let record = PersistenceRecord::from_snapshot(snapshot, raw_line);
        self.insert_checked(record).await
    }

    /// Persist an arbitrary-keyed update map, resolving synonyms.
    ///
    /// Values may be JSON numbers or numeric strings; the `"N/A"` sentinel
    /// and nulls are treated as absent.
    pub async fn persist_map(&self, fields: &Map<String, Value>) -> Result<()> {
        let mut record = PersistenceRecord::new();

        for (kind, synonyms) in FIELD_SYNONYMS {
            if let Some(value) = resolve(fields, synonyms) {
                set_field(&mut record, *kind, value);
            }
        }

        record.raw_line = RAW_LINE_SYNONYMS
            .iter()
            .find_map(|key| fields.get(*key))
            .and_then(|v| v.as_str())
            .filter(|s| *s != NOT_AVAILABLE)
            .map(str::to_string);

        self.insert_checked(record).await
    }

    async fn insert_checked(&self, record: PersistenceRecord) -> Result<()> {
        if !record.has_values() {
            debug!("Dropping record with no field values");
            return Err(SensorBridgeError::Storage(
                "record contains no field values".to_string(),
            ));
        }
        self.storage.insert(&record).await
    }
}

/// First synonym present with a usable numeric value
fn resolve(fields: &Map<String, Value>, synonyms: &[&str]) -> Option<f64> {
    synonyms
        .iter()
        .find_map(|key| fields.get(*key).and_then(numeric_value))
}

/// Interpret a JSON value as a field number; sentinel and null are absent
fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s == NOT_AVAILABLE => None,
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Store a resolved value under the field's canonical slot, respecting the
/// field's declared numeric kind
fn set_field(record: &mut PersistenceRecord, kind: FieldKind, value: f64) {
    let rounded = value.round() as i64;
    match kind {
        FieldKind::AirQuality => record.air_quality = Some(value),
        FieldKind::Distance => record.distance = Some(value),
        FieldKind::UvIndex => record.uv_index = Some(value),
        FieldKind::Temperature => record.temperature = Some(value),
        FieldKind::Luminosity => record.luminosity = Some(rounded),
        FieldKind::IrValue => record.ir_value = Some(rounded),
        FieldKind::Pressure => record.pressure = Some(rounded),
        FieldKind::Humidity => record.humidity = Some(rounded),
    }
}
