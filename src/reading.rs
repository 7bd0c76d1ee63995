//! # Sensor Reading State
//!
//! The merged, authoritative sensor state and the policy for folding
//! incremental field updates into it.
//!
//! Values arrive scattered across several lines and cycles, so the snapshot
//! is built by carry-forward: an update overwrites exactly its own field and
//! every other field keeps its previous value. The merger is the only writer
//! of this state; everything downstream receives cloned snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

use crate::parser::{FieldKind, FieldUpdate, FieldValue};

/// Complete set of latest known field values.
///
/// `None` means the field has not been observed yet, which is distinct from
/// an observed zero. `last_update` is the time the most recent update batch
/// changed any field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorSnapshot {
    /// Air quality in ppm
    pub air_quality: Option<f64>,

    /// Distance in meters
    pub distance: Option<f64>,

    /// Visible luminosity in lux
    pub luminosity: Option<i64>,

    /// UV index
    pub uv_index: Option<f64>,

    /// Raw infrared reading
    pub ir_value: Option<i64>,

    /// Temperature in °C
    pub temperature: Option<f64>,

    /// Pressure in hPa
    pub pressure: Option<i64>,

    /// Relative humidity in %
    pub humidity: Option<i64>,

    /// When a field was last modified
    pub last_update: Option<DateTime<Utc>>,
}

impl SensorSnapshot {
    /// True when no field has been observed yet
    pub fn is_empty(&self) -> bool {
        self.air_quality.is_none()
            && self.distance.is_none()
            && self.luminosity.is_none()
            && self.uv_index.is_none()
            && self.ir_value.is_none()
            && self.temperature.is_none()
            && self.pressure.is_none()
            && self.humidity.is_none()
    }

    /// Overwrite exactly one field from a typed value
    fn set(&mut self, kind: FieldKind, value: FieldValue) {
        match kind {
            FieldKind::AirQuality => self.air_quality = Some(value.as_f64()),
            FieldKind::Distance => self.distance = Some(value.as_f64()),
            FieldKind::Luminosity => self.luminosity = Some(value.as_i64()),
            FieldKind::UvIndex => self.uv_index = Some(value.as_f64()),
            FieldKind::IrValue => self.ir_value = Some(value.as_i64()),
            FieldKind::Temperature => self.temperature = Some(value.as_f64()),
            FieldKind::Pressure => self.pressure = Some(value.as_i64()),
            FieldKind::Humidity => self.humidity = Some(value.as_i64()),
        }
    }
}

/// Owner of the canonical "latest known reading" state.
///
/// Created empty at acquisition start and mutated exclusively by `apply`.
#[derive(Debug, Default)]
pub struct ReadingMerger {
    current: SensorSnapshot,
}

impl ReadingMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold an update batch into the snapshot and return the merged result.
    ///
    /// Each update overwrites exactly its own field; unmentioned fields are
    /// carried forward unchanged. When a batch carries both an explicit
    /// update and a fallback update for the same field (MQ135 "Air Quality"
    /// next to "Valeur lue"), the explicit one is authoritative and the
    /// fallback is dropped. The returned snapshot is always complete and
    /// consistent, usable directly for display or persistence.
    pub fn apply(&mut self, updates: &[FieldUpdate]) -> SensorSnapshot {
        let mut explicit: HashSet<FieldKind> = HashSet::new();
        let mut changed = false;

        for update in updates.iter().filter(|u| !u.fallback) {
            self.current.set(update.kind, update.value);
            explicit.insert(update.kind);
            changed = true;
        }

        for update in updates.iter().filter(|u| u.fallback) {
            if !explicit.contains(&update.kind) {
                self.current.set(update.kind, update.value);
                changed = true;
            }
        }

        if changed {
            self.current.last_update = Some(Utc::now());
        }

        self.current.clone()
    }

    /// The current merged state
    pub fn latest(&self) -> &SensorSnapshot {
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(kind: FieldKind, value: FieldValue) -> FieldUpdate {
        FieldUpdate::new(kind, value)
    }

    #[test]
    fn test_empty_snapshot() {
        let merger = ReadingMerger::new();
        assert!(merger.latest().is_empty());
        assert_eq!(merger.latest().last_update, None);
    }

    #[test]
    fn test_apply_sets_named_fields_only() {
        let mut merger = ReadingMerger::new();
        let snapshot = merger.apply(&[
            update(FieldKind::AirQuality, FieldValue::Float(800.0)),
            update(FieldKind::Temperature, FieldValue::Float(22.5)),
        ]);

        assert_eq!(snapshot.air_quality, Some(800.0));
        assert_eq!(snapshot.temperature, Some(22.5));
        assert_eq!(snapshot.distance, None, "Unmentioned field must stay unobserved");
        assert_eq!(snapshot.humidity, None);
        assert!(snapshot.last_update.is_some());
    }

    #[test]
    fn test_carry_forward() {
        let mut merger = ReadingMerger::new();
        merger.apply(&[update(FieldKind::Temperature, FieldValue::Float(22.5))]);
        let snapshot = merger.apply(&[update(FieldKind::Humidity, FieldValue::Integer(65))]);

        assert_eq!(snapshot.temperature, Some(22.5), "Earlier value must be carried forward");
        assert_eq!(snapshot.humidity, Some(65));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let batch = [
            update(FieldKind::Pressure, FieldValue::Integer(1010)),
            update(FieldKind::Distance, FieldValue::Float(1.5)),
        ];

        let mut merger = ReadingMerger::new();
        let once = merger.apply(&batch);
        let twice = merger.apply(&batch);

        assert_eq!(once.pressure, twice.pressure);
        assert_eq!(once.distance, twice.distance);
        assert_eq!(once.is_empty(), twice.is_empty());
    }

    #[test]
    fn test_observed_zero_is_not_unobserved() {
        let mut merger = ReadingMerger::new();
        let snapshot = merger.apply(&[update(FieldKind::Luminosity, FieldValue::Integer(0))]);
        assert_eq!(snapshot.luminosity, Some(0));
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn test_explicit_beats_fallback_in_same_batch() {
        let mut merger = ReadingMerger::new();
        let snapshot = merger.apply(&[
            FieldUpdate::fallback(FieldKind::AirQuality, FieldValue::Float(348.0)),
            update(FieldKind::AirQuality, FieldValue::Float(8.94)),
        ]);

        assert_eq!(snapshot.air_quality, Some(8.94), "Named reading is authoritative");
    }

    #[test]
    fn test_fallback_applies_when_alone() {
        let mut merger = ReadingMerger::new();
        let snapshot = merger.apply(&[FieldUpdate::fallback(
            FieldKind::AirQuality,
            FieldValue::Float(348.0),
        )]);

        assert_eq!(snapshot.air_quality, Some(348.0));
    }

    #[test]
    fn test_fallback_does_not_beat_earlier_batch() {
        // Precedence is per batch: a fallback in a later cycle still
        // overwrites the value from a previous cycle.
        let mut merger = ReadingMerger::new();
        merger.apply(&[update(FieldKind::AirQuality, FieldValue::Float(8.94))]);
        let snapshot = merger.apply(&[FieldUpdate::fallback(
            FieldKind::AirQuality,
            FieldValue::Float(348.0),
        )]);

        assert_eq!(snapshot.air_quality, Some(348.0));
    }

    #[test]
    fn test_empty_batch_keeps_timestamp() {
        let mut merger = ReadingMerger::new();
        merger.apply(&[update(FieldKind::Temperature, FieldValue::Float(20.0))]);
        let stamped = merger.latest().last_update;

        let snapshot = merger.apply(&[]);
        assert_eq!(snapshot.last_update, stamped, "Empty batch must not touch the timestamp");
    }
}
