//! # Demo Data Generation
//!
//! Synthesizes range-realistic field updates when no sensor station is
//! attached, so the rest of the pipeline (merge, publish, persist) runs
//! unchanged.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::parser::{FieldKind, FieldUpdate, FieldValue};

/// Generator of synthetic update batches.
///
/// Ranges match what the real sensors report under indoor conditions. The
/// SI1145 UV/IR channels are deliberately left out of the batches so the
/// carry-forward path is exercised in demo mode too.
pub struct DemoGenerator {
    rng: StdRng,
}

impl DemoGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generator for tests
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Produce one batch of synthetic updates
    pub fn next_batch(&mut self) -> Vec<FieldUpdate> {
        let distance = round_to(self.rng.gen_range(0.1..5.0), 2);
        let temperature = round_to(self.rng.gen_range(18.0..28.0), 1);

        vec![
            FieldUpdate::new(
                FieldKind::AirQuality,
                FieldValue::Float(self.rng.gen_range(400..=1200) as f64),
            ),
            FieldUpdate::new(FieldKind::Distance, FieldValue::Float(distance)),
            FieldUpdate::new(
                FieldKind::Luminosity,
                FieldValue::Integer(self.rng.gen_range(100..=1000)),
            ),
            FieldUpdate::new(FieldKind::Temperature, FieldValue::Float(temperature)),
            FieldUpdate::new(
                FieldKind::Pressure,
                FieldValue::Integer(self.rng.gen_range(980..=1020)),
            ),
            FieldUpdate::new(
                FieldKind::Humidity,
                FieldValue::Integer(self.rng.gen_range(30..=80)),
            ),
        ]
    }
}

impl Default for DemoGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
