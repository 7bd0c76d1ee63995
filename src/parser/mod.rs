//! # Line Parser Module
//!
//! Multi-dialect parsing of raw telemetry lines into typed field updates.
//!
//! This module handles:
//! - Canonical field definitions (kinds, numeric representations, units)
//! - Dialect classification via ordered pattern rules
//! - Pure per-dialect extractors returning field updates
//! - Noise, control-phrase and echo-line filtering

pub mod fields;
pub mod line;

pub use fields::{parse_field_value, FieldKind, FieldUpdate, FieldValue, NumericKind};
pub use line::{classify, parse, LineKind};
