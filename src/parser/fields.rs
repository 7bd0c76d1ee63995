//! # Telemetry Field Types
//!
//! Core definitions for the canonical telemetry fields and the updates
//! extracted from wire lines.

/// Canonical telemetry fields reported by the sensor modules.
///
/// Each field is independently optional in a snapshot: "not yet observed"
/// is distinct from "observed as zero".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Air quality in ppm (MQ135)
    AirQuality,

    /// Distance in meters (HC-SR04)
    Distance,

    /// Visible luminosity in lux (SI1145)
    Luminosity,

    /// UV index, unitless (SI1145)
    UvIndex,

    /// Raw infrared reading (SI1145)
    IrValue,

    /// Ambient temperature in °C (BME680)
    Temperature,

    /// Atmospheric pressure in hPa (BME680)
    Pressure,

    /// Relative humidity in % (BME680)
    Humidity,
}

/// Declared numeric representation of a field's value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    /// Stored as `f64`
    Float,
    /// Stored as `i64` (fractional wire values are rounded)
    Integer,
}

impl FieldKind {
    /// All canonical fields, in persistence column order
    pub const ALL: [FieldKind; 8] = [
        FieldKind::AirQuality,
        FieldKind::Distance,
        FieldKind::Luminosity,
        FieldKind::UvIndex,
        FieldKind::IrValue,
        FieldKind::Temperature,
        FieldKind::Pressure,
        FieldKind::Humidity,
    ];

    /// The single fixed key used for this field in persisted records
    pub fn canonical_key(&self) -> &'static str {
        match self {
            FieldKind::AirQuality => "air_quality",
            FieldKind::Distance => "distance",
            FieldKind::Luminosity => "luminosity",
            FieldKind::UvIndex => "uv_index",
            FieldKind::IrValue => "ir_value",
            FieldKind::Temperature => "temperature",
            FieldKind::Pressure => "pressure",
            FieldKind::Humidity => "humidity",
        }
    }

    /// Declared numeric kind for this field
    pub fn numeric_kind(&self) -> NumericKind {
        match self {
            FieldKind::AirQuality
            | FieldKind::Distance
            | FieldKind::UvIndex
            | FieldKind::Temperature => NumericKind::Float,
            FieldKind::Luminosity
            | FieldKind::IrValue
            | FieldKind::Pressure
            | FieldKind::Humidity => NumericKind::Integer,
        }
    }

    /// Display unit for this field
    pub fn unit(&self) -> &'static str {
        match self {
            FieldKind::AirQuality => "ppm",
            FieldKind::Distance => "m",
            FieldKind::Luminosity => "lux",
            FieldKind::UvIndex => "",
            FieldKind::IrValue => "",
            FieldKind::Temperature => "°C",
            FieldKind::Pressure => "hPa",
            FieldKind::Humidity => "%",
        }
    }
}

/// A typed field value, matching the field's declared numeric kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
}

impl FieldValue {
    /// Value as `f64` regardless of representation
    pub fn as_f64(&self) -> f64 {
        match self {
            FieldValue::Float(v) => *v,
            FieldValue::Integer(v) => *v as f64,
        }
    }

    /// Value as `i64`, rounding float representations
    pub fn as_i64(&self) -> i64 {
        match self {
            FieldValue::Float(v) => v.round() as i64,
            FieldValue::Integer(v) => *v,
        }
    }
}

/// A single (field, value) observation extracted from one wire line.
///
/// `fallback` marks updates produced by a raw-reading rule (MQ135
/// "Valeur lue") that only apply when no explicit update for the same
/// field exists in the batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldUpdate {
    pub kind: FieldKind,
    pub value: FieldValue,
    pub fallback: bool,
}

impl FieldUpdate {
    /// An explicit update from a named-field rule
    pub fn new(kind: FieldKind, value: FieldValue) -> Self {
        Self {
            kind,
            value,
            fallback: false,
        }
    }

    /// A fallback update from a raw-reading rule
    pub fn fallback(kind: FieldKind, value: FieldValue) -> Self {
        Self {
            kind,
            value,
            fallback: true,
        }
    }
}

/// Parse a numeric token into the value representation declared for `kind`.
///
/// Integer fields accept fractional text and round it, matching the
/// firmware's habit of printing e.g. `Pression = 1012.39 hPa` for an
/// integer-persisted field. Returns `None` when the token is not a number.
pub fn parse_field_value(kind: FieldKind, token: &str) -> Option<FieldValue> {
    let parsed: f64 = token.trim().parse().ok()?;
    if !parsed.is_finite() {
        return None;
    }

    match kind.numeric_kind() {
        NumericKind::Float => Some(FieldValue::Float(parsed)),
        NumericKind::Integer => Some(FieldValue::Integer(parsed.round() as i64)),
    }
}
