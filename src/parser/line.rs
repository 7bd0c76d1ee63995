//! # Telemetry Line Parser
//!
//! Classifies raw wire lines into dialects and extracts typed field updates.
//!
//! This module handles:
//! - Key:value CSV lines (`AQ:800,DIST:1.5,TEMP:22.5`)
//! - Labeled assignments (`Temperature = 24.97 *C`, `Pression: 1012 hPa`)
//! - Device-prefixed triples (`SI1145 - Visible: 262`, `HC_SR04 - Distance: 34 cm`)
//! - Separator, banner and control-phrase noise
//! - Echo-prefixed lines (`Message envoyé: ...`), stripped and re-parsed once
//!
//! Parsing never fails: unrecognized lines and unparsable numerals yield no
//! updates. Classification is stateless; each line belongs to exactly one
//! dialect, decided by ordered pattern rules.

use lazy_static::lazy_static;
use regex::Regex;

use super::fields::{parse_field_value, FieldKind, FieldUpdate, FieldValue};

/// Echo prefixes prepended by the firmware when it mirrors back a command.
///
/// The middle spellings are the UTF-8-as-Latin-1 artifacts the serial feed
/// produces when the firmware was flashed with a mangled string table.
/// Lowercase, compared against the lowercased line.
const ECHO_PREFIXES: &[&str] = &[
    "message envoyé:",
    "message envoyã©:",
    "message envoye:",
];

/// Control phrases emitted between measurement blocks. Lowercase.
const CONTROL_PHRASES: &[&str] = &[
    "fin des mesures",
    "rafraîchissement dans",
    "rafraã®chissement dans",
    "rafraichissement dans",
];

/// Banner glyph used by the firmware to frame its startup header
const BANNER_GLYPH: char = '═';

lazy_static! {
    /// A comma-separated segment that opens with a known short key
    static ref KV_SEGMENT_RE: Regex =
        Regex::new(r"^\s*(AQ|DIST|LUM|UV|IR|TEMP|HUM|PRESS)\s*:").unwrap();

    /// A free-text label followed by `=` or `:` and a decimal number
    static ref LABELED_RE: Regex =
        Regex::new(r"(?i)(temperature|pression|humidit|distance|luminosit|\bLUM\b)\s*\S*\s*[:=]").unwrap();

    // Device-prefixed extraction rules. The tag may be separated from the
    // field name by arbitrary text, matching the firmware's free-form output.
    static ref SI_VISIBLE_RE: Regex = Regex::new(r"SI1145.*Visible[:\s]+(\d+)").unwrap();
    static ref SI_UV_RE: Regex = Regex::new(r"SI1145.*UV[:\s]+(\d+(?:\.\d+)?)").unwrap();
    static ref SI_IR_RE: Regex = Regex::new(r"SI1145.*IR[:\s]+(\d+)").unwrap();
    static ref MQ_AIR_QUALITY_RE: Regex =
        Regex::new(r"MQ135.*Air Quality[:\s]+(\d+(?:\.\d+)?)").unwrap();
    static ref MQ_RAW_RE: Regex = Regex::new(r"MQ135.*Valeur lue[:\s]+(\d+)").unwrap();
    static ref HC_DISTANCE_RE: Regex =
        Regex::new(r"HC_SR04.*Distance\s*[:=]\s*(\d+(?:\.\d+)?)").unwrap();
    static ref BME_TEMPERATURE_RE: Regex =
        Regex::new(r"BME680.*Temperature\s*[:=]\s*(\d+(?:\.\d+)?)").unwrap();
    static ref BME_PRESSURE_RE: Regex =
        Regex::new(r"BME680.*Pression\s*[:=]\s*(\d+(?:\.\d+)?)").unwrap();
    static ref BME_HUMIDITY_RE: Regex =
        Regex::new(r"BME680.*Humidit\S*\s*[:=]\s*(\d+(?:\.\d+)?)").unwrap();

    // Labeled-assignment extraction rules (generic lines without a device tag)
    static ref TEMPERATURE_RE: Regex =
        Regex::new(r"(?i)temperature\s*[:=]\s*(\d+(?:\.\d+)?)").unwrap();
    static ref PRESSURE_RE: Regex =
        Regex::new(r"(?i)pression\s*[:=]\s*(\d+(?:\.\d+)?)").unwrap();
    static ref HUMIDITY_RE: Regex =
        Regex::new(r"(?i)humidit\S*\s*[:=]\s*(\d+(?:\.\d+)?)").unwrap();
    static ref DISTANCE_RE: Regex =
        Regex::new(r"(?i)distance\s*[:=]\s*(\d+(?:\.\d+)?)").unwrap();
    static ref LUMINOSITY_RE: Regex =
        Regex::new(r"(?i)(?:luminosit\S*|LUM)\s*[:=]\s*(\d+(?:\.\d+)?)").unwrap();
}

/// Dialect a wire line belongs to.
///
/// Classification tries the variants in a fixed order; the first rule that
/// matches wins and no other extractor runs for that line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// A run of `-` characters separating measurement blocks
    Separator,

    /// A known control phrase or banner line, discarded
    Control,

    /// An echoed command; payload is the text after the prefix
    Echo(String),

    /// Comma-separated `KEY:value` pairs
    KeyValueCsv,

    /// A line carrying one of the device tags (SI1145, MQ135, BME680, HC_SR04)
    DevicePrefixed,

    /// A free-text `Label = value unit` assignment
    Labeled,

    /// No dialect matched
    Unrecognized,
}

/// Classify a raw line into its dialect
pub fn classify(line: &str) -> LineKind {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineKind::Unrecognized;
    }

    if trimmed.chars().all(|c| c == '-') {
        return LineKind::Separator;
    }

    let lower = trimmed.to_lowercase();
    if trimmed.contains(BANNER_GLYPH) || CONTROL_PHRASES.iter().any(|p| lower.contains(p)) {
        return LineKind::Control;
    }

    for prefix in ECHO_PREFIXES {
        if lower.starts_with(prefix) {
            // Every prefix ends with ':', so the payload starts after the
            // first colon of the original line.
            let payload = match trimmed.find(':') {
                Some(idx) => trimmed[idx + 1..].trim().to_string(),
                None => String::new(),
            };
            return LineKind::Echo(payload);
        }
    }

    if trimmed.split(',').any(|segment| KV_SEGMENT_RE.is_match(segment)) {
        return LineKind::KeyValueCsv;
    }

    if ["SI1145", "MQ135", "BME680", "HC_SR04"]
        .iter()
        .any(|tag| trimmed.contains(tag))
    {
        return LineKind::DevicePrefixed;
    }

    if LABELED_RE.is_match(trimmed) {
        return LineKind::Labeled;
    }

    LineKind::Unrecognized
}

/// Parse one decoded wire line into zero or more field updates.
///
/// Never fails on malformed input: unrecognized lines, noise and unparsable
/// numerals yield an empty vector (a bad numeral drops only that field,
/// other pairs on the same line still apply). Echo-prefixed lines are
/// stripped and the remainder parsed once; a nested echo is discarded.
pub fn parse(line: &str) -> Vec<FieldUpdate> {
    match classify(line) {
        LineKind::Separator | LineKind::Control | LineKind::Unrecognized => Vec::new(),
        LineKind::Echo(payload) => match classify(&payload) {
            // Strip the prefix exactly once
            LineKind::Echo(_) => Vec::new(),
            LineKind::KeyValueCsv => extract_key_values(&payload),
            LineKind::DevicePrefixed => extract_device_prefixed(&payload),
            LineKind::Labeled => extract_labeled(&payload),
            _ => Vec::new(),
        },
        LineKind::KeyValueCsv => extract_key_values(line),
        LineKind::DevicePrefixed => extract_device_prefixed(line),
        LineKind::Labeled => extract_labeled(line),
    }
}

/// Extract updates from a comma-separated `KEY:value` line
fn extract_key_values(line: &str) -> Vec<FieldUpdate> {
    let mut updates = Vec::new();

    for segment in line.split(',') {
        let Some((key, value)) = segment.split_once(':') else {
            continue;
        };

        let kind = match key.trim() {
            "AQ" => FieldKind::AirQuality,
            "DIST" => FieldKind::Distance,
            "LUM" => FieldKind::Luminosity,
            "UV" => FieldKind::UvIndex,
            "IR" => FieldKind::IrValue,
            "TEMP" => FieldKind::Temperature,
            "HUM" => FieldKind::Humidity,
            "PRESS" => FieldKind::Pressure,
            _ => continue,
        };

        // An unparsable value drops this field only
        if let Some(value) = parse_field_value(kind, value) {
            updates.push(FieldUpdate::new(kind, value));
        }
    }

    updates
}

/// Extract updates from a device-prefixed line
fn extract_device_prefixed(line: &str) -> Vec<FieldUpdate> {
    let mut updates = Vec::new();

    if line.contains("SI1145") {
        if line.contains("Visible") {
            push_capture(&mut updates, &SI_VISIBLE_RE, line, FieldKind::Luminosity, false);
        } else if line.contains("UV") {
            push_capture(&mut updates, &SI_UV_RE, line, FieldKind::UvIndex, false);
        } else if line.contains("IR") {
            push_capture(&mut updates, &SI_IR_RE, line, FieldKind::IrValue, false);
        }
    }

    if line.contains("MQ135") {
        if line.contains("Air Quality") {
            push_capture(&mut updates, &MQ_AIR_QUALITY_RE, line, FieldKind::AirQuality, false);
        } else if line.contains("Valeur lue") {
            // Raw ADC reading; applies only when no named air-quality
            // update exists in the same batch
            push_capture(&mut updates, &MQ_RAW_RE, line, FieldKind::AirQuality, true);
        }
    }

    if line.contains("HC_SR04") && line.contains("Distance") {
        if let Some(centimeters) = first_capture(&HC_DISTANCE_RE, line) {
            if let Ok(value) = centimeters.parse::<f64>() {
                updates.push(FieldUpdate::new(
                    FieldKind::Distance,
                    FieldValue::Float(value / 100.0),
                ));
            }
        }
    }

    if line.contains("BME680") {
        if line.contains("Temperature") {
            push_capture(&mut updates, &BME_TEMPERATURE_RE, line, FieldKind::Temperature, false);
        } else if line.contains("Pression") {
            push_capture(&mut updates, &BME_PRESSURE_RE, line, FieldKind::Pressure, false);
        } else if line.to_lowercase().contains("humidit") {
            push_capture(&mut updates, &BME_HUMIDITY_RE, line, FieldKind::Humidity, false);
        }
    }

    updates
}

/// Extract one update from a labeled-assignment line
fn extract_labeled(line: &str) -> Vec<FieldUpdate> {
    let mut updates = Vec::new();
    let lower = line.to_lowercase();

    if lower.contains("temperature") {
        push_capture(&mut updates, &TEMPERATURE_RE, line, FieldKind::Temperature, false);
    } else if lower.contains("pression") {
        push_capture(&mut updates, &PRESSURE_RE, line, FieldKind::Pressure, false);
    } else if lower.contains("humidit") {
        push_capture(&mut updates, &HUMIDITY_RE, line, FieldKind::Humidity, false);
    } else if lower.contains("distance") {
        // No HC_SR04 tag: the value is already in meters
        push_capture(&mut updates, &DISTANCE_RE, line, FieldKind::Distance, false);
    } else if lower.contains("luminosit") || line.contains("LUM") {
        push_capture(&mut updates, &LUMINOSITY_RE, line, FieldKind::Luminosity, false);
    }

    updates
}

/// First capture group of `re` in `line`, if any
fn first_capture<'a>(re: &Regex, line: &'a str) -> Option<&'a str> {
    re.captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Push an update for `kind` if `re` captures a parsable numeral
fn push_capture(
    updates: &mut Vec<FieldUpdate>,
    re: &Regex,
    line: &str,
    kind: FieldKind,
    fallback: bool,
) {
    if let Some(token) = first_capture(re, line) {
        if let Some(value) = parse_field_value(kind, token) {
            updates.push(FieldUpdate {
                kind,
                value,
                fallback,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(line: &str) -> FieldUpdate {
        let updates = parse(line);
        assert_eq!(updates.len(), 1, "Expected one update from {:?}, got {:?}", line, updates);
        updates[0]
    }

    #[test]
    fn test_classify_separator() {
        assert_eq!(classify("----------"), LineKind::Separator);
        assert_eq!(classify("  ---  "), LineKind::Separator);
    }

    #[test]
    fn test_classify_control_phrases() {
        assert_eq!(classify("Fin des mesures"), LineKind::Control);
        assert_eq!(classify("Rafraîchissement dans 5 secondes"), LineKind::Control);
        assert_eq!(classify("RafraÃ®chissement dans 5 secondes"), LineKind::Control);
        assert_eq!(classify("══════ Station ══════"), LineKind::Control);
    }

    #[test]
    fn test_classify_dialects() {
        assert_eq!(classify("AQ:800,TEMP:22.5"), LineKind::KeyValueCsv);
        assert_eq!(classify("SI1145 - Visible: 262"), LineKind::DevicePrefixed);
        assert_eq!(classify("Temperature = 24.97 *C"), LineKind::Labeled);
        assert_eq!(classify("garbage with no structure"), LineKind::Unrecognized);
        assert_eq!(classify(""), LineKind::Unrecognized);
    }

    #[test]
    fn test_device_tag_beats_labeled_assignment() {
        // A BME680 line also matches the generic Temperature pattern; the
        // device dialect must win so its extractor runs instead.
        assert_eq!(
            classify("BME680 - Temperature: 25.65 *C"),
            LineKind::DevicePrefixed
        );
    }

    #[test]
    fn test_parse_key_value_csv() {
        let updates = parse("AQ:800,TEMP:22.5");
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0], FieldUpdate::new(FieldKind::AirQuality, FieldValue::Float(800.0)));
        assert_eq!(updates[1], FieldUpdate::new(FieldKind::Temperature, FieldValue::Float(22.5)));
    }

    #[test]
    fn test_parse_key_value_full_line() {
        let updates = parse("AQ:8.34,DIST:2.5,LUM:800,UV:0.35,IR:348,TEMP:24.5,PRESS:1010,HUM:65");
        assert_eq!(updates.len(), 8);
        assert_eq!(updates[2].value, FieldValue::Integer(800));
        assert_eq!(updates[4].value, FieldValue::Integer(348));
    }

    #[test]
    fn test_parse_key_value_skips_bad_field() {
        // The broken DIST value drops that field only
        let updates = parse("AQ:800,DIST:oops,TEMP:22.5");
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].kind, FieldKind::AirQuality);
        assert_eq!(updates[1].kind, FieldKind::Temperature);
    }

    #[test]
    fn test_parse_labeled_assignments() {
        assert_eq!(
            single("Temperature = 24.97 *C"),
            FieldUpdate::new(FieldKind::Temperature, FieldValue::Float(24.97))
        );
        assert_eq!(
            single("Pression = 1012.39 hPa"),
            FieldUpdate::new(FieldKind::Pressure, FieldValue::Integer(1012))
        );
        assert_eq!(
            single("Humidité = 65 %"),
            FieldUpdate::new(FieldKind::Humidity, FieldValue::Integer(65))
        );
    }

    #[test]
    fn test_parse_labeled_mojibake_humidity() {
        assert_eq!(
            single("HumiditÃ© = 65 %"),
            FieldUpdate::new(FieldKind::Humidity, FieldValue::Integer(65))
        );
    }

    #[test]
    fn test_parse_si1145_triples() {
        assert_eq!(
            single("SI1145 - Visible: 262"),
            FieldUpdate::new(FieldKind::Luminosity, FieldValue::Integer(262))
        );
        assert_eq!(
            single("SI1145 - UV: 0.35"),
            FieldUpdate::new(FieldKind::UvIndex, FieldValue::Float(0.35))
        );
        assert_eq!(
            single("SI1145 - IR: 348"),
            FieldUpdate::new(FieldKind::IrValue, FieldValue::Integer(348))
        );
    }

    #[test]
    fn test_parse_mq135() {
        assert_eq!(
            single("MQ135 - Air Quality: 8.94 ppm"),
            FieldUpdate::new(FieldKind::AirQuality, FieldValue::Float(8.94))
        );

        let raw = single("MQ135 - Valeur lue: 348");
        assert_eq!(raw.kind, FieldKind::AirQuality);
        assert_eq!(raw.value, FieldValue::Float(348.0));
        assert!(raw.fallback, "Raw MQ135 reading must be marked as fallback");
    }

    #[test]
    fn test_parse_hc_sr04_distance_converts_to_meters() {
        assert_eq!(
            single("HC_SR04 - Distance: 34 cm"),
            FieldUpdate::new(FieldKind::Distance, FieldValue::Float(0.34))
        );
    }

    #[test]
    fn test_parse_bare_distance_stays_in_meters() {
        assert_eq!(
            single("Distance = 34"),
            FieldUpdate::new(FieldKind::Distance, FieldValue::Float(34.0))
        );
    }

    #[test]
    fn test_parse_bme680_triples() {
        assert_eq!(
            single("BME680 - Temperature: 25.65 *C"),
            FieldUpdate::new(FieldKind::Temperature, FieldValue::Float(25.65))
        );
        assert_eq!(
            single("BME680 - Pression: 1010.01 hPa"),
            FieldUpdate::new(FieldKind::Pressure, FieldValue::Integer(1010))
        );
        assert_eq!(
            single("BME680 - Humidité: 31.57 %"),
            FieldUpdate::new(FieldKind::Humidity, FieldValue::Integer(32))
        );
    }

    #[test]
    fn test_parse_generic_luminosity() {
        assert_eq!(
            single("Luminosité = 523 lux"),
            FieldUpdate::new(FieldKind::Luminosity, FieldValue::Integer(523))
        );
    }

    #[test]
    fn test_noise_lines_yield_nothing() {
        assert!(parse("----------").is_empty());
        assert!(parse("Fin des mesures").is_empty());
        assert!(parse("Rafraichissement dans 5 secondes").is_empty());
        assert!(parse("").is_empty());
        assert!(parse("   ").is_empty());
        assert!(parse("completely unrelated text").is_empty());
    }

    #[test]
    fn test_echo_prefix_stripped_and_reparsed() {
        let updates = parse("Message envoyé: AQ:800,TEMP:22.5");
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].kind, FieldKind::AirQuality);
    }

    #[test]
    fn test_echo_prefix_mojibake() {
        let updates = parse("Message envoyÃ©: Temperature = 21.5 *C");
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].kind, FieldKind::Temperature);
    }

    #[test]
    fn test_echo_prefix_stripped_only_once() {
        assert!(parse("Message envoyé: Message envoyé: AQ:800").is_empty());
    }

    #[test]
    fn test_echo_with_noise_payload() {
        assert!(parse("Message envoye: Fin des mesures").is_empty());
    }
}
