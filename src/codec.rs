//! Decoding of raw, loosely-typed store values into the domain vocabulary.
//!
//! The remote table stores the same field as a string on one device and a
//! number on another, and any field may be missing. Every decoder here takes
//! `Option<&Value>` and returns a typed value or `None`/`Unknown`; none of
//! them can fail.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::ConfigError;
use crate::models::RunState;

// ---

/// Layout of last-seen timestamps in the store. Always UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Slash separated location of a field inside a device record, e.g.
/// `grill/G4/1`. Numeric segments index into arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse a path; `field` names the setting for error reporting.
    pub fn parse(field: &'static str, raw: &str) -> Result<Self, ConfigError> {
        // ---
        let segments: Vec<String> = raw
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        if segments.is_empty() {
            return Err(ConfigError::EmptyFieldPath(field));
        }

        Ok(Self {
            raw: segments.join("/"),
            segments,
        })
    }

    /// Built-in default paths, known to be non-empty.
    pub(crate) fn literal(raw: &'static str) -> Self {
        Self {
            raw: raw.to_string(),
            segments: raw.split('/').map(String::from).collect(),
        }
    }

    /// Walk `record` along the path. Objects are indexed by key, arrays by
    /// position; anything else ends the walk.
    pub fn lookup<'a>(&self, record: &'a Value) -> Option<&'a Value> {
        // ---
        let mut current = record;
        for segment in &self.segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Map a raw run-status code onto [`RunState`].
///
/// Strings are trimmed and matched exactly; numbers count only when they
/// are the integers 0, 1 or 2.
pub fn decode_run_state(raw: Option<&Value>) -> RunState {
    // ---
    let code = match raw {
        Some(Value::String(s)) => match s.trim() {
            "0" => Some(0),
            "1" => Some(1),
            "2" => Some(2),
            _ => None,
        },
        Some(Value::Number(n)) => n.as_u64(),
        _ => None,
    };

    match code {
        Some(0) => RunState::OffAndCool,
        Some(1) => RunState::Burning,
        Some(2) => RunState::Shutdown,
        _ => RunState::Unknown,
    }
}

/// Parse a `YYYY-MM-DD HH:MM:SS` string as a UTC instant.
pub fn parse_timestamp(raw: Option<&Value>) -> Option<DateTime<Utc>> {
    // ---
    let Some(Value::String(s)) = raw else {
        return None;
    };
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// A finite number, either native or as a numeric string.
pub fn decode_number(raw: Option<&Value>) -> Option<f64> {
    // ---
    let value = match raw? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

/// An integral number; fractional values are rejected rather than rounded.
pub fn decode_integer(raw: Option<&Value>) -> Option<i64> {
    // ---
    if let Some(Value::Number(n)) = raw {
        if let Some(i) = n.as_i64() {
            return Some(i);
        }
    }
    if let Some(Value::String(s)) = raw {
        if let Ok(i) = s.trim().parse::<i64>() {
            return Some(i);
        }
    }
    let value = decode_number(raw)?;
    (value.fract() == 0.0 && value.abs() < i64::MAX as f64).then_some(value as i64)
}

/// Free text. Empty strings and the literal `"None"` written by some
/// firmware count as absent.
pub fn decode_text(raw: Option<&Value>) -> Option<String> {
    // ---
    let Some(Value::String(s)) = raw else {
        return None;
    };
    let s = s.trim();
    if s.is_empty() || s == "None" {
        None
    } else {
        Some(s.to_string())
    }
}

/// `XX:XX:XX:XX:XX:XX` with hex digits; `-` is accepted as a separator.
pub fn is_valid_mac(mac: &str) -> bool {
    // ---
    let bytes = mac.as_bytes();
    bytes.len() == 17
        && bytes.iter().enumerate().all(|(i, b)| {
            if i % 3 == 2 {
                *b == b':' || *b == b'-'
            } else {
                b.is_ascii_hexdigit()
            }
        })
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_decode_run_state_strings() {
        // ---
        assert_eq!(decode_run_state(Some(&json!("0"))), RunState::OffAndCool);
        assert_eq!(decode_run_state(Some(&json!("1"))), RunState::Burning);
        assert_eq!(decode_run_state(Some(&json!("2"))), RunState::Shutdown);
        assert_eq!(decode_run_state(Some(&json!(" 1\n"))), RunState::Burning);
        assert_eq!(decode_run_state(Some(&json!("3"))), RunState::Unknown);
        assert_eq!(decode_run_state(Some(&json!("01"))), RunState::Unknown);
        assert_eq!(decode_run_state(Some(&json!("BURNING"))), RunState::Unknown);
        assert_eq!(decode_run_state(Some(&json!(""))), RunState::Unknown);
    }

    #[test]
    fn test_decode_run_state_other_types() {
        // ---
        assert_eq!(decode_run_state(Some(&json!(1))), RunState::Burning);
        assert_eq!(decode_run_state(Some(&json!(2))), RunState::Shutdown);
        assert_eq!(decode_run_state(Some(&json!(1.5))), RunState::Unknown);
        assert_eq!(decode_run_state(Some(&json!(-1))), RunState::Unknown);
        assert_eq!(decode_run_state(Some(&json!(null))), RunState::Unknown);
        assert_eq!(decode_run_state(Some(&json!(true))), RunState::Unknown);
        assert_eq!(decode_run_state(Some(&json!(["1"]))), RunState::Unknown);
        assert_eq!(decode_run_state(None), RunState::Unknown);
    }

    #[test]
    fn test_parse_timestamp() {
        // ---
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 13, 5, 9).unwrap();
        assert_eq!(parse_timestamp(Some(&json!("2024-01-01 13:05:09"))), Some(expected));

        assert_eq!(parse_timestamp(Some(&json!("2024-01-01T13:05:09Z"))), None);
        assert_eq!(parse_timestamp(Some(&json!("2024-13-01 00:00:00"))), None);
        assert_eq!(parse_timestamp(Some(&json!("yesterday"))), None);
        assert_eq!(parse_timestamp(Some(&json!(1704067200))), None);
        assert_eq!(parse_timestamp(Some(&json!(null))), None);
        assert_eq!(parse_timestamp(None), None);
    }

    #[test]
    fn test_field_path_lookup() {
        // ---
        let record = json!({
            "grill": {
                "G4": ["x", "1", "", "225", "231"],
                "debugData": { "parmlist": [ { "ssid": "shop", "rssi": -60 } ] }
            }
        });

        let status = FieldPath::parse("run status", "grill/G4/1").unwrap();
        assert_eq!(status.lookup(&record), Some(&json!("1")));

        let ssid = FieldPath::parse("ssid", "/grill/debugData/parmlist/0/ssid/").unwrap();
        assert_eq!(ssid.as_str(), "grill/debugData/parmlist/0/ssid");
        assert_eq!(ssid.lookup(&record), Some(&json!("shop")));

        let past_end = FieldPath::parse("temp", "grill/G4/9").unwrap();
        assert_eq!(past_end.lookup(&record), None);

        let through_scalar = FieldPath::parse("temp", "grill/G4/1/0").unwrap();
        assert_eq!(through_scalar.lookup(&record), None);

        let not_an_index = FieldPath::parse("temp", "grill/G4/first").unwrap();
        assert_eq!(not_an_index.lookup(&record), None);
    }

    #[test]
    fn test_field_path_rejects_empty() {
        // ---
        assert_eq!(
            FieldPath::parse("setpoint", " / "),
            Err(ConfigError::EmptyFieldPath("setpoint"))
        );
    }

    #[test]
    fn test_decode_number_and_integer() {
        // ---
        assert_eq!(decode_number(Some(&json!("225"))), Some(225.0));
        assert_eq!(decode_number(Some(&json!(" 98.5 "))), Some(98.5));
        assert_eq!(decode_number(Some(&json!(0))), Some(0.0));
        assert_eq!(decode_number(Some(&json!("NaN"))), None);
        assert_eq!(decode_number(Some(&json!("hot"))), None);
        assert_eq!(decode_number(None), None);

        assert_eq!(decode_integer(Some(&json!(-61))), Some(-61));
        assert_eq!(decode_integer(Some(&json!("-61"))), Some(-61));
        assert_eq!(decode_integer(Some(&json!(-61.0))), Some(-61));
        assert_eq!(decode_integer(Some(&json!(-61.5))), None);
        assert_eq!(decode_integer(Some(&json!("strong"))), None);
    }

    #[test]
    fn test_decode_text() {
        // ---
        assert_eq!(decode_text(Some(&json!("10.0.0.7"))), Some("10.0.0.7".to_string()));
        assert_eq!(decode_text(Some(&json!("None"))), None);
        assert_eq!(decode_text(Some(&json!("  "))), None);
        assert_eq!(decode_text(Some(&json!(42))), None);
    }

    #[test]
    fn test_is_valid_mac() {
        // ---
        assert!(is_valid_mac("AA:BB:CC:DD:EE:FF"));
        assert!(is_valid_mac("aa-bb-cc-dd-ee-0f"));
        assert!(!is_valid_mac("AA:BB:CC:DD:EE"));
        assert!(!is_valid_mac("AA:BB:CC:DD:EE:FG"));
        assert!(!is_valid_mac("AABBCCDDEEFF"));
        assert!(!is_valid_mac("AA:BB:CC:DD:EE:FF:00"));
    }
}
