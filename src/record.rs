// src/record.rs
//
// Record decoding for sentinel-bounded measurement lines.
// Turns "START;LOAD:12.5;DISTANCE:3.0;END" into {LOAD: 12.5, DISTANCE: 3.0}.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::SettingsError;

// =============================================================================
// Wire Constants
// =============================================================================

pub const FIELD_SEPARATOR: char = ';';
pub const KEY_VALUE_SEPARATOR: char = ':';
pub const START_SENTINEL: &str = "START";
pub const END_SENTINEL: &str = "END";

// =============================================================================
// Record
// =============================================================================

/// Decoded measurement: field name to value, in the order fields first appeared.
///
/// Serializes as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, f64)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field. A repeated name overwrites the earlier value in place
    /// and returns it.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) -> Option<f64> {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.fields.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Record {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

// =============================================================================
// Record Format
// =============================================================================

/// Separators and sentinels of the line dialect. Defaults match the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFormat {
    #[serde(default = "default_field_separator")]
    pub field_separator: char,
    #[serde(default = "default_key_value_separator")]
    pub key_value_separator: char,
    #[serde(default = "default_start_sentinel")]
    pub start_sentinel: String,
    #[serde(default = "default_end_sentinel")]
    pub end_sentinel: String,
}

fn default_field_separator() -> char {
    FIELD_SEPARATOR
}
fn default_key_value_separator() -> char {
    KEY_VALUE_SEPARATOR
}
fn default_start_sentinel() -> String {
    START_SENTINEL.to_string()
}
fn default_end_sentinel() -> String {
    END_SENTINEL.to_string()
}

impl Default for RecordFormat {
    fn default() -> Self {
        RecordFormat {
            field_separator: default_field_separator(),
            key_value_separator: default_key_value_separator(),
            start_sentinel: default_start_sentinel(),
            end_sentinel: default_end_sentinel(),
        }
    }
}

impl RecordFormat {
    /// Reject dialects the decoder cannot interpret unambiguously
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.start_sentinel.is_empty() || self.end_sentinel.is_empty() {
            return Err(SettingsError::Invalid(
                "record sentinels must not be empty".to_string(),
            ));
        }
        if self.field_separator == self.key_value_separator {
            return Err(SettingsError::Invalid(format!(
                "field and key-value separators are both '{}'",
                self.field_separator
            )));
        }
        if self.field_separator == '\n' || self.key_value_separator == '\n' {
            return Err(SettingsError::Invalid(
                "the line terminator cannot be used as a separator".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the first segment carries the start sentinel and the last
    /// segment carries the end sentinel (substring match)
    pub fn is_record(&self, line: &str) -> bool {
        let first = line.split(self.field_separator).next().unwrap_or_default();
        let last = line.rsplit(self.field_separator).next().unwrap_or_default();
        first.contains(self.start_sentinel.as_str()) && last.contains(self.end_sentinel.as_str())
    }

    /// Decode one line. Never fails: non-record lines give an empty record and
    /// malformed fields are skipped.
    pub fn decode(&self, line: &str) -> Record {
        let mut record = Record::new();
        if !self.is_record(line) {
            return record;
        }

        let segments: Vec<&str> = line.split(self.field_separator).collect();
        if segments.len() < 3 {
            return record;
        }

        for segment in &segments[1..segments.len() - 1] {
            let mut parts = segment.split(self.key_value_separator);
            let (Some(name), Some(value), None) = (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            // Surrounding whitespace is tolerated, as in "LOAD: 12.5"
            if let Some(value) = parse_value(value.trim()) {
                record.insert(name, value);
            }
        }

        record
    }
}

/// Parse a field value. Single underscores between digits are digit
/// grouping ("1_000.5"); any other underscore rejects the value.
fn parse_value(text: &str) -> Option<f64> {
    if !text.contains('_') {
        return text.parse().ok();
    }

    let bytes = text.as_bytes();
    let mut digits = String::with_capacity(text.len());
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'_' {
            let before = i.checked_sub(1).map(|j| bytes[j]);
            let after = bytes.get(i + 1).copied();
            let grouped = matches!((before, after), (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit());
            if !grouped {
                return None;
            }
        } else {
            digits.push(b as char);
        }
    }
    digits.parse().ok()
}

/// Decode a line using the default wire format
pub fn decode_line(line: &str) -> Record {
    RecordFormat::default().decode(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_line() {
        let record = decode_line("START;LOAD:12.5;DISTANCE:3.0;END");

        assert_eq!(record.len(), 2);
        assert_eq!(record.get("LOAD"), Some(12.5));
        assert_eq!(record.get("DISTANCE"), Some(3.0));
        assert_eq!(record.names().collect::<Vec<_>>(), vec!["LOAD", "DISTANCE"]);
    }

    #[test]
    fn test_sentinel_is_substring_match() {
        assert_eq!(decode_line("xSTARTy;A:1;END").get("A"), Some(1.0));
        assert_eq!(decode_line("START;A:1;xENDy").get("A"), Some(1.0));
        assert!(decode_line("STAR;A:1;END").is_empty());
        assert!(decode_line("START;A:1;EN").is_empty());
    }

    #[test]
    fn test_last_write_wins() {
        let record = decode_line("START;A:1.0;B:5;A:2.0;END");

        assert_eq!(record.len(), 2);
        assert_eq!(record.get("A"), Some(2.0));
        // Overwrite keeps the original position
        assert_eq!(record.names().collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn test_malformed_fields_skipped() {
        let record = decode_line("START;A:1.0;BADFIELD;C:3.0;END");
        assert_eq!(record, Record::from_iter([("A", 1.0), ("C", 3.0)]));

        let record = decode_line("START;A:1:2;B:4;END");
        assert_eq!(record, Record::from_iter([("B", 4.0)]));
    }

    #[test]
    fn test_numeric_parse_failure_drops_field() {
        assert!(decode_line("START;A:notanumber;END").is_empty());
        assert!(decode_line("START;A:;END").is_empty());
    }

    #[test]
    fn test_digit_grouping_underscores() {
        assert_eq!(decode_line("START;A:1_0;END").get("A"), Some(10.0));
        assert_eq!(decode_line("START;A:1_000.2_5;END").get("A"), Some(1000.25));
        assert_eq!(decode_line("START;A: 2e1_0 ;END").get("A"), Some(2e10));

        for bad in ["_1", "1_", "1__0", "1_.5", "0x10", "0x1_0"] {
            let line = format!("START;A:{};END", bad);
            assert!(decode_line(&line).is_empty(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_value_whitespace_tolerated() {
        let record = decode_line("START;LOAD: 12.5 ;END");
        assert_eq!(record.get("LOAD"), Some(12.5));
    }

    #[test]
    fn test_non_record_lines_are_empty() {
        assert!(decode_line("hello;world").is_empty());
        assert!(decode_line("").is_empty());
        assert!(!RecordFormat::default().is_record(""));
    }

    #[test]
    fn test_sentinel_only_lines() {
        assert!(decode_line("START;END").is_empty());
        assert!(RecordFormat::default().is_record("START;END"));

        // One segment is both first and last
        assert!(RecordFormat::default().is_record("START END"));
        assert!(decode_line("START END").is_empty());
    }

    #[test]
    fn test_trailing_carriage_return_still_qualifies() {
        let record = decode_line("START;A:1;END\r");
        assert_eq!(record.get("A"), Some(1.0));
    }

    #[test]
    fn test_custom_format() {
        let format = RecordFormat {
            field_separator: ',',
            key_value_separator: '=',
            start_sentinel: "<".to_string(),
            end_sentinel: ">".to_string(),
        };
        assert!(format.validate().is_ok());

        let record = format.decode("<,temp=21.5,rh=40,>");
        assert_eq!(record.get("temp"), Some(21.5));
        assert_eq!(record.get("rh"), Some(40.0));
    }

    #[test]
    fn test_format_validation() {
        let mut format = RecordFormat::default();
        format.key_value_separator = ';';
        assert!(format.validate().is_err());

        let mut format = RecordFormat::default();
        format.start_sentinel.clear();
        assert!(format.validate().is_err());
    }

    #[test]
    fn test_record_serializes_as_object() {
        let record = decode_line("START;LOAD:12.5;DISTANCE:3;END");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"LOAD":12.5,"DISTANCE":3.0}"#);
    }
}
