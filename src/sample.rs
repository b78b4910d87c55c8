// src/sample.rs - Latest-sample record published for the display

use crate::extract::DeviceFields;
use crate::severity::SeverityMap;
use chrono::{DateTime, Local};
use serde::Serialize;

/// Display format of `SampleDate`
pub const SAMPLE_DATE_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// One assembled sample, serialized as the latest-sample JSON document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sample {
    #[serde(rename = "SampleDate")]
    pub sample_date: String,
    #[serde(rename = "SPO2")]
    pub spo2: String,
    #[serde(rename = "BPM")]
    pub bpm: String,
    #[serde(rename = "PI")]
    pub pi: String,
    #[serde(rename = "ALARM")]
    pub alarm: String,
    #[serde(rename = "EXC")]
    pub exc: String,
    /// Reserved by the display, always empty
    pub sleep: String,
    #[serde(rename = "CSS")]
    pub css: SeverityMap,
}

impl Sample {
    /// Build a sample from raw device fields and this cycle's severity levels
    pub fn assemble(fields: &DeviceFields, css: SeverityMap, captured_at: DateTime<Local>) -> Self {
        Self {
            sample_date: captured_at.format(SAMPLE_DATE_FORMAT).to_string(),
            spo2: normalize_numeric(fields.spo2.trim_end_matches('%')),
            bpm: normalize_numeric(&fields.bpm),
            pi: normalize_numeric(&fields.pi),
            alarm: fields.alarm.clone(),
            exc: fields.exc.clone(),
            sleep: String::new(),
            css,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Strip leading zeros from integral values (`"098"` -> `"98"`, `"072."` -> `"72"`).
///
/// Anything that is not a plain run of digits, such as `"1.2"`, `"01.23"` or
/// `"--"`, is returned unchanged.
pub fn normalize_numeric(value: &str) -> String {
    let digits = value.strip_suffix('.').unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return value.to_string();
    }
    match digits.trim_start_matches('0') {
        "" => "0".to_string(),
        trimmed => trimmed.to_string(),
    }
}
