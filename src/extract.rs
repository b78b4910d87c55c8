// src/extract.rs - KEY=VALUE field extraction from raw device lines

/// Keys the oximeter emits that the logger consumes
pub const KEY_SPO2: &str = "SPO2";
pub const KEY_BPM: &str = "BPM";
pub const KEY_PI: &str = "PI";
pub const KEY_ALARM: &str = "ALARM";
pub const KEY_EXC: &str = "EXC";

/// Return the value of the first whitespace-delimited `KEY=VALUE` token.
///
/// The key has to be the whole prefix of the token, so `SPO2` never matches
/// inside `XSPO2=..`. A missing key is `None`, not an error.
pub fn extract_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.split_whitespace().find_map(|token| {
        token
            .strip_prefix(key)
            .and_then(|rest| rest.strip_prefix('='))
    })
}

/// Raw fields of one device line, exactly as the device printed them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceFields {
    pub spo2: String,
    pub bpm: String,
    pub pi: String,
    pub alarm: String,
    pub exc: String,
}

impl DeviceFields {
    /// Extract every consumed field; missing fields become empty strings
    pub fn from_line(line: &str) -> Self {
        let field = |key| extract_value(line, key).unwrap_or_default().to_string();
        Self {
            spo2: field(KEY_SPO2),
            bpm: field(KEY_BPM),
            pi: field(KEY_PI),
            alarm: field(KEY_ALARM),
            exc: field(KEY_EXC),
        }
    }
}
