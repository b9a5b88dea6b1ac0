//! Record parser for assembled lines
//!
//! A line is either a control keyword (`ping`), a telemetry record of six
//! comma-separated numbers, or blank. Matching of keywords is exact and
//! case-sensitive after trimming surrounding whitespace.
//!
//! Numeric decoding is lenient by default: a token is read like C's `atof`
//! (longest leading number, `0.0` when there is none) and missing trailing
//! fields default to `0.0`. Strict mode rejects such records instead.

use crate::constants::TELEMETRY_FIELDS;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One inertial sample: three orientation angles and three accelerations
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetryRecord {
    pub alpha: f32,
    pub beta: f32,
    pub gamma: f32,
    pub accel_x: f32,
    pub accel_y: f32,
    pub accel_z: f32,
}

impl TelemetryRecord {
    /// Build a record from fields in wire order
    pub fn from_fields(f: [f32; TELEMETRY_FIELDS]) -> Self {
        Self {
            alpha: f[0],
            beta: f[1],
            gamma: f[2],
            accel_x: f[3],
            accel_y: f[4],
            accel_z: f[5],
        }
    }

    /// Fields in wire order
    pub fn fields(&self) -> [f32; TELEMETRY_FIELDS] {
        [
            self.alpha,
            self.beta,
            self.gamma,
            self.accel_x,
            self.accel_y,
            self.accel_z,
        ]
    }
}

/// Recognized inbound keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlWord {
    Ping,
}

impl ControlWord {
    fn from_keyword(text: &str) -> Option<Self> {
        match text {
            "ping" => Some(Self::Ping),
            _ => None,
        }
    }
}

/// Result of parsing one line
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedLine {
    /// Nothing but whitespace; no action
    Empty,
    Control(ControlWord),
    Telemetry(TelemetryRecord),
}

/// Numeric decoding policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Invalid tokens read as 0.0, missing fields read as 0.0
    #[default]
    Lenient,
    /// Exactly six well-formed numbers required
    Strict,
}

/// Rejection reasons in strict mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Wrong number of comma-separated fields
    FieldCount { found: usize },
    /// A field is not a number
    InvalidNumber { index: usize, token: String },
}

impl std::error::Error for ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldCount { found } => {
                write!(f, "expected {} fields, found {}", TELEMETRY_FIELDS, found)
            }
            Self::InvalidNumber { index, token } => {
                write!(f, "field {} is not a number: {:?}", index, token)
            }
        }
    }
}

/// Decodes assembled lines
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordParser {
    mode: ParseMode,
}

impl RecordParser {
    pub fn new(mode: ParseMode) -> Self {
        Self { mode }
    }

    /// Parse one line (terminator already removed)
    ///
    /// Never fails in lenient mode.
    pub fn parse(&self, line: &str) -> Result<ParsedLine, ParseError> {
        let text = line.trim();
        if text.is_empty() {
            return Ok(ParsedLine::Empty);
        }
        if let Some(word) = ControlWord::from_keyword(text) {
            return Ok(ParsedLine::Control(word));
        }

        let record = match self.mode {
            ParseMode::Lenient => parse_lenient(text),
            ParseMode::Strict => parse_strict(text)?,
        };
        Ok(ParsedLine::Telemetry(record))
    }
}

fn parse_lenient(text: &str) -> TelemetryRecord {
    let mut fields = [0.0f32; TELEMETRY_FIELDS];
    // Commas past the sixth stay inside the last token
    for (slot, token) in fields.iter_mut().zip(text.splitn(TELEMETRY_FIELDS, ',')) {
        *slot = read_number(token);
    }
    TelemetryRecord::from_fields(fields)
}

fn parse_strict(text: &str) -> Result<TelemetryRecord, ParseError> {
    let found = text.split(',').count();
    if found != TELEMETRY_FIELDS {
        return Err(ParseError::FieldCount { found });
    }

    let mut fields = [0.0f32; TELEMETRY_FIELDS];
    for (index, (slot, token)) in fields.iter_mut().zip(text.split(',')).enumerate() {
        *slot = token
            .trim()
            .parse()
            .map_err(|_| ParseError::InvalidNumber {
                index,
                token: token.to_string(),
            })?;
    }
    Ok(TelemetryRecord::from_fields(fields))
}

/// Read the longest leading number of a token, or 0.0
pub fn read_number(token: &str) -> f32 {
    let t = token.trim();
    if let Ok(v) = t.parse() {
        return v;
    }
    let end = numeric_prefix_len(t.as_bytes());
    t[..end].parse().unwrap_or(0.0)
}

/// Length of `[+-]digits[.digits][(e|E)[+-]digits]` at the start of `s`
fn numeric_prefix_len(s: &[u8]) -> usize {
    let digits_from = |mut i: usize| {
        while i < s.len() && s[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut i = 0;
    if matches!(s.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    let int_start = i;
    i = digits_from(i);
    let mut mantissa_digits = i - int_start;

    if s.get(i) == Some(&b'.') {
        let frac_end = digits_from(i + 1);
        mantissa_digits += frac_end - (i + 1);
        if mantissa_digits > 0 {
            i = frac_end;
        }
    }
    if mantissa_digits == 0 {
        return 0;
    }

    if matches!(s.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(s.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_end = digits_from(j);
        if exp_end > j {
            i = exp_end;
        }
    }
    i
}
