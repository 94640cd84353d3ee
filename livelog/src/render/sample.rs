use super::LogRow;

use serde_json::{Map, Value};

/// Name of the field carrying the sample's display timestamp.
pub const TIME_STAMP: &str = "time_stamp";

/// Text shown in place of a value that is absent or not numeric.
pub const PLACEHOLDER: &str = " - - ";

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed log sample: {0}")]
    Json(#[from] serde_json::Error),
    #[error("log sample must be a JSON object or a string holding one, got {0}")]
    Payload(&'static str),
    #[error("log sample has no `time_stamp`")]
    MissingTimeStamp,
    #[error("`time_stamp` must be a string or a number")]
    TimeStamp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    /// null, booleans, arrays and objects.
    Other,
}

impl FieldValue {
    /// Numeric reading of the value. Text is accepted if it parses as a
    /// finite number once trimmed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            FieldValue::Other => None,
        }
    }

    /// The value as shown in the log table.
    pub fn formatted(&self) -> String {
        match self.as_f64() {
            Some(v) => format_rounded(v),
            None => PLACEHOLDER.to_string(),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Number(n) => n.as_f64().map_or(FieldValue::Other, FieldValue::Number),
            Value::String(s) => FieldValue::Text(s),
            _ => FieldValue::Other,
        }
    }
}

/// Rounds half away from zero to 4 decimal places and renders the result
/// in its shortest form: `2.0` becomes `"2"`, `2.12345` becomes `"2.1235"`.
pub fn format_rounded(v: f64) -> String {
    let rounded = (v * 10_000.0).round() / 10_000.0;
    if !rounded.is_finite() {
        return PLACEHOLDER.to_string();
    }
    if rounded == 0.0 {
        // no "-0"
        return "0".to_string();
    }
    format!("{}", rounded)
}

/// One decoded `update_log` payload: a timestamp label plus named values
/// in the order they were received.
#[derive(Debug, Clone, PartialEq)]
pub struct LogSample {
    time_stamp: String,
    fields: Vec<(String, FieldValue)>,
}

impl LogSample {
    pub fn new(time_stamp: &str) -> LogSample {
        LogSample {
            time_stamp: time_stamp.to_string(),
            fields: Vec::new(),
        }
    }

    /// Appends a field, or replaces the value of an existing one in place.
    pub fn with_field(mut self, name: &str, value: impl Into<FieldValue>) -> LogSample {
        self.set(name.to_string(), value.into());
        self
    }

    fn set(&mut self, name: String, value: FieldValue) {
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn time_stamp(&self) -> &str {
        &self.time_stamp
    }

    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    /// Decodes the JSON text of one sample.
    pub fn decode(raw: &str) -> Result<LogSample, DecodeError> {
        match serde_json::from_str::<Value>(raw)? {
            Value::Object(map) => LogSample::from_map(map),
            other => Err(DecodeError::Payload(kind(&other))),
        }
    }

    /// Decodes an event payload, which is either the JSON text of a sample
    /// or the sample object itself.
    pub fn from_payload(payload: &Value) -> Result<LogSample, DecodeError> {
        match payload {
            Value::String(raw) => LogSample::decode(raw),
            Value::Object(map) => LogSample::from_map(map.clone()),
            other => Err(DecodeError::Payload(kind(other))),
        }
    }

    /// Builds a sample from a decoded object. The map keeps wire order, and
    /// a repeated key keeps its first position with its last value.
    pub fn from_map(map: Map<String, Value>) -> Result<LogSample, DecodeError> {
        let mut time_stamp = None;
        let mut fields = Vec::with_capacity(map.len());
        for (key, value) in map {
            if key == TIME_STAMP {
                time_stamp = Some(match value {
                    Value::String(s) => s,
                    Value::Number(n) => n.to_string(),
                    _ => return Err(DecodeError::TimeStamp),
                });
            } else {
                fields.push((key, FieldValue::from(value)));
            }
        }
        Ok(LogSample {
            time_stamp: time_stamp.ok_or(DecodeError::MissingTimeStamp)?,
            fields,
        })
    }

    /// Flattens the sample into table rows, one per field. Only the first
    /// row carries the timestamp label.
    pub fn rows(&self) -> impl Iterator<Item = LogRow> + '_ {
        self.fields
            .iter()
            .enumerate()
            .map(move |(i, (name, value))| LogRow {
                label: if i == 0 {
                    self.time_stamp.clone()
                } else {
                    String::new()
                },
                field: name.clone(),
                value: value.formatted(),
            })
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
