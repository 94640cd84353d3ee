//! Event frames
//!
//! Every event travels as one line of JSON terminated by `\n`. The line
//! holds an array whose first element is the event name and whose optional
//! second element is the payload:
//!
//! ```text
//! ["update_log","{\"time_stamp\":\"2024-05-01 10:00:00\",\"car\":1.5}"]
//! ["app_log","<b>started</b>"]
//! ["startup","tcp://localhost:5000"]
//! ```
//!
//! Elements past the payload are ignored. Blank lines are keep-alives and
//! carry no event.

use serde_json::Value;

/// Upper bound on a single encoded frame, newline included.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No complete line is buffered yet.
    #[error("incomplete frame")]
    NeedMore,
    /// No newline within `MAX_FRAME_SIZE` bytes. Carries the number of
    /// bytes to discard.
    #[error("frame exceeds {MAX_FRAME_SIZE} bytes")]
    TooBig(usize),
    /// The line is not a JSON array starting with an event name. `size` is
    /// the length of the offending line, newline included.
    #[error("malformed frame: {reason}")]
    Malformed { reason: String, size: usize },
}

/// A named event and its payload. Events without a payload carry `Value::Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub name: String,
    pub payload: Value,
}

impl Frame {
    pub fn new(name: &str, payload: impl Into<Value>) -> Frame {
        Frame {
            name: name.to_string(),
            payload: payload.into(),
        }
    }

    /// Parses the first frame in `raw`. Returns the frame together with the
    /// number of bytes consumed, including the terminating newline.
    ///
    /// Keep-alive lines are consumed silently, so the returned frame may start
    /// after one or more blank lines.
    pub fn deserialize(raw: &[u8]) -> Result<(Frame, usize), Error> {
        let mut offset = 0;
        loop {
            let rest = &raw[offset..];
            let Some(eol) = rest.iter().position(|b| *b == b'\n') else {
                if raw.len() >= MAX_FRAME_SIZE {
                    return Err(Error::TooBig(raw.len()));
                }
                return Err(Error::NeedMore);
            };
            let line = &rest[..eol];
            let consumed = offset + eol + 1;
            if line.iter().all(u8::is_ascii_whitespace) {
                offset = consumed;
                continue;
            }
            return match Frame::from_line(line) {
                Ok(frame) => Ok((frame, consumed)),
                Err(reason) => Err(Error::Malformed {
                    reason,
                    size: consumed,
                }),
            };
        }
    }

    fn from_line(line: &[u8]) -> Result<Frame, String> {
        let value: Value = serde_json::from_slice(line).map_err(|e| e.to_string())?;
        let Value::Array(mut items) = value else {
            return Err("expected an array".to_string());
        };
        if items.is_empty() {
            return Err("missing event name".to_string());
        }
        items.truncate(2);
        let payload = if items.len() == 2 {
            items.pop().unwrap_or(Value::Null)
        } else {
            Value::Null
        };
        match items.pop() {
            Some(Value::String(name)) => Ok(Frame { name, payload }),
            _ => Err("event name must be a string".to_string()),
        }
    }

    /// Encodes this frame as a single newline-terminated line. Fails with
    /// `TooBig` if the encoding does not fit in `MAX_FRAME_SIZE`.
    pub fn serialize(&self) -> Result<Vec<u8>, Error> {
        let items = if self.payload.is_null() {
            Value::Array(vec![Value::String(self.name.clone())])
        } else {
            Value::Array(vec![Value::String(self.name.clone()), self.payload.clone()])
        };
        // Serializing a `Value` into memory cannot fail.
        let mut raw = serde_json::to_vec(&items).unwrap_or_default();
        raw.push(b'\n');
        if raw.len() > MAX_FRAME_SIZE {
            return Err(Error::TooBig(raw.len()));
        }
        Ok(raw)
    }
}
