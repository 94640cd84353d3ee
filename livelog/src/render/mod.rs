//! Renderers
//!
//! Each renderer turns one kind of inbound event into mutations of a
//! display target resolved through a `Surface`.

mod app_log;
mod rows;
mod sample;
mod scalar;
mod toggle;

pub use app_log::AppLog;
pub use rows::{BoundedRowList, LogRow, SampleOutcome, StructuredLog, EVICTION_NOTICE, MAX_ROWS};
pub use sample::{format_rounded, DecodeError, FieldValue, LogSample, PLACEHOLDER, TIME_STAMP};
pub use scalar::{stringify, ScalarStatus};
pub use toggle::{ToggleState, Toggles};
