//! Display targets
//!
//! Renderers never touch a concrete UI. They resolve the targets they need
//! through a `Surface` and mutate them through the small capability traits
//! below. A lookup returning `None` means the target does not exist, which
//! fails that single render call with `RenderError::TargetMissing`.

mod memory;

pub use memory::{IndicatorView, Label, MemorySurface, TablePane, TextPane};

use crate::render::LogRow;
use std::fmt;

/// Table body holding structured log rows.
pub trait RowTarget {
    fn append_row(&mut self, row: &LogRow);
    /// Removes the first (oldest) row, if any.
    fn evict_oldest(&mut self);
    fn scroll_to_bottom(&mut self);
}

/// Scrollable pane of free-text entries.
pub trait EntryTarget {
    /// Appends `text` verbatim; it may contain markup.
    fn append_entry(&mut self, text: &str);
    fn scroll_to_bottom(&mut self);
}

/// Named status label with presentational classes.
pub trait IndicatorTarget {
    fn text(&self) -> &str;
    fn set_text(&mut self, text: &str);
    fn add_class(&mut self, class: &str);
    fn remove_class(&mut self, class: &str);
    fn has_class(&self, class: &str) -> bool;
}

/// Single-value display.
pub trait ScalarTarget {
    fn set_text(&mut self, text: &str);
}

pub trait Surface {
    fn log_table(&mut self) -> Option<&mut dyn RowTarget>;
    fn app_log(&mut self) -> Option<&mut dyn EntryTarget>;
    fn indicator(&mut self, name: &str) -> Option<&mut dyn IndicatorTarget>;
    fn scalar(&mut self, name: &str) -> Option<&mut dyn ScalarTarget>;
}

/// Identifies a display target, for error reporting and for removing
/// targets from a `MemorySurface`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    LogTable,
    AppLog,
    Indicator(String),
    Scalar(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::LogTable => write!(f, "log table"),
            Target::AppLog => write!(f, "application log"),
            Target::Indicator(name) => write!(f, "indicator `{}`", name),
            Target::Scalar(name) => write!(f, "scalar `{}`", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("display target missing: {0}")]
    TargetMissing(Target),
}
