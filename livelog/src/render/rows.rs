use super::{AppLog, DecodeError, LogSample};
use crate::display::{RenderError, Surface, Target};

use serde_json::Value;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Default capacity of the structured log.
pub const MAX_ROWS: usize = 100;

/// Free-text entry written for every row dropped off the top of the table.
pub const EVICTION_NOTICE: &str = "Removed log item ...";

/// One line of the structured log table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRow {
    /// Sample timestamp on the first row of a sample, empty otherwise.
    pub label: String,
    pub field: String,
    pub value: String,
}

/// Insertion-ordered rows that never grow past `capacity`.
#[derive(Debug, Clone)]
pub struct BoundedRowList {
    rows: VecDeque<LogRow>,
    capacity: usize,
}

impl BoundedRowList {
    pub fn new(capacity: usize) -> BoundedRowList {
        BoundedRowList {
            rows: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `row`, returning the oldest row if it had to make room.
    pub fn push(&mut self, row: LogRow) -> Option<LogRow> {
        self.rows.push_back(row);
        if self.rows.len() > self.capacity {
            self.rows.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogRow> {
        self.rows.iter()
    }
}

#[derive(Debug)]
pub enum SampleOutcome {
    Rendered { rows: usize, evicted: usize },
    /// The payload did not decode. One entry describing the failure was
    /// written to the application log.
    Discarded(DecodeError),
}

/// Renders `update_log` samples into the log table, keeping the table and
/// its own row list in lockstep.
#[derive(Debug, Clone)]
pub struct StructuredLog {
    rows: BoundedRowList,
    samples: u64,
    evictions: u64,
}

impl StructuredLog {
    pub fn new(capacity: usize) -> StructuredLog {
        StructuredLog {
            rows: BoundedRowList::new(capacity),
            samples: 0,
            evictions: 0,
        }
    }

    pub fn rows(&self) -> &BoundedRowList {
        &self.rows
    }

    /// Samples rendered so far.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Rows evicted so far.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Decodes and renders the JSON text of one sample.
    pub fn handle_sample<S: Surface + ?Sized>(
        &mut self,
        raw: &str,
        surface: &mut S,
        app_log: &mut AppLog,
    ) -> Result<SampleOutcome, RenderError> {
        self.handle_decoded(LogSample::decode(raw), surface, app_log)
    }

    /// Like `handle_sample`, for an event payload that is either the JSON
    /// text of a sample or the sample object itself.
    pub fn handle_payload<S: Surface + ?Sized>(
        &mut self,
        payload: &Value,
        surface: &mut S,
        app_log: &mut AppLog,
    ) -> Result<SampleOutcome, RenderError> {
        self.handle_decoded(LogSample::from_payload(payload), surface, app_log)
    }

    fn handle_decoded<S: Surface + ?Sized>(
        &mut self,
        decoded: Result<LogSample, DecodeError>,
        surface: &mut S,
        app_log: &mut AppLog,
    ) -> Result<SampleOutcome, RenderError> {
        match decoded {
            Ok(sample) => {
                let (rows, evicted) = self.render(&sample, surface, app_log)?;
                Ok(SampleOutcome::Rendered { rows, evicted })
            }
            Err(e) => {
                warn!(error = %e, "discarding log sample");
                app_log.append(surface, &format!("Discarded log sample: {}", e))?;
                Ok(SampleOutcome::Discarded(e))
            }
        }
    }

    /// Appends one row per field of `sample`, evicting the oldest rows as
    /// needed, then anchors the table at the bottom. Returns the number of
    /// rows appended and evicted.
    pub fn render<S: Surface + ?Sized>(
        &mut self,
        sample: &LogSample,
        surface: &mut S,
        app_log: &mut AppLog,
    ) -> Result<(usize, usize), RenderError> {
        if surface.log_table().is_none() {
            return Err(RenderError::TargetMissing(Target::LogTable));
        }

        let mut appended = 0;
        let mut evicted = 0;
        for row in sample.rows() {
            surface
                .log_table()
                .ok_or(RenderError::TargetMissing(Target::LogTable))?
                .append_row(&row);
            appended += 1;

            if let Some(old) = self.rows.push(row) {
                surface
                    .log_table()
                    .ok_or(RenderError::TargetMissing(Target::LogTable))?
                    .evict_oldest();
                evicted += 1;
                debug!(field = %old.field, "evicted row");
                if let Err(e) = app_log.append(&mut *surface, EVICTION_NOTICE) {
                    warn!(error = %e, "eviction not reported");
                }
            }
        }

        if appended > 0 {
            if let Some(table) = surface.log_table() {
                table.scroll_to_bottom();
            }
        }
        self.samples += 1;
        self.evictions += evicted as u64;
        Ok((appended, evicted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::MemorySurface;

    fn row(field: &str) -> LogRow {
        LogRow {
            label: String::new(),
            field: field.to_string(),
            value: "0".to_string(),
        }
    }

    #[test]
    fn bounded_push_evicts_oldest() {
        let mut list = BoundedRowList::new(2);
        assert_eq!(list.push(row("a")), None);
        assert_eq!(list.push(row("b")), None);
        assert_eq!(list.push(row("c")), Some(row("a")));
        let fields: Vec<_> = list.iter().map(|r| r.field.as_str()).collect();
        assert_eq!(fields, vec!["b", "c"]);
    }

    #[test]
    fn renders_one_row_per_field() {
        let mut surface = MemorySurface::new();
        let mut app_log = AppLog::new();
        let mut log = StructuredLog::new(MAX_ROWS);
        let outcome = log
            .handle_sample(
                r#"{"time_stamp":"12:00:01","speed":3.14159,"count":2,"mode":"car"}"#,
                &mut surface,
                &mut app_log,
            )
            .unwrap();
        assert!(matches!(
            outcome,
            SampleOutcome::Rendered {
                rows: 3,
                evicted: 0
            }
        ));
        let rows = surface.table_rows();
        let cells: Vec<_> = rows
            .iter()
            .map(|r| (r.label.as_str(), r.field.as_str(), r.value.as_str()))
            .collect();
        assert_eq!(
            cells,
            vec![
                ("12:00:01", "speed", "3.1416"),
                ("", "count", "2"),
                ("", "mode", " - - "),
            ]
        );
        assert!(surface.log_entries().is_empty());
    }

    #[test]
    fn overflow_reports_each_eviction() {
        let mut surface = MemorySurface::new();
        let mut app_log = AppLog::new();
        let mut log = StructuredLog::new(3);
        log.handle_sample(r#"{"time_stamp":"T1","a":1,"b":2}"#, &mut surface, &mut app_log)
            .unwrap();
        let outcome = log
            .handle_sample(r#"{"time_stamp":"T2","c":3,"d":4}"#, &mut surface, &mut app_log)
            .unwrap();
        assert!(matches!(
            outcome,
            SampleOutcome::Rendered {
                rows: 2,
                evicted: 1
            }
        ));
        assert_eq!(surface.table_rows().len(), 3);
        assert_eq!(surface.table_rows()[0].field, "b");
        assert_eq!(surface.log_entries(), [EVICTION_NOTICE.to_string()]);
        assert_eq!(log.evictions(), 1);
    }

    #[test]
    fn bad_sample_is_reported_once() {
        let mut surface = MemorySurface::new();
        let mut app_log = AppLog::new();
        let mut log = StructuredLog::new(MAX_ROWS);
        let outcome = log
            .handle_sample("{not json", &mut surface, &mut app_log)
            .unwrap();
        assert!(matches!(outcome, SampleOutcome::Discarded(_)));
        assert_eq!(surface.log_entries().len(), 1);
        assert!(surface.table_rows().is_empty());
        assert!(log.rows().is_empty());
    }

    #[test]
    fn missing_table_leaves_rows_untouched() {
        let mut surface = MemorySurface::new();
        surface.remove(&Target::LogTable);
        let mut app_log = AppLog::new();
        let mut log = StructuredLog::new(MAX_ROWS);
        let err = log
            .handle_sample(r#"{"time_stamp":"T","a":1}"#, &mut surface, &mut app_log)
            .unwrap_err();
        assert_eq!(err, RenderError::TargetMissing(Target::LogTable));
        assert!(log.rows().is_empty());
        assert_eq!(log.samples(), 0);
    }

    #[test]
    fn eviction_survives_missing_app_log() {
        let mut surface = MemorySurface::new();
        surface.remove(&Target::AppLog);
        let mut app_log = AppLog::new();
        let mut log = StructuredLog::new(1);
        let outcome = log
            .handle_sample(r#"{"time_stamp":"T","a":1,"b":2}"#, &mut surface, &mut app_log)
            .unwrap();
        assert!(matches!(
            outcome,
            SampleOutcome::Rendered {
                rows: 2,
                evicted: 1
            }
        ));
        assert_eq!(surface.table_rows().len(), 1);
    }

    #[test]
    fn table_is_bottom_anchored_after_sample() {
        let mut surface = MemorySurface::new();
        let mut app_log = AppLog::new();
        let mut log = StructuredLog::new(MAX_ROWS);
        for n in 0..5 {
            let raw = format!(r#"{{"time_stamp":"T{}","a":{}}}"#, n, n);
            log.handle_sample(&raw, &mut surface, &mut app_log).unwrap();
        }
        surface.table_pane_mut().unwrap().scroll_up(3);
        log.handle_sample(r#"{"time_stamp":"T","a":1}"#, &mut surface, &mut app_log)
            .unwrap();
        assert_eq!(surface.table_pane().unwrap().offset(), 0);
    }
}
