//! Property tests for the structured log.
//!
//! 1. The row list and the table never hold more than the capacity.
//! 2. Rows of one sample stay contiguous with the timestamp on the first.
//! 3. Every eviction is reported exactly once.
//! 4. Rounding is stable and never produces "-0".

use livelog::display::MemorySurface;
use livelog::render::{format_rounded, AppLog, LogSample, StructuredLog, EVICTION_NOTICE};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

fn sample_strategy() -> impl Strategy<Value = LogSample> {
    (
        "[0-9]{2}:[0-9]{2}:[0-9]{2}",
        prop::collection::vec(("[a-z]{1,6}", -1.0e6f64..1.0e6), 0..8),
    )
        .prop_map(|(ts, fields)| {
            fields
                .into_iter()
                .fold(LogSample::new(&ts), |s, (name, v)| s.with_field(&name, v))
        })
}

// ── Capacity ────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn never_exceeds_capacity(
        capacity in 1usize..40,
        samples in prop::collection::vec(sample_strategy(), 0..60),
    ) {
        let mut surface = MemorySurface::new();
        let mut app_log = AppLog::new();
        let mut log = StructuredLog::new(capacity);
        let mut total = 0;
        for sample in &samples {
            let (rows, _) = log.render(sample, &mut surface, &mut app_log).unwrap();
            total += rows;
            prop_assert!(log.rows().len() <= capacity);
            prop_assert_eq!(surface.table_rows().len(), log.rows().len());
        }
        let expected_evictions = total.saturating_sub(capacity);
        prop_assert_eq!(log.evictions() as usize, expected_evictions);
        let notices = surface
            .log_entries()
            .iter()
            .filter(|e| e.as_str() == EVICTION_NOTICE)
            .count();
        prop_assert_eq!(notices, expected_evictions);
    }

    #[test]
    fn table_mirrors_row_list(
        samples in prop::collection::vec(sample_strategy(), 1..30),
    ) {
        let mut surface = MemorySurface::new();
        let mut app_log = AppLog::new();
        let mut log = StructuredLog::new(10);
        for sample in &samples {
            log.render(sample, &mut surface, &mut app_log).unwrap();
        }
        let listed: Vec<_> = log.rows().iter().cloned().collect();
        prop_assert_eq!(surface.table_rows(), listed);
    }
}

// ── Grouping ────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn first_row_carries_timestamp(sample in sample_strategy()) {
        let rows: Vec<_> = sample.rows().collect();
        prop_assert_eq!(rows.len(), sample.fields().len());
        for (i, row) in rows.iter().enumerate() {
            if i == 0 {
                prop_assert_eq!(row.label.as_str(), sample.time_stamp());
            } else {
                prop_assert!(row.label.is_empty());
            }
        }
    }
}

// ── Rounding ────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn rounding_is_idempotent(v in -1.0e9f64..1.0e9) {
        let once = format_rounded(v);
        let parsed: f64 = once.parse().unwrap();
        prop_assert_eq!(format_rounded(parsed), once.clone());
        prop_assert!(once != "-0");
    }

    #[test]
    fn rounding_error_is_bounded(v in -1.0e6f64..1.0e6) {
        let parsed: f64 = format_rounded(v).parse().unwrap();
        prop_assert!((parsed - v).abs() <= 0.00005 + 1e-9);
    }
}
