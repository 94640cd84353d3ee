//! In-memory surface. Keeps exactly what a real UI would show, so it
//! doubles as the model the terminal front end draws from and as the
//! fake used by tests.

use super::{EntryTarget, IndicatorTarget, RowTarget, ScalarTarget, Surface, Target};
use crate::render::LogRow;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Default, Clone)]
pub struct TablePane {
    rows: VecDeque<LogRow>,
    /// Rows scrolled up from the bottom. Zero means bottom anchored.
    offset: usize,
}

impl TablePane {
    pub fn rows(&self) -> &VecDeque<LogRow> {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn scroll_up(&mut self, n: usize) {
        self.offset = (self.offset + n).min(self.rows.len().saturating_sub(1));
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.offset = self.offset.saturating_sub(n);
    }

    /// The rows that fit in `height` lines at the current scroll position.
    pub fn visible(&self, height: usize) -> impl Iterator<Item = &LogRow> {
        let end = self.rows.len().saturating_sub(self.offset);
        let start = end.saturating_sub(height);
        self.rows.range(start..end)
    }
}

impl RowTarget for TablePane {
    fn append_row(&mut self, row: &LogRow) {
        self.rows.push_back(row.clone());
    }

    fn evict_oldest(&mut self) {
        self.rows.pop_front();
        self.offset = self.offset.min(self.rows.len().saturating_sub(1));
    }

    fn scroll_to_bottom(&mut self) {
        self.offset = 0;
    }
}

#[derive(Debug, Default, Clone)]
pub struct TextPane {
    entries: Vec<String>,
    offset: usize,
}

impl TextPane {
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn visible(&self, height: usize) -> &[String] {
        let end = self.entries.len().saturating_sub(self.offset);
        let start = end.saturating_sub(height);
        &self.entries[start..end]
    }
}

impl EntryTarget for TextPane {
    fn append_entry(&mut self, text: &str) {
        self.entries.push(text.to_string());
    }

    fn scroll_to_bottom(&mut self) {
        self.offset = 0;
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndicatorView {
    text: String,
    classes: BTreeSet<String>,
}

impl IndicatorView {
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(String::as_str)
    }
}

impl IndicatorTarget for IndicatorView {
    fn text(&self) -> &str {
        &self.text
    }

    fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    fn add_class(&mut self, class: &str) {
        self.classes.insert(class.to_string());
    }

    fn remove_class(&mut self, class: &str) {
        self.classes.remove(class);
    }

    fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Label {
    text: String,
}

impl Label {
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl ScalarTarget for Label {
    fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }
}

#[derive(Debug, Clone)]
pub struct MemorySurface {
    table: Option<TablePane>,
    app_log: Option<TextPane>,
    indicators: BTreeMap<String, IndicatorView>,
    scalars: BTreeMap<String, Label>,
}

impl Default for MemorySurface {
    fn default() -> Self {
        MemorySurface::new()
    }
}

impl MemorySurface {
    /// A surface with a log table and an application log, and no
    /// indicators or scalars.
    pub fn new() -> MemorySurface {
        MemorySurface {
            table: Some(TablePane::default()),
            app_log: Some(TextPane::default()),
            indicators: BTreeMap::new(),
            scalars: BTreeMap::new(),
        }
    }

    pub fn with_indicator(mut self, name: &str) -> MemorySurface {
        self.indicators
            .insert(name.to_string(), IndicatorView::default());
        self
    }

    pub fn with_scalar(mut self, name: &str) -> MemorySurface {
        self.scalars.insert(name.to_string(), Label::default());
        self
    }

    /// Removes a target, so that later lookups of it fail.
    pub fn remove(&mut self, target: &Target) {
        match target {
            Target::LogTable => self.table = None,
            Target::AppLog => self.app_log = None,
            Target::Indicator(name) => {
                self.indicators.remove(name);
            }
            Target::Scalar(name) => {
                self.scalars.remove(name);
            }
        }
    }

    pub fn table_pane(&self) -> Option<&TablePane> {
        self.table.as_ref()
    }

    pub fn table_pane_mut(&mut self) -> Option<&mut TablePane> {
        self.table.as_mut()
    }

    pub fn log_pane(&self) -> Option<&TextPane> {
        self.app_log.as_ref()
    }

    /// Entries of the application log, oldest first. Empty when the pane
    /// is missing.
    pub fn log_entries(&self) -> &[String] {
        self.app_log.as_ref().map(|p| p.entries()).unwrap_or(&[])
    }

    /// Rows of the log table, oldest first.
    pub fn table_rows(&self) -> Vec<LogRow> {
        self.table
            .as_ref()
            .map(|t| t.rows().iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn indicator_view(&self, name: &str) -> Option<&IndicatorView> {
        self.indicators.get(name)
    }

    pub fn indicators(&self) -> impl Iterator<Item = (&str, &IndicatorView)> {
        self.indicators.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn scalar_text(&self, name: &str) -> Option<&str> {
        self.scalars.get(name).map(Label::text)
    }
}

impl Surface for MemorySurface {
    fn log_table(&mut self) -> Option<&mut dyn RowTarget> {
        self.table.as_mut().map(|t| t as &mut dyn RowTarget)
    }

    fn app_log(&mut self) -> Option<&mut dyn EntryTarget> {
        self.app_log.as_mut().map(|p| p as &mut dyn EntryTarget)
    }

    fn indicator(&mut self, name: &str) -> Option<&mut dyn IndicatorTarget> {
        self.indicators
            .get_mut(name)
            .map(|i| i as &mut dyn IndicatorTarget)
    }

    fn scalar(&mut self, name: &str) -> Option<&mut dyn ScalarTarget> {
        self.scalars.get_mut(name).map(|l| l as &mut dyn ScalarTarget)
    }
}
