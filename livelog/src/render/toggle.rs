use crate::display::{IndicatorTarget, RenderError, Surface, Target};

use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ToggleState {
    On,
    #[default]
    Off,
}

impl ToggleState {
    pub fn flipped(self) -> ToggleState {
        match self {
            ToggleState::On => ToggleState::Off,
            ToggleState::Off => ToggleState::On,
        }
    }

    /// Indicator text for this state.
    pub fn label(self) -> &'static str {
        match self {
            ToggleState::On => "ON",
            ToggleState::Off => "OFF",
        }
    }

    /// Presentational class for this state.
    pub fn class(self) -> &'static str {
        self.label()
    }
}

impl fmt::Display for ToggleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Local ON/OFF state for named indicators.
#[derive(Debug, Default, Clone)]
pub struct Toggles {
    states: HashMap<String, ToggleState>,
}

impl Toggles {
    pub fn new() -> Toggles {
        Toggles::default()
    }

    /// Current state of `name`; indicators never toggled are off.
    pub fn state(&self, name: &str) -> ToggleState {
        self.states.get(name).copied().unwrap_or_default()
    }

    /// Flips `name` and repaints its indicator. A missing indicator leaves
    /// the state unchanged.
    pub fn toggle<S: Surface + ?Sized>(
        &mut self,
        name: &str,
        surface: &mut S,
    ) -> Result<ToggleState, RenderError> {
        let next = self.state(name).flipped();
        let indicator = surface
            .indicator(name)
            .ok_or_else(|| RenderError::TargetMissing(Target::Indicator(name.to_string())))?;
        apply(indicator, next);
        self.states.insert(name.to_string(), next);
        Ok(next)
    }

    /// Writes the current state of `name` to its indicator.
    pub fn paint<S: Surface + ?Sized>(
        &self,
        name: &str,
        surface: &mut S,
    ) -> Result<(), RenderError> {
        let indicator = surface
            .indicator(name)
            .ok_or_else(|| RenderError::TargetMissing(Target::Indicator(name.to_string())))?;
        apply(indicator, self.state(name));
        Ok(())
    }
}

fn apply(indicator: &mut dyn IndicatorTarget, state: ToggleState) {
    indicator.set_text(state.label());
    indicator.remove_class(state.flipped().class());
    indicator.add_class(state.class());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::MemorySurface;

    fn classes(surface: &MemorySurface, name: &str) -> Vec<String> {
        surface
            .indicator_view(name)
            .unwrap()
            .classes()
            .map(String::from)
            .collect()
    }

    #[test]
    fn toggles_flip_text_and_class_together() {
        let mut surface = MemorySurface::new().with_indicator("monitoring");
        let mut toggles = Toggles::new();
        toggles.paint("monitoring", &mut surface).unwrap();
        assert_eq!(classes(&surface, "monitoring"), vec!["OFF"]);

        assert_eq!(
            toggles.toggle("monitoring", &mut surface).unwrap(),
            ToggleState::On
        );
        let view = surface.indicator_view("monitoring").unwrap();
        assert_eq!(view.text(), "ON");
        assert_eq!(classes(&surface, "monitoring"), vec!["ON"]);
    }

    #[test]
    fn two_toggles_restore_state() {
        let mut surface = MemorySurface::new()
            .with_indicator("monitoring")
            .with_indicator("logging");
        let mut toggles = Toggles::new();
        toggles.paint("logging", &mut surface).unwrap();
        let before = surface.indicator_view("logging").cloned();
        toggles.toggle("logging", &mut surface).unwrap();
        toggles.toggle("logging", &mut surface).unwrap();
        assert_eq!(surface.indicator_view("logging").cloned(), before);
        assert_eq!(toggles.state("logging"), ToggleState::Off);
        assert_eq!(toggles.state("monitoring"), ToggleState::Off);
    }

    #[test]
    fn missing_indicator_keeps_state() {
        let mut surface = MemorySurface::new();
        let mut toggles = Toggles::new();
        assert_eq!(
            toggles.toggle("logging", &mut surface),
            Err(RenderError::TargetMissing(Target::Indicator(
                "logging".to_string()
            )))
        );
        assert_eq!(toggles.state("logging"), ToggleState::Off);
    }
}
