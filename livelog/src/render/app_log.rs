use crate::display::{RenderError, Surface, Target};

/// Appends free-text entries to the application log pane. Unlike the
/// structured log there is no capacity bound.
#[derive(Debug, Default, Clone)]
pub struct AppLog {
    appended: u64,
}

impl AppLog {
    pub fn new() -> AppLog {
        AppLog::default()
    }

    /// Appends `text` verbatim and keeps the pane anchored at the bottom.
    pub fn append<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        text: &str,
    ) -> Result<(), RenderError> {
        let pane = surface
            .app_log()
            .ok_or(RenderError::TargetMissing(Target::AppLog))?;
        pane.append_entry(text);
        pane.scroll_to_bottom();
        self.appended += 1;
        Ok(())
    }

    /// Entries appended through this logger.
    pub fn appended(&self) -> u64 {
        self.appended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::MemorySurface;

    #[test]
    fn appends_verbatim_without_bound() {
        let mut surface = MemorySurface::new();
        let mut log = AppLog::new();
        for n in 0..250 {
            log.append(&mut surface, &format!("<i>entry {}</i>", n)).unwrap();
        }
        assert_eq!(surface.log_entries().len(), 250);
        assert_eq!(surface.log_entries()[0], "<i>entry 0</i>");
        assert_eq!(log.appended(), 250);
    }

    #[test]
    fn missing_pane() {
        let mut surface = MemorySurface::new();
        surface.remove(&Target::AppLog);
        let mut log = AppLog::new();
        assert_eq!(
            log.append(&mut surface, "x"),
            Err(RenderError::TargetMissing(Target::AppLog))
        );
        assert_eq!(log.appended(), 0);
    }
}
