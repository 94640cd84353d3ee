use crate::display::{RenderError, Surface, Target};

use serde_json::Value;

/// Keeps one scalar display target in sync with `base_delay_update`-style
/// events. Each update overwrites the previous text.
#[derive(Debug, Clone)]
pub struct ScalarStatus {
    target: String,
}

impl ScalarStatus {
    pub fn new(target: &str) -> ScalarStatus {
        ScalarStatus {
            target: target.to_string(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn update<S: Surface + ?Sized>(
        &self,
        value: &Value,
        surface: &mut S,
    ) -> Result<(), RenderError> {
        let label = surface
            .scalar(&self.target)
            .ok_or_else(|| RenderError::TargetMissing(Target::Scalar(self.target.clone())))?;
        label.set_text(&stringify(value));
        Ok(())
    }
}

/// Strings verbatim, everything else as its JSON text.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::MemorySurface;
    use serde_json::json;

    #[test]
    fn overwrites() {
        let mut surface = MemorySurface::new().with_scalar("base_delay");
        let status = ScalarStatus::new("base_delay");
        status.update(&json!(42), &mut surface).unwrap();
        assert_eq!(surface.scalar_text("base_delay"), Some("42"));
        status.update(&json!("n/a"), &mut surface).unwrap();
        assert_eq!(surface.scalar_text("base_delay"), Some("n/a"));
    }

    #[test]
    fn stringify_forms() {
        assert_eq!(stringify(&json!(0.5)), "0.5");
        assert_eq!(stringify(&json!(true)), "true");
        assert_eq!(stringify(&Value::Null), "null");
    }

    #[test]
    fn missing_target() {
        let mut surface = MemorySurface::new();
        let status = ScalarStatus::new("base_delay");
        assert!(status.update(&json!(1), &mut surface).is_err());
    }
}
