//! The dashboard context
//!
//! `Dashboard` owns the renderers together with the surface they draw on.
//! `attach` wires a shared dashboard to the events of a `Channel`; after
//! that every mutation happens inside channel handlers, on the thread that
//! dispatches the channel.

use crate::channel::{Channel, Endpoint};
use crate::config::DashboardConfig;
use crate::display::{RenderError, Surface};
use crate::render::{
    stringify, AppLog, SampleOutcome, ScalarStatus, StructuredLog, ToggleState, Toggles,
};

use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

/// Event names on the wire.
pub mod events {
    /// Inbound structured log sample.
    pub const UPDATE_LOG: &str = "update_log";
    /// Inbound free-text log entry.
    pub const APP_LOG: &str = "app_log";
    /// Inbound scalar status value.
    pub const BASE_DELAY_UPDATE: &str = "base_delay_update";
    /// Outbound on every connection, carrying the endpoint URL.
    pub const STARTUP: &str = "startup";
    /// Outbound request to change the server's delay.
    pub const CHANGE_DELAY: &str = "change_delay";
}

/// Second announcement line written on every connection.
pub const CONNECTED_NOTICE: &str = "Client connected";

pub struct Dashboard<S: Surface> {
    surface: S,
    structured: StructuredLog,
    app_log: AppLog,
    toggles: Toggles,
    scalar: ScalarStatus,
    indicators: Vec<String>,
}

impl<S: Surface> Dashboard<S> {
    /// Builds a dashboard over `surface` and paints every configured
    /// indicator in its initial OFF state.
    pub fn new(mut surface: S, config: &DashboardConfig) -> Dashboard<S> {
        let toggles = Toggles::new();
        let indicators: Vec<String> = config.indicator_names().map(String::from).collect();
        for name in &indicators {
            if let Err(e) = toggles.paint(name, &mut surface) {
                warn!(error = %e, "indicator not painted");
            }
        }
        Dashboard {
            surface,
            structured: StructuredLog::new(config.max_rows),
            app_log: AppLog::new(),
            toggles,
            scalar: ScalarStatus::new(&config.scalar),
            indicators,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn structured_log(&self) -> &StructuredLog {
        &self.structured
    }

    pub fn toggles(&self) -> &Toggles {
        &self.toggles
    }

    /// Configured indicator names, in configuration order.
    pub fn indicators(&self) -> &[String] {
        &self.indicators
    }

    pub fn handle_sample(&mut self, raw: &str) -> Result<SampleOutcome, RenderError> {
        self.structured
            .handle_sample(raw, &mut self.surface, &mut self.app_log)
    }

    pub fn handle_log_payload(&mut self, payload: &Value) -> Result<SampleOutcome, RenderError> {
        self.structured
            .handle_payload(payload, &mut self.surface, &mut self.app_log)
    }

    /// Appends one free-text entry to the application log.
    pub fn log_text(&mut self, text: &str) -> Result<(), RenderError> {
        self.app_log.append(&mut self.surface, text)
    }

    /// `app_log` payloads are normally strings; anything else is logged as
    /// its JSON text.
    pub fn handle_app_log(&mut self, payload: &Value) -> Result<(), RenderError> {
        self.log_text(&stringify(payload))
    }

    pub fn toggle(&mut self, name: &str) -> Result<ToggleState, RenderError> {
        let state = self.toggles.toggle(name, &mut self.surface)?;
        debug!(indicator = name, %state, "toggled");
        Ok(state)
    }

    pub fn update_status(&mut self, value: &Value) -> Result<(), RenderError> {
        self.scalar.update(value, &mut self.surface)
    }

    /// Writes the connection announcement to the application log.
    pub fn announce(&mut self, endpoint: &Endpoint) -> Result<(), RenderError> {
        self.log_text(&endpoint.to_string())?;
        self.log_text(CONNECTED_NOTICE)
    }
}

/// Registers the dashboard's handlers on `channel`: the three inbound
/// events, plus the connection announcement followed by the outbound
/// `startup` event.
pub fn attach<S: Surface + 'static>(dashboard: &Rc<RefCell<Dashboard<S>>>, channel: &mut Channel) {
    let d = dashboard.clone();
    channel.subscribe(events::UPDATE_LOG, move |payload| {
        report(
            events::UPDATE_LOG,
            d.borrow_mut().handle_log_payload(payload),
        )
    });

    let d = dashboard.clone();
    channel.subscribe(events::APP_LOG, move |payload| {
        report(events::APP_LOG, d.borrow_mut().handle_app_log(payload))
    });

    let d = dashboard.clone();
    channel.subscribe(events::BASE_DELAY_UPDATE, move |payload| {
        report(
            events::BASE_DELAY_UPDATE,
            d.borrow_mut().update_status(payload),
        )
    });

    let d = dashboard.clone();
    channel.on_connect(move |endpoint, emitter| {
        report("connect", d.borrow_mut().announce(endpoint));
        if let Err(e) = emitter.emit(events::STARTUP, endpoint.to_string()) {
            warn!(error = ?e, "startup not sent");
        }
    });
}

fn report<T>(event: &str, result: Result<T, RenderError>) {
    if let Err(e) = result {
        warn!(event = %event, error = %e, "render dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Frame, Port, DEFAULT_CONNECT_TIMEOUT};
    use crate::display::{IndicatorTarget, MemorySurface, Target};
    use serde_json::json;

    fn dashboard() -> Dashboard<MemorySurface> {
        let surface = MemorySurface::new()
            .with_indicator("monitoring")
            .with_indicator("logging")
            .with_scalar("base_delay");
        Dashboard::new(surface, &DashboardConfig::default())
    }

    #[test]
    fn indicators_start_off() {
        let d = dashboard();
        for name in d.indicators() {
            let view = d.surface().indicator_view(name).unwrap();
            assert_eq!(view.text(), "OFF");
            assert!(view.has_class("OFF"));
        }
    }

    #[test]
    fn app_log_payloads() {
        let mut d = dashboard();
        d.handle_app_log(&json!("<b>started</b>")).unwrap();
        d.handle_app_log(&json!({"code": 7})).unwrap();
        assert_eq!(
            d.surface().log_entries(),
            ["<b>started</b>".to_string(), r#"{"code":7}"#.to_string()]
        );
    }

    #[test]
    fn announce_then_startup() {
        let (port, peer) = Port::loopback();
        let mut channel =
            Channel::from_port(Endpoint::loopback("dash"), port, DEFAULT_CONNECT_TIMEOUT);
        let d = Rc::new(RefCell::new(dashboard()));
        attach(&d, &mut channel);

        peer.connect();
        channel.dispatch_pending().unwrap();
        assert_eq!(
            d.borrow().surface().log_entries(),
            ["loopback://dash".to_string(), CONNECTED_NOTICE.to_string()]
        );
        assert_eq!(
            peer.sent(),
            vec![Frame::new(events::STARTUP, json!("loopback://dash"))]
        );
    }

    #[test]
    fn missing_scalar_does_not_stop_the_channel() {
        let (port, peer) = Port::loopback();
        let mut channel =
            Channel::from_port(Endpoint::loopback("dash"), port, DEFAULT_CONNECT_TIMEOUT);
        let d = Rc::new(RefCell::new(dashboard()));
        d.borrow_mut()
            .surface_mut()
            .remove(&Target::Scalar("base_delay".to_string()));
        attach(&d, &mut channel);

        peer.send(events::BASE_DELAY_UPDATE, 5);
        peer.send(events::APP_LOG, "still here");
        assert_eq!(channel.dispatch_pending().unwrap(), 2);
        assert_eq!(d.borrow().surface().log_entries(), ["still here".to_string()]);
    }
}
