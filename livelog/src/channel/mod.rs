//! Event channel
//!
//! A `Channel` is the client end of a persistent, bidirectional connection
//! over which named events flow. Handlers are registered per event name and
//! run on whichever thread calls `dispatch_pending` or `dispatch_timeout`,
//! one at a time and in arrival order. The I/O itself happens on the
//! port's own thread.
//!
//! ```no_run
//! use livelog::channel::Channel;
//!
//! let mut channel = Channel::connect("tcp://localhost:5000").unwrap();
//! channel.subscribe("app_log", |payload| println!("{}", payload));
//! channel.on_connect(|endpoint, emitter| {
//!     let _ = emitter.emit("startup", endpoint.to_string());
//! });
//! loop {
//!     channel.dispatch_timeout(std::time::Duration::from_millis(100)).unwrap();
//! }
//! ```

pub mod frame;
mod iobuf;
mod port;
mod tcp;

pub use frame::Frame;
pub use port::{
    Emitter, Endpoint, Incoming, Peer, Port, RecvError, SendError, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_PORT,
};

use crossbeam::channel::{RecvTimeoutError, TryRecvError};
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("invalid endpoint `{0}`")]
    InvalidEndpoint(String),
    #[error("cannot reach {endpoint}: {source}")]
    Unreachable {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("event channel disconnected")]
    Disconnected,
}

type Handler = Box<dyn FnMut(&Value)>;
type AnyHandler = Box<dyn FnMut(&str, &Value)>;
type ConnectHandler = Box<dyn FnMut(&Endpoint, &Emitter)>;

pub struct Channel {
    endpoint: Endpoint,
    connect_timeout: Duration,
    port: Port,
    connected: bool,
    handlers: HashMap<String, Vec<Handler>>,
    any_handlers: Vec<AnyHandler>,
    connect_handlers: Vec<ConnectHandler>,
}

impl Channel {
    /// Connects to `url` (see `Endpoint`) with the default connect timeout.
    pub fn connect(url: &str) -> Result<Channel, ConnectionError> {
        Channel::connect_with_timeout(url, DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn connect_with_timeout(url: &str, timeout: Duration) -> Result<Channel, ConnectionError> {
        let endpoint: Endpoint = url.parse()?;
        let port = Port::open(&endpoint, timeout)?;
        info!(%endpoint, "event channel open");
        Ok(Channel::from_port(endpoint, port, timeout))
    }

    /// Wraps an already opened port, e.g. one made with `Port::loopback`.
    pub fn from_port(endpoint: Endpoint, port: Port, connect_timeout: Duration) -> Channel {
        Channel {
            endpoint,
            connect_timeout,
            port,
            connected: false,
            handlers: HashMap::new(),
            any_handlers: Vec::new(),
            connect_handlers: Vec::new(),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// True between a `Connected` and a `Disconnected` notification.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Registers `handler` for every inbound event named `name`. Handlers for
    /// the same name run in registration order.
    pub fn subscribe<F: FnMut(&Value) + 'static>(&mut self, name: &str, handler: F) {
        self.handlers
            .entry(name.to_string())
            .or_default()
            .push(Box::new(handler));
    }

    /// Registers `handler` for every inbound event, whatever its name. These
    /// run before the per-name handlers.
    pub fn subscribe_any<F: FnMut(&str, &Value) + 'static>(&mut self, handler: F) {
        self.any_handlers.push(Box::new(handler));
    }

    /// Registers `handler` to run once per connection establishment.
    pub fn on_connect<F: FnMut(&Endpoint, &Emitter) + 'static>(&mut self, handler: F) {
        self.connect_handlers.push(Box::new(handler));
    }

    /// Fire-and-forget send of one event.
    pub fn emit(&self, name: &str, payload: impl Into<Value>) -> Result<(), SendError> {
        self.port.emitter().emit(name, payload)
    }

    /// A sending handle that can be moved into input handlers.
    pub fn emitter(&self) -> Emitter {
        self.port.emitter()
    }

    /// Tears down the current port and opens a new one to the same endpoint.
    /// Subscriptions are kept and connect handlers run again once the new
    /// connection is dispatched.
    pub fn reconnect(&mut self) -> Result<(), ConnectionError> {
        let port = Port::open(&self.endpoint, self.connect_timeout)?;
        self.port = port;
        self.connected = false;
        info!(endpoint = %self.endpoint, "event channel reopened");
        Ok(())
    }

    /// Runs the handlers for everything already received, without blocking.
    /// Returns the number of items dispatched.
    pub fn dispatch_pending(&mut self) -> Result<usize, ConnectionError> {
        let mut count = 0;
        loop {
            match self.port.try_recv() {
                Ok(item) => {
                    self.dispatch(item)?;
                    count += 1;
                }
                Err(TryRecvError::Empty) => return Ok(count),
                Err(TryRecvError::Disconnected) => return Err(self.lost()),
            }
        }
    }

    /// Waits up to `timeout` for the first item, then dispatches it and
    /// everything else already received.
    pub fn dispatch_timeout(&mut self, timeout: Duration) -> Result<usize, ConnectionError> {
        let deadline = Instant::now() + timeout;
        match self
            .port
            .recv_timeout(deadline.saturating_duration_since(Instant::now()))
        {
            Ok(item) => {
                self.dispatch(item)?;
                Ok(1 + self.dispatch_pending()?)
            }
            Err(RecvTimeoutError::Timeout) => Ok(0),
            Err(RecvTimeoutError::Disconnected) => Err(self.lost()),
        }
    }

    fn lost(&mut self) -> ConnectionError {
        self.connected = false;
        ConnectionError::Disconnected
    }

    fn dispatch(&mut self, item: Incoming) -> Result<(), ConnectionError> {
        match item {
            Incoming::Connected => {
                self.connected = true;
                info!(endpoint = %self.endpoint, "connected");
                let emitter = self.port.emitter();
                for handler in self.connect_handlers.iter_mut() {
                    handler(&self.endpoint, &emitter);
                }
            }
            Incoming::Event(frame) => {
                debug!(event = %frame.name, "received");
                for handler in self.any_handlers.iter_mut() {
                    handler(&frame.name, &frame.payload);
                }
                match self.handlers.get_mut(&frame.name) {
                    Some(handlers) => {
                        for handler in handlers.iter_mut() {
                            handler(&frame.payload);
                        }
                    }
                    None => debug!(event = %frame.name, "no subscriber"),
                }
            }
            Incoming::Error(e) => {
                warn!(error = %e, "skipped undecodable frame");
            }
            Incoming::Disconnected => {
                info!(endpoint = %self.endpoint, "disconnected");
                return Err(self.lost());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn loopback() -> (Channel, Peer) {
        let (port, peer) = Port::loopback();
        let channel = Channel::from_port(Endpoint::loopback("test"), port, DEFAULT_CONNECT_TIMEOUT);
        (channel, peer)
    }

    #[test]
    fn handlers_run_in_arrival_order() {
        let (mut channel, peer) = loopback();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for name in ["a", "b"] {
            let seen = seen.clone();
            channel.subscribe(name, move |payload| {
                seen.borrow_mut().push(format!("{}={}", name, payload))
            });
        }
        peer.send("a", 1);
        peer.send("b", 2);
        peer.send("c", 3);
        peer.send("a", 4);
        assert_eq!(channel.dispatch_pending().unwrap(), 4);
        assert_eq!(*seen.borrow(), vec!["a=1", "b=2", "a=4"]);
    }

    #[test]
    fn on_connect_fires_per_connection() {
        let (mut channel, peer) = loopback();
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        channel.on_connect(move |endpoint, emitter| {
            *c.borrow_mut() += 1;
            emitter.emit("startup", endpoint.to_string()).unwrap();
        });
        assert!(!channel.is_connected());
        peer.connect();
        channel.dispatch_pending().unwrap();
        assert!(channel.is_connected());
        assert_eq!(*count.borrow(), 1);
        assert_eq!(
            peer.sent(),
            vec![Frame::new("startup", json!("loopback://test"))]
        );
    }

    #[test]
    fn subscribe_any_sees_everything_first() {
        let (mut channel, peer) = loopback();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        channel.subscribe_any(move |name, _| s.borrow_mut().push(format!("any:{}", name)));
        let s = seen.clone();
        channel.subscribe("x", move |_| s.borrow_mut().push("x".to_string()));
        peer.send("x", Value::Null);
        peer.send("y", Value::Null);
        channel.dispatch_pending().unwrap();
        assert_eq!(*seen.borrow(), vec!["any:x", "x", "any:y"]);
    }

    #[test]
    fn bad_frames_do_not_stop_dispatch() {
        let (mut channel, peer) = loopback();
        let seen = Rc::new(RefCell::new(0));
        let s = seen.clone();
        channel.subscribe("app_log", move |_| *s.borrow_mut() += 1);
        peer.send_raw(b"{oops\n[\"app_log\",\"one\"]\n");
        assert_eq!(channel.dispatch_pending().unwrap(), 2);
        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn disconnect_is_reported() {
        let (mut channel, peer) = loopback();
        peer.connect();
        peer.disconnect();
        assert!(matches!(
            channel.dispatch_pending(),
            Err(ConnectionError::Disconnected)
        ));
        assert!(!channel.is_connected());
    }

    #[test]
    fn dropped_peer_is_reported() {
        let (mut channel, peer) = loopback();
        drop(peer);
        assert!(matches!(
            channel.dispatch_timeout(Duration::from_millis(10)),
            Err(ConnectionError::Disconnected)
        ));
    }

    #[test]
    fn timeout_without_traffic() {
        let (mut channel, _peer) = loopback();
        assert_eq!(channel.dispatch_timeout(Duration::from_millis(5)).unwrap(), 0);
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        assert!(matches!(
            Channel::connect("ws://nowhere"),
            Err(ConnectionError::InvalidEndpoint(_))
        ));
    }
}
