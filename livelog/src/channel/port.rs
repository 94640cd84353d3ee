//! Event port
//!
//! The `Port` object provides a few things:
//! - Abstracting across the specific `RawLink`s. Only TCP exists on the
//!   wire side, plus an in-process loopback used by tests and demos.
//! - Bridging the `mio` world of the low level link with crossbeam
//!   channels, so the dispatching thread only ever sees `Incoming` items
//!   in arrival order.
//! - Automating send queueing and as-needed draining of partially
//!   written frames.
//!
//! Note: a TCP `Port` sets up a dedicated thread to perform the above.

use super::frame::{self, Frame};
use super::tcp;
use super::ConnectionError;

use crossbeam::channel;
use serde_json::Value;
use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Possible errors when receiving from a `RawLink`
#[derive(Debug, thiserror::Error)]
pub enum RecvError {
    /// No frames available at this time.
    #[error("no frame ready")]
    NotReady,
    /// The peer closed the connection.
    #[error("link disconnected")]
    Disconnected,
    /// Error in the data. The offending bytes have been discarded.
    #[error(transparent)]
    Protocol(frame::Error),
    /// Low level IO error.
    #[error("i/o error: {0}")]
    IO(io::Error),
}

/// Possible errors when sending to a `RawLink` or an `Emitter`
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The frame was sent partially, and must be drained via `drain()`.
    #[error("partial write pending")]
    MustDrain,
    /// A previous `MustDrain` has not been drained yet.
    #[error("send buffer full")]
    Full,
    /// The port is not connected anymore.
    #[error("port disconnected")]
    Disconnected,
    #[error("i/o error: {0}")]
    IO(io::Error),
    /// The frame cannot be encoded within protocol limits.
    #[error("cannot encode frame: {0}")]
    Serialization(frame::Error),
}

/// Generic interface for the low level part of a port.
pub(crate) trait RawLink {
    /// Returns a frame without blocking, or RecvError::NotReady if one is not available.
    /// `Protocol` errors are recoverable; for all other errors the link should be torn down.
    fn recv(&mut self) -> Result<Frame, RecvError>;

    /// Attempts to send a frame. If it doesn't return Ok:
    /// - if it returned MustDrain, the frame was sent partially, and must be drained via drain()
    /// - if it returned Full, the last frame written was MustDrain and it hasn't been drained yet
    /// - for all other errors, the appropriate action is to tear down this link.
    fn send(&mut self, frame: &Frame) -> Result<(), SendError>;

    /// Drain partially written frame.
    fn drain(&mut self) -> Result<(), SendError> {
        Ok(())
    }

    fn has_data_to_drain(&self) -> bool {
        false
    }
}

/// What the port delivers to the dispatching thread, in arrival order.
#[derive(Debug)]
pub enum Incoming {
    /// The link is established and frames may follow.
    Connected,
    Event(Frame),
    /// A frame could not be decoded and was skipped.
    Error(frame::Error),
    /// The link is gone. Nothing follows.
    Disconnected,
}

/// The communication to the `Port` thread occurs over a single
/// channel. This enum is used to multiplex data and control messages.
#[derive(Debug)]
enum Outgoing {
    Frame(Frame),
    Shutdown,
}

/// Default TCP port of the event server.
pub const DEFAULT_PORT: u16 = 5000;

/// Default time allowed for establishing a TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// In special cases where the default that gets picked when resolving an IP address
/// does not work, this allows to force using either IPv4 or IPv6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddrFamilyRestrict {
    V4,
    V6,
    Either,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scheme {
    Tcp(AddrFamilyRestrict),
    Loopback,
}

/// Where a channel connects to.
///
/// A valid endpoint has one of the following formats:
/// - `tcp://address[:port]`. `tcp4` or `tcp6` force a specific version of
///   the IP protocol should the default resolution fail.
/// - `address:port`, shorthand for `tcp://address:port`.
///
/// The port defaults to `DEFAULT_PORT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    scheme: Scheme,
    address: String,
}

impl Endpoint {
    /// An endpoint naming an in-process loopback port. It cannot be opened,
    /// only used to label a channel built with `Port::loopback`.
    pub fn loopback(name: &str) -> Endpoint {
        Endpoint {
            scheme: Scheme::Loopback,
            address: name.to_string(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Resolve to a fully specified socket address, appending the default
    /// port when it is missing.
    fn resolve(&self) -> Result<SocketAddr, io::Error> {
        let family = match self.scheme {
            Scheme::Tcp(family) => family,
            Scheme::Loopback => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "loopback endpoints cannot be resolved",
                ))
            }
        };
        let addr = self.address.as_str();
        // It would be possible to determine if the port is needed, but it's
        // simpler to try to parse as-is, and if it fails try again with it.
        let iter = match addr.to_socket_addrs() {
            Ok(iter) => iter,
            Err(err) => match format!("{}:{}", addr, DEFAULT_PORT).to_socket_addrs() {
                Ok(iter) => iter,
                // Numeric IPv6 addresses need brackets around them.
                Err(_) => match format!("[{}]:{}", addr, DEFAULT_PORT).to_socket_addrs() {
                    Ok(iter) => iter,
                    Err(_) => return Err(err),
                },
            },
        };
        for sa in iter {
            match (sa, family) {
                (SocketAddr::V4(_), AddrFamilyRestrict::V6) => continue,
                (SocketAddr::V6(_), AddrFamilyRestrict::V4) => continue,
                _ => return Ok(sa),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::Other,
            "address resolution failed",
        ))
    }
}

impl FromStr for Endpoint {
    type Err = ConnectionError;

    fn from_str(url: &str) -> Result<Endpoint, ConnectionError> {
        let invalid = || ConnectionError::InvalidEndpoint(url.to_string());
        let split_url: Vec<&str> = url.splitn(2, "://").collect();
        let (scheme, address) = match split_url[..] {
            ["tcp", addr] => (Scheme::Tcp(AddrFamilyRestrict::Either), addr),
            ["tcp4", addr] => (Scheme::Tcp(AddrFamilyRestrict::V4), addr),
            ["tcp6", addr] => (Scheme::Tcp(AddrFamilyRestrict::V6), addr),
            [addr] => (Scheme::Tcp(AddrFamilyRestrict::Either), addr),
            _ => return Err(invalid()),
        };
        let address = address.trim_end_matches('/');
        if address.is_empty() || address.contains('/') {
            return Err(invalid());
        }
        Ok(Endpoint {
            scheme,
            address: address.to_string(),
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = match self.scheme {
            Scheme::Tcp(AddrFamilyRestrict::Either) => "tcp",
            Scheme::Tcp(AddrFamilyRestrict::V4) => "tcp4",
            Scheme::Tcp(AddrFamilyRestrict::V6) => "tcp6",
            Scheme::Loopback => "loopback",
        };
        write!(f, "{}://{}", scheme, self.address)
    }
}

/// Cloneable sending half of a port. Sends are fire-and-forget: no
/// acknowledgment is modeled.
#[derive(Clone)]
pub struct Emitter {
    tx: channel::Sender<Outgoing>,
    waker: Option<Arc<mio::Waker>>,
}

impl Emitter {
    pub fn emit(&self, name: &str, payload: impl Into<Value>) -> Result<(), SendError> {
        let frame = Frame::new(name, payload);
        debug!(event = %frame.name, "emit");
        self.push(Outgoing::Frame(frame))
    }

    fn push(&self, item: Outgoing) -> Result<(), SendError> {
        self.tx.send(item).map_err(|_| SendError::Disconnected)?;
        if let Some(waker) = &self.waker {
            waker.wake().map_err(SendError::IO)?;
        }
        Ok(())
    }
}

/// Opaque port object, encapsulating I/O with an underlying `RawLink`.
pub struct Port {
    emitter: Emitter,
    rx: channel::Receiver<Incoming>,
}

const WAKER_TOKEN: mio::Token = mio::Token(0);
const LINK_TOKEN: mio::Token = mio::Token(1);

impl Port {
    /// Method running the `Port` thread event loop. It bridges `mio` and
    /// `crossbeam::channel`, and it takes care of tx buffering/draining.
    fn poller_thread<LinkT: RawLink + mio::event::Source>(
        mut link: LinkT,
        mut poll: mio::Poll,
        rx: channel::Sender<Incoming>,
        tx: channel::Receiver<Outgoing>,
    ) {
        use crossbeam::channel::TryRecvError;

        let mut events = mio::Events::with_capacity(4);
        let mut needs_draining = false;
        // Set when the tx queue was not read because a frame was still
        // being drained.
        let mut needs_tx_queue_check = false;

        if let Err(e) = poll
            .registry()
            .register(&mut link, LINK_TOKEN, mio::Interest::READABLE)
        {
            warn!(error = %e, "link registration failed");
            let _ = rx.send(Incoming::Disconnected);
            return;
        }
        if rx.send(Incoming::Connected).is_err() {
            return;
        }

        'ioloop: loop {
            if let Err(e) = poll.poll(&mut events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                warn!(error = %e, "poll failed");
                break 'ioloop;
            }

            let mut check_tx_channel = false;

            for event in events.iter() {
                match event.token() {
                    WAKER_TOKEN => {
                        // One or more frames were queued, or the port is shutting down.
                        if needs_draining {
                            needs_tx_queue_check = true;
                        } else {
                            check_tx_channel = true;
                        }
                    }
                    LINK_TOKEN => {
                        if event.is_writable() && needs_draining {
                            match link.drain() {
                                Ok(()) => {
                                    needs_draining = false;
                                    needs_tx_queue_check = true;
                                    if poll
                                        .registry()
                                        .reregister(&mut link, LINK_TOKEN, mio::Interest::READABLE)
                                        .is_err()
                                    {
                                        break 'ioloop;
                                    }
                                }
                                Err(SendError::MustDrain) => {
                                    // Must keep trying, do nothing
                                }
                                Err(e) => {
                                    debug!(error = %e, "drain failed");
                                    break 'ioloop;
                                }
                            }
                        }
                        loop {
                            match link.recv() {
                                Ok(frame) => {
                                    if rx.send(Incoming::Event(frame)).is_err() {
                                        break 'ioloop;
                                    }
                                }
                                Err(RecvError::NotReady) => break,
                                Err(RecvError::Protocol(e)) => {
                                    if rx.send(Incoming::Error(e)).is_err() {
                                        break 'ioloop;
                                    }
                                }
                                Err(e) => {
                                    debug!(error = %e, "link closed");
                                    break 'ioloop;
                                }
                            }
                        }
                    }
                    mio::Token(x) => {
                        debug!(token = x, "unexpected token");
                    }
                }
            }

            if !needs_draining && needs_tx_queue_check {
                check_tx_channel = true;
                needs_tx_queue_check = false;
            }

            if check_tx_channel {
                loop {
                    match tx.try_recv() {
                        Ok(Outgoing::Frame(frame)) => match link.send(&frame) {
                            Ok(()) => {}
                            Err(SendError::MustDrain) => {
                                needs_draining = true;
                                if poll
                                    .registry()
                                    .reregister(
                                        &mut link,
                                        LINK_TOKEN,
                                        mio::Interest::READABLE.add(mio::Interest::WRITABLE),
                                    )
                                    .is_err()
                                {
                                    break 'ioloop;
                                }
                                // The rest of the queue waits for the drain.
                                break;
                            }
                            Err(SendError::Serialization(e)) => {
                                warn!(event = %frame.name, error = %e, "dropping outgoing frame");
                            }
                            Err(e) => {
                                debug!(error = %e, "send failed");
                                break 'ioloop;
                            }
                        },
                        Ok(Outgoing::Shutdown) => break 'ioloop,
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => break 'ioloop,
                    }
                }
            }
        }

        let _ = rx.send(Incoming::Disconnected);
    }

    /// Create a `Port` from a `RawLink`, spawning its thread.
    fn from_raw<LinkT: RawLink + mio::event::Source + Send + 'static>(
        link: LinkT,
    ) -> io::Result<Port> {
        let (tx, ttx) = channel::unbounded::<Outgoing>();
        let (rrx, rx) = channel::unbounded::<Incoming>();
        let poll = mio::Poll::new()?;
        let waker = Arc::new(mio::Waker::new(poll.registry(), WAKER_TOKEN)?);
        thread::Builder::new()
            .name("livelog-port".to_string())
            .spawn(move || Port::poller_thread(link, poll, rrx, ttx))?;
        Ok(Port {
            emitter: Emitter {
                tx,
                waker: Some(waker),
            },
            rx,
        })
    }

    /// Connects to `endpoint`, waiting at most `timeout` for the connection
    /// to be established. The first item received is always `Incoming::Connected`.
    pub fn open(endpoint: &Endpoint, timeout: Duration) -> Result<Port, ConnectionError> {
        let unreachable = |source: io::Error| ConnectionError::Unreachable {
            endpoint: endpoint.to_string(),
            source,
        };
        if endpoint.scheme == Scheme::Loopback {
            return Err(ConnectionError::InvalidEndpoint(endpoint.to_string()));
        }
        let addr = endpoint.resolve().map_err(unreachable)?;
        let stream = std::net::TcpStream::connect_timeout(&addr, timeout).map_err(unreachable)?;
        let link = tcp::Link::from_std(stream).map_err(unreachable)?;
        Port::from_raw(link).map_err(unreachable)
    }

    /// Creates a port with no I/O behind it, and the `Peer` that plays the
    /// server's role for it.
    pub fn loopback() -> (Port, Peer) {
        let (tx, ttx) = channel::unbounded::<Outgoing>();
        let (rrx, rx) = channel::unbounded::<Incoming>();
        let port = Port {
            emitter: Emitter { tx, waker: None },
            rx,
        };
        (port, Peer { rx: rrx, tx: ttx })
    }

    pub fn emitter(&self) -> Emitter {
        self.emitter.clone()
    }

    pub fn try_recv(&self) -> Result<Incoming, channel::TryRecvError> {
        self.rx.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Incoming, channel::RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

impl Drop for Port {
    fn drop(&mut self) {
        // Emitter clones may outlive the port; the thread has to be told.
        let _ = self.emitter.push(Outgoing::Shutdown);
    }
}

/// The far end of a loopback `Port`.
pub struct Peer {
    rx: channel::Sender<Incoming>,
    tx: channel::Receiver<Outgoing>,
}

impl Peer {
    /// Signals connection establishment to the port.
    pub fn connect(&self) {
        let _ = self.rx.send(Incoming::Connected);
    }

    /// Pushes an event to the port.
    pub fn send(&self, name: &str, payload: impl Into<Value>) {
        let _ = self.rx.send(Incoming::Event(Frame::new(name, payload)));
    }

    /// Pushes raw wire bytes through the frame decoder, as the TCP link would.
    pub fn send_raw(&self, raw: &[u8]) {
        let mut rest = raw;
        loop {
            match Frame::deserialize(rest) {
                Ok((frame, size)) => {
                    let _ = self.rx.send(Incoming::Event(frame));
                    rest = &rest[size..];
                }
                Err(frame::Error::NeedMore) => break,
                Err(e) => {
                    let size = match &e {
                        frame::Error::TooBig(size) | frame::Error::Malformed { size, .. } => *size,
                        frame::Error::NeedMore => 0,
                    };
                    let _ = self.rx.send(Incoming::Error(e));
                    rest = &rest[size.min(rest.len())..];
                }
            }
        }
    }

    pub fn disconnect(&self) {
        let _ = self.rx.send(Incoming::Disconnected);
    }

    /// Frames emitted by the port since the last call.
    pub fn sent(&self) -> Vec<Frame> {
        self.tx
            .try_iter()
            .filter_map(|item| match item {
                Outgoing::Frame(frame) => Some(frame),
                Outgoing::Shutdown => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_parsing() {
        let ep: Endpoint = "tcp://localhost:5000".parse().unwrap();
        assert_eq!(ep.to_string(), "tcp://localhost:5000");
        assert_eq!(ep.address(), "localhost:5000");

        let ep: Endpoint = "127.0.0.1:7000".parse().unwrap();
        assert_eq!(ep.to_string(), "tcp://127.0.0.1:7000");

        let ep: Endpoint = "tcp4://localhost/".parse().unwrap();
        assert_eq!(ep.to_string(), "tcp4://localhost");

        assert!("http://localhost:5000".parse::<Endpoint>().is_err());
        assert!("tcp://".parse::<Endpoint>().is_err());
        assert!("tcp://host/path".parse::<Endpoint>().is_err());
    }

    #[test]
    fn resolve_appends_default_port() {
        let ep: Endpoint = "tcp4://127.0.0.1".parse().unwrap();
        assert_eq!(ep.resolve().unwrap().port(), DEFAULT_PORT);
        let ep: Endpoint = "tcp://127.0.0.1:6001".parse().unwrap();
        assert_eq!(ep.resolve().unwrap().port(), 6001);
    }

    #[test]
    fn loopback_endpoint_cannot_open() {
        let ep = Endpoint::loopback("test");
        assert_eq!(ep.to_string(), "loopback://test");
        assert!(matches!(
            Port::open(&ep, DEFAULT_CONNECT_TIMEOUT),
            Err(ConnectionError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn loopback_carries_both_directions() {
        let (port, peer) = Port::loopback();
        peer.connect();
        peer.send("app_log", "hi");
        assert!(matches!(port.try_recv(), Ok(Incoming::Connected)));
        match port.try_recv() {
            Ok(Incoming::Event(frame)) => assert_eq!(frame, Frame::new("app_log", "hi")),
            other => panic!("unexpected {:?}", other),
        }
        port.emitter().emit("startup", "loopback://test").unwrap();
        assert_eq!(peer.sent(), vec![Frame::new("startup", "loopback://test")]);
    }

    #[test]
    fn send_raw_reports_bad_lines_and_continues() {
        let (port, peer) = Port::loopback();
        peer.send_raw(b"garbage\n[\"app_log\",\"ok\"]\n");
        assert!(matches!(port.try_recv(), Ok(Incoming::Error(_))));
        assert!(matches!(port.try_recv(), Ok(Incoming::Event(_))));
        assert!(port.try_recv().is_err());
    }
}
