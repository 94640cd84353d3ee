//! TCP link
//!
//! Implements a `RawLink` for a TCP stream, and an MIO event source.
//! Frames are newline terminated, so the receiving side splits the byte
//! stream on `\n` and the sending side must never interleave two frames.

use super::frame::{self, Frame};
use super::iobuf::IOBuf;
use super::port::{RawLink, RecvError, SendError};
use mio::net::TcpStream;
use std::io;
use std::io::Write;

/// RawLink to communicate via TCP
pub struct Link {
    stream: TcpStream,
    /// Incoming buffer, holds partial lines.
    rxbuf: IOBuf,
    /// Outgoing buffer, used for all-or-none sends of frames
    /// when the TCP buffer fills up.
    txbuf: IOBuf,
}

impl Link {
    /// Takes ownership of an already connected `std::net::TcpStream`.
    pub fn from_std(stream: std::net::TcpStream) -> Result<Link, io::Error> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok(Link {
            stream: TcpStream::from_std(stream),
            rxbuf: IOBuf::new(),
            txbuf: IOBuf::new(),
        })
    }

    /// Attempts to receive a frame only from the data currently buffered.
    fn recv_buffered(&mut self) -> Result<Frame, RecvError> {
        match Frame::deserialize(self.rxbuf.data()) {
            Ok((frame, size)) => {
                self.rxbuf.consume(size);
                Ok(frame)
            }
            Err(frame::Error::NeedMore) => Err(RecvError::NotReady),
            Err(err) => {
                match &err {
                    frame::Error::TooBig(size) => self.rxbuf.consume(*size),
                    frame::Error::Malformed { size, .. } => self.rxbuf.consume(*size),
                    frame::Error::NeedMore => {}
                }
                Err(RecvError::Protocol(err))
            }
        }
    }
}

impl RawLink for Link {
    fn recv(&mut self) -> Result<Frame, RecvError> {
        // Readiness is edge triggered: keep reading until the socket
        // would block or a full frame is buffered.
        loop {
            match self.recv_buffered() {
                Err(RecvError::NotReady) => self.rxbuf.refill(&mut self.stream)?,
                res => return res,
            }
        }
    }

    fn send(&mut self, frame: &Frame) -> Result<(), SendError> {
        if self.has_data_to_drain() {
            return Err(SendError::Full);
        }

        let raw = frame.serialize().map_err(SendError::Serialization)?;
        match self.stream.write(&raw) {
            Ok(size) if size == raw.len() => Ok(()),
            Ok(size) => {
                // Partial write, the TCP buffer is full. The rest of the frame
                // must go out before anything else.
                self.add_pending(&raw[size..])?;
                Err(SendError::MustDrain)
            }
            Err(err) => match err.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::NotConnected => {
                    self.add_pending(&raw)?;
                    Err(SendError::MustDrain)
                }
                _ => Err(SendError::IO(err)),
            },
        }
    }

    fn drain(&mut self) -> Result<(), SendError> {
        self.txbuf.drain(&mut self.stream)
    }

    fn has_data_to_drain(&self) -> bool {
        !self.txbuf.empty()
    }
}

impl Link {
    /// `txbuf` holds a full frame by construction, so this only fails if
    /// `serialize` let an oversized frame through.
    fn add_pending(&mut self, data: &[u8]) -> Result<(), SendError> {
        self.txbuf
            .add_data(data)
            .map_err(|_| SendError::Serialization(frame::Error::TooBig(data.len())))
    }
}

impl mio::event::Source for Link {
    fn register(
        &mut self,
        registry: &mio::Registry,
        token: mio::Token,
        interests: mio::Interest,
    ) -> io::Result<()> {
        self.stream.register(registry, token, interests)
    }

    fn reregister(
        &mut self,
        registry: &mio::Registry,
        token: mio::Token,
        interests: mio::Interest,
    ) -> io::Result<()> {
        self.stream.reregister(registry, token, interests)
    }

    fn deregister(&mut self, registry: &mio::Registry) -> io::Result<()> {
        self.stream.deregister(registry)
    }
}
