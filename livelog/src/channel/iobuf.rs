//! Internal buffer for the stream transport.

use super::frame::MAX_FRAME_SIZE;
use super::port::{RecvError, SendError};
use std::io;

/// Buffer used by the TCP link to split the incoming byte stream into
/// lines and to keep the unsent tail of a partially written frame.
pub struct IOBuf {
    /// Valid data (possibly none) is delimited by `start` and `end`.
    buf: Vec<u8>,
    start: usize,
    end: usize,
}

impl IOBuf {
    /// Returns an empty `IOBuf` able to hold one full frame.
    pub fn new() -> IOBuf {
        IOBuf {
            buf: vec![0; MAX_FRAME_SIZE],
            start: 0,
            end: 0,
        }
    }

    pub fn empty(&self) -> bool {
        self.start == self.end
    }

    /// Amount of buffered data, in bytes.
    pub fn size(&self) -> usize {
        self.end - self.start
    }

    pub fn data(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }

    /// Discards `len` bytes off the front. Consuming more than `size()`
    /// discards everything.
    pub fn consume(&mut self, len: usize) {
        self.start += len.min(self.size());
        if self.empty() {
            self.flush();
        }
    }

    /// Discards the entire content of the buffer.
    pub fn flush(&mut self) {
        self.start = 0;
        self.end = 0;
    }

    /// Moves the data internally to the start of the buffer.
    fn compact(&mut self) {
        if self.start != 0 {
            let len = self.size();
            self.buf.copy_within(self.start..self.end, 0);
            self.start = 0;
            self.end = len;
        }
    }

    /// Refills the buffer as much as possible from `reader`.
    pub fn refill<T: io::Read>(&mut self, reader: &mut T) -> Result<(), RecvError> {
        self.compact();
        if self.end == self.buf.len() {
            // Full without a complete frame; the frame parser reports it.
            return Err(RecvError::NotReady);
        }
        match reader.read(&mut self.buf[self.end..]) {
            Ok(0) => Err(RecvError::Disconnected),
            Ok(size) => {
                self.end += size;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(RecvError::NotReady),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(()),
            Err(e) => Err(RecvError::IO(e)),
        }
    }

    /// Appends as much of `data` as fits. Returns `Ok` if all of it was
    /// appended, otherwise the number of bytes that were.
    pub fn add_data(&mut self, data: &[u8]) -> Result<(), usize> {
        self.compact();
        let copy_size = std::cmp::min(self.buf.len() - self.end, data.len());
        self.buf[self.end..self.end + copy_size].copy_from_slice(&data[..copy_size]);
        self.end += copy_size;
        if copy_size == data.len() {
            Ok(())
        } else {
            Err(copy_size)
        }
    }

    /// Writes as much of the buffered data as possible to `writer`.
    pub fn drain<T: io::Write>(&mut self, writer: &mut T) -> Result<(), SendError> {
        if self.empty() {
            return Ok(());
        }
        match writer.write(&self.buf[self.start..self.end]) {
            Ok(size) => {
                self.consume(size);
                if self.empty() {
                    Ok(())
                } else {
                    Err(SendError::MustDrain)
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(SendError::MustDrain),
            Err(e) => Err(SendError::IO(e)),
        }
    }
}
