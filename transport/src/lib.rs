// SPDX-License-Identifier: BSD-3-Clause

//! The byte-level link to the remote computer. A [`Transport`] is a pair of
//! channels -- inbound buffers as they arrive, outbound buffers queued for
//! send -- backed by one reader thread and one writer thread, the same shape
//! `serialremote.go` used for its serial port.

pub mod buffer_pool;
pub mod pipe;
pub mod serial;
pub mod threaded;

pub use buffer_pool::BufferPool;
pub use threaded::ThreadedTransport;

use std::fmt;

use crossbeam_channel::Receiver;

/// A channel-based byte link. Implementations own their I/O threads and stop
/// them on `close` or `Drop`, whichever comes first.
pub trait Transport: Send {
    /// A receiver of raw buffers as they arrive. Cloning it is cheap; every
    /// clone sees every buffer (`crossbeam_channel`'s MPMC semantics), so
    /// only one reader should actually be draining it at a time.
    fn read_chan(&self) -> Receiver<Vec<u8>>;

    /// Queues `data` for transmission. Silently dropped if the writer
    /// thread has already stopped.
    fn write(&self, data: Vec<u8>);

    /// Stops the reader and writer threads and waits for them to exit.
    /// Idempotent.
    fn close(&mut self);
}

#[derive(Debug)]
pub enum Error {
    Serial(serialport::Error),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial(e) => write!(f, "serial port error: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
