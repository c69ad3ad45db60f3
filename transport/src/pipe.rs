// SPDX-License-Identifier: BSD-3-Clause

//! An in-process duplex transport built on `socketpair(2)`, for exercising
//! the session layer and handlers without a real serial device.

use std::io;
use std::os::fd::OwnedFd;
use std::sync::Arc;
use std::time::Duration;

use nix::sys::socket::{setsockopt, socketpair, sockopt, AddressFamily, SockFlag, SockType};
use nix::sys::time::{TimeVal, TimeValLike};
use nix::unistd::dup;

use crate::buffer_pool::BufferPool;
use crate::threaded::ThreadedTransport;

const READ_TIMEOUT: Duration = Duration::from_millis(100);

pub struct Endpoint {
    fd: OwnedFd,
}

impl io::Read for Endpoint {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match nix::unistd::read(&self.fd, buf) {
            Ok(n) => Ok(n),
            Err(nix::errno::Errno::EAGAIN) => Err(io::ErrorKind::TimedOut.into()),
            Err(e) => Err(e.into()),
        }
    }
}

impl io::Write for Endpoint {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(nix::unistd::write(&self.fd, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Returns two independently-clonable transports wired to opposite ends of
/// the same socketpair: writes on one arrive as reads on the other.
pub fn duplex() -> io::Result<(ThreadedTransport, ThreadedTransport)> {
    let (fd_a, fd_b) = socketpair(
        AddressFamily::Unix,
        SockType::Stream,
        None,
        SockFlag::empty(),
    )?;
    let read_timeout = TimeVal::milliseconds(READ_TIMEOUT.as_millis() as i64);
    setsockopt(&fd_a, sockopt::ReceiveTimeout, &read_timeout)?;
    setsockopt(&fd_b, sockopt::ReceiveTimeout, &read_timeout)?;

    let a_reader = Endpoint { fd: dup(&fd_a)? };
    let b_reader = Endpoint { fd: dup(&fd_b)? };
    let a_writer = Endpoint { fd: fd_a };
    let b_writer = Endpoint { fd: fd_b };

    let side_a = ThreadedTransport::spawn(a_reader, b_writer, Arc::new(BufferPool::default()));
    let side_b = ThreadedTransport::spawn(b_reader, a_writer, Arc::new(BufferPool::default()));

    Ok((side_a, side_b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Transport;
    use std::time::Duration;

    #[test]
    fn bytes_written_on_one_side_arrive_on_the_other() {
        let (a, b) = duplex().unwrap();
        a.write(b"hello".to_vec());

        let rx = b.read_chan();
        let buf = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(buf, b"hello");
    }
}
