// SPDX-License-Identifier: BSD-3-Clause

//! An in-process duplex byte pipe, built with `socketpair(2)`, for testing
//! anything that would otherwise need a real serial port.

use std::io;

use nix::sys::socket::{socketpair, AddressFamily, SockFlag, SockType};

pub struct Endpoint {
    fd: std::os::fd::OwnedFd,
}

pub fn pipe() -> io::Result<(Endpoint, Endpoint)> {
    let (a, b) = socketpair(
        AddressFamily::Unix,
        SockType::Stream,
        None,
        SockFlag::empty(),
    )?;

    Ok((Endpoint { fd: a }, Endpoint { fd: b }))
}

impl io::Read for Endpoint {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(nix::unistd::read(&self.fd, buf)?)
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn bytes_written_to_one_end_are_read_from_the_other() {
        let (mut a, mut b) = pipe().unwrap();
        a.write_all(b"hello").unwrap();

        let mut buf = [0u8; 5];
        b.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }
}
