// SPDX-License-Identifier: BSD-3-Clause

//! Opens a real serial device and wires it into a [`ThreadedTransport`],
//! translating `serialremote.go`'s `Open()`.

use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::buffer_pool::BufferPool;
use crate::threaded::ThreadedTransport;
use crate::Error;

/// How long a blocking read waits before returning, so the reader thread can
/// notice a shutdown request.
const READ_TIMEOUT: Duration = Duration::from_millis(200);

pub fn open(device: &str, baud: u32) -> Result<ThreadedTransport, Error> {
    let port = serialport::new(device, baud)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .timeout(READ_TIMEOUT)
        .open()
        .map_err(Error::Serial)?;

    let writer = port.try_clone().map_err(Error::Serial)?;

    info!("opened serial device {device} at {baud} baud");

    Ok(ThreadedTransport::spawn(
        port,
        writer,
        Arc::new(BufferPool::default()),
    ))
}
