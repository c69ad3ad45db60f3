// SPDX-License-Identifier: BSD-3-Clause

//! Turns a blocking `Read + Write` byte stream into a channel-based
//! [`Transport`], one OS thread for reading and one for writing, the way
//! `serialremote.go`'s `reader()`/`writer()` goroutines did.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use log::{debug, warn};

use crate::buffer_pool::BufferPool;
use crate::Transport;

const WRITE_PACING: Duration = Duration::from_millis(10);

/// Spawns a reader thread and a writer thread over a pair of stream handles
/// and exposes them as bounded channels.
pub struct ThreadedTransport {
    read_rx: Receiver<Vec<u8>>,
    write_tx: Sender<Vec<u8>>,
    quit_tx: Sender<()>,
    running: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl ThreadedTransport {
    /// `reader`/`writer` are usually two handles onto the same underlying
    /// device (e.g. `SerialPort::try_clone`), but any pair of independent
    /// `Read`/`Write` endpoints works, which is what makes this reusable for
    /// the in-process test pipe as well as a real serial port. `reader` must
    /// have a read timeout set -- [`ThreadedTransport::close`] stops the
    /// reader thread by flipping a flag it only rechecks between reads, not
    /// by interrupting a blocking call.
    pub fn spawn<R, W>(mut reader: R, mut writer: W, pool: Arc<BufferPool>) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let (read_tx, read_rx) = bounded::<Vec<u8>>(10);
        let (write_tx, write_rx) = bounded::<Vec<u8>>(100);
        let (quit_tx, quit_rx) = bounded::<()>(1);
        let running = Arc::new(AtomicBool::new(true));

        let reader_running = running.clone();
        let reader_handle = thread::spawn(move || {
            while reader_running.load(Ordering::Relaxed) {
                let mut buf = pool.alloc();
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        buf.truncate(n);
                        if read_tx.send(buf).is_err() {
                            break;
                        }
                    }
                    Err(e) if is_retryable(&e) => continue,
                    Err(e) => {
                        debug!("transport reader stopping: {e}");
                        break;
                    }
                }
            }
        });

        let writer_handle = thread::spawn(move || loop {
            select! {
                recv(quit_rx) -> _ => return,
                recv(write_rx) -> msg => {
                    let Ok(buf) = msg else { return };
                    if let Err(e) = writer.write_all(&buf) {
                        warn!("transport writer failed: {e}");
                        return;
                    }
                    thread::sleep(WRITE_PACING);
                }
            }
        });

        Self {
            read_rx,
            write_tx,
            quit_tx,
            running,
            reader: Some(reader_handle),
            writer: Some(writer_handle),
        }
    }
}

fn is_retryable(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock)
}

impl Transport for ThreadedTransport {
    fn read_chan(&self) -> Receiver<Vec<u8>> {
        self.read_rx.clone()
    }

    fn write(&self, data: Vec<u8>) {
        let _ = self.write_tx.send(data);
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        let _ = self.quit_tx.send(());
        if let Some(h) = self.writer.take() {
            let _ = h.join();
        }
        if let Some(h) = self.reader.take() {
            let _ = h.join();
        }
    }
}

impl Drop for ThreadedTransport {
    fn drop(&mut self) {
        self.close();
    }
}
