// SPDX-License-Identifier: BSD-3-Clause

//! A live handler binding for one `conn_id`. The direct translation of
//! `connection.go`'s `Connection.Run` select loop, with a handler panic
//! contained here instead of being allowed to take the whole server down.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, Sender};
use log::warn;

use protocol::{InPacket, OutPacket};

use crate::handler::Handler;

const INBOX_CAPACITY: usize = 100;
const HANDLER_OUTBOX_CAPACITY: usize = 1000;

pub struct Connection {
    conn_id: u16,
    inbox: Sender<InPacket>,
    control: Sender<()>,
    join: Option<JoinHandle<()>>,
}

impl Connection {
    /// Spawns the connection's thread, calls `handler.init`, and starts
    /// servicing its inbox and handler outbox. `server_out` is the
    /// `Server`'s shared outbound queue; every packet the handler produces
    /// is stamped with this connection's id before being forwarded there.
    pub fn spawn(conn_id: u16, mut handler: Box<dyn Handler>, server_out: Sender<OutPacket>) -> Self {
        let (inbox_tx, inbox_rx) = bounded::<InPacket>(INBOX_CAPACITY);
        let (handler_out_tx, handler_out_rx) = bounded(HANDLER_OUTBOX_CAPACITY);
        let (control_tx, control_rx) = bounded::<()>(1);

        handler.init(handler_out_tx);

        let join = thread::spawn(move || {
            loop {
                select! {
                    recv(control_rx) -> _ => break,
                    recv(inbox_rx) -> msg => {
                        let Ok(packet) = msg else { break };
                        let result = catch_unwind(AssertUnwindSafe(|| handler.handle_packet(packet)));
                        if result.is_err() {
                            warn!("handler on conn {conn_id} panicked, tearing down connection");
                            break;
                        }
                    }
                    recv(handler_out_rx) -> msg => {
                        let Ok(out) = msg else { continue };
                        let packet = OutPacket {
                            conn_id,
                            packet_id: 0,
                            packet_type: out.packet_type,
                            data: out.data,
                        };
                        if server_out.send(packet).is_err() {
                            break;
                        }
                    }
                }
            }
            let _ = catch_unwind(AssertUnwindSafe(|| handler.quit()));
        });

        Self {
            conn_id,
            inbox: inbox_tx,
            control: control_tx,
            join: Some(join),
        }
    }

    pub fn conn_id(&self) -> u16 {
        self.conn_id
    }

    /// Forwards `packet` to the connection's inbox. Returns `false` if the
    /// connection's thread has already exited (e.g. after a handler panic),
    /// in which case the caller should evict it from the registry.
    pub fn send(&self, packet: InPacket) -> bool {
        self.inbox.send(packet).is_ok()
    }

    pub fn shutdown(&mut self) {
        let _ = self.control.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shutdown();
    }
}
