// SPDX-License-Identifier: BSD-3-Clause

//! The router at the center of the protocol engine: tracks session state,
//! assigns outbound packet ids, answers `Resend` requests, and dispatches
//! inbound packets either to control-plane handling or to a connection.
//! The translation of `server.go`'s `Server.processPacket`.

use std::collections::HashMap;

use crossbeam_channel::{select, Receiver, Sender};
use log::{info, warn};

use protocol::{hello, Framer, InPacket, OutPacket, PacketFlags, PacketType};
use transport::Transport;

use crate::connection::Connection;
use crate::handler::HandlerFactory;
use crate::replay::ReplayRing;

const REPLAY_CAPACITY: usize = 100;
const OUTBOX_CAPACITY: usize = 1000;

/// Distance, in wrapped 16-bit sequence space, beyond which an incoming id
/// is treated as stale rather than a forward gap.
const GAP_WINDOW: u16 = 0x8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Disconnected,
    Connected,
}

pub struct Server<T: Transport> {
    transport: T,
    framer: Framer,
    factory: HandlerFactory,
    state: State,
    next_out_packet_id: u16,
    last_in_packet_id: u16,
    connections: HashMap<u16, Connection>,
    ring: ReplayRing,
    out_tx: Sender<OutPacket>,
    out_rx: Receiver<OutPacket>,
}

impl<T: Transport> Server<T> {
    pub fn new(transport: T, factory: HandlerFactory) -> Self {
        let (out_tx, out_rx) = crossbeam_channel::bounded(OUTBOX_CAPACITY);
        Self {
            transport,
            framer: Framer::new(),
            factory,
            state: State::Disconnected,
            next_out_packet_id: 1,
            last_in_packet_id: 0,
            connections: HashMap::new(),
            ring: ReplayRing::new(REPLAY_CAPACITY),
            out_tx,
            out_rx,
        }
    }

    /// Runs the router loop forever. Returns only when the transport's read
    /// channel disconnects (the transport was closed).
    pub fn run(&mut self) {
        let read_rx = self.transport.read_chan();
        loop {
            select! {
                recv(read_rx) -> msg => {
                    let Ok(buf) = msg else {
                        info!("transport closed, stopping server");
                        return;
                    };
                    let packets = self.framer.process(&buf);
                    for packet in packets {
                        self.handle_inbound(packet);
                    }
                }
                recv(self.out_rx) -> msg => {
                    let Ok(packet) = msg else { continue };
                    self.dispatch_out(packet);
                }
            }
        }
    }

    fn handle_inbound(&mut self, packet: InPacket) {
        if !packet.is_resend() {
            self.track_packet_id(packet.packet_id);
        }

        if packet.conn_id == 0 {
            self.handle_control(packet);
        } else {
            self.route(packet);
        }
    }

    fn track_packet_id(&mut self, packet_id: u16) {
        let expected = self.last_in_packet_id.wrapping_add(1);
        let gap = packet_id.wrapping_sub(expected);
        if gap != 0 && gap < GAP_WINDOW {
            let mut missing = expected;
            while missing != packet_id {
                self.send_control(PacketType::Resend, &missing.to_be_bytes());
                missing = missing.wrapping_add(1);
            }
        }
        self.last_in_packet_id = packet_id;
    }

    fn handle_control(&mut self, packet: InPacket) {
        match (self.state, packet.packet_type) {
            (_, PacketType::Init) => self.on_init(),
            (State::Connected, PacketType::Shutdown) => self.on_shutdown(),
            (State::Connected, PacketType::Ping) => self.send_control(PacketType::Pong, &[]),
            (State::Connected, PacketType::Resend) => self.on_resend(&packet.data),
            _ => {}
        }
    }

    fn on_init(&mut self) {
        self.state = State::Connected;
        self.next_out_packet_id = 1;
        self.last_in_packet_id = 1;
        self.ring.clear();
        for (_, mut conn) in self.connections.drain() {
            conn.shutdown();
        }

        let payload = hello::encode_hello(&self.factory.descriptions());
        self.send_control(PacketType::Hello, &payload);
    }

    fn on_shutdown(&mut self) {
        self.send_control(PacketType::Goodbye, &[]);
        self.state = State::Disconnected;
        for (_, mut conn) in self.connections.drain() {
            conn.shutdown();
        }
    }

    fn on_resend(&mut self, data: &[u8]) {
        if data.len() < 2 {
            return;
        }
        let packet_id = u16::from_be_bytes([data[0], data[1]]);
        if let Some(packet) = self.ring.find(packet_id).cloned() {
            self.emit(&packet, true);
        }
    }

    fn route(&mut self, packet: InPacket) {
        let conn_id = packet.conn_id;

        if let Some(conn) = self.connections.get(&conn_id) {
            if packet.packet_type == PacketType::Disconnect {
                if let Some(mut conn) = self.connections.remove(&conn_id) {
                    conn.shutdown();
                }
                self.send_control_on(conn_id, PacketType::Disconnected, &[]);
            } else if !conn.send(packet) {
                warn!("connection {conn_id} is gone, evicting");
                self.connections.remove(&conn_id);
            }
            return;
        }

        match packet.packet_type {
            PacketType::Connect => self.on_connect(conn_id, &packet.data),
            PacketType::Disconnect => {}
            _ => self.send_control_on(conn_id, PacketType::NoConnection, &[]),
        }
    }

    fn on_connect(&mut self, conn_id: u16, data: &[u8]) {
        if data.len() < 2 {
            self.send_control_on(conn_id, PacketType::NoHandler, &[]);
            return;
        }
        let handler_id = u16::from_be_bytes([data[0], data[1]]);

        match self.factory.create(handler_id) {
            Some(handler) => {
                let conn = Connection::spawn(conn_id, handler, self.out_tx.clone());
                self.connections.insert(conn_id, conn);
                self.send_control_on(conn_id, PacketType::Connected, &[]);
            }
            None => self.send_control_on(conn_id, PacketType::NoHandler, &[]),
        }
    }

    fn send_control(&mut self, packet_type: PacketType, payload: &[u8]) {
        self.send_control_on(0, packet_type, payload);
    }

    fn send_control_on(&mut self, conn_id: u16, packet_type: PacketType, payload: &[u8]) {
        self.dispatch_out(OutPacket {
            conn_id,
            packet_id: 0,
            packet_type,
            data: payload.to_vec(),
        });
    }

    fn dispatch_out(&mut self, mut packet: OutPacket) {
        packet.packet_id = self.next_out_packet_id;
        self.next_out_packet_id = self.next_out_packet_id.wrapping_add(1);
        self.ring.push(packet.clone());
        self.emit(&packet, false);
    }

    fn emit(&mut self, packet: &OutPacket, resend: bool) {
        let flags = if resend {
            PacketFlags::RESEND
        } else {
            PacketFlags::empty()
        };
        let frame = protocol::sender::encode_frame(
            packet.packet_type,
            flags,
            packet.conn_id,
            packet.packet_id,
            &packet.data,
        );
        self.transport.write(frame);
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::handler::{Handler, HandlerOutPacket};

    struct EchoHandler {
        out: Option<Sender<HandlerOutPacket>>,
    }

    impl Handler for EchoHandler {
        fn init(&mut self, out: Sender<HandlerOutPacket>) {
            self.out = Some(out);
        }

        fn handle_packet(&mut self, packet: InPacket) {
            if let Some(out) = &self.out {
                let _ = out.send(HandlerOutPacket {
                    packet_type: PacketType::Data,
                    data: packet.data,
                });
            }
        }

        fn quit(&mut self) {}
    }

    fn next_frame(framer: &mut Framer, rx: &Receiver<Vec<u8>>) -> InPacket {
        loop {
            let buf = rx.recv_timeout(Duration::from_secs(1)).unwrap();
            let packets = framer.process(&buf);
            if let Some(p) = packets.into_iter().next() {
                return p;
            }
        }
    }

    #[test]
    fn init_yields_a_hello_naming_registered_handlers() {
        let (server_side, remote_side) = transport::pipe::duplex().unwrap();

        let mut factory = HandlerFactory::new();
        factory.register(1, "ECHO", || Box::new(EchoHandler { out: None }));

        let mut server = Server::new(server_side, factory);
        thread::spawn(move || server.run());

        let remote_read = remote_side.read_chan();
        let init = protocol::sender::encode_frame(PacketType::Init, PacketFlags::empty(), 0, 1, &[]);
        remote_side.write(init);

        let mut framer = Framer::new();
        let hello = next_frame(&mut framer, &remote_read);
        assert_eq!(hello.packet_type, PacketType::Hello);
        assert_eq!(&hello.data[0..2], &1u16.to_be_bytes());
    }

    #[test]
    fn connect_to_a_registered_handler_replies_connected_and_echoes() {
        let (server_side, remote_side) = transport::pipe::duplex().unwrap();

        let mut factory = HandlerFactory::new();
        factory.register(1, "ECHO", || Box::new(EchoHandler { out: None }));

        let mut server = Server::new(server_side, factory);
        thread::spawn(move || server.run());

        let remote_read = remote_side.read_chan();
        let mut framer = Framer::new();

        remote_side.write(protocol::sender::encode_frame(
            PacketType::Init,
            PacketFlags::empty(),
            0,
            1,
            &[],
        ));
        let hello = next_frame(&mut framer, &remote_read);
        assert_eq!(hello.packet_type, PacketType::Hello);

        remote_side.write(protocol::sender::encode_frame(
            PacketType::Connect,
            PacketFlags::empty(),
            5,
            2,
            &1u16.to_be_bytes(),
        ));
        let connected = next_frame(&mut framer, &remote_read);
        assert_eq!(connected.packet_type, PacketType::Connected);
        assert_eq!(connected.conn_id, 5);

        remote_side.write(protocol::sender::encode_frame(
            PacketType::Data,
            PacketFlags::empty(),
            5,
            3,
            b"hi",
        ));
        let echoed = next_frame(&mut framer, &remote_read);
        assert_eq!(echoed.packet_type, PacketType::Data);
        assert_eq!(echoed.data, b"hi");
    }

    #[test]
    fn connect_to_an_unregistered_handler_replies_no_handler() {
        let (server_side, remote_side) = transport::pipe::duplex().unwrap();
        let mut server = Server::new(server_side, HandlerFactory::new());
        thread::spawn(move || server.run());

        let remote_read = remote_side.read_chan();
        let mut framer = Framer::new();

        remote_side.write(protocol::sender::encode_frame(
            PacketType::Init,
            PacketFlags::empty(),
            0,
            1,
            &[],
        ));
        next_frame(&mut framer, &remote_read);

        remote_side.write(protocol::sender::encode_frame(
            PacketType::Connect,
            PacketFlags::empty(),
            9,
            2,
            &99u16.to_be_bytes(),
        ));
        let reply = next_frame(&mut framer, &remote_read);
        assert_eq!(reply.packet_type, PacketType::NoHandler);
    }
}
