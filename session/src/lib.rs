// SPDX-License-Identifier: BSD-3-Clause

//! The session layer: packet-multiplexed connections over a single framed
//! transport, reliable delivery via packet-id gap detection and a replay
//! ring, and the handler registry that backs the `Connect` handshake.

pub mod connection;
pub mod handler;
pub mod replay;
pub mod server;

pub use connection::Connection;
pub use handler::{Handler, HandlerFactory, HandlerOutPacket};
pub use server::Server;
