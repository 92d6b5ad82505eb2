//! Callback driven websocket endpoint for push style transports.
//!
//! The crate never reads from a socket. The application owns the byte
//! stream behind the [Transport](transport::Transport) trait, forwards
//! inbound chunks to
//! [WsConnection::receive_data](connection::WsConnection::receive_data) and
//! receives decoded messages through its [WsHandler](handler::WsHandler).

pub mod connection;
pub mod frame;
pub mod handler;
pub mod handshake;
pub mod http;
pub mod transport;
