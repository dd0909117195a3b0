//! Client/server message-passing comm: wire framing, transport, the
//! correlation dispatch table, the comm service with its listener loop,
//! and the request API.

pub mod dispatch;
pub mod requests;
pub mod responses;
pub mod service;
pub mod transport;
pub mod wire;
