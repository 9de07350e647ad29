//! Real-time fan-out: connection registry, dispatcher, sessions, keep-alive, wire protocol.

pub mod connection;
pub mod dispatcher;
pub mod heartbeat;
pub mod protocol;
pub mod registry;
pub mod session;
