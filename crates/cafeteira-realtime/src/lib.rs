//! # cafeteira-realtime
//!
//! Realtime WebSocket client for the Cafeteira device. Provides:
//!
//! - A single reconnecting connection owned by one background task
//! - Typed decoding of the device's `{type, data}` frames
//! - Outbound `{type, timestamp, data}` envelopes (`auth`, `get_status`, `get_users`)
//! - Session-aware lifecycle: logging out tears the connection down

pub mod connection;
pub mod message;

pub use connection::manager::ConnectionManager;
pub use connection::state::{ConnectionEvent, ConnectionState};
pub use connection::transport::{Connector, Transport, WsConnector};
pub use message::types::{InboundMessage, OutboundMessage};
