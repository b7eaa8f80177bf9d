//! Realtime connection: lifecycle state, transport seam, reconnect policy.

pub mod manager;
pub mod policy;
pub mod state;
pub mod transport;

pub use manager::ConnectionManager;
pub use policy::ReconnectPolicy;
pub use state::{ConnectionEvent, ConnectionState};
pub use transport::{Connector, Transport, WsConnector};
