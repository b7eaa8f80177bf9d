//! Realtime message types and JSON framing.

pub mod envelope;
pub mod serializer;
pub mod types;

pub use envelope::MessageEnvelope;
pub use types::{AlertPush, CoffeeServed, InboundMessage, NewRfidUid, OutboundMessage, RfidEvent, UserActivity};
