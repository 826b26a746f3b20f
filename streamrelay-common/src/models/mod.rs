// File: streamrelay-common/src/models/mod.rs
pub mod connection;
pub mod credential;
pub mod delivery;
pub mod event;

pub use connection::ConnectionState;
pub use credential::{Credential, NotificationTarget};
pub use delivery::DeliveryOutcome;
pub use event::{EventEnvelope, SocketEvent};
