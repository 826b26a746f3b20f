pub mod protocol;
pub mod reconnect;
pub mod runtime;

pub use protocol::EngineIoVersion;
pub use reconnect::ReconnectPolicy;
pub use runtime::{ConnectionHandle, ConnectionManager, ShutdownTrigger, StreamlabsConfig};
