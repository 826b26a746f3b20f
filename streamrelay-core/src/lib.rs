// src/lib.rs

pub mod config;
pub mod filter;
pub mod health;
pub mod http;
pub mod notifier;
pub mod platforms;
pub mod relay;

pub use streamrelay_common::error::Error;
pub use config::{ConfigError, RelayConfig};
pub use http::{DefaultHttpClient, HttpClient, HttpResponse};
pub use relay::{Relay, RunningRelay};
