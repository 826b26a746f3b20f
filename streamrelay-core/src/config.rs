//! Startup configuration.
//!
//! Everything comes from environment variables (the binary loads `.env`
//! first). Parsing goes through a lookup function so tests never have to touch
//! the real process environment.

use std::time::Duration;
use thiserror::Error;
use url::Url;

use streamrelay_common::models::{Credential, NotificationTarget};

use crate::platforms::streamlabs::{EngineIoVersion, ReconnectPolicy, StreamlabsConfig};

pub const SOCKET_TOKEN_VAR: &str = "SOCKET_TOKEN";
pub const NTFY_TOPIC_VAR: &str = "NTFY_TOPIC";
pub const EVENT_SOURCE_URL_VAR: &str = "EVENT_SOURCE_URL";
pub const NTFY_BASE_URL_VAR: &str = "NTFY_BASE_URL";
pub const STRICT_ORIGIN_FILTER_VAR: &str = "STRICT_ORIGIN_FILTER";
pub const ENGINE_IO_VERSION_VAR: &str = "ENGINE_IO_VERSION";
pub const RECONNECT_MAX_ATTEMPTS_VAR: &str = "RECONNECT_MAX_ATTEMPTS";

pub const DEFAULT_EVENT_SOURCE_URL: &str = "https://sockets.streamlabs.com";
pub const DEFAULT_NTFY_BASE_URL: &str = "https://ntfy.sh";

/// Size of the ordered queue between the socket reader and the relay loop.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub credential: Credential,
    pub topic: NotificationTarget,
    pub event_source_url: Url,
    pub notify_base_url: Url,
    /// Also require `for == "twitch_account"` on chat messages.
    pub strict_origin_filter: bool,
    pub engine_io: EngineIoVersion,
    pub reconnect: ReconnectPolicy,
    pub event_channel_capacity: usize,
}

impl RelayConfig {
    /// Config with default transport and filter settings for the given
    /// endpoints.
    pub fn new(
        credential: Credential,
        topic: NotificationTarget,
        event_source_url: Url,
        notify_base_url: Url,
    ) -> Self {
        Self {
            credential,
            topic,
            event_source_url,
            notify_base_url,
            strict_origin_filter: false,
            engine_io: EngineIoVersion::default(),
            reconnect: ReconnectPolicy::default(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source.
    ///
    /// The token is checked before the topic, so with both missing the
    /// reported variable is `SOCKET_TOKEN`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = required(&lookup, SOCKET_TOKEN_VAR)?;
        let topic = required(&lookup, NTFY_TOPIC_VAR)?;

        let event_source_url = endpoint(&lookup, EVENT_SOURCE_URL_VAR, DEFAULT_EVENT_SOURCE_URL)?;
        let notify_base_url = endpoint(&lookup, NTFY_BASE_URL_VAR, DEFAULT_NTFY_BASE_URL)?;

        let mut config = Self::new(
            Credential::new(token),
            NotificationTarget::new(topic),
            event_source_url,
            notify_base_url,
        );

        if let Some(raw) = optional(&lookup, STRICT_ORIGIN_FILTER_VAR) {
            config.strict_origin_filter = parse_flag(STRICT_ORIGIN_FILTER_VAR, &raw)?;
        }
        if let Some(raw) = optional(&lookup, ENGINE_IO_VERSION_VAR) {
            config.engine_io = raw.parse().map_err(|reason| ConfigError::Invalid {
                name: ENGINE_IO_VERSION_VAR,
                reason,
            })?;
        }
        if let Some(raw) = optional(&lookup, RECONNECT_MAX_ATTEMPTS_VAR) {
            let max = raw.trim().parse::<u32>().map_err(|e| ConfigError::Invalid {
                name: RECONNECT_MAX_ATTEMPTS_VAR,
                reason: e.to_string(),
            })?;
            config.reconnect.max_attempts = Some(max);
        }

        Ok(config)
    }

    /// Transport settings for the Streamlabs connection manager.
    pub fn streamlabs(&self) -> StreamlabsConfig {
        StreamlabsConfig {
            base_url: self.event_source_url.clone(),
            engine_io: self.engine_io,
            reconnect: self.reconnect.clone(),
            channel_capacity: self.event_channel_capacity,
            handshake_timeout: Duration::from_secs(20),
        }
    }
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn optional<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).filter(|v| !v.trim().is_empty())
}

/// The override if set, otherwise the built-in default.
fn endpoint<F>(lookup: &F, name: &'static str, default: &str) -> Result<Url, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = optional(lookup, name);
    parse_url(name, raw.as_deref().unwrap_or(default))
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a boolean, got '{}'", other),
        }),
    }
}
