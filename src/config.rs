//! Messenger configuration parsed from environment variables.

use std::time::Duration;

use crate::messenger::{ANY_ORIGIN, DEFAULT_TIMEOUT};
use crate::origin::TrustedOrigins;

pub const TARGET_ORIGIN_VAR: &str = "CROSSFRAME_TARGET_ORIGIN";
pub const TIMEOUT_MS_VAR: &str = "CROSSFRAME_TIMEOUT_MS";
pub const FALLBACK_SELECTOR_VAR: &str = "CROSSFRAME_FALLBACK_SELECTOR";
pub const TRUSTED_ORIGINS_VAR: &str = "CROSSFRAME_TRUSTED_ORIGINS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: '{value}' (expected {expected})")]
    InvalidOrigin { var: &'static str, value: String, expected: &'static str },
    #[error("invalid CROSSFRAME_TIMEOUT_MS: '{value}' (expected a positive integer)")]
    InvalidTimeout { value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessengerConfig {
    /// Tag stamped on every outgoing message.
    pub source: String,
    pub target_origin: String,
    /// Default bound for waiting helpers.
    pub timeout: Duration,
    /// Selector for the destination frame when no target window is given.
    pub fallback_selector: Option<String>,
    /// Origins listeners should accept. Empty trusts nothing.
    pub trusted_origins: Vec<String>,
}

impl MessengerConfig {
    /// Defaults: any target origin, 10s timeout, no fallback, no trusted origins.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target_origin: ANY_ORIGIN.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            fallback_selector: None,
            trusted_origins: Vec::new(),
        }
    }

    /// Build config for the endpoint tagged `source` from the environment.
    ///
    /// Optional:
    /// - `CROSSFRAME_TARGET_ORIGIN`: `*` (default), `/`, or `http(s)://host[:port]`
    /// - `CROSSFRAME_TIMEOUT_MS`: default 10000
    /// - `CROSSFRAME_FALLBACK_SELECTOR`: e.g. `#grafana-iframe`
    /// - `CROSSFRAME_TRUSTED_ORIGINS`: comma-separated origins
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for malformed origins or timeouts.
    pub fn from_env(source: impl Into<String>) -> Result<Self, ConfigError> {
        Self::from_lookup(source, |key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for malformed origins or timeouts.
    pub fn from_lookup(source: impl Into<String>, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::new(source);

        if let Some(raw) = non_empty(lookup(TARGET_ORIGIN_VAR)) {
            config.target_origin = parse_target_origin(TARGET_ORIGIN_VAR, &raw)?;
        }
        if let Some(raw) = non_empty(lookup(TIMEOUT_MS_VAR)) {
            config.timeout = parse_timeout(&raw)?;
        }
        config.fallback_selector = non_empty(lookup(FALLBACK_SELECTOR_VAR));
        if let Some(raw) = non_empty(lookup(TRUSTED_ORIGINS_VAR)) {
            config.trusted_origins = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(parse_trusted_origin)
                .collect::<Result<_, _>>()?;
        }

        Ok(config)
    }

    #[must_use]
    pub fn trusted_origins(&self) -> TrustedOrigins {
        TrustedOrigins::new(self.trusted_origins.iter().cloned())
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

fn parse_target_origin(var: &'static str, raw: &str) -> Result<String, ConfigError> {
    if raw == ANY_ORIGIN || raw == "/" {
        return Ok(raw.to_owned());
    }
    parse_origin(raw)
        .ok_or_else(|| ConfigError::InvalidOrigin { var, value: raw.to_owned(), expected: "'*', '/', or an http(s) origin" })
}

/// `"/"` names no origin of its own, so it has no place in the list.
fn parse_trusted_origin(raw: &str) -> Result<String, ConfigError> {
    if raw == ANY_ORIGIN {
        return Ok(raw.to_owned());
    }
    parse_origin(raw).ok_or_else(|| ConfigError::InvalidOrigin {
        var: TRUSTED_ORIGINS_VAR,
        value: raw.to_owned(),
        expected: "'*' or an http(s) origin",
    })
}

/// `scheme://host[:port]` with an optional trailing `/`; nothing after the host.
fn parse_origin(raw: &str) -> Option<String> {
    let origin = raw.strip_suffix('/').unwrap_or(raw);
    let host = ["http://", "https://"].iter().find_map(|scheme| origin.strip_prefix(scheme))?;
    let valid = !host.is_empty() && !host.contains(['/', '?', '#', '@']) && !host.contains(char::is_whitespace);
    valid.then(|| origin.to_owned())
}

fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    match raw.parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError::InvalidTimeout { value: raw.to_owned() }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
