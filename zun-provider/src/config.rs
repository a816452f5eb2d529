//! Provider configuration.
//!
//! A `ProviderConfig` is built once (by the binary from CLI flags, or by the
//! caller directly) and handed to every resource constructor.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::DeleteMode;

/// Microversion that adds `registry` to container creation.
pub const DEFAULT_MICROVERSION: &str = "1.31";

/// Default create and delete timeout for both resource kinds.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Overrides for the poll schedule of every operation.
///
/// Unset fields fall back to the per-operation defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollTuning {
    pub delay: Option<Duration>,
    pub min_timeout: Option<Duration>,
    pub interval: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    /// Base URL of the container service, e.g. `http://controller:9517/v1`.
    pub endpoint: String,
    /// Pre-issued Keystone token sent as `X-Auth-Token`.
    pub token: Option<String>,
    pub region: String,
    pub microversion: String,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    pub poll: PollTuning,
    pub container_delete_mode: DeleteMode,
    /// Fail detach on HTTP 400 instead of waiting it out.
    pub strict_detach: bool,
}

impl ProviderConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
            region: String::new(),
            microversion: DEFAULT_MICROVERSION.to_string(),
            request_timeout: Duration::from_secs(60),
            poll: PollTuning::default(),
            container_delete_mode: DeleteMode::Plain,
            strict_detach: false,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_poll(mut self, poll: PollTuning) -> Self {
        self.poll = poll;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(Error::Config(format!(
                "endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }
        if self.microversion.is_empty() {
            return Err(Error::Config("microversion must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::new("http://zun:9517/v1");
        assert_eq!(config.microversion, "1.31");
        assert!(config.token.is_none());
        assert!(!config.strict_detach);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        let config = ProviderConfig::new("zun:9517");
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
