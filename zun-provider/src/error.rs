//! Error types for Zun API calls and resource operations.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to Zun or waiting on it.
#[derive(Debug, Error)]
pub enum Error {
    /// Remote resource absent (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request rejected by the API (HTTP 400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Any other non-success HTTP status.
    #[error("unexpected HTTP status {status}: {message}")]
    Api { status: u16, message: String },

    /// Connection, TLS or timeout failure below the HTTP layer.
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body did not match the expected shape.
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),

    /// A refresh reported a status outside the pending and target sets.
    #[error("unexpected state '{state}', wanted target '{target}'")]
    UnexpectedState { state: String, target: String },

    /// Deadline passed while the resource was still pending.
    #[error(
        "timeout while waiting for {resource} to become '{target}' (last state: '{last_state}', timeout: {timeout:?})"
    )]
    Timeout {
        resource: String,
        last_state: String,
        target: String,
        timeout: Duration,
    },

    /// Resource identifier could not be parsed.
    #[error("Unable to determine {kind} {id} ID")]
    InvalidId { kind: &'static str, id: String },

    /// Attribute values failed a local check before any request was sent.
    #[error("{0}")]
    Validation(String),

    /// Provider configuration is unusable.
    #[error("config: {0}")]
    Config(String),

    /// Operation name and resource id prepended to an inner error.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap this error with the operation that produced it.
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any context wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Error::NotFound(_))
    }

    pub fn is_bad_request(&self) -> bool {
        matches!(self.root(), Error::BadRequest(_))
    }
}

/// Result type for Zun operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_keeps_root_classification() {
        let err = Error::NotFound("container abc".to_string())
            .context("Error retrieving openstack_container_container_v1 abc");
        assert!(err.is_not_found());
        assert!(!err.is_bad_request());
        assert_eq!(
            err.to_string(),
            "Error retrieving openstack_container_container_v1 abc: not found: container abc"
        );
    }

    #[test]
    fn test_timeout_message_names_last_state() {
        let err = Error::Timeout {
            resource: "container abc".to_string(),
            last_state: "Creating".to_string(),
            target: "Created".to_string(),
            timeout: Duration::from_secs(600),
        };
        let msg = err.to_string();
        assert!(msg.contains("container abc"));
        assert!(msg.contains("last state: 'Creating'"));
    }
}
