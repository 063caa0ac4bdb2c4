//! Error types for the etcd gateway client.

use reqwest::StatusCode;

use crate::config::ConfigError;
use crate::value::Value;

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors that can occur during gateway operations.
///
/// etcd-reported conditions that arrive inside a successful reply are not
/// errors here; they are returned as part of the decoded body.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Invalid configuration, raised before any request is sent.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Connection, TLS or timeout failure from the HTTP transport.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The gateway answered with a non-2xx status.
    #[error("gateway returned {status}: {body}")]
    Status {
        /// HTTP status of the reply.
        status: StatusCode,
        /// Decoded JSON error object, or the raw text when it is not JSON.
        body: Value,
    },

    /// The reply body was not valid JSON.
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The reply was JSON but not an object.
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),
}

impl GatewayError {
    /// Returns the error message.
    pub fn message(&self) -> String {
        match self {
            GatewayError::Config(e) => e.to_string(),
            GatewayError::Transport(e) => e.to_string(),
            GatewayError::Status { body, .. } => body
                .get("message")
                .or_else(|| body.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| body.to_string()),
            GatewayError::Decode(e) => e.to_string(),
            GatewayError::UnexpectedShape(msg) => msg.clone(),
        }
    }

    /// Returns the HTTP status if the gateway rejected the request.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GatewayError::Status { status, .. } => Some(*status),
            GatewayError::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// Returns the gRPC code reported by the gateway, if any.
    pub fn grpc_code(&self) -> Option<i64> {
        match self {
            GatewayError::Status { body, .. } => body.get("code").and_then(Value::as_i64),
            _ => None,
        }
    }

    /// Returns true if the configuration was rejected before sending.
    pub fn is_config_error(&self) -> bool {
        matches!(self, GatewayError::Config(_))
    }

    /// Returns true for connection, timeout, TLS and non-2xx failures.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport(_) | GatewayError::Status { .. }
        )
    }

    /// Returns true if the reply could not be decoded.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            GatewayError::Decode(_) | GatewayError::UnexpectedShape(_)
        )
    }

    /// Returns true if the request timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::Transport(e) if e.is_timeout())
    }
}
