//! Top-level error type and result alias for the command-line surface.

use crate::domain::types::HostError;
use crate::services::gateway::GatewayError;
use thiserror::Error;

/// Result type for tool-level operations.
pub type ResyncResult<T> = Result<T, ResyncError>;

/// Errors surfaced by the command-line layer.
#[derive(Error, Debug, miette::Diagnostic)]
pub enum ResyncError {
    #[error("invalid target host: {0}")]
    Host(#[from] HostError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("invalid timestamp: {0}")]
    Timestamp(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ResyncError {
    fn from(error: std::io::Error) -> Self {
        ResyncError::Io(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_errors_convert() {
        let err: ResyncError = HostError::Empty.into();
        assert_eq!(err.to_string(), "invalid target host: target host cannot be empty");
    }
}
