//! Failure taxonomy for generation requests.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_STREAM_ERROR: &str = "Stream error";

/// Errors that end a generation turn. Cancellation is not an error and never appears here.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    /// Connection-level failure while sending the request or reading the body.
    #[error("Connection lost. Please check your connection and try again. ({0})")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// The stream carried an explicit `error` record.
    #[error("{0}")]
    Protocol(String),

    /// The response body could not be decoded at all.
    #[error("Invalid response from server: {0}")]
    Decode(String),
}

/// Fieldless projection of [`GenerationError`], retained with a failed turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    Server { status: u16 },
    Protocol,
    Decode,
}

impl GenerationError {
    pub fn protocol(message: Option<String>) -> Self {
        Self::Protocol(
            message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_STREAM_ERROR.to_string()),
        )
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::Server { status, .. } => ErrorKind::Server { status: *status },
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Decode(_) => ErrorKind::Decode,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        match self {
            Self::Transport | Self::Protocol | Self::Decode => true,
            Self::Server { status } => status == 408 || status == 429 || status >= 500,
        }
    }
}

/// A turn that failed, kept so it can be resubmitted verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTurn {
    pub content: String,
    pub kind: ErrorKind,
}

impl FailedTurn {
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_messages() {
        let transport = GenerationError::Transport("connection refused".to_string());
        assert!(transport.to_string().starts_with("Connection lost"));

        let server = GenerationError::Server {
            status: 500,
            message: "Internal Server Error".to_string(),
        };
        assert!(server.to_string().contains("Server error (HTTP 500)"));

        assert_eq!(GenerationError::protocol(None).to_string(), "Stream error");
        assert_eq!(
            GenerationError::protocol(Some("Model overloaded".to_string())).to_string(),
            "Model overloaded"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ErrorKind::Transport.is_retryable());
        assert!(ErrorKind::Protocol.is_retryable());
        assert!(ErrorKind::Server { status: 502 }.is_retryable());
        assert!(ErrorKind::Server { status: 429 }.is_retryable());
        assert!(!ErrorKind::Server { status: 403 }.is_retryable());
        assert!(!ErrorKind::Server { status: 400 }.is_retryable());
    }
}
