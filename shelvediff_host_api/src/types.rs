use serde::{Deserialize, Serialize};

/// Everything the built-in viewer needs to present a two-file comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareRequest {
    /// Local file shown on the left.
    pub left_path: String,
    /// Local file shown on the right.
    pub right_path: String,
    /// Window caption.
    pub caption: String,
    /// Tooltip for the window tab.
    pub tooltip: String,
    /// Label drawn above the left pane.
    pub left_label: String,
    /// Label drawn above the right pane.
    pub right_label: String,
}

/// Errors surfaced by host collaborators.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Operation is not supported by this collaborator.
    #[error("operation '{operation}' is not supported by this host")]
    Unsupported {
        /// Name of the unsupported operation.
        operation: &'static str,
    },
    /// The requested item does not exist (anymore).
    #[error("{what} not found")]
    NotFound {
        /// Description of the missing item.
        what: String,
    },
    /// Generic failure surfaced by the collaborator.
    #[error("{message}")]
    Failure {
        /// Human-readable error message.
        message: String,
    },
}

impl HostError {
    /// Helper to construct a failure from any displayable message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    /// Helper to construct a not-found error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }
}

/// Convenience result alias for host operations.
pub type HostResult<T> = std::result::Result<T, HostError>;
