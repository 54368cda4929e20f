//! Error taxonomy for the grocery client
//!
//! Errors are grouped by where they arise:
//! - request construction (`InvalidUrl`, `Encode`, `InvalidRequest`)
//! - the wire (`Transport`, `Server`, `Decode`)
//! - the domain (`Application`, `ContractViolation`, `IdMismatch`)
//! - batch coordination (`IndexOutOfRange`, `Batch`)
//!
//! `NotSignedIn` comes from `CredentialStore::require_session`; the store
//! absorbs it and skips the operation.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum ClientError {
    #[error("Not signed in")]
    NotSignedIn,

    #[error("Bad URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to encode request body: {message}")]
    Encode { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String, timeout: bool },

    #[error("HTTP {status} error: {body}")]
    Server { status: u16, body: String },

    #[error("Failed to decode {type_name}: {message}")]
    Decode { type_name: String, message: String },

    #[error("Request rejected: {}", .reason.as_deref().unwrap_or("no reason given"))]
    Application { reason: Option<String> },

    #[error("Contract violation: {message}")]
    ContractViolation { message: String },

    #[error("Deleted entity {actual} does not match requested {expected}")]
    IdMismatch { expected: Uuid, actual: Uuid },

    #[error("Index {index} out of range for {len} entries")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("{0}")]
    Batch(BatchFailure),
}

impl ClientError {
    /// True for failures raised before any request left the process.
    pub fn is_request_construction(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidUrl { .. }
                | ClientError::Encode { .. }
                | ClientError::InvalidRequest { .. }
        )
    }

    /// Default text shown next to the error when the caller has nothing better.
    pub fn guidance(&self) -> Option<String> {
        match self {
            ClientError::NotSignedIn => Some("Sign in to continue.".to_string()),
            ClientError::Transport { timeout: true, .. } => {
                Some("The server took too long to respond. Try again later.".to_string())
            }
            ClientError::Transport { .. } => {
                Some("Check your network connection and try again.".to_string())
            }
            ClientError::Application { reason } => reason.clone(),
            ClientError::InvalidRequest { message } => Some(message.clone()),
            ClientError::Batch(failure) => Some(format!(
                "{} of {} deletions failed. Refresh to see the current list.",
                failure.failed.len(),
                failure.failed.len() + failure.succeeded.len()
            )),
            _ => None,
        }
    }
}

/// Outcome of a batch delete in which at least one call failed.
///
/// Deletes listed in `succeeded` went through on the server even though the
/// local sequence was left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    /// `(index, id)` of each delete the server accepted
    pub succeeded: Vec<(usize, Uuid)>,
    /// `(index, error)` of each delete that failed
    pub failed: Vec<(usize, ClientError)>,
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Batch delete failed: {} of {} calls failed",
            self.failed.len(),
            self.failed.len() + self.succeeded.len()
        )?;
        if let Some((index, error)) = self.failed.first() {
            write!(f, " (first at index {}: {})", index, error)?;
        }
        Ok(())
    }
}

/// A surfaced error plus an optional guidance string for display.
///
/// Each report gets its own id so a UI can tell two identical failures apart.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub id: Uuid,
    pub error: ClientError,
    pub guidance: Option<String>,
}

impl ErrorReport {
    /// Wrap an error, using its default guidance.
    pub fn new(error: ClientError) -> Self {
        let guidance = error.guidance();
        Self {
            id: Uuid::new_v4(),
            error,
            guidance,
        }
    }

    pub fn with_guidance(error: ClientError, guidance: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            error,
            guidance: Some(guidance.into()),
        }
    }
}

impl PartialEq for ErrorReport {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.guidance == other.guidance
    }
}

impl From<ClientError> for ErrorReport {
    fn from(error: ClientError) -> Self {
        ErrorReport::new(error)
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.guidance {
            Some(guidance) => write!(f, "{} ({})", self.error, guidance),
            None => write!(f, "{}", self.error),
        }
    }
}
