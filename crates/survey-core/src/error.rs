//! Error types module
//!
//! One enum per pipeline stage. `AuthError`, `RegistrationError` and
//! `CheckpointError` are fatal for a run; `TransferError` is reported per item
//! and only aborts the run for `Unauthorized` / `SessionExpired`;
//! `FinalizeError` is reported after the transfer loop has finished.
//!
//! HTTP details are carried as plain status codes and strings so this crate
//! stays free of the HTTP client.

use std::path::PathBuf;
use std::time::Duration;

use crate::models::TransferSummary;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication timed out after {0:?}")]
    Timeout(Duration),

    #[error("Authentication rejected: {status} {status_text}: {body}")]
    Rejected {
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("Authentication response did not contain an access token")]
    MissingToken,

    #[error("Invalid authentication response: {0}")]
    InvalidResponse(String),

    #[error("Authentication request failed: {0}")]
    Transport(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("No photos to register")]
    NoPhotos,

    #[error("Created project has no registered camera")]
    NoCamera,

    #[error("Project creation failed with status {status}: {body}")]
    ProjectCreationFailed { status: u16, body: String },

    #[error("Photo batch creation failed with status {status}: {body}")]
    BatchCreationFailed { status: u16, body: String },

    #[error("Malformed registration response: {0}")]
    MalformedResponse(String),

    #[error("Registration request failed: {0}")]
    Transport(String),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Upload unauthorized (token expired or revoked): {body}")]
    Unauthorized { body: String },

    #[error("Session token expired")]
    SessionExpired,

    #[error("Upload request failed: {0}")]
    Transport(String),
}

impl TransferError {
    /// Errors after which no further item can succeed in this run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::SessionExpired)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    #[error("Upload finalization rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Upload finalization request failed: {0}")]
    Transport(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("Checkpoint I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt checkpoint file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl CheckpointError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Terminal error of a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("Transfer aborted: {reason}")]
    Aborted {
        reason: String,
        summary: Box<TransferSummary>,
    },

    #[error(transparent)]
    Finalize(#[from] FinalizeError),
}
