use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the diagnosis core.
///
/// The `Artifact*` and `SchemaMismatch` variants are fatal at startup: a process that sees
/// one of them must not serve predictions. Everything else is a per-request failure.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("required artifact missing: {}", path.display())]
    ArtifactMissing { path: PathBuf },

    #[error("failed to read artifact {}: {source}", path.display())]
    ArtifactUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse artifact {}: {source}", path.display())]
    ArtifactMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid artifact {artifact}: {reason}")]
    InvalidArtifact { artifact: String, reason: String },

    #[error("schema mismatch in {artifact}: expected {expected}, found {found}")]
    SchemaMismatch {
        artifact: String,
        expected: String,
        found: String,
    },

    #[error("invalid conversation config: {0}")]
    InvalidConfig(String),

    #[error("no symptoms provided")]
    EmptySymptoms,

    #[error("message is empty")]
    EmptyMessage,

    #[error("invalid session id: {0}")]
    InvalidSessionId(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("storage error: {0}")]
    StorageError(String),
}

impl FlowError {
    pub(crate) fn invalid(artifact: impl Into<String>, reason: impl Into<String>) -> Self {
        FlowError::InvalidArtifact {
            artifact: artifact.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that must abort startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FlowError::ArtifactMissing { .. }
                | FlowError::ArtifactUnreadable { .. }
                | FlowError::ArtifactMalformed { .. }
                | FlowError::InvalidArtifact { .. }
                | FlowError::SchemaMismatch { .. }
                | FlowError::InvalidConfig(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
