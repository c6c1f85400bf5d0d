//! Error types for Datumkit core operations.
//!
//! Errors are split by the stage that produces them: spec validation, atom
//! resolution, and the enumeration session itself. `DatumError` wraps all of
//! them so session operations expose a single result type, while the staged
//! enums stay available for callers that want to match on specifics.

use thiserror::Error;

/// Result type alias using DatumError
pub type Result<T> = std::result::Result<T, DatumError>;

/// Structural problems found in an input spec before any resolution happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The atom has no glob pattern
    #[error("glob must be specified for input '{alias}'")]
    MissingGlob { alias: String },

    /// The atom has no repo
    #[error("repo must be specified")]
    MissingRepo,

    /// The atom pins a commit; atoms always track a branch head
    #[error("commit cannot be specified for input '{alias}'")]
    CommitNotAllowed { alias: String },

    /// Two inputs in the tree resolve to the same alias
    #[error("name '{alias}' used more than once")]
    DuplicateAlias { alias: String },

    /// The node kind is not one the engine can enumerate (e.g. cron, s3)
    #[error("unsupported input type: {kind}")]
    UnsupportedInputKind { kind: String },

    /// The reserved output repo was referenced without an explicit name
    #[error("name must be specified for repo '{repo}'")]
    OutputRepoNeedsAlias { repo: String },

    /// A combinator node declared no children
    #[error("{kind} input must have at least one child")]
    EmptyCombinator { kind: String },

    /// The glob pattern could not be compiled
    #[error("invalid glob pattern {pattern}: {reason}")]
    InvalidGlob { pattern: String, reason: String },
}

/// Failures while turning an atom into a concrete file set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// The naming service has no such project/repo
    #[error("repo (project={project}, name={repo}) not found")]
    RepoNotFound { project: String, repo: String },

    /// The repo exists but the branch does not
    #[error("branch '{branch}' not found in repo {repo}")]
    BranchNotFound { repo: String, branch: String },

    /// A collaborator call failed; not retried here
    #[error("resolving input '{alias}': {reason}")]
    Service { alias: String, reason: String },
}

/// Top-level error for session and engine operations.
#[derive(Error, Debug)]
pub enum DatumError {
    // === Spec Errors ===
    /// The input spec is malformed
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An atom could not be resolved against the store
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    // === Enumeration Errors ===
    /// The combined enumeration has no datums
    #[error("spec produces zero datums; nothing to mount")]
    EmptyEnumeration,

    /// Cursor movement past either end of the known enumeration
    #[error("datum index {requested} out of range ({known} datums known)")]
    OutOfRange { requested: i64, known: usize },

    /// The operation requires a mounted spec
    #[error("no datums mounted")]
    NotMounted,

    // === Configuration Errors ===
    /// Configuration file parsing failed
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// Spec document could not be parsed
    #[error("invalid spec document: {reason}")]
    SpecParse { reason: String },

    // === I/O Errors ===
    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Internal Errors ===
    /// Internal error that should not happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl DatumError {
    /// Returns true if the caller sent something the engine cannot serve, as
    /// opposed to an internal or environmental failure.
    pub fn is_client_error(&self) -> bool {
        match self {
            DatumError::Validation(_)
            | DatumError::EmptyEnumeration
            | DatumError::OutOfRange { .. }
            | DatumError::NotMounted
            | DatumError::SpecParse { .. } => true,
            DatumError::Resolution(err) => !matches!(err, ResolutionError::Service { .. }),
            DatumError::Config { .. } | DatumError::Io(_) | DatumError::Internal(_) => false,
        }
    }

    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        DatumError::Config {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for DatumError {
    fn from(err: serde_json::Error) -> Self {
        DatumError::SpecParse {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let err = DatumError::from(ValidationError::DuplicateAlias {
            alias: "repo".to_string(),
        });
        assert_eq!(err.to_string(), "name 'repo' used more than once");

        let err = DatumError::from(ValidationError::OutputRepoNeedsAlias {
            repo: "out".to_string(),
        });
        assert!(err
            .to_string()
            .contains("name must be specified for repo 'out'"));

        let err = DatumError::from(ValidationError::UnsupportedInputKind {
            kind: "cron".to_string(),
        });
        assert!(err.to_string().contains("cron"));
    }

    #[test]
    fn test_client_error_classification() {
        assert!(DatumError::EmptyEnumeration.is_client_error());
        assert!(DatumError::NotMounted.is_client_error());
        assert!(DatumError::from(ResolutionError::RepoNotFound {
            project: "invalid".to_string(),
            repo: "repo1".to_string(),
        })
        .is_client_error());

        let err = DatumError::from(ResolutionError::Service {
            alias: "images".to_string(),
            reason: "connection reset".to_string(),
        });
        assert!(!err.is_client_error());
        assert!(err.to_string().contains("images"));
    }
}
