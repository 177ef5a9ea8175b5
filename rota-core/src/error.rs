//! Error types for Rota

use std::fmt;

use thiserror::Error;

/// Result type alias for Rota operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed storage failure kept as the source of [`Error::Internal`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for Rota operations
#[derive(Error, Debug)]
pub enum Error {
    /// User does not exist
    #[error("user {0} not found")]
    UserNotFound(String),

    /// Team does not exist
    #[error("team {0} not found")]
    TeamNotFound(String),

    /// Pull request does not exist
    #[error("pull request {0} not found")]
    PrNotFound(String),

    /// Team name is already taken
    #[error("team {0} already exists")]
    TeamExists(String),

    /// Pull request id is already taken
    #[error("pull request {0} already exists")]
    PrExists(String),

    /// Reviewers of a merged pull request are frozen
    #[error("cannot reassign on merged pull request {0}")]
    PrMerged(String),

    /// The reviewer to replace is not assigned to the pull request
    #[error("reviewer {reviewer_id} is not assigned to pull request {pr_id}")]
    ReviewerNotAssigned { pr_id: String, reviewer_id: String },

    /// No active replacement candidate in the team
    #[error("no active replacement candidate in team for pull request {0}")]
    NoCandidate(String),

    /// A member list was empty
    #[error("member list is empty")]
    EmptyMembers,

    /// A member id does not belong to the named team
    #[error("user {user_id} is not a member of team {team_name}")]
    InvalidMember { team_name: String, user_id: String },

    /// The operation was cancelled or ran past its deadline
    #[error("operation cancelled")]
    Cancelled,

    /// Storage or other unclassified failure. The cause is only exposed as `source()`.
    #[error("internal error")]
    Internal(#[source] BoxError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Classification of [`Error`] shared by every caller of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    Conflict,
    InvalidRequest,
    ResourceExhausted,
    Unassigned,
    Cancelled,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InvalidRequest => "invalid request",
            ErrorKind::ResourceExhausted => "resource exhausted",
            ErrorKind::Unassigned => "unassigned",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Wrap any storage failure as an internal error
    pub fn internal(err: impl Into<BoxError>) -> Self {
        Error::Internal(err.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UserNotFound(_) | Error::TeamNotFound(_) | Error::PrNotFound(_) => {
                ErrorKind::NotFound
            }
            Error::TeamExists(_) | Error::PrExists(_) => ErrorKind::AlreadyExists,
            Error::PrMerged(_) => ErrorKind::Conflict,
            Error::ReviewerNotAssigned { .. } => ErrorKind::Unassigned,
            Error::NoCandidate(_) => ErrorKind::ResourceExhausted,
            Error::EmptyMembers | Error::InvalidMember { .. } => ErrorKind::InvalidRequest,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Internal(_) | Error::Config(_) | Error::Io(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code for delivery layers
    pub fn code(&self) -> &'static str {
        match self {
            Error::UserNotFound(_) | Error::TeamNotFound(_) | Error::PrNotFound(_) => "NOT_FOUND",
            Error::TeamExists(_) => "TEAM_EXISTS",
            Error::PrExists(_) => "PR_EXISTS",
            Error::PrMerged(_) => "PR_MERGED",
            Error::ReviewerNotAssigned { .. } => "NOT_ASSIGNED",
            Error::NoCandidate(_) => "NO_CANDIDATE",
            Error::EmptyMembers | Error::InvalidMember { .. } => "BAD_REQUEST",
            Error::Cancelled => "CANCELLED",
            Error::Internal(_) | Error::Config(_) | Error::Io(_) => "SERVER_ERR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(Error::UserNotFound("u1".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            Error::PrExists("pr-1".into()).kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(Error::PrMerged("pr-1".into()).kind(), ErrorKind::Conflict);
        assert_eq!(
            Error::NoCandidate("pr-1".into()).kind(),
            ErrorKind::ResourceExhausted
        );
        assert_eq!(Error::EmptyMembers.kind(), ErrorKind::InvalidRequest);
        assert_eq!(
            Error::ReviewerNotAssigned {
                pr_id: "pr-1".into(),
                reviewer_id: "u2".into()
            }
            .kind(),
            ErrorKind::Unassigned
        );
    }

    #[test]
    fn test_internal_hides_cause() {
        let err = Error::internal("UNIQUE constraint failed: users.id");
        assert_eq!(err.to_string(), "internal error");
        assert_eq!(err.code(), "SERVER_ERR");

        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("UNIQUE"));
    }
}
