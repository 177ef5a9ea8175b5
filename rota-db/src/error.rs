//! Error types for database operations

use thiserror::Error;

/// Database error types
#[derive(Error, Debug)]
pub enum Error {
    /// SQLx database error
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// A stored value could not be decoded
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Team not found: {0}")]
    TeamNotFound(String),

    #[error("Pull request not found: {0}")]
    PullRequestNotFound(String),

    #[error("Team already exists: {0}")]
    TeamExists(String),

    #[error("Pull request already exists: {0}")]
    PullRequestExists(String),

    #[error("Reviewer {reviewer_id} not assigned to {pr_id}")]
    ReviewerNotAssigned { pr_id: String, reviewer_id: String },
}

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
    }

    pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
    }
}

impl From<Error> for rota_core::Error {
    fn from(err: Error) -> Self {
        use rota_core::Error as Core;

        match err {
            Error::UserNotFound(id) => Core::UserNotFound(id),
            Error::TeamNotFound(name) => Core::TeamNotFound(name),
            Error::PullRequestNotFound(id) => Core::PrNotFound(id),
            Error::TeamExists(name) => Core::TeamExists(name),
            Error::PullRequestExists(id) => Core::PrExists(id),
            Error::ReviewerNotAssigned { pr_id, reviewer_id } => {
                Core::ReviewerNotAssigned { pr_id, reviewer_id }
            }
            other => Core::internal(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rota_core::ErrorKind;

    #[test]
    fn test_domain_errors_keep_their_kind() {
        let core: rota_core::Error = Error::TeamExists("eng".into()).into();
        assert!(matches!(core, rota_core::Error::TeamExists(ref n) if n == "eng"));

        let core: rota_core::Error = Error::PullRequestNotFound("pr-1".into()).into();
        assert_eq!(core.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_storage_errors_are_hidden() {
        let core: rota_core::Error = Error::Sqlx(sqlx::Error::PoolTimedOut).into();
        assert_eq!(core.code(), "SERVER_ERR");
        assert_eq!(core.to_string(), "internal error");
    }
}
