//! Repository modules for database operations
//!
//! Each repository borrows a connection, so the same code runs on a pooled
//! connection or inside an open transaction.

pub mod pull_requests;
pub mod reviewers;
pub mod teams;
pub mod users;

pub use pull_requests::PullRequestRepository;
pub use reviewers::ReviewerRepository;
pub use teams::TeamRepository;
pub use users::UserRepository;
