//! Rota Core - reviewer assignment engine
//!
//! This crate holds the domain model, the persistence ports and the
//! [`ReviewEngine`] that assigns, reassigns and backfills pull request
//! reviewers on top of any [`ports::Store`].

pub mod assignment;
pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod ports;
pub mod store;

pub use assignment::{
    CreatePullRequest, DeactivateMembers, Deactivation, MergePullRequest, NewTeam,
    PullRequestShort, ReassignReviewer, Reassignment, ReviewEngine, SetUserActive, TeamRoster,
    UserReviews, UserWithTeam,
};
pub use config::Config;
pub use context::OpContext;
pub use error::{Error, ErrorKind, Result};
pub use model::{
    NewMember, PrStatus, PullRequest, PullRequestWithReviewers, ReviewerChange, Team, User,
    MAX_REVIEWERS,
};
pub use store::InMemoryStore;
