//! Domain records for users, teams and pull requests
//!
//! Team membership is not stored on the team: a user belongs to the team its
//! `team_id` points at.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Target number of reviewers on a pull request
pub const MAX_REVIEWERS: usize = 2;

/// A team member that can author and review pull requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub team_id: Option<i64>,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>, team_id: Option<i64>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_active: true,
            team_id,
        }
    }

    /// Builder-style override of the active flag
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
}

/// Pull request status. `Merged` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrStatus {
    #[default]
    Open,
    Merged,
}

impl PrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrStatus::Open => "OPEN",
            PrStatus::Merged => "MERGED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PrStatus::Merged)
    }
}

impl fmt::Display for PrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(PrStatus::Open),
            "MERGED" => Ok(PrStatus::Merged),
            other => Err(Error::internal(format!("invalid pull request status: {other}"))),
        }
    }
}

/// Pull request without its reviewer relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: String,
    pub name: String,
    pub author_id: String,
    pub status: PrStatus,
    /// True when fewer than [`MAX_REVIEWERS`] could be assigned at the last attempt
    pub need_more_reviewers: bool,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    /// Create a new open pull request stamped with the current time
    pub fn open(
        id: impl Into<String>,
        name: impl Into<String>,
        author_id: impl Into<String>,
        need_more_reviewers: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            author_id: author_id.into(),
            status: PrStatus::Open,
            need_more_reviewers,
            created_at: Utc::now(),
            merged_at: None,
        }
    }

    pub fn is_merged(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Pull request together with its ordered reviewer ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestWithReviewers {
    #[serde(flatten)]
    pub pull_request: PullRequest,
    pub reviewers: Vec<String>,
}

impl PullRequestWithReviewers {
    pub fn new(pull_request: PullRequest, reviewers: Vec<String>) -> Self {
        Self {
            pull_request,
            reviewers,
        }
    }

    pub fn has_reviewer(&self, user_id: &str) -> bool {
        self.reviewers.iter().any(|r| r == user_id)
    }
}

/// Reviewer diff for one pull request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerChange {
    pub to_add: Vec<String>,
    pub to_remove: Vec<String>,
}

/// Member record used when creating or refreshing a team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMember {
    pub id: String,
    pub name: String,
    pub is_active: bool,
}

impl NewMember {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_active: true,
        }
    }
}
