//! Persistence ports consumed by the engine.
//!
//! A [`Store`] hands out [`Transaction`] handles. The handle implements every
//! port, so each port call is scoped to the transaction it is made on.
//! Dropping a handle without calling [`Transaction::commit`] discards all of
//! its writes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{NewMember, PullRequest, PullRequestWithReviewers, ReviewerChange, Team, User};
use crate::Result;

#[async_trait]
pub trait UserPort: Send {
    /// Fails with `UserNotFound` when the id is unknown.
    async fn get_user(&mut self, id: &str) -> Result<User>;

    /// Active users of `team_id` whose id is not in `exclude_ids`, ordered by id.
    async fn list_active_teammates(
        &mut self,
        team_id: i64,
        exclude_ids: &[String],
        limit: Option<usize>,
    ) -> Result<Vec<User>>;

    /// Mark every listed user inactive and return the updated records.
    async fn bulk_deactivate(&mut self, ids: &[String]) -> Result<Vec<User>>;

    /// Insert or overwrite users as members of `team_id`.
    async fn bulk_upsert_into_team(
        &mut self,
        team_id: i64,
        members: &[NewMember],
    ) -> Result<Vec<User>>;

    async fn set_user_active(&mut self, id: &str, is_active: bool) -> Result<User>;
}

#[async_trait]
pub trait TeamPort: Send {
    /// Fails with `TeamExists` on a duplicate name.
    async fn create_team(&mut self, name: &str) -> Result<Team>;

    async fn get_team_by_name(&mut self, name: &str) -> Result<Team>;

    /// All members of the team, active or not, ordered by id.
    async fn get_team_members(&mut self, team_id: i64) -> Result<Vec<User>>;

    /// `None` when the user exists but has no team.
    async fn get_team_of_user(&mut self, user_id: &str) -> Result<Option<Team>>;
}

#[async_trait]
pub trait PullRequestPort: Send {
    /// Fails with `PrExists` on a duplicate id and `UserNotFound` on an unknown author.
    async fn create_pull_request(&mut self, pr: &PullRequest) -> Result<()>;

    async fn set_merged(&mut self, id: &str, merged_at: DateTime<Utc>) -> Result<PullRequest>;

    async fn get_pull_request_with_reviewers(
        &mut self,
        id: &str,
    ) -> Result<PullRequestWithReviewers>;

    /// Open pull requests where any of `reviewer_ids` reviews, keyed by PR id.
    /// Each entry carries the full reviewer set, not only the matching ids.
    async fn get_open_by_reviewer_ids(
        &mut self,
        reviewer_ids: &[String],
    ) -> Result<BTreeMap<String, PullRequestWithReviewers>>;

    /// Every pull request, open or merged, reviewed by `user_id`.
    async fn list_by_reviewer(&mut self, user_id: &str) -> Result<Vec<PullRequest>>;
}

#[async_trait]
pub trait ReviewerPort: Send {
    async fn add_reviewers(&mut self, pr_id: &str, user_ids: &[String]) -> Result<()>;

    /// Swap `old_id` for `new_id` in place and return `new_id`.
    async fn replace_reviewer(
        &mut self,
        pr_id: &str,
        old_id: &str,
        new_id: &str,
    ) -> Result<String>;

    async fn bulk_replace_reviewers(
        &mut self,
        changes: &BTreeMap<String, ReviewerChange>,
    ) -> Result<()>;
}

/// One atomic unit of work over all ports
#[async_trait]
pub trait Transaction: UserPort + TeamPort + PullRequestPort + ReviewerPort {
    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

/// Source of transactions
#[async_trait]
pub trait Store: Send + Sync {
    type Tx: Transaction;

    async fn begin(&self) -> Result<Self::Tx>;
}
