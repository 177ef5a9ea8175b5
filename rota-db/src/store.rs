//! [`Store`] implementation on a SQLite pool
//!
//! Every port call runs on the connection owned by the open transaction.
//! Repository errors are translated into engine errors at this boundary.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rota_core::model::{
    NewMember, PullRequest, PullRequestWithReviewers, ReviewerChange, Team, User,
};
use rota_core::ports::{PullRequestPort, ReviewerPort, Store, TeamPort, Transaction, UserPort};
use sqlx::{Sqlite, SqlitePool};
use tracing::debug;

use crate::error::Error;
use crate::repos::{PullRequestRepository, ReviewerRepository, TeamRepository, UserRepository};

type CoreResult<T> = rota_core::Result<T>;

/// Transactional store backed by a SQLite pool
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for SqliteStore {
    type Tx = SqliteTx;

    async fn begin(&self) -> CoreResult<SqliteTx> {
        let tx = self.pool.begin().await.map_err(Error::from)?;
        Ok(SqliteTx { tx })
    }
}

/// Open SQLite transaction; dropped without commit it rolls back
pub struct SqliteTx {
    tx: sqlx::Transaction<'static, Sqlite>,
}

#[async_trait]
impl UserPort for SqliteTx {
    async fn get_user(&mut self, id: &str) -> CoreResult<User> {
        Ok(UserRepository::new(&mut self.tx).get(id).await?)
    }

    async fn list_active_teammates(
        &mut self,
        team_id: i64,
        exclude_ids: &[String],
        limit: Option<usize>,
    ) -> CoreResult<Vec<User>> {
        Ok(UserRepository::new(&mut self.tx)
            .list_active_in_team(team_id, exclude_ids, limit)
            .await?)
    }

    async fn bulk_deactivate(&mut self, ids: &[String]) -> CoreResult<Vec<User>> {
        let mut users = UserRepository::new(&mut self.tx);
        let mut updated = Vec::with_capacity(ids.len());
        for id in ids {
            updated.push(users.set_active(id, false).await?);
        }
        Ok(updated)
    }

    async fn bulk_upsert_into_team(
        &mut self,
        team_id: i64,
        members: &[NewMember],
    ) -> CoreResult<Vec<User>> {
        Ok(UserRepository::new(&mut self.tx)
            .upsert_into_team(team_id, members)
            .await?)
    }

    async fn set_user_active(&mut self, id: &str, is_active: bool) -> CoreResult<User> {
        Ok(UserRepository::new(&mut self.tx)
            .set_active(id, is_active)
            .await?)
    }
}

#[async_trait]
impl TeamPort for SqliteTx {
    async fn create_team(&mut self, name: &str) -> CoreResult<Team> {
        Ok(TeamRepository::new(&mut self.tx).create(name).await?)
    }

    async fn get_team_by_name(&mut self, name: &str) -> CoreResult<Team> {
        Ok(TeamRepository::new(&mut self.tx).get_by_name(name).await?)
    }

    async fn get_team_members(&mut self, team_id: i64) -> CoreResult<Vec<User>> {
        Ok(UserRepository::new(&mut self.tx)
            .list_in_team(team_id)
            .await?)
    }

    async fn get_team_of_user(&mut self, user_id: &str) -> CoreResult<Option<Team>> {
        Ok(TeamRepository::new(&mut self.tx).of_user(user_id).await?)
    }
}

#[async_trait]
impl PullRequestPort for SqliteTx {
    async fn create_pull_request(&mut self, pr: &PullRequest) -> CoreResult<()> {
        Ok(PullRequestRepository::new(&mut self.tx).insert(pr).await?)
    }

    async fn set_merged(&mut self, id: &str, merged_at: DateTime<Utc>) -> CoreResult<PullRequest> {
        Ok(PullRequestRepository::new(&mut self.tx)
            .set_merged(id, merged_at)
            .await?)
    }

    async fn get_pull_request_with_reviewers(
        &mut self,
        id: &str,
    ) -> CoreResult<PullRequestWithReviewers> {
        let pr = PullRequestRepository::new(&mut self.tx).get(id).await?;
        let reviewers = ReviewerRepository::new(&mut self.tx).list(id).await?;
        Ok(PullRequestWithReviewers::new(pr, reviewers))
    }

    async fn get_open_by_reviewer_ids(
        &mut self,
        reviewer_ids: &[String],
    ) -> CoreResult<BTreeMap<String, PullRequestWithReviewers>> {
        let prs = PullRequestRepository::new(&mut self.tx)
            .list_open_reviewed_by_any(reviewer_ids)
            .await?;
        let ids: Vec<String> = prs.iter().map(|pr| pr.id.clone()).collect();
        let mut reviewers = ReviewerRepository::new(&mut self.tx).list_many(&ids).await?;
        debug!(
            reviewers = reviewer_ids.len(),
            pull_requests = prs.len(),
            "Loaded affected pull requests"
        );

        Ok(prs
            .into_iter()
            .map(|pr| {
                let assigned = reviewers.remove(&pr.id).unwrap_or_default();
                (pr.id.clone(), PullRequestWithReviewers::new(pr, assigned))
            })
            .collect())
    }

    async fn list_by_reviewer(&mut self, user_id: &str) -> CoreResult<Vec<PullRequest>> {
        Ok(PullRequestRepository::new(&mut self.tx)
            .list_reviewed_by(user_id)
            .await?)
    }
}

#[async_trait]
impl ReviewerPort for SqliteTx {
    async fn add_reviewers(&mut self, pr_id: &str, user_ids: &[String]) -> CoreResult<()> {
        Ok(ReviewerRepository::new(&mut self.tx)
            .add(pr_id, user_ids)
            .await?)
    }

    async fn replace_reviewer(
        &mut self,
        pr_id: &str,
        old_id: &str,
        new_id: &str,
    ) -> CoreResult<String> {
        ReviewerRepository::new(&mut self.tx)
            .replace(pr_id, old_id, new_id)
            .await?;
        Ok(new_id.to_string())
    }

    async fn bulk_replace_reviewers(
        &mut self,
        changes: &BTreeMap<String, ReviewerChange>,
    ) -> CoreResult<()> {
        let mut reviewers = ReviewerRepository::new(&mut self.tx);
        for (pr_id, change) in changes {
            reviewers.remove(pr_id, &change.to_remove).await?;
            reviewers.add(pr_id, &change.to_add).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Transaction for SqliteTx {
    async fn commit(self) -> CoreResult<()> {
        Ok(self.tx.commit().await.map_err(Error::from)?)
    }

    async fn rollback(self) -> CoreResult<()> {
        Ok(self.tx.rollback().await.map_err(Error::from)?)
    }
}
