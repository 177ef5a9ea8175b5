//! Pull request creation and merge
//!
//! A pull request starts `OPEN` with up to [`MAX_REVIEWERS`] reviewers drawn
//! from the author's team, and moves one way to `MERGED`. Merging freezes the
//! reviewer set and never touches `need_more_reviewers`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::selector::select_candidates;
use super::{finish, ReviewEngine};
use crate::context::OpContext;
use crate::model::{PullRequest, PullRequestWithReviewers, MAX_REVIEWERS};
use crate::ports::{PullRequestPort, ReviewerPort, Store, UserPort};
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePullRequest {
    pub id: String,
    pub name: String,
    pub author_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergePullRequest {
    pub id: String,
}

impl<S: Store> ReviewEngine<S> {
    /// Create an open pull request and assign up to two reviewers from the author's team.
    ///
    /// Zero eligible teammates is not an error: the pull request is stored
    /// without reviewers and flagged `need_more_reviewers`.
    pub async fn create_pull_request(
        &self,
        cx: &OpContext,
        req: CreatePullRequest,
    ) -> Result<PullRequestWithReviewers> {
        let mut tx = self.begin(cx).await?;
        let result = self.create_in(&mut tx, cx, &req).await;
        let created = finish(cx, "create_pull_request", tx, result).await?;

        info!(
            pr_id = %created.pull_request.id,
            author_id = %created.pull_request.author_id,
            reviewers = ?created.reviewers,
            need_more_reviewers = created.pull_request.need_more_reviewers,
            "Pull request created"
        );
        Ok(created)
    }

    async fn create_in(
        &self,
        tx: &mut S::Tx,
        cx: &OpContext,
        req: &CreatePullRequest,
    ) -> Result<PullRequestWithReviewers> {
        cx.check()?;
        let author = tx.get_user(&req.author_id).await?;

        let reviewer_ids: Vec<String> = match author.team_id {
            Some(team_id) => {
                let exclude = vec![author.id.clone()];
                cx.check()?;
                let pool = tx.list_active_teammates(team_id, &exclude, None).await?;
                debug!(pool = pool.len(), team_id, "Selecting reviewers");

                self.with_rng(|rng| select_candidates(&pool, team_id, &exclude, MAX_REVIEWERS, rng))
                    .into_iter()
                    .map(|u| u.id)
                    .collect()
            }
            None => Vec::new(),
        };

        let pr = PullRequest::open(
            req.id.as_str(),
            req.name.as_str(),
            author.id.as_str(),
            reviewer_ids.len() < MAX_REVIEWERS,
        );

        cx.check()?;
        tx.create_pull_request(&pr).await?;

        if !reviewer_ids.is_empty() {
            cx.check()?;
            tx.add_reviewers(&pr.id, &reviewer_ids).await?;
        }

        Ok(PullRequestWithReviewers::new(pr, reviewer_ids))
    }

    /// Mark a pull request merged.
    ///
    /// Merging an already merged pull request succeeds and returns it as
    /// stored, keeping the original `merged_at`.
    pub async fn merge_pull_request(
        &self,
        cx: &OpContext,
        req: MergePullRequest,
    ) -> Result<PullRequestWithReviewers> {
        let mut tx = self.begin(cx).await?;
        let result = Self::merge_in(&mut tx, cx, &req).await;
        let merged = finish(cx, "merge_pull_request", tx, result).await?;

        info!(pr_id = %merged.pull_request.id, "Pull request merged");
        Ok(merged)
    }

    async fn merge_in(
        tx: &mut S::Tx,
        cx: &OpContext,
        req: &MergePullRequest,
    ) -> Result<PullRequestWithReviewers> {
        cx.check()?;
        let current = tx.get_pull_request_with_reviewers(&req.id).await?;

        if current.pull_request.is_merged() {
            debug!(pr_id = %req.id, "Already merged");
            return Ok(current);
        }

        cx.check()?;
        let merged = tx.set_merged(&req.id, Utc::now()).await?;
        Ok(PullRequestWithReviewers::new(merged, current.reviewers))
    }
}
