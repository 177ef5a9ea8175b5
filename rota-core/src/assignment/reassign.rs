//! Single reviewer reassignment

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::selector::select_candidates;
use super::{finish, ReviewEngine};
use crate::context::OpContext;
use crate::model::PullRequestWithReviewers;
use crate::ports::{PullRequestPort, ReviewerPort, Store, TeamPort, UserPort};
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReassignReviewer {
    pub pull_request_id: String,
    pub old_reviewer_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reassignment {
    pub pull_request: PullRequestWithReviewers,
    pub replaced_by: String,
}

impl<S: Store> ReviewEngine<S> {
    /// Replace one reviewer of an open pull request with a random active teammate.
    ///
    /// Membership is checked before the merged state, so an id that was never
    /// assigned reports `ReviewerNotAssigned` even on a merged pull request.
    /// The new reviewer takes the old one's position in the reviewer list.
    pub async fn reassign_reviewer(
        &self,
        cx: &OpContext,
        req: ReassignReviewer,
    ) -> Result<Reassignment> {
        let mut tx = self.begin(cx).await?;
        let result = self.reassign_in(&mut tx, cx, &req).await;
        let reassigned = finish(cx, "reassign_reviewer", tx, result).await?;

        info!(
            pr_id = %req.pull_request_id,
            old_reviewer_id = %req.old_reviewer_id,
            new_reviewer_id = %reassigned.replaced_by,
            "Reviewer reassigned"
        );
        Ok(reassigned)
    }

    async fn reassign_in(
        &self,
        tx: &mut S::Tx,
        cx: &OpContext,
        req: &ReassignReviewer,
    ) -> Result<Reassignment> {
        cx.check()?;
        tx.get_user(&req.old_reviewer_id).await?;

        cx.check()?;
        let mut current = tx
            .get_pull_request_with_reviewers(&req.pull_request_id)
            .await?;
        let pr_id = current.pull_request.id.clone();

        let slot = current
            .reviewers
            .iter()
            .position(|r| *r == req.old_reviewer_id)
            .ok_or_else(|| Error::ReviewerNotAssigned {
                pr_id: pr_id.clone(),
                reviewer_id: req.old_reviewer_id.clone(),
            })?;

        if current.pull_request.is_merged() {
            return Err(Error::PrMerged(pr_id));
        }

        let author_id = current.pull_request.author_id.clone();
        cx.check()?;
        let team = tx
            .get_team_of_user(&author_id)
            .await?
            .ok_or_else(|| Error::NoCandidate(pr_id.clone()))?;

        let mut exclude = current.reviewers.clone();
        exclude.push(author_id);

        cx.check()?;
        let pool = tx.list_active_teammates(team.id, &exclude, None).await?;
        debug!(
            pool = pool.len(),
            team_id = team.id,
            "Selecting replacement"
        );

        let candidate = self
            .with_rng(|rng| select_candidates(&pool, team.id, &exclude, 1, rng))
            .into_iter()
            .next()
            .ok_or_else(|| Error::NoCandidate(pr_id.clone()))?;

        cx.check()?;
        let new_id = tx
            .replace_reviewer(&pr_id, &req.old_reviewer_id, &candidate.id)
            .await?;
        current.reviewers[slot] = new_id.clone();

        Ok(Reassignment {
            pull_request: current,
            replaced_by: new_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PrStatus, PullRequest, User};
    use crate::store::InMemoryStore;

    /// Team 1 with u1..u4 active and pr-1001 by u1 reviewed by u2 and u3
    fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.seed_team(1, "eng");
        for id in ["u1", "u2", "u3", "u4"] {
            store.seed_user(User::new(id, id, Some(1)));
        }
        store.seed_pull_request(
            PullRequest::open("pr-1001", "Add search", "u1", false),
            &["u2", "u3"],
        );
        store
    }

    fn reassign(pr: &str, old: &str) -> ReassignReviewer {
        ReassignReviewer {
            pull_request_id: pr.to_string(),
            old_reviewer_id: old.to_string(),
        }
    }

    #[tokio::test]
    async fn test_reassign_picks_the_only_free_teammate() {
        let engine = ReviewEngine::with_seed(seeded_store(), 1);
        let out = engine
            .reassign_reviewer(&OpContext::background(), reassign("pr-1001", "u2"))
            .await
            .unwrap();

        assert_eq!(out.replaced_by, "u4");
        let expected = vec!["u4".to_string(), "u3".to_string()];
        assert_eq!(out.pull_request.reviewers, expected);

        let stored = engine.store().snapshot_reviewers("pr-1001");
        assert_eq!(stored, expected);
    }

    #[tokio::test]
    async fn test_new_reviewer_is_never_old_author_or_existing() {
        for seed in 0..30 {
            let store = seeded_store();
            for id in ["u5", "u6", "u7"] {
                store.seed_user(User::new(id, id, Some(1)));
            }
            store.seed_user(User::new("x1", "x1", Some(2)));
            let engine = ReviewEngine::with_seed(store, seed);

            let out = engine
                .reassign_reviewer(&OpContext::background(), reassign("pr-1001", "u3"))
                .await
                .unwrap();

            assert!(!["u1", "u2", "u3", "x1"].contains(&out.replaced_by.as_str()));
            assert_eq!(out.pull_request.reviewers[0], "u2");
            assert_eq!(out.pull_request.reviewers[1], out.replaced_by);
        }
    }

    #[tokio::test]
    async fn test_no_active_candidate() {
        let store = seeded_store();
        store.seed_user(User::new("u4", "u4", Some(1)).with_active(false));
        let engine = ReviewEngine::with_seed(store, 1);

        let err = engine
            .reassign_reviewer(&OpContext::background(), reassign("pr-1001", "u2"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NoCandidate(_)));
        assert_eq!(err.kind(), crate::ErrorKind::ResourceExhausted);
        assert_eq!(
            engine.store().snapshot_reviewers("pr-1001"),
            vec!["u2".to_string(), "u3".to_string()]
        );
    }

    #[tokio::test]
    async fn test_not_assigned_reported_before_merged() {
        let store = seeded_store();
        store.seed_user(User::new("u5", "u5", Some(1)));
        let engine = ReviewEngine::with_seed(store, 1);
        let cx = OpContext::background();
        engine
            .merge_pull_request(
                &cx,
                crate::assignment::MergePullRequest {
                    id: "pr-1001".to_string(),
                },
            )
            .await
            .unwrap();

        let err = engine
            .reassign_reviewer(&cx, reassign("pr-1001", "u5"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ReviewerNotAssigned { .. }));

        let err = engine
            .reassign_reviewer(&cx, reassign("pr-1001", "u2"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PrMerged(_)));
        assert_eq!(err.code(), "PR_MERGED");
    }

    #[tokio::test]
    async fn test_unknown_user_and_pull_request() {
        let engine = ReviewEngine::with_seed(seeded_store(), 1);
        let cx = OpContext::background();

        let err = engine
            .reassign_reviewer(&cx, reassign("pr-1001", "ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UserNotFound(_)));

        let err = engine
            .reassign_reviewer(&cx, reassign("pr-404", "u2"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PrNotFound(_)));
    }

    #[tokio::test]
    async fn test_status_untouched_by_reassign() {
        let engine = ReviewEngine::with_seed(seeded_store(), 9);
        let out = engine
            .reassign_reviewer(&OpContext::background(), reassign("pr-1001", "u3"))
            .await
            .unwrap();
        assert_eq!(out.pull_request.pull_request.status, PrStatus::Open);
        assert!(!out.pull_request.pull_request.need_more_reviewers);
    }
}
