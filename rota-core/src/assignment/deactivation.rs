//! Team member deactivation with reviewer backfill
//!
//! Deactivating users vacates their reviewer slots on every open pull request
//! they review. Each vacated slot is refilled from the active teammates that
//! stay, or the whole request fails and nobody is deactivated.
//!
//! Affected pull requests are planned in ascending id order and the full plan
//! is built before the first write. Candidates are not reserved across pull
//! requests, so one teammate may backfill several of them; the only uniqueness
//! rule is per pull request.

use std::collections::{BTreeMap, HashSet};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::selector::draw_ids;
use super::{finish, ReviewEngine};
use crate::context::OpContext;
use crate::model::{PullRequestWithReviewers, ReviewerChange, User};
use crate::ports::{PullRequestPort, ReviewerPort, Store, TeamPort, UserPort};
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeactivateMembers {
    pub team_name: String,
    pub member_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deactivation {
    pub team_name: String,
    pub deactivated: Vec<User>,
    /// Every pull request whose reviewer set changed, with its new reviewers
    pub updated_pull_requests: Vec<PullRequestWithReviewers>,
}

/// New reviewer set for one pull request and the diff that produces it
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlannedRefill {
    change: ReviewerChange,
    reviewers: Vec<String>,
}

impl<S: Store> ReviewEngine<S> {
    /// Deactivate team members and refill every reviewer slot they vacate.
    pub async fn deactivate_members(
        &self,
        cx: &OpContext,
        req: DeactivateMembers,
    ) -> Result<Deactivation> {
        let leaving = dedup(&req.member_ids);
        if leaving.is_empty() {
            return Err(Error::EmptyMembers);
        }

        let mut tx = self.begin(cx).await?;
        let result = self
            .deactivate_in(&mut tx, cx, &req.team_name, &leaving)
            .await;
        let done = finish(cx, "deactivate_members", tx, result).await?;

        info!(
            team = %done.team_name,
            deactivated = done.deactivated.len(),
            updated_pull_requests = done.updated_pull_requests.len(),
            "Team members deactivated"
        );
        Ok(done)
    }

    async fn deactivate_in(
        &self,
        tx: &mut S::Tx,
        cx: &OpContext,
        team_name: &str,
        leaving: &[String],
    ) -> Result<Deactivation> {
        cx.check()?;
        let team = tx.get_team_by_name(team_name).await?;
        cx.check()?;
        let members = tx.get_team_members(team.id).await?;

        let member_ids: HashSet<&str> = members.iter().map(|m| m.id.as_str()).collect();
        if let Some(outsider) = leaving.iter().find(|id| !member_ids.contains(id.as_str())) {
            return Err(Error::InvalidMember {
                team_name: team.name.clone(),
                user_id: outsider.clone(),
            });
        }

        let leaving_set: HashSet<&str> = leaving.iter().map(String::as_str).collect();
        let pool: Vec<String> = members
            .iter()
            .filter(|m| m.is_active && !leaving_set.contains(m.id.as_str()))
            .map(|m| m.id.clone())
            .collect();

        cx.check()?;
        let mut affected = tx.get_open_by_reviewer_ids(leaving).await?;
        debug!(
            pool = pool.len(),
            affected = affected.len(),
            "Planning reviewer backfill"
        );

        let plan = self.with_rng(|rng| plan_refills(&affected, &leaving_set, &pool, rng))?;

        if !plan.is_empty() {
            let changes: BTreeMap<String, ReviewerChange> = plan
                .iter()
                .map(|(id, refill)| (id.clone(), refill.change.clone()))
                .collect();
            cx.check()?;
            tx.bulk_replace_reviewers(&changes).await?;
        }

        cx.check()?;
        let deactivated = tx.bulk_deactivate(leaving).await?;

        let updated_pull_requests = plan
            .into_iter()
            .filter_map(|(id, refill)| {
                affected
                    .remove(&id)
                    .map(|pr| PullRequestWithReviewers::new(pr.pull_request, refill.reviewers))
            })
            .collect();

        Ok(Deactivation {
            team_name: team.name,
            deactivated,
            updated_pull_requests,
        })
    }
}

/// Plan a refill for every affected pull request, or fail on the first one that cannot be filled.
fn plan_refills<R: Rng + ?Sized>(
    affected: &BTreeMap<String, PullRequestWithReviewers>,
    leaving: &HashSet<&str>,
    pool: &[String],
    rng: &mut R,
) -> Result<BTreeMap<String, PlannedRefill>> {
    let vacated_somewhere = affected
        .values()
        .any(|pr| pr.reviewers.iter().any(|r| leaving.contains(r.as_str())));
    if pool.is_empty() && vacated_somewhere {
        let first = affected.keys().next().cloned().unwrap_or_default();
        return Err(Error::NoCandidate(first));
    }

    let mut plan = BTreeMap::new();

    for (pr_id, pr) in affected {
        if pr.pull_request.is_merged() {
            continue;
        }

        let (to_remove, to_keep): (Vec<String>, Vec<String>) = pr
            .reviewers
            .iter()
            .cloned()
            .partition(|r| leaving.contains(r.as_str()));

        if to_remove.is_empty() {
            continue;
        }

        let candidates: Vec<String> = pool
            .iter()
            .filter(|id| **id != pr.pull_request.author_id && !pr.has_reviewer(id))
            .cloned()
            .collect();

        let to_add = draw_ids(candidates, to_remove.len(), rng)
            .ok_or_else(|| Error::NoCandidate(pr_id.clone()))?;

        let mut reviewers = to_keep;
        reviewers.extend(to_add.iter().cloned());

        plan.insert(
            pr_id.clone(),
            PlannedRefill {
                change: ReviewerChange { to_add, to_remove },
                reviewers,
            },
        );
    }

    Ok(plan)
}

/// Drop repeated ids, keeping first occurrence order
fn dedup(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PrStatus, PullRequest};
    use crate::store::InMemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn store_with_team(ids: &[&str]) -> InMemoryStore {
        let store = InMemoryStore::new();
        store.seed_team(1, "eng");
        for id in ids {
            store.seed_user(User::new(*id, *id, Some(1)));
        }
        store
    }

    fn request(ids: &[&str]) -> DeactivateMembers {
        DeactivateMembers {
            team_name: "eng".to_string(),
            member_ids: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_deactivation_refills_vacated_slot() {
        let store = store_with_team(&["u1", "u2", "u3", "u4"]);
        store.seed_pull_request(
            PullRequest::open("pr-1001", "x", "u1", false),
            &["u2", "u3"],
        );
        let engine = ReviewEngine::with_seed(store, 1);

        let out = engine
            .deactivate_members(&OpContext::background(), request(&["u2"]))
            .await
            .unwrap();

        assert_eq!(out.deactivated.len(), 1);
        assert_eq!(out.deactivated[0].id, "u2");
        assert!(!out.deactivated[0].is_active);
        assert_eq!(out.updated_pull_requests.len(), 1);
        assert_eq!(out.updated_pull_requests[0].reviewers, ids(&["u3", "u4"]));
        assert_eq!(
            out.updated_pull_requests[0].pull_request.status,
            PrStatus::Open
        );

        let store = engine.store();
        assert_eq!(store.snapshot_reviewers("pr-1001"), ids(&["u3", "u4"]));
        assert!(!store.snapshot_user("u2").unwrap().is_active);
    }

    #[tokio::test]
    async fn test_one_unfillable_pull_request_aborts_everything() {
        let store = store_with_team(&["u1", "u2", "u3", "u4", "u5"]);
        store.seed_pull_request(PullRequest::open("pr-1", "a", "u1", false), &["u2", "u3"]);
        store.seed_pull_request(PullRequest::open("pr-2", "b", "u5", false), &["u2", "u3"]);
        store.seed_user(User::new("u5", "u5", Some(1)).with_active(false));
        let engine = ReviewEngine::with_seed(store, 1);

        let err = engine
            .deactivate_members(&OpContext::background(), request(&["u2", "u3"]))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NoCandidate(_)));
        let store = engine.store();
        assert!(store.snapshot_user("u2").unwrap().is_active);
        assert!(store.snapshot_user("u3").unwrap().is_active);
        assert_eq!(store.snapshot_reviewers("pr-1"), ids(&["u2", "u3"]));
        assert_eq!(store.snapshot_reviewers("pr-2"), ids(&["u2", "u3"]));
    }

    #[tokio::test]
    async fn test_failure_after_a_fillable_pull_request_rolls_it_back() {
        // pr-a sorts first and can be refilled; pr-b cannot, its author and
        // other reviewer are all that is left
        let store = store_with_team(&["u1", "u2", "u3"]);
        store.seed_pull_request(PullRequest::open("pr-a", "a", "u1", true), &["u2"]);
        store.seed_pull_request(PullRequest::open("pr-b", "b", "u3", false), &["u2", "u1"]);
        let engine = ReviewEngine::with_seed(store, 2);

        let err = engine
            .deactivate_members(&OpContext::background(), request(&["u2"]))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NoCandidate(ref id) if id == "pr-b"));
        assert_eq!(engine.store().snapshot_reviewers("pr-a"), ids(&["u2"]));
        assert!(engine.store().snapshot_user("u2").unwrap().is_active);
    }

    #[tokio::test]
    async fn test_member_of_other_team_is_rejected() {
        let store = store_with_team(&["u1", "u2"]);
        store.seed_team(2, "ops");
        store.seed_user(User::new("o1", "o1", Some(2)));
        let engine = ReviewEngine::with_seed(store, 1);

        let err = engine
            .deactivate_members(&OpContext::background(), request(&["u2", "o1"]))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidMember { ref user_id, .. } if user_id == "o1"));
        assert_eq!(err.kind(), crate::ErrorKind::InvalidRequest);
        assert!(engine.store().snapshot_user("u2").unwrap().is_active);
    }

    #[tokio::test]
    async fn test_empty_and_unknown_team() {
        let engine = ReviewEngine::with_seed(store_with_team(&["u1"]), 1);
        let cx = OpContext::background();

        let err = engine
            .deactivate_members(&cx, request(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyMembers));

        let err = engine
            .deactivate_members(
                &cx,
                DeactivateMembers {
                    team_name: "nope".to_string(),
                    member_ids: ids(&["u1"]),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TeamNotFound(_)));
    }

    #[tokio::test]
    async fn test_last_members_without_reviews_can_leave() {
        let store = store_with_team(&["u1", "u2"]);
        store.seed_pull_request(PullRequest::open("pr-1", "a", "u1", true), &[]);
        let engine = ReviewEngine::with_seed(store, 1);

        let out = engine
            .deactivate_members(&OpContext::background(), request(&["u1", "u2", "u1"]))
            .await
            .unwrap();

        assert_eq!(out.deactivated.len(), 2);
        assert!(out.updated_pull_requests.is_empty());
    }

    #[tokio::test]
    async fn test_empty_pool_with_reviews_fails() {
        let store = store_with_team(&["u1", "u2"]);
        store.seed_pull_request(PullRequest::open("pr-1", "a", "u1", true), &["u2"]);
        let engine = ReviewEngine::with_seed(store, 1);

        let err = engine
            .deactivate_members(&OpContext::background(), request(&["u1", "u2"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoCandidate(_)));
    }

    #[tokio::test]
    async fn test_merged_pull_requests_are_frozen() {
        let store = store_with_team(&["u1", "u2", "u3"]);
        let mut merged = PullRequest::open("pr-old", "old", "u1", false);
        merged.status = PrStatus::Merged;
        merged.merged_at = Some(chrono::Utc::now());
        store.seed_pull_request(merged, &["u2", "u3"]);
        let engine = ReviewEngine::with_seed(store, 1);

        let out = engine
            .deactivate_members(&OpContext::background(), request(&["u2"]))
            .await
            .unwrap();

        assert!(out.updated_pull_requests.is_empty());
        assert_eq!(
            engine.store().snapshot_reviewers("pr-old"),
            ids(&["u2", "u3"])
        );
    }

    #[tokio::test]
    async fn test_same_teammate_may_backfill_several_pull_requests() {
        let store = store_with_team(&["u1", "u2", "u3"]);
        store.seed_pull_request(PullRequest::open("pr-1", "a", "u1", true), &["u2"]);
        store.seed_pull_request(PullRequest::open("pr-2", "b", "u1", true), &["u2"]);
        let engine = ReviewEngine::with_seed(store, 4);

        let out = engine
            .deactivate_members(&OpContext::background(), request(&["u2"]))
            .await
            .unwrap();

        assert_eq!(out.updated_pull_requests.len(), 2);
        for pr in &out.updated_pull_requests {
            assert_eq!(pr.reviewers, ids(&["u3"]));
        }
    }

    #[test]
    fn test_plan_respects_per_pull_request_exclusions() {
        let leaving: HashSet<&str> = HashSet::from(["u2"]);
        let pool = ids(&["u1", "u3", "u4", "u5"]);
        let mut affected = BTreeMap::new();
        affected.insert(
            "pr-1".to_string(),
            PullRequestWithReviewers::new(
                PullRequest::open("pr-1", "a", "u1", false),
                ids(&["u2", "u3"]),
            ),
        );

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let plan = plan_refills(&affected, &leaving, &pool, &mut rng).unwrap();
            let refill = &plan["pr-1"];

            assert_eq!(refill.change.to_remove, ids(&["u2"]));
            assert_eq!(refill.change.to_add.len(), 1);
            let added = refill.change.to_add[0].as_str();
            assert!(added == "u4" || added == "u5");
            assert_eq!(refill.reviewers[0], "u3");
            assert_eq!(refill.reviewers.len(), 2);
        }
    }

    #[test]
    fn test_plan_is_reproducible_for_a_seed() {
        let leaving: HashSet<&str> = HashSet::from(["u2", "u3"]);
        let pool = ids(&["u4", "u5", "u6", "u7"]);
        let mut affected = BTreeMap::new();
        for n in 0..5 {
            let id = format!("pr-{}", n);
            affected.insert(
                id.clone(),
                PullRequestWithReviewers::new(
                    PullRequest::open(id.as_str(), "a", "u1", false),
                    ids(&["u2", "u3"]),
                ),
            );
        }

        let a = plan_refills(&affected, &leaving, &pool, &mut StdRng::seed_from_u64(8)).unwrap();
        let b = plan_refills(&affected, &leaving, &pool, &mut StdRng::seed_from_u64(8)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_dedup_keeps_order() {
        let deduped = dedup(&ids(&["b", "a", "b", "c", "a"]));
        assert_eq!(deduped, ids(&["b", "a", "c"]));
    }
}
