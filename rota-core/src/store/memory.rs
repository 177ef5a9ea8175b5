//! In-memory store
//!
//! Transactions are serialized: `begin` takes an exclusive gate, works on a
//! private copy of the state and publishes it on commit. A transaction that
//! is dropped or rolled back leaves the shared state untouched.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;

use crate::model::{
    NewMember, PrStatus, PullRequest, PullRequestWithReviewers, ReviewerChange, Team, User,
};
use crate::ports::{PullRequestPort, ReviewerPort, Store, TeamPort, Transaction, UserPort};
use crate::{Error, Result};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: BTreeMap<String, User>,
    teams: BTreeMap<i64, Team>,
    pull_requests: BTreeMap<String, PullRequest>,
    /// Reviewer ids per pull request, in assignment order
    reviewers: BTreeMap<String, Vec<String>>,
    next_team_id: i64,
}

/// Process-local [`Store`] with the same semantics as the SQLite store
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a team with a fixed id, bypassing transactions
    pub fn seed_team(&self, id: i64, name: &str) {
        let mut state = self.lock();
        state.teams.insert(
            id,
            Team {
                id,
                name: name.to_string(),
            },
        );
        state.next_team_id = state.next_team_id.max(id);
    }

    /// Insert or overwrite a user, bypassing transactions
    pub fn seed_user(&self, user: User) {
        self.lock().users.insert(user.id.clone(), user);
    }

    /// Insert a pull request with its reviewers, bypassing transactions
    pub fn seed_pull_request(&self, pr: PullRequest, reviewers: &[&str]) {
        let mut state = self.lock();
        state.reviewers.insert(
            pr.id.clone(),
            reviewers.iter().map(|r| r.to_string()).collect(),
        );
        state.pull_requests.insert(pr.id.clone(), pr);
    }

    /// Committed reviewer ids of a pull request
    pub fn snapshot_reviewers(&self, pr_id: &str) -> Vec<String> {
        self.lock()
            .reviewers
            .get(pr_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Committed state of a user
    pub fn snapshot_user(&self, id: &str) -> Option<User> {
        self.lock().users.get(id).cloned()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx> {
        let guard = self.gate.clone().lock_owned().await;
        let working = self.lock().clone();
        Ok(MemoryTx {
            _guard: guard,
            shared: Arc::clone(&self.state),
            working,
        })
    }
}

/// Transaction over a private copy of the store state
pub struct MemoryTx {
    _guard: OwnedMutexGuard<()>,
    shared: Arc<Mutex<MemoryState>>,
    working: MemoryState,
}

impl MemoryTx {
    fn user_mut(&mut self, id: &str) -> Result<&mut User> {
        self.working
            .users
            .get_mut(id)
            .ok_or_else(|| Error::UserNotFound(id.to_string()))
    }

    fn require_user(&self, id: &str) -> Result<()> {
        if self.working.users.contains_key(id) {
            Ok(())
        } else {
            Err(Error::UserNotFound(id.to_string()))
        }
    }

    fn require_pull_request(&self, id: &str) -> Result<&PullRequest> {
        self.working
            .pull_requests
            .get(id)
            .ok_or_else(|| Error::PrNotFound(id.to_string()))
    }

    fn reviewers_of(&self, pr_id: &str) -> Vec<String> {
        self.working
            .reviewers
            .get(pr_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl UserPort for MemoryTx {
    async fn get_user(&mut self, id: &str) -> Result<User> {
        self.user_mut(id).map(|u| u.clone())
    }

    async fn list_active_teammates(
        &mut self,
        team_id: i64,
        exclude_ids: &[String],
        limit: Option<usize>,
    ) -> Result<Vec<User>> {
        let excluded: HashSet<&str> = exclude_ids.iter().map(String::as_str).collect();
        Ok(self
            .working
            .users
            .values()
            .filter(|u| u.is_active && u.team_id == Some(team_id))
            .filter(|u| !excluded.contains(u.id.as_str()))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn bulk_deactivate(&mut self, ids: &[String]) -> Result<Vec<User>> {
        let mut updated = Vec::with_capacity(ids.len());
        for id in ids {
            let user = self.user_mut(id)?;
            user.is_active = false;
            updated.push(user.clone());
        }
        Ok(updated)
    }

    async fn bulk_upsert_into_team(
        &mut self,
        team_id: i64,
        members: &[NewMember],
    ) -> Result<Vec<User>> {
        if !self.working.teams.contains_key(&team_id) {
            return Err(Error::TeamNotFound(team_id.to_string()));
        }

        let mut upserted = Vec::with_capacity(members.len());
        for member in members {
            let user = User::new(member.id.as_str(), member.name.as_str(), Some(team_id))
                .with_active(member.is_active);
            self.working.users.insert(user.id.clone(), user.clone());
            upserted.push(user);
        }
        Ok(upserted)
    }

    async fn set_user_active(&mut self, id: &str, is_active: bool) -> Result<User> {
        let user = self.user_mut(id)?;
        user.is_active = is_active;
        Ok(user.clone())
    }
}

#[async_trait]
impl TeamPort for MemoryTx {
    async fn create_team(&mut self, name: &str) -> Result<Team> {
        if self.working.teams.values().any(|t| t.name == name) {
            return Err(Error::TeamExists(name.to_string()));
        }

        self.working.next_team_id += 1;
        let team = Team {
            id: self.working.next_team_id,
            name: name.to_string(),
        };
        self.working.teams.insert(team.id, team.clone());
        Ok(team)
    }

    async fn get_team_by_name(&mut self, name: &str) -> Result<Team> {
        self.working
            .teams
            .values()
            .find(|t| t.name == name)
            .cloned()
            .ok_or_else(|| Error::TeamNotFound(name.to_string()))
    }

    async fn get_team_members(&mut self, team_id: i64) -> Result<Vec<User>> {
        Ok(self
            .working
            .users
            .values()
            .filter(|u| u.team_id == Some(team_id))
            .cloned()
            .collect())
    }

    async fn get_team_of_user(&mut self, user_id: &str) -> Result<Option<Team>> {
        let team_id = self.user_mut(user_id)?.team_id;
        Ok(team_id.and_then(|id| self.working.teams.get(&id).cloned()))
    }
}

#[async_trait]
impl PullRequestPort for MemoryTx {
    async fn create_pull_request(&mut self, pr: &PullRequest) -> Result<()> {
        if self.working.pull_requests.contains_key(&pr.id) {
            return Err(Error::PrExists(pr.id.clone()));
        }
        self.require_user(&pr.author_id)?;

        self.working.pull_requests.insert(pr.id.clone(), pr.clone());
        self.working.reviewers.insert(pr.id.clone(), Vec::new());
        Ok(())
    }

    async fn set_merged(&mut self, id: &str, merged_at: DateTime<Utc>) -> Result<PullRequest> {
        let pr = self
            .working
            .pull_requests
            .get_mut(id)
            .ok_or_else(|| Error::PrNotFound(id.to_string()))?;
        pr.status = PrStatus::Merged;
        pr.merged_at = Some(merged_at);
        Ok(pr.clone())
    }

    async fn get_pull_request_with_reviewers(
        &mut self,
        id: &str,
    ) -> Result<PullRequestWithReviewers> {
        let pr = self.require_pull_request(id)?.clone();
        Ok(PullRequestWithReviewers::new(pr, self.reviewers_of(id)))
    }

    async fn get_open_by_reviewer_ids(
        &mut self,
        reviewer_ids: &[String],
    ) -> Result<BTreeMap<String, PullRequestWithReviewers>> {
        let wanted: HashSet<&str> = reviewer_ids.iter().map(String::as_str).collect();

        Ok(self
            .working
            .pull_requests
            .values()
            .filter(|pr| pr.status == PrStatus::Open)
            .filter_map(|pr| {
                let reviewers = self.reviewers_of(&pr.id);
                reviewers
                    .iter()
                    .any(|r| wanted.contains(r.as_str()))
                    .then(|| {
                        (
                            pr.id.clone(),
                            PullRequestWithReviewers::new(pr.clone(), reviewers),
                        )
                    })
            })
            .collect())
    }

    async fn list_by_reviewer(&mut self, user_id: &str) -> Result<Vec<PullRequest>> {
        let mut prs: Vec<PullRequest> = self
            .working
            .pull_requests
            .values()
            .filter(|pr| {
                self.working
                    .reviewers
                    .get(&pr.id)
                    .is_some_and(|rs| rs.iter().any(|r| r == user_id))
            })
            .cloned()
            .collect();
        prs.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(prs)
    }
}

#[async_trait]
impl ReviewerPort for MemoryTx {
    async fn add_reviewers(&mut self, pr_id: &str, user_ids: &[String]) -> Result<()> {
        self.require_pull_request(pr_id)?;
        for id in user_ids {
            self.require_user(id)?;
        }

        let reviewers = self.working.reviewers.entry(pr_id.to_string()).or_default();
        for id in user_ids {
            if reviewers.contains(id) {
                return Err(Error::internal(format!(
                    "reviewer {id} already assigned to {pr_id}"
                )));
            }
            reviewers.push(id.clone());
        }
        Ok(())
    }

    async fn replace_reviewer(
        &mut self,
        pr_id: &str,
        old_id: &str,
        new_id: &str,
    ) -> Result<String> {
        self.require_pull_request(pr_id)?;
        self.require_user(new_id)?;

        let reviewers = self.working.reviewers.entry(pr_id.to_string()).or_default();
        let slot = reviewers
            .iter()
            .position(|r| r == old_id)
            .ok_or_else(|| Error::ReviewerNotAssigned {
                pr_id: pr_id.to_string(),
                reviewer_id: old_id.to_string(),
            })?;
        reviewers[slot] = new_id.to_string();
        Ok(new_id.to_string())
    }

    async fn bulk_replace_reviewers(
        &mut self,
        changes: &BTreeMap<String, ReviewerChange>,
    ) -> Result<()> {
        for (pr_id, change) in changes {
            self.require_pull_request(pr_id)?;
            for id in &change.to_add {
                self.require_user(id)?;
            }

            let reviewers = self.working.reviewers.entry(pr_id.clone()).or_default();
            reviewers.retain(|r| !change.to_remove.contains(r));
            reviewers.extend(change.to_add.iter().cloned());
        }
        Ok(())
    }
}

#[async_trait]
impl Transaction for MemoryTx {
    async fn commit(self) -> Result<()> {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        *shared = self.working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.seed_team(1, "eng");
        for id in ["u1", "u2", "u3"] {
            store.seed_user(User::new(id, id, Some(1)));
        }
        store
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_discarded() {
        let store = seeded();

        let mut tx = store.begin().await.unwrap();
        tx.set_user_active("u1", false).await.unwrap();
        tx.rollback().await.unwrap();
        assert!(store.snapshot_user("u1").unwrap().is_active);

        let mut tx = store.begin().await.unwrap();
        tx.set_user_active("u1", false).await.unwrap();
        drop(tx);
        assert!(store.snapshot_user("u1").unwrap().is_active);

        let mut tx = store.begin().await.unwrap();
        tx.set_user_active("u1", false).await.unwrap();
        tx.commit().await.unwrap();
        assert!(!store.snapshot_user("u1").unwrap().is_active);
    }

    #[tokio::test]
    async fn test_teammates_are_ordered_and_filtered() {
        let store = seeded();
        store.seed_user(User::new("u0", "u0", Some(1)).with_active(false));
        store.seed_user(User::new("x1", "x1", Some(2)));

        let mut tx = store.begin().await.unwrap();
        let pool = tx
            .list_active_teammates(1, &["u2".to_string()], None)
            .await
            .unwrap();
        let ids: Vec<_> = pool.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u3"]);

        let limited = tx.list_active_teammates(1, &[], Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, "u1");
    }

    #[tokio::test]
    async fn test_create_pull_request_conflicts() {
        let store = seeded();
        let mut tx = store.begin().await.unwrap();

        let pr = PullRequest::open("pr-1", "one", "u1", true);
        tx.create_pull_request(&pr).await.unwrap();

        let dup = PullRequest::open("pr-1", "again", "ghost", true);
        assert!(matches!(
            tx.create_pull_request(&dup).await,
            Err(Error::PrExists(_))
        ));

        let orphan = PullRequest::open("pr-2", "two", "ghost", true);
        assert!(matches!(
            tx.create_pull_request(&orphan).await,
            Err(Error::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_replace_keeps_position() {
        let store = seeded();
        store.seed_pull_request(PullRequest::open("pr-1", "one", "u1", false), &["u2", "u3"]);

        let mut tx = store.begin().await.unwrap();
        tx.replace_reviewer("pr-1", "u2", "u1").await.unwrap();
        let err = tx.replace_reviewer("pr-1", "u2", "u1").await.unwrap_err();
        assert!(matches!(err, Error::ReviewerNotAssigned { .. }));
        tx.commit().await.unwrap();

        assert_eq!(store.snapshot_reviewers("pr-1"), vec!["u1", "u3"]);
    }

    #[tokio::test]
    async fn test_open_by_reviewer_ids_skips_merged() {
        let store = seeded();
        store.seed_pull_request(PullRequest::open("pr-1", "one", "u1", false), &["u2", "u3"]);
        store.seed_pull_request(PullRequest::open("pr-2", "two", "u1", true), &["u3"]);
        store.seed_pull_request(PullRequest::open("pr-3", "three", "u3", true), &["u1"]);

        let mut tx = store.begin().await.unwrap();
        tx.set_merged("pr-2", Utc::now()).await.unwrap();

        let open = tx
            .get_open_by_reviewer_ids(&["u3".to_string()])
            .await
            .unwrap();
        assert_eq!(open.keys().collect::<Vec<_>>(), vec!["pr-1"]);
        assert_eq!(open["pr-1"].reviewers, vec!["u2", "u3"]);

        let reviewed = tx.list_by_reviewer("u3").await.unwrap();
        assert_eq!(reviewed.len(), 2);
    }

    #[tokio::test]
    async fn test_bulk_replace_appends_new_reviewers() {
        let store = seeded();
        store.seed_user(User::new("u4", "u4", Some(1)));
        store.seed_pull_request(PullRequest::open("pr-1", "one", "u1", false), &["u2", "u3"]);

        let mut changes = BTreeMap::new();
        changes.insert(
            "pr-1".to_string(),
            ReviewerChange {
                to_add: vec!["u4".to_string()],
                to_remove: vec!["u2".to_string()],
            },
        );

        let mut tx = store.begin().await.unwrap();
        tx.bulk_replace_reviewers(&changes).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.snapshot_reviewers("pr-1"), vec!["u3", "u4"]);
    }

    #[tokio::test]
    async fn test_transactions_are_serialized() {
        let store = seeded();
        let first = store.begin().await.unwrap();

        let wait = std::time::Duration::from_millis(20);
        let second = tokio::time::timeout(wait, store.begin()).await;
        assert!(second.is_err());

        drop(first);
        assert!(store.begin().await.is_ok());
    }
}
