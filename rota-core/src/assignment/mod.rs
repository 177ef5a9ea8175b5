//! Reviewer assignment engine
//!
//! [`ReviewEngine`] runs every operation inside one store transaction:
//! read state through the ports, decide in memory, write back, then commit.
//! Any error after `begin` rolls the whole transaction back.

pub mod deactivation;
pub mod directory;
pub mod lifecycle;
pub mod reassign;
pub mod selector;

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::warn;

use crate::context::OpContext;
use crate::ports::{Store, Transaction};
use crate::Result;

pub use deactivation::{DeactivateMembers, Deactivation};
pub use directory::{
    NewTeam, PullRequestShort, SetUserActive, TeamRoster, UserReviews, UserWithTeam,
};
pub use lifecycle::{CreatePullRequest, MergePullRequest};
pub use reassign::{ReassignReviewer, Reassignment};
pub use selector::select_candidates;

/// Entry point for every assignment operation
pub struct ReviewEngine<S> {
    store: S,
    rng: Mutex<StdRng>,
}

impl<S: Store> ReviewEngine<S> {
    /// Create an engine seeded from OS entropy
    pub fn new(store: S) -> Self {
        Self {
            store,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Create an engine with a fixed seed, for reproducible selection
    pub fn with_seed(store: S, seed: u64) -> Self {
        Self {
            store,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Build from an optional configured seed
    pub fn from_seed(store: S, seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::with_seed(store, seed),
            None => Self::new(store),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run `f` with exclusive access to the random source
    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }

    /// Open a transaction, honouring the context
    async fn begin(&self, cx: &OpContext) -> Result<S::Tx> {
        cx.check()?;
        self.store.begin().await
    }
}

/// Commit on success, roll back on failure or cancellation.
async fn finish<T, X: Transaction>(
    cx: &OpContext,
    op: &'static str,
    tx: X,
    result: Result<T>,
) -> Result<T> {
    let result = result.and_then(|value| cx.check().map(|()| value));

    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            warn!(op, error = %err, "rolling back");
            if let Err(rollback_err) = tx.rollback().await {
                warn!(op, error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
