//! Team roster and user bookkeeping

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{finish, ReviewEngine};
use crate::context::OpContext;
use crate::model::{NewMember, PrStatus, PullRequest, User};
use crate::ports::{PullRequestPort, Store, TeamPort, UserPort};
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTeam {
    pub name: String,
    pub members: Vec<NewMember>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRoster {
    pub team_name: String,
    pub members: Vec<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetUserActive {
    pub user_id: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserWithTeam {
    #[serde(flatten)]
    pub user: User,
    pub team_name: Option<String>,
}

/// Short form of a pull request in a reviewer's queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestShort {
    pub id: String,
    pub name: String,
    pub author_id: String,
    pub status: PrStatus,
}

impl From<PullRequest> for PullRequestShort {
    fn from(pr: PullRequest) -> Self {
        Self {
            id: pr.id,
            name: pr.name,
            author_id: pr.author_id,
            status: pr.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReviews {
    pub user_id: String,
    pub pull_requests: Vec<PullRequestShort>,
}

impl<S: Store> ReviewEngine<S> {
    /// Create a team and move every listed member into it.
    ///
    /// Existing users are overwritten (name, active flag, team).
    pub async fn add_team(&self, cx: &OpContext, req: NewTeam) -> Result<TeamRoster> {
        if req.members.is_empty() {
            return Err(Error::EmptyMembers);
        }

        let mut tx = self.begin(cx).await?;
        let result = Self::add_team_in(&mut tx, cx, &req).await;
        let roster = finish(cx, "add_team", tx, result).await?;

        info!(team = %roster.team_name, members = roster.members.len(), "Team created");
        Ok(roster)
    }

    async fn add_team_in(tx: &mut S::Tx, cx: &OpContext, req: &NewTeam) -> Result<TeamRoster> {
        cx.check()?;
        let team = tx.create_team(&req.name).await?;
        cx.check()?;
        let members = tx.bulk_upsert_into_team(team.id, &req.members).await?;

        Ok(TeamRoster {
            team_name: team.name,
            members,
        })
    }

    pub async fn get_team(&self, cx: &OpContext, team_name: &str) -> Result<TeamRoster> {
        let mut tx = self.begin(cx).await?;
        let result = async {
            cx.check()?;
            let team = tx.get_team_by_name(team_name).await?;
            cx.check()?;
            let members = tx.get_team_members(team.id).await?;
            Ok::<_, Error>(TeamRoster {
                team_name: team.name,
                members,
            })
        }
        .await;
        finish(cx, "get_team", tx, result).await
    }

    /// Flip one user's active flag.
    ///
    /// This does not touch reviewer assignments; use
    /// [`ReviewEngine::deactivate_members`] to backfill vacated slots.
    pub async fn set_user_active(
        &self,
        cx: &OpContext,
        req: SetUserActive,
    ) -> Result<UserWithTeam> {
        let mut tx = self.begin(cx).await?;
        let result = async {
            cx.check()?;
            let user = tx.set_user_active(&req.user_id, req.is_active).await?;
            cx.check()?;
            let team = tx.get_team_of_user(&user.id).await?;
            Ok::<_, Error>(UserWithTeam {
                user,
                team_name: team.map(|t| t.name),
            })
        }
        .await;
        let updated = finish(cx, "set_user_active", tx, result).await?;

        info!(user_id = %updated.user.id, is_active = updated.user.is_active, "User updated");
        Ok(updated)
    }

    /// Every pull request the user reviews, open or merged
    pub async fn reviews_for(&self, cx: &OpContext, user_id: &str) -> Result<UserReviews> {
        let mut tx = self.begin(cx).await?;
        let result = async {
            cx.check()?;
            tx.get_user(user_id).await?;
            cx.check()?;
            let prs = tx.list_by_reviewer(user_id).await?;
            Ok::<_, Error>(UserReviews {
                user_id: user_id.to_string(),
                pull_requests: prs.into_iter().map(PullRequestShort::from).collect(),
            })
        }
        .await;
        finish(cx, "reviews_for", tx, result).await
    }
}
