//! Repository for reviewer assignments
//!
//! Rows keep their rowid for their whole life, so `ORDER BY rowid` is the
//! assignment order and an in-place replacement keeps the slot.

use std::collections::BTreeMap;

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::error::{Error, Result};

pub struct ReviewerRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ReviewerRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Reviewer ids of a pull request in assignment order
    pub async fn list(&mut self, pr_id: &str) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT reviewer_id FROM pr_reviewers WHERE pr_id = ? ORDER BY rowid")
            .bind(pr_id)
            .fetch_all(&mut *self.conn)
            .await
            .map_err(Into::into)
    }

    /// Reviewer ids for several pull requests at once
    pub async fn list_many(&mut self, pr_ids: &[String]) -> Result<BTreeMap<String, Vec<String>>> {
        let mut by_pr: BTreeMap<String, Vec<String>> =
            pr_ids.iter().map(|id| (id.clone(), Vec::new())).collect();
        if pr_ids.is_empty() {
            return Ok(by_pr);
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT pr_id, reviewer_id FROM pr_reviewers WHERE pr_id IN (",
        );
        let mut ids = query.separated(", ");
        for id in pr_ids {
            ids.push_bind(id.clone());
        }
        ids.push_unseparated(") ORDER BY rowid");

        let rows: Vec<(String, String)> = query.build_query_as().fetch_all(&mut *self.conn).await?;
        for (pr_id, reviewer_id) in rows {
            by_pr.entry(pr_id).or_default().push(reviewer_id);
        }
        Ok(by_pr)
    }

    /// Append reviewers to a pull request
    pub async fn add(&mut self, pr_id: &str, reviewer_ids: &[String]) -> Result<()> {
        for reviewer_id in reviewer_ids {
            sqlx::query("INSERT INTO pr_reviewers (pr_id, reviewer_id) VALUES (?, ?)")
                .bind(pr_id)
                .bind(reviewer_id)
                .execute(&mut *self.conn)
                .await
                .map_err(|e| {
                    if Error::is_foreign_key_violation(&e) {
                        Error::UserNotFound(reviewer_id.clone())
                    } else if Error::is_unique_violation(&e) {
                        Error::InvalidData(format!("{reviewer_id} already reviews {pr_id}"))
                    } else {
                        e.into()
                    }
                })?;
        }
        Ok(())
    }

    /// Swap one reviewer for another in place
    pub async fn replace(&mut self, pr_id: &str, old_id: &str, new_id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE pr_reviewers SET reviewer_id = ? WHERE pr_id = ? AND reviewer_id = ?",
        )
        .bind(new_id)
        .bind(pr_id)
        .bind(old_id)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| {
            if Error::is_foreign_key_violation(&e) {
                Error::UserNotFound(new_id.to_string())
            } else {
                e.into()
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::ReviewerNotAssigned {
                pr_id: pr_id.to_string(),
                reviewer_id: old_id.to_string(),
            });
        }
        Ok(())
    }

    pub async fn remove(&mut self, pr_id: &str, reviewer_ids: &[String]) -> Result<()> {
        for reviewer_id in reviewer_ids {
            sqlx::query("DELETE FROM pr_reviewers WHERE pr_id = ? AND reviewer_id = ?")
                .bind(pr_id)
                .bind(reviewer_id)
                .execute(&mut *self.conn)
                .await?;
        }
        Ok(())
    }
}
