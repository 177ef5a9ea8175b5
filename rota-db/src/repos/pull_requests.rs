//! Repository for pull requests

use chrono::{DateTime, Utc};
use rota_core::model::{PrStatus, PullRequest};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::error::{Error, Result};

#[derive(Debug, sqlx::FromRow)]
struct PullRequestRow {
    id: String,
    name: String,
    author_id: String,
    status: String,
    need_more_reviewers: bool,
    created_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
}

impl TryFrom<PullRequestRow> for PullRequest {
    type Error = Error;

    fn try_from(row: PullRequestRow) -> Result<Self> {
        let status: PrStatus = row
            .status
            .parse()
            .map_err(|_| Error::InvalidData(format!("status {:?} on {}", row.status, row.id)))?;

        Ok(PullRequest {
            id: row.id,
            name: row.name,
            author_id: row.author_id,
            status,
            need_more_reviewers: row.need_more_reviewers,
            created_at: row.created_at,
            merged_at: row.merged_at,
        })
    }
}

fn decode_all(rows: Vec<PullRequestRow>) -> Result<Vec<PullRequest>> {
    rows.into_iter().map(PullRequest::try_from).collect()
}

const SELECT_PR: &str = r#"
    SELECT p.id, p.name, p.author_id, p.status, p.need_more_reviewers, p.created_at, p.merged_at
    FROM pull_requests p
"#;

pub struct PullRequestRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> PullRequestRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Insert a new pull request
    ///
    /// A duplicate id wins over an unknown author.
    pub async fn insert(&mut self, pr: &PullRequest) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pull_requests (
                id, name, author_id, status, need_more_reviewers, created_at, merged_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&pr.id)
        .bind(&pr.name)
        .bind(&pr.author_id)
        .bind(pr.status.as_str())
        .bind(pr.need_more_reviewers)
        .bind(pr.created_at)
        .bind(pr.merged_at)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| {
            if Error::is_unique_violation(&e) {
                Error::PullRequestExists(pr.id.clone())
            } else if Error::is_foreign_key_violation(&e) {
                Error::UserNotFound(pr.author_id.clone())
            } else {
                e.into()
            }
        })?;

        Ok(())
    }

    pub async fn get(&mut self, id: &str) -> Result<PullRequest> {
        sqlx::query_as::<_, PullRequestRow>(&format!("{SELECT_PR} WHERE p.id = ?"))
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?
            .ok_or_else(|| Error::PullRequestNotFound(id.to_string()))?
            .try_into()
    }

    /// Move a pull request to `MERGED` and return the updated record
    pub async fn set_merged(&mut self, id: &str, merged_at: DateTime<Utc>) -> Result<PullRequest> {
        let result = sqlx::query("UPDATE pull_requests SET status = ?, merged_at = ? WHERE id = ?")
            .bind(PrStatus::Merged.as_str())
            .bind(merged_at)
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::PullRequestNotFound(id.to_string()));
        }
        self.get(id).await
    }

    /// Open pull requests reviewed by any of `reviewer_ids`, ordered by id
    pub async fn list_open_reviewed_by_any(
        &mut self,
        reviewer_ids: &[String],
    ) -> Result<Vec<PullRequest>> {
        if reviewer_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(SELECT_PR);
        query.push(
            " WHERE p.status = 'OPEN' AND EXISTS (SELECT 1 FROM pr_reviewers r \
             WHERE r.pr_id = p.id AND r.reviewer_id IN (",
        );
        let mut ids = query.separated(", ");
        for id in reviewer_ids {
            ids.push_bind(id.clone());
        }
        ids.push_unseparated(")) ORDER BY p.id");

        let rows = query
            .build_query_as::<PullRequestRow>()
            .fetch_all(&mut *self.conn)
            .await?;
        decode_all(rows)
    }

    /// Every pull request reviewed by `user_id`, oldest first
    pub async fn list_reviewed_by(&mut self, user_id: &str) -> Result<Vec<PullRequest>> {
        let rows = sqlx::query_as::<_, PullRequestRow>(&format!(
            "{SELECT_PR} JOIN pr_reviewers r ON r.pr_id = p.id \
             WHERE r.reviewer_id = ? ORDER BY p.created_at, p.id"
        ))
        .bind(user_id)
        .fetch_all(&mut *self.conn)
        .await?;
        decode_all(rows)
    }
}
