//! Repository for teams

use rota_core::model::Team;
use sqlx::SqliteConnection;

use crate::error::{Error, Result};

#[derive(Debug, sqlx::FromRow)]
struct TeamRow {
    id: i64,
    name: String,
}

impl From<TeamRow> for Team {
    fn from(row: TeamRow) -> Self {
        Team {
            id: row.id,
            name: row.name,
        }
    }
}

pub struct TeamRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> TeamRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Create a team, failing on a duplicate name
    pub async fn create(&mut self, name: &str) -> Result<Team> {
        let result = sqlx::query("INSERT INTO teams (name) VALUES (?)")
            .bind(name)
            .execute(&mut *self.conn)
            .await
            .map_err(|e| {
                if Error::is_unique_violation(&e) {
                    Error::TeamExists(name.to_string())
                } else {
                    e.into()
                }
            })?;

        Ok(Team {
            id: result.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    pub async fn get_by_name(&mut self, name: &str) -> Result<Team> {
        sqlx::query_as::<_, TeamRow>("SELECT id, name FROM teams WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *self.conn)
            .await?
            .map(Team::from)
            .ok_or_else(|| Error::TeamNotFound(name.to_string()))
    }

    /// Team of a user; `None` when the user has no team
    pub async fn of_user(&mut self, user_id: &str) -> Result<Option<Team>> {
        let row: Option<(Option<i64>, Option<String>)> = sqlx::query_as(
            r#"
            SELECT t.id, t.name
            FROM users u
            LEFT JOIN teams t ON t.id = u.team_id
            WHERE u.id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        match row {
            None => Err(Error::UserNotFound(user_id.to_string())),
            Some((Some(id), Some(name))) => Ok(Some(Team { id, name })),
            Some(_) => Ok(None),
        }
    }
}
