//! Repository for user records

use rota_core::model::{NewMember, User};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::error::{Error, Result};

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    is_active: bool,
    team_id: Option<i64>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            is_active: row.is_active,
            team_id: row.team_id,
        }
    }
}

const SELECT_USER: &str = "SELECT id, name, is_active, team_id FROM users";

/// Repository for managing users and their team membership
pub struct UserRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> UserRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Get a user by id
    pub async fn get(&mut self, id: &str) -> Result<User> {
        sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?
            .map(User::from)
            .ok_or_else(|| Error::UserNotFound(id.to_string()))
    }

    /// Active members of a team, minus `exclude_ids`, ordered by id
    pub async fn list_active_in_team(
        &mut self,
        team_id: i64,
        exclude_ids: &[String],
        limit: Option<usize>,
    ) -> Result<Vec<User>> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_USER);
        query.push(" WHERE is_active = 1 AND team_id = ");
        query.push_bind(team_id);

        if !exclude_ids.is_empty() {
            query.push(" AND id NOT IN (");
            let mut ids = query.separated(", ");
            for id in exclude_ids {
                ids.push_bind(id.clone());
            }
            ids.push_unseparated(")");
        }

        query.push(" ORDER BY id");
        if let Some(limit) = limit {
            query.push(" LIMIT ");
            query.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = query
            .build_query_as::<UserRow>()
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    /// All members of a team, active or not, ordered by id
    pub async fn list_in_team(&mut self, team_id: i64) -> Result<Vec<User>> {
        let sql = format!("{SELECT_USER} WHERE team_id = ? ORDER BY id");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(team_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Set the active flag and return the updated user
    pub async fn set_active(&mut self, id: &str, is_active: bool) -> Result<User> {
        let result = sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
            .bind(is_active)
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::UserNotFound(id.to_string()));
        }
        self.get(id).await
    }

    /// Insert or overwrite members of a team
    pub async fn upsert_into_team(
        &mut self,
        team_id: i64,
        members: &[NewMember],
    ) -> Result<Vec<User>> {
        for member in members {
            sqlx::query(
                r#"
                INSERT INTO users (id, name, is_active, team_id)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    is_active = excluded.is_active,
                    team_id = excluded.team_id
                "#,
            )
            .bind(&member.id)
            .bind(&member.name)
            .bind(member.is_active)
            .bind(team_id)
            .execute(&mut *self.conn)
            .await
            .map_err(|e| {
                if Error::is_foreign_key_violation(&e) {
                    Error::TeamNotFound(team_id.to_string())
                } else {
                    e.into()
                }
            })?;
        }

        Ok(members
            .iter()
            .map(|m| User {
                id: m.id.clone(),
                name: m.name.clone(),
                is_active: m.is_active,
                team_id: Some(team_id),
            })
            .collect())
    }
}
