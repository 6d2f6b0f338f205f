//! User operations

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, row_error, Database};
use crate::error::Result;
use crate::models::{PreferredModel, UserProfile};

const USER_COLUMNS: &str =
    "id, username, email, preferred_ai_model, ollama_server_url, created_at";

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserProfile> {
    let preferred: String = row.get(3)?;
    let created_at: String = row.get(5)?;

    Ok(UserProfile {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        preferred_model: preferred.parse().unwrap_or_default(),
        ollama_server_url: row.get(4)?,
        created_at: parse_datetime(&created_at).map_err(row_error)?,
    })
}

impl Database {
    /// Create a user
    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        preferred_model: PreferredModel,
        ollama_server_url: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (username, email, preferred_ai_model, ollama_server_url) VALUES (?, ?, ?, ?)",
            params![username, email, preferred_model.as_str(), ollama_server_url],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a user by ID
    pub fn get_user(&self, id: i64) -> Result<Option<UserProfile>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
                params![id],
                map_user,
            )
            .optional()?;
        Ok(user)
    }

    /// List all users
    pub fn list_users(&self) -> Result<Vec<UserProfile>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))?;
        let users = stmt
            .query_map([], map_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Update a user's AI preferences
    pub fn set_ai_preferences(
        &self,
        user_id: i64,
        preferred_model: PreferredModel,
        ollama_server_url: Option<&str>,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE users SET preferred_ai_model = ?, ollama_server_url = ? WHERE id = ?",
            params![preferred_model.as_str(), ollama_server_url, user_id],
        )?;
        Ok(updated > 0)
    }
}
