use chrono::Utc;
use rusqlite::{OptionalExtension, Row};

use crate::db::Database;
use crate::error::ServerError;
use crate::models::connection::{Connection, ConnectionStatus};

const COLUMNS: &str = "connection_id, app_type, user_id, status, created_at, updated_at";

/// Local record of every connection this backend has initiated or observed.
pub struct ConnectionStore {
    db: Database,
}

impl ConnectionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record a freshly initiated connection.
    ///
    /// Connection ids are single-use: inserting an id that is already known
    /// fails with `Conflict`.
    pub async fn insert(&self, connection: &Connection) -> Result<(), ServerError> {
        let c = connection.clone();
        let inserted = self
            .db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO connections (connection_id, app_type, user_id, status, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(connection_id) DO NOTHING",
                    rusqlite::params![
                        c.connection_id,
                        c.app_type,
                        c.user_id,
                        c.status.as_str(),
                        c.created_at.timestamp_millis(),
                        c.updated_at.timestamp_millis(),
                    ],
                )
            })
            .await?;

        if inserted == 0 {
            return Err(ServerError::Conflict(format!(
                "Connection {} was already issued",
                connection.connection_id
            )));
        }
        Ok(())
    }

    /// Insert or refresh a connection observed upstream.
    pub async fn upsert(&self, connection: &Connection) -> Result<(), ServerError> {
        let c = connection.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO connections (connection_id, app_type, user_id, status, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(connection_id) DO UPDATE SET
                       status = CASE
                         WHEN excluded.status = 'PENDING' AND connections.status != 'PENDING'
                           THEN connections.status
                         ELSE excluded.status
                       END,
                       updated_at = excluded.updated_at",
                    rusqlite::params![
                        c.connection_id,
                        c.app_type,
                        c.user_id,
                        c.status.as_str(),
                        c.created_at.timestamp_millis(),
                        c.updated_at.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, connection_id: &str) -> Result<Option<Connection>, ServerError> {
        let id = connection_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM connections WHERE connection_id = ?1",
                    COLUMNS
                ))?;
                stmt.query_row(rusqlite::params![id], |row| Ok(row_to_connection(row)))
                    .optional()
            })
            .await
    }

    pub async fn list_by_user(&self, user_id: &str) -> Result<Vec<Connection>, ServerError> {
        let user_id = user_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM connections WHERE user_id = ?1 ORDER BY created_at DESC",
                    COLUMNS
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params![user_id], |row| Ok(row_to_connection(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    /// Record the latest known status. A terminal status is never moved back
    /// to `PENDING`. Returns `false` when nothing was updated.
    pub async fn update_status(
        &self,
        connection_id: &str,
        status: ConnectionStatus,
    ) -> Result<bool, ServerError> {
        let id = connection_id.to_string();
        let now = Utc::now().timestamp_millis();
        let changed = self
            .db
            .with_conn_async(move |conn| {
                conn.execute(
                    "UPDATE connections SET status = ?1, updated_at = ?2
                     WHERE connection_id = ?3
                       AND NOT (?1 = 'PENDING' AND status != 'PENDING')",
                    rusqlite::params![status.as_str(), now, id],
                )
            })
            .await?;
        Ok(changed > 0)
    }

    /// Returns `false` when the id was not known locally.
    pub async fn delete(&self, connection_id: &str) -> Result<bool, ServerError> {
        let id = connection_id.to_string();
        let removed = self
            .db
            .with_conn_async(move |conn| {
                conn.execute(
                    "DELETE FROM connections WHERE connection_id = ?1",
                    rusqlite::params![id],
                )
            })
            .await?;
        Ok(removed > 0)
    }
}

fn row_to_connection(row: &Row<'_>) -> Connection {
    let created_ms: i64 = row.get(4).unwrap_or(0);
    let updated_ms: i64 = row.get(5).unwrap_or(0);

    Connection {
        connection_id: row.get(0).unwrap_or_default(),
        app_type: row.get(1).unwrap_or_default(),
        user_id: row.get(2).unwrap_or_default(),
        status: ConnectionStatus::from_str(&row.get::<_, String>(3).unwrap_or_default()),
        created_at: chrono::DateTime::from_timestamp_millis(created_ms).unwrap_or_else(Utc::now),
        updated_at: chrono::DateTime::from_timestamp_millis(updated_ms).unwrap_or_else(Utc::now),
    }
}
