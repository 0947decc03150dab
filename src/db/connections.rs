use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqliteConnection;

use crate::error::map_write_error;
use crate::models::*;

use super::row_helpers::map_system_connection_row;

const SELECT_CONNECTION: &str = r#"
    SELECT id, system_id, logical_path_id, working_fiber_no, protection_fiber_no,
           source_port, destination_port, created_at, updated_at
    FROM system_connections
"#;

/// System connection database operations
pub struct ConnectionRepo;

impl ConnectionRepo {
    pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<SystemConnection>> {
        let rows = sqlx::query(&format!("{} ORDER BY id", SELECT_CONNECTION))
            .fetch_all(&mut *conn)
            .await?;

        Ok(rows.iter().map(map_system_connection_row).collect())
    }

    pub async fn get_for_path(conn: &mut SqliteConnection, path_id: i64) -> Result<Option<SystemConnection>> {
        let row = sqlx::query(&format!("{} WHERE logical_path_id = ?", SELECT_CONNECTION))
            .bind(path_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(row.as_ref().map(map_system_connection_row))
    }

    /// Create or replace the connection riding on a path
    pub async fn upsert(
        conn: &mut SqliteConnection,
        system_id: i64,
        path_id: i64,
        req: &ProvisionRequest,
    ) -> Result<SystemConnection> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO system_connections (system_id, logical_path_id, working_fiber_no,
                                            protection_fiber_no, source_port, destination_port,
                                            created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(logical_path_id) DO UPDATE SET
                system_id = excluded.system_id,
                working_fiber_no = excluded.working_fiber_no,
                protection_fiber_no = excluded.protection_fiber_no,
                source_port = excluded.source_port,
                destination_port = excluded.destination_port,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(system_id)
        .bind(path_id)
        .bind(req.working_fiber)
        .bind(req.protection_fiber)
        .bind(req.source_port.clone().unwrap_or_default())
        .bind(req.destination_port.clone().unwrap_or_default())
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(map_write_error)?;

        Self::get_for_path(conn, path_id)
            .await?
            .context("System connection not found after upsert")
    }

    pub async fn delete_for_path(conn: &mut SqliteConnection, path_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM system_connections WHERE logical_path_id = ?")
            .bind(path_id)
            .execute(&mut *conn)
            .await
            .map_err(map_write_error)?;

        Ok(result.rows_affected() > 0)
    }
}
