use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqliteConnection;

use crate::error::{map_write_error, TopologyError};
use crate::models::*;

use super::nodes::NodeRepo;
use super::row_helpers::map_system_row;

const SELECT_SYSTEM: &str = r#"
    SELECT id, system_name, node_id, is_hub, order_in_ring, created_at, updated_at
    FROM systems
"#;

/// System database operations
pub struct SystemRepo;

impl SystemRepo {
    pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<System>> {
        let rows = sqlx::query(&format!("{} ORDER BY system_name, id", SELECT_SYSTEM))
            .fetch_all(&mut *conn)
            .await?;

        Ok(rows.iter().map(map_system_row).collect())
    }

    pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<Option<System>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_SYSTEM))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(row.as_ref().map(map_system_row))
    }

    pub async fn require(conn: &mut SqliteConnection, id: i64) -> Result<System> {
        Self::get(conn, id)
            .await?
            .ok_or_else(|| TopologyError::not_found("System", id).into())
    }

    pub async fn create(conn: &mut SqliteConnection, req: &CreateSystemRequest) -> Result<System> {
        NodeRepo::require(conn, req.node_id).await?;
        if req.order_in_ring.is_some_and(|o| !o.is_finite()) {
            return Err(TopologyError::invalid("order_in_ring must be a finite number").into());
        }

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO systems (system_name, node_id, is_hub, order_in_ring, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&req.system_name)
        .bind(req.node_id)
        .bind(req.is_hub as i32)
        .bind(req.order_in_ring)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(map_write_error)?;

        Self::get(conn, result.last_insert_rowid())
            .await?
            .context("System not found after creation")
    }
}
