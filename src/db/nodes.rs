use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqliteConnection;

use crate::error::{map_write_error, TopologyError};
use crate::models::*;

use super::row_helpers::map_node_row;

const SELECT_NODE: &str = r#"
    SELECT id, name, node_type, created_at, updated_at
    FROM nodes
"#;

/// Node database operations
pub struct NodeRepo;

impl NodeRepo {
    pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Node>> {
        let rows = sqlx::query(&format!("{} ORDER BY name, id", SELECT_NODE))
            .fetch_all(&mut *conn)
            .await?;

        Ok(rows.iter().map(map_node_row).collect())
    }

    pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<Option<Node>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_NODE))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(row.as_ref().map(map_node_row))
    }

    /// Get a node or fail with NotFound
    pub async fn require(conn: &mut SqliteConnection, id: i64) -> Result<Node> {
        Self::get(conn, id)
            .await?
            .ok_or_else(|| TopologyError::not_found("Node", id).into())
    }

    pub async fn create(conn: &mut SqliteConnection, req: &CreateNodeRequest) -> Result<Node> {
        if req.name.trim().is_empty() {
            return Err(TopologyError::invalid("node name must not be empty").into());
        }
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO nodes (name, node_type, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&req.name)
        .bind(req.node_type.clone().unwrap_or_default())
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(map_write_error)?;

        Self::get(conn, result.last_insert_rowid())
            .await?
            .context("Node not found after creation")
    }
}
