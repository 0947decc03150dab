use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqliteConnection;

use crate::error::{map_write_error, TopologyError};
use crate::models::*;

use super::cables::CableRepo;
use super::nodes::NodeRepo;
use super::row_helpers::map_junction_closure_row;

const SELECT_JUNCTION_CLOSURE: &str = r#"
    SELECT id, name, cable_id, node_id, position_km, created_at, updated_at
    FROM junction_closures
"#;

/// Junction closure database operations
pub struct JunctionClosureRepo;

impl JunctionClosureRepo {
    pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<JunctionClosure>> {
        let rows = sqlx::query(&format!("{} ORDER BY name, id", SELECT_JUNCTION_CLOSURE))
            .fetch_all(&mut *conn)
            .await?;

        Ok(rows.iter().map(map_junction_closure_row).collect())
    }

    pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<Option<JunctionClosure>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_JUNCTION_CLOSURE))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(row.as_ref().map(map_junction_closure_row))
    }

    pub async fn require(conn: &mut SqliteConnection, id: i64) -> Result<JunctionClosure> {
        Self::get(conn, id)
            .await?
            .ok_or_else(|| TopologyError::not_found("Junction closure", id).into())
    }

    pub async fn create(
        conn: &mut SqliteConnection,
        req: &CreateJunctionClosureRequest,
    ) -> Result<JunctionClosure> {
        if let Some(cable_id) = req.cable_id {
            CableRepo::require(conn, cable_id).await?;
        }
        if let Some(node_id) = req.node_id {
            NodeRepo::require(conn, node_id).await?;
        }

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO junction_closures (name, cable_id, node_id, position_km, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&req.name)
        .bind(req.cable_id)
        .bind(req.node_id)
        .bind(req.position_km)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(map_write_error)?;

        Self::get(conn, result.last_insert_rowid())
            .await?
            .context("Junction closure not found after creation")
    }

    /// The closure housed at a node (its ODF), creating one if the node has none.
    /// The oldest closure at the node is reused.
    pub async fn ensure_at_node(conn: &mut SqliteConnection, node_id: i64) -> Result<JunctionClosure> {
        let row = sqlx::query(&format!(
            "{} WHERE node_id = ? ORDER BY id LIMIT 1",
            SELECT_JUNCTION_CLOSURE
        ))
        .bind(node_id)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(row) = row {
            return Ok(map_junction_closure_row(&row));
        }

        let node = NodeRepo::require(conn, node_id).await?;
        tracing::info!(node_id, "Creating node closure for {}", node.name);
        Self::create(
            conn,
            &CreateJunctionClosureRequest {
                name: format!("{} ODF", node.name),
                cable_id: None,
                node_id: Some(node_id),
                position_km: None,
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_support::*;

    #[tokio::test]
    async fn test_ensure_at_node_reuses_closure() {
        let store = store().await;
        let a = node(&store, "Alpha").await;

        let mut conn = store.pool().acquire().await.unwrap();
        let first = super::JunctionClosureRepo::ensure_at_node(&mut *conn, a).await.unwrap();
        let second = super::JunctionClosureRepo::ensure_at_node(&mut *conn, a).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.name, "Alpha ODF");
        assert_eq!(first.node_id, Some(a));
    }

    #[tokio::test]
    async fn test_closure_on_missing_cable() {
        let store = store().await;
        let res = store
            .create_junction_closure(&crate::models::CreateJunctionClosureRequest {
                name: "JC-1".into(),
                cable_id: Some(5),
                node_id: None,
                position_km: Some(1.2),
            })
            .await;
        tokio_test::assert_err!(res);
    }
}
