use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqliteConnection;

use crate::error::{map_write_error, TopologyError};
use crate::models::*;

use super::nodes::NodeRepo;
use super::row_helpers::map_cable_row;

const SELECT_CABLE: &str = r#"
    SELECT id, route_name, capacity, start_node_id, end_node_id, length_km,
           created_at, updated_at
    FROM ofc_cables
"#;

/// Largest fiber count a single cable may carry
const MAX_CABLE_CAPACITY: i64 = 10_000;

/// Cable database operations
pub struct CableRepo;

impl CableRepo {
    pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Cable>> {
        let rows = sqlx::query(&format!("{} ORDER BY route_name, id", SELECT_CABLE))
            .fetch_all(&mut *conn)
            .await?;

        Ok(rows.iter().map(map_cable_row).collect())
    }

    pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<Option<Cable>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_CABLE))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(row.as_ref().map(map_cable_row))
    }

    pub async fn require(conn: &mut SqliteConnection, id: i64) -> Result<Cable> {
        Self::get(conn, id)
            .await?
            .ok_or_else(|| TopologyError::not_found("Cable", id).into())
    }

    /// Get a cable and check `fiber_no` lies within its capacity
    pub async fn require_fiber(conn: &mut SqliteConnection, fiber: FiberRef) -> Result<Cable> {
        let cable = Self::require(conn, fiber.cable_id).await?;
        if !cable.has_fiber(fiber.fiber_no) {
            return Err(TopologyError::not_found("Fiber", fiber).into());
        }
        Ok(cable)
    }

    pub async fn create(conn: &mut SqliteConnection, req: &CreateCableRequest) -> Result<Cable> {
        if req.capacity <= 0 || req.capacity > MAX_CABLE_CAPACITY {
            return Err(TopologyError::invalid(format!(
                "cable capacity must be between 1 and {}, got {}",
                MAX_CABLE_CAPACITY, req.capacity
            ))
            .into());
        }
        if req.length_km.is_some_and(|l| !l.is_finite() || l < 0.0) {
            return Err(TopologyError::invalid("cable length must be a non-negative number").into());
        }
        NodeRepo::require(conn, req.start_node_id).await?;
        NodeRepo::require(conn, req.end_node_id).await?;

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO ofc_cables (route_name, capacity, start_node_id, end_node_id, length_km,
                                    created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&req.route_name)
        .bind(req.capacity)
        .bind(req.start_node_id)
        .bind(req.end_node_id)
        .bind(req.length_km)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(map_write_error)?;

        Self::get(conn, result.last_insert_rowid())
            .await?
            .context("Cable not found after creation")
    }

    /// Directory lookup: the cable joining two nodes, in either orientation.
    /// With several candidates the oldest wins.
    pub async fn find_between_nodes(conn: &mut SqliteConnection, a: i64, b: i64) -> Result<Option<Cable>> {
        let row = sqlx::query(&format!(
            "{} WHERE (start_node_id = ? AND end_node_id = ?) OR (start_node_id = ? AND end_node_id = ?) ORDER BY id LIMIT 1",
            SELECT_CABLE
        ))
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.as_ref().map(map_cable_row))
    }

    /// Cables with either end at `node_id`
    pub async fn list_touching_node(conn: &mut SqliteConnection, node_id: i64) -> Result<Vec<Cable>> {
        let rows = sqlx::query(&format!(
            "{} WHERE start_node_id = ? OR end_node_id = ? ORDER BY id",
            SELECT_CABLE
        ))
        .bind(node_id)
        .bind(node_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.iter().map(map_cable_row).collect())
    }

    /// Known cable lengths keyed by cable id
    pub async fn lengths(conn: &mut SqliteConnection) -> Result<HashMap<i64, f64>> {
        let rows: Vec<(i64, f64)> =
            sqlx::query_as("SELECT id, length_km FROM ofc_cables WHERE length_km IS NOT NULL")
                .fetch_all(&mut *conn)
                .await?;

        Ok(rows.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::*;
    use crate::error::TopologyErrorExt;

    #[tokio::test]
    async fn test_find_between_nodes_either_orientation() {
        let store = store().await;
        let (a, b, c) = (node(&store, "A").await, node(&store, "B").await, node(&store, "C").await);
        let ab = cable(&store, "A-B", 12, a, b).await;

        let found = store.find_cable_between_nodes(b, a).await.unwrap().unwrap();
        assert_eq!(found.id, ab.id);
        assert!(store.find_cable_between_nodes(a, c).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_capacity_must_be_positive() {
        let store = store().await;
        let (a, b) = (node(&store, "A").await, node(&store, "B").await);
        let err = tokio_test::assert_err!(
            store
                .create_cable(&CreateCableRequest {
                    route_name: "empty".into(),
                    capacity: 0,
                    start_node_id: a,
                    end_node_id: b,
                    length_km: None,
                })
                .await
        );
        assert!(matches!(err.topology_error(), Some(TopologyError::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn test_capacity_upper_bound() {
        let store = store().await;
        let (a, b) = (node(&store, "A").await, node(&store, "B").await);
        let request = |capacity| CreateCableRequest {
            route_name: "trunk".into(),
            capacity,
            start_node_id: a,
            end_node_id: b,
            length_km: None,
        };

        let err = tokio_test::assert_err!(store.create_cable(&request(1_000_000_000_000)).await);
        assert!(matches!(err.topology_error(), Some(TopologyError::InvalidOperation(_))));
        let err = tokio_test::assert_err!(store.create_cable(&request(MAX_CABLE_CAPACITY + 1)).await);
        assert!(matches!(err.topology_error(), Some(TopologyError::InvalidOperation(_))));

        let largest = tokio_test::assert_ok!(store.create_cable(&request(MAX_CABLE_CAPACITY)).await);
        assert_eq!(largest.capacity, MAX_CABLE_CAPACITY);
        assert!(store.list_cables().await.unwrap().iter().all(|c| c.capacity <= MAX_CABLE_CAPACITY));
    }

    #[tokio::test]
    async fn test_cable_requires_nodes() {
        let store = store().await;
        let a = node(&store, "A").await;
        let err = tokio_test::assert_err!(
            store
                .create_cable(&CreateCableRequest {
                    route_name: "dangling".into(),
                    capacity: 4,
                    start_node_id: a,
                    end_node_id: 404,
                    length_km: None,
                })
                .await
        );
        assert!(matches!(err.topology_error(), Some(TopologyError::NotFound { .. })));
    }
}
