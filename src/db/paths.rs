use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqliteConnection;

use crate::error::{map_write_error, TopologyError};
use crate::models::*;
use crate::topology::validation::validate_segments;

use super::cables::CableRepo;
use super::row_helpers::{map_logical_path_row, map_path_segment_row};
use super::systems::SystemRepo;

const SELECT_PATH: &str = r#"
    SELECT id, path_name, path_role, source_system_id, destination_system_id,
           operational_status_id, working_fiber_no, protection_fiber_no,
           created_at, updated_at
    FROM logical_fiber_paths
"#;

const SELECT_SEGMENT: &str = r#"
    SELECT id, logical_path_id, ofc_cable_id, path_order, start_node_id, end_node_id
    FROM path_segments
"#;

/// Logical path and path segment database operations
pub struct PathRepo;

impl PathRepo {
    pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<LogicalFiberPath>> {
        let rows = sqlx::query(&format!("{} ORDER BY path_name, id", SELECT_PATH))
            .fetch_all(&mut *conn)
            .await?;

        Ok(rows.iter().map(map_logical_path_row).collect())
    }

    pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<Option<LogicalFiberPath>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_PATH))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(row.as_ref().map(map_logical_path_row))
    }

    pub async fn require(conn: &mut SqliteConnection, id: i64) -> Result<LogicalFiberPath> {
        Self::get(conn, id)
            .await?
            .ok_or_else(|| TopologyError::not_found("Logical path", id).into())
    }

    /// Get a path that may still have its segments edited
    async fn require_editable(conn: &mut SqliteConnection, id: i64) -> Result<LogicalFiberPath> {
        let path = Self::require(conn, id).await?;
        if path.is_provisioned() {
            tracing::warn!(path_id = id, "Refusing segment change on provisioned path");
            return Err(TopologyError::conflict(format!(
                "path {} is provisioned; deprovision it before editing segments",
                id
            ))
            .into());
        }
        Ok(path)
    }

    pub async fn create(conn: &mut SqliteConnection, req: &CreateLogicalPathRequest) -> Result<LogicalFiberPath> {
        if !path_role::is_valid(&req.path_role) {
            return Err(TopologyError::invalid(format!(
                "invalid path role '{}', expected one of {}",
                req.path_role,
                path_role::ALL.join(", ")
            ))
            .into());
        }
        SystemRepo::require(conn, req.source_system_id).await?;
        if let Some(dest) = req.destination_system_id {
            SystemRepo::require(conn, dest).await?;
        }

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO logical_fiber_paths (path_name, path_role, source_system_id,
                                             destination_system_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&req.path_name)
        .bind(&req.path_role)
        .bind(req.source_system_id)
        .bind(req.destination_system_id)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(map_write_error)?;

        Self::get(conn, result.last_insert_rowid())
            .await?
            .context("Logical path not found after creation")
    }

    /// Record the provisioned state of a path; None clears it
    pub async fn set_provisioning(
        conn: &mut SqliteConnection,
        id: i64,
        status_id: Option<i64>,
        fibers: Option<(i64, i64)>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE logical_fiber_paths
            SET operational_status_id = ?, working_fiber_no = ?, protection_fiber_no = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status_id)
        .bind(fibers.map(|(w, _)| w))
        .bind(fibers.map(|(_, p)| p))
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    // ========== Segments ==========

    pub async fn list_segments(conn: &mut SqliteConnection, path_id: i64) -> Result<Vec<PathSegment>> {
        let rows = sqlx::query(&format!(
            "{} WHERE logical_path_id = ? ORDER BY path_order",
            SELECT_SEGMENT
        ))
        .bind(path_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.iter().map(map_path_segment_row).collect())
    }

    pub async fn get_segment(conn: &mut SqliteConnection, id: i64) -> Result<Option<PathSegment>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_SEGMENT))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(row.as_ref().map(map_path_segment_row))
    }

    /// Add `delta` to the order of every segment at or after `from`.
    ///
    /// UNIQUE(logical_path_id, path_order) is checked per row, so the rows are
    /// parked at negative orders first and flipped back in a second statement.
    async fn shift_orders(conn: &mut SqliteConnection, path_id: i64, from: i64, delta: i64) -> Result<()> {
        sqlx::query(
            "UPDATE path_segments SET path_order = -(path_order + ?) WHERE logical_path_id = ? AND path_order >= ?",
        )
        .bind(delta)
        .bind(path_id)
        .bind(from)
        .execute(&mut *conn)
        .await
        .map_err(map_write_error)?;

        sqlx::query("UPDATE path_segments SET path_order = -path_order WHERE logical_path_id = ? AND path_order < 0")
            .bind(path_id)
            .execute(&mut *conn)
            .await
            .map_err(map_write_error)?;
        Ok(())
    }

    /// Insert a cable into a path at `order` (appending by default).
    ///
    /// The segment is oriented so it starts at the anchor node: the end of the
    /// preceding segment, or the source system's node for the first position.
    pub async fn add_segment(
        conn: &mut SqliteConnection,
        path_id: i64,
        req: &AddSegmentRequest,
    ) -> Result<PathSegment> {
        let path = Self::require_editable(conn, path_id).await?;
        let cable = CableRepo::require(conn, req.cable_id).await?;
        let segments = Self::list_segments(conn, path_id).await?;

        let count = segments.len() as i64;
        let order = req.order.unwrap_or(count + 1);
        if !(1..=count + 1).contains(&order) {
            return Err(TopologyError::invalid(format!(
                "segment order {} out of range 1..={}",
                order,
                count + 1
            ))
            .into());
        }

        let anchor = match order {
            1 => SystemRepo::require(conn, path.source_system_id).await?.node_id,
            _ => segments[(order - 2) as usize].end_node_id,
        };
        let Some(far_end) = cable.opposite_node(anchor) else {
            return Err(TopologyError::invalid(format!(
                "cable {} ({}) does not touch node {}",
                cable.id, cable.route_name, anchor
            ))
            .into());
        };

        if order <= count {
            Self::shift_orders(conn, path_id, order, 1).await?;
        }
        let result = sqlx::query(
            r#"
            INSERT INTO path_segments (logical_path_id, ofc_cable_id, path_order, start_node_id,
                                       end_node_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(path_id)
        .bind(cable.id)
        .bind(order)
        .bind(anchor)
        .bind(far_end)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await
        .map_err(map_write_error)?;

        tracing::info!(path_id, cable_id = cable.id, order, "Added path segment");
        Self::get_segment(conn, result.last_insert_rowid())
            .await?
            .context("Path segment not found after creation")
    }

    /// Remove a segment and close the gap it leaves in the ordering
    pub async fn delete_segment(conn: &mut SqliteConnection, segment_id: i64) -> Result<()> {
        let segment = Self::get_segment(conn, segment_id)
            .await?
            .ok_or_else(|| TopologyError::not_found("Path segment", segment_id))?;
        Self::require_editable(conn, segment.logical_path_id).await?;

        sqlx::query("DELETE FROM path_segments WHERE id = ?")
            .bind(segment_id)
            .execute(&mut *conn)
            .await
            .map_err(map_write_error)?;
        Self::shift_orders(conn, segment.logical_path_id, segment.path_order + 1, -1).await?;

        tracing::info!(path_id = segment.logical_path_id, segment_id, "Deleted path segment");
        Ok(())
    }

    /// Apply a complete new ordering. The ids must be exactly the path's
    /// current segments; anything else means the caller's view is stale.
    pub async fn reorder_segments(
        conn: &mut SqliteConnection,
        path_id: i64,
        segment_ids: &[i64],
    ) -> Result<Vec<PathSegment>> {
        Self::require_editable(conn, path_id).await?;
        let current: HashSet<i64> = Self::list_segments(conn, path_id)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();
        let requested: HashSet<i64> = segment_ids.iter().copied().collect();

        if requested.len() != segment_ids.len() || requested != current {
            tracing::warn!(path_id, "Rejecting reorder with stale segment list");
            return Err(TopologyError::conflict(format!(
                "segment list does not match the {} current segments of path {}",
                current.len(),
                path_id
            ))
            .into());
        }

        for (idx, id) in segment_ids.iter().enumerate() {
            sqlx::query("UPDATE path_segments SET path_order = ? WHERE id = ?")
                .bind(-(idx as i64 + 1))
                .bind(id)
                .execute(&mut *conn)
                .await
                .map_err(map_write_error)?;
        }
        sqlx::query("UPDATE path_segments SET path_order = -path_order WHERE logical_path_id = ? AND path_order < 0")
            .bind(path_id)
            .execute(&mut *conn)
            .await
            .map_err(map_write_error)?;

        tracing::info!(path_id, segments = segment_ids.len(), "Reordered path segments");
        Self::list_segments(conn, path_id).await
    }

    pub async fn validate(conn: &mut SqliteConnection, path_id: i64) -> Result<RingValidation> {
        Self::require(conn, path_id).await?;
        let segments = Self::list_segments(conn, path_id).await?;
        let validation = validate_segments(&segments);
        tracing::debug!(path_id, status = ?validation.status, "{}", validation.message);
        Ok(validation)
    }

    /// Cables that can extend the path: those touching its current end node
    /// that it does not already use
    pub async fn candidate_cables(conn: &mut SqliteConnection, path_id: i64) -> Result<Vec<Cable>> {
        let path = Self::require(conn, path_id).await?;
        let segments = Self::list_segments(conn, path_id).await?;
        let end_node = match segments.last() {
            Some(last) => last.end_node_id,
            None => SystemRepo::require(conn, path.source_system_id).await?.node_id,
        };
        let used: HashSet<i64> = segments.iter().map(|s| s.ofc_cable_id).collect();

        Ok(CableRepo::list_touching_node(conn, end_node)
            .await?
            .into_iter()
            .filter(|c| !used.contains(&c.id))
            .collect())
    }
}
