use std::collections::{BTreeSet, HashSet};

use anyhow::{Context, Result};
use sqlx::SqliteConnection;

use crate::error::TopologyError;
use crate::models::*;
use crate::topology::status::{available_fibers, intersect_available};
use crate::topology::validation::validate_segments;
use crate::topology::SpliceIndex;

use super::cables::CableRepo;
use super::connections::ConnectionRepo;
use super::junction_closures::JunctionClosureRepo;
use super::paths::PathRepo;
use super::splices::SpliceRepo;

/// Protected-path provisioning: fiber assignment along a validated path
pub struct ProvisioningRepo;

impl ProvisioningRepo {
    async fn provisioned_status_id(conn: &mut SqliteConnection) -> Result<i64> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM operational_statuses WHERE name = ?")
            .bind(operational_status::PROVISIONED)
            .fetch_optional(&mut *conn)
            .await?;

        row.map(|(id,)| id)
            .context("operational status 'provisioned' is missing; migrations not applied?")
    }

    /// Fiber numbers free on every cable of the path
    async fn continuous_fibers(conn: &mut SqliteConnection, segments: &[PathSegment]) -> Result<BTreeSet<i64>> {
        let mut cable_ids: Vec<i64> = Vec::with_capacity(segments.len());
        for segment in segments {
            if !cable_ids.contains(&segment.ofc_cable_id) {
                cable_ids.push(segment.ofc_cable_id);
            }
        }

        let index = SpliceIndex::new(SpliceRepo::list_for_cables(conn, &cable_ids).await?);
        let mut sets = Vec::with_capacity(cable_ids.len());
        for cable_id in cable_ids {
            let cable = CableRepo::require(conn, cable_id).await?;
            sets.push(available_fibers(&cable, &index));
        }
        Ok(intersect_available(&sets))
    }

    /// Candidate fiber numbers for provisioning, ascending
    pub async fn available_fibers(conn: &mut SqliteConnection, path_id: i64) -> Result<Vec<i64>> {
        PathRepo::require(conn, path_id).await?;
        let segments = PathRepo::list_segments(conn, path_id).await?;
        Ok(Self::continuous_fibers(conn, &segments).await?.into_iter().collect())
    }

    async fn result_for(
        conn: &mut SqliteConnection,
        path_id: i64,
        splices_created: usize,
    ) -> Result<ProvisionResult> {
        let path = PathRepo::require(conn, path_id).await?;
        let connection = ConnectionRepo::get_for_path(conn, path_id)
            .await?
            .context("provisioned path has no system connection")?;
        Ok(ProvisionResult {
            path,
            connection,
            splices_created,
        })
    }

    /// Light up a working and a protection fiber end to end along a path.
    ///
    /// For each fiber: a termination at both path ends and a pass-through at
    /// every intermediate node, placed in the closure at that node and tagged
    /// with the path. Must run inside a transaction; availability is checked
    /// again here so a concurrent splice makes this fail instead of overlap.
    pub async fn provision(
        conn: &mut SqliteConnection,
        path_id: i64,
        req: &ProvisionRequest,
    ) -> Result<ProvisionResult> {
        if req.working_fiber == req.protection_fiber {
            return Err(TopologyError::invalid(format!(
                "working and protection must be different fibers, both are {}",
                req.working_fiber
            ))
            .into());
        }

        let path = PathRepo::require(conn, path_id).await?;
        if path.is_provisioned() {
            if path.working_fiber_no == Some(req.working_fiber)
                && path.protection_fiber_no == Some(req.protection_fiber)
            {
                tracing::debug!(path_id, "Path already provisioned on the requested fibers");
                return Self::result_for(conn, path_id, 0).await;
            }
            return Err(TopologyError::conflict(format!(
                "path {} is already provisioned on fibers {:?}/{:?}",
                path_id, path.working_fiber_no, path.protection_fiber_no
            ))
            .into());
        }

        let segments = PathRepo::list_segments(conn, path_id).await?;
        let validation = validate_segments(&segments);
        if !validation.status.is_provisionable() {
            tracing::warn!(path_id, status = ?validation.status, "Refusing to provision path");
            return Err(TopologyError::precondition(format!(
                "path {} cannot be provisioned: {}",
                path_id, validation.message
            ))
            .into());
        }
        let distinct: HashSet<i64> = segments.iter().map(|s| s.ofc_cable_id).collect();
        if distinct.len() != segments.len() {
            return Err(TopologyError::precondition(format!(
                "path {} uses the same cable more than once",
                path_id
            ))
            .into());
        }

        let available = Self::continuous_fibers(conn, &segments).await?;
        for fiber_no in [req.working_fiber, req.protection_fiber] {
            if !available.contains(&fiber_no) {
                tracing::warn!(path_id, fiber_no, "Fiber not continuously available");
                return Err(TopologyError::precondition(format!(
                    "fiber {} is not available on every cable of path {} (available: {:?})",
                    fiber_no, path_id, available
                ))
                .into());
            }
        }

        // Validation guarantees the chain is continuous and non-empty
        let (first, last) = match (segments.first(), segments.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(TopologyError::precondition("path has no segments").into()),
        };
        let start_jc = JunctionClosureRepo::ensure_at_node(conn, first.start_node_id).await?.id;
        let end_jc = JunctionClosureRepo::ensure_at_node(conn, last.end_node_id).await?.id;
        let mut joints = Vec::with_capacity(segments.len().saturating_sub(1));
        for pair in segments.windows(2) {
            let jc = JunctionClosureRepo::ensure_at_node(conn, pair[0].end_node_id).await?.id;
            joints.push((jc, pair[0].ofc_cable_id, pair[1].ofc_cable_id));
        }

        let mut splices_created = 0;
        for fiber_no in [req.working_fiber, req.protection_fiber] {
            let head = FiberRef::new(first.ofc_cable_id, fiber_no);
            let tail = FiberRef::new(last.ofc_cable_id, fiber_no);

            SpliceRepo::create(conn, start_jc, &CreateSpliceRequest::termination(head), Some(path_id)).await?;
            splices_created += 1;
            for &(jc, from, to) in &joints {
                let joint = CreateSpliceRequest::pass_through(FiberRef::new(from, fiber_no), FiberRef::new(to, fiber_no));
                SpliceRepo::create(conn, jc, &joint, Some(path_id)).await?;
                splices_created += 1;
            }
            // A lone looping cable lands both of its ends in the same closure
            if (end_jc, tail) != (start_jc, head) {
                SpliceRepo::create(conn, end_jc, &CreateSpliceRequest::termination(tail), Some(path_id)).await?;
                splices_created += 1;
            }
        }

        let status_id = Self::provisioned_status_id(conn).await?;
        PathRepo::set_provisioning(conn, path_id, Some(status_id), Some((req.working_fiber, req.protection_fiber)))
            .await?;
        ConnectionRepo::upsert(conn, path.source_system_id, path_id, req).await?;

        tracing::info!(
            path_id,
            working = req.working_fiber,
            protection = req.protection_fiber,
            splices_created,
            "Provisioned protected path"
        );
        Self::result_for(conn, path_id, splices_created).await
    }

    /// Release a path's fibers. Returns false if nothing was provisioned.
    pub async fn deprovision(conn: &mut SqliteConnection, path_id: i64) -> Result<bool> {
        let path = PathRepo::require(conn, path_id).await?;
        let removed = SpliceRepo::delete_for_path(conn, path_id).await?;
        let had_connection = ConnectionRepo::delete_for_path(conn, path_id).await?;

        if !path.is_provisioned() && removed == 0 && !had_connection {
            tracing::debug!(path_id, "Path already deprovisioned");
            return Ok(false);
        }
        PathRepo::set_provisioning(conn, path_id, None, None).await?;
        tracing::info!(path_id, splices_removed = removed, "Deprovisioned path");
        Ok(true)
    }
}
