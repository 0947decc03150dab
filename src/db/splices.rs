use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqliteConnection;

use crate::error::{map_write_error, TopologyError};
use crate::models::*;
use crate::topology::status::{resolve_status, resolve_status_at};
use crate::topology::trace::{apply_cable_lengths, trace_fiber};
use crate::topology::SpliceIndex;

use super::cables::CableRepo;
use super::junction_closures::JunctionClosureRepo;
use super::row_helpers::map_splice_row;

const SELECT_SPLICE: &str = r#"
    SELECT id, jc_id, splice_type, incoming_cable_id, incoming_fiber_no,
           outgoing_cable_id, outgoing_fiber_no, loss_db, logical_path_id, created_at
    FROM fiber_splices
"#;

fn check_loss(loss_db: Option<f64>) -> Result<()> {
    if loss_db.is_some_and(|l| !l.is_finite() || l < 0.0) {
        return Err(TopologyError::invalid("splice loss must be a non-negative number of dB").into());
    }
    Ok(())
}

/// Splice database operations: the splice matrix and everything derived from it
pub struct SpliceRepo;

impl SpliceRepo {
    pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<Option<Splice>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_SPLICE))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(row.as_ref().map(map_splice_row))
    }

    pub async fn list_all(conn: &mut SqliteConnection) -> Result<Vec<Splice>> {
        let rows = sqlx::query(&format!("{} ORDER BY id", SELECT_SPLICE))
            .fetch_all(&mut *conn)
            .await?;

        Ok(rows.iter().map(map_splice_row).collect())
    }

    pub async fn list_for_jc(conn: &mut SqliteConnection, jc_id: i64) -> Result<Vec<Splice>> {
        let rows = sqlx::query(&format!("{} WHERE jc_id = ? ORDER BY id", SELECT_SPLICE))
            .bind(jc_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(rows.iter().map(map_splice_row).collect())
    }

    pub async fn list_for_fiber(conn: &mut SqliteConnection, fiber: FiberRef) -> Result<Vec<Splice>> {
        let rows = sqlx::query(&format!(
            r#"{} WHERE id IN (
                   SELECT splice_id FROM splice_endpoints WHERE cable_id = ? AND fiber_no = ?
               ) ORDER BY id"#,
            SELECT_SPLICE
        ))
        .bind(fiber.cable_id)
        .bind(fiber.fiber_no)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.iter().map(map_splice_row).collect())
    }

    /// Splices touching any fiber of the given cables
    pub async fn list_for_cables(conn: &mut SqliteConnection, cable_ids: &[i64]) -> Result<Vec<Splice>> {
        if cable_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; cable_ids.len()].join(", ");
        let sql = format!(
            r#"{} WHERE id IN (
                   SELECT splice_id FROM splice_endpoints WHERE cable_id IN ({})
               ) ORDER BY id"#,
            SELECT_SPLICE, placeholders
        );
        let mut query = sqlx::query(&sql);
        for id in cable_ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&mut *conn).await?;

        Ok(rows.iter().map(map_splice_row).collect())
    }

    /// Fail with Conflict unless the fiber end at `jc_id` is free and the
    /// fiber still has an unspliced end.
    async fn check_endpoint_free(conn: &mut SqliteConnection, jc_id: i64, fiber: FiberRef) -> Result<()> {
        let holder: Option<(i64,)> = sqlx::query_as(
            "SELECT splice_id FROM splice_endpoints WHERE jc_id = ? AND cable_id = ? AND fiber_no = ?",
        )
        .bind(jc_id)
        .bind(fiber.cable_id)
        .bind(fiber.fiber_no)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some((splice_id,)) = holder {
            return Err(TopologyError::conflict(format!(
                "{} is already spliced in closure {} (splice {})",
                fiber, jc_id, splice_id
            ))
            .into());
        }

        let (ends,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM splice_endpoints WHERE cable_id = ? AND fiber_no = ?")
                .bind(fiber.cable_id)
                .bind(fiber.fiber_no)
                .fetch_one(&mut *conn)
                .await?;

        if ends >= 2 {
            return Err(TopologyError::conflict(format!("both ends of {} are already spliced", fiber)).into());
        }
        Ok(())
    }

    async fn insert(
        conn: &mut SqliteConnection,
        jc_id: i64,
        incoming: FiberRef,
        outgoing: Option<FiberRef>,
        loss_db: Option<f64>,
        logical_path_id: Option<i64>,
    ) -> Result<Splice> {
        let splice_type = if outgoing.is_some() {
            SpliceType::PassThrough
        } else {
            SpliceType::Termination
        };
        let result = sqlx::query(
            r#"
            INSERT INTO fiber_splices (jc_id, splice_type, incoming_cable_id, incoming_fiber_no,
                                       outgoing_cable_id, outgoing_fiber_no, loss_db,
                                       logical_path_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(jc_id)
        .bind(splice_type.as_str())
        .bind(incoming.cable_id)
        .bind(incoming.fiber_no)
        .bind(outgoing.map(|f| f.cable_id))
        .bind(outgoing.map(|f| f.fiber_no))
        .bind(loss_db)
        .bind(logical_path_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await
        .map_err(map_write_error)?;

        let splice_id = result.last_insert_rowid();
        for fiber in std::iter::once(incoming).chain(outgoing) {
            sqlx::query("INSERT INTO splice_endpoints (jc_id, cable_id, fiber_no, splice_id) VALUES (?, ?, ?, ?)")
                .bind(jc_id)
                .bind(fiber.cable_id)
                .bind(fiber.fiber_no)
                .bind(splice_id)
                .execute(&mut *conn)
                .await
                .map_err(map_write_error)?;
        }

        Self::get(conn, splice_id)
            .await?
            .context("Splice not found after creation")
    }

    /// Record a splice in a closure. `logical_path_id` tags splices laid down by
    /// the provisioner. Run inside a transaction: the endpoint checks are
    /// repeated by the `splice_endpoints` primary key at insert time.
    pub async fn create(
        conn: &mut SqliteConnection,
        jc_id: i64,
        req: &CreateSpliceRequest,
        logical_path_id: Option<i64>,
    ) -> Result<Splice> {
        JunctionClosureRepo::require(conn, jc_id).await?;

        match (req.splice_type, req.outgoing) {
            (SpliceType::PassThrough, None) => {
                return Err(TopologyError::invalid("pass-through splice needs an outgoing fiber").into());
            }
            (SpliceType::PassThrough, Some(out)) if out == req.incoming => {
                return Err(TopologyError::invalid(format!("cannot splice {} to itself", out)).into());
            }
            (SpliceType::Termination, Some(_)) => {
                return Err(TopologyError::invalid("termination splice cannot have an outgoing fiber").into());
            }
            _ => {}
        }
        check_loss(req.loss_db)?;

        for fiber in std::iter::once(req.incoming).chain(req.outgoing) {
            let cable = CableRepo::require(conn, fiber.cable_id).await?;
            if !cable.has_fiber(fiber.fiber_no) {
                return Err(TopologyError::invalid(format!(
                    "{} is outside cable capacity {}",
                    fiber, cable.capacity
                ))
                .into());
            }
            Self::check_endpoint_free(conn, jc_id, fiber).await?;
        }

        let splice = Self::insert(conn, jc_id, req.incoming, req.outgoing, req.loss_db, logical_path_id).await?;
        tracing::info!(
            splice_id = splice.id,
            jc_id,
            splice_type = splice.splice_type.as_str(),
            "Created splice at {}",
            splice.incoming
        );
        Ok(splice)
    }

    /// Delete a splice. Returns false when it was already gone.
    pub async fn delete(conn: &mut SqliteConnection, jc_id: i64, splice_id: i64) -> Result<bool> {
        let Some(splice) = Self::get(conn, splice_id).await? else {
            tracing::debug!(jc_id, splice_id, "Splice already deleted");
            return Ok(false);
        };
        if splice.jc_id != jc_id {
            return Err(TopologyError::not_found("Splice", format!("{} in closure {}", splice_id, jc_id)).into());
        }
        if let Some(path_id) = splice.logical_path_id {
            return Err(TopologyError::conflict(format!(
                "splice {} carries logical path {}; deprovision the path instead",
                splice_id, path_id
            ))
            .into());
        }

        sqlx::query("DELETE FROM splice_endpoints WHERE splice_id = ?")
            .bind(splice_id)
            .execute(&mut *conn)
            .await
            .map_err(map_write_error)?;
        sqlx::query("DELETE FROM fiber_splices WHERE id = ?")
            .bind(splice_id)
            .execute(&mut *conn)
            .await
            .map_err(map_write_error)?;

        tracing::info!(jc_id, splice_id, "Deleted splice");
        Ok(true)
    }

    /// Remove every splice tagged with a logical path. Returns how many went.
    pub async fn delete_for_path(conn: &mut SqliteConnection, path_id: i64) -> Result<u64> {
        sqlx::query(
            "DELETE FROM splice_endpoints WHERE splice_id IN (SELECT id FROM fiber_splices WHERE logical_path_id = ?)",
        )
        .bind(path_id)
        .execute(&mut *conn)
        .await
        .map_err(map_write_error)?;

        let result = sqlx::query("DELETE FROM fiber_splices WHERE logical_path_id = ?")
            .bind(path_id)
            .execute(&mut *conn)
            .await
            .map_err(map_write_error)?;

        Ok(result.rows_affected())
    }

    /// Pair fiber n of cable A with fiber n of cable B for n = 1..=min(capacity).
    ///
    /// Pairing is strictly by index: a pair is skipped when either fiber end is
    /// already spliced in this closure or the fiber has no free end left.
    pub async fn auto_splice(
        conn: &mut SqliteConnection,
        jc_id: i64,
        req: &AutoSpliceRequest,
    ) -> Result<AutoSpliceResult> {
        JunctionClosureRepo::require(conn, jc_id).await?;
        if req.cable_a_id == req.cable_b_id {
            return Err(TopologyError::invalid(format!(
                "auto-splice needs exactly two distinct cables, got only cable {}",
                req.cable_a_id
            ))
            .into());
        }
        check_loss(req.loss_db)?;
        let cable_a = CableRepo::require(conn, req.cable_a_id).await?;
        let cable_b = CableRepo::require(conn, req.cable_b_id).await?;

        let index = SpliceIndex::new(Self::list_for_cables(conn, &[cable_a.id, cable_b.id]).await?);
        let busy = |fiber: FiberRef| index.splice_at(jc_id, fiber).is_some() || index.splice_count(fiber) >= 2;

        let mut splices = Vec::new();
        let mut skipped = 0;
        for n in 1..=cable_a.capacity.min(cable_b.capacity) {
            let (a, b) = (FiberRef::new(cable_a.id, n), FiberRef::new(cable_b.id, n));
            if busy(a) || busy(b) {
                skipped += 1;
                continue;
            }
            splices.push(Self::insert(conn, jc_id, a, Some(b), req.loss_db, None).await?);
        }

        tracing::info!(
            jc_id,
            cable_a = cable_a.id,
            cable_b = cable_b.id,
            created = splices.len(),
            skipped,
            "Auto-splice complete"
        );
        Ok(AutoSpliceResult {
            splices_created: splices.len(),
            splices,
        })
    }

    /// Global status of a fiber across both of its ends
    pub async fn fiber_status(conn: &mut SqliteConnection, fiber: FiberRef) -> Result<FiberStatusView> {
        CableRepo::require_fiber(conn, fiber).await?;
        let splices = Self::list_for_fiber(conn, fiber).await?;
        Ok(resolve_status(fiber, &splices))
    }

    /// Status of the fiber end inside one closure
    pub async fn fiber_status_at(
        conn: &mut SqliteConnection,
        jc_id: i64,
        fiber: FiberRef,
    ) -> Result<FiberStatusView> {
        JunctionClosureRepo::require(conn, jc_id).await?;
        CableRepo::require_fiber(conn, fiber).await?;
        let splices = Self::list_for_fiber(conn, fiber).await?;
        Ok(resolve_status_at(jc_id, fiber, &splices))
    }

    pub async fn cable_fibers(conn: &mut SqliteConnection, cable_id: i64) -> Result<Vec<FiberStatusView>> {
        let cable = CableRepo::require(conn, cable_id).await?;
        let index = SpliceIndex::new(Self::list_for_cables(conn, &[cable.id]).await?);

        Ok((1..=cable.capacity)
            .map(|n| {
                let fiber = FiberRef::new(cable.id, n);
                resolve_status(fiber, index.splices_for(fiber))
            })
            .collect())
    }

    /// The splice matrix of a closure: every cable present there with the
    /// status of each of its fiber ends in this closure. Cables present are the
    /// closure's own cable, cables spliced here, cables ending at the
    /// closure's node, then any extra cables asked for.
    pub async fn jc_details(
        conn: &mut SqliteConnection,
        jc_id: i64,
        extra_cable_ids: &[i64],
    ) -> Result<JcSplicingDetails> {
        let junction_closure = JunctionClosureRepo::require(conn, jc_id).await?;
        let splices = Self::list_for_jc(conn, jc_id).await?;

        let mut cable_ids: Vec<i64> = junction_closure.cable_id.into_iter().collect();
        let mut push = |id: i64| {
            if !cable_ids.contains(&id) {
                cable_ids.push(id);
            }
        };
        for fiber in splices.iter().flat_map(Splice::endpoints) {
            push(fiber.cable_id);
        }
        if let Some(node_id) = junction_closure.node_id {
            for cable in CableRepo::list_touching_node(conn, node_id).await? {
                push(cable.id);
            }
        }
        for &id in extra_cable_ids {
            push(id);
        }

        let mut cables_at_jc = Vec::with_capacity(cable_ids.len());
        for cable_id in cable_ids {
            let cable = CableRepo::require(conn, cable_id).await?;
            let fibers = (1..=cable.capacity)
                .map(|n| resolve_status_at(jc_id, FiberRef::new(cable.id, n), &splices))
                .collect();
            cables_at_jc.push(CableAtJc {
                cable_id: cable.id,
                route_name: cable.route_name,
                capacity: cable.capacity,
                fibers,
            });
        }

        Ok(JcSplicingDetails {
            junction_closure,
            cables_at_jc,
        })
    }

    /// Walk the continuous physical route of a fiber through every closure
    pub async fn trace(conn: &mut SqliteConnection, fiber: FiberRef) -> Result<FiberTrace> {
        CableRepo::require_fiber(conn, fiber).await?;
        let index = SpliceIndex::new(Self::list_all(conn).await?);
        let mut trace = trace_fiber(fiber, &index)?;
        apply_cable_lengths(&mut trace, &CableRepo::lengths(conn).await?);
        Ok(trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::*;
    use crate::error::TopologyErrorExt;

    fn f(cable: &Cable, n: i64) -> FiberRef {
        FiberRef::new(cable.id, n)
    }

    #[tokio::test]
    async fn test_splice_then_delete_restores_status() {
        let store = store().await;
        let (a, b) = (node(&store, "A").await, node(&store, "B").await);
        let ab = cable(&store, "A-B", 12, a, b).await;
        let bc = cable(&store, "B-C", 12, b, a).await;
        let jc = closure(&store, "JC-B", Some(ab.id)).await;

        let before = store.get_fiber_status(f(&ab, 4)).await.unwrap();
        assert_eq!(before.status, FiberStatus::Available);

        let splice = store
            .create_splice(jc, &CreateSpliceRequest::pass_through(f(&ab, 4), f(&bc, 7)))
            .await
            .unwrap();
        let incoming = store.get_fiber_status(f(&ab, 4)).await.unwrap();
        assert_eq!(incoming.status, FiberStatus::UsedAsIncoming);
        assert_eq!(incoming.peer, Some(f(&bc, 7)));
        let outgoing = store.get_fiber_status(f(&bc, 7)).await.unwrap();
        assert_eq!(outgoing.status, FiberStatus::UsedAsOutgoing);

        assert!(store.delete_splice(jc, splice.id).await.unwrap());
        assert_eq!(store.get_fiber_status(f(&ab, 4)).await.unwrap(), before);
        assert_eq!(store.get_fiber_status(f(&bc, 7)).await.unwrap().status, FiberStatus::Available);
    }

    #[tokio::test]
    async fn test_endpoint_exclusivity() {
        let store = store().await;
        let (a, b) = (node(&store, "A").await, node(&store, "B").await);
        let ab = cable(&store, "A-B", 4, a, b).await;
        let ba = cable(&store, "B-A", 4, b, a).await;
        let jc = closure(&store, "JC", None).await;

        tokio_test::assert_ok!(store.create_splice(jc, &CreateSpliceRequest::termination(f(&ab, 1))).await);

        for req in [
            CreateSpliceRequest::termination(f(&ab, 1)),
            CreateSpliceRequest::pass_through(f(&ab, 1), f(&ba, 1)),
            CreateSpliceRequest::pass_through(f(&ba, 2), f(&ab, 1)),
        ] {
            let err = tokio_test::assert_err!(store.create_splice(jc, &req).await);
            assert!(matches!(err.topology_error(), Some(TopologyError::Conflict(_))), "{err}");
        }
        // The failed attempts left nothing behind
        assert_eq!(store.get_fiber_status(f(&ba, 1)).await.unwrap().status, FiberStatus::Available);
        assert_eq!(store.get_fiber_status(f(&ba, 2)).await.unwrap().status, FiberStatus::Available);
    }

    #[tokio::test]
    async fn test_fiber_has_two_ends() {
        let store = store().await;
        let (a, b) = (node(&store, "A").await, node(&store, "B").await);
        let ab = cable(&store, "A-B", 4, a, b).await;
        let (jc1, jc2, jc3) = (
            closure(&store, "JC-1", None).await,
            closure(&store, "JC-2", None).await,
            closure(&store, "JC-3", None).await,
        );

        tokio_test::assert_ok!(store.create_splice(jc1, &CreateSpliceRequest::termination(f(&ab, 2))).await);
        tokio_test::assert_ok!(store.create_splice(jc2, &CreateSpliceRequest::termination(f(&ab, 2))).await);
        let err = tokio_test::assert_err!(
            store.create_splice(jc3, &CreateSpliceRequest::termination(f(&ab, 2))).await
        );
        assert!(matches!(err.topology_error(), Some(TopologyError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_create_splice_validation() {
        let store = store().await;
        let (a, b) = (node(&store, "A").await, node(&store, "B").await);
        let ab = cable(&store, "A-B", 4, a, b).await;
        let jc = closure(&store, "JC", None).await;

        let out_of_range = CreateSpliceRequest::termination(f(&ab, 5));
        let missing_outgoing = CreateSpliceRequest {
            splice_type: SpliceType::PassThrough,
            incoming: f(&ab, 1),
            outgoing: None,
            loss_db: None,
        };
        let to_itself = CreateSpliceRequest::pass_through(f(&ab, 1), f(&ab, 1));
        for req in [out_of_range, missing_outgoing, to_itself] {
            let err = tokio_test::assert_err!(store.create_splice(jc, &req).await);
            assert!(matches!(err.topology_error(), Some(TopologyError::InvalidOperation(_))));
        }

        let err = tokio_test::assert_err!(
            store.create_splice(jc, &CreateSpliceRequest::termination(FiberRef::new(77, 1))).await
        );
        assert!(matches!(err.topology_error(), Some(TopologyError::NotFound { .. })));
        let err = tokio_test::assert_err!(
            store.create_splice(jc + 100, &CreateSpliceRequest::termination(f(&ab, 1))).await
        );
        assert!(matches!(err.topology_error(), Some(TopologyError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_splice_idempotent() {
        let store = store().await;
        let (a, b) = (node(&store, "A").await, node(&store, "B").await);
        let ab = cable(&store, "A-B", 4, a, b).await;
        let jc = closure(&store, "JC", None).await;
        let other = closure(&store, "JC-other", None).await;
        let splice = store
            .create_splice(jc, &CreateSpliceRequest::termination(f(&ab, 3)))
            .await
            .unwrap();

        let err = tokio_test::assert_err!(store.delete_splice(other, splice.id).await);
        assert!(matches!(err.topology_error(), Some(TopologyError::NotFound { .. })));

        assert!(store.delete_splice(jc, splice.id).await.unwrap());
        assert!(!store.delete_splice(jc, splice.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_auto_splice_pairs_by_index() {
        let store = store().await;
        let (a, b) = (node(&store, "A").await, node(&store, "B").await);
        let big = cable(&store, "A-B 12F", 12, a, b).await;
        let small = cable(&store, "A-B 8F", 8, a, b).await;
        let jc = closure(&store, "JC", None).await;

        let result = store
            .auto_splice(jc, &AutoSpliceRequest { cable_a_id: big.id, cable_b_id: small.id, loss_db: Some(0.05) })
            .await
            .unwrap();
        assert_eq!(result.splices_created, 8);
        for (i, splice) in result.splices.iter().enumerate() {
            let n = i as i64 + 1;
            assert_eq!(splice.splice_type, SpliceType::PassThrough);
            assert_eq!(splice.incoming, f(&big, n));
            assert_eq!(splice.outgoing, Some(f(&small, n)));
        }

        let fibers = store.list_cable_fibers(big.id).await.unwrap();
        assert_eq!(fibers.len(), 12);
        for view in &fibers[8..] {
            assert_eq!(view.status, FiberStatus::Available, "fiber {}", view.fiber_no);
        }
        assert!(fibers[..8].iter().all(|v| v.status == FiberStatus::UsedAsIncoming));
    }

    #[tokio::test]
    async fn test_auto_splice_skips_busy_fibers() {
        let store = store().await;
        let (a, b) = (node(&store, "A").await, node(&store, "B").await);
        let left = cable(&store, "left", 4, a, b).await;
        let right = cable(&store, "right", 4, a, b).await;
        let jc = closure(&store, "JC", None).await;
        store.create_splice(jc, &CreateSpliceRequest::termination(f(&right, 3))).await.unwrap();

        let result = store
            .auto_splice(jc, &AutoSpliceRequest { cable_a_id: left.id, cable_b_id: right.id, loss_db: None })
            .await
            .unwrap();
        let paired: Vec<i64> = result.splices.iter().map(|s| s.incoming.fiber_no).collect();
        assert_eq!(paired, vec![1, 2, 4]);
        assert_eq!(store.get_fiber_status(f(&left, 3)).await.unwrap().status, FiberStatus::Available);
    }

    #[tokio::test]
    async fn test_auto_splice_needs_two_cables() {
        let store = store().await;
        let (a, b) = (node(&store, "A").await, node(&store, "B").await);
        let ab = cable(&store, "A-B", 4, a, b).await;
        let jc = closure(&store, "JC", None).await;

        let err = tokio_test::assert_err!(
            store
                .auto_splice(jc, &AutoSpliceRequest { cable_a_id: ab.id, cable_b_id: ab.id, loss_db: None })
                .await
        );
        assert!(matches!(err.topology_error(), Some(TopologyError::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn test_trace_across_closures() {
        let store = store().await;
        let (a, b, c, d) = (
            node(&store, "A").await,
            node(&store, "B").await,
            node(&store, "C").await,
            node(&store, "D").await,
        );
        let ab = cable_with_length(&store, "A-B", 6, a, b, 2.0).await;
        let bc = cable_with_length(&store, "B-C", 6, b, c, 3.5).await;
        let cd = cable_with_length(&store, "C-D", 6, c, d, 1.0).await;
        let (ja, jb, jc, jd) = (
            closure(&store, "A", None).await,
            closure(&store, "B", None).await,
            closure(&store, "C", None).await,
            closure(&store, "D", None).await,
        );

        let term_a = store.create_splice(ja, &CreateSpliceRequest::termination(f(&ab, 2))).await.unwrap();
        let mut joint = CreateSpliceRequest::pass_through(f(&ab, 2), f(&bc, 5));
        joint.loss_db = Some(0.1);
        let at_b = store.create_splice(jb, &joint).await.unwrap();
        let mut joint = CreateSpliceRequest::pass_through(f(&bc, 5), f(&cd, 1));
        joint.loss_db = Some(0.2);
        store.create_splice(jc, &joint).await.unwrap();
        store.create_splice(jd, &CreateSpliceRequest::termination(f(&cd, 1))).await.unwrap();

        let trace = store.trace_fiber(f(&bc, 5)).await.unwrap();
        let hops: Vec<FiberRef> = trace.hops.iter().map(|h| FiberRef::new(h.cable_id, h.fiber_no)).collect();
        assert_eq!(hops, vec![f(&ab, 2), f(&bc, 5), f(&cd, 1)]);
        assert_eq!(trace.hops[0].splice_id, Some(at_b.id));
        assert_eq!(trace.start, TraceTerminus::Terminated { jc_id: ja, splice_id: term_a.id });
        assert!(matches!(trace.end, TraceTerminus::Terminated { jc_id, .. } if jc_id == jd));
        assert_eq!(trace.total_length_km, Some(6.5));
        assert!((trace.total_loss_db - 0.3).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_trace_cycle_detected() {
        let store = store().await;
        let (a, b) = (node(&store, "A").await, node(&store, "B").await);
        let ca = cable(&store, "A", 2, a, b).await;
        let cb = cable(&store, "B", 2, b, a).await;
        let (j1, j2) = (closure(&store, "J1", None).await, closure(&store, "J2", None).await);

        store.create_splice(j1, &CreateSpliceRequest::pass_through(f(&ca, 1), f(&cb, 1))).await.unwrap();
        store.create_splice(j2, &CreateSpliceRequest::pass_through(f(&cb, 1), f(&ca, 1))).await.unwrap();

        let err = tokio_test::assert_err!(store.trace_fiber(f(&ca, 1)).await);
        assert!(matches!(err.topology_error(), Some(TopologyError::CycleDetected(_))));
    }

    #[tokio::test]
    async fn test_jc_details_lists_cables_present() {
        let store = store().await;
        let (a, b) = (node(&store, "A").await, node(&store, "B").await);
        let anchor = cable(&store, "anchor", 2, a, b).await;
        let other = cable(&store, "other", 3, a, b).await;
        let jc = closure(&store, "JC", Some(anchor.id)).await;
        let splice = store
            .create_splice(jc, &CreateSpliceRequest::pass_through(f(&anchor, 2), f(&other, 3)))
            .await
            .unwrap();

        let details = store.get_jc_splicing_details(jc, &[]).await.unwrap();
        let ids: Vec<i64> = details.cables_at_jc.iter().map(|c| c.cable_id).collect();
        assert_eq!(ids, vec![anchor.id, other.id]);

        let anchor_fibers = &details.cables_at_jc[0].fibers;
        assert_eq!(anchor_fibers[0].status, FiberStatus::Available);
        assert_eq!(anchor_fibers[1].status, FiberStatus::UsedAsIncoming);
        assert_eq!(anchor_fibers[1].splice_id, Some(splice.id));
        assert_eq!(details.cables_at_jc[1].fibers[2].status, FiberStatus::UsedAsOutgoing);

        let at = store.get_fiber_status_at(jc, f(&other, 3)).await.unwrap();
        assert_eq!(at.peer, Some(f(&anchor, 2)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_splices_on_one_end() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = file_store(&dir).await;
        let (a, b) = (node(&store, "A").await, node(&store, "B").await);
        let ab = cable(&store, "A-B", 4, a, b).await;
        let jc = closure(&store, "JC", None).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let req = CreateSpliceRequest::termination(f(&ab, 1));
            handles.push(tokio::spawn(async move { store.create_splice(jc, &req).await }));
        }

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(err) => assert!(matches!(err.topology_error(), Some(TopologyError::Conflict(_))), "{err}"),
            }
        }
        assert_eq!(created, 1);

        let mut conn = store.pool().acquire().await.unwrap();
        assert_eq!(SpliceRepo::list_for_jc(&mut *conn, jc).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_auto_splice_is_all_or_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = file_store(&dir).await;
        let (a, b) = (node(&store, "A").await, node(&store, "B").await);
        let left = cable(&store, "A-B 24F", 24, a, b).await;
        let right = cable(&store, "A-B 24F spare", 24, a, b).await;
        let jc = closure(&store, "JC", None).await;

        let mut handles = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            let req = AutoSpliceRequest { cable_a_id: left.id, cable_b_id: right.id, loss_db: None };
            handles.push(tokio::spawn(async move { store.auto_splice(jc, &req).await }));
        }

        let mut full_batches = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(result) if result.splices_created == 24 => full_batches += 1,
                // Ran after the winner committed and found every pair taken
                Ok(result) => assert_eq!(result.splices_created, 0),
                Err(err) => assert!(matches!(err.topology_error(), Some(TopologyError::Conflict(_))), "{err}"),
            }
        }
        assert_eq!(full_batches, 1);

        let mut conn = store.pool().acquire().await.unwrap();
        assert_eq!(SpliceRepo::list_for_jc(&mut *conn, jc).await.unwrap().len(), 24);
    }
}
