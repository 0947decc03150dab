mod cables;
mod connections;
mod junction_closures;
mod nodes;
mod paths;
mod provisioning;
pub(crate) mod row_helpers;
mod splices;
mod systems;

use anyhow::{Context, Result};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};

use crate::error::{map_tx_error, map_write_error};
use crate::models::*;

/// Store handles all database operations, delegating to per-entity repo modules.
///
/// Reads run on a pooled connection; every mutating operation runs in one
/// transaction so partial writes are never visible.
#[derive(Clone)]
pub struct Store {
    pool: Pool<Sqlite>,
}

impl Store {
    /// Create a new database store with configurable pool size
    pub async fn new(db_path: &str) -> Result<Self> {
        Self::with_pool_size(db_path, 5).await
    }

    /// Create a new database store with a specific pool size
    pub async fn with_pool_size(db_path: &str, max_connections: u32) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&db_url)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database. A single connection that never expires,
    /// since each SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ========== Node Operations ==========

    pub async fn list_nodes(&self) -> Result<Vec<Node>> {
        let mut conn = self.pool.acquire().await?;
        nodes::NodeRepo::list(&mut *conn).await
    }

    pub async fn get_node(&self, id: i64) -> Result<Option<Node>> {
        let mut conn = self.pool.acquire().await?;
        nodes::NodeRepo::get(&mut *conn, id).await
    }

    pub async fn create_node(&self, req: &CreateNodeRequest) -> Result<Node> {
        let mut conn = self.pool.acquire().await?;
        nodes::NodeRepo::create(&mut *conn, req).await
    }

    // ========== System Operations ==========

    pub async fn list_systems(&self) -> Result<Vec<System>> {
        let mut conn = self.pool.acquire().await?;
        systems::SystemRepo::list(&mut *conn).await
    }

    pub async fn get_system(&self, id: i64) -> Result<Option<System>> {
        let mut conn = self.pool.acquire().await?;
        systems::SystemRepo::get(&mut *conn, id).await
    }

    pub async fn create_system(&self, req: &CreateSystemRequest) -> Result<System> {
        let mut conn = self.pool.acquire().await?;
        systems::SystemRepo::create(&mut *conn, req).await
    }

    // ========== Cable Operations ==========

    pub async fn list_cables(&self) -> Result<Vec<Cable>> {
        let mut conn = self.pool.acquire().await?;
        cables::CableRepo::list(&mut *conn).await
    }

    pub async fn get_cable(&self, id: i64) -> Result<Option<Cable>> {
        let mut conn = self.pool.acquire().await?;
        cables::CableRepo::get(&mut *conn, id).await
    }

    pub async fn create_cable(&self, req: &CreateCableRequest) -> Result<Cable> {
        let mut conn = self.pool.acquire().await?;
        cables::CableRepo::create(&mut *conn, req).await
    }

    pub async fn find_cable_between_nodes(&self, a: i64, b: i64) -> Result<Option<Cable>> {
        let mut conn = self.pool.acquire().await?;
        cables::CableRepo::find_between_nodes(&mut *conn, a, b).await
    }

    // ========== Junction Closure Operations ==========

    pub async fn list_junction_closures(&self) -> Result<Vec<JunctionClosure>> {
        let mut conn = self.pool.acquire().await?;
        junction_closures::JunctionClosureRepo::list(&mut *conn).await
    }

    pub async fn get_junction_closure(&self, id: i64) -> Result<Option<JunctionClosure>> {
        let mut conn = self.pool.acquire().await?;
        junction_closures::JunctionClosureRepo::get(&mut *conn, id).await
    }

    pub async fn create_junction_closure(&self, req: &CreateJunctionClosureRequest) -> Result<JunctionClosure> {
        let mut conn = self.pool.acquire().await?;
        junction_closures::JunctionClosureRepo::create(&mut *conn, req).await
    }

    // ========== Fiber Status Operations ==========

    pub async fn get_fiber_status(&self, fiber: FiberRef) -> Result<FiberStatusView> {
        let mut conn = self.pool.acquire().await?;
        splices::SpliceRepo::fiber_status(&mut *conn, fiber).await
    }

    pub async fn get_fiber_status_at(&self, jc_id: i64, fiber: FiberRef) -> Result<FiberStatusView> {
        let mut conn = self.pool.acquire().await?;
        splices::SpliceRepo::fiber_status_at(&mut *conn, jc_id, fiber).await
    }

    pub async fn list_cable_fibers(&self, cable_id: i64) -> Result<Vec<FiberStatusView>> {
        let mut conn = self.pool.acquire().await?;
        splices::SpliceRepo::cable_fibers(&mut *conn, cable_id).await
    }

    pub async fn trace_fiber(&self, fiber: FiberRef) -> Result<FiberTrace> {
        let mut conn = self.pool.acquire().await?;
        splices::SpliceRepo::trace(&mut *conn, fiber).await
    }

    // ========== Splice Operations ==========

    pub async fn get_jc_splicing_details(&self, jc_id: i64, extra_cable_ids: &[i64]) -> Result<JcSplicingDetails> {
        let mut conn = self.pool.acquire().await?;
        splices::SpliceRepo::jc_details(&mut *conn, jc_id, extra_cable_ids).await
    }

    pub async fn create_splice(&self, jc_id: i64, req: &CreateSpliceRequest) -> Result<Splice> {
        let mut tx = self.pool.begin().await?;
        let splice = splices::SpliceRepo::create(&mut *tx, jc_id, req, None)
            .await
            .map_err(map_tx_error)?;
        tx.commit().await.map_err(map_write_error)?;
        Ok(splice)
    }

    /// Returns false when the splice was already gone
    pub async fn delete_splice(&self, jc_id: i64, splice_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let deleted = splices::SpliceRepo::delete(&mut *tx, jc_id, splice_id)
            .await
            .map_err(map_tx_error)?;
        tx.commit().await.map_err(map_write_error)?;
        Ok(deleted)
    }

    pub async fn auto_splice(&self, jc_id: i64, req: &AutoSpliceRequest) -> Result<AutoSpliceResult> {
        let mut tx = self.pool.begin().await?;
        let result = splices::SpliceRepo::auto_splice(&mut *tx, jc_id, req)
            .await
            .map_err(map_tx_error)?;
        tx.commit().await.map_err(map_write_error)?;
        Ok(result)
    }

    // ========== Logical Path Operations ==========

    pub async fn list_logical_paths(&self) -> Result<Vec<LogicalFiberPath>> {
        let mut conn = self.pool.acquire().await?;
        paths::PathRepo::list(&mut *conn).await
    }

    pub async fn get_logical_path(&self, id: i64) -> Result<Option<LogicalFiberPath>> {
        let mut conn = self.pool.acquire().await?;
        paths::PathRepo::get(&mut *conn, id).await
    }

    pub async fn create_logical_path(&self, req: &CreateLogicalPathRequest) -> Result<LogicalFiberPath> {
        let mut conn = self.pool.acquire().await?;
        paths::PathRepo::create(&mut *conn, req).await
    }

    pub async fn validate_ring_path(&self, path_id: i64) -> Result<RingValidation> {
        let mut conn = self.pool.acquire().await?;
        paths::PathRepo::validate(&mut *conn, path_id).await
    }

    pub async fn list_candidate_cables(&self, path_id: i64) -> Result<Vec<Cable>> {
        let mut conn = self.pool.acquire().await?;
        paths::PathRepo::candidate_cables(&mut *conn, path_id).await
    }

    // ========== Path Segment Operations ==========

    pub async fn list_segments(&self, path_id: i64) -> Result<Vec<PathSegment>> {
        let mut conn = self.pool.acquire().await?;
        paths::PathRepo::require(&mut *conn, path_id).await?;
        paths::PathRepo::list_segments(&mut *conn, path_id).await
    }

    pub async fn add_segment(&self, path_id: i64, req: &AddSegmentRequest) -> Result<PathSegment> {
        let mut tx = self.pool.begin().await?;
        let segment = paths::PathRepo::add_segment(&mut *tx, path_id, req)
            .await
            .map_err(map_tx_error)?;
        tx.commit().await.map_err(map_write_error)?;
        Ok(segment)
    }

    pub async fn delete_segment(&self, segment_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        paths::PathRepo::delete_segment(&mut *tx, segment_id).await.map_err(map_tx_error)?;
        tx.commit().await.map_err(map_write_error)?;
        Ok(())
    }

    pub async fn reorder_segments(&self, path_id: i64, segment_ids: &[i64]) -> Result<Vec<PathSegment>> {
        let mut tx = self.pool.begin().await?;
        let segments = paths::PathRepo::reorder_segments(&mut *tx, path_id, segment_ids)
            .await
            .map_err(map_tx_error)?;
        tx.commit().await.map_err(map_write_error)?;
        Ok(segments)
    }

    // ========== Provisioning Operations ==========

    pub async fn get_available_fibers(&self, path_id: i64) -> Result<Vec<i64>> {
        let mut conn = self.pool.acquire().await?;
        provisioning::ProvisioningRepo::available_fibers(&mut *conn, path_id).await
    }

    pub async fn provision_path(&self, path_id: i64, req: &ProvisionRequest) -> Result<ProvisionResult> {
        let mut tx = self.pool.begin().await?;
        let result = provisioning::ProvisioningRepo::provision(&mut *tx, path_id, req)
            .await
            .map_err(map_tx_error)?;
        tx.commit().await.map_err(map_write_error)?;
        Ok(result)
    }

    /// Returns false when the path was not provisioned
    pub async fn deprovision_path(&self, path_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let changed = provisioning::ProvisioningRepo::deprovision(&mut *tx, path_id)
            .await
            .map_err(map_tx_error)?;
        tx.commit().await.map_err(map_write_error)?;
        Ok(changed)
    }

    // ========== System Connection Operations ==========

    pub async fn list_system_connections(&self) -> Result<Vec<SystemConnection>> {
        let mut conn = self.pool.acquire().await?;
        connections::ConnectionRepo::list(&mut *conn).await
    }

    pub async fn get_system_connection(&self, path_id: i64) -> Result<Option<SystemConnection>> {
        let mut conn = self.pool.acquire().await?;
        connections::ConnectionRepo::get_for_path(&mut *conn, path_id).await
    }
}

/// Builders shared by the repo tests
#[cfg(test)]
pub(crate) mod test_support {
    use super::Store;
    use crate::models::*;

    pub async fn store() -> Store {
        Store::in_memory().await.unwrap()
    }

    /// File-backed store with a real pool, for tests where writers contend
    pub async fn file_store(dir: &tempfile::TempDir) -> Store {
        let path = dir.path().join("topology.db");
        Store::with_pool_size(&path.to_string_lossy(), 8).await.unwrap()
    }

    pub async fn node(store: &Store, name: &str) -> i64 {
        store
            .create_node(&CreateNodeRequest { name: name.into(), node_type: None })
            .await
            .unwrap()
            .id
    }

    pub async fn cable(store: &Store, name: &str, capacity: i64, a: i64, b: i64) -> Cable {
        store
            .create_cable(&CreateCableRequest {
                route_name: name.into(),
                capacity,
                start_node_id: a,
                end_node_id: b,
                length_km: None,
            })
            .await
            .unwrap()
    }

    pub async fn cable_with_length(store: &Store, name: &str, capacity: i64, a: i64, b: i64, km: f64) -> Cable {
        store
            .create_cable(&CreateCableRequest {
                route_name: name.into(),
                capacity,
                start_node_id: a,
                end_node_id: b,
                length_km: Some(km),
            })
            .await
            .unwrap()
    }

    pub async fn closure(store: &Store, name: &str, cable_id: Option<i64>) -> i64 {
        store
            .create_junction_closure(&CreateJunctionClosureRequest {
                name: name.into(),
                cable_id,
                node_id: None,
                position_km: None,
            })
            .await
            .unwrap()
            .id
    }

    pub async fn system(store: &Store, name: &str, node_id: i64) -> i64 {
        store
            .create_system(&CreateSystemRequest {
                system_name: name.into(),
                node_id,
                is_hub: false,
                order_in_ring: None,
            })
            .await
            .unwrap()
            .id
    }

    /// A logical path whose source system sits at `node_id`
    pub async fn path_from(store: &Store, node_id: i64) -> i64 {
        let source = system(store, "SRC", node_id).await;
        store
            .create_logical_path(&CreateLogicalPathRequest {
                path_name: "ring".into(),
                path_role: path_role::WORKING.into(),
                source_system_id: source,
                destination_system_id: None,
            })
            .await
            .unwrap()
            .id
    }
}
