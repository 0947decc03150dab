use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical logical path role values
pub mod path_role {
    pub const WORKING: &str = "working";
    pub const PROTECTION: &str = "protection";
    pub const SERVICE: &str = "service";

    pub const ALL: &[&str] = &[WORKING, PROTECTION, SERVICE];

    pub fn is_valid(role: &str) -> bool {
        ALL.contains(&role)
    }
}

/// Canonical operational status names (rows of `operational_statuses`)
pub mod operational_status {
    pub const PROVISIONED: &str = "provisioned";
}

/// LogicalFiberPath is a named circuit between two systems
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalFiberPath {
    pub id: i64,
    pub path_name: String,
    pub path_role: String,
    pub source_system_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_system_id: Option<i64>,
    /// None means the path is not provisioned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operational_status_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_fiber_no: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protection_fiber_no: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LogicalFiberPath {
    pub fn is_provisioned(&self) -> bool {
        self.operational_status_id.is_some()
    }
}

/// CreateLogicalPathRequest for creating new logical paths
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLogicalPathRequest {
    pub path_name: String,
    #[serde(default = "default_path_role")]
    pub path_role: String,
    pub source_system_id: i64,
    #[serde(default)]
    pub destination_system_id: Option<i64>,
}

fn default_path_role() -> String {
    path_role::WORKING.to_string()
}

/// PathSegment is one cable hop of a logical path, oriented along the path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    pub id: i64,
    pub logical_path_id: i64,
    pub ofc_cable_id: i64,
    pub path_order: i64,
    pub start_node_id: i64,
    pub end_node_id: i64,
}

/// AddSegmentRequest appends (or inserts at `order`) a cable to a path
#[derive(Debug, Clone, Deserialize)]
pub struct AddSegmentRequest {
    pub cable_id: i64,
    #[serde(default)]
    pub order: Option<i64>,
}

/// ReorderSegmentsRequest carries the complete new ordering of a path's segments
#[derive(Debug, Clone, Deserialize)]
pub struct ReorderSegmentsRequest {
    pub segment_ids: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStatus {
    Empty,
    Broken,
    ValidRing,
    OpenPath,
}

impl PathStatus {
    pub fn is_provisionable(&self) -> bool {
        matches!(self, PathStatus::ValidRing | PathStatus::OpenPath)
    }
}

/// RingValidation is the classification of a path's segment chain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RingValidation {
    pub status: PathStatus,
    pub message: String,
}

/// ProvisionRequest selects the working and protection fibers for a path
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionRequest {
    pub working_fiber: i64,
    pub protection_fiber: i64,
    #[serde(default)]
    pub source_port: Option<String>,
    #[serde(default)]
    pub destination_port: Option<String>,
}

/// SystemConnection is the service riding on a provisioned path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConnection {
    pub id: i64,
    pub system_id: i64,
    pub logical_path_id: i64,
    pub working_fiber_no: i64,
    pub protection_fiber_no: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_port: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// ProvisionResult is returned by a successful provisioning call
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionResult {
    pub path: LogicalFiberPath,
    pub connection: SystemConnection,
    pub splices_created: usize,
}
