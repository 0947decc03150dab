use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Node is a physical location (station, exchange, manhole) that cables run between
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// CreateNodeRequest for creating new nodes
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNodeRequest {
    pub name: String,
    #[serde(default)]
    pub node_type: Option<String>,
}

/// System is a piece of transmission equipment homed at a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct System {
    pub id: i64,
    pub system_name: String,
    pub node_id: i64,
    pub is_hub: bool,
    /// Integer values are ring backbone positions, fractional values are spurs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_in_ring: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// CreateSystemRequest for creating new systems
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSystemRequest {
    pub system_name: String,
    pub node_id: i64,
    #[serde(default)]
    pub is_hub: bool,
    #[serde(default)]
    pub order_in_ring: Option<f64>,
}

/// Cable is an optical fiber cable (OFC) between two nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cable {
    pub id: i64,
    pub route_name: String,
    pub capacity: i64,
    pub start_node_id: i64,
    pub end_node_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length_km: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cable {
    pub fn has_fiber(&self, fiber_no: i64) -> bool {
        (1..=self.capacity).contains(&fiber_no)
    }

    /// The node at the other end of the cable, if `node_id` is one of its ends
    pub fn opposite_node(&self, node_id: i64) -> Option<i64> {
        if self.start_node_id == node_id {
            Some(self.end_node_id)
        } else if self.end_node_id == node_id {
            Some(self.start_node_id)
        } else {
            None
        }
    }
}

/// CreateCableRequest for creating new cables. Capacity is fixed after creation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCableRequest {
    pub route_name: String,
    pub capacity: i64,
    pub start_node_id: i64,
    pub end_node_id: i64,
    #[serde(default)]
    pub length_km: Option<f64>,
}

/// JunctionClosure is the enclosure where splices are recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JunctionClosure {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cable_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_km: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// CreateJunctionClosureRequest for creating new junction closures
#[derive(Debug, Clone, Deserialize)]
pub struct CreateJunctionClosureRequest {
    pub name: String,
    #[serde(default)]
    pub cable_id: Option<i64>,
    #[serde(default)]
    pub node_id: Option<i64>,
    #[serde(default)]
    pub position_km: Option<f64>,
}
