use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::JunctionClosure;

/// FiberRef identifies one glass fiber: fiber `fiber_no` of cable `cable_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FiberRef {
    pub cable_id: i64,
    pub fiber_no: i64,
}

impl FiberRef {
    pub fn new(cable_id: i64, fiber_no: i64) -> Self {
        Self { cable_id, fiber_no }
    }
}

impl fmt::Display for FiberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cable {} fiber {}", self.cable_id, self.fiber_no)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpliceType {
    PassThrough,
    Termination,
}

impl SpliceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpliceType::PassThrough => "pass_through",
            SpliceType::Termination => "termination",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pass_through" => Some(SpliceType::PassThrough),
            "termination" => Some(SpliceType::Termination),
            _ => None,
        }
    }
}

/// Splice is a physical join (pass-through) or end (termination) of fibers at a closure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Splice {
    pub id: i64,
    pub jc_id: i64,
    pub splice_type: SpliceType,
    pub incoming: FiberRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outgoing: Option<FiberRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss_db: Option<f64>,
    /// Set when the splice was laid down by path provisioning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logical_path_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Splice {
    /// Both fiber ends this splice occupies
    pub fn endpoints(&self) -> impl Iterator<Item = FiberRef> {
        std::iter::once(self.incoming).chain(self.outgoing)
    }

    /// The fiber on the other side of a pass-through, walking from `fiber`
    pub fn peer_of(&self, fiber: FiberRef) -> Option<FiberRef> {
        match self.outgoing {
            Some(out) if self.incoming == fiber => Some(out),
            Some(out) if out == fiber => Some(self.incoming),
            _ => None,
        }
    }
}

/// CreateSpliceRequest for recording a splice at a junction closure
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSpliceRequest {
    pub splice_type: SpliceType,
    pub incoming: FiberRef,
    #[serde(default)]
    pub outgoing: Option<FiberRef>,
    #[serde(default)]
    pub loss_db: Option<f64>,
}

impl CreateSpliceRequest {
    pub fn pass_through(incoming: FiberRef, outgoing: FiberRef) -> Self {
        Self {
            splice_type: SpliceType::PassThrough,
            incoming,
            outgoing: Some(outgoing),
            loss_db: None,
        }
    }

    pub fn termination(incoming: FiberRef) -> Self {
        Self {
            splice_type: SpliceType::Termination,
            incoming,
            outgoing: None,
            loss_db: None,
        }
    }
}

/// AutoSpliceRequest pairs fiber n of cable A with fiber n of cable B
#[derive(Debug, Clone, Deserialize)]
pub struct AutoSpliceRequest {
    pub cable_a_id: i64,
    pub cable_b_id: i64,
    #[serde(default)]
    pub loss_db: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutoSpliceResult {
    pub splices_created: usize,
    pub splices: Vec<Splice>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FiberStatus {
    Available,
    UsedAsIncoming,
    UsedAsOutgoing,
    Terminated,
}

/// Resolved status of a fiber (or of one fiber end at a closure)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FiberStatusView {
    pub cable_id: i64,
    pub fiber_no: i64,
    pub status: FiberStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer: Option<FiberRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub splice_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jc_id: Option<i64>,
}

/// Fibers of one cable as seen inside a junction closure
#[derive(Debug, Clone, Serialize)]
pub struct CableAtJc {
    pub cable_id: i64,
    pub route_name: String,
    pub capacity: i64,
    pub fibers: Vec<FiberStatusView>,
}

/// JcSplicingDetails is the splice-matrix view of a junction closure
#[derive(Debug, Clone, Serialize)]
pub struct JcSplicingDetails {
    pub junction_closure: JunctionClosure,
    pub cables_at_jc: Vec<CableAtJc>,
}

/// How one end of a physical trace finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceTerminus {
    /// A termination splice in the given closure
    Terminated { jc_id: i64, splice_id: i64 },
    /// No further splice on this fiber end
    Open,
}

/// One cable+fiber leg of a physical trace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceHop {
    pub cable_id: i64,
    pub fiber_no: i64,
    /// Closure joining this hop to the next one; None on the last hop
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jc_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub splice_id: Option<i64>,
}

/// FiberTrace is the continuous physical route of a fiber, end to end
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FiberTrace {
    pub hops: Vec<TraceHop>,
    pub start: TraceTerminus,
    pub end: TraceTerminus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_length_km: Option<f64>,
    pub total_loss_db: f64,
}
