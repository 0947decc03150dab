use sqlx::{Row, sqlite::SqliteRow};

use crate::models::*;

/// Filter empty strings to None, for columns that store '' instead of NULL
pub fn none_if_empty(opt: Option<String>) -> Option<String> {
    opt.filter(|s| !s.is_empty())
}

fn optional_fiber(row: &SqliteRow, cable_col: &str, fiber_col: &str) -> Option<FiberRef> {
    let cable: Option<i64> = row.get(cable_col);
    let fiber: Option<i64> = row.get(fiber_col);
    cable.zip(fiber).map(|(c, f)| FiberRef::new(c, f))
}

/// Map a SQLite row to a Node struct
pub fn map_node_row(row: &SqliteRow) -> Node {
    Node {
        id: row.get("id"),
        name: row.get("name"),
        node_type: none_if_empty(row.get("node_type")),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Map a SQLite row to a System struct
pub fn map_system_row(row: &SqliteRow) -> System {
    let is_hub: i32 = row.get("is_hub");
    System {
        id: row.get("id"),
        system_name: row.get("system_name"),
        node_id: row.get("node_id"),
        is_hub: is_hub != 0,
        order_in_ring: row.get("order_in_ring"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Map a SQLite row to a Cable struct
pub fn map_cable_row(row: &SqliteRow) -> Cable {
    Cable {
        id: row.get("id"),
        route_name: row.get("route_name"),
        capacity: row.get("capacity"),
        start_node_id: row.get("start_node_id"),
        end_node_id: row.get("end_node_id"),
        length_km: row.get("length_km"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Map a SQLite row to a JunctionClosure struct
pub fn map_junction_closure_row(row: &SqliteRow) -> JunctionClosure {
    JunctionClosure {
        id: row.get("id"),
        name: row.get("name"),
        cable_id: row.get("cable_id"),
        node_id: row.get("node_id"),
        position_km: row.get("position_km"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Map a SQLite row to a Splice struct
pub fn map_splice_row(row: &SqliteRow) -> Splice {
    let outgoing = optional_fiber(row, "outgoing_cable_id", "outgoing_fiber_no");
    let splice_type: String = row.get("splice_type");
    // The table CHECK keeps type and outgoing columns consistent
    let splice_type = SpliceType::parse(&splice_type).unwrap_or(if outgoing.is_some() {
        SpliceType::PassThrough
    } else {
        SpliceType::Termination
    });
    Splice {
        id: row.get("id"),
        jc_id: row.get("jc_id"),
        splice_type,
        incoming: FiberRef::new(row.get("incoming_cable_id"), row.get("incoming_fiber_no")),
        outgoing,
        loss_db: row.get("loss_db"),
        logical_path_id: row.get("logical_path_id"),
        created_at: row.get("created_at"),
    }
}

/// Map a SQLite row to a LogicalFiberPath struct
pub fn map_logical_path_row(row: &SqliteRow) -> LogicalFiberPath {
    LogicalFiberPath {
        id: row.get("id"),
        path_name: row.get("path_name"),
        path_role: row.get("path_role"),
        source_system_id: row.get("source_system_id"),
        destination_system_id: row.get("destination_system_id"),
        operational_status_id: row.get("operational_status_id"),
        working_fiber_no: row.get("working_fiber_no"),
        protection_fiber_no: row.get("protection_fiber_no"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Map a SQLite row to a PathSegment struct
pub fn map_path_segment_row(row: &SqliteRow) -> PathSegment {
    PathSegment {
        id: row.get("id"),
        logical_path_id: row.get("logical_path_id"),
        ofc_cable_id: row.get("ofc_cable_id"),
        path_order: row.get("path_order"),
        start_node_id: row.get("start_node_id"),
        end_node_id: row.get("end_node_id"),
    }
}

/// Map a SQLite row to a SystemConnection struct
pub fn map_system_connection_row(row: &SqliteRow) -> SystemConnection {
    SystemConnection {
        id: row.get("id"),
        system_id: row.get("system_id"),
        logical_path_id: row.get("logical_path_id"),
        working_fiber_no: row.get("working_fiber_no"),
        protection_fiber_no: row.get("protection_fiber_no"),
        source_port: none_if_empty(row.get("source_port")),
        destination_port: none_if_empty(row.get("destination_port")),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
