use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

/// Build the application router with all routes
pub fn build(state: Arc<AppState>) -> Router {
    let cors_allow_any = state.config.cors_allow_any;

    let router = Router::new()
        .route("/api/health", get(handlers::healthcheck))
        // Node routes
        .route("/api/nodes", get(handlers::nodes::list_nodes))
        .route("/api/nodes", post(handlers::nodes::create_node))
        .route("/api/nodes/:id", get(handlers::nodes::get_node))
        // System routes
        .route("/api/systems", get(handlers::systems::list_systems))
        .route("/api/systems", post(handlers::systems::create_system))
        .route("/api/systems/:id", get(handlers::systems::get_system))
        .route("/api/system-connections", get(handlers::systems::list_system_connections))
        // Cable routes
        .route("/api/cables", get(handlers::cables::list_cables))
        .route("/api/cables", post(handlers::cables::create_cable))
        .route("/api/cables/between/:a/:b", get(handlers::cables::find_cable_between))
        .route("/api/cables/:id", get(handlers::cables::get_cable))
        .route("/api/cables/:id/fibers", get(handlers::cables::list_cable_fibers))
        .route("/api/cables/:id/fibers/:fiber_no", get(handlers::cables::get_fiber_status))
        .route("/api/cables/:id/fibers/:fiber_no/trace", get(handlers::cables::trace_fiber))
        // Junction closure and splice routes
        .route("/api/junction-closures", get(handlers::junction_closures::list_junction_closures))
        .route("/api/junction-closures", post(handlers::junction_closures::create_junction_closure))
        .route("/api/junction-closures/:id", get(handlers::junction_closures::get_junction_closure))
        .route("/api/junction-closures/:id/splicing", get(handlers::junction_closures::get_splicing_details))
        .route(
            "/api/junction-closures/:id/fibers/:cable_id/:fiber_no",
            get(handlers::junction_closures::get_fiber_status_at),
        )
        .route("/api/junction-closures/:id/splices", post(handlers::junction_closures::create_splice))
        .route(
            "/api/junction-closures/:id/splices/:splice_id",
            delete(handlers::junction_closures::delete_splice),
        )
        .route("/api/junction-closures/:id/auto-splice", post(handlers::junction_closures::auto_splice))
        // Logical path routes
        .route("/api/paths", get(handlers::paths::list_paths))
        .route("/api/paths", post(handlers::paths::create_path))
        .route("/api/paths/:id", get(handlers::paths::get_path))
        .route("/api/paths/:id/segments", get(handlers::paths::list_segments))
        .route("/api/paths/:id/segments", post(handlers::paths::add_segment))
        .route("/api/paths/:id/segments/order", put(handlers::paths::reorder_segments))
        .route("/api/segments/:id", delete(handlers::paths::delete_segment))
        .route("/api/paths/:id/validation", get(handlers::paths::validate_path))
        .route("/api/paths/:id/candidate-cables", get(handlers::paths::list_candidate_cables))
        .route("/api/paths/:id/available-fibers", get(handlers::paths::get_available_fibers))
        .route("/api/paths/:id/provision", post(handlers::paths::provision_path))
        .route("/api/paths/:id/deprovision", post(handlers::paths::deprovision_path))
        // Layout routes
        .route("/api/layout/ring", post(handlers::layout::ring_layout))
        .route("/api/layout/mesh", post(handlers::layout::mesh_layout))
        .route("/api/layout/curves", post(handlers::layout::edge_curves))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors_allow_any {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}
