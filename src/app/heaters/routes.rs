use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use super::handlers::*;
use crate::app::AppState;

// ============================================================================
// Routes
// ============================================================================

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/heaters", get(list_heaters))
        .route("/set_heater", post(set_heater))
}
