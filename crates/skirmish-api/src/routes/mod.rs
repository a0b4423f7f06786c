//! Route modules.

use axum::Router;

use crate::state::AppState;

pub mod encounters;
pub mod health;

/// The full route tree, without middleware layers.
pub fn app_router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/v1/encounters", encounters::router())
}
