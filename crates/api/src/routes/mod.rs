pub mod health;
pub mod resourcepacks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /resourcepacks                       see resourcepacks::router
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/resourcepacks", resourcepacks::router())
}
