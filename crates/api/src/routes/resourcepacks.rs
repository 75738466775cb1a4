//! Route definitions for resource packs and their conversion jobs.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::resourcepacks as packs;
use crate::state::AppState;

/// Routes mounted at `/resourcepacks`.
///
/// ```text
/// GET    /                          list_originals
/// POST   /                          upload (multipart, field "file")
/// GET    /all                       list_all
/// GET    /conversions/{job_id}      get_job
/// GET    /{id}                      get_by_id
/// DELETE /{id}                      delete
/// GET    /{id}/conversions          list_conversions
/// GET    /{id}/hash                 get_hash
/// POST   /{id}/convert?version=     convert
/// GET    /{id}/jobs                 list_jobs
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(packs::list_originals).post(packs::upload))
        .route("/all", get(packs::list_all))
        .route("/conversions/{job_id}", get(packs::get_job))
        .route("/{id}", get(packs::get_by_id).delete(packs::delete))
        .route("/{id}/conversions", get(packs::list_conversions))
        .route("/{id}/hash", get(packs::get_hash))
        .route("/{id}/convert", post(packs::convert))
        .route("/{id}/jobs", get(packs::list_jobs))
}
