//! Handlers for resource pack upload, lookup, deletion and conversion.

use std::io;

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use futures::TryStreamExt;
use packforge_core::types::DbId;
use packforge_db::models::conversion_job::ConversionJob;
use packforge_db::models::pack::Pack;
use packforge_pipeline::error::PipelineError;
use serde::{Deserialize, Serialize};
use tokio_util::io::StreamReader;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Multipart field carrying the archive.
const FILE_FIELD: &str = "file";

/// Display name used when the client sends no filename.
const FALLBACK_FILENAME: &str = "resourcepack.zip";

// ── Upload ───────────────────────────────────────────────────────────

/// Turn a multipart body error into an I/O error the store understands.
///
/// An oversized body stays a plain error; anything else while streaming
/// means the client went away.
fn multipart_io_error(err: MultipartError) -> io::Error {
    let kind = if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        io::ErrorKind::InvalidData
    } else {
        io::ErrorKind::ConnectionAborted
    };
    io::Error::new(kind, err)
}

/// Map a failure to read the next multipart field. Hitting the body limit
/// here is still a 413.
fn next_field_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.to_string())
    } else {
        AppError::BadRequest(err.to_string())
    }
}

fn upload_error(err: PipelineError) -> AppError {
    match err {
        PipelineError::Storage(e) if e.get_ref().is_some_and(|inner| inner.is::<MultipartError>()) => {
            AppError::PayloadTooLarge(e.to_string())
        }
        other => other.into(),
    }
}

/// POST /api/v1/resourcepacks
///
/// Stream the `file` field of a multipart upload into the pack store.
/// Responds 201 with the new pack, or 204 when the client disconnects
/// mid-upload.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<Pack>>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(next_field_error)?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(FALLBACK_FILENAME)
            .to_string();

        let reader = StreamReader::new(field.map_err(multipart_io_error));
        let pack = state
            .packs
            .upload(reader, &filename)
            .await
            .map_err(upload_error)?;

        return Ok((StatusCode::CREATED, Json(DataResponse { data: pack })));
    }

    Err(AppError::BadRequest(format!(
        "Missing multipart field '{FILE_FIELD}'"
    )))
}

// ── Lookup ───────────────────────────────────────────────────────────

/// GET /api/v1/resourcepacks
pub async fn list_originals(State(state): State<AppState>) -> AppResult<Json<DataResponse<Vec<Pack>>>> {
    let packs = state.packs.list_originals().await?;
    Ok(Json(DataResponse { data: packs }))
}

/// GET /api/v1/resourcepacks/all
pub async fn list_all(State(state): State<AppState>) -> AppResult<Json<DataResponse<Vec<Pack>>>> {
    let packs = state.packs.list_all().await?;
    Ok(Json(DataResponse { data: packs }))
}

/// GET /api/v1/resourcepacks/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Pack>>> {
    let pack = state.packs.get(id).await?;
    Ok(Json(DataResponse { data: pack }))
}

/// GET /api/v1/resourcepacks/{id}/conversions
pub async fn list_conversions(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<Pack>>>> {
    let packs = state.packs.list_conversions(id).await?;
    Ok(Json(DataResponse { data: packs }))
}

/// Stored checksum of a pack file.
#[derive(Debug, Serialize)]
pub struct PackHash {
    pub pack_id: DbId,
    /// Lowercase hex SHA-256.
    pub file_hash: String,
}

/// GET /api/v1/resourcepacks/{id}/hash
pub async fn get_hash(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<PackHash>>> {
    let file_hash = state.packs.hash(id).await?;
    Ok(Json(DataResponse {
        data: PackHash {
            pack_id: id,
            file_hash,
        },
    }))
}

// ── Delete ───────────────────────────────────────────────────────────

/// DELETE /api/v1/resourcepacks/{id}
///
/// Deleting an original also deletes its converted packs.
pub async fn delete(State(state): State<AppState>, Path(id): Path<DbId>) -> AppResult<StatusCode> {
    state.packs.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Conversion ───────────────────────────────────────────────────────

/// Query parameters for the convert endpoint.
#[derive(Debug, Deserialize)]
pub struct ConvertParams {
    /// Target game version, e.g. `1.20`.
    pub version: String,
}

/// POST /api/v1/resourcepacks/{id}/convert?version=
///
/// Queue a conversion and return the PENDING job immediately (202). Poll
/// `GET /conversions/{job_id}` for progress.
pub async fn convert(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<ConvertParams>,
) -> AppResult<(StatusCode, Json<DataResponse<ConversionJob>>)> {
    let job = state.orchestrator.create_job(id, &params.version).await?;
    state.orchestrator.spawn_conversion(job.id);

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: job })))
}

/// GET /api/v1/resourcepacks/{id}/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<ConversionJob>>>> {
    let jobs = state.orchestrator.jobs_for_pack(id).await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/resourcepacks/conversions/{job_id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<Json<DataResponse<ConversionJob>>> {
    let job = state.orchestrator.get_job(job_id).await?;
    Ok(Json(DataResponse { data: job }))
}
