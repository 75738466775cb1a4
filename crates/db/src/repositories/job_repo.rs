//! PostgreSQL repository for the `conversion_jobs` table.
//!
//! Status values are stored as `ConversionStatus` IDs; rows are mapped back
//! through [`ConversionJobRow`].

use async_trait::async_trait;
use packforge_core::types::DbId;
use sqlx::PgPool;

use super::JobRepository;
use crate::error::DbError;
use crate::models::conversion_job::{ConversionJob, ConversionJobRow, NewConversionJob};
use crate::models::status::ConversionStatus;

/// Column list for `conversion_jobs` queries.
const COLUMNS: &str = "\
    id, source_pack_id, target_version, status_id, created_at, \
    completed_at, error_message, console_log";

/// Provides CRUD operations for conversion jobs backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn create(&self, input: NewConversionJob) -> Result<ConversionJob, DbError> {
        let query = format!(
            "INSERT INTO conversion_jobs (source_pack_id, target_version, status_id) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, ConversionJobRow>(&query)
            .bind(input.source_pack_id)
            .bind(&input.target_version)
            .bind(ConversionStatus::Pending.id())
            .fetch_one(&self.pool)
            .await?;
        ConversionJob::try_from(row)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<ConversionJob>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM conversion_jobs WHERE id = $1");
        sqlx::query_as::<_, ConversionJobRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(ConversionJob::try_from)
            .transpose()
    }

    async fn update(&self, job: &ConversionJob) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE conversion_jobs \
             SET status_id = $2, completed_at = $3, error_message = $4, console_log = $5 \
             WHERE id = $1",
        )
        .bind(job.id)
        .bind(job.status.id())
        .bind(job.completed_at)
        .bind(&job.error_message)
        .bind(&job.console_log)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity: "ConversionJob",
                id: job.id,
            });
        }
        Ok(())
    }

    async fn find_by_source(&self, pack_id: DbId) -> Result<Vec<ConversionJob>, DbError> {
        let query = format!(
            "SELECT {COLUMNS} FROM conversion_jobs WHERE source_pack_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, ConversionJobRow>(&query)
            .bind(pack_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(ConversionJob::try_from)
            .collect()
    }
}
