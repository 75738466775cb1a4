//! PostgreSQL repository for the `packs` table.

use async_trait::async_trait;
use packforge_core::types::DbId;
use sqlx::PgPool;

use super::PackRepository;
use crate::error::DbError;
use crate::models::pack::{NewPack, Pack};

/// Column list for `packs` queries.
const COLUMNS: &str = "\
    id, original_filename, storage_filename, size_bytes, file_hash, \
    pack_format, human_version_range, uploaded_at, is_converted, \
    target_version, original_pack_id";

/// PostgreSQL unique violation SQLSTATE.
const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL foreign key violation SQLSTATE.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Provides CRUD operations for packs backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgPackRepository {
    pool: PgPool,
}

impl PgPackRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_insert_error(err: sqlx::Error, input: &NewPack) -> DbError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => {
                return DbError::Conflict(format!(
                    "storage filename '{}' already exists",
                    input.storage_filename
                ));
            }
            Some(FOREIGN_KEY_VIOLATION) => {
                return DbError::Conflict(format!(
                    "original pack {} does not exist",
                    input.original_pack_id().unwrap_or_default()
                ));
            }
            _ => {}
        }
    }
    DbError::Sqlx(err)
}

#[async_trait]
impl PackRepository for PgPackRepository {
    async fn create(&self, input: NewPack) -> Result<Pack, DbError> {
        let query = format!(
            "INSERT INTO packs (original_filename, storage_filename, size_bytes, file_hash, \
                                pack_format, human_version_range, is_converted, \
                                target_version, original_pack_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Pack>(&query)
            .bind(&input.original_filename)
            .bind(&input.storage_filename)
            .bind(input.size_bytes)
            .bind(&input.file_hash)
            .bind(input.pack_format)
            .bind(&input.human_version_range)
            .bind(input.is_converted())
            .bind(input.target_version())
            .bind(input.original_pack_id())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_insert_error(e, &input))
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<Pack>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM packs WHERE id = $1");
        let pack = sqlx::query_as::<_, Pack>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(pack)
    }

    async fn find_all(&self) -> Result<Vec<Pack>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM packs ORDER BY id");
        let packs = sqlx::query_as::<_, Pack>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(packs)
    }

    async fn find_originals(&self) -> Result<Vec<Pack>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM packs WHERE is_converted = FALSE ORDER BY id");
        let packs = sqlx::query_as::<_, Pack>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(packs)
    }

    async fn find_conversions(&self, original_id: DbId) -> Result<Vec<Pack>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM packs WHERE original_pack_id = $1 ORDER BY id");
        let packs = sqlx::query_as::<_, Pack>(&query)
            .bind(original_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(packs)
    }

    async fn delete(&self, id: DbId) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM packs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
