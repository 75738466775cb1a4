//! Repository layer.
//!
//! Each repository is an async trait so the pipeline can run against
//! PostgreSQL ([`PgPackRepository`], [`PgJobRepository`]) or the in-memory
//! store ([`InMemoryPackRepository`], [`InMemoryJobRepository`]).

use async_trait::async_trait;
use packforge_core::types::DbId;

use crate::error::DbError;
use crate::models::conversion_job::{ConversionJob, NewConversionJob};
use crate::models::pack::{NewPack, Pack};

pub mod job_repo;
pub mod memory;
pub mod pack_repo;

pub use job_repo::PgJobRepository;
pub use memory::{InMemoryJobRepository, InMemoryPackRepository};
pub use pack_repo::PgPackRepository;

/// Storage for [`Pack`] records. All listings are ordered by id.
#[async_trait]
pub trait PackRepository: Send + Sync {
    /// Insert a pack. Fails with [`DbError::Conflict`] on a duplicate
    /// `storage_filename` or when a conversion names a missing original.
    async fn create(&self, input: NewPack) -> Result<Pack, DbError>;

    async fn find_by_id(&self, id: DbId) -> Result<Option<Pack>, DbError>;

    async fn find_all(&self) -> Result<Vec<Pack>, DbError>;

    /// Packs uploaded by users (`is_converted = false`).
    async fn find_originals(&self) -> Result<Vec<Pack>, DbError>;

    /// Converted packs derived from `original_id`.
    async fn find_conversions(&self, original_id: DbId) -> Result<Vec<Pack>, DbError>;

    /// Remove the record. Returns `false` if it did not exist. Backing files
    /// are the caller's responsibility.
    async fn delete(&self, id: DbId) -> Result<bool, DbError>;
}

/// Storage for [`ConversionJob`] records. Jobs are never deleted.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job in `Pending` status.
    async fn create(&self, input: NewConversionJob) -> Result<ConversionJob, DbError>;

    async fn find_by_id(&self, id: DbId) -> Result<Option<ConversionJob>, DbError>;

    /// Persist the mutable fields of `job` (status, timestamps, messages).
    /// Fails with [`DbError::NotFound`] if the job does not exist.
    async fn update(&self, job: &ConversionJob) -> Result<(), DbError>;

    /// Jobs whose source is `pack_id`, ordered by id.
    async fn find_by_source(&self, pack_id: DbId) -> Result<Vec<ConversionJob>, DbError>;
}
