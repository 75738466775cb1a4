//! In-memory repositories.
//!
//! Used by tests and when the server runs without `DATABASE_URL`. Records
//! live in `BTreeMap`s behind a tokio `RwLock`, so iteration order is id
//! order, matching the `ORDER BY id` of the PostgreSQL implementations.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use packforge_core::types::DbId;
use tokio::sync::RwLock;

use super::{JobRepository, PackRepository};
use crate::error::DbError;
use crate::models::conversion_job::{ConversionJob, NewConversionJob};
use crate::models::pack::{NewPack, Pack};

#[derive(Debug)]
struct Table<T> {
    rows: BTreeMap<DbId, T>,
    next_id: DbId,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T> Table<T> {
    fn allocate_id(&mut self) -> DbId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// [`PackRepository`] kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryPackRepository {
    table: RwLock<Table<Pack>>,
}

impl InMemoryPackRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn filtered(&self, keep: impl Fn(&Pack) -> bool) -> Vec<Pack> {
        let table = self.table.read().await;
        table.rows.values().filter(|p| keep(p)).cloned().collect()
    }
}

#[async_trait]
impl PackRepository for InMemoryPackRepository {
    async fn create(&self, input: NewPack) -> Result<Pack, DbError> {
        let mut table = self.table.write().await;
        if table
            .rows
            .values()
            .any(|p| p.storage_filename == input.storage_filename)
        {
            return Err(DbError::Conflict(format!(
                "storage filename '{}' already exists",
                input.storage_filename
            )));
        }

        if let Some(original_id) = input.original_pack_id() {
            if !table.rows.contains_key(&original_id) {
                return Err(DbError::Conflict(format!(
                    "original pack {original_id} does not exist"
                )));
            }
        }

        let id = table.allocate_id();
        let pack = input.into_pack(id, Utc::now());
        table.rows.insert(id, pack.clone());
        Ok(pack)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<Pack>, DbError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Pack>, DbError> {
        Ok(self.filtered(|_| true).await)
    }

    async fn find_originals(&self) -> Result<Vec<Pack>, DbError> {
        Ok(self.filtered(|p| !p.is_converted).await)
    }

    async fn find_conversions(&self, original_id: DbId) -> Result<Vec<Pack>, DbError> {
        Ok(self
            .filtered(|p| p.original_pack_id == Some(original_id))
            .await)
    }

    async fn delete(&self, id: DbId) -> Result<bool, DbError> {
        let mut table = self.table.write().await;
        let removed = table.rows.remove(&id).is_some();
        if removed {
            // Mirrors ON DELETE CASCADE on packs.original_pack_id.
            table.rows.retain(|_, p| p.original_pack_id != Some(id));
        }
        Ok(removed)
    }
}

/// [`JobRepository`] kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryJobRepository {
    table: RwLock<Table<ConversionJob>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, input: NewConversionJob) -> Result<ConversionJob, DbError> {
        let mut table = self.table.write().await;
        let id = table.allocate_id();
        let job = input.into_job(id, Utc::now());
        table.rows.insert(id, job.clone());
        Ok(job)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<ConversionJob>, DbError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn update(&self, job: &ConversionJob) -> Result<(), DbError> {
        let mut table = self.table.write().await;
        match table.rows.get_mut(&job.id) {
            Some(stored) => {
                stored.status = job.status;
                stored.completed_at = job.completed_at;
                stored.error_message = job.error_message.clone();
                stored.console_log = job.console_log.clone();
                Ok(())
            }
            None => Err(DbError::NotFound {
                entity: "ConversionJob",
                id: job.id,
            }),
        }
    }

    async fn find_by_source(&self, pack_id: DbId) -> Result<Vec<ConversionJob>, DbError> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .filter(|j| j.source_pack_id == pack_id)
            .cloned()
            .collect())
    }
}
