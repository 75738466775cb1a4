//! Pack ingestion and lookup.
//!
//! Upload flow: the byte stream is hashed into the staging directory, the
//! staged archive is validated, then renamed into the store root and
//! recorded. A pack record exists only once its file is fully written,
//! validated and in place.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use packforge_core::archive::{self, PackMetadata};
use packforge_core::error::CoreError;
use packforge_core::hashing;
use packforge_core::types::DbId;
use packforge_db::models::pack::{NewPack, Pack};
use packforge_db::PackRepository;
use tokio::io::AsyncRead;

use crate::error::PipelineError;
use crate::store::PackStore;

/// Upload, lookup and deletion of packs.
pub struct PackService {
    packs: Arc<dyn PackRepository>,
    store: PackStore,
}

/// Validate an archive on a blocking thread.
async fn validate_on_disk(path: PathBuf) -> Result<(), PipelineError> {
    tokio::task::spawn_blocking(move || archive::validate_archive_file(&path))
        .await
        .map_err(|e| CoreError::Internal(format!("Archive validation task failed: {e}")))??;
    Ok(())
}

/// Best-effort manifest metadata. Failures are logged and yield `None`.
pub(crate) async fn read_metadata(path: &Path) -> Option<PackMetadata> {
    let owned = path.to_path_buf();
    let metadata = tokio::task::spawn_blocking(move || archive::extract_metadata(&owned))
        .await
        .ok()
        .flatten();
    if metadata.is_none() {
        tracing::warn!(path = %path.display(), "No readable pack metadata, continuing without it");
    }
    metadata
}

/// Apply optional metadata to a pack input.
pub(crate) fn with_optional_metadata(input: NewPack, metadata: Option<PackMetadata>) -> NewPack {
    match metadata {
        Some(meta) => input.with_metadata(meta.pack_format, meta.human_version_range),
        None => input,
    }
}

/// Remove a file, logging instead of failing.
async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove file");
        }
    }
}

impl PackService {
    pub fn new(packs: Arc<dyn PackRepository>, store: PackStore) -> Self {
        Self { packs, store }
    }

    pub fn store(&self) -> &PackStore {
        &self.store
    }

    /// Stream an upload into the store and record it as an original pack.
    ///
    /// Fails with [`CoreError::Validation`] when the archive has no root
    /// `pack.mcmeta`, [`PipelineError::ClientDisconnected`] when the stream
    /// breaks off, and [`PipelineError::Storage`] on I/O failure. In every
    /// failure case no record exists afterwards and the staged file is gone.
    pub async fn upload<R>(&self, reader: R, original_filename: &str) -> Result<Pack, PipelineError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let staging = self.store.staging_dir();
        let stored = hashing::store_sha256(reader, &staging, Some(original_filename)).await?;
        let staged_path = stored.path_in(&staging);

        tracing::debug!(
            original_filename,
            size_bytes = stored.size_bytes,
            "Upload staged, validating archive",
        );

        if let Err(e) = validate_on_disk(staged_path.clone()).await {
            remove_quietly(&staged_path).await;
            return Err(e);
        }

        let final_path = self.store.path_of(&stored.storage_filename);
        if let Err(e) = tokio::fs::rename(&staged_path, &final_path).await {
            remove_quietly(&staged_path).await;
            return Err(PipelineError::Storage(e));
        }

        let metadata = read_metadata(&final_path).await;
        let input = with_optional_metadata(
            NewPack::original(
                original_filename,
                stored.storage_filename.clone(),
                stored.size_bytes as i64,
                stored.hash_hex.clone(),
            ),
            metadata,
        );

        match self.packs.create(input).await {
            Ok(pack) => {
                tracing::info!(
                    pack_id = pack.id,
                    storage_filename = %pack.storage_filename,
                    size_bytes = pack.size_bytes,
                    pack_format = ?pack.pack_format,
                    "Pack uploaded",
                );
                Ok(pack)
            }
            Err(e) => {
                remove_quietly(&final_path).await;
                Err(e.into())
            }
        }
    }

    /// All packs, originals and conversions.
    pub async fn list_all(&self) -> Result<Vec<Pack>, PipelineError> {
        Ok(self.packs.find_all().await?)
    }

    /// User-uploaded packs only.
    pub async fn list_originals(&self) -> Result<Vec<Pack>, PipelineError> {
        Ok(self.packs.find_originals().await?)
    }

    /// Converted packs derived from `original_id`.
    pub async fn list_conversions(&self, original_id: DbId) -> Result<Vec<Pack>, PipelineError> {
        Ok(self.packs.find_conversions(original_id).await?)
    }

    pub async fn get(&self, id: DbId) -> Result<Pack, PipelineError> {
        self.packs
            .find_by_id(id)
            .await?
            .ok_or(PipelineError::Core(CoreError::NotFound { entity: "Pack", id }))
    }

    /// Stored SHA-256 of a pack's file.
    pub async fn hash(&self, id: DbId) -> Result<String, PipelineError> {
        Ok(self.get(id).await?.file_hash)
    }

    /// Delete a pack and its file. Deleting an original also deletes its
    /// conversions. File removal is best-effort; the records go regardless.
    pub async fn delete(&self, id: DbId) -> Result<(), PipelineError> {
        let pack = self.get(id).await?;

        if !pack.is_converted {
            for conversion in self.packs.find_conversions(pack.id).await? {
                self.remove_pack(&conversion).await?;
            }
        }
        self.remove_pack(&pack).await
    }

    async fn remove_pack(&self, pack: &Pack) -> Result<(), PipelineError> {
        let path = self.store.path_of(&pack.storage_filename);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(pack_id = pack.id, path = %path.display(), "Deleted pack file");
                self.store.prune_empty_parents(&path).await;
            }
            Err(e) => tracing::warn!(
                pack_id = pack.id,
                path = %path.display(),
                error = %e,
                "Failed to delete pack file, removing record anyway",
            ),
        }

        self.packs.delete(pack.id).await?;
        tracing::info!(pack_id = pack.id, "Deleted pack record");
        Ok(())
    }
}
