//! On-disk layout of the pack store.
//!
//! ```text
//! {root}/{storage_filename}                               originals
//! {root}/{source_pack_id}/{target_version}/{artifact}     conversions
//! {root}/.staging/                                        uploads awaiting validation
//! ```

use std::path::{Path, PathBuf};

use packforge_core::types::DbId;
use tempfile::TempDir;

use crate::config::StorageConfig;

/// Staging subdirectory for uploads that have not been validated yet.
const STAGING_DIR: &str = ".staging";

/// Prefix for per-conversion scratch directories.
const SCRATCH_PREFIX: &str = "rpcv-";

/// Resolves paths inside the canonical store and creates scratch space.
#[derive(Debug, Clone)]
pub struct PackStore {
    root: PathBuf,
    scratch_parent: Option<PathBuf>,
}

impl PackStore {
    /// Open (creating if needed) the store rooted at `config.upload_dir`.
    pub async fn open(config: &StorageConfig) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(&config.upload_dir).await?;
        let root = tokio::fs::canonicalize(&config.upload_dir).await?;
        tokio::fs::create_dir_all(root.join(STAGING_DIR)).await?;

        if let Some(scratch) = &config.scratch_dir {
            tokio::fs::create_dir_all(scratch).await?;
        }

        tracing::info!(root = %root.display(), "Pack store ready");
        Ok(Self {
            root,
            scratch_parent: config.scratch_dir.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    /// Absolute path of a stored pack from its `storage_filename`.
    pub fn path_of(&self, storage_filename: &str) -> PathBuf {
        self.root.join(storage_filename)
    }

    /// Storage filename (relative, `/`-separated) of a converted artifact.
    pub fn conversion_storage_name(
        source_pack_id: DbId,
        target_version: &str,
        artifact_name: &str,
    ) -> String {
        format!("{source_pack_id}/{target_version}/{artifact_name}")
    }

    /// Remove the now-empty directories above `path`, stopping at the store
    /// root or at the first directory that cannot be removed.
    pub async fn prune_empty_parents(&self, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == self.root || !dir.starts_with(&self.root) {
                break;
            }
            if tokio::fs::remove_dir(dir).await.is_err() {
                break;
            }
            tracing::debug!(dir = %dir.display(), "Removed empty store directory");
            current = dir.parent();
        }
    }

    /// Create a fresh scratch directory, removed when the handle drops.
    pub fn scratch_dir(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        match &self.scratch_parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
    }
}

/// Move `from` to `to`, falling back to copy + remove when a rename is not
/// possible (e.g. scratch space on another filesystem).
pub async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            tracing::debug!(
                from = %from.display(),
                to = %to.display(),
                error = %rename_err,
                "Rename failed, copying instead",
            );
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await
        }
    }
}
