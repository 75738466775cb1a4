//! Pack entity model and creation DTO.

use packforge_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `packs` table: one archive on disk, original or converted.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Pack {
    pub id: DbId,
    /// Client-supplied name. Display only.
    pub original_filename: String,
    /// Path relative to the store root. Unique.
    pub storage_filename: String,
    pub size_bytes: i64,
    /// Lower-case hex SHA-256 of the stored bytes.
    pub file_hash: String,
    pub pack_format: Option<i32>,
    pub human_version_range: Option<String>,
    pub uploaded_at: Timestamp,
    pub is_converted: bool,
    pub target_version: Option<String>,
    pub original_pack_id: Option<DbId>,
}

/// How a pack came to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PackOrigin {
    Upload,
    Conversion {
        original_pack_id: DbId,
        target_version: String,
    },
}

/// Input for [`PackRepository::create`](crate::repositories::PackRepository::create).
///
/// Built through [`NewPack::original`] or [`NewPack::converted`], so a
/// converted pack always carries its original and target version and an
/// upload never does.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPack {
    pub original_filename: String,
    pub storage_filename: String,
    pub size_bytes: i64,
    pub file_hash: String,
    pub pack_format: Option<i32>,
    pub human_version_range: Option<String>,
    origin: PackOrigin,
}

impl NewPack {
    /// A user upload.
    pub fn original(
        original_filename: impl Into<String>,
        storage_filename: impl Into<String>,
        size_bytes: i64,
        file_hash: impl Into<String>,
    ) -> Self {
        Self {
            original_filename: original_filename.into(),
            storage_filename: storage_filename.into(),
            size_bytes,
            file_hash: file_hash.into(),
            pack_format: None,
            human_version_range: None,
            origin: PackOrigin::Upload,
        }
    }

    /// A conversion of `original` targeting `target_version`. Inherits the
    /// original's display filename.
    pub fn converted(
        original: &Pack,
        storage_filename: impl Into<String>,
        size_bytes: i64,
        file_hash: impl Into<String>,
        target_version: impl Into<String>,
    ) -> Self {
        Self {
            original_filename: original.original_filename.clone(),
            storage_filename: storage_filename.into(),
            size_bytes,
            file_hash: file_hash.into(),
            pack_format: None,
            human_version_range: None,
            origin: PackOrigin::Conversion {
                original_pack_id: original.id,
                target_version: target_version.into(),
            },
        }
    }

    /// Attach manifest metadata.
    pub fn with_metadata(mut self, pack_format: i32, human_version_range: impl Into<String>) -> Self {
        self.pack_format = Some(pack_format);
        self.human_version_range = Some(human_version_range.into());
        self
    }

    pub fn is_converted(&self) -> bool {
        matches!(self.origin, PackOrigin::Conversion { .. })
    }

    pub fn original_pack_id(&self) -> Option<DbId> {
        match &self.origin {
            PackOrigin::Upload => None,
            PackOrigin::Conversion {
                original_pack_id, ..
            } => Some(*original_pack_id),
        }
    }

    pub fn target_version(&self) -> Option<&str> {
        match &self.origin {
            PackOrigin::Upload => None,
            PackOrigin::Conversion { target_version, .. } => Some(target_version),
        }
    }

    /// Materialize the row a repository would store for this input.
    pub fn into_pack(self, id: DbId, uploaded_at: Timestamp) -> Pack {
        let is_converted = self.is_converted();
        let original_pack_id = self.original_pack_id();
        let target_version = self.target_version().map(str::to_owned);
        Pack {
            id,
            original_filename: self.original_filename,
            storage_filename: self.storage_filename,
            size_bytes: self.size_bytes,
            file_hash: self.file_hash,
            pack_format: self.pack_format,
            human_version_range: self.human_version_range,
            uploaded_at,
            is_converted,
            target_version,
            original_pack_id,
        }
    }
}
