//! Resource pack archive inspection.
//!
//! Two independent operations:
//!
//! - [`validate_archive`] checks the zip central directory for a root-level
//!   `pack.mcmeta` without decompressing anything. A missing manifest is a
//!   validation failure.
//! - [`extract_metadata`] re-opens an archive and reads `pack.pack_format`
//!   from the manifest. It is best-effort and returns `None` on any failure.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use serde::Serialize;
use zip::ZipArchive;

use crate::error::CoreError;
use crate::pack_format;

/// Required manifest entry at the archive root.
pub const MANIFEST_ENTRY: &str = "pack.mcmeta";

/// Upper bound on how much of the manifest is decompressed.
const MAX_MANIFEST_BYTES: u64 = 1024 * 1024;

/// Metadata declared by a pack's manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackMetadata {
    pub pack_format: i32,
    pub human_version_range: String,
}

impl PackMetadata {
    /// Build metadata for a format number, resolving its version range.
    pub fn from_format(pack_format: i32) -> Self {
        Self {
            pack_format,
            human_version_range: pack_format::version_for_format(pack_format).to_string(),
        }
    }
}

/// Check that the archive contains a root-level [`MANIFEST_ENTRY`].
///
/// Entries are scanned in central-directory order and the scan stops at the
/// first match. `assets/pack.mcmeta` and similar nested entries do not count.
pub fn validate_archive<R: Read + Seek>(reader: R) -> Result<(), CoreError> {
    let archive = ZipArchive::new(reader)
        .map_err(|e| CoreError::Validation(format!("Not a readable zip archive: {e}")))?;

    if archive.file_names().any(|name| name == MANIFEST_ENTRY) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "manifest entry missing: {MANIFEST_ENTRY}"
        )))
    }
}

/// [`validate_archive`] for a file on disk.
pub fn validate_archive_file(path: &Path) -> Result<(), CoreError> {
    let file = File::open(path)
        .map_err(|e| CoreError::Internal(format!("Cannot open {}: {e}", path.display())))?;
    validate_archive(BufReader::new(file))
}

/// Parse manifest JSON and read `pack.pack_format`.
fn parse_manifest(json: &str) -> Option<i32> {
    let value: serde_json::Value = serde_json::from_str(json).ok()?;
    let format = value.get("pack")?.get("pack_format")?.as_i64()?;
    i32::try_from(format).ok()
}

/// Read pack metadata from an archive reader. `None` on any failure.
pub fn extract_metadata_from<R: Read + Seek>(reader: R) -> Option<PackMetadata> {
    let mut archive = ZipArchive::new(reader).ok()?;
    let entry = archive.by_name(MANIFEST_ENTRY).ok()?;

    let mut json = String::new();
    entry.take(MAX_MANIFEST_BYTES).read_to_string(&mut json).ok()?;

    parse_manifest(json.trim_start_matches('\u{feff}')).map(PackMetadata::from_format)
}

/// Read pack metadata from an archive on disk. `None` on any failure.
pub fn extract_metadata(path: &Path) -> Option<PackMetadata> {
    let file = File::open(path).ok()?;
    extract_metadata_from(BufReader::new(file))
}
