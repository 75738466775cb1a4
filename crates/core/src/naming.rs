//! File naming helpers for stored packs and converted artifacts.
//!
//! User-supplied filenames are untrusted: they are only ever used to derive
//! an extension and a display stem, never as a path on disk.

use uuid::Uuid;

/// Longest extension (without the dot) carried over from an upload.
const MAX_EXTENSION_LEN: usize = 16;

/// Stem used when an original filename has nothing usable left.
const FALLBACK_STEM: &str = "pack";

/// Final path component of a client-supplied name (handles `/` and `\`).
fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Return the extension of `name` including the leading dot (e.g. `".zip"`).
///
/// Returns `None` when there is no extension, or when it is empty, too long,
/// or contains anything other than ASCII alphanumerics.
pub fn extension_of(name: &str) -> Option<&str> {
    let base = base_name(name);
    let dot = base.rfind('.')?;
    let ext = &base[dot + 1..];
    let valid = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| &base[dot..])
}

/// Generate a collision-resistant storage filename, keeping the extension of
/// `original_name` when it has one.
pub fn storage_filename(original_name: Option<&str>) -> String {
    let ext = original_name.and_then(extension_of).unwrap_or("");
    format!("{}{ext}", Uuid::new_v4())
}

/// Sanitized display stem of a client filename: directory components and
/// extension removed, characters outside `[A-Za-z0-9._-]` replaced by `_`.
pub fn display_stem(original_name: &str) -> String {
    let base = base_name(original_name);
    let stem = match extension_of(base) {
        Some(ext) => &base[..base.len() - ext.len()],
        None => base,
    };
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Name of a converted artifact: `{stem}_to_{target}-{uuid}{ext}`.
///
/// The random suffix keeps concurrent conversions of the same pack to the
/// same version from overwriting each other.
pub fn converted_artifact_name(original_name: &str, target_version: &str, ext: &str) -> String {
    format!(
        "{}_to_{target_version}-{}{ext}",
        display_stem(original_name),
        Uuid::new_v4().simple()
    )
}
