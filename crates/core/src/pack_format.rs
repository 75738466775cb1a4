//! Resource pack format numbers and the game versions they cover.

/// Returned by [`version_for_format`] for format numbers not in the table.
pub const UNKNOWN_VERSION: &str = "Unknown";

/// `pack_format` value → human-readable game version range.
pub const PACK_FORMAT_VERSIONS: &[(i32, &str)] = &[
    (1, "1.6.1 - 1.8.9"),
    (2, "1.9 - 1.10.2"),
    (3, "1.11 - 1.12.2"),
    (4, "1.13 - 1.14.4"),
    (5, "1.15 - 1.16.1"),
    (6, "1.16.2 - 1.16.5"),
    (7, "1.17 - 1.17.1"),
    (8, "1.18 - 1.18.2"),
    (9, "1.19 - 1.19.2"),
    (12, "1.19.3"),
    (13, "1.19.4"),
    (15, "1.20 - 1.20.1"),
    (18, "1.20.2"),
    (22, "1.20.3 - 1.20.4"),
    (32, "1.20.5 - 1.20.6"),
    (34, "1.21 - 1.21.1"),
];

/// Look up the version range for a pack format, or [`UNKNOWN_VERSION`].
pub fn version_for_format(format: i32) -> &'static str {
    PACK_FORMAT_VERSIONS
        .iter()
        .find(|(f, _)| *f == format)
        .map(|(_, range)| *range)
        .unwrap_or(UNKNOWN_VERSION)
}

/// Pick the conversion source version from a stored version range.
///
/// Uses the first whitespace-delimited token (`"1.20 - 1.20.1"` → `"1.20"`).
/// Returns `None` for a missing or blank range and for [`UNKNOWN_VERSION`],
/// so the caller falls back to its configured default.
pub fn source_version_from_range(range: Option<&str>) -> Option<&str> {
    let first = range?.split_whitespace().next()?;
    (first != UNKNOWN_VERSION).then_some(first)
}
