//! Object key and URL helpers.

use chrono::{DateTime, Months, Utc};

/// Delimiter used by the store for "directory" grouping.
pub const DELIMITER: char = '/';

/// Name of the append-only log document under the components directory.
pub const UPDATE_LOG_FILE: &str = "update.log";

/// Public URL of a component file: `{base}{component}/{version}/{file}`.
///
/// `base` is used verbatim, so it is expected to end with `/`.
pub fn component_url(base: &str, component_name: &str, version: &str, file_name: &str) -> String {
    format!("{}{}/{}/{}", base, component_name, version, file_name)
}

/// Ensure a directory prefix ends with the delimiter.
///
/// An empty input becomes `"/"`.
pub fn normalize_dir(dir: &str) -> String {
    if dir.ends_with(DELIMITER) {
        dir.to_string()
    } else {
        format!("{}{}", dir, DELIMITER)
    }
}

/// Why `key` cannot be stored as an object, if it cannot.
///
/// Object keys are non-empty runs of segments joined by single delimiters:
/// no leading, trailing or doubled `/`, no `.` or `..` segments and no
/// ASCII control characters.
/// Prefixes are not keys and are never checked.
pub fn invalid_key_reason(key: &str) -> Option<&'static str> {
    if key.is_empty() {
        return Some("empty key");
    }
    key.split(DELIMITER).find_map(|segment| match segment {
        "" => Some("empty path segment"),
        "." | ".." => Some("relative path segment"),
        _ if segment.chars().any(|c| c.is_ascii_control()) => Some("control character"),
        _ => None,
    })
}

/// Strip `prefix` and the trailing delimiter from a common-prefix entry.
///
/// Returns `None` for entries that do not start with `prefix` or that name
/// the prefix itself.
pub fn child_name<'a>(prefix: &str, common_prefix: &'a str) -> Option<&'a str> {
    let rest = common_prefix.strip_prefix(prefix)?;
    let name = rest.strip_suffix(DELIMITER).unwrap_or(rest);
    (!name.is_empty()).then_some(name)
}

/// Object key of the append-only update log.
pub fn update_log_path(components_dir: &str) -> String {
    format!("{}/{}", components_dir.trim_end_matches(DELIMITER), UPDATE_LOG_FILE)
}

/// Key under `dir_output` for a file at `relative` (relative to the upload
/// root, starting with a separator). Backslashes become `/`.
pub fn upload_key(dir_output: &str, relative: &str) -> String {
    format!("{}{}", dir_output, relative).replace('\\', "/")
}

/// Expiry stamped on uploaded objects: one year from `now`.
pub fn next_year_from(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_add_months(Months::new(12)).unwrap_or(now)
}

/// Expiry stamped on uploaded objects: one year from now.
pub fn next_year() -> DateTime<Utc> {
    next_year_from(Utc::now())
}
