//! Output key rewriting: drop everything up to and including a path prefix.

use crate::error::ConfigError;

/// Fail unless a non-empty `prefix` occurs in the representative input path.
pub fn validate_prefix(prefix: Option<&str>, reference: &str) -> Result<(), ConfigError> {
    match prefix {
        Some(p) if !p.is_empty() && !reference.contains(p) => Err(ConfigError::PrefixNotFound {
            prefix: p.to_string(),
            reference: reference.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Strip `prefix` from `path`.
///
/// Removes everything through the first occurrence of the prefix, then one
/// leading `/`. Returns `None` when a non-empty prefix does not occur in
/// `path`; an absent or empty prefix leaves the path as is.
pub fn strip_prefix(path: &str, prefix: Option<&str>) -> Option<String> {
    let prefix = match prefix {
        Some(p) if !p.is_empty() => p,
        _ => return Some(path.to_string()),
    };
    let start = path.find(prefix)?;
    let rest = &path[start + prefix.len()..];
    Some(rest.strip_prefix('/').unwrap_or(rest).to_string())
}
