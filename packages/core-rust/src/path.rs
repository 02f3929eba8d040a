//! Dot-separated paths into a JSON result (`nodes.0.teamId`).

use serde_json::Value;

/// Resolves `path` against `root`.
///
/// Segments are separated by `.`; a segment that parses as an integer indexes
/// an array. The empty path and `$` resolve to `root` itself. Returns `None`
/// when any segment is missing or indexes the wrong kind of value.
#[must_use]
pub fn resolve<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let trimmed = path.trim();
    let trimmed = trimmed.strip_prefix("$.").unwrap_or(trimmed);
    if trimmed.is_empty() || trimmed == "$" {
        return Some(root);
    }

    trimmed.split('.').try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Like [`resolve`], but for an optional root (the first step has no previous result).
#[must_use]
pub fn resolve_opt<'a>(root: Option<&'a Value>, path: &str) -> Option<&'a Value> {
    root.and_then(|r| resolve(r, path))
}
