//! Field extraction from schema-inconsistent records.
//!
//! The same datum can live at several places depending on which revision of
//! the upstream API produced the record (`tournament.name`, `tournamentName`,
//! `event.tournament.name`, ...). Callers list the candidate paths in order of
//! preference and get the first one that resolves.

use crate::raw::RawValue;
use serde_json::Value;

/// Follow `path` from `record`.
///
/// Every segment must hit a key of a JSON object. A non-object met halfway is
/// "not found", never an error. A JSON null at the end also counts as not found.
pub fn resolve_node<'a, K: AsRef<str>>(record: &'a Value, path: &[K]) -> Option<&'a Value> {
    let mut current = record;
    for key in path {
        current = current.as_object()?.get(key.as_ref())?;
    }
    (!current.is_null()).then_some(current)
}

/// Typed view of [`resolve_node`]
pub fn resolve<'a, K: AsRef<str>>(record: &'a Value, path: &[K]) -> RawValue<'a> {
    resolve_node(record, path).into()
}

/// Value at the first path that fully resolves, else `Missing`
pub fn extract<'a, P, K>(record: &'a Value, paths: &[P]) -> RawValue<'a>
where
    P: AsRef<[K]>,
    K: AsRef<str>,
{
    paths
        .iter()
        .map(|path| resolve(record, path.as_ref()))
        .find(RawValue::is_present)
        .unwrap_or(RawValue::Missing)
}

/// Value at the first path that resolves, or the caller's default
pub fn extract_or<'a, P, K>(record: &'a Value, paths: &[P], default: RawValue<'a>) -> RawValue<'a>
where
    P: AsRef<[K]>,
    K: AsRef<str>,
{
    match extract(record, paths) {
        RawValue::Missing => default,
        found => found,
    }
}

/// First path whose value `project` accepts.
///
/// Useful when a path can resolve to the wrong shape, e.g. `tournament` may be
/// a name string in one revision and an object in another.
pub fn extract_with<'a, P, K, T>(
    record: &'a Value,
    paths: &[P],
    project: impl Fn(RawValue<'a>) -> Option<T>,
) -> Option<T>
where
    P: AsRef<[K]>,
    K: AsRef<str>,
{
    paths.iter().find_map(|path| project(resolve(record, path.as_ref())))
}

/// First non-empty text, or the default
pub fn extract_text_or<P, K>(record: &Value, paths: &[P], default: &str) -> String
where
    P: AsRef<[K]>,
    K: AsRef<str>,
{
    extract_with(record, paths, |v| v.as_text().map(str::to_string))
        .unwrap_or_else(|| default.to_string())
}
