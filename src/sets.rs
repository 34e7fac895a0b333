//! Small deterministic helpers over lists of paths and names.

use std::collections::BTreeSet;

/// Removes duplicates and sorts lexicographically.
pub fn dedup_sorted<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items
        .into_iter()
        .map(Into::into)
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}

/// Returns true if `path` equals `ancestor` or lies underneath it.
///
/// Compares whole segments: `envs/prod` is an ancestor of `envs/prod/eu`
/// but not of `envs/prod-eu`.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    match path.strip_prefix(ancestor) {
        Some("") => true,
        Some(rest) => rest.starts_with('/'),
        None => false,
    }
}

/// Drops every path that lies strictly underneath another path in the list.
///
/// Rendering an environment directory covers the environments nested inside
/// it, so only the shallowest paths are kept. Order of the survivors is
/// preserved; duplicates survive as-is.
pub fn remove_sub_paths(paths: Vec<String>) -> Vec<String> {
    let nested: Vec<bool> = paths
        .iter()
        .map(|path| {
            paths
                .iter()
                .any(|other| other != path && is_within(path, other))
        })
        .collect();

    paths
        .into_iter()
        .zip(nested)
        .filter_map(|(path, is_nested)| (!is_nested).then_some(path))
        .collect()
}

/// Drops every `(environment, application)` pair whose environment is in
/// `deleted`. Matching is exact; nested environments are kept.
pub fn filter_deleted_envs(
    pairs: Vec<(String, String)>,
    deleted: &[String],
) -> Vec<(String, String)> {
    pairs
        .into_iter()
        .filter(|(env, _)| !deleted.iter().any(|d| d == env))
        .collect()
}
