//! Path helpers: namespace prefixes, path joining and ACL glob matching.

use super::types::ROOT_NAMESPACE;

/// Cluster-wide path prefix of a namespace: empty for root, `name/` otherwise.
pub fn namespace_path(namespace: &str) -> String {
    if namespace == ROOT_NAMESPACE {
        String::new()
    } else {
        format!("{}/", namespace)
    }
}

/// Join two path fragments with exactly one separator between them.
pub fn join(base: &str, key: &str) -> String {
    let base = base.trim_end_matches('/');
    let key = key.trim_start_matches('/');
    match (base.is_empty(), key.is_empty()) {
        (true, _) => key.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}/{}", base, key),
    }
}

/// Match a Vault ACL path pattern against a concrete path.
///
/// A trailing `*` turns the final segment into a prefix match that may also
/// span further segments. A segment consisting of `+` matches exactly one
/// path segment. Everything else must match exactly.
pub fn glob_match(pattern: &str, path: &str) -> bool {
    let (body, prefix) = match pattern.strip_suffix('*') {
        Some(body) => (body, true),
        None => (pattern, false),
    };

    let pattern_segments: Vec<&str> = body.split('/').collect();
    let path_segments: Vec<&str> = path.split('/').collect();

    if prefix {
        if path_segments.len() < pattern_segments.len() {
            return false;
        }
    } else if path_segments.len() != pattern_segments.len() {
        return false;
    }

    let last = pattern_segments.len() - 1;
    pattern_segments
        .iter()
        .zip(&path_segments)
        .enumerate()
        .all(|(i, (want, got))| {
            if i == last && prefix {
                got.starts_with(want)
            } else {
                *want == "+" || want == got
            }
        })
}
