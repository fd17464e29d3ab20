//! ACL policy enumeration and path-pattern extraction.

use serde_json::Value;
use std::sync::Arc;

use super::admission::fan_out;
use super::error::ScanError;
use super::paths::join;
use super::remote::{keys_of, type_name, Remote};
use super::types::Policy;
use crate::vault_api::VaultBackend;

const POLICY_PATH: &str = "sys/policy";

pub async fn scan_policies<C: VaultBackend>(
    remote: &Remote<C>,
    namespace: &str,
) -> (Vec<Policy>, Vec<ScanError>) {
    let names = match list_policy_names(remote, namespace).await {
        Ok(names) => names,
        Err(err) => return (Vec::new(), vec![err]),
    };

    let namespace: Arc<str> = Arc::from(namespace);
    let results = fan_out(names.clone(), |_, name| {
        let remote = remote.clone();
        let namespace = Arc::clone(&namespace);
        async move { get_policy(&remote, &namespace, name).await }
    })
    .await;

    let mut policies = Vec::with_capacity(names.len());
    let mut errors = Vec::new();
    for (name, result) in names.into_iter().zip(results) {
        match result {
            Ok((policy, policy_errors)) => {
                policies.push(policy);
                errors.extend(policy_errors);
            }
            Err(fault) => {
                policies.push(Policy {
                    name,
                    paths: Vec::new(),
                });
                errors.push(fault);
            }
        }
    }
    (policies, errors)
}

/// `sys/policy` answers with both `keys` and the legacy `policies` field.
async fn list_policy_names<C: VaultBackend>(
    remote: &Remote<C>,
    namespace: &str,
) -> Result<Vec<String>, ScanError> {
    let data = remote.list(namespace, POLICY_PATH).await?;
    if data.get("keys").is_some() {
        return keys_of(&data, POLICY_PATH);
    }
    match data.get("policies") {
        Some(policies) => keys_of(&serde_json::json!({ "keys": policies }), POLICY_PATH),
        None => Err(ScanError::malformed(POLICY_PATH, "missing `keys` array")),
    }
}

async fn get_policy<C: VaultBackend>(
    remote: &Remote<C>,
    namespace: &str,
    name: String,
) -> (Policy, Vec<ScanError>) {
    let path = join(POLICY_PATH, &name);
    let mut policy = Policy {
        name,
        paths: Vec::new(),
    };

    let data = match remote.read(namespace, &path).await {
        Ok(data) => data,
        Err(err) => return (policy, vec![err]),
    };

    let rules = match data.get("rules") {
        Some(Value::String(rules)) => rules,
        Some(other) => {
            let err = ScanError::malformed(
                &path,
                format!("`rules` should be a string, got {}", type_name(other)),
            );
            return (policy, vec![err]);
        }
        None => return (policy, vec![ScanError::malformed(&path, "missing `rules`")]),
    };

    let (paths, bad_lines) = extract_paths(rules);
    policy.paths = paths;
    let errors = bad_lines
        .into_iter()
        .map(|line| ScanError::malformed(&path, format!("unquoted path rule: {}", line)))
        .collect();
    (policy, errors)
}

/// Pull the quoted glob pattern out of every `path "..."` line.
///
/// Returns the patterns in rule order and any `path` lines that had no quoted
/// pattern.
pub fn extract_paths(rules: &str) -> (Vec<String>, Vec<String>) {
    let mut paths = Vec::new();
    let mut bad = Vec::new();

    for line in rules.lines() {
        let line = line.trim_start();
        let Some(rest) = line.strip_prefix("path") else {
            continue;
        };
        if !rest.starts_with(|c: char| c.is_whitespace() || c == '"') {
            // A word that merely starts with "path".
            continue;
        }

        match quoted(rest) {
            Some(pattern) => paths.push(pattern.to_string()),
            None => bad.push(line.trim_end().to_string()),
        }
    }

    (paths, bad)
}

fn quoted(s: &str) -> Option<&str> {
    let start = s.find('"')? + 1;
    let len = s[start..].find('"')?;
    Some(&s[start..start + len])
}
