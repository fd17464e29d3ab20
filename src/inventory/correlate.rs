//! Access correlation: which policies, and through them which auth roles,
//! reach each discovered secret.
//!
//! Patterns of a namespace's own policies are evaluated relative to that
//! namespace. Root policies are additionally evaluated against every other
//! namespace's secrets using cluster-wide paths and recorded as
//! `"<name> (root)"`. For KV v2 engines a pattern may name the secret by its
//! logical path or by its `data/` or `metadata/` API path.

use super::paths::glob_match;
use super::types::{AuthMount, KvVersion, Namespace, Policy, StaticSecret};

/// Suffix marking a grant inherited from a root-namespace policy.
pub const ROOT_POLICY_SUFFIX: &str = " (root)";

/// Correlate every namespace. Root must already be fully scanned.
pub fn correlate_all(namespaces: &mut [Namespace]) {
    let root_policies: Vec<Policy> = namespaces
        .iter()
        .find(|ns| ns.is_root())
        .map(|ns| ns.policies.clone())
        .unwrap_or_default();

    for namespace in namespaces.iter_mut() {
        correlate_namespace(namespace, &root_policies);
    }
}

/// Attach policy and role edges to the secrets of one namespace.
pub fn correlate_namespace(namespace: &mut Namespace, root_policies: &[Policy]) {
    let prefix = namespace.path_prefix();
    let is_root = namespace.is_root();
    let Namespace {
        auth_mounts,
        secrets_engines,
        policies,
        ..
    } = namespace;

    for engine in secrets_engines.iter_mut() {
        let engine_root = format!("{}{}", prefix, engine.path);
        let version = engine.version.filter(|_| engine.is_kv());
        for secret in &mut engine.secrets {
            let candidates = candidate_paths(&engine_root, version, &secret.path);

            for policy in policies.iter() {
                if grants(policy, &prefix, &candidates) {
                    push_unique(&mut secret.policies, policy.name.clone());
                }
            }

            if !is_root {
                for policy in root_policies {
                    if grants(policy, "", &candidates) {
                        push_unique(
                            &mut secret.policies,
                            format!("{}{}", policy.name, ROOT_POLICY_SUFFIX),
                        );
                    }
                }
            }

            attach_roles(secret, auth_mounts);
        }
    }
}

fn grants(policy: &Policy, prefix: &str, candidates: &[String]) -> bool {
    policy.paths.iter().any(|pattern| {
        let pattern = format!("{}{}", prefix, pattern);
        candidates.iter().any(|path| glob_match(&pattern, path))
    })
}

fn attach_roles(secret: &mut StaticSecret, auth_mounts: &[AuthMount]) {
    for mount in auth_mounts {
        for role in mount.granting_roles() {
            if role.policies.iter().any(|p| secret.policies.contains(p)) {
                push_unique(&mut secret.roles, role.name.clone());
            }
        }
    }
}

/// Paths a policy pattern may use to refer to a secret.
fn candidate_paths(engine_root: &str, version: Option<KvVersion>, secret_path: &str) -> Vec<String> {
    let logical = secret_path.to_string();
    let mut candidates = Vec::with_capacity(3);

    if version == Some(KvVersion::V2) {
        if let Some(rel) = logical.strip_prefix(engine_root) {
            candidates.push(format!("{}data/{}", engine_root, rel));
            candidates.push(format!("{}metadata/{}", engine_root, rel));
        }
    }
    candidates.insert(0, logical);
    candidates
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}
