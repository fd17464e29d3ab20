//! Secrets engine scanning and KV tree walking.
//!
//! Every engine gets its role names listed when its type has them (dynamic
//! engines such as database or pki). KV engines are additionally walked when
//! secret listing is enabled:
//!
//! - KV v1: `LIST /v1/{mount}/{path}`, no per-secret reads
//! - KV v2: `LIST /v1/{mount}/metadata/{path}` and
//!   `GET /v1/{mount}/metadata/{path}/{key}` for version and timestamps
//!
//! Keys ending in `/` are folders and are walked on their own task; the
//! results of a listing are stitched back together in key order so a walk
//! over an unchanged tree always yields the same sequence.

use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::admission::fan_out;
use super::error::ScanError;
use super::paths::{join, namespace_path};
use super::remote::{empty_if_not_found, type_name, Remote};
use super::scanner::ScanConfig;
use super::types::{KvVersion, SecretsEngine, StaticSecret};
use crate::utils::time::parse_timestamp;
use crate::vault_api::VaultBackend;

/// Engine types whose roles live under `roles`, then under `role`.
const ENGINE_ROLE_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "roles",
        &["aws", "azure", "consul", "database", "kubernetes", "pki", "ssh"],
    ),
    ("role", &["nomad", "terraform", "transform"]),
];

/// Secrets and errors collected under one subtree.
#[derive(Debug, Default)]
pub struct WalkResult {
    pub secrets: Vec<StaticSecret>,
    pub errors: Vec<ScanError>,
}

impl WalkResult {
    fn extend(&mut self, other: Self) {
        self.secrets.extend(other.secrets);
        self.errors.extend(other.errors);
    }

    fn error(err: ScanError) -> Self {
        Self {
            secrets: Vec::new(),
            errors: vec![err],
        }
    }
}

/// What a tree walk needs to know about its engine.
#[derive(Debug)]
pub struct KvTree {
    pub namespace: String,
    /// Mount path with trailing separator, e.g. `secret/`.
    pub mount: String,
    pub version: KvVersion,
    pub max_depth: usize,
}

impl KvTree {
    /// API path to LIST for a folder relative to the mount.
    fn list_path(&self, rel: &str) -> String {
        match self.version {
            KvVersion::V2 => join(&join(&self.mount, "metadata"), rel),
            KvVersion::V1 => join(&self.mount, rel),
        }
    }

    /// Namespace-prefixed logical path of a secret, without `/metadata`.
    fn display_path(&self, rel: &str) -> String {
        join(&format!("{}{}", namespace_path(&self.namespace), self.mount), rel)
    }
}

enum Node {
    Folder(String),
    Leaf(String),
}

/// Scan every engine of a namespace: role listing, then the KV walk.
pub async fn scan_engines<C: VaultBackend>(
    remote: &Remote<C>,
    namespace: &str,
    engines: Vec<SecretsEngine>,
    config: &ScanConfig,
) -> (Vec<SecretsEngine>, Vec<ScanError>) {
    let namespace: Arc<str> = Arc::from(namespace);
    let config = Arc::new(config.clone());
    let results = fan_out(engines.clone(), |_, engine| {
        let remote = remote.clone();
        let namespace = Arc::clone(&namespace);
        let config = Arc::clone(&config);
        async move { scan_engine(&remote, &namespace, engine, &config).await }
    })
    .await;

    let mut scanned = Vec::with_capacity(engines.len());
    let mut errors = Vec::new();
    for (unscanned, result) in engines.into_iter().zip(results) {
        match result {
            Ok((engine, engine_errors)) => {
                scanned.push(engine);
                errors.extend(engine_errors);
            }
            Err(fault) => {
                scanned.push(unscanned);
                errors.push(fault);
            }
        }
    }
    (scanned, errors)
}

async fn scan_engine<C: VaultBackend>(
    remote: &Remote<C>,
    namespace: &str,
    mut engine: SecretsEngine,
    config: &ScanConfig,
) -> (SecretsEngine, Vec<ScanError>) {
    let mut errors = Vec::new();

    for (sub_path, engine_types) in ENGINE_ROLE_CATEGORIES {
        if !engine_types.contains(&engine.engine_type.as_str()) {
            continue;
        }
        let path = join(&engine.path, sub_path);
        match empty_if_not_found(remote.list_keys(namespace, &path).await) {
            Ok(roles) => engine.roles.extend(roles),
            Err(err) => errors.push(err),
        }
    }

    if let Some(version) = engine.version.filter(|_| engine.is_kv()) {
        if config.should_walk(namespace, &engine.path) {
            let tree = Arc::new(KvTree {
                namespace: namespace.to_string(),
                mount: engine.path.clone(),
                version,
                max_depth: config.max_depth,
            });
            let walked = walk(remote.clone(), tree, String::new(), 0).await;
            engine.secrets = walked.secrets;
            errors.extend(walked.errors);
        }
    }

    engine.item_count = engine.secrets.len();
    (engine, errors)
}

/// Walk the folder `rel` (relative to the mount) and everything below it.
pub fn walk<C: VaultBackend>(
    remote: Remote<C>,
    tree: Arc<KvTree>,
    rel: String,
    depth: usize,
) -> Pin<Box<dyn Future<Output = WalkResult> + Send>> {
    Box::pin(async move {
        let list_path = tree.list_path(&rel);
        if depth > tree.max_depth {
            return WalkResult::error(ScanError::DepthExceeded {
                path: list_path,
                max_depth: tree.max_depth,
            });
        }

        let keys = match empty_if_not_found(remote.list_keys(&tree.namespace, &list_path).await) {
            Ok(keys) => keys,
            Err(err) => return WalkResult::error(err),
        };

        let nodes: Vec<Node> = keys
            .iter()
            .map(|key| match key.strip_suffix('/') {
                Some(folder) => Node::Folder(join(&rel, folder)),
                None => Node::Leaf(join(&rel, key)),
            })
            .collect();

        let results = fan_out(nodes, |_, node| {
            let remote = remote.clone();
            let tree = Arc::clone(&tree);
            async move {
                match node {
                    Node::Folder(child) => walk(remote, tree, child, depth + 1).await,
                    Node::Leaf(leaf) => read_leaf(&remote, &tree, &leaf).await,
                }
            }
        })
        .await;

        let mut combined = WalkResult::default();
        for result in results {
            match result {
                Ok(branch) => combined.extend(branch),
                Err(fault) => combined.errors.push(fault),
            }
        }
        combined
    })
}

async fn read_leaf<C: VaultBackend>(remote: &Remote<C>, tree: &KvTree, rel: &str) -> WalkResult {
    let mut secret = StaticSecret {
        path: tree.display_path(rel),
        ..StaticSecret::default()
    };
    let mut errors = Vec::new();

    if tree.version == KvVersion::V2 {
        let metadata_path = tree.list_path(rel);
        match remote.read(&tree.namespace, &metadata_path).await {
            Ok(metadata) => errors.extend(fill_metadata(&mut secret, &metadata, &metadata_path)),
            Err(err) => errors.push(err),
        }
    }

    WalkResult {
        secrets: vec![secret],
        errors,
    }
}

fn fill_metadata(
    secret: &mut StaticSecret,
    metadata: &Map<String, Value>,
    path: &str,
) -> Vec<ScanError> {
    let mut errors = Vec::new();

    match metadata.get("current_version") {
        Some(Value::Number(n)) if n.as_u64().is_some() => secret.current_version = n.as_u64(),
        Some(other) => errors.push(ScanError::malformed(
            path,
            format!("`current_version` should be a number, got {}", type_name(other)),
        )),
        None => errors.push(ScanError::malformed(path, "missing `current_version`")),
    }

    for (field, slot) in [
        ("created_time", &mut secret.creation_time),
        ("updated_time", &mut secret.updated_time),
    ] {
        match metadata.get(field).and_then(Value::as_str) {
            Some(ts) => match parse_timestamp(ts) {
                Ok(parsed) => *slot = Some(parsed),
                Err(err) => errors.push(ScanError::malformed(
                    path,
                    format!("`{}` is not a timestamp: {}", field, err),
                )),
            },
            None => errors.push(ScanError::malformed(
                path,
                format!("missing `{}`", field),
            )),
        }
    }

    errors
}
