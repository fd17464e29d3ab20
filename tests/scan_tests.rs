/// End-to-end scans against the in-memory backend
mod common;

use common::{kv_v2_metadata, sample_cluster, with_mounts, FakeVault};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vault_inventory::inventory::scanner::{scan, ScanConfig};
use vault_inventory::inventory::types::{KvVersion, VaultInventory};
use vault_inventory::inventory::ScanError;

fn config(list_secrets: bool) -> ScanConfig {
    let mut config = ScanConfig::new(4).unwrap();
    config.list_secrets = list_secrets;
    config
}

async fn run(fake: FakeVault, config: ScanConfig) -> VaultInventory {
    scan(Arc::new(fake), config, CancellationToken::new())
        .await
        .unwrap()
}

fn secret_paths(inventory: &VaultInventory) -> Vec<String> {
    inventory.secrets().map(|(_, _, s)| s.path.clone()).collect()
}

#[tokio::test]
async fn test_full_scan_of_sample_cluster() {
    let inventory = run(sample_cluster(), config(true)).await;

    assert_eq!(inventory.error_count(), 0, "{:?}", inventory);
    let names: Vec<_> = inventory.namespaces.iter().map(|ns| ns.name.as_str()).collect();
    assert_eq!(names, vec!["root", "team-a"]);

    let root = inventory.namespace("root").unwrap();
    let approle = root.auth_mounts.iter().find(|m| m.path == "approle/").unwrap();
    assert_eq!(approle.roles[0].name, "ci");
    assert_eq!(approle.roles[0].policies, vec!["auditor"]);
    assert_eq!(root.entities[0].name, "ci-bot");
    assert_eq!(root.entities[0].aliases[0].mount_type, "approle");
    assert_eq!(root.policies.len(), 2);

    let database = root.secrets_engines.iter().find(|e| e.path == "database/").unwrap();
    assert_eq!(database.roles, vec!["readonly"]);
    assert_eq!(database.version, None);

    let kv = root.secrets_engines.iter().find(|e| e.path == "secret/").unwrap();
    assert_eq!(kv.version, Some(KvVersion::V2));
    assert_eq!(kv.item_count, 2);
    let b = kv.secret("secret/app/b").unwrap();
    assert_eq!(b.current_version, Some(4));
    assert_eq!(b.policies, vec!["auditor"]);
    assert_eq!(b.roles, vec!["ci"]);
    assert!(kv.secret("secret/a").unwrap().policies.is_empty());

    assert_eq!(inventory.usage.clients, Some(3));
    assert_eq!(root.usage.clients, Some(2));
}

#[tokio::test]
async fn test_walk_visits_each_leaf_once() {
    let fake = with_mounts(
        FakeVault::new(),
        "root",
        json!({}),
        json!({"secret/": {"type": "kv", "options": {"version": "1"}}}),
    )
    .list("root", "secret", &["a", "app/"])
    .list("root", "secret/app", &["b"]);

    let mut config = config(true);
    config.collect_usage = false;
    let inventory = run(fake, config).await;

    assert_eq!(secret_paths(&inventory), vec!["secret/a", "secret/app/b"]);
    let secret = &inventory.namespaces[0].secrets_engines[0].secrets[0];
    assert_eq!(secret.current_version, None);
    assert!(inventory.namespaces[0].errors.is_empty());
}

#[tokio::test]
async fn test_one_failing_auth_mount_is_isolated() {
    let fake = with_mounts(
        FakeVault::new(),
        "root",
        json!({
            "approle/": {"type": "approle"},
            "kubernetes/": {"type": "kubernetes"},
            "jwt/": {"type": "jwt"}
        }),
        json!({}),
    )
    .list("root", "auth/approle/role", &["a"])
    .read("root", "auth/approle/role/a", json!({"token_policies": ["pa"]}))
    .fail("root", "auth/kubernetes/role", 403)
    .list("root", "auth/jwt/role", &["j"])
    .read("root", "auth/jwt/role/j", json!({"token_policies": ["pj"]}));

    let mut config = config(false);
    config.collect_usage = false;
    let inventory = run(fake, config).await;

    let root = &inventory.namespaces[0];
    assert_eq!(root.errors.len(), 1);
    assert!(root.errors[0].contains("auth/kubernetes/role"));

    let roles = |path: &str| {
        root.auth_mounts
            .iter()
            .find(|m| m.path == path)
            .map(|m| m.roles.len())
            .unwrap()
    };
    assert_eq!(roles("approle/"), 1);
    assert_eq!(roles("jwt/"), 1);
    assert_eq!(roles("kubernetes/"), 0);
}

#[tokio::test]
async fn test_root_policy_is_inherited_by_child_namespace() {
    let inventory = run(sample_cluster(), config(true)).await;

    let team_a = inventory.namespace("team-a").unwrap();
    let secret = team_a.secrets_engines[0].secret("team-a/secret/app/b").unwrap();
    assert_eq!(secret.policies, vec!["app", "auditor (root)"]);
    assert_eq!(secret.roles, vec!["web"]);

    let root = inventory.namespace("root").unwrap();
    let secret = root.secrets_engines.iter().find_map(|e| e.secret("secret/app/b")).unwrap();
    assert_eq!(secret.policies, vec!["auditor"]);
}

#[tokio::test]
async fn test_scans_are_byte_identical() {
    let mut outputs = Vec::new();
    for seed in [7, 1234] {
        let fake = sample_cluster().with_jitter(Duration::from_millis(3), seed);
        let inventory = run(fake, config(true)).await;
        let mut buf = Vec::new();
        vault_inventory::commands::scan::write_json(&inventory, &mut buf).unwrap();
        outputs.push(buf);
    }
    assert_eq!(outputs[0], outputs[1]);
}

#[tokio::test]
async fn test_secrets_not_walked_without_list_secrets() {
    let fake = sample_cluster();
    let inventory = run(fake, config(false)).await;

    assert_eq!(inventory.secrets().count(), 0);
    let root = inventory.namespace("root").unwrap();
    let kv = root.secrets_engines.iter().find(|e| e.is_kv()).unwrap();
    assert_eq!(kv.item_count, 0);
    // Engine roles are listed regardless.
    assert!(root.secrets_engines.iter().any(|e| e.roles == vec!["readonly"]));
}

#[tokio::test]
async fn test_target_engine_limits_walk() {
    let mut config = config(true);
    config.target_engine = Some("team-a/secret".parse().unwrap());
    let inventory = run(sample_cluster(), config).await;

    assert_eq!(secret_paths(&inventory), vec!["team-a/secret/app/b"]);
    assert_eq!(inventory.error_count(), 0);
}

#[tokio::test]
async fn test_namespace_listing_failure_is_fatal() {
    let fake = FakeVault::new().fail("root", "sys/namespaces", 403);
    let result = scan(Arc::new(fake), config(false), CancellationToken::new()).await;
    assert!(matches!(result, Err(ScanError::List { .. })));
}

#[tokio::test]
async fn test_oss_cluster_without_namespaces() {
    let fake = with_mounts(FakeVault::new(), "root", json!({}), json!({}));
    let mut config = config(false);
    config.collect_usage = false;
    let inventory = run(fake, config).await;

    assert_eq!(inventory.namespaces.len(), 1);
    assert!(inventory.namespaces[0].is_root());
    assert_eq!(inventory.error_count(), 0);
}

#[tokio::test]
async fn test_mount_table_failure_leaves_namespace_scannable() {
    let fake = FakeVault::new()
        .fail("root", "sys/auth", 403)
        .read("root", "sys/mounts", json!({"secret/": {"type": "kv"}}))
        .list("root", "sys/policy", &[])
        .list("root", "secret", &["x"]);
    let mut config = config(true);
    config.collect_usage = false;
    let inventory = run(fake, config).await;

    let root = &inventory.namespaces[0];
    assert!(root.auth_mounts.is_empty());
    assert_eq!(root.errors.len(), 1);
    assert!(root.errors[0].contains("sys/auth"));
    assert_eq!(secret_paths(&inventory), vec!["secret/x"]);
}

#[tokio::test]
async fn test_panicking_call_becomes_internal_fault() {
    let fake = with_mounts(
        FakeVault::new(),
        "root",
        json!({"approle/": {"type": "approle"}}),
        json!({}),
    )
    .list("root", "auth/approle/role", &["good", "bad", "also-good"])
    .read("root", "auth/approle/role/good", json!({"token_policies": ["g"]}))
    .panic_on("root", "auth/approle/role/bad")
    .read("root", "auth/approle/role/also-good", json!({"token_policies": ["h"]}));

    let mut config = config(false);
    config.collect_usage = false;
    let inventory = run(fake, config).await;

    let root = &inventory.namespaces[0];
    let names: Vec<_> = root.auth_mounts[0].roles.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["good", "bad", "also-good"]);
    assert_eq!(root.auth_mounts[0].roles[2].policies, vec!["h"]);
    assert_eq!(root.errors.len(), 1);
    assert!(root.errors[0].starts_with("internal fault in unit 1"));
}

#[tokio::test]
async fn test_depth_guard() {
    let fake = with_mounts(
        FakeVault::new(),
        "root",
        json!({}),
        json!({"kv/": {"type": "kv"}}),
    )
    .list("root", "kv", &["top", "a/"])
    .list("root", "kv/a", &["b/"])
    .list("root", "kv/a/b", &["deep"]);

    let mut config = config(true);
    config.collect_usage = false;
    config.max_depth = 1;
    let inventory = run(fake, config).await;

    assert_eq!(secret_paths(&inventory), vec!["kv/top"]);
    let errors = &inventory.namespaces[0].errors;
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("maximum depth 1 exceeded"));
}

#[tokio::test]
async fn test_malformed_metadata_keeps_secret() {
    let fake = with_mounts(
        FakeVault::new(),
        "root",
        json!({}),
        json!({"secret/": {"type": "kv", "options": {"version": 2}}}),
    )
    .list("root", "secret/metadata", &["ok", "odd"])
    .read("root", "secret/metadata/ok", kv_v2_metadata(9))
    .read("root", "secret/metadata/odd", json!({"current_version": "nine"}));

    let mut config = config(true);
    config.collect_usage = false;
    let inventory = run(fake, config).await;

    assert_eq!(secret_paths(&inventory), vec!["secret/ok", "secret/odd"]);
    let errors = &inventory.namespaces[0].errors;
    assert_eq!(errors.len(), 3);
    assert!(errors.iter().all(|e| e.contains("secret/metadata/odd")));
}

#[tokio::test]
async fn test_kv_v2_folder_named_metadata_keeps_its_name() {
    let fake = with_mounts(
        FakeVault::new(),
        "root",
        json!({}),
        json!({"secret/": {"type": "kv", "options": {"version": "2"}}}),
    )
    .list("root", "secret/metadata", &["metadata/"])
    .list("root", "secret/metadata/metadata", &["x"])
    .read("root", "secret/metadata/metadata/x", kv_v2_metadata(1))
    .list("root", "sys/policy", &["folder", "sibling"])
    .read(
        "root",
        "sys/policy/folder",
        json!({"rules": "path \"secret/data/metadata/*\" {\n  capabilities = [\"read\"]\n}\n"}),
    )
    .read(
        "root",
        "sys/policy/sibling",
        json!({"rules": "path \"secret/data/x\" {\n  capabilities = [\"read\"]\n}\n"}),
    );

    let mut config = config(true);
    config.collect_usage = false;
    let inventory = run(fake, config).await;

    let (_, _, secret) = inventory.secrets().next().unwrap();
    assert_eq!(secret.path, "secret/metadata/x");
    assert_eq!(secret.policies, vec!["folder"]);
    assert_eq!(inventory.error_count(), 0);
}

#[tokio::test]
async fn test_cancellation_keeps_partial_inventory() {
    let fake = sample_cluster().hang("team-a", "secret/metadata");
    let cancel = CancellationToken::new();
    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { scan(Arc::new(fake), config(true), cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();
    let inventory = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scan did not stop after cancellation")
        .unwrap()
        .unwrap();

    let team_a = inventory.namespace("team-a").unwrap();
    assert!(team_a.errors.iter().any(|e| e.contains("cancelled")));
    assert!(inventory.errors.iter().any(|e| e.contains("incomplete")));
    // Root finished before the cancel and is intact.
    assert_eq!(inventory.namespace("root").unwrap().secrets_engines.len(), 2);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = scan(Arc::new(sample_cluster()), config(true), cancel).await;
    assert!(matches!(result, Err(ScanError::Cancelled { .. })));
}
