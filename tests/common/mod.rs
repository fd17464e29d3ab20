//! In-memory Vault backend shared by the integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use vault_inventory::vault_api::{RemoteError, VaultBackend};

type Key = (String, String);

/// Fake backend keyed by `(namespace, path)`. Unknown paths answer 404.
///
/// Tracks how many calls are in flight at once so tests can check the
/// admission bound.
#[derive(Default)]
pub struct FakeVault {
    lists: HashMap<Key, Value>,
    reads: HashMap<Key, Value>,
    failures: HashMap<Key, u16>,
    hangs: HashSet<Key>,
    panics: HashSet<Key>,
    max_delay_us: u64,
    rng: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn key(namespace: &str, path: &str) -> Key {
    (namespace.to_string(), path.to_string())
}

impl FakeVault {
    pub fn new() -> Self {
        Self {
            rng: AtomicU64::new(0x9E37_79B9_7F4A_7C15),
            ..Self::default()
        }
    }

    pub fn list(mut self, namespace: &str, path: &str, keys: &[&str]) -> Self {
        self.lists
            .insert(key(namespace, path), json!({ "keys": keys }));
        self
    }

    pub fn list_raw(mut self, namespace: &str, path: &str, data: Value) -> Self {
        self.lists.insert(key(namespace, path), data);
        self
    }

    pub fn read(mut self, namespace: &str, path: &str, data: Value) -> Self {
        self.reads.insert(key(namespace, path), data);
        self
    }

    /// Answer both list and read of `path` with `status`.
    pub fn fail(mut self, namespace: &str, path: &str, status: u16) -> Self {
        self.failures.insert(key(namespace, path), status);
        self
    }

    /// Never answer `path`.
    pub fn hang(mut self, namespace: &str, path: &str) -> Self {
        self.hangs.insert(key(namespace, path));
        self
    }

    pub fn panic_on(mut self, namespace: &str, path: &str) -> Self {
        self.panics.insert(key(namespace, path));
        self
    }

    /// Delay every call by a pseudo-random duration below `max`.
    pub fn with_jitter(mut self, max: Duration, seed: u64) -> Self {
        self.max_delay_us = max.as_micros() as u64;
        self.rng = AtomicU64::new(seed.max(1));
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_delay(&self) -> Duration {
        if self.max_delay_us == 0 {
            return Duration::ZERO;
        }
        let mut x = self.rng.load(Ordering::Relaxed);
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng.store(x, Ordering::Relaxed);
        Duration::from_micros(x % self.max_delay_us)
    }

    async fn answer(&self, namespace: &str, path: &str, list: bool) -> Result<Value, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let delay = self.next_delay();
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }

        let k = key(namespace, path);
        if self.panics.contains(&k) {
            panic!("fake backend exploded at {}", path);
        }
        if self.hangs.contains(&k) {
            std::future::pending::<()>().await;
        }
        if let Some(status) = self.failures.get(&k) {
            return Err(status_error(path, *status));
        }

        let table = if list { &self.lists } else { &self.reads };
        table
            .get(&k)
            .cloned()
            .ok_or_else(|| status_error(path, 404))
    }
}

fn status_error(path: &str, status: u16) -> RemoteError {
    RemoteError::Status {
        path: path.to_string(),
        status,
        body: String::new(),
    }
}

impl VaultBackend for FakeVault {
    async fn list(&self, namespace: &str, path: &str) -> Result<Value, RemoteError> {
        self.answer(namespace, path, true).await
    }

    async fn read(&self, namespace: &str, path: &str) -> Result<Value, RemoteError> {
        self.answer(namespace, path, false).await
    }
}

/// `sys/auth` and `sys/mounts` tables plus an empty policy list for `namespace`.
pub fn with_mounts(fake: FakeVault, namespace: &str, auth: Value, mounts: Value) -> FakeVault {
    fake.read(namespace, "sys/auth", auth)
        .read(namespace, "sys/mounts", mounts)
        .list(namespace, "sys/policy", &[])
}

pub fn kv_v2_metadata(version: u64) -> Value {
    json!({
        "current_version": version,
        "created_time": "2024-05-01T10:00:00Z",
        "updated_time": "2024-06-01T08:30:00.5Z"
    })
}

/// Two namespaces, approle roles, a KV v2 engine in each and policies that
/// reach `app/b`.
pub fn sample_cluster() -> FakeVault {
    let fake = FakeVault::new().list("root", "sys/namespaces", &["team-a/"]);

    let fake = with_mounts(
        fake,
        "root",
        json!({"approle/": {"type": "approle"}, "token/": {"type": "token", "options": null}}),
        json!({
            "secret/": {"type": "kv", "options": {"version": "2"}},
            "database/": {"type": "database"}
        }),
    );
    let fake = fake
        .list("root", "sys/policy", &["auditor", "default"])
        .read(
            "root",
            "sys/policy/auditor",
            json!({"rules": "path \"secret/data/app/*\" {\n  capabilities = [\"read\"]\n}\npath \"team-a/secret/data/app/*\" {\n  capabilities = [\"read\"]\n}\n"}),
        )
        .read("root", "sys/policy/default", json!({"rules": "path \"sys/capabilities-self\" {}"}))
        .list("root", "auth/approle/role", &["ci"])
        .read("root", "auth/approle/role/ci", json!({"token_policies": ["auditor"]}))
        .list("root", "auth/token/roles", &[])
        .list("root", "database/roles", &["readonly"])
        .list("root", "identity/entity/id", &["e-1"])
        .read(
            "root",
            "identity/entity/id/e-1",
            json!({
                "name": "ci-bot",
                "policies": ["auditor"],
                "aliases": [{"id": "a-1", "name": "ci", "mount_path": "auth/approle/", "mount_type": "approle"}]
            }),
        )
        .list("root", "secret/metadata", &["a", "app/"])
        .list("root", "secret/metadata/app", &["b"])
        .read("root", "secret/metadata/a", kv_v2_metadata(1))
        .read("root", "secret/metadata/app/b", kv_v2_metadata(4));

    let fake = with_mounts(
        fake,
        "team-a",
        json!({"approle/": {"type": "approle"}}),
        json!({"secret/": {"type": "kv", "options": {"version": "2"}}}),
    );
    fake.list("team-a", "sys/policy", &["app"])
        .read("team-a", "sys/policy/app", json!({"rules": "path \"secret/data/app/*\" {}"}))
        .list("team-a", "auth/approle/role", &["web", "batch"])
        .read("team-a", "auth/approle/role/web", json!({"token_policies": ["app"]}))
        .read("team-a", "auth/approle/role/batch", json!({"allowed_policies": ["other"]}))
        .list("team-a", "secret/metadata", &["app/"])
        .list("team-a", "secret/metadata/app", &["b"])
        .read("team-a", "secret/metadata/app/b", kv_v2_metadata(2))
        .read(
            "root",
            "sys/internal/counters/activity/monthly",
            json!({
                "clients": 3,
                "distinct_entities": 1,
                "by_namespace": [
                    {"namespace_path": "", "counts": {"clients": 2}},
                    {"namespace_path": "team-a/", "counts": {"clients": 1}}
                ]
            }),
        )
}
