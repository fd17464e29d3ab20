//! Client activity counters.
//!
//! Reads `sys/internal/counters/activity/monthly` once from root and spreads
//! the `by_namespace` breakdown over the discovered namespaces.

use serde_json::{Map, Value};

use super::error::ScanError;
use super::remote::Remote;
use super::types::{Namespace, UsageData, ROOT_NAMESPACE};
use crate::vault_api::VaultBackend;

const ACTIVITY_PATH: &str = "sys/internal/counters/activity/monthly";

/// Attach usage counters to `namespaces` and return the cluster totals.
pub async fn collect_usage<C: VaultBackend>(
    remote: &Remote<C>,
    namespaces: &mut [Namespace],
) -> (UsageData, Vec<ScanError>) {
    match remote.read(ROOT_NAMESPACE, ACTIVITY_PATH).await {
        Ok(data) => apply_activity(&data, namespaces),
        Err(err) => (UsageData::default(), vec![err]),
    }
}

fn apply_activity(data: &Map<String, Value>, namespaces: &mut [Namespace]) -> (UsageData, Vec<ScanError>) {
    let totals = usage_from(data);
    let mut errors = Vec::new();

    let by_namespace = match data.get("by_namespace") {
        Some(Value::Array(entries)) => entries,
        // No activity recorded this month.
        None | Some(Value::Null) => return (totals, errors),
        Some(_) => {
            errors.push(ScanError::malformed(ACTIVITY_PATH, "`by_namespace` should be a list"));
            return (totals, errors);
        }
    };

    for entry in by_namespace {
        let Some(entry) = entry.as_object() else {
            errors.push(ScanError::malformed(ACTIVITY_PATH, "namespace entry is not an object"));
            continue;
        };

        let name = match entry.get("namespace_path").and_then(Value::as_str) {
            Some("") | None => ROOT_NAMESPACE.to_string(),
            Some(path) => path.trim_end_matches('/').to_string(),
        };

        let Some(counts) = entry.get("counts").and_then(Value::as_object) else {
            errors.push(ScanError::malformed(
                ACTIVITY_PATH,
                format!("missing `counts` for namespace {}", name),
            ));
            continue;
        };

        if let Some(ns) = namespaces.iter_mut().find(|ns| ns.name == name) {
            ns.usage = usage_from(counts);
        }
    }

    (totals, errors)
}

fn usage_from(counts: &Map<String, Value>) -> UsageData {
    let number = |key: &str| counts.get(key).and_then(Value::as_u64);
    UsageData {
        distinct_entities: number("distinct_entities"),
        clients: number("clients"),
        non_entity_clients: number("non_entity_clients"),
        secret_syncs: number("secret_syncs"),
        acme_clients: number("acme_clients"),
    }
}
