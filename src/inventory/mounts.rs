//! Namespace and mount discovery.
//!
//! # API Endpoints Used
//!
//! - `LIST /v1/sys/namespaces` - child namespaces of root
//! - `GET /v1/sys/auth` - auth mounts of a namespace
//! - `GET /v1/sys/mounts` - secrets engines of a namespace

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::error::ScanError;
use super::remote::Remote;
use super::types::{AuthMount, KvVersion, SecretsEngine, ROOT_NAMESPACE};
use crate::vault_api::VaultBackend;

#[derive(Debug, Deserialize)]
struct MountInfo {
    #[serde(rename = "type")]
    mount_type: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    options: HashMap<String, Value>,
}

fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    T: Default + Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    let opt = Option::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

/// Mount tables of one namespace plus the errors hit while reading them.
#[derive(Debug, Default)]
pub struct MountTables {
    pub auth_mounts: Vec<AuthMount>,
    pub secrets_engines: Vec<SecretsEngine>,
    pub errors: Vec<ScanError>,
}

/// List all namespaces, root first.
///
/// This is the only fatal call of a scan. Any transport or decode failure
/// and any status other than 404 aborts the scan. A 404 means the cluster
/// has no namespace support (or no children) and yields just root.
pub async fn list_namespaces<C: VaultBackend>(remote: &Remote<C>) -> Result<Vec<String>, ScanError> {
    let mut namespaces = vec![ROOT_NAMESPACE.to_string()];

    let keys = match remote.list_keys(ROOT_NAMESPACE, "sys/namespaces").await {
        Ok(keys) => keys,
        Err(err) if err.is_not_found() => Vec::new(),
        Err(err) => return Err(err),
    };

    namespaces.extend(
        keys.iter()
            .map(|key| key.trim_end_matches('/').to_string())
            .filter(|name| !name.is_empty() && name != ROOT_NAMESPACE),
    );
    Ok(namespaces)
}

/// Read the auth and secrets-engine tables of a namespace.
///
/// A failed table read is recorded and leaves that table empty.
pub async fn get_mounts<C: VaultBackend>(remote: &Remote<C>, namespace: &str) -> MountTables {
    let mut tables = MountTables::default();

    match remote.read(namespace, "sys/auth").await {
        Ok(data) => {
            for (path, info) in parse_mount_table(&data, "sys/auth", &mut tables.errors) {
                tables.auth_mounts.push(AuthMount::new(path, info.mount_type));
            }
        }
        Err(err) => tables.errors.push(err),
    }

    match remote.read(namespace, "sys/mounts").await {
        Ok(data) => {
            for (path, info) in parse_mount_table(&data, "sys/mounts", &mut tables.errors) {
                let mut engine = SecretsEngine::new(path, info.mount_type);
                if engine.is_kv() {
                    engine.version = Some(kv_version(&info.options));
                }
                tables.secrets_engines.push(engine);
            }
        }
        Err(err) => tables.errors.push(err),
    }

    tables
}

fn parse_mount_table(
    data: &Map<String, Value>,
    path: &str,
    errors: &mut Vec<ScanError>,
) -> Vec<(String, MountInfo)> {
    data.iter()
        // Mount paths always end in a separator; anything else is response metadata.
        .filter(|(mount, value)| mount.ends_with('/') && value.is_object())
        .filter_map(
            |(mount, value)| match serde_json::from_value::<MountInfo>(value.clone()) {
                Ok(info) => Some((mount.clone(), info)),
                Err(err) => {
                    errors.push(ScanError::malformed(
                        path,
                        format!("invalid mount entry {}: {}", mount, err),
                    ));
                    None
                }
            },
        )
        .collect()
}

fn kv_version(options: &HashMap<String, Value>) -> KvVersion {
    match options.get("version") {
        Some(Value::String(v)) if v == "2" => KvVersion::V2,
        Some(Value::Number(n)) if n.as_u64() == Some(2) => KvVersion::V2,
        _ => KvVersion::V1,
    }
}
