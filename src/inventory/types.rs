//! Inventory data model.
//!
//! These types are the scan's output. They serialize to camelCase JSON with
//! empty collections omitted, except `errors`, which is always present so
//! consumers can tell "no errors" from "not scanned".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::paths::namespace_path;

/// Reserved name of the top-level namespace.
pub const ROOT_NAMESPACE: &str = "root";

/// Complete result of a scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultInventory {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<Namespace>,
    #[serde(default, skip_serializing_if = "UsageData::is_empty")]
    pub usage: UsageData,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl VaultInventory {
    pub fn namespace(&self, name: &str) -> Option<&Namespace> {
        self.namespaces.iter().find(|ns| ns.name == name)
    }

    /// Every static secret with the namespace and engine it belongs to.
    pub fn secrets(&self) -> impl Iterator<Item = (&Namespace, &SecretsEngine, &StaticSecret)> {
        self.namespaces.iter().flat_map(|ns| {
            ns.secrets_engines
                .iter()
                .flat_map(move |engine| engine.secrets.iter().map(move |s| (ns, engine, s)))
        })
    }

    pub fn error_count(&self) -> usize {
        self.errors.len() + self.namespaces.iter().map(|ns| ns.errors.len()).sum::<usize>()
    }
}

/// One administrative namespace and everything discovered inside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Namespace {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auth_mounts: Vec<AuthMount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets_engines: Vec<SecretsEngine>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<Policy>,
    #[serde(default, skip_serializing_if = "UsageData::is_empty")]
    pub usage: UsageData,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_root(&self) -> bool {
        self.name == ROOT_NAMESPACE
    }

    /// Prefix used to build cluster-wide paths for this namespace.
    pub fn path_prefix(&self) -> String {
        namespace_path(&self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthMount {
    pub path: String,
    #[serde(rename = "type")]
    pub mount_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<AuthRole>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certs: Vec<AuthRole>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

impl AuthMount {
    pub fn new(path: impl Into<String>, mount_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mount_type: mount_type.into(),
            ..Self::default()
        }
    }

    /// Roles and cert entries, the two kinds that carry a policy grant.
    pub fn granting_roles(&self) -> impl Iterator<Item = &AuthRole> {
        self.roles.iter().chain(self.certs.iter())
    }
}

/// A named auth role (or cert entry) and the policies it grants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRole {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<String>,
}

/// KV secrets engine version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KvVersion {
    #[serde(rename = "1")]
    V1,
    #[serde(rename = "2")]
    V2,
}

impl KvVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "1",
            Self::V2 => "2",
        }
    }
}

impl fmt::Display for KvVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretsEngine {
    pub path: String,
    #[serde(rename = "type")]
    pub engine_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<KvVersion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<StaticSecret>,
    #[serde(default)]
    pub item_count: usize,
}

impl SecretsEngine {
    pub fn new(path: impl Into<String>, engine_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            engine_type: engine_type.into(),
            ..Self::default()
        }
    }

    pub fn is_kv(&self) -> bool {
        self.engine_type == "kv"
    }

    pub fn secret(&self, path: &str) -> Option<&StaticSecret> {
        self.secrets.iter().find(|s| s.path == path)
    }
}

/// One leaf of a KV tree walk. Never holds the secret's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticSecret {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<Alias>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alias {
    pub id: String,
    pub name: String,
    pub mount_path: String,
    pub mount_type: String,
}

/// A named policy and the ACL glob patterns extracted from its rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
}

/// Client activity counters from `sys/internal/counters/activity/monthly`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct_entities: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clients: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_entity_clients: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_syncs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acme_clients: Option<u64>,
}

impl UsageData {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
