//! Auth mount role enumeration.
//!
//! Which sub-resources are listed for an auth mount depends only on its type,
//! via the [`AUTH_CATEGORIES`] table:
//!
//! | sub-path | mount types | stored in |
//! |---|---|---|
//! | `role` | approle, azure, jwt, kubernetes, oidc, oci, saml | roles |
//! | `roles` | aws, gcp, token, cf, alicloud | roles |
//! | `certs` | cert | certs |
//! | `groups` | ldap, okta, kerberos | groups |
//! | `users` | userpass, radius, okta, ldap | users |
//!
//! Roles and certs are read individually to resolve the policies they grant;
//! groups and users are recorded by name only.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use super::admission::fan_out;
use super::error::ScanError;
use super::paths::join;
use super::remote::{empty_if_not_found, string_list, Remote};
use super::types::{AuthMount, AuthRole};
use crate::vault_api::VaultBackend;

/// Where the names listed under a category end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Roles,
    Certs,
    Groups,
    Users,
}

impl Target {
    fn resolves_policies(self) -> bool {
        matches!(self, Self::Roles | Self::Certs)
    }
}

#[derive(Debug)]
pub struct Category {
    pub sub_path: &'static str,
    pub target: Target,
    pub mount_types: &'static [&'static str],
}

pub const AUTH_CATEGORIES: &[Category] = &[
    Category {
        sub_path: "role",
        target: Target::Roles,
        mount_types: &["approle", "azure", "jwt", "kubernetes", "oidc", "oci", "saml"],
    },
    Category {
        sub_path: "roles",
        target: Target::Roles,
        mount_types: &["aws", "gcp", "token", "cf", "alicloud"],
    },
    Category {
        sub_path: "certs",
        target: Target::Certs,
        mount_types: &["cert"],
    },
    Category {
        sub_path: "groups",
        target: Target::Groups,
        mount_types: &["ldap", "okta", "kerberos"],
    },
    Category {
        sub_path: "users",
        target: Target::Users,
        mount_types: &["userpass", "radius", "okta", "ldap"],
    },
];

/// Categories that apply to a mount type, in table order.
pub fn categories_for(mount_type: &str) -> &'static [&'static Category] {
    static BY_TYPE: OnceLock<HashMap<&'static str, Vec<&'static Category>>> = OnceLock::new();
    let by_type = BY_TYPE.get_or_init(|| {
        let mut map: HashMap<&'static str, Vec<&'static Category>> = HashMap::new();
        for category in AUTH_CATEGORIES {
            for mount_type in category.mount_types {
                map.entry(*mount_type).or_default().push(category);
            }
        }
        map
    });
    by_type.get(mount_type).map(Vec::as_slice).unwrap_or(&[])
}

/// Enumerate roles, certs, groups and users for every auth mount.
pub async fn scan_auths<C: VaultBackend>(
    remote: &Remote<C>,
    namespace: &str,
    mounts: Vec<AuthMount>,
) -> (Vec<AuthMount>, Vec<ScanError>) {
    let namespace: Arc<str> = Arc::from(namespace);
    let results = fan_out(mounts.clone(), |_, mount| {
        let remote = remote.clone();
        let namespace = Arc::clone(&namespace);
        async move { scan_mount(&remote, &namespace, mount).await }
    })
    .await;

    let mut scanned = Vec::with_capacity(mounts.len());
    let mut errors = Vec::new();
    for (unscanned, result) in mounts.into_iter().zip(results) {
        match result {
            Ok((mount, mount_errors)) => {
                scanned.push(mount);
                errors.extend(mount_errors);
            }
            Err(fault) => {
                scanned.push(unscanned);
                errors.push(fault);
            }
        }
    }
    (scanned, errors)
}

async fn scan_mount<C: VaultBackend>(
    remote: &Remote<C>,
    namespace: &Arc<str>,
    mut mount: AuthMount,
) -> (AuthMount, Vec<ScanError>) {
    let mut errors = Vec::new();

    for category in categories_for(&mount.mount_type) {
        let list_path = join(&format!("auth/{}", mount.path), category.sub_path);
        let names = match empty_if_not_found(remote.list_keys(namespace, &list_path).await) {
            Ok(names) => names,
            Err(err) => {
                errors.push(err);
                continue;
            }
        };

        match category.target {
            Target::Groups => mount.groups.extend(names),
            Target::Users => mount.users.extend(names),
            target => {
                debug_assert!(target.resolves_policies());
                let (roles, role_errors) = resolve_roles(remote, namespace, &list_path, names).await;
                errors.extend(role_errors);
                if target == Target::Certs {
                    mount.certs.extend(roles);
                } else {
                    mount.roles.extend(roles);
                }
            }
        }
    }

    (mount, errors)
}

async fn resolve_roles<C: VaultBackend>(
    remote: &Remote<C>,
    namespace: &Arc<str>,
    list_path: &str,
    names: Vec<String>,
) -> (Vec<AuthRole>, Vec<ScanError>) {
    let list_path: Arc<str> = Arc::from(list_path);
    let results = fan_out(names.clone(), |_, name| {
        let remote = remote.clone();
        let namespace = Arc::clone(namespace);
        let list_path = Arc::clone(&list_path);
        async move {
            let path = join(&list_path, &name);
            match remote.read(&namespace, &path).await {
                Ok(data) => match granted_policies(&data, &path) {
                    Ok(policies) => (AuthRole { name, policies }, None),
                    Err(err) => (AuthRole { name, policies: Vec::new() }, Some(err)),
                },
                Err(err) => (AuthRole { name, policies: Vec::new() }, Some(err)),
            }
        }
    })
    .await;

    let mut roles = Vec::with_capacity(names.len());
    let mut errors = Vec::new();
    for (name, result) in names.into_iter().zip(results) {
        match result {
            Ok((role, err)) => {
                roles.push(role);
                errors.extend(err);
            }
            Err(fault) => {
                roles.push(AuthRole {
                    name,
                    policies: Vec::new(),
                });
                errors.push(fault);
            }
        }
    }
    (roles, errors)
}

/// Policies granted by a role detail object.
fn granted_policies(
    data: &serde_json::Map<String, serde_json::Value>,
    path: &str,
) -> Result<Vec<String>, ScanError> {
    if let Some(policies) = string_list(data, "token_policies", path)? {
        return Ok(policies);
    }
    Ok(string_list(data, "allowed_policies", path)?.unwrap_or_default())
}
