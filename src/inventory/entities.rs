//! Identity entity enumeration.
//!
//! Entities are never dropped: a field that is missing or has the wrong type
//! is recorded as an error and left empty on the entity.

use serde_json::{Map, Value};
use std::sync::Arc;

use super::admission::fan_out;
use super::error::ScanError;
use super::paths::join;
use super::remote::{string_list, type_name, Remote};
use super::types::{Alias, Entity};
use crate::vault_api::VaultBackend;

const ENTITY_ID_PATH: &str = "identity/entity/id";

pub async fn scan_entities<C: VaultBackend>(
    remote: &Remote<C>,
    namespace: &str,
) -> (Vec<Entity>, Vec<ScanError>) {
    let ids = match remote.list_keys(namespace, ENTITY_ID_PATH).await {
        Ok(ids) => ids,
        // No entities yet.
        Err(err) if err.is_not_found() => return (Vec::new(), Vec::new()),
        Err(err) => return (Vec::new(), vec![err]),
    };

    let namespace: Arc<str> = Arc::from(namespace);
    let results = fan_out(ids.clone(), |_, id| {
        let remote = remote.clone();
        let namespace = Arc::clone(&namespace);
        async move { get_entity(&remote, &namespace, id).await }
    })
    .await;

    let mut entities = Vec::with_capacity(ids.len());
    let mut errors = Vec::new();
    for (id, result) in ids.into_iter().zip(results) {
        match result {
            Ok((entity, entity_errors)) => {
                entities.push(entity);
                errors.extend(entity_errors);
            }
            Err(fault) => {
                entities.push(Entity {
                    id,
                    ..Entity::default()
                });
                errors.push(fault);
            }
        }
    }
    (entities, errors)
}

async fn get_entity<C: VaultBackend>(
    remote: &Remote<C>,
    namespace: &str,
    id: String,
) -> (Entity, Vec<ScanError>) {
    let path = join(ENTITY_ID_PATH, &id);
    let mut entity = Entity {
        id,
        ..Entity::default()
    };

    match remote.read(namespace, &path).await {
        Ok(data) => {
            let errors = fill_entity(&mut entity, &data, &path);
            (entity, errors)
        }
        Err(err) => (entity, vec![err]),
    }
}

fn fill_entity(entity: &mut Entity, data: &Map<String, Value>, path: &str) -> Vec<ScanError> {
    let mut errors = Vec::new();

    match data.get("name") {
        Some(Value::String(name)) => entity.name = name.clone(),
        Some(other) => errors.push(ScanError::malformed(
            path,
            format!("`name` should be a string, got {}", type_name(other)),
        )),
        None => errors.push(ScanError::malformed(path, "missing `name`")),
    }

    match string_list(data, "policies", path) {
        Ok(policies) => entity.policies = policies.unwrap_or_default(),
        Err(err) => errors.push(err),
    }

    match data.get("aliases") {
        None | Some(Value::Null) => {}
        Some(Value::Array(aliases)) => {
            for alias in aliases {
                match alias.as_object() {
                    Some(alias) => {
                        let mut field = |key: &str| match alias_field(alias, key, path) {
                            Ok(value) => value,
                            Err(err) => {
                                errors.push(err);
                                String::new()
                            }
                        };
                        let id = field("id");
                        let name = field("name");
                        let mount_path = field("mount_path");
                        let mount_type = field("mount_type");
                        entity.aliases.push(Alias {
                            id,
                            name,
                            mount_path,
                            mount_type,
                        });
                    }
                    None => errors.push(ScanError::malformed(path, "alias entry is not an object")),
                }
            }
        }
        Some(other) => errors.push(ScanError::malformed(
            path,
            format!("`aliases` should be a list, got {}", type_name(other)),
        )),
    }

    errors
}

fn alias_field(alias: &Map<String, Value>, key: &str, path: &str) -> Result<String, ScanError> {
    match alias.get(key) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(other) => Err(ScanError::malformed(
            path,
            format!("alias `{}` should be a string, got {}", key, type_name(other)),
        )),
        None => Err(ScanError::malformed(path, format!("alias missing `{}`", key))),
    }
}
