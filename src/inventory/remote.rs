//! Admission-gated access to a [`VaultBackend`].

use serde_json::{Map, Value};
use std::sync::Arc;

use super::admission::AdmissionController;
use super::error::ScanError;
use crate::vault_api::VaultBackend;

/// Every remote call made by the scanners goes through here: it takes an
/// admission slot, races the call against cancellation and maps failures
/// into [`ScanError`].
pub struct Remote<C> {
    backend: Arc<C>,
    admission: AdmissionController,
}

impl<C> Clone for Remote<C> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            admission: self.admission.clone(),
        }
    }
}

impl<C: VaultBackend> Remote<C> {
    pub fn new(backend: Arc<C>, admission: AdmissionController) -> Self {
        Self { backend, admission }
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// LIST `path` and return the raw `data` object.
    pub async fn list(&self, namespace: &str, path: &str) -> Result<Value, ScanError> {
        let _slot = self.admission.acquire(path).await?;
        let cancel = self.admission.cancellation();
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ScanError::Cancelled { path: path.to_string() }),
            result = self.backend.list(namespace, path) => result.map_err(|source| ScanError::List {
                path: path.to_string(),
                source,
            }),
        }
    }

    /// LIST `path` and return its `keys`.
    pub async fn list_keys(&self, namespace: &str, path: &str) -> Result<Vec<String>, ScanError> {
        let data = self.list(namespace, path).await?;
        keys_of(&data, path)
    }

    /// READ `path` and return its `data` object.
    pub async fn read(&self, namespace: &str, path: &str) -> Result<Map<String, Value>, ScanError> {
        let _slot = self.admission.acquire(path).await?;
        let cancel = self.admission.cancellation();
        let data = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ScanError::Cancelled { path: path.to_string() }),
            result = self.backend.read(namespace, path) => result.map_err(|source| ScanError::Read {
                path: path.to_string(),
                source,
            })?,
        };

        match data {
            Value::Object(map) => Ok(map),
            other => Err(ScanError::malformed(
                path,
                format!("expected an object, got {}", type_name(&other)),
            )),
        }
    }
}

/// Extract the `keys` array of a listing.
pub fn keys_of(data: &Value, path: &str) -> Result<Vec<String>, ScanError> {
    let keys = data
        .get("keys")
        .and_then(Value::as_array)
        .ok_or_else(|| ScanError::malformed(path, "missing `keys` array"))?;

    keys.iter()
        .map(|key| {
            key.as_str()
                .map(str::to_string)
                .ok_or_else(|| ScanError::malformed(path, format!("non-string key {}", key)))
        })
        .collect()
}

/// Vault answers LIST on an empty folder with 404.
pub fn empty_if_not_found(result: Result<Vec<String>, ScanError>) -> Result<Vec<String>, ScanError> {
    match result {
        Err(err) if err.is_not_found() => Ok(Vec::new()),
        other => other,
    }
}

/// Read an array-of-strings field. `Ok(None)` when the field is absent or null.
pub fn string_list(
    data: &Map<String, Value>,
    field: &str,
    path: &str,
) -> Result<Option<Vec<String>>, ScanError> {
    match data.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    ScanError::malformed(path, format!("`{}` contains a non-string entry", field))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(other) => Err(ScanError::malformed(
            path,
            format!("`{}` should be a list, got {}", field, type_name(other)),
        )),
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
