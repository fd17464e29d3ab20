//! Scan orchestration.
//!
//! A scan runs in three phases:
//!
//! 1. **Discovery** - list namespaces (the only fatal call), then read the
//!    auth and secrets-engine tables of every namespace.
//! 2. **Enumeration** - per namespace, the auth, entity, policy and engine
//!    scanners run concurrently against the tables from phase 1.
//! 3. **Correlation** - policy patterns are matched against discovered
//!    secrets. This only starts once every namespace, root included, has
//!    finished phase 2.
//!
//! Usage counters are read between phases 2 and 3 when enabled.

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::admission::{fan_out, AdmissionController};
use super::auths::scan_auths;
use super::correlate::correlate_all;
use super::entities::scan_entities;
use super::error::{render_errors, ScanError};
use super::mounts::{get_mounts, list_namespaces, MountTables};
use super::policies::scan_policies;
use super::remote::Remote;
use super::secrets::scan_engines;
use super::types::{Namespace, VaultInventory};
use super::usage::collect_usage;
use crate::utils::progress::ProgressBar;
use crate::vault_api::VaultBackend;

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("concurrency limit must be at least 1")]
    ZeroConcurrency,

    #[error("invalid target engine {0:?}: expected NAMESPACE/ENGINE, e.g. root/secret")]
    InvalidTargetEngine(String),
}

/// Restricts secret walking to one engine of one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetEngine {
    pub namespace: String,
    /// Engine mount path with trailing separator, e.g. `secret/`.
    pub engine: String,
}

impl TargetEngine {
    pub fn matches(&self, namespace: &str, engine_path: &str) -> bool {
        self.namespace == namespace && self.engine == engine_path
    }
}

impl FromStr for TargetEngine {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidTargetEngine(s.to_string());
        let (namespace, engine) = s.split_once('/').ok_or_else(invalid)?;
        let engine = engine.trim_matches('/');
        if namespace.is_empty() || engine.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            namespace: namespace.to_string(),
            engine: format!("{}/", engine),
        })
    }
}

impl fmt::Display for TargetEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.engine)
    }
}

/// Scan options.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub concurrency_limit: NonZeroUsize,
    /// Walk KV engines. Without it engines are listed but their secrets are not.
    pub list_secrets: bool,
    pub target_engine: Option<TargetEngine>,
    pub max_depth: usize,
    pub collect_usage: bool,
}

impl ScanConfig {
    pub fn new(concurrency_limit: usize) -> Result<Self, ConfigError> {
        let concurrency_limit =
            NonZeroUsize::new(concurrency_limit).ok_or(ConfigError::ZeroConcurrency)?;
        Ok(Self {
            concurrency_limit,
            ..Self::default()
        })
    }

    /// Whether the KV engine at `engine_path` in `namespace` should be walked.
    pub fn should_walk(&self, namespace: &str, engine_path: &str) -> bool {
        if !self.list_secrets {
            return false;
        }
        self.target_engine
            .as_ref()
            .map_or(true, |target| target.matches(namespace, engine_path))
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: NonZeroUsize::new(DEFAULT_CONCURRENCY)
                .unwrap_or(NonZeroUsize::MIN),
            list_secrets: false,
            target_engine: None,
            max_depth: DEFAULT_MAX_DEPTH,
            collect_usage: true,
        }
    }
}

/// Runs one inventory scan against a backend.
pub struct Scanner<C> {
    remote: Remote<C>,
    config: Arc<ScanConfig>,
    progress: Option<ProgressBar>,
}

impl<C: VaultBackend> Scanner<C> {
    pub fn new(backend: Arc<C>, config: ScanConfig, cancel: CancellationToken) -> Self {
        let admission = AdmissionController::new(config.concurrency_limit, cancel);
        Self {
            remote: Remote::new(backend, admission),
            config: Arc::new(config),
            progress: None,
        }
    }

    /// Report per-namespace progress on `bar`.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    pub fn admission(&self) -> &AdmissionController {
        self.remote.admission()
    }

    /// Run all phases. Fails only if the namespace listing fails; everything
    /// else is recorded in the inventory's error lists.
    pub async fn run(&self) -> Result<VaultInventory, ScanError> {
        let names = list_namespaces(&self.remote).await?;
        info!(namespaces = names.len(), "discovered namespaces");
        if let Some(bar) = &self.progress {
            bar.set_length(names.len());
            bar.set_message("Scanning namespaces");
        }

        let tables = self.discover_mounts(&names).await;
        let mut namespaces = self.enumerate(names, tables).await;

        let mut inventory = VaultInventory::default();
        if self.config.collect_usage {
            info!("collecting usage counters");
            let (usage, errors) = collect_usage(&self.remote, &mut namespaces).await;
            inventory.usage = usage;
            log_errors("<usage>", &errors);
            inventory.errors.extend(render_errors(&errors));
        }

        info!("correlating policies with secrets");
        correlate_all(&mut namespaces);
        inventory.namespaces = namespaces;

        if self.remote.admission().cancellation().is_cancelled() {
            warn!("scan was cancelled, inventory is incomplete");
            inventory
                .errors
                .push("scan cancelled before completion; inventory is incomplete".to_string());
        }

        if let Some(bar) = &self.progress {
            bar.finish_with_message("Scan complete");
        }
        Ok(inventory)
    }

    async fn discover_mounts(&self, names: &[String]) -> Vec<MountTables> {
        let results = fan_out(names.to_vec(), |_, name| {
            let remote = self.remote.clone();
            async move { get_mounts(&remote, &name).await }
        })
        .await;

        results
            .into_iter()
            .map(|result| {
                result.unwrap_or_else(|fault| MountTables {
                    errors: vec![fault],
                    ..MountTables::default()
                })
            })
            .collect()
    }

    async fn enumerate(&self, names: Vec<String>, tables: Vec<MountTables>) -> Vec<Namespace> {
        let units: Vec<(String, MountTables)> = names.iter().cloned().zip(tables).collect();
        let results = fan_out(units, |_, (name, tables)| {
            let remote = self.remote.clone();
            let config = Arc::clone(&self.config);
            let progress = self.progress.clone();
            async move {
                let namespace = scan_namespace(&remote, &config, name, tables).await;
                if let Some(bar) = progress {
                    bar.inc();
                }
                namespace
            }
        })
        .await;

        names
            .into_iter()
            .zip(results)
            .map(|(name, result)| match result {
                Ok(namespace) => namespace,
                Err(fault) => {
                    log_errors(&name, std::slice::from_ref(&fault));
                    let mut namespace = Namespace::new(name);
                    namespace.errors.push(fault.to_string());
                    namespace
                }
            })
            .collect()
    }
}

/// Run a scan without progress reporting.
pub async fn scan<C: VaultBackend>(
    backend: Arc<C>,
    config: ScanConfig,
    cancel: CancellationToken,
) -> Result<VaultInventory, ScanError> {
    Scanner::new(backend, config, cancel).run().await
}

async fn scan_namespace<C: VaultBackend>(
    remote: &Remote<C>,
    config: &ScanConfig,
    name: String,
    tables: MountTables,
) -> Namespace {
    let MountTables {
        auth_mounts,
        secrets_engines,
        errors: mut table_errors,
    } = tables;

    let (auths, entities, policies, engines) = tokio::join!(
        scan_auths(remote, &name, auth_mounts),
        scan_entities(remote, &name),
        scan_policies(remote, &name),
        scan_engines(remote, &name, secrets_engines, config),
    );
    let (auth_mounts, auth_errors) = auths;
    let (entities, entity_errors) = entities;
    let (policies, policy_errors) = policies;
    let (engines, engine_errors) = engines;

    for errors in [auth_errors, entity_errors, policy_errors, engine_errors] {
        table_errors.extend(errors);
    }
    log_errors(&name, &table_errors);
    info!(
        namespace = %name,
        auth_mounts = auth_mounts.len(),
        engines = engines.len(),
        entities = entities.len(),
        policies = policies.len(),
        errors = table_errors.len(),
        "namespace scanned"
    );

    Namespace {
        auth_mounts,
        secrets_engines: engines,
        entities,
        policies,
        errors: render_errors(&table_errors),
        ..Namespace::new(name)
    }
}

fn log_errors(namespace: &str, errors: &[ScanError]) {
    for err in errors {
        warn!(namespace, error = %err, "scan error recorded");
    }
}
