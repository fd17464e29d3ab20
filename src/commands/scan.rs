//! Inventory scan of a live Vault cluster.
//!
//! Discovers every namespace, auth mount, secrets engine, identity entity and
//! ACL policy, optionally walks KV secret trees, and reports which policies
//! (and through them which auth roles) grant access to each secret.
//!
//! # Usage Examples
//!
//! ```bash
//! # Mounts, roles, entities and policies of every namespace
//! vault-inventory scan -o inventory.json
//!
//! # Include every KV secret, limited to 20 concurrent API calls
//! vault-inventory scan --list-secrets --max-concurrency 20
//!
//! # Walk a single engine and write one CSV row per secret
//! vault-inventory scan --list-secrets --target-engine team-a/secret --format csv -o secrets.csv
//! ```
//!
//! # Output Formats
//!
//! - **JSON**: the full inventory, pretty-printed
//! - **CSV**: one row per discovered secret with its granting policies and roles
//!
//! Nothing is ever written to Vault and secret values are never read.

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::{self, BufWriter, IsTerminal, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::inventory::scanner::{ScanConfig, Scanner, TargetEngine};
use crate::inventory::types::VaultInventory;
use crate::utils::format::{format_number, join_names};
use crate::utils::progress::ProgressBar;
use crate::utils::time::{duration_human, format_optional};
use crate::vault_api::{should_skip_verify, ClientOptions, VaultClient};

const CSV_HEADER: [&str; 10] = [
    "Namespace",
    "Engine Type",
    "Engine Version",
    "Engine Path",
    "Secret Path",
    "Current Version",
    "Creation Time",
    "Updated Time",
    "Access-Granting Policies",
    "Namespace Roles with Access-Granting Policies",
];

/// Output encodings of the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Csv,
}

/// Options of the `scan` command, as parsed from the command line.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub vault_addr: Option<String>,
    pub vault_token: Option<String>,
    pub insecure: bool,
    pub max_concurrency: usize,
    pub rate_limit: u32,
    pub request_timeout: u64,
    pub list_secrets: bool,
    pub target_engine: Option<String>,
    pub max_depth: usize,
    pub no_usage: bool,
    pub timeout: Option<u64>,
    pub format: OutputFormat,
    pub output: Option<String>,
}

impl ScanOptions {
    fn scan_config(&self) -> Result<ScanConfig> {
        let mut config = ScanConfig::new(self.max_concurrency)?;
        config.list_secrets = self.list_secrets;
        config.max_depth = self.max_depth;
        config.collect_usage = !self.no_usage;
        config.target_engine = self
            .target_engine
            .as_deref()
            .map(str::parse::<TargetEngine>)
            .transpose()?;

        if config.target_engine.is_some() && !config.list_secrets {
            bail!("--target-engine only applies together with --list-secrets");
        }
        Ok(config)
    }
}

pub async fn run(options: ScanOptions) -> Result<()> {
    let config = options.scan_config()?;
    let client_options = ClientOptions {
        skip_verify: should_skip_verify(options.insecure),
        timeout: Duration::from_secs(options.request_timeout),
        rate_limit: Some(options.rate_limit),
    };
    let client = VaultClient::from_options(
        options.vault_addr.as_deref(),
        options.vault_token.as_deref(),
        &client_options,
    )?;

    eprintln!("Scanning Vault inventory...");
    eprintln!("   Vault Address: {}", client.addr());
    eprintln!("   Max concurrency: {}", config.concurrency_limit);
    if let Some(target) = &config.target_engine {
        eprintln!("   Target engine: {}", target);
    }

    let cancel = CancellationToken::new();
    spawn_cancellation(cancel.clone(), options.timeout);

    let progress = if io::stderr().is_terminal() {
        ProgressBar::new("Discovering namespaces")
    } else {
        ProgressBar::hidden()
    };

    let started = Instant::now();
    let inventory = Scanner::new(Arc::new(client), config, cancel)
        .with_progress(progress)
        .run()
        .await
        .context("Failed to list Vault namespaces")?;

    print_summary(&inventory, started.elapsed());

    match &options.output {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("Failed to create output file: {}", path))?;
            write_inventory(&inventory, options.format, BufWriter::new(file))
                .with_context(|| format!("Failed to write inventory to: {}", path))?;
            eprintln!("Output written to: {}", path);
        }
        None => write_inventory(&inventory, options.format, io::stdout().lock())
            .context("Failed to write inventory to stdout")?,
    }

    Ok(())
}

/// Fire `cancel` on Ctrl-C or once `timeout` seconds have passed.
fn spawn_cancellation(cancel: CancellationToken, timeout: Option<u64>) {
    tokio::spawn(async move {
        let deadline = async {
            match timeout {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending::<()>().await,
            }
        };
        let interrupted = async {
            // Without signal support only the deadline can cancel.
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            () = cancel.cancelled() => return,
            () = interrupted => eprintln!("\nInterrupted, finishing in-flight requests..."),
            () = deadline => eprintln!("\nScan timeout reached, finishing in-flight requests..."),
        }
        cancel.cancel();
    });
}

pub fn write_inventory<W: Write>(inventory: &VaultInventory, format: OutputFormat, writer: W) -> Result<()> {
    match format {
        OutputFormat::Json => write_json(inventory, writer),
        OutputFormat::Csv => write_csv(inventory, writer),
    }
}

pub fn write_json<W: Write>(inventory: &VaultInventory, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, inventory).context("Failed to serialize inventory")?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// One row per secret, in scan order.
pub fn write_csv<W: Write>(inventory: &VaultInventory, writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(CSV_HEADER)?;

    for (namespace, engine, secret) in inventory.secrets() {
        let current_version = secret
            .current_version
            .map(|v| v.to_string())
            .unwrap_or_default();
        let creation_time = format_optional(secret.creation_time.as_ref());
        let updated_time = format_optional(secret.updated_time.as_ref());
        let policies = join_names(&secret.policies);
        let roles = join_names(&secret.roles);

        writer.write_record([
            namespace.name.as_str(),
            engine.engine_type.as_str(),
            engine.version.map(|v| v.as_str()).unwrap_or_default(),
            engine.path.as_str(),
            secret.path.as_str(),
            current_version.as_str(),
            creation_time.as_str(),
            updated_time.as_str(),
            policies.as_str(),
            roles.as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn print_summary(inventory: &VaultInventory, elapsed: Duration) {
    let namespaces = &inventory.namespaces;
    let auth_mounts: usize = namespaces.iter().map(|ns| ns.auth_mounts.len()).sum();
    let engines: usize = namespaces.iter().map(|ns| ns.secrets_engines.len()).sum();
    let entities: usize = namespaces.iter().map(|ns| ns.entities.len()).sum();
    let policies: usize = namespaces.iter().map(|ns| ns.policies.len()).sum();

    eprintln!();
    eprintln!("Scan finished in {}", duration_human(elapsed));
    eprintln!("   Namespaces: {}", format_number(namespaces.len()));
    eprintln!("   Auth mounts: {}", format_number(auth_mounts));
    eprintln!("   Secrets engines: {}", format_number(engines));
    eprintln!("   Entities: {}", format_number(entities));
    eprintln!("   Policies: {}", format_number(policies));
    eprintln!("   Secrets: {}", format_number(inventory.secrets().count()));
    if let Some(clients) = inventory.usage.clients {
        eprintln!("   Clients this month: {}", clients);
    }

    let errors = inventory.error_count();
    if errors > 0 {
        eprintln!(
            "   Errors: {} (see the errors arrays in the output)",
            format_number(errors)
        );
    }
}
