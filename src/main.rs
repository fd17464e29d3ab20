use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vault_inventory::commands;
use vault_inventory::commands::scan::{OutputFormat, ScanOptions};
use vault_inventory::inventory::scanner::{DEFAULT_CONCURRENCY, DEFAULT_MAX_DEPTH};

#[derive(Parser)]
#[command(name = "vault-inventory")]
#[command(about = "Vault inventory and access-correlation auditing", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inventory namespaces, mounts, entities, policies and secrets
    Scan {
        /// Vault address (default: $VAULT_ADDR or http://127.0.0.1:8200)
        #[arg(long)]
        vault_addr: Option<String>,

        /// Vault token (default: $VAULT_TOKEN or $VAULT_TOKEN_FILE)
        #[arg(long)]
        vault_token: Option<String>,

        /// Skip TLS certificate verification (insecure)
        #[arg(long)]
        insecure: bool,

        /// Maximum number of Vault API calls in flight
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        max_concurrency: usize,

        /// Maximum Vault API requests per second (0 for unlimited)
        #[arg(long, default_value_t = 100)]
        rate_limit: u32,

        /// Per-request timeout in seconds
        #[arg(long, default_value_t = 10)]
        request_timeout: u64,

        /// Walk KV engines and list every secret
        #[arg(long)]
        list_secrets: bool,

        /// Only walk this engine, as NAMESPACE/ENGINE (e.g., "root/secret")
        #[arg(long)]
        target_engine: Option<String>,

        /// Maximum folder depth of a KV walk
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,

        /// Skip reading client activity counters
        #[arg(long)]
        no_usage: bool,

        /// Cancel the scan after this many seconds and emit what was found
        #[arg(long)]
        timeout: Option<u64>,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Generate shell completion scripts
    GenerateCompletion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            vault_addr,
            vault_token,
            insecure,
            max_concurrency,
            rate_limit,
            request_timeout,
            list_secrets,
            target_engine,
            max_depth,
            no_usage,
            timeout,
            format,
            output,
        } => {
            commands::scan::run(ScanOptions {
                vault_addr,
                vault_token,
                insecure,
                max_concurrency,
                rate_limit,
                request_timeout,
                list_secrets,
                target_engine,
                max_depth,
                no_usage,
                timeout,
                format,
                output,
            })
            .await
        }
        Commands::GenerateCompletion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "vault-inventory", &mut std::io::stdout());
            Ok(())
        }
    }
}
