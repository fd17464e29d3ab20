//! Vault inventory engine.
//!
//! Discovers namespaces, auth mounts, secrets engines, identity entities and
//! ACL policies, walks KV secret trees, and correlates policy path patterns
//! with the secrets they reach.
//!
//! Every remote call goes through a shared [`admission::AdmissionController`],
//! so the number of calls in flight never exceeds the configured limit no
//! matter how deeply the scan fans out. Failures below the namespace listing
//! are recorded on the owning namespace and never abort the scan.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use vault_inventory::inventory::scanner::{scan, ScanConfig};
//! use vault_inventory::vault_api::VaultClient;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = VaultClient::new("http://127.0.0.1:8200".into(), "hvs.token".into())?;
//! let mut config = ScanConfig::new(10)?;
//! config.list_secrets = true;
//!
//! let inventory = scan(Arc::new(client), config, CancellationToken::new()).await?;
//! for (namespace, _engine, secret) in inventory.secrets() {
//!     println!("{} {} {:?}", namespace.name, secret.path, secret.policies);
//! }
//! # Ok(())
//! # }
//! ```

pub mod admission;
pub mod auths;
pub mod correlate;
pub mod entities;
pub mod error;
pub mod mounts;
pub mod paths;
pub mod policies;
pub mod remote;
pub mod scanner;
pub mod secrets;
pub mod types;
pub mod usage;

pub use error::ScanError;
pub use scanner::{scan, ScanConfig, Scanner, TargetEngine};
pub use types::VaultInventory;
