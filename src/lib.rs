//! # Vault Inventory
//!
//! Concurrent inventory and access-correlation auditing for `HashiCorp Vault`.
//!
//! ## Overview
//!
//! This crate walks a running Vault cluster read-only and builds a
//! cross-referenced inventory: which namespaces, auth mounts, secrets engines,
//! identity entities and ACL policies exist, which KV secrets live in each
//! engine, and which policies (and the auth roles holding them) grant access
//! to every secret.
//!
//! ## Features
//!
//! - **Bounded concurrency** - one task per namespace, mount, entity, policy
//!   and tree branch, with a global cap on API calls in flight
//! - **Partial failure tolerance** - permission errors and malformed responses
//!   are recorded per namespace and never abort the scan
//! - **Deterministic output** - an unchanged cluster always produces the same
//!   inventory, byte for byte
//! - **Root policy inheritance** - root-namespace policies are matched against
//!   every namespace and marked `"<name> (root)"`
//! - **KV v1 and v2** - v2 metadata (version, timestamps) without ever reading
//!   secret values
//! - **JSON and CSV output**, shell completion for bash, zsh, fish, powershell
//!   and elvish
//!
//! ## Architecture
//!
//! - [`inventory`] - Discovery, scanning and correlation engine
//! - [`commands`] - CLI command implementations
//! - [`utils`] - Shared utilities (progress, formatting, time parsing)
//! - [`vault_api`] - Vault API capability and HTTP client
//!
//! ## Example Usage
//!
//! ```bash
//! # Everything except secrets, as JSON on stdout
//! vault-inventory scan
//!
//! # Include KV secrets and write the per-secret CSV
//! vault-inventory scan --list-secrets --format csv -o secrets.csv
//!
//! # Walk one engine, giving up after five minutes
//! vault-inventory scan --list-secrets --target-engine root/secret --timeout 300
//! ```

pub mod commands;
pub mod inventory;
pub mod utils;
pub mod vault_api;
