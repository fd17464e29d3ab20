//! Command implementations for the `vault-inventory` binary.
//!
//! - [`scan`] - Inventory a live Vault cluster and correlate policies with secrets

pub mod scan;
