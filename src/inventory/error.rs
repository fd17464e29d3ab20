//! Error taxonomy for the inventory scan.
//!
//! Every failure below the namespace listing is recorded, not raised: scanners
//! return their `ScanError`s next to whatever they collected and the scanner
//! folds them into the owning namespace's `errors` array.

use crate::vault_api::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// Remote enumeration (LIST) failed.
    #[error("error listing path {path}: {source}")]
    List {
        path: String,
        #[source]
        source: RemoteError,
    },

    /// Remote detail fetch (READ) failed.
    #[error("error reading path {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: RemoteError,
    },

    /// The response did not have the expected shape.
    #[error("malformed response at path {path}: {detail}")]
    MalformedResponse { path: String, detail: String },

    /// A unit of work panicked and was isolated from its siblings.
    #[error("internal fault in unit {index}: {message}")]
    InternalFault { index: usize, message: String },

    /// Admission was refused because the scan was cancelled.
    #[error("scan cancelled before {path} completed")]
    Cancelled { path: String },

    /// The secret tree walker hit its recursion guard.
    #[error("maximum depth {max_depth} exceeded at path {path}")]
    DepthExceeded { path: String, max_depth: usize },
}

impl ScanError {
    pub fn malformed(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedResponse {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// True for remote 404s, which Vault returns for empty listings.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::List { source, .. } | Self::Read { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

/// Render errors in the order they were collected, as the inventory stores them.
pub fn render_errors(errors: &[ScanError]) -> Vec<String> {
    errors.iter().map(ToString::to_string).collect()
}
