//! Vault API access.
//!
//! The inventory engine talks to Vault only through the [`VaultBackend`]
//! capability: a namespace-scoped `list` and `read`. [`VaultClient`] is the
//! HTTP implementation used by the CLI; tests substitute in-memory fakes.

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::env;
use std::fs;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Namespace header understood by Vault Enterprise.
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Failure of a single remote call.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("failed to send request to {path}: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Vault API request to {path} failed with status {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    #[error("failed to parse JSON response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RemoteError {
    /// True when Vault answered 404, which LIST uses for "nothing here".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status == StatusCode::NOT_FOUND.as_u16())
    }
}

/// Namespace-scoped read-only access to a Vault cluster.
///
/// Both operations return the `data` object of the Vault response. Shape
/// checking (for example that a listing carries `keys`) is left to callers.
pub trait VaultBackend: Send + Sync + 'static {
    fn list(
        &self,
        namespace: &str,
        path: &str,
    ) -> impl Future<Output = Result<Value, RemoteError>> + Send;

    fn read(
        &self,
        namespace: &str,
        path: &str,
    ) -> impl Future<Output = Result<Value, RemoteError>> + Send;
}

/// Check if TLS verification should be skipped based on environment or flag
pub fn should_skip_verify(insecure_flag: bool) -> bool {
    if insecure_flag {
        return true;
    }

    env::var("VAULT_SKIP_VERIFY")
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Transport options for [`VaultClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub skip_verify: bool,
    pub timeout: Duration,
    /// Maximum requests per second across all tasks sharing the client.
    pub rate_limit: Option<u32>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            skip_verify: false,
            timeout: Duration::from_secs(10),
            rate_limit: None,
        }
    }
}

/// Vault HTTP client
#[derive(Debug, Clone)]
pub struct VaultClient {
    addr: String,
    token: String,
    client: Client,
    min_interval: Option<Duration>,
    next_slot: Arc<Mutex<Option<Instant>>>,
}

impl VaultClient {
    /// Create a new Vault client from address and token
    pub fn new(addr: String, token: String) -> Result<Self> {
        Self::with_options(addr, token, &ClientOptions::default())
    }

    /// Create a new Vault client with explicit transport options
    pub fn with_options(addr: String, token: String, options: &ClientOptions) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(options.skip_verify)
            .timeout(options.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let min_interval = options
            .rate_limit
            .filter(|rps| *rps > 0)
            .map(|rps| Duration::from_secs(1) / rps);

        Ok(Self {
            addr: addr.trim_end_matches('/').to_string(),
            token,
            client,
            min_interval,
            next_slot: Arc::new(Mutex::new(None)),
        })
    }

    /// Create a client with optional parameters (for CLI), falling back to
    /// `VAULT_ADDR`, `VAULT_TOKEN` and `VAULT_TOKEN_FILE`.
    pub fn from_options(
        vault_addr: Option<&str>,
        vault_token: Option<&str>,
        options: &ClientOptions,
    ) -> Result<Self> {
        let addr = vault_addr
            .map(|s| s.to_string())
            .or_else(|| env::var("VAULT_ADDR").ok())
            .unwrap_or_else(|| "http://127.0.0.1:8200".to_string());

        let token = if let Some(t) = vault_token {
            t.to_string()
        } else if let Ok(t) = env::var("VAULT_TOKEN") {
            t
        } else if let Ok(token_file) = env::var("VAULT_TOKEN_FILE") {
            fs::read_to_string(&token_file)
                .with_context(|| format!("Failed to read token from file: {}", token_file))?
                .trim()
                .to_string()
        } else {
            return Err(anyhow!(
                "VAULT_TOKEN or VAULT_TOKEN_FILE must be set. Provide a token via:\n\
                 - Command-line: --vault-token hvs.xxxxx\n\
                 - Environment variable: export VAULT_TOKEN=hvs.xxxxx\n\
                 - Token file: export VAULT_TOKEN_FILE=/path/to/token"
            ));
        };

        Self::with_options(addr, token, options)
    }

    /// Get the Vault address
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Space requests out to honour the configured rate limit.
    async fn throttle(&self) {
        let Some(gap) = self.min_interval else {
            return;
        };
        let at = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let at = next.map_or(now, |n| n.max(now));
            *next = Some(at + gap);
            at
        };
        tokio::time::sleep_until(at).await;
    }

    async fn get_data(&self, namespace: &str, path: &str, list: bool) -> Result<Value, RemoteError> {
        self.throttle().await;

        let path = path.trim_start_matches('/');
        let url = if list {
            format!("{}/v1/{}?list=true", self.addr, path)
        } else {
            format!("{}/v1/{}", self.addr, path)
        };

        tracing::debug!(namespace, path, list, "vault request");

        let mut request = self.client.get(&url).header("X-Vault-Token", &self.token);
        if !namespace.is_empty() && namespace != "root" {
            request = request.header(NAMESPACE_HEADER, namespace);
        }

        let response = request.send().await.map_err(|source| RemoteError::Transport {
            path: path.to_string(),
            source,
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| RemoteError::Transport {
                path: path.to_string(),
                source,
            })?;

        if !status.is_success() {
            return Err(RemoteError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = serde_json::from_str(&body).map_err(|source| RemoteError::Decode {
            path: path.to_string(),
            source,
        })?;

        Ok(extract_data(value))
    }
}

impl VaultBackend for VaultClient {
    async fn list(&self, namespace: &str, path: &str) -> Result<Value, RemoteError> {
        self.get_data(namespace, path, true).await
    }

    async fn read(&self, namespace: &str, path: &str) -> Result<Value, RemoteError> {
        self.get_data(namespace, path, false).await
    }
}

/// Helper to unwrap the `data` object from a Vault response wrapper
pub fn extract_data(mut value: Value) -> Value {
    match value.get_mut("data").map(Value::take) {
        Some(data) if !data.is_null() => data,
        _ => value,
    }
}
