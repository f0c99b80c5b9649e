//! JSON-RPC provider seam between the application and a wallet or RPC node.
//!
//! Wallet kinds differ only in where the provider handle comes from, so the
//! lookup lives in a small strategy table ([`ProviderRegistry`]) keyed by
//! wallet id. Callers receive an `Arc<dyn Provider>` and own it for the
//! lifetime of a connection; there is no module-level provider singleton.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;
#[cfg(feature = "verbose")]
use tracing::info;

use crate::config::Config;

/// Standard wallet error code for a user-rejected prompt.
pub const CODE_USER_REJECTED: i64 = 4001;
/// Chain not known to the wallet, an add-chain request is needed.
pub const CODE_UNRECOGNIZED_CHAIN: i64 = 4902;
/// Some wallets report an unrecognized chain as an internal error instead.
pub const CODE_INTERNAL: i64 = -32603;

const CODE_TRANSPORT: i64 = -32000;

#[derive(Error, Debug, Clone)]
#[error("RPC error {code}: {message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            code: CODE_TRANSPORT,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait Provider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError>;

    /// Best-effort teardown, called when a connection is released.
    async fn disconnect(&self) {}
}

/// Provider over plain HTTP JSON-RPC, the remote (WalletConnect-style) kind.
pub struct HttpProvider {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpProvider {
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl Provider for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        #[cfg(feature = "verbose")]
        info!("RPC request {method}: {body}");

        let response: Value = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| RpcError::transport(e.to_string()))?;

        if let Some(error) = response.get("error") {
            return Err(RpcError {
                code: error.get("code").and_then(Value::as_i64).unwrap_or(CODE_TRANSPORT),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown RPC error")
                    .to_string(),
            });
        }

        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }
}

pub type ProviderLookup = Box<dyn Fn() -> Option<Arc<dyn Provider>> + Send + Sync>;

/// Strategy table mapping a wallet id to a provider lookup.
///
/// Lookups return `None` when that wallet kind is not reachable from this
/// process, which keeps new wallet kinds a one-line registration instead of
/// branching logic in callers.
#[derive(Default)]
pub struct ProviderRegistry {
    entries: Vec<(String, ProviderLookup)>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the wallet kinds the original deployment knows about. The
    /// injected kinds (browser-extension wallets) have no handle in a server
    /// process, so their lookups resolve to `None`; the remote kind serves
    /// everything else, including the default id.
    pub fn with_defaults(config: &Config) -> Self {
        let remote: Arc<dyn Provider> = Arc::new(HttpProvider::new(&config.rpc_url));
        let mut registry = Self::new();

        for id in ["metamask", "okx"] {
            registry.register(id, || None);
        }
        for id in ["walletconnect", "default"] {
            let handle = remote.clone();
            registry.register(id, move || Some(handle.clone()));
        }

        registry
    }

    pub fn register<F>(&mut self, id: &str, lookup: F)
    where
        F: Fn() -> Option<Arc<dyn Provider>> + Send + Sync + 'static,
    {
        self.entries.push((id.to_string(), Box::new(lookup)));
    }

    /// Resolves a wallet id, falling back to the `default` entry for ids the
    /// table does not name.
    pub fn lookup(&self, wallet_id: &str) -> Option<Arc<dyn Provider>> {
        self.entries
            .iter()
            .find(|(id, _)| id == wallet_id)
            .or_else(|| self.entries.iter().find(|(id, _)| id == "default"))
            .and_then(|(_, lookup)| lookup())
    }

    pub fn is_available(&self, wallet_id: &str) -> bool {
        self.lookup(wallet_id).is_some()
    }
}
