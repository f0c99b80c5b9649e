//! Chain connector: obtains an authorized account from a wallet provider, on
//! the target test network only.
//!
//! The flow mirrors what wallets expose over JSON-RPC: read the active chain,
//! switch if it differs, add the chain first when the wallet does not know it,
//! then request accounts. Every terminal outcome is classified, a rejected
//! prompt is not the same failure as a wallet that cannot set the network up.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{info, warn};

use crate::{
    address::normalize,
    config::Config,
    error::VoteError,
    provider::{
        CODE_INTERNAL, CODE_UNRECOGNIZED_CHAIN, CODE_USER_REJECTED, Provider, ProviderRegistry,
        RpcError,
    },
};

/// Target network parameters, as sent in a `wallet_addEthereumChain` request.
#[derive(Clone)]
pub struct ChainParams {
    pub chain_id: u64,
    pub chain_id_hex: String,
    pub name: String,
    pub currency_name: String,
    pub currency_symbol: String,
    pub rpc_url: String,
    pub explorer_url: String,
}

impl ChainParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chain_id: config.chain_id,
            chain_id_hex: config.chain_id_hex.clone(),
            name: config.chain_name.clone(),
            currency_name: config.currency_name.clone(),
            currency_symbol: config.currency_symbol.clone(),
            rpc_url: config.rpc_url.clone(),
            explorer_url: config.explorer_url.clone(),
        }
    }

    fn add_chain_payload(&self) -> Value {
        json!({
            "chainId": self.chain_id_hex,
            "chainName": self.name,
            "nativeCurrency": {
                "name": self.currency_name,
                "symbol": self.currency_symbol,
                "decimals": 18,
            },
            "rpcUrls": [self.rpc_url],
            "blockExplorerUrls": [self.explorer_url],
        })
    }

    /// Shown to the user when the wallet could not be set up automatically.
    pub fn manual_setup_instructions(&self) -> String {
        format!(
            "Network Name: {}\nRPC URL: {}\nChain ID: {} ({})\nCurrency Symbol: {}\nBlock Explorer: {}",
            self.name,
            self.rpc_url,
            self.chain_id,
            self.chain_id_hex,
            self.currency_symbol,
            self.explorer_url,
        )
    }
}

/// True if the registry can produce a provider handle for this wallet id.
pub fn is_available(registry: &ProviderRegistry, wallet_id: &str) -> bool {
    registry.is_available(wallet_id)
}

pub struct ChainConnector {
    provider: Arc<dyn Provider>,
    chain: ChainParams,
}

impl ChainConnector {
    pub fn new(provider: Arc<dyn Provider>, chain: ChainParams) -> Self {
        Self { provider, chain }
    }

    /// Resolves a provider for `wallet_id` through the strategy table.
    pub fn from_registry(
        registry: &ProviderRegistry,
        wallet_id: &str,
        chain: ChainParams,
    ) -> Result<Self, VoteError> {
        let provider = registry
            .lookup(wallet_id)
            .ok_or_else(|| VoteError::ProviderUnavailable(wallet_id.to_string()))?;

        Ok(Self::new(provider, chain))
    }

    pub fn provider(&self) -> Arc<dyn Provider> {
        self.provider.clone()
    }

    /// Makes sure the provider is on the target network, switching and adding
    /// the chain as needed.
    pub async fn ensure_target_network(&self) -> Result<(), VoteError> {
        let current = self.current_chain_id().await?;

        if current == self.chain.chain_id {
            return Ok(());
        }

        info!(
            "Current chain {current}, switching to {} ({})",
            self.chain.name, self.chain.chain_id
        );

        match self.switch_chain().await {
            Ok(()) => Ok(()),
            Err(err) if err.code == CODE_USER_REJECTED => Err(VoteError::UserRejected),
            Err(err) if err.code == CODE_UNRECOGNIZED_CHAIN || err.code == CODE_INTERNAL => {
                self.add_then_switch().await
            }
            Err(err) => Err(VoteError::Internal(format!(
                "Failed to switch to the {} network: {}",
                self.chain.name, err.message
            ))),
        }
    }

    /// Requests account access and returns the first account, lowercased.
    pub async fn connect(&self) -> Result<String, VoteError> {
        self.ensure_target_network().await?;

        let response = self
            .provider
            .request("eth_requestAccounts", json!([]))
            .await
            .map_err(|err| {
                if err.code == CODE_USER_REJECTED {
                    VoteError::UserRejected
                } else {
                    VoteError::Internal(err.message)
                }
            })?;

        let accounts: Vec<String> = serde_json::from_value(response).unwrap_or_default();
        let first = accounts.first().ok_or(VoteError::NoAccounts)?;

        normalize(first)
    }

    /// Non-throwing re-detection: already-authorized accounts, or nothing.
    /// Never prompts the user.
    pub async fn check_existing_accounts(&self) -> Vec<String> {
        if let Err(err) = self.ensure_target_network().await {
            warn!("Silent account check skipped: {err}");
            return Vec::new();
        }

        match self.provider.request("eth_accounts", json!([])).await {
            Ok(response) => serde_json::from_value(response).unwrap_or_default(),
            Err(err) => {
                warn!("Silent account check failed: {err}");
                Vec::new()
            }
        }
    }

    async fn current_chain_id(&self) -> Result<u64, VoteError> {
        let response = self
            .provider
            .request("eth_chainId", json!([]))
            .await
            .map_err(|err| VoteError::Internal(err.message))?;

        parse_chain_id(&response)
    }

    async fn switch_chain(&self) -> Result<(), RpcError> {
        self.provider
            .request(
                "wallet_switchEthereumChain",
                json!([{ "chainId": self.chain.chain_id_hex }]),
            )
            .await
            .map(|_| ())
    }

    async fn add_then_switch(&self) -> Result<(), VoteError> {
        info!("Adding the {} network to the wallet", self.chain.name);

        let added = self
            .provider
            .request("wallet_addEthereumChain", json!([self.chain.add_chain_payload()]))
            .await;

        let result = match added {
            Ok(_) => self.switch_chain().await,
            Err(err) => Err(err),
        };

        result.map_err(|err| {
            if err.code == CODE_USER_REJECTED {
                VoteError::UserRejected
            } else {
                VoteError::NetworkSetupFailed {
                    instructions: self.chain.manual_setup_instructions(),
                }
            }
        })
    }
}

/// Chain ids travel as `0x`-prefixed hex strings.
pub(crate) fn parse_chain_id(value: &Value) -> Result<u64, VoteError> {
    value
        .as_str()
        .and_then(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok())
        .ok_or_else(|| VoteError::Internal(format!("Unparseable chain id: {value}")))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    const TARGET_HEX: &str = "0xaa36a7";
    const ACCOUNT: &str = "0x1D1AFC2D015963017BED1DE13E4ED6C3D3ED1618";

    fn chain() -> ChainParams {
        ChainParams {
            chain_id: 11155111,
            chain_id_hex: TARGET_HEX.to_string(),
            name: "Sepolia".to_string(),
            currency_name: "Sepolia Ether".to_string(),
            currency_symbol: "ETH".to_string(),
            rpc_url: "https://rpc.sepolia.org".to_string(),
            explorer_url: "https://sepolia.etherscan.io".to_string(),
        }
    }

    #[derive(Default)]
    struct Scripted {
        chain_id: String,
        accounts: Vec<String>,
        switch_error: Option<RpcError>,
        add_error: Option<RpcError>,
        accounts_error: Option<RpcError>,
        added: Mutex<bool>,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn on_chain(chain_id: &str) -> Self {
            Self {
                chain_id: chain_id.to_string(),
                accounts: vec![ACCOUNT.to_string()],
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Provider for Scripted {
        async fn request(&self, method: &str, _params: Value) -> Result<Value, RpcError> {
            self.calls.lock().unwrap().push(method.to_string());

            match method {
                "eth_chainId" => Ok(json!(self.chain_id)),
                "wallet_switchEthereumChain" => {
                    if *self.added.lock().unwrap() {
                        return Ok(Value::Null);
                    }
                    match &self.switch_error {
                        Some(err) => Err(err.clone()),
                        None => Ok(Value::Null),
                    }
                }
                "wallet_addEthereumChain" => match &self.add_error {
                    Some(err) => Err(err.clone()),
                    None => {
                        *self.added.lock().unwrap() = true;
                        Ok(Value::Null)
                    }
                },
                "eth_requestAccounts" | "eth_accounts" => match &self.accounts_error {
                    Some(err) => Err(err.clone()),
                    None => Ok(json!(self.accounts)),
                },
                other => panic!("unexpected method {other}"),
            }
        }
    }

    fn rejected() -> RpcError {
        RpcError {
            code: CODE_USER_REJECTED,
            message: "User rejected the request".to_string(),
        }
    }

    fn unrecognized() -> RpcError {
        RpcError {
            code: CODE_UNRECOGNIZED_CHAIN,
            message: "Unrecognized chain ID".to_string(),
        }
    }

    #[tokio::test]
    async fn connect_on_target_network_skips_switching() {
        let provider = Arc::new(Scripted::on_chain(TARGET_HEX));
        let connector = ChainConnector::new(provider.clone(), chain());

        let address = connector.connect().await.unwrap();

        assert_eq!(address, ACCOUNT.to_lowercase());
        assert!(!provider.calls().contains(&"wallet_switchEthereumChain".to_string()));
    }

    #[tokio::test]
    async fn connect_switches_when_on_wrong_chain() {
        let provider = Arc::new(Scripted::on_chain("0x1"));
        let connector = ChainConnector::new(provider.clone(), chain());

        connector.connect().await.unwrap();

        assert!(provider.calls().contains(&"wallet_switchEthereumChain".to_string()));
        assert!(!provider.calls().contains(&"wallet_addEthereumChain".to_string()));
    }

    #[tokio::test]
    async fn unrecognized_chain_is_added_then_switch_retried() {
        let provider = Arc::new(Scripted {
            switch_error: Some(unrecognized()),
            ..Scripted::on_chain("0x1")
        });
        let connector = ChainConnector::new(provider.clone(), chain());

        connector.connect().await.unwrap();

        let calls = provider.calls();
        assert!(calls.contains(&"wallet_addEthereumChain".to_string()));
        assert_eq!(
            calls.iter().filter(|c| *c == "wallet_switchEthereumChain").count(),
            2
        );
    }

    #[tokio::test]
    async fn rejected_switch_is_user_rejected() {
        let provider = Arc::new(Scripted {
            switch_error: Some(rejected()),
            ..Scripted::on_chain("0x1")
        });
        let connector = ChainConnector::new(provider, chain());

        assert!(matches!(
            connector.connect().await,
            Err(VoteError::UserRejected)
        ));
    }

    #[tokio::test]
    async fn failed_add_carries_manual_instructions() {
        let provider = Arc::new(Scripted {
            switch_error: Some(unrecognized()),
            add_error: Some(RpcError::transport("wallet exploded")),
            ..Scripted::on_chain("0x1")
        });
        let connector = ChainConnector::new(provider, chain());

        match connector.connect().await {
            Err(VoteError::NetworkSetupFailed { instructions }) => {
                assert!(instructions.contains("https://rpc.sepolia.org"));
                assert!(instructions.contains("Sepolia"));
                assert!(instructions.contains("11155111"));
            }
            other => panic!("expected NetworkSetupFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejected_account_request_is_user_rejected() {
        let provider = Arc::new(Scripted {
            accounts_error: Some(rejected()),
            ..Scripted::on_chain(TARGET_HEX)
        });
        let connector = ChainConnector::new(provider, chain());

        assert!(matches!(
            connector.connect().await,
            Err(VoteError::UserRejected)
        ));
    }

    #[tokio::test]
    async fn empty_account_list_fails() {
        let provider = Arc::new(Scripted {
            accounts: Vec::new(),
            ..Scripted::on_chain(TARGET_HEX)
        });
        let connector = ChainConnector::new(provider, chain());

        assert!(matches!(
            connector.connect().await,
            Err(VoteError::NoAccounts)
        ));
    }

    #[tokio::test]
    async fn silent_check_swallows_errors() {
        let provider = Arc::new(Scripted {
            accounts_error: Some(RpcError::transport("offline")),
            ..Scripted::on_chain(TARGET_HEX)
        });
        let connector = ChainConnector::new(provider, chain());

        assert!(connector.check_existing_accounts().await.is_empty());
    }

    #[test]
    fn unavailable_wallet_id_fails() {
        let registry = ProviderRegistry::new();

        assert!(matches!(
            ChainConnector::from_registry(&registry, "metamask", chain()),
            Err(VoteError::ProviderUnavailable(_))
        ));
        assert!(!is_available(&registry, "metamask"));
    }
}
