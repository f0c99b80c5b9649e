use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

/// Runtime configuration, environment-provided with test-network defaults.
///
/// Addresses are lowercased at load time so every later comparison is a plain
/// string equality.
pub struct Config {
    pub port: u16,
    pub chain_id: u64,
    pub chain_id_hex: String,
    pub chain_name: String,
    pub currency_name: String,
    pub currency_symbol: String,
    pub rpc_url: String,
    pub explorer_url: String,
    pub contract_address: String,
    pub admin_address: String,
    pub secure_cookies: bool,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("RUST_PORT", "3000"),
            chain_id: try_load("CHAIN_ID", "11155111"),
            chain_id_hex: try_load("CHAIN_ID_HEX", "0xaa36a7"),
            chain_name: try_load("CHAIN_NAME", "Sepolia"),
            currency_name: try_load("CURRENCY_NAME", "Sepolia Ether"),
            currency_symbol: try_load("CURRENCY_SYMBOL", "ETH"),
            rpc_url: try_load("RPC_URL", "https://rpc.sepolia.org"),
            explorer_url: try_load("EXPLORER_URL", "https://sepolia.etherscan.io"),
            contract_address: try_load::<String>(
                "VOTING_CONTRACT_ADDRESS",
                "0xee35Da4E3a9a734b0a5227c99E361c1fDF9B3E5B",
            )
            .to_lowercase(),
            admin_address: try_load::<String>(
                "ADMIN_ADDRESS",
                "0x1d1afc2d015963017bed1de13e4ed6c3d3ed1618",
            )
            .to_lowercase(),
            secure_cookies: try_load("COOKIE_SECURE", "true"),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
