//! Application Configuration
//!
//! All settings come from the environment (optionally via `.env`). The
//! engine recognizes: the operator signing key, per-chain RPC endpoints,
//! the orderbook API endpoint, poll interval, database URL, and the
//! price staleness threshold.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Postgres connection string
    pub database_url: String,

    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Default chain for orders that do not declare one
    #[serde(default = "default_chain_id")]
    pub chain_id: i64,

    /// JSON-RPC endpoint for the default chain
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Additional per-chain RPC endpoints, `chainId=url` comma-separated
    #[serde(default)]
    pub extra_rpc_urls: String,

    /// Orderbook REST endpoint child orders are submitted to
    #[serde(default = "default_oneinch_api_url")]
    pub oneinch_api_url: String,

    /// Operator key used to sign child orders (hex, no 0x prefix required)
    pub operator_private_key: String,

    /// Watcher polling interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum ticker age a trigger may fire on, milliseconds
    #[serde(default = "default_staleness_threshold_ms")]
    pub staleness_threshold_ms: i64,

    /// Submission deadline in milliseconds
    #[serde(default = "default_submit_timeout_ms")]
    pub submit_timeout_ms: u64,

    /// Token address to ticker-symbol mapping, `0xaddr=SYMBOL` comma-separated
    #[serde(default = "default_token_symbols")]
    pub token_symbols: String,
}

fn default_port() -> u16 {
    8080
}

fn default_chain_id() -> i64 {
    1
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_oneinch_api_url() -> String {
    "https://api.1inch.dev/orderbook/v4.0".to_string()
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_staleness_threshold_ms() -> i64 {
    60_000
}

fn default_submit_timeout_ms() -> u64 {
    30_000
}

fn default_token_symbols() -> String {
    concat!(
        "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2=ETH,",
        "0x2260fac5e5542a773aa44fbcfedf7c193bc2c599=BTC,",
        "0xdac17f958d2ee523a2206206994597c13d831ec7=USDT,",
        "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48=USDC"
    )
    .to_string()
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;
        cfg.try_deserialize()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    /// RPC endpoint for a chain; falls back to the default chain endpoint
    pub fn rpc_url_for(&self, chain_id: i64) -> String {
        if chain_id == self.chain_id {
            return self.rpc_url.clone();
        }
        parse_kv_list(&self.extra_rpc_urls)
            .get(&chain_id.to_string())
            .cloned()
            .unwrap_or_else(|| self.rpc_url.clone())
    }

    /// Lowercased token-address → ticker-symbol map
    pub fn token_symbol_map(&self) -> HashMap<String, String> {
        parse_kv_list(&self.token_symbols)
    }
}

fn parse_kv_list(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            let k = k.trim().to_lowercase();
            let v = v.trim().to_string();
            if k.is_empty() || v.is_empty() {
                None
            } else {
                Some((k, v))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kv_list() {
        let map = parse_kv_list("0xAbC=ETH, 0xdef=USDT");
        assert_eq!(map.get("0xabc").map(String::as_str), Some("ETH"));
        assert_eq!(map.get("0xdef").map(String::as_str), Some("USDT"));
        assert!(parse_kv_list("").is_empty());
        assert!(parse_kv_list("garbage").is_empty());
    }

    #[test]
    fn test_rpc_fallback() {
        let cfg = AppConfig {
            database_url: "postgres://localhost/oneedge".to_string(),
            port: 8080,
            chain_id: 1,
            rpc_url: "http://mainnet".to_string(),
            extra_rpc_urls: "137=http://polygon".to_string(),
            oneinch_api_url: default_oneinch_api_url(),
            operator_private_key: "00".repeat(32),
            poll_interval_ms: 5_000,
            staleness_threshold_ms: 60_000,
            submit_timeout_ms: 30_000,
            token_symbols: default_token_symbols(),
        };
        assert_eq!(cfg.rpc_url_for(1), "http://mainnet");
        assert_eq!(cfg.rpc_url_for(137), "http://polygon");
        assert_eq!(cfg.rpc_url_for(42161), "http://mainnet");
    }

    #[test]
    fn test_default_token_map_covers_majors() {
        let cfg_map = parse_kv_list(&default_token_symbols());
        assert_eq!(
            cfg_map
                .get("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2")
                .map(String::as_str),
            Some("ETH")
        );
        assert_eq!(cfg_map.len(), 4);
    }
}
