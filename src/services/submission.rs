//! Limit-Order Submission Client
//!
//! Builds, signs and submits one concrete child order per trigger against
//! the upstream orderbook. Amounts are scaled by on-chain token decimals
//! (RPC lookup, TTL-cached through the store); the child struct is
//! keccak-hashed for its order hash and signed by the operator key. The
//! engine treats the returned hash as opaque.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::H256;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::EngineError;
use crate::models::Order;
use crate::store::OrderStore;

/// Decimals cache entries live for a day; token decimals are immutable in
/// practice but the cache may be dropped at any time.
const DECIMALS_TTL_MS: i64 = 86_400_000;

/// Concrete limit order submitted upstream on behalf of a parent order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildOrder {
    pub salt: String,
    pub maker: String,
    pub receiver: String,
    pub maker_asset: String,
    pub taker_asset: String,
    /// Integer base-unit amounts, decimal strings
    pub making_amount: String,
    pub taking_amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<i64>,
    pub signature: String,
}

#[async_trait]
pub trait SubmissionClient: Send + Sync {
    /// Build, sign and submit one child order; returns its order hash
    async fn submit(
        &self,
        order: &Order,
        making_amount: Decimal,
        limit_price: Decimal,
    ) -> Result<String, EngineError>;

    /// Cancel a previously submitted child by hash
    async fn cancel(&self, order_hash: &str) -> Result<(), EngineError>;
}

pub struct OneInchClient {
    http: reqwest::Client,
    wallet: LocalWallet,
    api_url: String,
    store: Arc<dyn OrderStore>,
    config: AppConfig,
    timeout: Duration,
}

impl OneInchClient {
    pub fn new(config: AppConfig, store: Arc<dyn OrderStore>) -> Result<Self, EngineError> {
        let key = config.operator_private_key.trim_start_matches("0x");
        let wallet: LocalWallet = key
            .parse()
            .map_err(|_| EngineError::InvalidParams("bad operator private key".to_string()))?;

        Ok(Self {
            http: reqwest::Client::new(),
            wallet,
            api_url: config.oneinch_api_url.trim_end_matches('/').to_string(),
            store,
            timeout: config.submit_timeout(),
            config,
        })
    }

    pub fn operator_address(&self) -> String {
        format!("{:#x}", self.wallet.address())
    }

    /// Token decimals, served from the TTL cache with an RPC fallback
    async fn token_decimals(&self, chain_id: i64, token: &str) -> Result<u32, EngineError> {
        if let Some(decimals) = self
            .store
            .cached_token_decimals(chain_id, token, DECIMALS_TTL_MS)
            .await?
        {
            return Ok(decimals);
        }

        let decimals = self.fetch_decimals(chain_id, token).await?;
        if let Err(e) = self
            .store
            .cache_token_decimals(chain_id, token, decimals)
            .await
        {
            tracing::warn!(token = %token, "failed to cache token decimals: {}", e);
        }
        Ok(decimals)
    }

    /// `decimals()` eth_call against the chain's RPC endpoint
    async fn fetch_decimals(&self, chain_id: i64, token: &str) -> Result<u32, EngineError> {
        #[derive(Deserialize)]
        struct RpcResponse {
            result: Option<String>,
            error: Option<serde_json::Value>,
        }

        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [{"to": token, "data": "0x313ce567"}, "latest"],
        });

        let url = self.config.rpc_url_for(chain_id);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| EngineError::Submission(format!("decimals rpc: {}", e)))?
            .json::<RpcResponse>()
            .await
            .map_err(|e| EngineError::Submission(format!("decimals rpc decode: {}", e)))?;

        if let Some(err) = response.error {
            return Err(EngineError::Submission(format!("decimals rpc error: {}", err)));
        }

        let raw = response
            .result
            .ok_or_else(|| EngineError::Submission("decimals rpc: empty result".to_string()))?;
        let trimmed = raw.trim_start_matches("0x").trim_start_matches('0');
        let decimals = if trimmed.is_empty() {
            0
        } else {
            u32::from_str_radix(trimmed, 16)
                .map_err(|e| EngineError::Submission(format!("decimals parse: {}", e)))?
        };
        Ok(decimals)
    }

    fn order_hash(child: &ChildOrder) -> String {
        let mut hasher = Keccak256::new();
        hasher.update(child.salt.as_bytes());
        hasher.update(child.maker.as_bytes());
        hasher.update(child.maker_asset.as_bytes());
        hasher.update(child.taker_asset.as_bytes());
        hasher.update(child.making_amount.as_bytes());
        hasher.update(child.taking_amount.as_bytes());
        format!("0x{}", hex::encode(hasher.finalize()))
    }

    fn sign_hash(&self, order_hash: &str) -> Result<String, EngineError> {
        let bytes = hex::decode(order_hash.trim_start_matches("0x"))
            .map_err(|e| EngineError::Submission(format!("hash decode: {}", e)))?;
        let hash = H256::from_slice(&bytes);
        let signature = self
            .wallet
            .sign_hash(hash)
            .map_err(|e| EngineError::Submission(format!("operator signing: {}", e)))?;
        Ok(format!("0x{}", signature))
    }
}

/// Scale a human-unit amount to integer base units
pub fn to_base_units(amount: Decimal, decimals: u32) -> Result<String, EngineError> {
    let factor = Decimal::from_i128_with_scale(10i128.pow(decimals.min(28)), 0);
    let scaled = (amount * factor).trunc();
    if scaled.is_sign_negative() {
        return Err(EngineError::InvalidParams("negative amount".to_string()));
    }
    Ok(scaled.normalize().to_string())
}

#[async_trait]
impl SubmissionClient for OneInchClient {
    async fn submit(
        &self,
        order: &Order,
        making_amount: Decimal,
        limit_price: Decimal,
    ) -> Result<String, EngineError> {
        if making_amount <= Decimal::ZERO {
            return Err(EngineError::InvalidParams("zero child amount".to_string()));
        }

        let maker_decimals = self
            .token_decimals(order.chain_id, &order.maker_asset)
            .await?;
        let taker_decimals = self
            .token_decimals(order.chain_id, &order.taker_asset)
            .await?;

        let salt: u128 = rand::thread_rng().gen();
        let mut child = ChildOrder {
            salt: salt.to_string(),
            maker: self.operator_address(),
            receiver: order.maker.clone(),
            maker_asset: order.maker_asset.to_lowercase(),
            taker_asset: order.taker_asset.to_lowercase(),
            making_amount: to_base_units(making_amount, maker_decimals)?,
            taking_amount: to_base_units(making_amount * limit_price, taker_decimals)?,
            expiry: None,
            signature: String::new(),
        };

        let order_hash = Self::order_hash(&child);
        child.signature = self.sign_hash(&order_hash)?;

        let url = format!("{}/{}", self.api_url, order.chain_id);
        let send = self.http.post(&url).json(&child).send();

        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| EngineError::Submission("timeout".to_string()))?
            .map_err(|e| EngineError::Submission(format!("orderbook post: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Submission(format!(
                "orderbook rejected ({}): {}",
                status, body
            )));
        }

        tracing::info!(
            order_id = %order.id,
            order_hash = %order_hash,
            making_amount = %making_amount,
            limit_price = %limit_price,
            "child order submitted"
        );

        Ok(order_hash)
    }

    async fn cancel(&self, order_hash: &str) -> Result<(), EngineError> {
        let url = format!("{}/order/{}", self.api_url, order_hash);
        let send = self.http.delete(&url).send();

        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| EngineError::Submission("timeout".to_string()))?
            .map_err(|e| EngineError::Submission(format!("orderbook cancel: {}", e)))?;

        if !response.status().is_success() {
            return Err(EngineError::Submission(format!(
                "cancel rejected ({})",
                response.status()
            )));
        }

        tracing::info!(order_hash = %order_hash, "child order cancelled");
        Ok(())
    }
}

/// Recording client used by tests and dry runs: returns deterministic
/// hashes and never talks to the network.
#[derive(Default)]
pub struct MockSubmissionClient {
    calls: std::sync::Mutex<Vec<MockSubmission>>,
    cancelled: std::sync::Mutex<Vec<String>>,
    fail_with: std::sync::Mutex<Option<String>>,
}

#[derive(Debug, Clone)]
pub struct MockSubmission {
    pub order_id: Uuid,
    pub making_amount: Decimal,
    pub limit_price: Decimal,
    pub order_hash: String,
}

impl MockSubmissionClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submissions(&self) -> Vec<MockSubmission> {
        self.calls.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    /// Make every subsequent submit fail with the given reason
    pub fn fail_with(&self, reason: &str) {
        *self.fail_with.lock().unwrap() = Some(reason.to_string());
    }
}

#[async_trait]
impl SubmissionClient for MockSubmissionClient {
    async fn submit(
        &self,
        order: &Order,
        making_amount: Decimal,
        limit_price: Decimal,
    ) -> Result<String, EngineError> {
        if let Some(reason) = self.fail_with.lock().unwrap().clone() {
            return Err(EngineError::Submission(reason));
        }

        let mut calls = self.calls.lock().unwrap();
        let order_hash = format!("0xchild{:04}{}", calls.len() + 1, &order.id.simple());
        calls.push(MockSubmission {
            order_id: order.id,
            making_amount,
            limit_price,
            order_hash: order_hash.clone(),
        });
        Ok(order_hash)
    }

    async fn cancel(&self, order_hash: &str) -> Result<(), EngineError> {
        self.cancelled.lock().unwrap().push(order_hash.to_string());
        Ok(())
    }
}
