//! Maker Signature Verification
//!
//! An intent is authorized by an EIP-191 personal-sign signature over the
//! canonical payload. The canonical form is sorted-keys JSON with no
//! whitespace so the engine and the client agree byte-for-byte.

use ethers::types::Signature;
use rust_decimal::Decimal;

use crate::error::EngineError;
use crate::models::{OrderParams, OrderType};

/// Deterministic textual encoding of the signed intent fields.
///
/// Key order is fixed by serde_json's sorted maps:
/// `maker, makerAsset, params, size, takerAsset, type`.
pub fn canonical_payload(
    order_type: OrderType,
    size: Decimal,
    params: &OrderParams,
    maker: &str,
    maker_asset: &str,
    taker_asset: &str,
) -> Result<String, EngineError> {
    let value = serde_json::json!({
        "maker": maker.to_lowercase(),
        "makerAsset": maker_asset.to_lowercase(),
        "params": params,
        "size": size,
        "takerAsset": taker_asset.to_lowercase(),
        "type": order_type,
    });

    serde_json::to_string(&value)
        .map_err(|e| EngineError::InvalidParams(format!("payload encoding: {}", e)))
}

/// Recover the personal-sign signer of `payload` and compare to `maker`
/// case-insensitively.
pub fn verify_order_signature(
    payload: &str,
    signature: &str,
    maker: &str,
) -> Result<(), EngineError> {
    let signature: Signature = signature
        .parse()
        .map_err(|_| EngineError::SignatureInvalid)?;

    let recovered = signature
        .recover(payload)
        .map_err(|_| EngineError::SignatureInvalid)?;

    let recovered = format!("{:#x}", recovered);
    if recovered.eq_ignore_ascii_case(maker) {
        Ok(())
    } else {
        tracing::warn!(
            recovered = %recovered,
            expected = %maker,
            "order signature recovered to a different address"
        );
        Err(EngineError::SignatureInvalid)
    }
}
