//! x402 Payment Signing
//!
//! Turns the payment challenge from an HTTP 402 mint response into a signed
//! EIP-712 TransferWithAuthorization envelope, base64-encoded for the
//! `X-Payment` request header. USDC amounts use 6 decimals.

use std::collections::HashMap;
use std::sync::LazyLock;

use alloy::primitives::{keccak256, Address, FixedBytes, U256};
use alloy::signers::Signer;
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::PaymentChallenge;

/// Header the signed payment envelope travels in on the retried request.
pub const PAYMENT_HEADER: &str = "X-Payment";

/// USDC contract addresses by CAIP-2 network identifier, used when a
/// challenge omits its own `usdcAddress`.
static USDC_ADDRESSES: LazyLock<HashMap<&'static str, Address>> = LazyLock::new(|| {
    let mut m = HashMap::new();
    // Base mainnet
    m.insert(
        "eip155:8453",
        "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"
            .parse::<Address>()
            .unwrap(),
    );
    // Base Sepolia
    m.insert(
        "eip155:84532",
        "0x036CbD53842c5426634e7929541eC2318f3dCF7e"
            .parse::<Address>()
            .unwrap(),
    );
    m
});

// ─── Wire envelope ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct X402Payment {
    #[serde(rename = "x402Version")]
    x402_version: u32,
    scheme: String,
    network: String,
    payload: X402PaymentPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct X402PaymentPayload {
    signature: String,
    authorization: X402Authorization,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct X402Authorization {
    from: String,
    to: String,
    value: String,
    #[serde(rename = "validAfter")]
    valid_after: String,
    #[serde(rename = "validBefore")]
    valid_before: String,
    nonce: String,
}

// ─── Public API ──────────────────────────────────────────────────

/// Parse a payment challenge out of a 402 response body.
///
/// Accepts either the flat challenge object or the x402 `accepts[0]`
/// envelope. Returns `None` when neither shape is present.
pub fn parse_challenge(body: &Value) -> Option<PaymentChallenge> {
    let source = match body.get("accepts").and_then(|a| a.get(0)) {
        Some(accept) => accept,
        None => body,
    };

    let network = source["network"].as_str().unwrap_or("eip155:8453");
    let default_usdc = USDC_ADDRESSES
        .get(network)
        .or_else(|| USDC_ADDRESSES.get("eip155:8453"))
        .map(|a| format!("{:?}", a))
        .unwrap_or_default();

    let pay_to = source["payToAddress"].as_str()?;

    Some(PaymentChallenge {
        scheme: source["scheme"].as_str().unwrap_or("exact").to_string(),
        network: network.to_string(),
        max_amount_required: source["maxAmountRequired"]
            .as_str()
            .unwrap_or("0")
            .to_string(),
        pay_to_address: pay_to.to_string(),
        usdc_address: source["usdcAddress"]
            .as_str()
            .map(|s| s.to_string())
            .unwrap_or(default_usdc),
        required_deadline_seconds: source["requiredDeadlineSeconds"].as_u64().unwrap_or(300),
    })
}

/// Sign a payment challenge and return the base64 `X-Payment` header value.
///
/// Constructs the EIP-712 TransferWithAuthorization typed data for the
/// challenge's USDC contract, signs its digest, and wraps the signature in
/// the x402 payment envelope.
pub async fn sign_challenge<S: Signer + Send + Sync>(
    signer: &S,
    challenge: &PaymentChallenge,
) -> Result<String> {
    // Random 32-byte nonce, never reused across authorizations.
    let mut nonce_bytes = [0u8; 32];
    for byte in nonce_bytes.iter_mut() {
        *byte = rand::random();
    }
    let nonce = format!("0x{}", hex::encode(nonce_bytes));

    let now = chrono::Utc::now().timestamp() as u64;
    let valid_after = now.saturating_sub(60);
    let valid_before = now + challenge.required_deadline_seconds;

    let amount = parse_usdc_amount(&challenge.max_amount_required)
        .context("Payment challenge carries an unparseable amount")?;

    let chain_id: u64 = if challenge.network == "eip155:84532" {
        84532
    } else {
        8453
    };

    let from = signer.address();
    let pay_to: Address = challenge
        .pay_to_address
        .parse()
        .context("Payment challenge carries an invalid payee address")?;
    let usdc_addr: Address = challenge
        .usdc_address
        .parse()
        .context("Payment challenge carries an invalid USDC contract address")?;

    // EIP-712 domain separator:
    // { name: "USD Coin", version: "2", chainId, verifyingContract: usdcAddress }
    let domain_type_hash = keccak256(
        b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
    );
    let mut domain_data = Vec::with_capacity(5 * 32);
    domain_data.extend_from_slice(domain_type_hash.as_slice());
    domain_data.extend_from_slice(keccak256(b"USD Coin").as_slice());
    domain_data.extend_from_slice(keccak256(b"2").as_slice());
    domain_data.extend_from_slice(&U256::from(chain_id).to_be_bytes::<32>());
    domain_data.extend_from_slice(&address_word(usdc_addr));
    let domain_separator = keccak256(&domain_data);

    let transfer_type_hash = keccak256(
        b"TransferWithAuthorization(address from,address to,uint256 value,uint256 validAfter,uint256 validBefore,bytes32 nonce)",
    );
    let nonce_fixed = FixedBytes::<32>::from_slice(&nonce_bytes);
    let mut struct_data = Vec::with_capacity(7 * 32);
    struct_data.extend_from_slice(transfer_type_hash.as_slice());
    struct_data.extend_from_slice(&address_word(from));
    struct_data.extend_from_slice(&address_word(pay_to));
    struct_data.extend_from_slice(&amount.to_be_bytes::<32>());
    struct_data.extend_from_slice(&U256::from(valid_after).to_be_bytes::<32>());
    struct_data.extend_from_slice(&U256::from(valid_before).to_be_bytes::<32>());
    struct_data.extend_from_slice(nonce_fixed.as_slice());
    let struct_hash = keccak256(&struct_data);

    // EIP-712 digest: keccak256("\x19\x01" || domainSeparator || structHash)
    let mut sign_input = Vec::with_capacity(2 + 32 + 32);
    sign_input.extend_from_slice(&[0x19, 0x01]);
    sign_input.extend_from_slice(domain_separator.as_slice());
    sign_input.extend_from_slice(struct_hash.as_slice());
    let digest = keccak256(&sign_input);

    let signature = signer
        .sign_hash(&digest)
        .await
        .context("Failed to sign payment authorization")?;

    let payment = X402Payment {
        x402_version: 1,
        scheme: challenge.scheme.clone(),
        network: challenge.network.clone(),
        payload: X402PaymentPayload {
            signature: format!("0x{}", hex::encode(signature.as_bytes())),
            authorization: X402Authorization {
                from: format!("{:?}", from),
                to: format!("{:?}", pay_to),
                value: amount.to_string(),
                valid_after: valid_after.to_string(),
                valid_before: valid_before.to_string(),
                nonce,
            },
        },
    };

    let payment_json =
        serde_json::to_string(&payment).context("Failed to serialize payment envelope")?;
    Ok(BASE64.encode(payment_json.as_bytes()))
}

// ─── Internal helpers ────────────────────────────────────────────

/// Left-pad a 20-byte address into a 32-byte ABI word.
fn address_word(addr: Address) -> [u8; 32] {
    let mut buf = [0u8; 32];
    buf[12..32].copy_from_slice(addr.as_slice());
    buf
}

/// Parse a USDC amount into raw 6-decimal units. Accepts raw unit strings
/// ("1500000"), small integers interpreted as whole dollars, and
/// human-readable decimals ("1.50").
fn parse_usdc_amount(amount_str: &str) -> Option<U256> {
    let trimmed = amount_str.trim();

    if trimmed.contains('.') {
        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() != 2 {
            return None;
        }
        let whole: u64 = parts[0].parse().ok()?;
        let frac_str = format!("{:0<6}", parts[1]);
        let frac: u64 = frac_str[..6].parse().ok()?;
        let units = whole.checked_mul(1_000_000)?.checked_add(frac)?;
        Some(U256::from(units))
    } else {
        let val: u64 = trimmed.parse().ok()?;
        // 1_000_000 and up is already raw units (1 USDC or more).
        if val >= 1_000_000 {
            Some(U256::from(val))
        } else {
            Some(U256::from(val * 1_000_000))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::local::PrivateKeySigner;

    fn challenge() -> PaymentChallenge {
        PaymentChallenge {
            scheme: "exact".to_string(),
            network: "eip155:8453".to_string(),
            max_amount_required: "1500000".to_string(),
            pay_to_address: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
            usdc_address: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
            required_deadline_seconds: 300,
        }
    }

    #[test]
    fn test_parse_usdc_amount() {
        assert_eq!(parse_usdc_amount("1500000"), Some(U256::from(1_500_000u64)));
        assert_eq!(parse_usdc_amount("1.50"), Some(U256::from(1_500_000u64)));
        assert_eq!(parse_usdc_amount("2"), Some(U256::from(2_000_000u64)));
        assert_eq!(parse_usdc_amount("nope"), None);
        assert_eq!(parse_usdc_amount("1.2.3"), None);
    }

    #[test]
    fn test_parse_usdc_amount_boundary_and_overflow() {
        // Exactly 1 USDC in raw units stays raw, not re-scaled.
        assert_eq!(parse_usdc_amount("1000000"), Some(U256::from(1_000_000u64)));
        assert_eq!(parse_usdc_amount("999999"), Some(U256::from(999_999_000_000u64)));
        // Decimal amounts too large for 6-decimal u64 units are rejected
        // instead of wrapping.
        assert_eq!(parse_usdc_amount("18446744073710.0"), None);
    }

    #[test]
    fn test_parse_challenge_flat_and_enveloped() {
        let flat = serde_json::json!({
            "scheme": "exact",
            "network": "eip155:8453",
            "maxAmountRequired": "1000000",
            "payToAddress": "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
        });
        let parsed = parse_challenge(&flat).unwrap();
        assert_eq!(parsed.max_amount_required, "1000000");
        // Missing usdcAddress falls back to the network default.
        assert!(!parsed.usdc_address.is_empty());

        let enveloped = serde_json::json!({ "accepts": [flat] });
        assert!(parse_challenge(&enveloped).is_some());

        assert!(parse_challenge(&serde_json::json!({"error": "no challenge"})).is_none());
    }

    #[tokio::test]
    async fn test_sign_challenge_produces_base64_envelope() {
        let signer = PrivateKeySigner::random();
        let header = sign_challenge(&signer, &challenge()).await.unwrap();

        let decoded = BASE64.decode(header).unwrap();
        let envelope: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(envelope["x402Version"], 1);
        assert_eq!(envelope["scheme"], "exact");
        assert_eq!(envelope["payload"]["authorization"]["value"], "1500000");
        let sig = envelope["payload"]["signature"].as_str().unwrap();
        assert!(sig.starts_with("0x"));
        // 65-byte signature, hex encoded.
        assert_eq!(sig.len(), 2 + 130);
    }

    #[tokio::test]
    async fn test_sign_challenge_rejects_bad_payee() {
        let signer = PrivateKeySigner::random();
        let mut bad = challenge();
        bad.pay_to_address = "not-an-address".to_string();
        assert!(sign_challenge(&signer, &bad).await.is_err());
    }
}
