use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ethers::{
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{transaction::eip2718::TypedTransaction, BlockNumber, Bytes, H256, U256, U64},
    utils::keccak256,
};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

use crate::{
    relay::Relay,
    types::{BundleAck, SignedBundle, SimulationReport},
};

const SIGNATURE_HEADER: &str = "X-Flashbots-Signature";

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: [P; 1],
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CallBundleParams<'a> {
    txs: &'a [Bytes],
    block_number: U64,
    state_block_number: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendBundleParams<'a> {
    txs: &'a [Bytes],
    block_number: U64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSimulation {
    pub error: Option<String>,
    pub revert: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallBundleResult {
    /// Decimal wei string.
    pub coinbase_diff: String,
    pub total_gas_used: u64,
    #[serde(default)]
    pub results: Vec<TransactionSimulation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendBundleResult {
    bundle_hash: Option<H256>,
}

/// Flattens an `eth_callBundle` response. A relay-level error becomes
/// `error`; the first failing transaction becomes `first_revert`.
pub fn simulation_report(response: JsonRpcResponse<CallBundleResult>) -> Result<SimulationReport> {
    if let Some(error) = response.error {
        return Ok(SimulationReport {
            error: Some(format!("{} ({})", error.message, error.code)),
            ..Default::default()
        });
    }

    let result = response
        .result
        .ok_or_else(|| anyhow!("eth_callBundle returned neither result nor error"))?;

    let first_revert = result
        .results
        .iter()
        .find_map(|tx| tx.error.clone().or_else(|| tx.revert.clone()));

    let coinbase_diff = U256::from_dec_str(&result.coinbase_diff)
        .map_err(|e| anyhow!("Invalid coinbaseDiff {}: {}", result.coinbase_diff, e))?;

    Ok(SimulationReport {
        error: None,
        first_revert,
        total_gas_used: U256::from(result.total_gas_used),
        coinbase_diff,
    })
}

/// Bundle relay speaking the Flashbots JSON-RPC dialect.
pub struct FlashbotsRelay {
    client: Client,
    url: String,
    signer: LocalWallet,
    auth_signer: LocalWallet,
    provider: Arc<Provider<Http>>,
}

impl FlashbotsRelay {
    pub fn new(
        url: &str,
        signer: LocalWallet,
        auth_signer: LocalWallet,
        provider: Arc<Provider<Http>>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create relay HTTP client")?;

        info!("Using bundle relay {} as searcher {:?}", url, signer.address());

        Ok(Self {
            client,
            url: url.to_string(),
            signer,
            auth_signer,
            provider,
        })
    }

    async fn call<P: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<JsonRpcResponse<T>> {
        let body = serde_json::to_string(&JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params: [params],
        })?;

        let digest = format!("0x{}", hex::encode(keccak256(body.as_bytes())));
        let signature = self
            .auth_signer
            .sign_message(digest)
            .await
            .map_err(|e| anyhow!("Failed to sign relay request: {}", e))?;

        debug!("POST {} {}", self.url, method);

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header(
                SIGNATURE_HEADER,
                format!("{:?}:0x{}", self.auth_signer.address(), signature),
            )
            .body(body)
            .send()
            .await
            .with_context(|| format!("{} request failed", method))?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(anyhow!("{} returned HTTP {}: {}", method, status, text));
        }

        serde_json::from_str(&text).with_context(|| format!("Failed to parse {} response", method))
    }
}

#[async_trait]
impl Relay for FlashbotsRelay {
    async fn sign_bundle(&self, transaction: &TypedTransaction) -> Result<SignedBundle> {
        let searcher = self.signer.address();
        let nonce = self
            .provider
            .get_transaction_count(searcher, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| anyhow!("Failed to get nonce: {}", e))?;

        let mut tx = transaction.clone();
        tx.set_from(searcher);
        tx.set_nonce(nonce);
        tx.set_chain_id(self.signer.chain_id());

        let signature = self
            .signer
            .sign_transaction(&tx)
            .await
            .map_err(|e| anyhow!("Failed to sign transaction: {}", e))?;

        Ok(SignedBundle {
            raw_transactions: vec![tx.rlp_signed(&signature)],
        })
    }

    async fn simulate(&self, bundle: &SignedBundle, target_block: U64) -> Result<SimulationReport> {
        let response = self
            .call(
                "eth_callBundle",
                CallBundleParams {
                    txs: &bundle.raw_transactions,
                    block_number: target_block,
                    state_block_number: "latest",
                },
            )
            .await?;

        simulation_report(response)
    }

    async fn send_raw_bundle(&self, bundle: &SignedBundle, target_block: U64) -> Result<BundleAck> {
        let response: JsonRpcResponse<SendBundleResult> = self
            .call(
                "eth_sendBundle",
                SendBundleParams {
                    txs: &bundle.raw_transactions,
                    block_number: target_block,
                },
            )
            .await?;

        if let Some(error) = response.error {
            return Err(anyhow!("eth_sendBundle rejected: {} ({})", error.message, error.code));
        }

        Ok(BundleAck {
            target_block,
            bundle_hash: response.result.and_then(|result| result.bundle_hash),
        })
    }
}
