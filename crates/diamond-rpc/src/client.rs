//! JSON-RPC ledger
//!
//! Reads through `eth_call`/`eth_getCode`; writes through
//! `eth_sendTransaction` from an account the node holds unlocked, then polls
//! for the receipt. One write is in flight at a time: every write call
//! returns only after its receipt is known.

use crate::abi::{decode_facets, encode_diamond_cut, FACETS};
use async_trait::async_trait;
use diamond_artifact::{decode_hex, Address};
use diamond_cut::{CutReceipt, EngineConfig, FacetCut, InitCall, LedgerWriter};
use diamond_snapshot::{BlockInfo, LedgerError, LedgerReader, LiveFacet};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct Response<T> {
    result: Option<T>,
    error: Option<RpcFailure>,
}

#[derive(Debug, Deserialize)]
struct RpcFailure {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Block {
    number: String,
    timestamp: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Receipt {
    transaction_hash: String,
    block_number: Option<String>,
    status: Option<String>,
    contract_address: Option<String>,
}

impl Receipt {
    fn succeeded(&self) -> bool {
        self.status.as_deref().and_then(|s| parse_quantity(s).ok()) == Some(1)
    }
}

/// Parse a `0x`-prefixed hex quantity
fn parse_quantity(s: &str) -> Result<u64, LedgerError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16).map_err(|e| LedgerError::Decode(format!("quantity {s}: {e}")))
}

fn hex_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Ledger reached over HTTP JSON-RPC
#[derive(Debug)]
pub struct JsonRpcLedger {
    client: reqwest::Client,
    url: String,
    poll: Duration,
    timeout: Duration,
    next_id: AtomicU64,
}

impl JsonRpcLedger {
    /// Client for `url`, polling receipts every second for up to five minutes
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            poll: Duration::from_secs(1),
            timeout: Duration::from_secs(300),
            next_id: AtomicU64::new(1),
        }
    }

    /// Client for the configured network
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.network.rpc_url.clone()).with_receipt_polling(
            Duration::from_millis(config.ledger.receipt_poll_ms),
            Duration::from_secs(config.ledger.receipt_timeout_secs),
        )
    }

    /// With receipt polling interval and timeout
    #[must_use]
    pub fn with_receipt_polling(mut self, poll: Duration, timeout: Duration) -> Self {
        self.poll = poll.max(Duration::from_millis(10));
        self.timeout = timeout;
        self
    }

    /// Endpoint URL
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        tracing::trace!(method, id, "rpc call");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(format!("{method}: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LedgerError::Transport(format!("{method}: {e}")))?;
        if !status.is_success() {
            return Err(LedgerError::Transport(format!("{method}: http {status}: {text}")));
        }

        let parsed: Response<T> = serde_json::from_str(&text)
            .map_err(|e| LedgerError::Decode(format!("{method}: {e}")))?;
        if let Some(err) = parsed.error {
            return Err(LedgerError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(parsed.result)
    }

    async fn require<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, LedgerError> {
        self.call(method, params)
            .await?
            .ok_or_else(|| LedgerError::Decode(format!("{method}: null result")))
    }

    async fn send_transaction(&self, tx: Value) -> Result<Receipt, LedgerError> {
        let hash: String = self.require("eth_sendTransaction", json!([tx])).await?;
        tracing::info!(tx = %hash, "transaction sent");
        self.wait_for_receipt(&hash).await
    }

    async fn wait_for_receipt(&self, hash: &str) -> Result<Receipt, LedgerError> {
        let wait = async {
            loop {
                if let Some(receipt) = self
                    .call::<Receipt>("eth_getTransactionReceipt", json!([hash]))
                    .await?
                {
                    return Ok::<_, LedgerError>(receipt);
                }
                tokio::time::sleep(self.poll).await;
            }
        };
        tokio::time::timeout(self.timeout, wait)
            .await
            .map_err(|_| LedgerError::Timeout {
                what: format!("receipt of {hash}"),
                secs: self.timeout.as_secs(),
            })?
    }
}

#[async_trait]
impl LedgerReader for JsonRpcLedger {
    async fn chain_id(&self) -> Result<u64, LedgerError> {
        let id: String = self.require("eth_chainId", json!([])).await?;
        parse_quantity(&id)
    }

    async fn latest_block(&self) -> Result<BlockInfo, LedgerError> {
        let block: Block = self
            .require("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        Ok(BlockInfo {
            number: parse_quantity(&block.number)?,
            timestamp: parse_quantity(&block.timestamp)?,
        })
    }

    async fn facets(&self, diamond: Address) -> Result<Vec<LiveFacet>, LedgerError> {
        let data: String = self
            .require(
                "eth_call",
                json!([{ "to": diamond.to_string(), "data": hex_data(&FACETS) }, "latest"]),
            )
            .await?;
        let bytes = decode_hex(&data).map_err(|e| LedgerError::Decode(e.to_string()))?;
        decode_facets(&bytes)
    }

    async fn code_at(&self, address: Address) -> Result<Vec<u8>, LedgerError> {
        let code: String = self
            .require("eth_getCode", json!([address.to_string(), "latest"]))
            .await?;
        decode_hex(&code).map_err(|e| LedgerError::Decode(e.to_string()))
    }
}

#[async_trait]
impl LedgerWriter for JsonRpcLedger {
    async fn deploy(&self, from: Address, facet: &str, creation_code: &[u8]) -> Result<Address, LedgerError> {
        let receipt = self
            .send_transaction(json!({ "from": from.to_string(), "data": hex_data(creation_code) }))
            .await?;
        if !receipt.succeeded() {
            return Err(LedgerError::Rejected(format!(
                "deployment of {facet} reverted in {}",
                receipt.transaction_hash
            )));
        }
        let address = receipt
            .contract_address
            .as_deref()
            .ok_or_else(|| LedgerError::Decode(format!("deployment of {facet}: receipt has no contract address")))?;
        address
            .parse()
            .map_err(|e| LedgerError::Decode(format!("contract address {address}: {e}")))
    }

    async fn diamond_cut(
        &self,
        from: Address,
        diamond: Address,
        cuts: &[FacetCut],
        init: &InitCall,
    ) -> Result<CutReceipt, LedgerError> {
        let data = encode_diamond_cut(cuts, init);
        let receipt = self
            .send_transaction(json!({
                "from": from.to_string(),
                "to": diamond.to_string(),
                "data": hex_data(&data),
            }))
            .await?;
        Ok(CutReceipt {
            success: receipt.succeeded(),
            block_number: receipt
                .block_number
                .as_deref()
                .map(parse_quantity)
                .transpose()?,
            tx_hash: receipt.transaction_hash,
        })
    }
}
