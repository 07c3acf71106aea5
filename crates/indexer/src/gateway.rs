//! Typed JSON-RPC gateway over one EVM chain.
//!
//! Every operation reports its method to the budget governor before the
//! network call, classifies failures as transient or fatal, and retries
//! transient ones through an explicit bounded loop. Anything that survives
//! the retries aborts the caller's run; the cursor discipline in the
//! scanner makes that safe.

use crate::budget::BudgetGovernor;
use alloy_primitives::{Address, Bytes, B256, U64};
use karma_common::Chain;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, warn};

/// Attempts per call, including the first.
const MAX_ATTEMPTS: usize = 3;

/// Backoff schedule between attempts, in seconds.
const BACKOFF_SECS: [u64; 3] = [1, 2, 4];

/// Per-call timeout.
const CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Rate limit error patterns seen across RPC providers.
const RATE_LIMIT_PATTERNS: &[&str] = &[
    "rate limit",
    "rate-limit",
    "too many requests",
    "compute units",
    "cu limit",
    "quota exceeded",
    "throttled",
];

/// Rate limit JSON-RPC error codes used by various providers.
const RATE_LIMIT_CODES: &[i64] = &[429, -32005, -32098, -32099];

/// A gateway failure, tagged by retryability.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Worth retrying: rate limits, gateway hiccups, socket-level failures.
    #[error("transient rpc failure: {0}")]
    Transient(String),
    /// Not worth retrying: bad requests, decode failures, provider errors.
    #[error("rpc failure: {0}")]
    Fatal(String),
}

/// Result alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// One event log as returned by `eth_getLogs` / receipts.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// Emitting contract.
    pub address: Address,
    /// Indexed topics; `topics[0]` is the event signature hash.
    pub topics: Vec<B256>,
    /// ABI-encoded non-indexed fields.
    pub data: Bytes,
    /// Block the log landed in; absent only for pending logs.
    #[serde(default)]
    pub block_number: Option<U64>,
    /// Emitting transaction.
    #[serde(default)]
    pub transaction_hash: Option<B256>,
    /// Position within the block.
    #[serde(default)]
    pub log_index: Option<U64>,
}

impl LogRecord {
    /// The event signature topic, if present.
    pub fn topic0(&self) -> Option<B256> {
        self.topics.first().copied()
    }
}

/// Subset of a transaction receipt the pipeline consumes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Hash of the transaction.
    pub transaction_hash: B256,
    /// Gas-paying sender.
    pub from: Address,
    /// Callee, absent for contract creation.
    #[serde(default)]
    pub to: Option<Address>,
    /// Block the transaction landed in.
    #[serde(default)]
    pub block_number: Option<U64>,
    /// Every log the transaction emitted.
    pub logs: Vec<LogRecord>,
}

/// Subset of a transaction envelope the pipeline consumes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxEnvelope {
    /// Transaction hash.
    pub hash: B256,
    /// Sender.
    pub from: Address,
    /// Recipient, absent for contract creation.
    #[serde(default)]
    pub to: Option<Address>,
    /// Block the transaction landed in.
    #[serde(default)]
    pub block_number: Option<U64>,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Typed operations against one EVM chain's JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct Gateway {
    chain: Chain,
    url: String,
    client: reqwest::Client,
    governor: Arc<BudgetGovernor>,
}

impl Gateway {
    /// Create a gateway for `chain` at `url`, metered by `governor`.
    pub fn new(chain: Chain, url: String, governor: Arc<BudgetGovernor>) -> eyre::Result<Self> {
        let client = reqwest::Client::builder().timeout(CALL_TIMEOUT).build()?;
        Ok(Self { chain, url, client, governor })
    }

    /// The chain this gateway serves.
    pub fn chain(&self) -> Chain {
        self.chain
    }

    /// Current chain head.
    pub async fn head(&self) -> GatewayResult<u64> {
        let head: U64 = self.call("eth_blockNumber", json!([])).await?;
        Ok(head.to::<u64>())
    }

    /// Event logs for `contract` over the inclusive block range, filtered
    /// by positional topics.
    pub async fn logs(
        &self,
        contract: Address,
        topics: &[B256],
        from: u64,
        to: u64,
    ) -> GatewayResult<Vec<LogRecord>> {
        let params = json!([{
            "address": contract,
            "topics": topics,
            "fromBlock": hex_block(from),
            "toBlock": hex_block(to),
        }]);
        self.call("eth_getLogs", params).await
    }

    /// Full receipt for one transaction.
    pub async fn receipt(&self, tx_hash: B256) -> GatewayResult<Receipt> {
        self.call("eth_getTransactionReceipt", json!([tx_hash])).await
    }

    /// Envelope for one transaction.
    pub async fn transaction(&self, tx_hash: B256) -> GatewayResult<TxEnvelope> {
        self.call("eth_getTransactionByHash", json!([tx_hash])).await
    }

    /// One JSON-RPC call with the bounded transient-retry loop.
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> GatewayResult<T> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.call_once(method, &params).await {
                Ok(value) => return Ok(value),
                Err(err @ GatewayError::Fatal(_)) => return Err(err),
                Err(err) if attempt >= MAX_ATTEMPTS => return Err(err),
                Err(GatewayError::Transient(reason)) => {
                    let delay = BACKOFF_SECS[(attempt - 1).min(BACKOFF_SECS.len() - 1)];
                    warn!(
                        chain = %self.chain,
                        method,
                        attempt,
                        delay_secs = delay,
                        %reason,
                        "transient RPC failure, backing off"
                    );
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                }
            }
        }
    }

    async fn call_once<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &Value,
    ) -> GatewayResult<T> {
        // Metered before the wire, so aborted calls still count.
        self.governor.record(method, 1);

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transient(format!("{method}: {e}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::BAD_GATEWAY
            || status == StatusCode::SERVICE_UNAVAILABLE
        {
            return Err(GatewayError::Transient(format!("{method}: http {status}")));
        }
        if !status.is_success() {
            return Err(GatewayError::Fatal(format!("{method}: http {status}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Transient(format!("{method}: reading body: {e}")))?;

        let envelope: RpcEnvelope = serde_json::from_str(&text)
            .map_err(|e| GatewayError::Fatal(format!("{method}: invalid JSON-RPC body: {e}")))?;

        if let Some(error) = envelope.error {
            if is_rate_limit_error(&error) {
                return Err(GatewayError::Transient(format!(
                    "{method}: provider rate limited ({}: {})",
                    error.code, error.message
                )));
            }
            return Err(GatewayError::Fatal(format!(
                "{method}: rpc error {}: {}",
                error.code, error.message
            )));
        }

        let result = match envelope.result {
            Some(value) if !value.is_null() => value,
            _ => return Err(GatewayError::Fatal(format!("{method}: missing result"))),
        };

        debug!(chain = %self.chain, method, "RPC call succeeded");
        serde_json::from_value(result)
            .map_err(|e| GatewayError::Fatal(format!("{method}: decoding result: {e}")))
    }
}

fn is_rate_limit_error(error: &RpcErrorObject) -> bool {
    if RATE_LIMIT_CODES.contains(&error.code) {
        return true;
    }
    let message = error.message.to_lowercase();
    RATE_LIMIT_PATTERNS.iter().any(|pattern| message.contains(pattern))
}

fn hex_block(block: u64) -> String {
    format!("0x{block:x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use wiremock::{
        matchers::{body_partial_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn test_gateway(url: String) -> (Gateway, Arc<BudgetGovernor>) {
        let governor = Arc::new(BudgetGovernor::new(1_000_000_000));
        let gateway = Gateway::new(Chain::Base, url, governor.clone()).unwrap();
        (gateway, governor)
    }

    #[tokio::test]
    async fn head_parses_hex_quantity_and_meters_the_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(serde_json::json!({"method": "eth_blockNumber"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": "0xf4240"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (gateway, governor) = test_gateway(server.uri());
        assert_eq!(gateway.head().await.unwrap(), 1_000_000);
        assert_eq!(governor.snapshot().methods["eth_blockNumber"].calls, 1);
    }

    #[tokio::test]
    async fn http_429_retries_then_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": "0x10"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (gateway, governor) = test_gateway(server.uri());
        assert_eq!(gateway.head().await.unwrap(), 16);
        // Both attempts were metered.
        assert_eq!(governor.snapshot().methods["eth_blockNumber"].calls, 2);
    }

    #[tokio::test]
    async fn http_400_fails_fast_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let (gateway, _) = test_gateway(server.uri());
        match gateway.head().await {
            Err(GatewayError::Fatal(_)) => {}
            other => panic!("expected fatal error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rpc_error_object_is_fatal_unless_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32602, "message": "invalid params"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (gateway, _) = test_gateway(server.uri());
        match gateway.head().await {
            Err(GatewayError::Fatal(msg)) => assert!(msg.contains("invalid params")),
            other => panic!("expected fatal error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_limit_error_object_retries() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32005, "message": "too many requests"}
            })))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": "0x20"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (gateway, _) = test_gateway(server.uri());
        assert_eq!(gateway.head().await.unwrap(), 32);
    }

    #[tokio::test]
    async fn logs_builds_the_range_filter() {
        let server = MockServer::start().await;
        let contract = address!("0x833589fcd6edb6e08f4c7c32d4f71b54bda02913");

        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(serde_json::json!({
                "method": "eth_getLogs",
                "params": [{"fromBlock": "0xf4240", "toBlock": "0xf4249"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": [{
                    "address": "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913",
                    "topics": [
                        "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
                    ],
                    "data": "0x00000000000000000000000000000000000000000000000000000000000f4240",
                    "blockNumber": "0xf4240",
                    "transactionHash":
                        "0x1111111111111111111111111111111111111111111111111111111111111111",
                    "logIndex": "0x0"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (gateway, _) = test_gateway(server.uri());
        let topic =
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef".parse().unwrap();
        let logs = gateway.logs(contract, &[topic], 1_000_000, 1_000_009).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].address, contract);
        assert_eq!(logs[0].block_number.unwrap().to::<u64>(), 1_000_000);
    }

    #[tokio::test]
    async fn null_result_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": null
            })))
            .mount(&server)
            .await;

        let (gateway, _) = test_gateway(server.uri());
        let hash = B256::repeat_byte(0x11);
        assert!(matches!(gateway.receipt(hash).await, Err(GatewayError::Fatal(_))));
    }
}
