//! JSON-RPC plumbing for the chain node.
//!
//! HTTP requests carry a 5 s timeout and fail over from the primary to
//! the backup endpoint. `trace_call` goes to the premium endpoint only.

use std::time::Duration;

use alloy_primitives::{Address, U256};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::contracts::{BALANCE_OF_SELECTOR, STABLECOIN};

const RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// A transaction as returned by `eth_getTransactionByHash`.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcTransaction {
    pub hash: String,
    pub to: Option<String>,
    /// Raw calldata, 0x-prefixed hex.
    pub input: String,
}

impl RpcTransaction {
    /// Destination address, if parseable.
    #[must_use]
    pub fn to_address(&self) -> Option<Address> {
        self.to.as_deref()?.parse().ok()
    }

    /// Calldata bytes.
    #[must_use]
    pub fn calldata(&self) -> Option<Vec<u8>> {
        hex::decode(self.input.trim_start_matches("0x")).ok()
    }
}

/// HTTP JSON-RPC client with primary/backup failover.
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    primary_url: String,
    backup_url: Option<String>,
    /// Premium endpoint required for `trace_call`.
    trace_url: Option<String>,
}

impl RpcClient {
    /// Build a client over the configured endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying HTTP client cannot be built.
    pub fn new(
        primary_url: impl Into<String>,
        backup_url: Option<String>,
        trace_url: Option<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .pool_max_idle_per_host(20)
            .build()?;

        Ok(Self {
            http,
            primary_url: primary_url.into(),
            backup_url,
            trace_url,
        })
    }

    /// Issue one JSON-RPC call, failing over to the backup endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rpc`] when every endpoint fails or the node
    /// reports an error object.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        match self.call_endpoint(&self.primary_url, method, &params).await {
            Ok(result) => Ok(result),
            Err(primary_err) => {
                let Some(backup) = self.backup_url.as_deref() else {
                    return Err(primary_err);
                };
                warn!(method, error = %primary_err, "Primary RPC failed, trying backup");
                self.call_endpoint(backup, method, &params).await
            }
        }
    }

    async fn call_endpoint<T: DeserializeOwned>(
        &self,
        url: &str,
        method: &str,
        params: &Value,
    ) -> Result<T> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response: Value = self.http.post(url).json(&body).send().await?.json().await?;

        if let Some(err) = response.get("error") {
            return Err(Error::Rpc(format!("{method}: {err}")));
        }

        let result = response
            .get("result")
            .cloned()
            .ok_or_else(|| Error::Rpc(format!("{method}: missing result")))?;
        serde_json::from_value(result).map_err(Error::from)
    }

    /// Fetch a transaction by hash. `None` when the node no longer has it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rpc`] on transport or node errors.
    pub async fn transaction_by_hash(&self, tx_hash: &str) -> Result<Option<RpcTransaction>> {
        self.call("eth_getTransactionByHash", json!([tx_hash])).await
    }

    /// Stablecoin balance of `owner` via `eth_call` on `balanceOf`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rpc`] on transport errors or an unparseable word.
    pub async fn stablecoin_balance(&self, owner: Address) -> Result<U256> {
        let mut data = BALANCE_OF_SELECTOR.to_vec();
        data.extend_from_slice(&[0u8; 12]);
        data.extend_from_slice(owner.as_slice());

        let result: String = self
            .call(
                "eth_call",
                json!([
                    { "to": format!("{STABLECOIN:?}"), "data": format!("0x{}", hex::encode(data)) },
                    "latest",
                ]),
            )
            .await?;

        let raw = hex::decode(result.trim_start_matches("0x"))
            .map_err(|e| Error::Rpc(format!("balanceOf: {e}")))?;
        Ok(U256::from_be_slice(&raw))
    }

    /// Run `trace_call` against the premium endpoint.
    ///
    /// `block` is `"latest"` for pending transactions or a specific block
    /// tag for confirmed ones.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rpc`] when no trace endpoint is configured or the
    /// call fails.
    pub async fn trace_call(&self, tx: &Value, block: &str) -> Result<Value> {
        let url = self
            .trace_url
            .as_deref()
            .ok_or_else(|| Error::Rpc("no trace endpoint configured".into()))?;

        debug!(block, "trace_call");
        self.call_endpoint(url, "trace_call", &json!([tx, ["trace"], block]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_parses_destination_and_calldata() {
        let tx = RpcTransaction {
            hash: "0xabc".into(),
            to: Some("0x4bFb41d5B3570DeFd03C39a9A4D8dE6Bd8B8982E".into()),
            input: "0x2287e350".into(),
        };

        assert!(tx.to_address().is_some());
        assert_eq!(tx.calldata().unwrap(), vec![0x22, 0x87, 0xe3, 0x50]);
    }

    #[test]
    fn contract_creation_has_no_destination() {
        let tx = RpcTransaction {
            hash: "0xabc".into(),
            to: None,
            input: "0x".into(),
        };
        assert!(tx.to_address().is_none());
        assert!(tx.calldata().unwrap().is_empty());
    }
}
