use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicU64, Ordering},
};

use anyhow::Result;
use async_trait::async_trait;
use provider_support::{Context, ProviderResult, http::HttpClient};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{NodeBridgeApi, RpcError};

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Value::is_null")]
    params: Value,
    id: u64,
}

/// Bodies without the `jsonrpc` marker are not envelopes, whatever their
/// status, so proxy errors keep their HTTP classification.
#[derive(Deserialize)]
#[serde(untagged)]
enum RpcResponse {
    Error {
        #[serde(rename = "jsonrpc")]
        _version: String,
        error: RpcError,
    },
    Success {
        #[serde(rename = "jsonrpc")]
        _version: String,
        result: Value,
    },
}

/// Sends JSON-RPC 2.0 requests to an Ogmios server over HTTP.
pub struct OgmiosClient {
    client: HttpClient,
    url: Url,
    next_id: AtomicU64,
}

impl OgmiosClient {
    pub fn new(client: HttpClient, url: &str) -> Result<Self> {
        Ok(Self {
            client,
            url: Url::parse(url)?,
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl NodeBridgeApi for OgmiosClient {
    async fn call(&self, method: &str, params: Value) -> ProviderResult<Result<Value, RpcError>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };
        debug!(method, id, "sending request");
        let res: RpcResponse = self
            .client
            .exchange(self.url.clone(), &req)
            .await
            .context(method)?;
        match res {
            RpcResponse::Error { error, .. } => Ok(Err(error)),
            RpcResponse::Success { result, .. } => Ok(Ok(result)),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Lovelace {
    pub lovelace: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Ada {
    pub ada: Lovelace,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct Bytes {
    pub bytes: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ExecutionPrices {
    pub memory: String,
    pub cpu: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct ExecutionUnits {
    pub memory: u64,
    pub cpu: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct ReferenceScriptsFee {
    pub base: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolParameters {
    pub min_fee_coefficient: u64,
    pub min_fee_constant: Ada,
    pub max_transaction_size: Bytes,
    pub max_value_size: Bytes,
    pub stake_credential_deposit: Ada,
    pub stake_pool_deposit: Ada,
    /// Absent before Conway.
    #[serde(default)]
    pub delegate_representative_deposit: Option<Ada>,
    #[serde(default)]
    pub governance_action_deposit: Option<Ada>,
    pub script_execution_prices: ExecutionPrices,
    pub max_execution_units_per_transaction: ExecutionUnits,
    pub min_utxo_deposit_coefficient: u64,
    pub collateral_percentage: u64,
    pub max_collateral_inputs: u64,
    #[serde(default)]
    pub min_fee_reference_scripts: Option<ReferenceScriptsFee>,
    #[serde(default)]
    pub plutus_cost_models: BTreeMap<String, Vec<i64>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Delegate {
    pub id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct RewardAccountSummary {
    #[serde(default, alias = "stakePool")]
    pub delegate: Option<Delegate>,
    #[serde(default)]
    pub rewards: Ada,
}

/// Older servers key summaries by credential, newer ones return a list.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RewardAccountSummaries {
    Keyed(BTreeMap<String, RewardAccountSummary>),
    Listed(Vec<RewardAccountSummary>),
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TransactionId {
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SubmitResult {
    pub transaction: TransactionId,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Validator {
    Purpose { purpose: String, index: u32 },
    /// e.g. `spend:0`
    Legacy(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Evaluation {
    pub validator: Validator,
    pub budget: ExecutionUnits,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Tip {
    Point { slot: u64, id: String },
    /// Always the string `origin`.
    Origin(String),
}
