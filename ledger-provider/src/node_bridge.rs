use std::sync::Arc;

use async_trait::async_trait;
use provider_support::{ProviderError, ProviderResult};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::{
    cbor::inspect_transaction,
    model::{
        ChainTip, Delegation, EvalRedeemer, ProtocolParameters, StakeCredential, TxHash,
        decode_hash, parse_stake_address,
    },
};

mod mapping;
#[cfg(test)]
pub mod mocks;
mod ogmios;

pub use ogmios::OgmiosClient;

/// The error object of a JSON-RPC response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A node bridge answers one JSON-RPC call at a time. The outer result is a
/// transport failure, the inner one an error the bridge reported.
#[async_trait]
pub trait NodeBridgeApi: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> ProviderResult<Result<Value, RpcError>>;
}

/// Sorts a bridge-reported error into the kind callers act on.
pub fn classify(method: &str, error: RpcError) -> ProviderError {
    let message = format!("{method}: {}", error.message);
    let err = match error.code {
        -32700 | -32600 | -32601 | -32602 => ProviderError::bad_request(message),
        3000..=3999 => ProviderError::rejected(message),
        _ => ProviderError::backend_unavailable(message),
    };
    let err = err.with_field("code", error.code);
    match error.data {
        Some(data) => err.with_field("data", data),
        None => err,
    }
}

/// Queries and submits through a node bridge.
#[derive(Clone)]
pub struct NodeBridgeClient {
    api: Arc<dyn NodeBridgeApi>,
}

impl NodeBridgeClient {
    pub fn new(api: Arc<dyn NodeBridgeApi>) -> Self {
        Self { api }
    }

    async fn request<T>(&self, method: &str, params: Value) -> ProviderResult<T>
    where
        T: DeserializeOwned,
    {
        debug!(method, "calling node bridge");
        match self.api.call(method, params).await? {
            Ok(result) => serde_json::from_value(result).map_err(|err| {
                ProviderError::decoding(format!("{method}: unexpected result: {err}"))
            }),
            Err(error) => Err(classify(method, error)),
        }
    }

    #[instrument(skip(self))]
    pub async fn get_protocol_parameters(&self) -> ProviderResult<ProtocolParameters> {
        let raw = self
            .request("queryLedgerState/protocolParameters", Value::Null)
            .await?;
        mapping::protocol_parameters(raw)
    }

    #[instrument(skip(self))]
    pub async fn get_delegation(&self, stake_address: &str) -> ProviderResult<Delegation> {
        let params = match parse_stake_address(stake_address)? {
            StakeCredential::Key(hash) => json!({ "keys": [hash.to_string()] }),
            StakeCredential::Script(hash) => json!({ "scripts": [hash.to_string()] }),
        };
        let raw = self
            .request("queryLedgerState/rewardAccountSummaries", params)
            .await?;
        Ok(mapping::delegation(raw))
    }

    /// Submits a signed transaction. Malformed transactions are refused
    /// without contacting the bridge.
    #[instrument(skip_all)]
    pub async fn submit_tx(&self, cbor_hex: &str) -> ProviderResult<TxHash> {
        let expected = inspect_transaction(cbor_hex)?;
        let params = json!({ "transaction": { "cbor": cbor_hex } });
        let raw: ogmios::SubmitResult = self.request("submitTransaction", params).await?;
        let id = decode_hash(&raw.transaction.id, "transaction id")?;
        if id != expected {
            warn!(%id, %expected, "node bridge reported an unexpected transaction id");
        }
        debug!(%id, "transaction submitted");
        Ok(id)
    }

    #[instrument(skip_all)]
    pub async fn evaluate_tx(&self, cbor_hex: &str) -> ProviderResult<Vec<EvalRedeemer>> {
        inspect_transaction(cbor_hex)?;
        let params = json!({ "transaction": { "cbor": cbor_hex } });
        let raw: Vec<ogmios::Evaluation> = self.request("evaluateTransaction", params).await?;
        raw.into_iter().map(mapping::redeemer).collect()
    }

    pub async fn get_tip(&self) -> ProviderResult<ChainTip> {
        let raw = self.request("queryNetwork/tip", Value::Null).await?;
        mapping::tip(raw)
    }
}
