use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use provider_support::{ProviderError, ProviderResult};
use serde_json::{Value, json};

use super::{NodeBridgeApi, RpcError};

pub const EMPTY_TX: &str = "84a300818258200000000000000000000000000000000000000000000000000000000000000000000180020aa0f5f6";
pub const EMPTY_TX_ID: &str = "892b5222180f305c1014d89c71f08222934fbfbb5811b0b7e70e23fe35a8c508";

/// A trimmed-down `queryLedgerState/protocolParameters` result from preprod.
pub fn protocol_parameters_json() -> Value {
    json!({
        "minFeeCoefficient": 44,
        "minFeeConstant": { "ada": { "lovelace": 155381 } },
        "maxBlockBodySize": { "bytes": 90112 },
        "maxTransactionSize": { "bytes": 16384 },
        "maxValueSize": { "bytes": 5000 },
        "stakeCredentialDeposit": { "ada": { "lovelace": 2000000 } },
        "stakePoolDeposit": { "ada": { "lovelace": 500000000 } },
        "delegateRepresentativeDeposit": { "ada": { "lovelace": 500000000 } },
        "governanceActionDeposit": { "ada": { "lovelace": 100000000000u64 } },
        "scriptExecutionPrices": { "memory": "577/10000", "cpu": "721/10000000" },
        "maxExecutionUnitsPerTransaction": { "memory": 14000000, "cpu": 10000000000u64 },
        "minUtxoDepositCoefficient": 4310,
        "collateralPercentage": 150,
        "maxCollateralInputs": 3,
        "minFeeReferenceScripts": { "range": 25600, "base": 15.0, "multiplier": 1.2 },
        "plutusCostModels": {
            "plutus:v1": [100788, 420, 1, 1],
            "plutus:v2": [100788, 420, 1, 1, 1000],
            "plutus:v3": [100788, 420, 1, 1, 1000, 173]
        }
    })
}

/// A node bridge which answers from canned responses and records each call.
#[derive(Default)]
pub struct MockNodeBridge {
    responses: HashMap<String, Result<Value, RpcError>>,
    failing: bool,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockNodeBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, method: &str, result: Value) -> Self {
        self.responses.insert(method.into(), Ok(result));
        self
    }

    pub fn with_error(mut self, method: &str, error: RpcError) -> Self {
        self.responses.insert(method.into(), Err(error));
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NodeBridgeApi for MockNodeBridge {
    async fn call(&self, method: &str, params: Value) -> ProviderResult<Result<Value, RpcError>> {
        self.calls.lock().unwrap().push((method.into(), params));
        if self.failing {
            return Err(ProviderError::backend_unavailable("connection reset"));
        }
        Ok(self.responses.get(method).cloned().unwrap_or_else(|| {
            Err(RpcError {
                code: -32601,
                message: format!("method {method} not found"),
                data: None,
            })
        }))
    }
}
