use std::collections::BTreeMap;

use num_rational::Rational64;
use serde::{Serialize, Serializer};

use super::BlockHash;

/// Ledger cost and limit constants for the current epoch.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolParameters {
    pub min_fee_a: u64,
    pub min_fee_b: u64,
    pub max_tx_size: u64,
    pub max_val_size: u64,
    pub key_deposit: u64,
    pub pool_deposit: u64,
    pub drep_deposit: u64,
    pub gov_action_deposit: u64,
    #[serde(serialize_with = "ratio_as_string")]
    pub price_mem: Rational64,
    #[serde(serialize_with = "ratio_as_string")]
    pub price_step: Rational64,
    pub max_tx_ex_mem: u64,
    pub max_tx_ex_steps: u64,
    pub coins_per_utxo_byte: u64,
    pub collateral_percentage: u64,
    pub max_collateral_inputs: u64,
    #[serde(serialize_with = "ratio_as_string")]
    pub min_fee_ref_script_cost_per_byte: Rational64,
    /// Keyed by language name, e.g. `PlutusV2`.
    pub cost_models: BTreeMap<String, Vec<i64>>,
}

fn ratio_as_string<S>(value: &Rational64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(value)
}

/// Delegation state of a stake credential. No pool means undelegated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Delegation {
    pub pool_id: Option<String>,
    pub rewards: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ChainTip {
    Origin,
    Point { slot: u64, hash: BlockHash },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RedeemerTag {
    Spend,
    Mint,
    Publish,
    Withdraw,
    Vote,
    Propose,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExUnits {
    pub mem: u64,
    pub steps: u64,
}

/// Execution cost of one redeemer, as estimated by the node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalRedeemer {
    pub tag: RedeemerTag,
    pub index: u32,
    pub ex_units: ExUnits,
}
