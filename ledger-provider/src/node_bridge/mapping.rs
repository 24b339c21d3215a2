use num_rational::Rational64;
use num_traits::FromPrimitive;
use provider_support::{ProviderError, ProviderResult};

use crate::model::{
    ChainTip, Delegation, EvalRedeemer, ExUnits, ProtocolParameters, RedeemerTag, decode_hash,
};

use super::ogmios;

fn ratio(value: &str, what: &str) -> ProviderResult<Rational64> {
    value
        .parse()
        .map_err(|err| ProviderError::decoding(format!("{what} {value:?}: {err}")))
}

fn f64_to_rational(value: f64, what: &str) -> ProviderResult<Rational64> {
    Rational64::from_f64(value)
        .ok_or_else(|| ProviderError::decoding(format!("{what} {value} is not a finite number")))
}

/// Ogmios names languages `plutus:v1`, consumers expect `PlutusV1`.
fn language_name(language: &str) -> String {
    match language.strip_prefix("plutus:v") {
        Some(version) => format!("PlutusV{version}"),
        None => language.to_string(),
    }
}

pub fn protocol_parameters(raw: ogmios::ProtocolParameters) -> ProviderResult<ProtocolParameters> {
    let min_fee_ref_script_cost_per_byte = match raw.min_fee_reference_scripts {
        Some(fee) => f64_to_rational(fee.base, "minFeeReferenceScripts.base")?,
        None => Rational64::from_integer(0),
    };
    Ok(ProtocolParameters {
        min_fee_a: raw.min_fee_coefficient,
        min_fee_b: raw.min_fee_constant.ada.lovelace,
        max_tx_size: raw.max_transaction_size.bytes,
        max_val_size: raw.max_value_size.bytes,
        key_deposit: raw.stake_credential_deposit.ada.lovelace,
        pool_deposit: raw.stake_pool_deposit.ada.lovelace,
        drep_deposit: raw
            .delegate_representative_deposit
            .map(|d| d.ada.lovelace)
            .unwrap_or_default(),
        gov_action_deposit: raw
            .governance_action_deposit
            .map(|d| d.ada.lovelace)
            .unwrap_or_default(),
        price_mem: ratio(&raw.script_execution_prices.memory, "memory price")?,
        price_step: ratio(&raw.script_execution_prices.cpu, "cpu price")?,
        max_tx_ex_mem: raw.max_execution_units_per_transaction.memory,
        max_tx_ex_steps: raw.max_execution_units_per_transaction.cpu,
        coins_per_utxo_byte: raw.min_utxo_deposit_coefficient,
        collateral_percentage: raw.collateral_percentage,
        max_collateral_inputs: raw.max_collateral_inputs,
        min_fee_ref_script_cost_per_byte,
        cost_models: raw
            .plutus_cost_models
            .into_iter()
            .map(|(language, costs)| (language_name(&language), costs))
            .collect(),
    })
}

/// Only one credential is ever asked for, so only the first summary matters.
pub fn delegation(raw: ogmios::RewardAccountSummaries) -> Delegation {
    let summary = match raw {
        ogmios::RewardAccountSummaries::Keyed(map) => map.into_values().next(),
        ogmios::RewardAccountSummaries::Listed(list) => list.into_iter().next(),
    };
    match summary {
        Some(summary) => Delegation {
            pool_id: summary.delegate.map(|d| d.id),
            rewards: summary.rewards.ada.lovelace,
        },
        None => Delegation::default(),
    }
}

fn redeemer_tag(purpose: &str) -> ProviderResult<RedeemerTag> {
    Ok(match purpose {
        "spend" => RedeemerTag::Spend,
        "mint" => RedeemerTag::Mint,
        "publish" | "certificate" => RedeemerTag::Publish,
        "withdraw" | "withdrawal" => RedeemerTag::Withdraw,
        "vote" => RedeemerTag::Vote,
        "propose" => RedeemerTag::Propose,
        other => {
            return Err(ProviderError::decoding(format!(
                "unknown redeemer purpose {other:?}"
            )));
        }
    })
}

pub fn redeemer(raw: ogmios::Evaluation) -> ProviderResult<EvalRedeemer> {
    let (tag, index) = match raw.validator {
        ogmios::Validator::Purpose { purpose, index } => (redeemer_tag(&purpose)?, index),
        ogmios::Validator::Legacy(pointer) => {
            let (purpose, index) = pointer.split_once(':').ok_or_else(|| {
                ProviderError::decoding(format!("malformed validator {pointer:?}"))
            })?;
            let index = index.parse().map_err(|_| {
                ProviderError::decoding(format!("malformed validator {pointer:?}"))
            })?;
            (redeemer_tag(purpose)?, index)
        }
    };
    Ok(EvalRedeemer {
        tag,
        index,
        ex_units: ExUnits {
            mem: raw.budget.memory,
            steps: raw.budget.cpu,
        },
    })
}

pub fn tip(raw: ogmios::Tip) -> ProviderResult<ChainTip> {
    match raw {
        ogmios::Tip::Point { slot, id } => Ok(ChainTip::Point {
            slot,
            hash: decode_hash(&id, "block hash")?,
        }),
        ogmios::Tip::Origin(s) if s == "origin" => Ok(ChainTip::Origin),
        ogmios::Tip::Origin(s) => Err(ProviderError::decoding(format!("unexpected tip {s:?}"))),
    }
}
