use provider_support::{ProviderError, ProviderResult};

use crate::{
    cbor::apply_double_cbor_encoding,
    model::{
        AssetUnit, Assets, Datum, DatumHash, Script, ScriptHash, ScriptType, TxHash, Utxo,
        decode_hash, validate_address,
    },
};

use super::kupo::{DatumType, Match, MatchValue, RawScript, ScriptLanguage};

pub fn tx_hash(m: &Match) -> ProviderResult<TxHash> {
    decode_hash(&m.transaction_id, "transaction id")
}

pub fn datum_hash(m: &Match) -> ProviderResult<Option<DatumHash>> {
    m.datum_hash
        .as_deref()
        .map(|hash| decode_hash(hash, "datum hash"))
        .transpose()
}

pub fn script_hash(m: &Match) -> ProviderResult<Option<ScriptHash>> {
    m.script_hash
        .as_deref()
        .map(|hash| decode_hash(hash, "script hash"))
        .transpose()
}

pub fn is_inline(m: &Match) -> bool {
    m.datum_type == Some(DatumType::Inline)
}

pub fn assets(value: &MatchValue) -> ProviderResult<Assets> {
    let mut assets = Assets::new();
    assets.insert(AssetUnit::Lovelace, value.coins);
    for (key, quantity) in &value.assets {
        let unit = AssetUnit::from_dotted(key)
            .map_err(|err| ProviderError::decoding(format!("asset {key:?}: {err}")))?;
        if assets.insert(unit, *quantity).is_some() {
            return Err(ProviderError::decoding(format!("asset {key:?} listed twice")));
        }
    }
    Ok(assets)
}

pub fn script(raw: RawScript) -> ProviderResult<Script> {
    let kind = match raw.language {
        ScriptLanguage::Native => ScriptType::Native,
        ScriptLanguage::PlutusV1 => ScriptType::PlutusV1,
        ScriptLanguage::PlutusV2 => ScriptType::PlutusV2,
        ScriptLanguage::PlutusV3 => ScriptType::PlutusV3,
    };
    let script = match kind {
        ScriptType::Native => {
            hex::decode(&raw.script)
                .map_err(|err| ProviderError::decoding(format!("native script: {err}")))?;
            raw.script
        }
        _ => apply_double_cbor_encoding(&raw.script)?,
    };
    Ok(Script { kind, script })
}

/// Checks that a datum rehashes to the hash it was looked up by.
pub fn verified_datum(hash: &DatumHash, cbor_hex: String) -> ProviderResult<Datum> {
    let datum = Datum::new(cbor_hex)
        .map_err(|err| ProviderError::decoding(format!("datum {hash}: {err}")))?;
    let actual = datum.hash();
    if &actual != hash {
        return Err(ProviderError::decoding(format!(
            "datum {hash} has content hashing to {actual}"
        )));
    }
    Ok(datum)
}

/// Builds a canonical output from a match whose datum and script, if any,
/// have already been resolved.
pub fn utxo(m: Match, datum: Option<Datum>, script_ref: Option<Script>) -> ProviderResult<Utxo> {
    validate_address(&m.address)
        .map_err(|err| ProviderError::decoding(format!("output address: {}", err.message())))?;
    let tx_hash = tx_hash(&m)?;
    let assets = assets(&m.value)?;
    let datum_hash = if is_inline(&m) { None } else { datum_hash(&m)? };
    Ok(Utxo {
        tx_hash,
        output_index: m.output_index,
        address: m.address,
        assets,
        datum_hash,
        datum: datum.map(|d| d.as_str().to_string()),
        script_ref,
    })
}
