use std::{fmt, str::FromStr};

use pallas_crypto::hash::Hasher;
use provider_support::ProviderError;
use serde::{Deserialize, Serialize};

use super::{AssetUnit, Assets, DatumHash, TxHash, parse_hash};

/// Points at one output of one transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutRef {
    pub tx_hash: TxHash,
    pub output_index: u32,
}

impl OutRef {
    pub fn new(tx_hash: TxHash, output_index: u32) -> Self {
        Self {
            tx_hash,
            output_index,
        }
    }
}

/// Accepts `txhash#index`.
impl FromStr for OutRef {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((hash, index)) = s.split_once('#') else {
            return Err(ProviderError::bad_request(format!(
                "output reference {s:?} must look like <txhash>#<index>"
            )));
        };
        let tx_hash = parse_hash(hash, "transaction hash")?;
        let output_index = index.parse().map_err(|_| {
            ProviderError::bad_request(format!("output index {index:?} is not a valid index"))
        })?;
        Ok(Self::new(tx_hash, output_index))
    }
}

impl fmt::Display for OutRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_hash, self.output_index)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptType {
    Native,
    PlutusV1,
    PlutusV2,
    PlutusV3,
}

/// A script attached to an output. Plutus scripts are kept double-CBOR encoded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    #[serde(rename = "type")]
    pub kind: ScriptType,
    pub script: String,
}

/// An unspent transaction output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    pub tx_hash: TxHash,
    pub output_index: u32,
    pub address: String,
    pub assets: Assets,
    pub datum_hash: Option<DatumHash>,
    /// Inline datum, as CBOR hex.
    pub datum: Option<String>,
    pub script_ref: Option<Script>,
}

impl Utxo {
    pub fn out_ref(&self) -> OutRef {
        OutRef::new(self.tx_hash, self.output_index)
    }

    pub fn quantity_of(&self, unit: &AssetUnit) -> u64 {
        self.assets.get(unit).copied().unwrap_or_default()
    }

    pub fn holds(&self, unit: &AssetUnit) -> bool {
        self.quantity_of(unit) > 0
    }
}

/// Raw CBOR-encoded datum, addressed by the blake2b-256 hash of its bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Datum(String);

impl Datum {
    pub fn new(cbor_hex: impl Into<String>) -> Result<Self, String> {
        let cbor_hex = cbor_hex.into();
        hex::decode(&cbor_hex).map_err(|err| format!("datum is not valid hex: {err}"))?;
        Ok(Self(cbor_hex.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // validated in the constructor
        hex::decode(&self.0).unwrap_or_default()
    }

    pub fn hash(&self) -> DatumHash {
        Hasher::<256>::hash(&self.to_bytes())
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
