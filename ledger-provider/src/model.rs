use pallas_crypto::hash::Hash;
use provider_support::{ProviderError, ProviderResult};

mod address;
mod ledger;
mod unit;
mod utxo;

pub use address::{
    StakeCredential, parse_stake_address, payment_credential, validate_address,
};
pub use ledger::{ChainTip, Delegation, EvalRedeemer, ExUnits, ProtocolParameters, RedeemerTag};
pub use unit::{AssetUnit, Assets};
pub use utxo::{Datum, OutRef, Script, ScriptType, Utxo};

pub type TxHash = Hash<32>;
pub type BlockHash = Hash<32>;
pub type DatumHash = Hash<32>;
pub type ScriptHash = Hash<28>;
pub type PolicyId = Hash<28>;
pub type CredentialHash = Hash<28>;

/// Parses a hex hash supplied by a caller.
pub fn parse_hash<const N: usize>(value: &str, what: &str) -> ProviderResult<Hash<N>> {
    value
        .parse()
        .map_err(|err| ProviderError::bad_request(format!("invalid {what} {value:?}: {err}")))
}

/// Parses a hex hash returned by a backend.
pub(crate) fn decode_hash<const N: usize>(value: &str, what: &str) -> ProviderResult<Hash<N>> {
    value
        .parse()
        .map_err(|err| ProviderError::decoding(format!("invalid {what} {value:?}: {err}")))
}
