use pallas_addresses::{Address, ByronAddress, ShelleyPaymentPart, StakePayload};
use provider_support::{ProviderError, ProviderResult};

use super::CredentialHash;

/// The credential a stake address delegates with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StakeCredential {
    Key(CredentialHash),
    Script(CredentialHash),
}

impl StakeCredential {
    pub fn hash(&self) -> &CredentialHash {
        match self {
            Self::Key(hash) | Self::Script(hash) => hash,
        }
    }
}

/// Checks that `address` is something outputs can be locked at: a bech32
/// Shelley address or a base58 Byron address.
pub fn validate_address(address: &str) -> ProviderResult<()> {
    if ByronAddress::from_base58(address).is_ok() {
        return Ok(());
    }
    match Address::from_bech32(address) {
        Ok(Address::Shelley(_)) => Ok(()),
        Ok(_) => Err(ProviderError::bad_request(format!(
            "{address:?} is not a payment address"
        ))),
        Err(err) => Err(ProviderError::bad_request(format!(
            "invalid address {address:?}: {err}"
        ))),
    }
}

/// Returns the payment credential hash of a Shelley address.
pub fn payment_credential(address: &str) -> ProviderResult<CredentialHash> {
    let parsed = Address::from_bech32(address).map_err(|err| {
        ProviderError::bad_request(format!("invalid address {address:?}: {err}"))
    })?;
    let Address::Shelley(shelley) = parsed else {
        return Err(ProviderError::bad_request(format!(
            "{address:?} has no payment credential"
        )));
    };
    match shelley.payment() {
        ShelleyPaymentPart::Key(hash) | ShelleyPaymentPart::Script(hash) => Ok(*hash),
    }
}

/// Decodes a bech32 reward address.
pub fn parse_stake_address(address: &str) -> ProviderResult<StakeCredential> {
    let parsed = Address::from_bech32(address).map_err(|err| {
        ProviderError::bad_request(format!("invalid stake address {address:?}: {err}"))
    })?;
    let Address::Stake(stake) = parsed else {
        return Err(ProviderError::bad_request(format!(
            "{address:?} is not a stake address"
        )));
    };
    Ok(match stake.payload() {
        StakePayload::Stake(hash) => StakeCredential::Key(*hash),
        StakePayload::Script(hash) => StakeCredential::Script(*hash),
    })
}
