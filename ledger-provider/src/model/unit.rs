use std::{collections::BTreeMap, fmt, str::FromStr};

use provider_support::ProviderError;
use serde::{Deserialize, Serialize};

use super::PolicyId;

const POLICY_ID_HEX_LEN: usize = 56;
const MAX_ASSET_NAME_LEN: usize = 32;

/// Identifies a kind of value an output can hold: either the chain's base
/// unit, or a native asset named by its minting policy and asset name.
///
/// Orders `lovelace` before every native asset.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetUnit {
    Lovelace,
    Native { policy: PolicyId, name: Vec<u8> },
}

/// Quantities held by an output, keyed by unit.
pub type Assets = BTreeMap<AssetUnit, u64>;

impl AssetUnit {
    pub fn native(policy: PolicyId, name: impl Into<Vec<u8>>) -> Self {
        Self::Native {
            policy,
            name: name.into(),
        }
    }

    pub fn policy_id(&self) -> Option<&PolicyId> {
        match self {
            Self::Lovelace => None,
            Self::Native { policy, .. } => Some(policy),
        }
    }

    pub fn asset_name(&self) -> Option<&[u8]> {
        match self {
            Self::Lovelace => None,
            Self::Native { name, .. } => Some(name),
        }
    }

    /// Parses the indexer's `policy.name` key, where `.name` is omitted for
    /// assets with an empty name.
    pub fn from_dotted(key: &str) -> Result<Self, String> {
        let (policy, name) = key.split_once('.').unwrap_or((key, ""));
        parse_parts(policy, name)
    }
}

fn parse_parts(policy: &str, name: &str) -> Result<AssetUnit, String> {
    if policy.len() != POLICY_ID_HEX_LEN {
        return Err(format!("policy id must be {POLICY_ID_HEX_LEN} hex characters"));
    }
    let policy = policy
        .parse::<PolicyId>()
        .map_err(|err| format!("invalid policy id: {err}"))?;
    let name = hex::decode(name).map_err(|err| format!("invalid asset name: {err}"))?;
    if name.len() > MAX_ASSET_NAME_LEN {
        return Err(format!(
            "asset name is {} bytes, at most {MAX_ASSET_NAME_LEN} are allowed",
            name.len()
        ));
    }
    Ok(AssetUnit::Native { policy, name })
}

impl FromStr for AssetUnit {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "lovelace" {
            return Ok(Self::Lovelace);
        }
        let Some((policy, name)) = s.split_at_checked(POLICY_ID_HEX_LEN) else {
            return Err(ProviderError::bad_request(format!(
                "asset unit {s:?} does not start with a policy id"
            )));
        };
        parse_parts(policy, name)
            .map_err(|err| ProviderError::bad_request(format!("asset unit {s:?}: {err}")))
    }
}

impl fmt::Display for AssetUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lovelace => f.write_str("lovelace"),
            Self::Native { policy, name } => write!(f, "{policy}{}", hex::encode(name)),
        }
    }
}

impl Serialize for AssetUnit {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AssetUnit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}
