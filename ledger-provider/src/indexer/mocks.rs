use std::{
    collections::{BTreeMap, HashMap},
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use provider_support::{ProviderError, ProviderResult};

use crate::model::{
    AssetUnit, Assets, DatumHash, Script, ScriptHash, ScriptType, Utxo, payment_credential,
};

use super::{
    DatumType, IndexerApi, Match, MatchPage, MatchQuery, MatchValue, Pattern, RawScript,
    ScriptLanguage, mapping,
};

pub const KEY_ADDRESS: &str = "addr_test1qrngfyc452vy4twdrepdjc50d4kvqutgt0hs9w6j2qhcdjfx0gpv7rsrjtxv97rplyz3ymyaqdwqa635zrcdena94ljs0xy950";
pub const SCRIPT_ADDRESS: &str = "addr_test1wpgexmeunzsykesf42d4eqet5yvzeap6trjnflxqtkcf66g0kpnxt";
pub const DISCOVERY_TX: &str = "b50e73e74a3073bc44f555928702c0ae0f555a43f1afdce34b3294247dce022d";
pub const DISCOVERY_UNIT: &str = "4a83e031d4c37fc7ca6177a2f3581a8eec2ce155da91f59cfdb3bb28446973636f7665727956616c696461746f72";
const DISCOVERY_KEY: &str = "4a83e031d4c37fc7ca6177a2f3581a8eec2ce155da91f59cfdb3bb28.446973636f7665727956616c696461746f72";
const DISCOVERY_SCRIPT_HASH: &str = "51936f3c98a04b6609aa9b5c832ba1182cf43a58e534fcc05db09d69";
const INLINE_TX: &str = "2a1f95a9d85bf556a3dc889831593ee963ba491ca7164d930b3af0802a9796d0";
pub const DATUM_HASH: &str = "95472c2f46b89500703ec778304baf1079c58124c254bf4bf8c96e5d73869293";
pub const DATUM: &str = "d87b9fd8799fd8799f9f581c3f2728ec78ef8b0f356e91a5662ff3124add324a7b7f5aeed69362f4581c17942ff3849b623d24e31ec709c1c94c53b9240311820a9601ad4af0581cba4ab50bdecca85162f3b8114739bc5ba3aaa6490e2b1d15ad0f9c66581c25aa4132c7ce7d8f96ee977cd921cba7681891d114d088449d1d63b2581c5309fa786856c1262d095b89adf64fe8a5255ad19142c9c537359e41ff1917701a001b77401a001b774018c818641a000927c0d8799f0a140aff021905dcd8799f9f581c1a550d5f572584e1add125b5712f709ac3b9828ad86581a4759022baff01ffffffff";

pub fn lovelace_match(address: &str, output_index: u32, coins: u64) -> Match {
    Match {
        transaction_id: DISCOVERY_TX.into(),
        output_index,
        address: address.into(),
        value: MatchValue {
            coins,
            assets: BTreeMap::new(),
        },
        datum_hash: None,
        datum_type: None,
        datum: None,
        script_hash: None,
        script: None,
    }
}

/// An output whose inline datum the indexer left for us to resolve.
pub fn inline_datum_match(address: &str, output_index: u32) -> Match {
    Match {
        transaction_id: INLINE_TX.into(),
        datum_hash: Some(DATUM_HASH.into()),
        datum_type: Some(DatumType::Inline),
        ..lovelace_match(address, output_index, 2_000_000)
    }
}

pub fn discovery_script_hash() -> ScriptHash {
    DISCOVERY_SCRIPT_HASH.parse().unwrap()
}

pub fn discovery_raw_script() -> RawScript {
    RawScript {
        language: ScriptLanguage::PlutusV2,
        script: "4d01000033222220051200120011".into(),
    }
}

/// The output holding the discovery token, with its validator attached.
pub fn discovery_match() -> Match {
    Match {
        transaction_id: DISCOVERY_TX.into(),
        output_index: 0,
        address: SCRIPT_ADDRESS.into(),
        value: MatchValue {
            coins: 1_646_190,
            assets: BTreeMap::from([(DISCOVERY_KEY.to_string(), 1)]),
        },
        datum_hash: None,
        datum_type: None,
        datum: None,
        script_hash: Some(DISCOVERY_SCRIPT_HASH.into()),
        script: Some(discovery_raw_script()),
    }
}

pub fn discovery_utxo() -> Utxo {
    let mut assets = Assets::new();
    assets.insert(AssetUnit::Lovelace, 1_646_190);
    assets.insert(DISCOVERY_UNIT.parse().unwrap(), 1);
    Utxo {
        tx_hash: DISCOVERY_TX.parse().unwrap(),
        output_index: 0,
        address: SCRIPT_ADDRESS.into(),
        assets,
        datum_hash: None,
        datum: None,
        script_ref: Some(Script {
            kind: ScriptType::PlutusV2,
            script: "4e4d01000033222220051200120011".into(),
        }),
    }
}

/// An in-memory indexer which understands the same patterns as the real one.
#[derive(Default)]
pub struct MockIndexer {
    outputs: Vec<(Match, bool)>,
    datums: HashMap<DatumHash, String>,
    scripts: HashMap<ScriptHash, RawScript>,
    page_size: Option<usize>,
    failing: bool,
    match_calls: AtomicUsize,
    datum_calls: AtomicUsize,
    script_calls: AtomicUsize,
}

impl MockIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, m: Match) -> Self {
        self.outputs.push((m, false));
        self
    }

    pub fn with_spent_output(mut self, m: Match) -> Self {
        self.outputs.push((m, true));
        self
    }

    pub fn with_datum(mut self, hash: &str, cbor_hex: &str) -> Self {
        self.datums.insert(hash.parse().unwrap(), cbor_hex.into());
        self
    }

    pub fn with_script(mut self, hash: ScriptHash, script: RawScript) -> Self {
        self.scripts.insert(hash, script);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Every request fails as if the server were down.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn match_calls(&self) -> usize {
        self.match_calls.load(Ordering::SeqCst)
    }

    pub fn datum_calls(&self) -> usize {
        self.datum_calls.load(Ordering::SeqCst)
    }

    pub fn script_calls(&self) -> usize {
        self.script_calls.load(Ordering::SeqCst)
    }

    fn check_up(&self) -> ProviderResult<()> {
        if self.failing {
            return Err(ProviderError::backend_unavailable("connection refused"));
        }
        Ok(())
    }
}

fn holds(m: &Match, unit: &AssetUnit) -> bool {
    let Ok(assets) = mapping::assets(&m.value) else {
        return false;
    };
    match unit {
        AssetUnit::Lovelace => true,
        AssetUnit::Native { policy, name } if name.is_empty() => {
            assets.keys().any(|u| u.policy_id() == Some(policy))
        }
        unit => assets.contains_key(unit),
    }
}

fn matches_pattern(m: &Match, pattern: &Pattern) -> bool {
    match pattern {
        Pattern::Address(address) => &m.address == address,
        Pattern::PaymentCredential(hash) => payment_credential(&m.address).ok() == Some(*hash),
        Pattern::Asset(unit) => holds(m, unit),
        Pattern::Transaction(hash) => m.transaction_id == hash.to_string(),
    }
}

#[async_trait]
impl IndexerApi for MockIndexer {
    async fn matches(&self, query: &MatchQuery, cursor: Option<&str>) -> ProviderResult<MatchPage> {
        self.match_calls.fetch_add(1, Ordering::SeqCst);
        self.check_up()?;
        let all: Vec<Match> = self
            .outputs
            .iter()
            .filter(|(_, spent)| !(query.unspent_only && *spent))
            .map(|(m, _)| m)
            .filter(|m| matches_pattern(m, &query.pattern))
            .filter(|m| query.asset.as_ref().is_none_or(|unit| holds(m, unit)))
            .cloned()
            .collect();

        let start = match cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| ProviderError::bad_request(format!("bad cursor {cursor:?}")))?,
            None => 0,
        };
        let end = match self.page_size {
            Some(size) => (start + size).min(all.len()),
            None => all.len(),
        };
        let next = (end < all.len()).then(|| end.to_string());
        Ok(MatchPage {
            matches: all[start.min(end)..end].to_vec(),
            next,
        })
    }

    async fn datum(&self, hash: &DatumHash) -> ProviderResult<Option<String>> {
        self.datum_calls.fetch_add(1, Ordering::SeqCst);
        self.check_up()?;
        Ok(self.datums.get(hash).cloned())
    }

    async fn script(&self, hash: &ScriptHash) -> ProviderResult<Option<RawScript>> {
        self.script_calls.fetch_add(1, Ordering::SeqCst);
        self.check_up()?;
        Ok(self.scripts.get(hash).cloned())
    }
}
