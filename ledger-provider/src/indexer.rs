use std::{
    collections::{BTreeMap, BTreeSet, HashMap, hash_map::Entry},
    fmt,
    sync::Arc,
};

use async_trait::async_trait;
use futures::future::try_join_all;
use provider_support::{Context, ProviderError, ProviderResult};
use tracing::{debug, instrument};

use crate::{
    model::{
        AssetUnit, CredentialHash, Datum, DatumHash, OutRef, Script, ScriptHash, TxHash, Utxo,
        validate_address,
    },
    poller::TxLookup,
};

mod kupo;
mod mapping;
#[cfg(test)]
pub mod mocks;

pub use kupo::{DatumType, KupoClient, Match, MatchValue, RawScript, ScriptLanguage};

pub const DEFAULT_MAX_PAGES: usize = 100;

/// Selects outputs, in the indexer's own pattern syntax.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pattern {
    Address(String),
    PaymentCredential(CredentialHash),
    /// Any asset minted by the policy when the name is empty.
    Asset(AssetUnit),
    Transaction(TxHash),
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(address) => f.write_str(address),
            Self::PaymentCredential(hash) => write!(f, "{hash}/*"),
            Self::Asset(AssetUnit::Lovelace) => f.write_str("*"),
            Self::Asset(AssetUnit::Native { policy, name }) if name.is_empty() => {
                write!(f, "{policy}.*")
            }
            Self::Asset(AssetUnit::Native { policy, name }) => {
                write!(f, "{policy}.{}", hex::encode(name))
            }
            Self::Transaction(hash) => write!(f, "*@{hash}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchQuery {
    pub pattern: Pattern,
    pub unspent_only: bool,
    /// Narrows the results to outputs holding this asset.
    pub asset: Option<AssetUnit>,
}

impl MatchQuery {
    pub fn unspent(pattern: Pattern) -> Self {
        Self {
            pattern,
            unspent_only: true,
            asset: None,
        }
    }

    /// Includes outputs which have since been spent.
    pub fn all(pattern: Pattern) -> Self {
        Self {
            pattern,
            unspent_only: false,
            asset: None,
        }
    }

    pub fn with_asset(self, unit: AssetUnit) -> Self {
        Self {
            asset: Some(unit),
            ..self
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MatchPage {
    pub matches: Vec<Match>,
    /// Opaque continuation token, if more results are available.
    pub next: Option<String>,
}

/// The requests an indexer backend must answer.
#[async_trait]
pub trait IndexerApi: Send + Sync {
    async fn matches(&self, query: &MatchQuery, cursor: Option<&str>) -> ProviderResult<MatchPage>;
    async fn datum(&self, hash: &DatumHash) -> ProviderResult<Option<String>>;
    async fn script(&self, hash: &ScriptHash) -> ProviderResult<Option<RawScript>>;
}

/// Answers output, datum and script queries against an indexer.
#[derive(Clone)]
pub struct IndexerClient {
    api: Arc<dyn IndexerApi>,
    max_pages: usize,
}

impl IndexerClient {
    pub fn new(api: Arc<dyn IndexerApi>) -> Self {
        Self {
            api,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_max_pages(self, max_pages: usize) -> Self {
        Self {
            max_pages: max_pages.max(1),
            ..self
        }
    }

    #[instrument(skip(self))]
    pub async fn get_utxos(&self, address: &str) -> ProviderResult<Vec<Utxo>> {
        validate_address(address)?;
        let query = MatchQuery::unspent(Pattern::Address(address.to_string()));
        let matches = self.collect(&query).await?;
        self.resolve(matches).await
    }

    #[instrument(skip(self))]
    pub async fn get_utxos_by_credential(
        &self,
        credential: &CredentialHash,
    ) -> ProviderResult<Vec<Utxo>> {
        let query = MatchQuery::unspent(Pattern::PaymentCredential(*credential));
        let matches = self.collect(&query).await?;
        self.resolve(matches).await
    }

    #[instrument(skip(self, unit), fields(%unit))]
    pub async fn get_utxos_with_unit(
        &self,
        address: &str,
        unit: &AssetUnit,
    ) -> ProviderResult<Vec<Utxo>> {
        validate_address(address)?;
        let mut query = MatchQuery::unspent(Pattern::Address(address.to_string()));
        if let AssetUnit::Native { .. } = unit {
            query = query.with_asset(unit.clone());
        }
        let matches = self.collect(&query).await?;
        let utxos = self.resolve(matches).await?;
        Ok(utxos.into_iter().filter(|u| u.holds(unit)).collect())
    }

    #[instrument(skip(self, unit), fields(%unit))]
    pub async fn get_utxo_by_unit(&self, unit: &AssetUnit) -> ProviderResult<Utxo> {
        if unit == &AssetUnit::Lovelace {
            return Err(ProviderError::bad_request(
                "lovelace is held by every output, so it cannot identify one",
            ));
        }
        let query = MatchQuery::unspent(Pattern::Asset(unit.clone()));
        let matches = self.collect(&query).await?;
        let mut utxos: Vec<Utxo> = self
            .resolve(matches)
            .await?
            .into_iter()
            .filter(|u| u.holds(unit))
            .collect();
        match utxos.len() {
            0 => Err(ProviderError::not_found(format!(
                "no unspent output holds {unit}"
            ))),
            1 => Ok(utxos.remove(0)),
            n => Err(ProviderError::ambiguous(format!(
                "{n} unspent outputs hold {unit}"
            ))
            .with_field("count", n)),
        }
    }

    /// Looks up each transaction once, however many of its outputs were asked for.
    #[instrument(skip_all, fields(count = out_refs.len()))]
    pub async fn get_utxos_by_out_ref(&self, out_refs: &[OutRef]) -> ProviderResult<Vec<Utxo>> {
        let mut wanted: BTreeMap<TxHash, BTreeSet<u32>> = BTreeMap::new();
        for out_ref in out_refs {
            wanted
                .entry(out_ref.tx_hash)
                .or_default()
                .insert(out_ref.output_index);
        }

        let lookups = wanted.iter().map(|(tx_hash, indices)| async move {
            let query = MatchQuery::unspent(Pattern::Transaction(*tx_hash));
            let matches = self.collect(&query).await?;
            Ok::<_, ProviderError>(
                matches
                    .into_iter()
                    .filter(|m| indices.contains(&m.output_index))
                    .collect::<Vec<_>>(),
            )
        });
        let matches = try_join_all(lookups).await?.into_iter().flatten().collect();
        self.resolve(matches).await
    }

    #[instrument(skip(self))]
    pub async fn get_datum(&self, hash: &DatumHash) -> ProviderResult<Datum> {
        let Some(cbor_hex) = self.api.datum(hash).await? else {
            return Err(ProviderError::not_found(format!(
                "datum {hash} has not been observed"
            )));
        };
        mapping::verified_datum(hash, cbor_hex)
    }

    /// True once the indexer has seen any output of the transaction, spent or not.
    pub async fn is_tx_observed(&self, tx_hash: &TxHash) -> ProviderResult<bool> {
        let query = MatchQuery::all(Pattern::Transaction(*tx_hash));
        let page = self.api.matches(&query, None).await?;
        Ok(!page.matches.is_empty())
    }

    /// Follows continuation cursors until the indexer runs out of results.
    async fn collect(&self, query: &MatchQuery) -> ProviderResult<Vec<Match>> {
        let mut matches = vec![];
        let mut cursor: Option<String> = None;
        for page_number in 1..=self.max_pages {
            let page = self.api.matches(query, cursor.as_deref()).await?;
            debug!(pattern = %query.pattern, page_number, count = page.matches.len(), "fetched page");
            matches.extend(page.matches);
            match page.next {
                Some(next) => cursor = Some(next),
                None => return Ok(matches),
            }
        }
        Err(ProviderError::pagination_limit(format!(
            "query for {} needed more than {} pages",
            query.pattern, self.max_pages
        ))
        .with_field("maxPages", self.max_pages))
    }

    /// Maps matches to outputs, fetching any datums and scripts the indexer
    /// did not inline. Drops repeated outputs.
    async fn resolve(&self, matches: Vec<Match>) -> ProviderResult<Vec<Utxo>> {
        let mut refs = Refs::new(self.api.as_ref());
        let mut seen = BTreeSet::new();
        let mut utxos = Vec::with_capacity(matches.len());
        for mut m in matches {
            let out_ref = OutRef::new(mapping::tx_hash(&m)?, m.output_index);
            if !seen.insert(out_ref) {
                continue;
            }

            let datum = if mapping::is_inline(&m) {
                let hash = mapping::datum_hash(&m)?.ok_or_else(|| {
                    ProviderError::decoding(format!("inline datum of {out_ref} has no hash"))
                })?;
                let datum = match m.datum.take() {
                    Some(inline) => mapping::verified_datum(&hash, inline)?,
                    None => refs.datum(&hash).await?.clone(),
                };
                Some(datum)
            } else {
                None
            };

            let script = match mapping::script_hash(&m)? {
                Some(hash) => match m.script.take() {
                    Some(inline) => Some(mapping::script(inline)?),
                    None => Some(refs.script(&hash).await?.clone()),
                },
                None => None,
            };

            utxos.push(mapping::utxo(m, datum, script).context(format!("output {out_ref}"))?);
        }
        Ok(utxos)
    }
}

#[async_trait]
impl TxLookup for IndexerClient {
    async fn is_confirmed(&self, tx_hash: &TxHash) -> ProviderResult<bool> {
        self.is_tx_observed(tx_hash).await
    }
}

/// Datums and scripts fetched while serving one call.
struct Refs<'a> {
    api: &'a dyn IndexerApi,
    datums: HashMap<DatumHash, Datum>,
    scripts: HashMap<ScriptHash, Script>,
}

impl<'a> Refs<'a> {
    fn new(api: &'a dyn IndexerApi) -> Self {
        Self {
            api,
            datums: HashMap::new(),
            scripts: HashMap::new(),
        }
    }

    async fn datum(&mut self, hash: &DatumHash) -> ProviderResult<&Datum> {
        match self.datums.entry(*hash) {
            Entry::Occupied(datum) => Ok(datum.into_mut()),
            Entry::Vacant(entry) => {
                let Some(cbor_hex) = self.api.datum(entry.key()).await? else {
                    return Err(ProviderError::decoding(format!(
                        "indexer reported inline datum {hash} but cannot resolve it"
                    )));
                };
                let datum = mapping::verified_datum(hash, cbor_hex)?;
                Ok(entry.insert(datum))
            }
        }
    }

    async fn script(&mut self, hash: &ScriptHash) -> ProviderResult<&Script> {
        match self.scripts.entry(*hash) {
            Entry::Occupied(script) => Ok(script.into_mut()),
            Entry::Vacant(entry) => {
                let Some(raw) = self.api.script(entry.key()).await? else {
                    return Err(ProviderError::decoding(format!(
                        "indexer reported script {hash} but cannot resolve it"
                    )));
                };
                let script = mapping::script(raw)?;
                Ok(entry.insert(script))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use provider_support::ErrorKind;

    use super::*;
    use crate::indexer::mocks::{
        self, DATUM, DATUM_HASH, DISCOVERY_TX, DISCOVERY_UNIT, KEY_ADDRESS, MockIndexer,
        SCRIPT_ADDRESS,
    };

    fn client(mock: &Arc<MockIndexer>) -> IndexerClient {
        IndexerClient::new(mock.clone())
    }

    #[test]
    fn patterns_use_indexer_syntax() {
        let unit: AssetUnit = DISCOVERY_UNIT.parse().unwrap();
        let policy = unit.policy_id().unwrap().to_string();
        assert_eq!(
            Pattern::Asset(unit).to_string(),
            format!("{policy}.446973636f7665727956616c696461746f72")
        );
        assert_eq!(
            Pattern::Asset(AssetUnit::from_dotted(&policy).unwrap()).to_string(),
            format!("{policy}.*")
        );
        let tx: TxHash = DISCOVERY_TX.parse().unwrap();
        assert_eq!(Pattern::Transaction(tx).to_string(), format!("*@{DISCOVERY_TX}"));
        let credential: CredentialHash = "e6849315a2984aadcd1e42d9628f6d6cc071685bef02bb52502f86c9"
            .parse()
            .unwrap();
        assert_eq!(
            Pattern::PaymentCredential(credential).to_string(),
            "e6849315a2984aadcd1e42d9628f6d6cc071685bef02bb52502f86c9/*"
        );
    }

    #[tokio::test]
    async fn empty_addresses_have_no_utxos() {
        let mock = Arc::new(MockIndexer::new());
        let utxos = client(&mock).get_utxos(KEY_ADDRESS).await.unwrap();
        assert!(utxos.is_empty());
    }

    #[tokio::test]
    async fn malformed_addresses_never_reach_the_indexer() {
        let mock = Arc::new(MockIndexer::new());
        let err = client(&mock).get_utxos("addr_oops").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(mock.match_calls(), 0);
    }

    #[tokio::test]
    async fn merges_every_page() {
        let mut mock = MockIndexer::new().with_page_size(2);
        for index in 0..5 {
            mock = mock.with_output(mocks::lovelace_match(KEY_ADDRESS, index, 1_000_000));
        }
        let mock = Arc::new(mock);
        let utxos = client(&mock).get_utxos(KEY_ADDRESS).await.unwrap();
        assert_eq!(utxos.len(), 5);
        assert_eq!(mock.match_calls(), 3);
    }

    #[tokio::test]
    async fn stops_after_max_pages() {
        let mut mock = MockIndexer::new().with_page_size(1);
        for index in 0..5 {
            mock = mock.with_output(mocks::lovelace_match(KEY_ADDRESS, index, 1_000_000));
        }
        let mock = Arc::new(mock);
        let err = client(&mock)
            .with_max_pages(3)
            .get_utxos(KEY_ADDRESS)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PaginationLimit);
        assert_eq!(mock.match_calls(), 3);
    }

    #[tokio::test]
    async fn drops_repeated_outputs() {
        let mock = Arc::new(
            MockIndexer::new()
                .with_output(mocks::lovelace_match(KEY_ADDRESS, 0, 1_000_000))
                .with_output(mocks::lovelace_match(KEY_ADDRESS, 0, 1_000_000)),
        );
        let utxos = client(&mock).get_utxos(KEY_ADDRESS).await.unwrap();
        assert_eq!(utxos.len(), 1);
    }

    #[tokio::test]
    async fn skips_spent_outputs() {
        let mock = Arc::new(
            MockIndexer::new()
                .with_output(mocks::lovelace_match(KEY_ADDRESS, 0, 1_000_000))
                .with_spent_output(mocks::lovelace_match(KEY_ADDRESS, 1, 1_000_000)),
        );
        let utxos = client(&mock).get_utxos(KEY_ADDRESS).await.unwrap();
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].output_index, 0);
    }

    #[tokio::test]
    async fn finds_outputs_by_payment_credential() {
        let mock = Arc::new(
            MockIndexer::new()
                .with_output(mocks::lovelace_match(KEY_ADDRESS, 3, 1_000_000))
                .with_output(mocks::discovery_match()),
        );
        let credential: CredentialHash = "51936f3c98a04b6609aa9b5c832ba1182cf43a58e534fcc05db09d69"
            .parse()
            .unwrap();
        let utxos = client(&mock)
            .get_utxos_by_credential(&credential)
            .await
            .unwrap();
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].address, SCRIPT_ADDRESS);
    }

    #[tokio::test]
    async fn filters_outputs_by_unit() {
        let mock = Arc::new(
            MockIndexer::new()
                .with_output(mocks::lovelace_match(SCRIPT_ADDRESS, 7, 1_000_000))
                .with_output(mocks::discovery_match()),
        );
        let unit: AssetUnit = DISCOVERY_UNIT.parse().unwrap();
        let utxos = client(&mock)
            .get_utxos_with_unit(SCRIPT_ADDRESS, &unit)
            .await
            .unwrap();
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].quantity_of(&unit), 1);
    }

    #[tokio::test]
    async fn finds_the_unique_holder_of_a_unit() {
        let mock = Arc::new(MockIndexer::new().with_output(mocks::discovery_match()));
        let unit: AssetUnit = DISCOVERY_UNIT.parse().unwrap();
        let utxo = client(&mock).get_utxo_by_unit(&unit).await.unwrap();
        assert_eq!(utxo, mocks::discovery_utxo());
    }

    #[tokio::test]
    async fn two_holders_are_ambiguous() {
        let mut second = mocks::discovery_match();
        second.output_index = 1;
        let mock = Arc::new(
            MockIndexer::new()
                .with_output(mocks::discovery_match())
                .with_output(second),
        );
        let unit: AssetUnit = DISCOVERY_UNIT.parse().unwrap();
        let err = client(&mock).get_utxo_by_unit(&unit).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AmbiguousResult);
    }

    #[tokio::test]
    async fn no_holders_is_not_found() {
        let mock = Arc::new(MockIndexer::new());
        let unit: AssetUnit = DISCOVERY_UNIT.parse().unwrap();
        let err = client(&mock).get_utxo_by_unit(&unit).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn lovelace_cannot_identify_an_output() {
        let mock = Arc::new(MockIndexer::new());
        let err = client(&mock)
            .get_utxo_by_unit(&AssetUnit::Lovelace)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(mock.match_calls(), 0);
    }

    #[tokio::test]
    async fn out_refs_resolve_to_known_outputs() {
        let mock = Arc::new(MockIndexer::new().with_output(mocks::discovery_match()));
        let tx: TxHash = DISCOVERY_TX.parse().unwrap();

        let found = client(&mock)
            .get_utxos_by_out_ref(&[OutRef::new(tx, 0)])
            .await
            .unwrap();
        assert_eq!(found, vec![mocks::discovery_utxo()]);

        let missing = client(&mock)
            .get_utxos_by_out_ref(&[OutRef::new(tx, 9)])
            .await
            .unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn out_refs_omit_spent_and_repeated_refs() {
        let tx: TxHash = DISCOVERY_TX.parse().unwrap();
        let mut spent = mocks::discovery_match();
        spent.output_index = 1;
        let other_tx = "2a1f95a9d85bf556a3dc889831593ee963ba491ca7164d930b3af0802a9796d0";
        let mut other = mocks::lovelace_match(KEY_ADDRESS, 0, 5_000_000);
        other.transaction_id = other_tx.into();
        let mock = Arc::new(
            MockIndexer::new()
                .with_output(mocks::discovery_match())
                .with_spent_output(spent)
                .with_output(mocks::lovelace_match(KEY_ADDRESS, 2, 1_000_000))
                .with_output(other),
        );

        let refs = [
            OutRef::new(tx, 0),
            OutRef::new(tx, 1),
            OutRef::new(tx, 0),
            OutRef::new(other_tx.parse().unwrap(), 0),
        ];
        let utxos = client(&mock).get_utxos_by_out_ref(&refs).await.unwrap();
        let found: Vec<OutRef> = utxos.iter().map(|u| u.out_ref()).collect();
        assert_eq!(found.len(), 2);
        assert!(found.contains(&OutRef::new(tx, 0)));
        assert!(found.contains(&OutRef::new(other_tx.parse().unwrap(), 0)));
        // one query per distinct transaction
        assert_eq!(mock.match_calls(), 2);
    }

    #[tokio::test]
    async fn datums_rehash_to_their_key() {
        let hash: DatumHash = DATUM_HASH.parse().unwrap();
        let mock = Arc::new(MockIndexer::new().with_datum(DATUM_HASH, DATUM));
        let datum = client(&mock).get_datum(&hash).await.unwrap();
        assert_eq!(datum.as_str(), DATUM);
        assert_eq!(datum.hash(), hash);
    }

    #[tokio::test]
    async fn unknown_datums_are_not_found() {
        let mock = Arc::new(MockIndexer::new());
        let hash: DatumHash = DATUM_HASH.parse().unwrap();
        let err = client(&mock).get_datum(&hash).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn tampered_datums_are_rejected() {
        let mock = Arc::new(MockIndexer::new().with_datum(DATUM_HASH, "d87980"));
        let hash: DatumHash = DATUM_HASH.parse().unwrap();
        let err = client(&mock).get_datum(&hash).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decoding);
    }

    #[tokio::test]
    async fn resolves_each_datum_once_per_call() {
        let mut mock = MockIndexer::new().with_datum(DATUM_HASH, DATUM);
        for index in 0..3 {
            mock = mock.with_output(mocks::inline_datum_match(KEY_ADDRESS, index));
        }
        let mock = Arc::new(mock);
        let client = client(&mock);

        let utxos = client.get_utxos(KEY_ADDRESS).await.unwrap();
        assert_eq!(utxos.len(), 3);
        assert!(utxos.iter().all(|u| u.datum.as_deref() == Some(DATUM)));
        assert_eq!(mock.datum_calls(), 1);

        client.get_utxos(KEY_ADDRESS).await.unwrap();
        assert_eq!(mock.datum_calls(), 2);
    }

    #[tokio::test]
    async fn unresolvable_inline_datums_fail() {
        let mock = Arc::new(MockIndexer::new().with_output(mocks::inline_datum_match(KEY_ADDRESS, 0)));
        let err = client(&mock).get_utxos(KEY_ADDRESS).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decoding);
    }

    #[tokio::test]
    async fn resolves_script_references() {
        let mut with_script = mocks::discovery_match();
        with_script.script = None;
        let mock = Arc::new(
            MockIndexer::new()
                .with_output(with_script)
                .with_script(mocks::discovery_script_hash(), mocks::discovery_raw_script()),
        );
        let utxos = client(&mock).get_utxos(SCRIPT_ADDRESS).await.unwrap();
        assert_eq!(utxos, vec![mocks::discovery_utxo()]);
        assert_eq!(mock.script_calls(), 1);
    }

    #[tokio::test]
    async fn observes_spent_transactions_too() {
        let tx: TxHash = DISCOVERY_TX.parse().unwrap();
        let mock = Arc::new(MockIndexer::new().with_spent_output(mocks::discovery_match()));
        assert!(client(&mock).is_tx_observed(&tx).await.unwrap());

        let unknown: TxHash = "2a1f95a9d85bf556a3dc889831593ee963ba491ca7164d930b3af0802a9796d0"
            .parse()
            .unwrap();
        assert!(!client(&mock).is_tx_observed(&unknown).await.unwrap());
    }

    #[tokio::test]
    async fn backend_failures_propagate() {
        let mock = Arc::new(MockIndexer::new().failing());
        let err = client(&mock).get_utxos(KEY_ADDRESS).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        assert_eq!(mock.match_calls(), 1);
    }
}
