use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use provider_support::{Context, ProviderError, ProviderResult, http::HttpClient};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{AssetUnit, DatumHash, ScriptHash};

use super::{IndexerApi, MatchPage, MatchQuery};

/// One output as the indexer reports it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub transaction_id: String,
    pub output_index: u32,
    pub address: String,
    pub value: MatchValue,
    #[serde(default)]
    pub datum_hash: Option<String>,
    #[serde(default)]
    pub datum_type: Option<DatumType>,
    /// Only present when the indexer resolved the datum for us.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datum: Option<String>,
    #[serde(default)]
    pub script_hash: Option<String>,
    /// Only present when the indexer resolved the script for us.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<RawScript>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchValue {
    pub coins: u64,
    /// Keyed by `policy.name`, or just `policy` for an empty name.
    #[serde(default)]
    pub assets: BTreeMap<String, u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatumType {
    Hash,
    Inline,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawScript {
    pub language: ScriptLanguage,
    pub script: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptLanguage {
    #[serde(rename = "native")]
    Native,
    #[serde(rename = "plutus:v1")]
    PlutusV1,
    #[serde(rename = "plutus:v2")]
    PlutusV2,
    #[serde(rename = "plutus:v3")]
    PlutusV3,
}

#[derive(Deserialize)]
struct DatumResponse {
    datum: String,
}

/// Talks to a Kupo server over HTTP.
pub struct KupoClient {
    client: HttpClient,
    base_url: Url,
}

impl KupoClient {
    pub fn new(client: HttpClient, base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> ProviderResult<Url> {
        self.base_url
            .join(path)
            .map_err(|err| ProviderError::bad_request(format!("invalid indexer path {path:?}: {err}")))
    }

    fn matches_url(&self, query: &MatchQuery) -> ProviderResult<Url> {
        let mut url = self.url(&format!("matches/{}", query.pattern))?;
        {
            let mut pairs = url.query_pairs_mut();
            if query.unspent_only {
                pairs.append_key_only("unspent");
            }
            pairs.append_key_only("resolve_hashes");
            if let Some(AssetUnit::Native { policy, name }) = &query.asset {
                pairs.append_pair("policy_id", &policy.to_string());
                if !name.is_empty() {
                    pairs.append_pair("asset_name", &hex::encode(name));
                }
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl IndexerApi for KupoClient {
    async fn matches(&self, query: &MatchQuery, cursor: Option<&str>) -> ProviderResult<MatchPage> {
        if let Some(cursor) = cursor {
            return Err(ProviderError::bad_request(format!(
                "kupo does not paginate, got cursor {cursor:?}"
            )));
        }
        let url = self.matches_url(query)?;
        let matches: Vec<Match> = self
            .client
            .get(url)
            .await
            .context(format!("could not fetch matches for {}", query.pattern))?;
        debug!(pattern = %query.pattern, count = matches.len(), "fetched matches");
        Ok(MatchPage {
            matches,
            next: None,
        })
    }

    async fn datum(&self, hash: &DatumHash) -> ProviderResult<Option<String>> {
        let url = self.url(&format!("datums/{hash}"))?;
        let res: Option<DatumResponse> = self
            .client
            .get(url)
            .await
            .context(format!("could not fetch datum {hash}"))?;
        Ok(res.map(|r| r.datum))
    }

    async fn script(&self, hash: &ScriptHash) -> ProviderResult<Option<RawScript>> {
        let url = self.url(&format!("scripts/{hash}"))?;
        self.client
            .get(url)
            .await
            .context(format!("could not fetch script {hash}"))
    }
}
