use std::sync::Arc;

use anyhow::Result;
use provider_support::{
    ProviderResult,
    http::{HttpClient, HttpClientConfig},
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::instrument;

use crate::{
    config::{BackendConfig, ProviderConfig},
    indexer::{IndexerApi, IndexerClient, KupoClient},
    model::{
        AssetUnit, ChainTip, CredentialHash, Datum, DatumHash, Delegation, EvalRedeemer, OutRef,
        ProtocolParameters, TxHash, Utxo,
    },
    node_bridge::{NodeBridgeApi, NodeBridgeClient, OgmiosClient},
    poller::{self, AwaitTxOptions, Timer, TokioTimer},
};

/// One query interface over an indexer and a node bridge.
#[derive(Clone)]
pub struct Provider {
    indexer: IndexerClient,
    node_bridge: NodeBridgeClient,
    timer: Arc<dyn Timer>,
    await_options: AwaitTxOptions,
}

impl Provider {
    pub fn new(indexer: Arc<dyn IndexerApi>, node_bridge: Arc<dyn NodeBridgeApi>) -> Self {
        Self {
            indexer: IndexerClient::new(indexer),
            node_bridge: NodeBridgeClient::new(node_bridge),
            timer: Arc::new(TokioTimer),
            await_options: AwaitTxOptions::default(),
        }
    }

    /// Connects to a Kupo indexer and an Ogmios node bridge over HTTP.
    pub fn connect(config: &ProviderConfig, http: &HttpClientConfig) -> Result<Self> {
        let kupo = KupoClient::new(backend_client(&config.indexer, http)?, &config.indexer.url)?;
        let ogmios = OgmiosClient::new(
            backend_client(&config.node_bridge, http)?,
            &config.node_bridge.url,
        )?;
        Ok(Self::new(Arc::new(kupo), Arc::new(ogmios))
            .with_max_pages(config.pagination.max_pages)
            .with_await_options(AwaitTxOptions::try_from(&config.await_tx)?))
    }

    pub fn with_timer(self, timer: Arc<dyn Timer>) -> Self {
        Self { timer, ..self }
    }

    pub fn with_max_pages(self, max_pages: usize) -> Self {
        Self {
            indexer: self.indexer.with_max_pages(max_pages),
            ..self
        }
    }

    /// Sets the options `await_tx` uses.
    pub fn with_await_options(self, await_options: AwaitTxOptions) -> Self {
        Self {
            await_options,
            ..self
        }
    }

    pub async fn get_protocol_parameters(&self) -> ProviderResult<ProtocolParameters> {
        self.node_bridge.get_protocol_parameters().await
    }

    pub async fn get_utxos(&self, address: &str) -> ProviderResult<Vec<Utxo>> {
        self.indexer.get_utxos(address).await
    }

    pub async fn get_utxos_by_credential(
        &self,
        credential: &CredentialHash,
    ) -> ProviderResult<Vec<Utxo>> {
        self.indexer.get_utxos_by_credential(credential).await
    }

    pub async fn get_utxos_with_unit(
        &self,
        address: &str,
        unit: &AssetUnit,
    ) -> ProviderResult<Vec<Utxo>> {
        self.indexer.get_utxos_with_unit(address, unit).await
    }

    pub async fn get_utxo_by_unit(&self, unit: &AssetUnit) -> ProviderResult<Utxo> {
        self.indexer.get_utxo_by_unit(unit).await
    }

    pub async fn get_utxos_by_out_ref(&self, out_refs: &[OutRef]) -> ProviderResult<Vec<Utxo>> {
        self.indexer.get_utxos_by_out_ref(out_refs).await
    }

    pub async fn get_delegation(&self, stake_address: &str) -> ProviderResult<Delegation> {
        self.node_bridge.get_delegation(stake_address).await
    }

    pub async fn get_datum(&self, hash: &DatumHash) -> ProviderResult<Datum> {
        self.indexer.get_datum(hash).await
    }

    pub async fn submit_tx(&self, cbor_hex: &str) -> ProviderResult<TxHash> {
        self.node_bridge.submit_tx(cbor_hex).await
    }

    pub async fn evaluate_tx(&self, cbor_hex: &str) -> ProviderResult<Vec<EvalRedeemer>> {
        self.node_bridge.evaluate_tx(cbor_hex).await
    }

    pub async fn get_tip(&self) -> ProviderResult<ChainTip> {
        self.node_bridge.get_tip().await
    }

    /// Waits for the indexer to observe the transaction.
    pub async fn await_tx(&self, tx_hash: &TxHash) -> ProviderResult<bool> {
        self.await_tx_with(tx_hash, &self.await_options).await
    }

    #[instrument(skip(self, options))]
    pub async fn await_tx_with(
        &self,
        tx_hash: &TxHash,
        options: &AwaitTxOptions,
    ) -> ProviderResult<bool> {
        poller::await_tx(&self.indexer, self.timer.as_ref(), tx_hash, options).await
    }
}

fn backend_client(backend: &BackendConfig, http: &HttpClientConfig) -> Result<HttpClient> {
    let mut headers = HeaderMap::new();
    if let Some(key) = &backend.api_key {
        let name = HeaderName::from_bytes(backend.api_key_header.as_bytes())?;
        let mut value = HeaderValue::from_str(&key.0)?;
        value.set_sensitive(true);
        headers.insert(name, value);
    }
    HttpClient::with_headers(http, headers)
}
