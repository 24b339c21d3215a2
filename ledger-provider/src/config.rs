use std::{fmt::Debug, path::Path, time::Duration};

use anyhow::{Result, bail};
use provider_support::{
    ConfigDuration, config, http::HttpClientConfig, instrumentation::LogConfig,
};
use serde::Deserialize;

use crate::{
    indexer::DEFAULT_MAX_PAGES,
    poller::{AwaitTxOptions, Backoff, OnTimeout},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerProviderConfig {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub http: HttpClientConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub indexer: BackendConfig,
    pub node_bridge: BackendConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub await_tx: AwaitTxConfig,
}

/// Where a backend lives, and how to authenticate with it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: Option<Secret<String>>,
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
}

fn default_api_key_header() -> String {
    "dmtr-api-key".into()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationConfig {
    pub max_pages: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AwaitTxConfig {
    pub check_interval: ConfigDuration,
    pub timeout: ConfigDuration,
    pub max_attempts: Option<u32>,
    /// Grows the interval by this factor after every miss.
    pub backoff_factor: Option<f64>,
    pub max_interval: Option<ConfigDuration>,
    pub return_false_on_timeout: bool,
}

impl Default for AwaitTxConfig {
    fn default() -> Self {
        let defaults = AwaitTxOptions::default();
        Self {
            check_interval: defaults.check_interval.into(),
            timeout: defaults.timeout.into(),
            max_attempts: None,
            backoff_factor: None,
            max_interval: None,
            return_false_on_timeout: false,
        }
    }
}

impl TryFrom<&AwaitTxConfig> for AwaitTxOptions {
    type Error = anyhow::Error;

    fn try_from(value: &AwaitTxConfig) -> Result<Self> {
        let check_interval: Duration = value.check_interval.into();
        let backoff = match value.backoff_factor {
            Some(factor) if !factor.is_finite() || factor < 1.0 => {
                bail!("awaitTx.backoffFactor must be a finite number of at least 1, got {factor}")
            }
            Some(factor) => Backoff::Exponential {
                factor,
                max_interval: value
                    .max_interval
                    .map(Duration::from)
                    .unwrap_or(check_interval.saturating_mul(10)),
            },
            None => Backoff::Fixed,
        };
        Ok(Self {
            check_interval,
            timeout: value.timeout.into(),
            max_attempts: value.max_attempts,
            backoff,
            on_timeout: if value.return_false_on_timeout {
                OnTimeout::ReturnFalse
            } else {
                OnTimeout::Error
            },
            cancel: None,
        })
    }
}

#[derive(Deserialize, Clone)]
pub struct Secret<T>(pub T);

impl<T> Debug for Secret<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<redacted>")
    }
}

pub fn load_config(config_file: Option<&Path>) -> Result<LedgerProviderConfig> {
    config::load_config("provider", include_str!("../config.base.yaml"), config_file)
}
