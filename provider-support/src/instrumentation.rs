use std::str::FromStr;

use anyhow::Result;
use serde::Deserialize;
use tracing::Level;
use tracing_subscriber::{
    Layer, Registry, filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    level: String,
}

/// Installs the global subscriber. Logs go to stderr so that stdout stays
/// free for command output.
pub fn init(config: &LogConfig) -> Result<()> {
    let level = Level::from_str(&config.level)?;

    let filter = Targets::new()
        .with_default(level)
        .with_target("hyper_util", Level::INFO)
        .with_target("reqwest", Level::INFO);

    Registry::default()
        .with(
            fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .try_init()?;

    Ok(())
}
