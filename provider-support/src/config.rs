use std::path::Path;

use anyhow::Result;
use figment::{
    Figment,
    providers::{Data, Env, Format, Yaml},
};
use serde::Deserialize;

pub const ENV_PREFIX: &str = "LEDGER_PROVIDER_";

/// Loads configuration, with later sources overriding earlier ones:
/// the shared base file, the caller's defaults, `/etc/ledger-provider`,
/// `~/.ledger-provider`, the working directory, an explicit file, and finally
/// `LEDGER_PROVIDER_` environment variables (`__` separates nested keys).
pub fn load_config<T>(suffix: &str, defaults: &str, config_file: Option<&Path>) -> Result<T>
where
    T: for<'a> Deserialize<'a>,
{
    let mut config = Figment::new()
        .merge(Yaml::string(include_str!("../config.base.yaml")))
        .merge(Yaml::string(defaults))
        .merge(default_config_source("/etc/ledger-provider", suffix));

    if let Some(dir) = home::home_dir() {
        if let Some(provider_dir) = dir.join(".ledger-provider").to_str() {
            config = config.merge(default_config_source(provider_dir, suffix));
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if let Some(cwd_str) = cwd.to_str() {
            config = config.merge(default_config_source(cwd_str, suffix));
        }
    }

    if let Some(file) = config_file {
        config = config.merge(Yaml::file_exact(file));
    }

    config = config.merge(Env::prefixed(ENV_PREFIX).split("__"));
    Ok(config.extract()?)
}

fn default_config_source(dir: &str, suffix: &str) -> Data<Yaml> {
    let name = format!("{dir}/ledger-provider.{suffix}.yaml");
    Yaml::file(name)
}
