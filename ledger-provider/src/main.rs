use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ledger_provider::{
    Provider,
    config::load_config,
    model::{AssetUnit, OutRef, parse_hash},
    poller::AwaitTxOptions,
};
use provider_support::{ConfigDuration, instrumentation};
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Subcommand)]
enum Command {
    /// Print the current protocol parameters
    Params,
    /// List unspent outputs at an address
    Utxos {
        address: String,
        /// Only list outputs holding this unit
        #[arg(long)]
        unit: Option<AssetUnit>,
    },
    /// List unspent outputs locked by a payment credential
    UtxosByCredential { credential: String },
    /// Find the one output holding a unit
    UtxoByUnit { unit: AssetUnit },
    /// Look up outputs by `txhash#index`
    OutRefs {
        #[arg(required = true)]
        out_refs: Vec<OutRef>,
    },
    Delegation { stake_address: String },
    Datum { hash: String },
    /// Submit a signed transaction, given as CBOR hex
    Submit { cbor: String },
    Evaluate { cbor: String },
    Tip,
    /// Wait until a transaction is observed on chain
    AwaitTx {
        tx_hash: String,
        #[arg(long)]
        timeout: Option<ConfigDuration>,
        #[arg(long)]
        interval: Option<ConfigDuration>,
    },
}

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[clap(short = 'f', long)]
    pub config_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config_file.as_deref())?;

    instrumentation::init(&config.log)?;

    let provider = Provider::connect(&config.provider, &config.http)?;

    match args.command {
        Command::Params => print_json(&provider.get_protocol_parameters().await?),
        Command::Utxos { address, unit } => {
            let utxos = match unit {
                Some(unit) => provider.get_utxos_with_unit(&address, &unit).await?,
                None => provider.get_utxos(&address).await?,
            };
            print_json(&utxos)
        }
        Command::UtxosByCredential { credential } => {
            let credential = parse_hash(&credential, "payment credential")?;
            print_json(&provider.get_utxos_by_credential(&credential).await?)
        }
        Command::UtxoByUnit { unit } => print_json(&provider.get_utxo_by_unit(&unit).await?),
        Command::OutRefs { out_refs } => {
            print_json(&provider.get_utxos_by_out_ref(&out_refs).await?)
        }
        Command::Delegation { stake_address } => {
            print_json(&provider.get_delegation(&stake_address).await?)
        }
        Command::Datum { hash } => {
            let hash = parse_hash(&hash, "datum hash")?;
            print_json(&provider.get_datum(&hash).await?)
        }
        Command::Submit { cbor } => {
            let tx_hash = provider.submit_tx(&cbor).await?;
            print_json(&json!({ "txHash": tx_hash }))
        }
        Command::Evaluate { cbor } => print_json(&provider.evaluate_tx(&cbor).await?),
        Command::Tip => print_json(&provider.get_tip().await?),
        Command::AwaitTx {
            tx_hash,
            timeout,
            interval,
        } => {
            let tx_hash = parse_hash(&tx_hash, "transaction hash")?;
            let cancel = CancellationToken::new();
            let mut options =
                AwaitTxOptions::try_from(&config.provider.await_tx)?.with_cancel(cancel.clone());
            if let Some(timeout) = timeout {
                options.timeout = timeout.into();
            }
            if let Some(interval) = interval {
                options.check_interval = interval.into();
            }
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupted, no longer waiting");
                    cancel.cancel();
                }
            });
            let confirmed = provider.await_tx_with(&tx_hash, &options).await?;
            print_json(&json!({ "txHash": tx_hash, "confirmed": confirmed }))
        }
    }
}
