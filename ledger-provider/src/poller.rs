use std::time::Duration;

use async_trait::async_trait;
use provider_support::{ProviderError, ProviderResult};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::model::TxHash;

/// Something which can tell whether a transaction has made it on chain.
#[async_trait]
pub trait TxLookup: Send + Sync {
    async fn is_confirmed(&self, tx_hash: &TxHash) -> ProviderResult<bool>;
}

#[async_trait]
pub trait Timer: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TokioTimer;

#[async_trait]
impl Timer for TokioTimer {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Backoff {
    #[default]
    Fixed,
    /// Multiplies the interval by `factor` after every miss, up to `max_interval`.
    Exponential { factor: f64, max_interval: Duration },
}

impl Backoff {
    fn next(&self, interval: Duration) -> Duration {
        match self {
            Self::Fixed => interval,
            Self::Exponential {
                factor,
                max_interval,
            } => Duration::try_from_secs_f64(interval.as_secs_f64() * factor.max(1.0))
                .unwrap_or(*max_interval)
                .min(*max_interval)
                .max(interval),
        }
    }
}

/// What to do once the wait is exhausted without seeing the transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OnTimeout {
    #[default]
    Error,
    ReturnFalse,
}

#[derive(Clone, Debug)]
pub struct AwaitTxOptions {
    pub check_interval: Duration,
    pub timeout: Duration,
    pub max_attempts: Option<u32>,
    pub backoff: Backoff,
    pub on_timeout: OnTimeout,
    pub cancel: Option<CancellationToken>,
}

impl Default for AwaitTxOptions {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(3),
            timeout: Duration::from_secs(160),
            max_attempts: None,
            backoff: Backoff::Fixed,
            on_timeout: OnTimeout::Error,
            cancel: None,
        }
    }
}

impl AwaitTxOptions {
    pub fn with_cancel(self, cancel: CancellationToken) -> Self {
        Self {
            cancel: Some(cancel),
            ..self
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollState {
    Pending { attempt: u32, interval: Duration },
    Confirmed,
    TimedOut { attempts: u32 },
    Cancelled,
}

/// Polls until the transaction is seen, the wait runs out, or the caller
/// cancels. Lookup failures end the wait.
#[instrument(skip_all, fields(%tx_hash))]
pub async fn await_tx(
    lookup: &dyn TxLookup,
    timer: &dyn Timer,
    tx_hash: &TxHash,
    options: &AwaitTxOptions,
) -> ProviderResult<bool> {
    // no deadline when the timeout is beyond what the clock can represent
    let deadline = timer.now().checked_add(options.timeout);
    let mut state = PollState::Pending {
        attempt: 1,
        interval: options.check_interval,
    };
    loop {
        state = match state {
            PollState::Pending { attempt, interval } => {
                step(lookup, timer, tx_hash, options, deadline, attempt, interval).await?
            }
            PollState::Confirmed => {
                debug!("transaction confirmed");
                return Ok(true);
            }
            PollState::TimedOut { attempts } => {
                debug!(attempts, "gave up waiting for transaction");
                return match options.on_timeout {
                    OnTimeout::ReturnFalse => Ok(false),
                    OnTimeout::Error => Err(ProviderError::timeout(format!(
                        "transaction {tx_hash} was not observed after {attempts} attempts"
                    ))
                    .with_field("attempts", attempts)),
                };
            }
            PollState::Cancelled => {
                return Err(ProviderError::cancelled(format!(
                    "stopped waiting for transaction {tx_hash}"
                )));
            }
        };
    }
}

async fn step(
    lookup: &dyn TxLookup,
    timer: &dyn Timer,
    tx_hash: &TxHash,
    options: &AwaitTxOptions,
    deadline: Option<Instant>,
    attempt: u32,
    interval: Duration,
) -> ProviderResult<PollState> {
    if options.is_cancelled() {
        return Ok(PollState::Cancelled);
    }
    if lookup.is_confirmed(tx_hash).await? {
        return Ok(PollState::Confirmed);
    }
    debug!(attempt, ?interval, "transaction not observed yet");
    let out_of_attempts = options.max_attempts.is_some_and(|max| attempt >= max);
    let out_of_time = deadline.is_some_and(|deadline| {
        timer
            .now()
            .checked_add(interval)
            .is_none_or(|next| next > deadline)
    });
    if out_of_attempts || out_of_time {
        return Ok(PollState::TimedOut { attempts: attempt });
    }

    let sleep = timer.sleep(interval);
    let cancelled = match &options.cancel {
        Some(cancel) => tokio::select! {
            biased;
            _ = cancel.cancelled() => true,
            _ = sleep => false,
        },
        None => {
            sleep.await;
            false
        }
    };
    if cancelled {
        return Ok(PollState::Cancelled);
    }
    Ok(PollState::Pending {
        attempt: attempt + 1,
        interval: options.backoff.next(interval),
    })
}
