use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::services::TokenService;

/// Run `cleanup_expired_tokens` every `every` until `shutdown` is cancelled.
/// A failed sweep is logged and retried on the next tick.
pub fn spawn_token_sweeper(
    tokens: TokenService,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = every.as_secs(), "Token sweeper started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Token sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = tokens.cleanup_expired_tokens().await {
                        tracing::error!(error = %e, "Token sweep failed");
                    }
                }
            }
        }
    })
}
