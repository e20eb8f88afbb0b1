//! Background expiry sweeper
//!
//! Periodically removes Hosts whose `updated_at` is older than the engine's
//! expiration period, through the same teardown path as an explicit delete.
//!
//! # Schedule
//!
//! 1. First pass runs immediately after spawn
//! 2. Then one pass per interval (default: 2 hours)
//! 3. Missed ticks are skipped, never bunched up
//!
//! A pass that is already running when shutdown is requested completes;
//! cancellation is only observed between passes.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::SweeperConfig;
use crate::engine::RegistrationEngine;

/// Entry point for the periodic sweep task
pub struct ExpirySweeper;

impl ExpirySweeper {
    /// Spawn the sweep loop on the current runtime
    pub fn spawn(engine: Arc<RegistrationEngine>, config: SweeperConfig) -> SweeperHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_sweep_loop(engine, config, cancel.clone()));
        SweeperHandle { cancel, task }
    }
}

/// Handle to a running sweeper
///
/// Dropping the handle leaves the task running; call [`SweeperHandle::shutdown`].
pub struct SweeperHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for the task to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!("Expiry sweeper task failed: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

async fn run_sweep_loop(
    engine: Arc<RegistrationEngine>,
    config: SweeperConfig,
    cancel: CancellationToken,
) {
    let mut ticker = interval(config.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        interval_secs = config.interval_secs,
        expiration_days = engine.expiration_days(),
        "Expiry sweeper started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Expiry sweeper shutting down");
                break;
            }
            _ = ticker.tick() => {
                sweep_once(&engine).await;
            }
        }
    }
}

async fn sweep_once(engine: &RegistrationEngine) {
    debug!("Removing expired hosts");
    match engine.expire(Utc::now()).await {
        Ok(report) if report.expired > 0 || report.failed > 0 => {
            info!(
                scanned = report.scanned,
                expired = report.expired,
                failed = report.failed,
                "Expiry sweep completed"
            );
        }
        Ok(report) => {
            debug!(scanned = report.scanned, "Expiry sweep: nothing expired");
        }
        Err(e) => {
            error!(error = %e, "Expiry sweep could not list hosts");
        }
    }
}
