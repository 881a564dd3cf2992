//! Periodic maintenance: lapse expired consents, report plans due for
//! review and flush the audit buffer.
//!
//! Runs as a tokio task on a fixed interval. The first sweep happens
//! immediately on start.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::consent;
use crate::core_state::CoreState;
use crate::error::ServiceError;
use crate::treatment;

/// What one sweep changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_consents: usize,
    pub plans_due_for_review: usize,
}

/// One maintenance pass against an open connection.
pub fn run_sweep_once(conn: &Connection, now: DateTime<Utc>) -> Result<SweepReport, ServiceError> {
    let expired_consents = consent::update_expired_consents(conn, now)?;
    let due = treatment::plans_due_for_review(conn, now)?;
    for plan in &due {
        tracing::info!(
            plan_id = %plan.id,
            review_date = %plan.review_date,
            "Treatment plan due for review"
        );
    }
    Ok(SweepReport {
        expired_consents,
        plans_due_for_review: due.len(),
    })
}

fn sweep(core: &CoreState) {
    let conn = match core.open_db() {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!("Sweep skipped, database unavailable: {e}");
            return;
        }
    };
    match run_sweep_once(&conn, Utc::now()) {
        Ok(report) => tracing::debug!(?report, "Sweep complete"),
        Err(e) => tracing::error!("Sweep failed: {e}"),
    }
    if let Err(e) = core.flush_and_prune_audit() {
        tracing::warn!("Audit flush during sweep failed: {e}");
    }
}

/// Handle for the background sweeper task.
pub struct SweeperHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for the current pass to finish.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
            tracing::info!("Sweeper stopped");
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Spawn the sweeper on the current tokio runtime.
pub fn start_sweeper(core: Arc<CoreState>, every: Duration) -> SweeperHandle {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => {
                    let core = core.clone();
                    if let Err(e) = tokio::task::spawn_blocking(move || sweep(&core)).await {
                        tracing::error!("Sweep task panicked: {e}");
                    }
                }
            }
        }
    });

    tracing::info!(interval_secs = every.as_secs(), "Sweeper started");
    SweeperHandle {
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    }
}
