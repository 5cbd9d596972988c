//! Reconciliation Engine
//!
//! Brings the local ledger in line with the venue. One run:
//!
//! ```text
//! window fill sync ─► fills backfill ─► per-order pass ─► drift check ─► persist run
//!  [checkpoint-overlap, now]  cursor     budgeted lookups   flag only     + checkpoint
//! ```
//!
//! Repairs are limited to applying missing fills and venue-reported status
//! changes. Position quantities are never overwritten from the venue's view.
//!
//! Runs are single-flight: a trigger while a run is in progress is skipped.

mod fill_sync;
mod order_pass;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};

use super::apply_fill::ApplyFillUseCase;
use crate::application::context::ExecutionContext;
use crate::application::ports::PruneSummary;
use crate::domain::order_execution::Order;
use crate::domain::reconciliation::{ReconciliationCheckpoint, ReconciliationRun, RunMode};
use crate::error::ExecutionError;

/// Result of a reconciliation trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The run finished; its summary was persisted.
    Completed(ReconciliationRun),
    /// Another run was in progress.
    Skipped,
}

/// Reconciliation error.
#[derive(Debug, thiserror::Error)]
pub enum ReconciliationError {
    /// The startup run exceeded its budget.
    #[error("Startup reconciliation did not finish within {0:?}")]
    Timeout(Duration),

    /// The run stopped on a venue or store failure.
    #[error("Reconciliation failed: {0}")]
    Failed(#[from] ExecutionError),
}

/// Startup and periodic reconciliation against the venue.
#[derive(Debug)]
pub struct ReconciliationEngine {
    ctx: Arc<ExecutionContext>,
    fills: ApplyFillUseCase,
    in_flight: Mutex<()>,
}

impl ReconciliationEngine {
    /// Create a new `ReconciliationEngine`.
    #[must_use]
    pub fn new(ctx: Arc<ExecutionContext>) -> Self {
        Self {
            fills: ApplyFillUseCase::new(ctx.clone()),
            ctx,
            in_flight: Mutex::new(()),
        }
    }

    /// Run once before submissions are accepted, bounded by
    /// `reconciliation.timeout_seconds`.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if the budget is exceeded and `Failed` if the run
    /// fails. Either is fatal for the process.
    pub async fn run_startup(&self) -> Result<RunOutcome, ReconciliationError> {
        let budget = self.ctx.config().reconciliation.startup_timeout();
        tokio::time::timeout(budget, self.run(RunMode::Startup))
            .await
            .map_err(|_| ReconciliationError::Timeout(budget))?
    }

    /// Run every `poll_interval_seconds` until `shutdown` resolves.
    ///
    /// The first run happens one interval from now. Failed runs are logged
    /// and the next tick tries again; ticks missed while a run is slow are
    /// skipped rather than queued.
    pub async fn run_periodic<F>(&self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let period = self.ctx.config().reconciliation.poll_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("Periodic reconciliation stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match self.run(RunMode::Periodic).await {
                        Ok(RunOutcome::Completed(_)) => {}
                        Ok(RunOutcome::Skipped) => {
                            tracing::debug!("Periodic reconciliation skipped: run in progress");
                        }
                        Err(e) => tracing::error!(error = %e, "Periodic reconciliation failed"),
                    }
                }
            }
        }
    }

    /// Execute one run unless another is in progress.
    ///
    /// # Errors
    ///
    /// Returns `Failed` on a venue or store failure. The failed run is still
    /// recorded when the store allows it; the checkpoint is not advanced.
    pub async fn run(&self, mode: RunMode) -> Result<RunOutcome, ReconciliationError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::info!(%mode, "Reconciliation already running, skipping");
            return Ok(RunOutcome::Skipped);
        };

        let mut run = ReconciliationRun::start(mode, self.ctx.now());
        tracing::info!(run_id = %run.run_id, %mode, "Reconciliation started");

        let result = self.execute(&mut run).await;
        let finished_at = self.ctx.now();
        match result {
            Ok(checkpoint) => {
                run.complete(finished_at);
                self.ctx
                    .store_call(self.ctx.store().save_run(&run))
                    .await
                    .map_err(ExecutionError::from)?;
                self.ctx
                    .store_call(self.ctx.store().save_checkpoint(&checkpoint))
                    .await
                    .map_err(ExecutionError::from)?;
                match self.prune_ledger(&checkpoint, &run).await {
                    Ok(pruned) if pruned.total() > 0 => tracing::debug!(
                        fingerprints = pruned.fingerprints,
                        dedup_keys = pruned.dedup_keys,
                        "Pruned expired ledger entries"
                    ),
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "Failed to prune ledger entries"),
                }
                tracing::info!(
                    run_id = %run.run_id,
                    %mode,
                    orders_checked = run.orders_checked,
                    orders_repaired = run.orders_repaired,
                    orders_flagged = run.orders_flagged,
                    orders_deferred = run.orders_deferred,
                    lookups_used = run.lookups_used,
                    fills_applied = run.fills_applied,
                    fills_duplicate = run.fills_duplicate,
                    stuck_failed = run.stuck_failed.len(),
                    drift = run.drift.len(),
                    "Reconciliation completed"
                );
                Ok(RunOutcome::Completed(run))
            }
            Err(e) => {
                run.fail(e.to_string(), finished_at);
                if let Err(save_err) = self.ctx.store_call(self.ctx.store().save_run(&run)).await {
                    tracing::error!(run_id = %run.run_id, error = %save_err, "Failed to record failed run");
                }
                tracing::error!(run_id = %run.run_id, %mode, error = %e, "Reconciliation failed");
                Err(e.into())
            }
        }
    }

    async fn execute(
        &self,
        run: &mut ReconciliationRun,
    ) -> Result<ReconciliationCheckpoint, ExecutionError> {
        let mut checkpoint = self
            .ctx
            .store_call(self.ctx.store().load_checkpoint())
            .await?;

        self.sync_window(&mut checkpoint, run).await?;
        if self.ctx.config().reconciliation.fills_backfill_enabled {
            checkpoint.backfill_cursor = Some(self.backfill(&checkpoint, run).await?);
        }
        self.check_orders(run).await?;
        self.check_drift(run).await?;
        Ok(checkpoint)
    }

    /// Drop expired fingerprints and dedup keys no scan can reach again.
    ///
    /// The dedup cutoff never passes the start of an unfinished window scan
    /// or the creation of an open order, whose fills the per-order pass may
    /// still fetch.
    async fn prune_ledger(
        &self,
        checkpoint: &ReconciliationCheckpoint,
        run: &ReconciliationRun,
    ) -> Result<PruneSummary, ExecutionError> {
        let config = self.ctx.config();
        let overlap = config.reconciliation.overlap();
        let mut cutoff = run.started_at - config.dedup_retention();
        if let Some(resume) = &checkpoint.window_resume {
            cutoff = cutoff.min(resume.since - overlap);
        }
        let open = self
            .ctx
            .store_call(self.ctx.store().list_open_orders())
            .await?;
        if let Some(oldest) = open.iter().map(Order::created_at).min() {
            cutoff = cutoff.min(oldest - overlap);
        }

        Ok(self
            .ctx
            .store_call(self.ctx.store().prune(self.ctx.now(), cutoff))
            .await?)
    }
}
