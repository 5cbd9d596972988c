//! Venue fill history sync.
//!
//! Both the window sync and the backfill page through `get_fills` and feed
//! every execution through `ApplyFillUseCase` with the venue fill id as the
//! dedup key, so fills already delivered by webhook are no-ops.
//!
//! A window scan that runs out of pages is not dropped: its query and page
//! token are kept in the checkpoint and drained first on the next run.

use super::ReconciliationEngine;
use crate::application::ports::{FillQuery, VenueFill};
use crate::application::use_cases::apply_fill::{FillEvent, FillOutcome};
use crate::domain::order_execution::Order;
use crate::domain::reconciliation::{
    FillScanCursor, FillWindow, ReconciliationCheckpoint, ReconciliationRun,
};
use crate::domain::shared::Timestamp;
use crate::error::ExecutionError;

/// What a paged scan saw.
#[derive(Debug, Default)]
pub(super) struct ScanSummary {
    /// Latest execution time seen.
    pub latest: Option<Timestamp>,
    /// Pages read.
    pub pages: u32,
    /// Token of the first unread page; `None` once the venue has no more.
    pub next_page_token: Option<String>,
}

impl ScanSummary {
    const fn exhausted(&self) -> bool {
        self.next_page_token.is_none()
    }
}

impl ReconciliationEngine {
    /// Apply every venue fill in `[checkpoint - overlap, now]`.
    ///
    /// An interrupted scan from an earlier run is finished first. The
    /// checkpoint only moves past a window once the window has been read to
    /// the end or handed over to `window_resume`.
    pub(super) async fn sync_window(
        &self,
        checkpoint: &mut ReconciliationCheckpoint,
        run: &mut ReconciliationRun,
    ) -> Result<(), ExecutionError> {
        let config = &self.ctx.config().reconciliation;
        let mut pages_left = config.fills_backfill_max_pages;

        if let Some(cursor) = checkpoint.window_resume.take() {
            let query =
                FillQuery::between(cursor.since, cursor.until, config.fills_backfill_page_size)
                    .with_page_token(Some(cursor.page_token.clone()));
            let summary = self.scan_fills(query, pages_left, run).await?;
            pages_left = pages_left.saturating_sub(summary.pages);
            if let Some(page_token) = summary.next_page_token {
                tracing::warn!(
                    since = %cursor.since,
                    until = %cursor.until,
                    "Interrupted fill window still not drained; resuming next run"
                );
                checkpoint.window_resume = Some(FillScanCursor {
                    page_token,
                    ..cursor
                });
                return Ok(());
            }
            tracing::info!(
                since = %cursor.since,
                until = %cursor.until,
                "Interrupted fill window drained"
            );
        }
        if pages_left == 0 {
            tracing::info!("Fill page limit reached; current window left for the next run");
            return Ok(());
        }

        let window = FillWindow::for_run(
            checkpoint,
            run.started_at,
            config.overlap(),
            config.initial_lookback(),
        );
        let query = FillQuery::between(window.start, window.end, config.fills_backfill_page_size);
        let summary = self.scan_fills(query, pages_left, run).await?;
        checkpoint.last_run_started_at = Some(run.started_at);
        if let Some(page_token) = summary.next_page_token {
            tracing::warn!(
                start = %window.start,
                end = %window.end,
                max_pages = config.fills_backfill_max_pages,
                "Fill window not exhausted; resuming from the next page on the next run"
            );
            checkpoint.window_resume = Some(FillScanCursor {
                since: window.start,
                until: window.end,
                page_token,
            });
        }
        Ok(())
    }

    /// Continue the historical backfill from the persisted cursor.
    ///
    /// Returns the new cursor: the run start once the venue has nothing
    /// further, otherwise the latest execution seen.
    pub(super) async fn backfill(
        &self,
        checkpoint: &ReconciliationCheckpoint,
        run: &mut ReconciliationRun,
    ) -> Result<Timestamp, ExecutionError> {
        let config = &self.ctx.config().reconciliation;
        let cursor = checkpoint
            .backfill_cursor
            .unwrap_or(run.started_at - config.initial_lookback());
        let query = FillQuery::between(cursor, run.started_at, config.fills_backfill_page_size);
        let summary = self
            .scan_fills(query, config.fills_backfill_max_pages, run)
            .await?;

        let next = if summary.exhausted() {
            run.started_at
        } else {
            summary.latest.map_or(cursor, |latest| latest.max(cursor))
        };
        tracing::debug!(from = %cursor, to = %next, "Fills backfill advanced");
        Ok(next)
    }

    /// Page through `query`, at most `max_pages` pages.
    async fn scan_fills(
        &self,
        mut query: FillQuery,
        max_pages: u32,
        run: &mut ReconciliationRun,
    ) -> Result<ScanSummary, ExecutionError> {
        let mut summary = ScanSummary::default();

        while summary.pages < max_pages {
            let page = self
                .ctx
                .venue_call(self.ctx.venue().get_fills(&query))
                .await?;
            summary.pages += 1;
            for fill in &page.fills {
                summary.latest = summary.latest.max(Some(fill.executed_at));
                self.apply_venue_fill(fill, run).await?;
            }
            summary.next_page_token = page.next_page_token;
            match &summary.next_page_token {
                Some(token) => query = query.with_page_token(Some(token.clone())),
                None => break,
            }
        }
        Ok(summary)
    }

    /// Apply one venue execution to its local order.
    ///
    /// Fills for orders this ledger does not know are logged and skipped.
    /// An execution the order cannot absorb (overfill) is flagged for review.
    pub(super) async fn apply_venue_fill(
        &self,
        fill: &VenueFill,
        run: &mut ReconciliationRun,
    ) -> Result<(), ExecutionError> {
        let Some(order) = self.find_fill_order(fill).await? else {
            tracing::warn!(
                fill_id = %fill.fill_id,
                venue_order_id = %fill.venue_order_id,
                symbol = %fill.symbol,
                "Venue fill for unknown order skipped"
            );
            return Ok(());
        };

        let event = FillEvent {
            client_order_id: order.client_order_id().clone(),
            venue_order_id: Some(fill.venue_order_id.clone()),
            fill: fill.to_fill(),
            dedup_key: fill.dedup_key(),
        };
        match self.fills.apply(event).await {
            Ok(FillOutcome::Applied { late, .. }) => {
                run.fills_applied += 1;
                if late {
                    run.orders_flagged += 1;
                }
                Ok(())
            }
            Ok(FillOutcome::Duplicate) => {
                run.fills_duplicate += 1;
                Ok(())
            }
            Err(ExecutionError::InvalidTransition(reason)) => {
                run.orders_flagged += 1;
                tracing::error!(
                    client_order_id = %order.client_order_id(),
                    fill_id = %fill.fill_id,
                    reason = %reason,
                    "Venue fill could not be applied; flagged for review"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn find_fill_order(&self, fill: &VenueFill) -> Result<Option<Order>, ExecutionError> {
        let store = self.ctx.store();
        if let Some(client_order_id) = &fill.client_order_id {
            if let Some(order) = self.ctx.store_call(store.get_order(client_order_id)).await? {
                return Ok(Some(order));
            }
        }
        Ok(self
            .ctx
            .store_call(store.find_order_by_venue_id(&fill.venue_order_id))
            .await?)
    }
}
