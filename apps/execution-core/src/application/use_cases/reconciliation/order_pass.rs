//! Per-order pass and drift check.

use std::collections::BTreeMap;

use super::ReconciliationEngine;
use crate::application::ports::{FillQuery, OrderLookup, VenueError, VenueOrder, VenueOrderStatus};
use crate::application::use_cases::order_writes::update_with_retry;
use crate::domain::order_execution::{Order, OrderStateMachine, OrderStatus};
use crate::domain::reconciliation::{ReconciliationRun, detect_drift};
use crate::domain::shared::{Quantity, Symbol};
use crate::error::ExecutionError;

/// Lookup budget for one run.
#[derive(Debug)]
struct Budget {
    limit: u32,
}

impl Budget {
    fn take(&self, run: &mut ReconciliationRun) -> bool {
        if run.lookups_used >= self.limit {
            return false;
        }
        run.lookups_used += 1;
        true
    }
}

impl ReconciliationEngine {
    /// Check non-terminal orders against the venue, oldest first.
    ///
    /// Each venue call for a single order uses one unit of
    /// `max_individual_lookups`. Orders left when the budget runs out are
    /// deferred to the next run.
    pub(super) async fn check_orders(
        &self,
        run: &mut ReconciliationRun,
    ) -> Result<(), ExecutionError> {
        let open = self
            .ctx
            .store_call(self.ctx.store().list_open_orders())
            .await?;
        let budget = Budget {
            limit: self.ctx.config().reconciliation.max_individual_lookups,
        };
        let grace = self.ctx.config().reconciliation.grace_period();

        for (index, order) in open.iter().enumerate() {
            let age = run.started_at.duration_since(order.updated_at());
            if order.status() == OrderStatus::New && age < grace {
                continue;
            }
            if !budget.take(run) {
                let deferred = u32::try_from(open.len() - index).unwrap_or(u32::MAX);
                run.orders_deferred += deferred;
                tracing::info!(
                    deferred,
                    lookups_used = run.lookups_used,
                    "Lookup budget exhausted; deferring remaining orders"
                );
                break;
            }
            run.orders_checked += 1;

            let lookup = OrderLookup::for_order(order);
            match self
                .ctx
                .venue_call(self.ctx.venue().get_order(&lookup))
                .await
            {
                Ok(venue_order) => self.reconcile_order(order, &venue_order, &budget, run).await?,
                Err(VenueError::NotFound { .. }) => {
                    if order.status().is_unconfirmed() {
                        if age >= grace {
                            self.fail_stuck(order, run).await?;
                        }
                    } else {
                        run.orders_flagged += 1;
                        tracing::error!(
                            client_order_id = %order.client_order_id(),
                            status = %order.status(),
                            "Accepted order missing at venue; flagged for review"
                        );
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn reconcile_order(
        &self,
        order: &Order,
        venue_order: &VenueOrder,
        budget: &Budget,
        run: &mut ReconciliationRun,
    ) -> Result<(), ExecutionError> {
        let mut repaired = false;

        if venue_order.filled_quantity > order.filled_quantity() {
            if budget.take(run) {
                repaired |= self.sync_order_fills(order, venue_order, run).await?;
            } else {
                run.orders_deferred += 1;
                tracing::info!(
                    client_order_id = %order.client_order_id(),
                    "Missing fills deferred: lookup budget exhausted"
                );
            }
        }

        let now = self.ctx.now();
        let venue_order_id = venue_order.venue_order_id.clone();
        let before = order.version();
        let stored = match venue_order.status.terminal_status() {
            Some(status) => {
                let reason = venue_order.reject_reason.clone();
                update_with_retry(&self.ctx, order.client_order_id(), |current| {
                    if current.status().is_terminal() {
                        return Ok(None);
                    }
                    let mut next = current.clone();
                    if next.status() == OrderStatus::New {
                        next = OrderStateMachine::mark_submitted(&next, None, now)?;
                    }
                    let mut next =
                        OrderStateMachine::apply_terminal(&next, status, reason.as_deref(), now)?;
                    if next.venue_order_id().is_none() {
                        next.venue_order_id = Some(venue_order_id.clone());
                    }
                    Ok(Some(next))
                })
                .await?
            }
            None if venue_order.status != VenueOrderStatus::New => {
                update_with_retry(&self.ctx, order.client_order_id(), |current| {
                    if !current.status().is_unconfirmed() {
                        return Ok(None);
                    }
                    OrderStateMachine::acknowledge(current, Some(venue_order_id.clone()), now)
                        .map(Some)
                        .map_err(ExecutionError::from)
                })
                .await?
            }
            None => {
                update_with_retry(&self.ctx, order.client_order_id(), |current| {
                    if current.status() != OrderStatus::New {
                        return Ok(None);
                    }
                    OrderStateMachine::mark_submitted(current, Some(venue_order_id.clone()), now)
                        .map(Some)
                        .map_err(ExecutionError::from)
                })
                .await?
            }
        };

        if stored.version() != before {
            repaired = true;
            tracing::info!(
                client_order_id = %order.client_order_id(),
                from = %order.status(),
                to = %stored.status(),
                venue_status = ?venue_order.status,
                "Order reconciled with venue"
            );
        }
        if repaired {
            run.orders_repaired += 1;
        }
        Ok(())
    }

    /// Fetch and apply this order's fills. Returns true if any were new.
    async fn sync_order_fills(
        &self,
        order: &Order,
        venue_order: &VenueOrder,
        run: &mut ReconciliationRun,
    ) -> Result<bool, ExecutionError> {
        let config = &self.ctx.config().reconciliation;
        let query = FillQuery::between(
            order.created_at() - config.overlap(),
            run.started_at,
            config.fills_backfill_page_size,
        )
        .for_order(venue_order.venue_order_id.clone());

        let applied_before = run.fills_applied;
        let page = self
            .ctx
            .venue_call(self.ctx.venue().get_fills(&query))
            .await?;
        for fill in &page.fills {
            self.apply_venue_fill(fill, run).await?;
        }
        if page.next_page_token.is_some() {
            tracing::warn!(
                client_order_id = %order.client_order_id(),
                "Order has more fills than one page; remainder left for the next run"
            );
        }
        Ok(run.fills_applied > applied_before)
    }

    /// Fail an order the venue never saw and release its fingerprint.
    async fn fail_stuck(
        &self,
        order: &Order,
        run: &mut ReconciliationRun,
    ) -> Result<(), ExecutionError> {
        let now = self.ctx.now();
        let grace = self.ctx.config().reconciliation.submitted_unconfirmed_grace_seconds;
        let reason = format!("no venue record after {grace}s grace period");
        let before = order.version();
        let stored = update_with_retry(&self.ctx, order.client_order_id(), |current| {
            if !current.status().is_unconfirmed() {
                return Ok(None);
            }
            OrderStateMachine::apply_terminal(current, OrderStatus::Failed, Some(&reason), now)
                .map(Some)
                .map_err(ExecutionError::from)
        })
        .await?;
        if stored.version() == before || stored.status() != OrderStatus::Failed {
            return Ok(());
        }

        self.ctx
            .store_call(
                self.ctx
                    .store()
                    .release_fingerprint(stored.fingerprint(), stored.client_order_id()),
            )
            .await?;
        run.stuck_failed.push(stored.client_order_id().clone());
        tracing::warn!(
            client_order_id = %stored.client_order_id(),
            from = %order.status(),
            "Unconfirmed order failed after grace period; fingerprint released"
        );
        Ok(())
    }

    /// Compare net local quantity per symbol with the venue. Flag only.
    pub(super) async fn check_drift(
        &self,
        run: &mut ReconciliationRun,
    ) -> Result<(), ExecutionError> {
        let venue_positions = self
            .ctx
            .venue_call(self.ctx.venue().get_positions())
            .await?;
        let local_positions = self
            .ctx
            .store_call(self.ctx.store().list_positions())
            .await?;

        let mut local: BTreeMap<Symbol, Quantity> = BTreeMap::new();
        for position in &local_positions {
            let entry = local.entry(position.symbol().clone()).or_default();
            *entry = *entry + position.quantity();
        }
        let venue: BTreeMap<Symbol, Quantity> = venue_positions
            .into_iter()
            .map(|p| (p.symbol, p.quantity))
            .collect();

        run.drift = detect_drift(&local, &venue);
        if run.has_drift() {
            let err = ExecutionError::ReconciliationDrift(run.drift.clone());
            for drift in &run.drift {
                tracing::error!(
                    symbol = %drift.symbol,
                    local_quantity = %drift.local_quantity,
                    venue_quantity = %drift.venue_quantity,
                    difference = %drift.difference(),
                    "Position drift"
                );
            }
            tracing::error!(error = %err, code = %err.code(), "Positions disagree with venue; flagged for review");
        }
        Ok(())
    }
}
