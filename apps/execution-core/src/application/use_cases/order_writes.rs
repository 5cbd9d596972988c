//! Optimistic order writes.
//!
//! Reads the order, derives the next state and writes the difference with
//! the version it read. A version conflict means another writer got there
//! first: reread and derive again.

use crate::application::context::ExecutionContext;
use crate::application::ports::OrderUpdate;
use crate::domain::order_execution::Order;
use crate::domain::shared::ClientOrderId;
use crate::error::ExecutionError;

/// Load an order or fail with `NotFound`.
pub(crate) async fn load_order(
    ctx: &ExecutionContext,
    id: &ClientOrderId,
) -> Result<Order, ExecutionError> {
    ctx.store_call(ctx.store().get_order(id))
        .await?
        .ok_or_else(|| ExecutionError::NotFound(id.to_string()))
}

/// Apply `derive` to the latest stored order and persist the result.
///
/// `derive` returns `None` when the order needs no change; the stored order
/// is then returned as is.
pub(crate) async fn update_with_retry<F>(
    ctx: &ExecutionContext,
    id: &ClientOrderId,
    mut derive: F,
) -> Result<Order, ExecutionError>
where
    F: FnMut(&Order) -> Result<Option<Order>, ExecutionError> + Send,
{
    let max_retries = ctx.config().submission.max_version_retries;
    let mut attempt = 0;
    loop {
        let current = load_order(ctx, id).await?;
        let Some(next) = derive(&current)? else {
            return Ok(current);
        };
        let update = OrderUpdate::between(&current, &next);
        if update.is_empty() {
            return Ok(current);
        }

        let now = ctx.now();
        match ctx
            .store_call(ctx.store().update_order(id, current.version(), update, now))
            .await
        {
            Ok(stored) => return Ok(stored),
            Err(e) if e.is_conflict() && attempt < max_retries => {
                attempt += 1;
                tracing::debug!(client_order_id = %id, attempt, "Order version conflict, rereading");
            }
            Err(e) => return Err(e.into()),
        }
    }
}
