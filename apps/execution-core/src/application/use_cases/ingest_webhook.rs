//! Webhook Ingest Use Case
//!
//! Venue callbacks for fills and terminal status changes. The shared secret
//! is checked before the body is parsed; a delivery that fails the check is
//! neither parsed nor recorded.
//!
//! Every event has a dedup key. Fill keys use the venue execution id, the
//! same key reconciliation uses, so a fill seen by both paths is applied once.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::apply_fill::{ApplyFillUseCase, FillEvent, FillOutcome};
use super::order_writes::update_with_retry;
use crate::application::context::ExecutionContext;
use crate::domain::order_execution::{Fill, Order, OrderStateMachine, OrderStatus};
use crate::domain::shared::{ClientOrderId, FillId, Money, Quantity, Timestamp, VenueOrderId};
use crate::error::ExecutionError;

/// Kind of venue callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    /// Execution that completes the order.
    Fill,
    /// Execution that leaves quantity open.
    PartialFill,
    /// Order canceled at the venue.
    Cancel,
    /// Order rejected by the venue.
    Reject,
    /// Order expired at the venue.
    Expire,
}

impl WebhookEventType {
    /// Key prefix and wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fill => "fill",
            Self::PartialFill => "partial_fill",
            Self::Cancel => "cancel",
            Self::Reject => "reject",
            Self::Expire => "expire",
        }
    }

    const fn is_fill(self) -> bool {
        matches!(self, Self::Fill | Self::PartialFill)
    }

    const fn terminal_status(self) -> Option<OrderStatus> {
        match self {
            Self::Cancel => Some(OrderStatus::Canceled),
            Self::Reject => Some(OrderStatus::Rejected),
            Self::Expire => Some(OrderStatus::Expired),
            Self::Fill | Self::PartialFill => None,
        }
    }
}

/// Venue callback payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Venue event id; the execution id for fills.
    #[serde(default)]
    pub event_id: Option<String>,
    /// Event kind.
    pub event_type: WebhookEventType,
    /// Venue order id.
    #[serde(default)]
    pub venue_order_id: Option<VenueOrderId>,
    /// Client order id echoed back by the venue.
    #[serde(default)]
    pub client_order_id: Option<ClientOrderId>,
    /// Executed quantity (fills only).
    #[serde(default)]
    pub quantity: Option<Quantity>,
    /// Execution price (fills only).
    #[serde(default)]
    pub price: Option<Money>,
    /// Venue timestamp.
    pub timestamp: Timestamp,
    /// Venue reason for rejects and cancels.
    #[serde(default)]
    pub reason: Option<String>,
}

impl WebhookEvent {
    /// Key identifying this delivery across retries and reconciliation.
    ///
    /// Without a venue event id the key is a SHA-256 digest of the fields
    /// that identify the event.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        let prefix = if self.event_type.is_fill() {
            "fill"
        } else {
            self.event_type.as_str()
        };
        match self.event_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => format!("{prefix}:{id}"),
            _ => {
                let canonical = format!(
                    "{}|{}|{}|{}|{}",
                    self.venue_order_id
                        .as_ref()
                        .map_or("", VenueOrderId::as_str),
                    self.event_type.as_str(),
                    self.quantity
                        .map(|q| q.amount().normalize().to_string())
                        .unwrap_or_default(),
                    self.price
                        .map(|p| p.amount().normalize().to_string())
                        .unwrap_or_default(),
                    self.timestamp.to_rfc3339(),
                );
                format!(
                    "{prefix}:{}",
                    hex::encode(Sha256::digest(canonical.as_bytes()))
                )
            }
        }
    }
}

/// Result of ingesting a webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The event changed the order.
    Applied {
        /// Order the event belonged to.
        client_order_id: ClientOrderId,
        /// Status after the event.
        status: OrderStatus,
        /// A fill arrived after the order was terminal.
        late: bool,
    },
    /// The event was already applied.
    Duplicate,
    /// The event was recorded but changed nothing.
    Ignored {
        /// Why nothing changed.
        reason: String,
    },
}

/// Authenticates and applies venue callbacks.
#[derive(Debug)]
pub struct WebhookIngest {
    ctx: Arc<ExecutionContext>,
    fills: ApplyFillUseCase,
}

impl WebhookIngest {
    /// Create a new `WebhookIngest`.
    #[must_use]
    pub fn new(ctx: Arc<ExecutionContext>) -> Self {
        Self {
            fills: ApplyFillUseCase::new(ctx.clone()),
            ctx,
        }
    }

    /// Authenticate, parse and apply one delivery.
    ///
    /// # Errors
    ///
    /// - `WebhookUnauthorized` if the secret check fails
    /// - `Validation` for an unparseable or incomplete payload
    /// - `NotFound` if no local order matches; the venue should redeliver
    /// - `InvalidTransition` / `Persistence` from applying the event
    pub async fn ingest(
        &self,
        raw_event: &[u8],
        provided_secret: Option<&str>,
    ) -> Result<IngestOutcome, ExecutionError> {
        self.authenticate(provided_secret)?;

        let event: WebhookEvent = serde_json::from_slice(raw_event)
            .map_err(|e| ExecutionError::Validation(format!("malformed webhook payload: {e}")))?;
        let dedup_key = event.dedup_key();
        tracing::debug!(
            event_type = event.event_type.as_str(),
            dedup_key = %dedup_key,
            "Webhook received"
        );

        if event.event_type.is_fill() {
            self.ingest_fill(event, dedup_key).await
        } else {
            self.ingest_status(event, dedup_key).await
        }
    }

    fn authenticate(&self, provided: Option<&str>) -> Result<(), ExecutionError> {
        let config = self.ctx.config();
        let Some(expected) = config.webhook.effective_secret() else {
            if config.webhook_secret_optional() {
                return Ok(());
            }
            tracing::warn!("Webhook rejected: no secret configured");
            return Err(ExecutionError::WebhookUnauthorized);
        };

        let provided = provided.map(str::trim).unwrap_or_default();
        if provided.is_empty() || Sha256::digest(provided) != Sha256::digest(expected) {
            tracing::warn!("Webhook rejected: secret mismatch");
            return Err(ExecutionError::WebhookUnauthorized);
        }
        Ok(())
    }

    async fn locate(&self, event: &WebhookEvent) -> Result<Order, ExecutionError> {
        let store = self.ctx.store();
        if let Some(venue_order_id) = &event.venue_order_id {
            if let Some(order) = self
                .ctx
                .store_call(store.find_order_by_venue_id(venue_order_id))
                .await?
            {
                return Ok(order);
            }
        }
        if let Some(client_order_id) = &event.client_order_id {
            if let Some(order) = self.ctx.store_call(store.get_order(client_order_id)).await? {
                return Ok(order);
            }
        }
        Err(ExecutionError::NotFound(format!(
            "no order for venue id {:?} / client id {:?}",
            event.venue_order_id.as_ref().map(VenueOrderId::as_str),
            event.client_order_id.as_ref().map(ClientOrderId::as_str),
        )))
    }

    async fn ingest_fill(
        &self,
        event: WebhookEvent,
        dedup_key: String,
    ) -> Result<IngestOutcome, ExecutionError> {
        let (Some(quantity), Some(price)) = (event.quantity, event.price) else {
            return Err(ExecutionError::Validation(
                "fill webhook requires quantity and price".to_string(),
            ));
        };
        let order = self.locate(&event).await?;

        let fill_id = event
            .event_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(FillId::new);
        let outcome = self
            .fills
            .apply(FillEvent {
                client_order_id: order.client_order_id().clone(),
                venue_order_id: event.venue_order_id.clone(),
                fill: Fill::new(fill_id, quantity, price, event.timestamp),
                dedup_key,
            })
            .await?;

        Ok(match outcome {
            FillOutcome::Applied { order, late, .. } => IngestOutcome::Applied {
                client_order_id: order.client_order_id().clone(),
                status: order.status(),
                late,
            },
            FillOutcome::Duplicate => IngestOutcome::Duplicate,
        })
    }

    async fn ingest_status(
        &self,
        event: WebhookEvent,
        dedup_key: String,
    ) -> Result<IngestOutcome, ExecutionError> {
        let Some(status) = event.event_type.terminal_status() else {
            return Ok(IngestOutcome::Ignored {
                reason: format!("unhandled event type {}", event.event_type.as_str()),
            });
        };
        if self
            .ctx
            .store_call(self.ctx.store().has_event(&dedup_key))
            .await?
        {
            return Ok(IngestOutcome::Duplicate);
        }

        let order = self.locate(&event).await?;
        let id = order.client_order_id().clone();
        let now = self.ctx.now();
        let mut skipped = None;
        let stored = update_with_retry(&self.ctx, &id, |current| {
            if current.status().is_terminal() {
                skipped = Some(current.status());
                return Ok(None);
            }
            skipped = None;
            let mut next = current.clone();
            if next.status() == OrderStatus::New {
                next = OrderStateMachine::mark_submitted(&next, None, now)?;
            }
            let mut next =
                OrderStateMachine::apply_terminal(&next, status, event.reason.as_deref(), now)?;
            if next.venue_order_id().is_none() {
                next.venue_order_id.clone_from(&event.venue_order_id);
            }
            Ok(Some(next))
        })
        .await?;

        if !self
            .ctx
            .store_call(self.ctx.store().record_event(&dedup_key, now))
            .await?
        {
            return Ok(IngestOutcome::Duplicate);
        }

        if let Some(current) = skipped {
            tracing::info!(
                client_order_id = %id,
                status = %current,
                event_type = event.event_type.as_str(),
                "Status webhook for terminal order ignored"
            );
            return Ok(IngestOutcome::Ignored {
                reason: format!("order already {current}"),
            });
        }

        tracing::info!(
            client_order_id = %id,
            status = %stored.status(),
            reason = event.reason.as_deref().unwrap_or_default(),
            "Order status updated from webhook"
        );
        Ok(IngestOutcome::Applied {
            client_order_id: id,
            status: stored.status(),
            late: false,
        })
    }
}
