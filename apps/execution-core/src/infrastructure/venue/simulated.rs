//! Deterministic venue simulator.
//!
//! Accepts every order unless told otherwise, assigns sequential ids and
//! only executes what a test scripts through [`SimulatedVenue::execute`].
//! Used for dry runs and as the venue in tests. It does not match orders.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::application::ports::{
    BrokerVenuePort, Clock, FillPage, FillQuery, OrderLookup, VenueError, VenueFill, VenueOrder,
    VenueOrderRequest, VenueOrderStatus, VenuePosition,
};
use crate::domain::shared::{
    ClientOrderId, FillId, Money, Quantity, Symbol, Timestamp, VenueOrderId,
};

/// Scripted outcome for the next `submit` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitScript {
    /// Fail with the given error; the venue never sees the order.
    Fail(VenueError),
    /// Accept the order but report a timeout to the caller.
    AcceptThenTimeout,
}

#[derive(Debug)]
struct SimOrder {
    request: VenueOrderRequest,
    order: VenueOrder,
}

#[derive(Debug, Default)]
struct SimState {
    orders: BTreeMap<VenueOrderId, SimOrder>,
    by_client: HashMap<ClientOrderId, VenueOrderId>,
    fills: Vec<VenueFill>,
    position_overrides: HashMap<Symbol, Quantity>,
    submit_scripts: VecDeque<SubmitScript>,
    next_order: u64,
    next_fill: u64,
}

impl SimState {
    fn find(&self, lookup: &OrderLookup) -> Option<&SimOrder> {
        let venue_id = match lookup {
            OrderLookup::Venue(id) => id,
            OrderLookup::Client(id) => self.by_client.get(id)?,
        };
        self.orders.get(venue_id)
    }

    fn accept(&mut self, request: VenueOrderRequest, now: Timestamp) -> VenueOrder {
        self.next_order += 1;
        let venue_order_id = VenueOrderId::new(format!("sim-{}", self.next_order));
        let order = VenueOrder {
            venue_order_id: venue_order_id.clone(),
            client_order_id: request.client_order_id.clone(),
            status: VenueOrderStatus::Accepted,
            filled_quantity: Quantity::ZERO,
            filled_avg_price: None,
            reject_reason: None,
            updated_at: now,
        };
        self.by_client
            .insert(request.client_order_id.clone(), venue_order_id.clone());
        self.orders.insert(
            venue_order_id,
            SimOrder {
                request,
                order: order.clone(),
            },
        );
        order
    }
}

/// Call counters, for asserting on venue usage.
#[derive(Debug, Default)]
pub struct CallCounts {
    submits: AtomicU32,
    cancels: AtomicU32,
    order_lookups: AtomicU32,
    fill_queries: AtomicU32,
    order_fill_queries: AtomicU32,
    position_queries: AtomicU32,
}

impl CallCounts {
    /// Number of `submit` calls.
    #[must_use]
    pub fn submits(&self) -> u32 {
        self.submits.load(Ordering::SeqCst)
    }

    /// Number of `cancel` calls.
    #[must_use]
    pub fn cancels(&self) -> u32 {
        self.cancels.load(Ordering::SeqCst)
    }

    /// Number of `get_order` calls.
    #[must_use]
    pub fn order_lookups(&self) -> u32 {
        self.order_lookups.load(Ordering::SeqCst)
    }

    /// Number of `get_fills` calls.
    #[must_use]
    pub fn fill_queries(&self) -> u32 {
        self.fill_queries.load(Ordering::SeqCst)
    }

    /// Number of `get_fills` calls scoped to one order.
    #[must_use]
    pub fn order_fill_queries(&self) -> u32 {
        self.order_fill_queries.load(Ordering::SeqCst)
    }

    /// Number of `get_positions` calls.
    #[must_use]
    pub fn position_queries(&self) -> u32 {
        self.position_queries.load(Ordering::SeqCst)
    }

    fn bump(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// In-process `BrokerVenuePort`.
#[derive(Debug)]
pub struct SimulatedVenue {
    clock: Arc<dyn Clock>,
    state: Mutex<SimState>,
    calls: CallCounts,
    unavailable: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl SimulatedVenue {
    /// Create an empty venue.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(SimState::default()),
            calls: CallCounts::default(),
            unavailable: AtomicBool::new(false),
            latency: Mutex::new(None),
        }
    }

    /// Call counters.
    #[must_use]
    pub const fn calls(&self) -> &CallCounts {
        &self.calls
    }

    /// Queue an outcome for the next `submit`.
    pub fn script_submit(&self, script: SubmitScript) {
        self.lock().submit_scripts.push_back(script);
    }

    /// Fail every call with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every call.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Report `quantity` for `symbol` from `get_positions` instead of the
    /// fill-derived figure.
    pub fn override_position(&self, symbol: impl Into<Symbol>, quantity: Quantity) {
        self.lock()
            .position_overrides
            .insert(symbol.into(), quantity);
    }

    /// Execute part of an order and record the fill.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the venue has no such order.
    pub fn execute(
        &self,
        lookup: &OrderLookup,
        quantity: Quantity,
        price: Money,
    ) -> Result<VenueFill, VenueError> {
        let now = self.clock.now();
        let mut state = self.lock();
        state.next_fill += 1;
        let fill_id = FillId::new(format!("sim-fill-{}", state.next_fill));

        let venue_order_id = state
            .find(lookup)
            .map(|o| o.order.venue_order_id.clone())
            .ok_or_else(|| not_found(lookup))?;
        let sim = state
            .orders
            .get_mut(&venue_order_id)
            .ok_or_else(|| not_found(lookup))?;

        let prior = sim.order.filled_quantity;
        let filled = prior + quantity;
        let prior_value = sim
            .order
            .filled_avg_price
            .map_or(rust_decimal::Decimal::ZERO, |p| p.amount() * prior.amount());
        let avg = (prior_value + price.amount() * quantity.amount()) / filled.amount();

        sim.order.filled_quantity = filled;
        sim.order.filled_avg_price = Some(Money::new(avg));
        sim.order.status = if filled >= sim.request.quantity {
            VenueOrderStatus::Filled
        } else {
            VenueOrderStatus::PartiallyFilled
        };
        sim.order.updated_at = now;

        let fill = VenueFill {
            fill_id,
            venue_order_id,
            client_order_id: Some(sim.request.client_order_id.clone()),
            symbol: sim.request.symbol.clone(),
            side: sim.request.side,
            quantity,
            price,
            executed_at: now,
        };
        state.fills.push(fill.clone());
        drop(state);
        Ok(fill)
    }

    /// Force an order into a venue status (e.g. expire or reject it).
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the venue has no such order.
    pub fn set_status(
        &self,
        lookup: &OrderLookup,
        status: VenueOrderStatus,
        reason: Option<&str>,
    ) -> Result<(), VenueError> {
        let now = self.clock.now();
        let mut state = self.lock();
        let venue_order_id = state
            .find(lookup)
            .map(|o| o.order.venue_order_id.clone())
            .ok_or_else(|| not_found(lookup))?;
        if let Some(sim) = state.orders.get_mut(&venue_order_id) {
            sim.order.status = status;
            sim.order.reject_reason = reason.map(str::to_string);
            sim.order.updated_at = now;
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self) -> Result<(), VenueError> {
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(VenueError::Unavailable {
                message: "simulated outage".to_string(),
            });
        }
        Ok(())
    }
}

fn not_found(lookup: &OrderLookup) -> VenueError {
    let id = match lookup {
        OrderLookup::Venue(id) => id.to_string(),
        OrderLookup::Client(id) => id.to_string(),
    };
    VenueError::NotFound { id }
}

#[async_trait]
impl BrokerVenuePort for SimulatedVenue {
    async fn submit(&self, request: VenueOrderRequest) -> Result<VenueOrder, VenueError> {
        CallCounts::bump(&self.calls.submits);
        self.enter().await?;

        let now = self.clock.now();
        let mut state = self.lock();
        if state.by_client.contains_key(&request.client_order_id) {
            return Err(VenueError::Rejected {
                reason: format!("duplicate client_order_id {}", request.client_order_id),
            });
        }
        match state.submit_scripts.pop_front() {
            Some(SubmitScript::Fail(err)) => Err(err),
            Some(SubmitScript::AcceptThenTimeout) => {
                state.accept(request, now);
                Err(VenueError::Timeout)
            }
            None => {
                let order = state.accept(request, now);
                tracing::debug!(
                    client_order_id = %order.client_order_id,
                    venue_order_id = %order.venue_order_id,
                    "Simulated venue accepted order"
                );
                Ok(order)
            }
        }
    }

    async fn cancel(&self, venue_order_id: &VenueOrderId) -> Result<(), VenueError> {
        CallCounts::bump(&self.calls.cancels);
        self.enter().await?;

        let now = self.clock.now();
        let mut state = self.lock();
        let sim = state
            .orders
            .get_mut(venue_order_id)
            .ok_or_else(|| VenueError::NotFound {
                id: venue_order_id.to_string(),
            })?;
        if sim.order.status.is_final() {
            return Err(VenueError::Rejected {
                reason: format!("order already {:?}", sim.order.status),
            });
        }
        sim.order.status = VenueOrderStatus::Canceled;
        sim.order.updated_at = now;
        Ok(())
    }

    async fn get_order(&self, lookup: &OrderLookup) -> Result<VenueOrder, VenueError> {
        CallCounts::bump(&self.calls.order_lookups);
        self.enter().await?;

        self.lock()
            .find(lookup)
            .map(|sim| sim.order.clone())
            .ok_or_else(|| not_found(lookup))
    }

    async fn get_fills(&self, query: &FillQuery) -> Result<FillPage, VenueError> {
        CallCounts::bump(&self.calls.fill_queries);
        if query.venue_order_id.is_some() {
            CallCounts::bump(&self.calls.order_fill_queries);
        }
        self.enter().await?;

        let state = self.lock();
        let mut matching: Vec<&VenueFill> = state
            .fills
            .iter()
            .filter(|f| f.executed_at >= query.since && f.executed_at <= query.until)
            .filter(|f| {
                query
                    .venue_order_id
                    .as_ref()
                    .is_none_or(|id| &f.venue_order_id == id)
            })
            .collect();
        matching.sort_by_key(|f| f.executed_at);

        let offset = query
            .page_token
            .as_deref()
            .and_then(|t| t.parse::<usize>().ok())
            .unwrap_or(0);
        let page_size = query.page_size.max(1) as usize;
        let fills: Vec<VenueFill> = matching
            .iter()
            .skip(offset)
            .take(page_size)
            .map(|f| (*f).clone())
            .collect();
        let next = offset + fills.len();
        let next_page_token = (next < matching.len()).then(|| next.to_string());
        drop(state);

        Ok(FillPage {
            fills,
            next_page_token,
        })
    }

    async fn get_positions(&self) -> Result<Vec<VenuePosition>, VenueError> {
        CallCounts::bump(&self.calls.position_queries);
        self.enter().await?;

        let state = self.lock();
        let mut net: BTreeMap<Symbol, Quantity> = BTreeMap::new();
        for fill in &state.fills {
            let signed = Quantity::new(fill.quantity.amount() * fill.side.sign());
            let entry = net.entry(fill.symbol.clone()).or_default();
            *entry = *entry + signed;
        }
        for (symbol, quantity) in &state.position_overrides {
            net.insert(symbol.clone(), *quantity);
        }
        drop(state);

        Ok(net
            .into_iter()
            .filter(|(_, quantity)| !quantity.is_zero())
            .map(|(symbol, quantity)| VenuePosition { symbol, quantity })
            .collect())
    }
}
