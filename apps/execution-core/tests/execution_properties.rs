//! Execution Core Integration Tests
//!
//! End-to-end checks of the safety properties through the public API, with
//! the simulated venue, the in-memory store and a manual clock:
//! - Idempotent submission under concurrency
//! - Status paths stay inside the order graph
//! - Fail-closed admission
//! - Weighted-average P&L, including partial reductions
//! - Partial updates of the error message and venue order id
//! - Exactly-once webhook fills
//! - Stuck-order failure and the lookup budget
//! - Webhook secret policy

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use execution_core::application::ports::{
    FieldPatch, OrderLookup, OrderUpdate, PersistenceStore, VenueError,
};
use execution_core::application::use_cases::{
    AdmissionControl, IngestOutcome, ReconciliationEngine, RunOutcome, SubmitOrderUseCase,
    WebhookIngest,
};
use execution_core::config::{Config, load_config_from_string};
use execution_core::domain::admission::TripReason;
use execution_core::domain::order_execution::{OrderStateMachine, OrderStatus};
use execution_core::domain::position::{Position, PositionAccount, PositionKey};
use execution_core::domain::reconciliation::{ReconciliationRun, RunMode};
use execution_core::infrastructure::venue::SubmitScript;
use execution_core::{
    ExecutionContext, ExecutionError, InMemoryGateStore, InMemoryStore, ManualClock, Money,
    OrderRequest, OrderSide, Quantity, SimulatedVenue, Timestamp, VenueOrderId,
};
use rust_decimal_macros::dec;
use serde_json::json;

const SECRET: &str = "hook-secret";

struct Engine {
    store: Arc<InMemoryStore>,
    venue: Arc<SimulatedVenue>,
    gates: Arc<InMemoryGateStore>,
    clock: Arc<ManualClock>,
    admission: Arc<AdmissionControl>,
    submit: Arc<SubmitOrderUseCase>,
    webhooks: WebhookIngest,
    reconciliation: ReconciliationEngine,
}

fn t0() -> Timestamp {
    Timestamp::parse("2026-01-19T14:30:00Z").unwrap()
}

fn engine_with(config: Config) -> Engine {
    let clock = Arc::new(ManualClock::new(t0()));
    let store = Arc::new(InMemoryStore::new());
    let venue = Arc::new(SimulatedVenue::new(clock.clone()));
    let gates = Arc::new(InMemoryGateStore::new());
    let ctx = Arc::new(ExecutionContext::new(
        store.clone(),
        venue.clone(),
        gates.clone(),
        clock.clone(),
        config,
    ));
    let admission = Arc::new(AdmissionControl::new(ctx.clone()));
    Engine {
        store,
        venue,
        gates,
        clock,
        admission: admission.clone(),
        submit: Arc::new(SubmitOrderUseCase::new(ctx.clone(), admission)),
        webhooks: WebhookIngest::new(ctx.clone()),
        reconciliation: ReconciliationEngine::new(ctx),
    }
}

fn engine() -> Engine {
    engine_with(load_config_from_string(&format!("webhook:\n  secret: {SECRET}\n")).unwrap())
}

fn limit_buy(qty: i64) -> OrderRequest {
    OrderRequest::limit(
        "AAPL",
        OrderSide::Buy,
        Quantity::from_i64(qty),
        Money::new(dec!(187.25)),
        "mean-reversion",
    )
}

async fn periodic_run(engine: &Engine) -> ReconciliationRun {
    match engine.reconciliation.run(RunMode::Periodic).await.unwrap() {
        RunOutcome::Completed(run) => run,
        RunOutcome::Skipped => panic!("run skipped"),
    }
}

// ============================================
// Idempotent Submission
// ============================================

#[tokio::test]
async fn test_concurrent_identical_submissions_make_one_venue_call() {
    let engine = engine();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let submit = engine.submit.clone();
        handles.push(tokio::spawn(async move { submit.submit(limit_buy(100)).await }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().order().client_order_id().clone());
    }

    assert_eq!(engine.venue.calls().submits(), 1);
    assert!(ids.iter().all(|id| id == &ids[0]));
    assert_eq!(engine.store.order_count(), 1);
}

#[tokio::test]
async fn test_timed_out_submission_is_not_resent() {
    let engine = engine();
    engine.venue.script_submit(SubmitScript::AcceptThenTimeout);

    let err = engine.submit.submit(limit_buy(100)).await.unwrap_err();
    assert!(matches!(err, ExecutionError::BrokerTimeout { .. }));

    let retry = engine.submit.submit(limit_buy(100)).await.unwrap();
    assert!(retry.is_duplicate());
    assert_eq!(engine.venue.calls().submits(), 1);
}

// ============================================
// Status Graph
// ============================================

#[test]
fn test_no_transition_leaves_a_terminal_status() {
    let terminal = [
        OrderStatus::Filled,
        OrderStatus::Canceled,
        OrderStatus::Rejected,
        OrderStatus::Failed,
        OrderStatus::Expired,
    ];
    for from in terminal {
        assert!(
            OrderStateMachine::valid_next_states(from).is_empty(),
            "{from} has outgoing edges"
        );
    }
}

#[tokio::test]
async fn test_observed_status_path_is_valid() {
    let engine = engine();
    let order = engine.submit.submit(limit_buy(100)).await.unwrap().order().clone();
    let lookup = OrderLookup::for_order(&order);
    let mut observed = vec![order.status()];

    engine
        .venue
        .execute(&lookup, Quantity::from_i64(30), Money::new(dec!(187)))
        .unwrap();
    periodic_run(&engine).await;
    let current = engine.store.get_order(order.client_order_id()).await.unwrap().unwrap();
    observed.push(current.status());

    engine
        .venue
        .execute(&lookup, Quantity::from_i64(70), Money::new(dec!(187)))
        .unwrap();
    engine.clock.advance(chrono::Duration::seconds(30));
    periodic_run(&engine).await;
    let current = engine.store.get_order(order.client_order_id()).await.unwrap().unwrap();
    observed.push(current.status());

    assert_eq!(
        observed,
        vec![
            OrderStatus::SubmittedUnconfirmed,
            OrderStatus::PartiallyFilled,
            OrderStatus::Filled
        ]
    );
    assert_eq!(current.filled_quantity(), Quantity::from_i64(100));
}

// ============================================
// Admission
// ============================================

#[tokio::test]
async fn test_either_gate_alone_denies() {
    let engine = engine();

    engine
        .admission
        .trip_circuit_breaker(TripReason::DailyLossExceeded, None)
        .await
        .unwrap();
    assert!(!engine.admission.may_submit().await.is_allowed());

    engine.admission.reset_circuit_breaker("ops").await.unwrap();
    engine
        .admission
        .engage_kill_switch("ops", Some("maintenance".to_string()))
        .await
        .unwrap();
    assert!(!engine.admission.may_submit().await.is_allowed());

    engine.admission.release_kill_switch("ops").await.unwrap();
    assert!(engine.admission.may_submit().await.is_allowed());
}

#[tokio::test]
async fn test_unreachable_gate_store_fails_closed() {
    let engine = engine();
    engine.gates.set_unavailable(true);

    assert!(!engine.admission.may_submit().await.is_allowed());
    let err = engine.submit.submit(limit_buy(1)).await.unwrap_err();
    assert!(matches!(err, ExecutionError::AdmissionDenied(_)));
    assert_eq!(engine.venue.calls().submits(), 0);
    assert_eq!(engine.store.order_count(), 0);
}

// ============================================
// Position P&L
// ============================================

fn fill(position: &Position, side: OrderSide, qty: i64, price: Money) -> Position {
    PositionAccount::apply_fill(position, side, Quantity::from_i64(qty), price, t0())
        .unwrap()
        .0
}

fn flat() -> Position {
    Position::flat(PositionKey::new("AAPL", "s1"), t0())
}

#[test]
fn test_long_round_trip_realizes_profit() {
    let p = fill(&flat(), OrderSide::Buy, 100, Money::new(dec!(100.00)));
    let p = fill(&p, OrderSide::Sell, 100, Money::new(dec!(120.00)));
    assert_eq!(p.realized_pnl(), Money::new(dec!(2000.00)));
    assert_eq!(p.quantity(), Quantity::ZERO);
}

#[test]
fn test_partial_reduction_blends_average_price() {
    let p = fill(&flat(), OrderSide::Buy, 100, Money::new(dec!(100.00)));
    let p = fill(&p, OrderSide::Sell, 50, Money::new(dec!(120.00)));
    assert_eq!(p.realized_pnl(), Money::new(dec!(0.00)));
    assert_eq!(p.quantity(), Quantity::from_i64(50));
    assert_eq!(p.avg_entry_price(), Money::new(dec!(320.00)));

    let p = fill(&p, OrderSide::Sell, 50, Money::new(dec!(80.00)));
    assert_eq!(p.realized_pnl(), Money::new(dec!(-12000.00)));
    assert_eq!(p.quantity(), Quantity::ZERO);
}

#[test]
fn test_short_round_trip_realizes_profit() {
    let p = fill(&flat(), OrderSide::Sell, 100, Money::new(dec!(100.00)));
    let p = fill(&p, OrderSide::Buy, 100, Money::new(dec!(80.00)));
    assert_eq!(p.realized_pnl(), Money::new(dec!(2000.00)));
    assert_eq!(p.quantity(), Quantity::ZERO);
}

// ============================================
// Partial Updates
// ============================================

#[tokio::test]
async fn test_null_error_clears_and_omitted_venue_id_is_kept() {
    let engine = engine();
    engine.venue.script_submit(SubmitScript::AcceptThenTimeout);
    engine.submit.submit(limit_buy(10)).await.unwrap_err();
    let order = engine.store.list_open_orders().await.unwrap().remove(0);
    assert!(order.error_message().is_some());

    let with_id = engine
        .store
        .update_order(
            order.client_order_id(),
            order.version(),
            OrderUpdate::default().with_venue_order_id(VenueOrderId::new("v-77")),
            t0(),
        )
        .await
        .unwrap();

    let update: OrderUpdate = serde_json::from_value(json!({ "error_message": null })).unwrap();
    assert_eq!(update.error_message, FieldPatch::Clear);
    assert_eq!(update.venue_order_id, None);
    let cleared = engine
        .store
        .update_order(order.client_order_id(), with_id.version(), update, t0())
        .await
        .unwrap();

    assert_eq!(cleared.error_message(), None);
    assert_eq!(cleared.venue_order_id(), Some(&VenueOrderId::new("v-77")));
}

// ============================================
// Webhooks
// ============================================

#[tokio::test]
async fn test_webhook_redelivery_is_applied_once() {
    let engine = engine();
    let order = engine.submit.submit(limit_buy(100)).await.unwrap().order().clone();
    let body = json!({
        "event_id": "exec-123",
        "event_type": "fill",
        "venue_order_id": order.venue_order_id().unwrap().as_str(),
        "quantity": "100",
        "price": "187.20",
        "timestamp": "2026-01-19T14:30:02Z",
    })
    .to_string();

    let first = engine.webhooks.ingest(body.as_bytes(), Some(SECRET)).await.unwrap();
    let second = engine.webhooks.ingest(body.as_bytes(), Some(SECRET)).await.unwrap();

    assert!(matches!(
        first,
        IngestOutcome::Applied {
            status: OrderStatus::Filled,
            ..
        }
    ));
    assert_eq!(second, IngestOutcome::Duplicate);
    let position = engine
        .store
        .get_position(&PositionKey::new("AAPL", "mean-reversion"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(position.quantity(), Quantity::from_i64(100));
}

#[test]
fn test_webhook_secret_policy_by_environment() {
    for secret in ["", "   "] {
        let live = format!("environment: LIVE\nwebhook:\n  secret: \"{secret}\"\n");
        assert!(load_config_from_string(&live).is_err());

        let dry_run = format!("environment: LIVE\ndry_run: true\nwebhook:\n  secret: \"{secret}\"\n");
        assert!(load_config_from_string(&dry_run).is_ok());

        let test = format!("environment: TEST\nwebhook:\n  secret: \"{secret}\"\n");
        assert!(load_config_from_string(&test).is_ok());
    }
    assert!(load_config_from_string("environment: PAPER\n").is_err());
}

#[tokio::test]
async fn test_webhook_without_secret_is_refused_in_live() {
    let config = Config {
        environment: execution_core::config::Environment::Live,
        ..Config::default()
    };
    let engine = engine_with(config);

    let err = engine.webhooks.ingest(b"{}", None).await.unwrap_err();
    assert!(matches!(err, ExecutionError::WebhookUnauthorized));
}

// ============================================
// Reconciliation
// ============================================

#[tokio::test]
async fn test_stuck_order_fails_on_next_pass_after_grace() {
    let engine = engine();
    engine
        .venue
        .script_submit(SubmitScript::Fail(VenueError::Unavailable {
            message: "connection reset".to_string(),
        }));
    engine.submit.submit(limit_buy(5)).await.unwrap_err();
    let order = engine.store.list_open_orders().await.unwrap().remove(0);
    assert_eq!(order.status(), OrderStatus::SubmittedUnconfirmed);

    engine.clock.advance(chrono::Duration::seconds(299));
    periodic_run(&engine).await;
    let still_open = engine.store.get_order(order.client_order_id()).await.unwrap().unwrap();
    assert_eq!(still_open.status(), OrderStatus::SubmittedUnconfirmed);

    engine.clock.advance(chrono::Duration::seconds(2));
    let run = periodic_run(&engine).await;
    let failed = engine.store.get_order(order.client_order_id()).await.unwrap().unwrap();
    assert_eq!(failed.status(), OrderStatus::Failed);
    assert_eq!(run.stuck_failed, vec![order.client_order_id().clone()]);
}

#[tokio::test]
async fn test_run_respects_lookup_budget() {
    let mut config = load_config_from_string(&format!("webhook:\n  secret: {SECRET}\n")).unwrap();
    config.reconciliation.max_individual_lookups = 3;
    let engine = engine_with(config);
    for qty in 1..=6 {
        let order = engine.submit.submit(limit_buy(qty * 10)).await.unwrap().order().clone();
        engine
            .venue
            .execute(
                &OrderLookup::for_order(&order),
                Quantity::from_i64(1),
                Money::new(dec!(187)),
            )
            .unwrap();
    }
    let lookups_before = engine.venue.calls().order_lookups();
    let order_fills_before = engine.venue.calls().order_fill_queries();

    let run = periodic_run(&engine).await;

    let per_order_calls = engine.venue.calls().order_lookups() - lookups_before
        + engine.venue.calls().order_fill_queries()
        - order_fills_before;
    assert!(per_order_calls <= 3);
    assert_eq!(run.lookups_used, per_order_calls);
    assert!(run.orders_deferred > 0);
}

#[tokio::test]
async fn test_per_order_fill_queries_count_against_lookup_budget() {
    let mut config = load_config_from_string(&format!("webhook:\n  secret: {SECRET}\n")).unwrap();
    config.reconciliation.max_individual_lookups = 3;
    config.reconciliation.fills_backfill_initial_lookback_hours = 0;
    let engine = engine_with(config);
    for qty in 1..=4 {
        let order = engine.submit.submit(limit_buy(qty * 10)).await.unwrap().order().clone();
        engine
            .venue
            .execute(
                &OrderLookup::for_order(&order),
                Quantity::from_i64(1),
                Money::new(dec!(187)),
            )
            .unwrap();
    }
    engine.clock.advance(chrono::Duration::seconds(5));
    let lookups_before = engine.venue.calls().order_lookups();
    let order_fills_before = engine.venue.calls().order_fill_queries();

    let run = periodic_run(&engine).await;

    let order_lookups = engine.venue.calls().order_lookups() - lookups_before;
    let order_fill_queries = engine.venue.calls().order_fill_queries() - order_fills_before;
    assert_eq!(order_lookups, 2);
    assert_eq!(order_fill_queries, 1);
    assert_eq!(run.lookups_used, order_lookups + order_fill_queries);
    assert!(run.lookups_used <= 3);
    assert_eq!(run.fills_applied, 1);
    assert!(run.orders_deferred > 0);
}
