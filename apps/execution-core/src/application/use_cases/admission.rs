//! Admission Control Use Case
//!
//! `may_submit` is the single gate check shared by every path that takes on
//! new risk. It reads both gates and fails closed: an unreachable or slow
//! gate store yields `Denied(GateStateUnavailable)`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::application::context::ExecutionContext;
use crate::domain::admission::{
    AdmissionDecision, CircuitBreakerState, KillSwitchState, TripReason,
};
use crate::error::ExecutionError;
use crate::resilience::BrokerErrorCounter;

/// Both gate states, for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStatus {
    /// Kill switch.
    pub kill_switch: KillSwitchState,
    /// Circuit breaker.
    pub circuit_breaker: CircuitBreakerState,
}

/// Kill switch and circuit breaker gate.
#[derive(Debug)]
pub struct AdmissionControl {
    ctx: Arc<ExecutionContext>,
    broker_errors: BrokerErrorCounter,
}

impl AdmissionControl {
    /// Create the gate.
    #[must_use]
    pub fn new(ctx: Arc<ExecutionContext>) -> Self {
        let threshold = ctx.config().admission.broker_error_threshold;
        Self {
            ctx,
            broker_errors: BrokerErrorCounter::new(threshold),
        }
    }

    /// Decide whether a new submission may proceed.
    pub async fn may_submit(&self) -> AdmissionDecision {
        let gates = self.ctx.gates();
        let (kill_switch, breaker) = tokio::join!(
            self.ctx.gate_call(gates.kill_switch()),
            self.ctx.gate_call(gates.circuit_breaker()),
        );

        let decision = match (kill_switch, breaker) {
            (Ok(kill_switch), Ok(breaker)) => AdmissionDecision::evaluate(&kill_switch, &breaker),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(error = %e, "Gate state unreadable, denying submissions");
                AdmissionDecision::unavailable(e.to_string())
            }
        };

        if let AdmissionDecision::Denied(reason) = &decision {
            tracing::debug!(%reason, "Submission denied");
        }
        decision
    }

    /// Read both gates.
    ///
    /// # Errors
    ///
    /// Returns `AdmissionDenied(GateStateUnavailable)` if the store cannot be read.
    pub async fn status(&self) -> Result<GateStatus, ExecutionError> {
        let gates = self.ctx.gates();
        Ok(GateStatus {
            kill_switch: self.ctx.gate_call(gates.kill_switch()).await?,
            circuit_breaker: self.ctx.gate_call(gates.circuit_breaker()).await?,
        })
    }

    // ========================================================================
    // Operator controls
    // ========================================================================

    /// Engage the kill switch.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    pub async fn engage_kill_switch(
        &self,
        actor: &str,
        note: Option<String>,
    ) -> Result<KillSwitchState, ExecutionError> {
        let state = KillSwitchState::engaged(actor, note, self.ctx.now());
        self.ctx
            .gate_call(self.ctx.gates().set_kill_switch(state.clone()))
            .await?;
        tracing::warn!(actor, "Kill switch engaged");
        Ok(state)
    }

    /// Release the kill switch.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails; the switch then stays engaged.
    pub async fn release_kill_switch(&self, actor: &str) -> Result<KillSwitchState, ExecutionError> {
        let state = KillSwitchState::released(actor, self.ctx.now());
        self.ctx
            .gate_call(self.ctx.gates().set_kill_switch(state.clone()))
            .await?;
        tracing::info!(actor, "Kill switch released");
        Ok(state)
    }

    /// Trip the circuit breaker.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    pub async fn trip_circuit_breaker(
        &self,
        reason: TripReason,
        detail: Option<String>,
    ) -> Result<CircuitBreakerState, ExecutionError> {
        let state = CircuitBreakerState::tripped(reason, detail, self.ctx.now());
        self.ctx
            .gate_call(self.ctx.gates().set_circuit_breaker(state.clone()))
            .await?;
        tracing::warn!(reason = %reason, detail = ?state.detail, "Circuit breaker tripped");
        Ok(state)
    }

    /// Reset the circuit breaker.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails; the breaker then stays tripped.
    pub async fn reset_circuit_breaker(
        &self,
        actor: &str,
    ) -> Result<CircuitBreakerState, ExecutionError> {
        let state = CircuitBreakerState::reset(actor, self.ctx.now());
        self.ctx
            .gate_call(self.ctx.gates().set_circuit_breaker(state.clone()))
            .await?;
        self.broker_errors.record_success();
        tracing::info!(actor, "Circuit breaker reset");
        Ok(state)
    }

    // ========================================================================
    // Broker error tracking
    // ========================================================================

    /// Record a venue call that got an answer.
    pub fn record_venue_success(&self) {
        self.broker_errors.record_success();
    }

    /// Record a failed venue call, tripping the breaker at the threshold.
    pub async fn record_venue_failure(&self, error: &str) {
        if !self.broker_errors.record_failure() {
            return;
        }
        let detail = format!(
            "{} consecutive venue failures, last: {error}",
            self.broker_errors.consecutive_failures()
        );
        if let Err(e) = self
            .trip_circuit_breaker(TripReason::BrokerErrors, Some(detail))
            .await
        {
            tracing::error!(error = %e, "Failed to trip circuit breaker on broker errors");
        }
    }

    /// Current run of venue failures.
    #[must_use]
    pub fn consecutive_venue_failures(&self) -> u32 {
        self.broker_errors.consecutive_failures()
    }
}
