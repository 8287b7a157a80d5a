//! Circuit breaker (C4): a per-(API, group) state machine that fails fast
//! once an upstream crosses its failure threshold.
//!
//! Transitions follow the classic three-state (Closed/Open/HalfOpen) design
//! with an atomic-counter hot path, but the canonical state now lives in a
//! [`StateStore`] (C1) instead of purely in process memory: the "open
//! since" timestamp is visible to every gateway
//! instance sharing the store, so any of them can flip Open to HalfOpen once
//! the reset timeout elapses, not just the instance that tripped it. State
//! transitions that matter (claiming the single half-open probe slot,
//! opening the circuit) go through `compare_and_swap` so two instances
//! racing on the same key can't both win.

use crate::breaker::state_store::{StateStore, StoredValue};
use crate::models::breaker_config::CircuitBreakerConfig as BreakerConfigModel;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl From<u8> for BreakerState {
    fn from(value: u8) -> Self {
        match value {
            1 => BreakerState::Open,
            2 => BreakerState::HalfOpen,
            _ => BreakerState::Closed,
        }
    }
}

impl From<BreakerState> for u8 {
    fn from(state: BreakerState) -> u8 {
        match state {
            BreakerState::Closed => 0,
            BreakerState::Open => 1,
            BreakerState::HalfOpen => 2,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct PersistedState {
    state: u8,
    failure_count: u64,
    opened_at_millis: Option<u64>,
    half_open_pending: bool,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            state: BreakerState::Closed.into(),
            failure_count: 0,
            opened_at_millis: None,
            half_open_pending: false,
        }
    }
}

/// What the breaker decided about one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Rejected,
}

pub type NotifyHook = Arc<dyn Fn(&str) + Send + Sync>;

/// One breaker instance, identified by `id` (conventionally `"{api path}#{group or "default"}"`).
/// Multiple breaker stages on the same API path that share a group set share
/// one `CircuitBreaker`/state-store key, per the design's single-state-per-path rule.
pub struct CircuitBreaker {
    id: String,
    max_failures: u64,
    reset_timeout: Duration,
    pub call_timeout: Duration,
    store: Arc<dyn StateStore>,
    local_state: AtomicU8,
    on_open: Option<NotifyHook>,
    on_close: Option<NotifyHook>,
    on_rejected: Option<NotifyHook>,
}

impl CircuitBreaker {
    pub fn new(
        id: String,
        config: &BreakerConfigModel,
        store: Arc<dyn StateStore>,
        on_open: Option<NotifyHook>,
        on_close: Option<NotifyHook>,
        on_rejected: Option<NotifyHook>,
    ) -> Self {
        Self {
            id,
            max_failures: config.max_failures,
            reset_timeout: Duration::from_millis(config.reset_timeout),
            call_timeout: Duration::from_millis(config.timeout),
            store,
            local_state: AtomicU8::new(BreakerState::Closed.into()),
            on_open,
            on_close,
            on_rejected,
        }
    }

    fn key(&self) -> String {
        format!("circuit-breaker:{}", self.id)
    }

    async fn load(&self) -> (PersistedState, Option<u64>) {
        match self.store.get(&self.key()).await {
            Ok(Some(value)) => (
                serde_json::from_slice(&value.bytes).unwrap_or_default(),
                Some(value.version),
            ),
            Ok(None) => (PersistedState::default(), None),
            Err(e) => {
                warn!("circuit breaker {} state store unavailable, failing open: {e}", self.id);
                (PersistedState::default(), None)
            }
        }
    }

    /// Attempts to persist `next` with a compare-and-swap against
    /// `expected_version`. Returns `true` if it won the race.
    async fn try_commit(&self, expected_version: Option<u64>, next: &PersistedState) -> bool {
        let bytes = match serde_json::to_vec(next) {
            Ok(b) => b,
            Err(_) => return false,
        };
        match self.store.compare_and_swap(&self.key(), expected_version, bytes).await {
            Ok(StoredValue { .. }) => {
                self.local_state.store(next.state, Ordering::Relaxed);
                true
            }
            Err(_) => false,
        }
    }

    /// Decides whether a request may proceed. Fails open: a store error is
    /// treated as Closed rather than blocking traffic.
    pub async fn admit(&self) -> Admission {
        let (mut persisted, version) = self.load().await;
        self.local_state.store(persisted.state, Ordering::Relaxed);

        match BreakerState::from(persisted.state) {
            BreakerState::Closed => Admission::Allowed,
            BreakerState::HalfOpen => {
                if persisted.half_open_pending {
                    self.reject().await;
                    return Admission::Rejected;
                }
                persisted.half_open_pending = true;
                if self.try_commit(version, &persisted).await {
                    Admission::Allowed
                } else {
                    // Another instance claimed the probe slot first.
                    self.reject().await;
                    Admission::Rejected
                }
            }
            BreakerState::Open => {
                let elapsed = persisted
                    .opened_at_millis
                    .map(|opened| now_millis().saturating_sub(opened))
                    .unwrap_or(0);
                if elapsed < self.reset_timeout.as_millis() as u64 {
                    self.reject().await;
                    return Admission::Rejected;
                }
                persisted.state = BreakerState::HalfOpen.into();
                persisted.half_open_pending = true;
                if self.try_commit(version, &persisted).await {
                    info!("circuit breaker {} half-open, probing", self.id);
                    Admission::Allowed
                } else {
                    self.reject().await;
                    Admission::Rejected
                }
            }
        }
    }

    async fn reject(&self) {
        if let Some(hook) = &self.on_rejected {
            hook(&self.id);
        }
    }

    /// Records a successful call. Closes the circuit if this was the
    /// half-open probe; otherwise clears the failure streak.
    pub async fn record_success(&self) {
        let (mut persisted, version) = self.load().await;
        match BreakerState::from(persisted.state) {
            BreakerState::Closed => {
                if persisted.failure_count != 0 {
                    persisted.failure_count = 0;
                    self.try_commit(version, &persisted).await;
                }
            }
            BreakerState::HalfOpen => {
                let closed = PersistedState::default();
                if self.try_commit(version, &closed).await {
                    info!("circuit breaker {} closed, probe succeeded", self.id);
                    if let Some(hook) = &self.on_close {
                        hook(&self.id);
                    }
                }
            }
            BreakerState::Open => {}
        }
    }

    /// Records a failed call (including a timed-out call). Opens the
    /// circuit on crossing `max_failures`, or immediately reopens it if the
    /// failure was the half-open probe.
    pub async fn record_failure(&self) {
        let (mut persisted, version) = self.load().await;
        match BreakerState::from(persisted.state) {
            BreakerState::Closed => {
                persisted.failure_count += 1;
                if persisted.failure_count >= self.max_failures {
                    persisted.state = BreakerState::Open.into();
                    persisted.opened_at_millis = Some(now_millis());
                    persisted.half_open_pending = false;
                    if self.try_commit(version, &persisted).await {
                        warn!(
                            "circuit breaker {} opened after {} failures",
                            self.id, persisted.failure_count
                        );
                        if let Some(hook) = &self.on_open {
                            hook(&self.id);
                        }
                    }
                } else {
                    self.try_commit(version, &persisted).await;
                }
            }
            BreakerState::HalfOpen => {
                persisted.state = BreakerState::Open.into();
                persisted.opened_at_millis = Some(now_millis());
                persisted.half_open_pending = false;
                if self.try_commit(version, &persisted).await {
                    warn!("circuit breaker {} reopened, probe failed", self.id);
                    if let Some(hook) = &self.on_open {
                        hook(&self.id);
                    }
                }
            }
            BreakerState::Open => {}
        }
    }

    pub fn current_state(&self) -> BreakerState {
        BreakerState::from(self.local_state.load(Ordering::Relaxed))
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::state_store::InMemoryStateStore;

    fn breaker(max_failures: u64, reset_timeout_ms: u64) -> CircuitBreaker {
        let config = BreakerConfigModel {
            timeout: 1_000,
            reset_timeout: reset_timeout_ms,
            max_failures,
            group: None,
            on_open: None,
            on_close: None,
            on_rejected: None,
            disable_stats: false,
        };
        CircuitBreaker::new(
            "test-api#default".to_string(),
            &config,
            Arc::new(InMemoryStateStore::new()),
            None,
            None,
            None,
        )
    }

    #[tokio::test]
    async fn opens_after_max_failures() {
        let cb = breaker(2, 60_000);
        assert_eq!(cb.admit().await, Admission::Allowed);
        cb.record_failure().await;
        assert_eq!(cb.admit().await, Admission::Allowed);
        cb.record_failure().await;

        assert_eq!(cb.admit().await, Admission::Rejected);
        assert_eq!(cb.current_state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn half_open_probe_admits_exactly_one_request() {
        let cb = breaker(1, 0);
        cb.record_failure().await; // opens immediately
        assert_eq!(cb.current_state(), BreakerState::Open);

        // reset_timeout is 0ms, so the next admit flips straight to half-open.
        assert_eq!(cb.admit().await, Admission::Allowed);
        assert_eq!(cb.current_state(), BreakerState::HalfOpen);
        // A second concurrent request finds the single probe slot taken.
        assert_eq!(cb.admit().await, Admission::Rejected);
    }

    #[tokio::test]
    async fn successful_probe_closes_the_circuit() {
        let cb = breaker(1, 0);
        cb.record_failure().await;
        assert_eq!(cb.admit().await, Admission::Allowed);
        cb.record_success().await;
        assert_eq!(cb.current_state(), BreakerState::Closed);
        assert_eq!(cb.admit().await, Admission::Allowed);
    }

    #[tokio::test]
    async fn failed_probe_reopens_the_circuit() {
        let cb = breaker(1, 0);
        cb.record_failure().await;
        assert_eq!(cb.admit().await, Admission::Allowed);
        cb.record_failure().await;
        assert_eq!(cb.current_state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn success_in_closed_state_resets_failure_streak() {
        let cb = breaker(3, 60_000);
        cb.record_failure().await;
        cb.record_failure().await;
        cb.record_success().await;
        cb.record_failure().await;
        cb.record_failure().await;
        // Two failures after the reset shouldn't be enough to open (threshold 3).
        assert_eq!(cb.admit().await, Admission::Allowed);
        assert_eq!(cb.current_state(), BreakerState::Closed);
    }
}
