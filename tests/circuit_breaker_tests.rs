//! Integration tests for the circuit breaker (C4) against its public API,
//! focused on behavior that spans more than one `CircuitBreaker` instance
//! sharing a state store -- the in-module unit tests in
//! `src/breaker/circuit_breaker.rs` already cover single-instance
//! transitions.

use gatewright::breaker::{Admission, BreakerState, CircuitBreaker, InMemoryStateStore};
use gatewright::models::breaker_config::CircuitBreakerConfig;
use std::sync::Arc;

fn config(max_failures: u64, reset_timeout_ms: u64) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        timeout: 1_000,
        reset_timeout: reset_timeout_ms,
        max_failures,
        group: None,
        on_open: None,
        on_close: None,
        on_rejected: None,
        disable_stats: false,
    }
}

#[tokio::test]
async fn two_instances_sharing_a_store_share_open_state() {
    let store = Arc::new(InMemoryStateStore::new());
    let cfg = config(2, 60_000);

    let a = CircuitBreaker::new("orders#default".to_string(), &cfg, store.clone(), None, None, None);
    let b = CircuitBreaker::new("orders#default".to_string(), &cfg, store.clone(), None, None, None);

    assert_eq!(a.admit().await, Admission::Allowed);
    a.record_failure().await;
    assert_eq!(a.admit().await, Admission::Allowed);
    a.record_failure().await;

    // `b` never saw a request directly, but shares the same store key.
    assert_eq!(b.admit().await, Admission::Rejected);
    assert_eq!(b.current_state(), BreakerState::Open);
}

#[tokio::test]
async fn different_ids_on_the_same_store_stay_independent() {
    let store = Arc::new(InMemoryStateStore::new());
    let cfg = config(1, 60_000);

    let orders = CircuitBreaker::new("orders#default".to_string(), &cfg, store.clone(), None, None, None);
    let accounts = CircuitBreaker::new("accounts#default".to_string(), &cfg, store.clone(), None, None, None);

    orders.record_failure().await;
    assert_eq!(orders.admit().await, Admission::Rejected);
    assert_eq!(accounts.admit().await, Admission::Allowed);
}

#[tokio::test]
async fn concurrent_half_open_probes_admit_only_one_winner() {
    let store = Arc::new(InMemoryStateStore::new());
    let cfg = config(1, 0);

    let a = CircuitBreaker::new("payments#default".to_string(), &cfg, store.clone(), None, None, None);
    a.record_failure().await;
    assert_eq!(a.current_state(), BreakerState::Open);

    let b = CircuitBreaker::new("payments#default".to_string(), &cfg, store.clone(), None, None, None);

    let (first, second) = tokio::join!(a.admit(), b.admit());
    let admitted = [first, second].iter().filter(|r| **r == Admission::Allowed).count();
    assert_eq!(admitted, 1, "exactly one racer should win the half-open probe slot");
}

#[tokio::test]
async fn notify_hooks_fire_on_open_and_close() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let store = Arc::new(InMemoryStateStore::new());
    let cfg = config(1, 0);

    let opened = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(AtomicUsize::new(0));

    let on_open = {
        let opened = opened.clone();
        Arc::new(move |_id: &str| {
            opened.fetch_add(1, Ordering::SeqCst);
        })
    };
    let on_close = {
        let closed = closed.clone();
        Arc::new(move |_id: &str| {
            closed.fetch_add(1, Ordering::SeqCst);
        })
    };

    let cb = CircuitBreaker::new(
        "notify#default".to_string(),
        &cfg,
        store,
        Some(on_open),
        Some(on_close),
        None,
    );

    cb.record_failure().await;
    assert_eq!(opened.load(Ordering::SeqCst), 1);

    assert_eq!(cb.admit().await, Admission::Allowed);
    cb.record_success().await;
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}
