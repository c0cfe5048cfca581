use std::sync::Arc;

use axum::extract::State;
use storefront_api::{
    routes::health::health_check, state::AppState, store::Store, store::snapshot::MemorySink,
};

#[tokio::test]
async fn health_check_returns_ok() {
    let state = AppState::new(Arc::new(Store::new()), Arc::new(MemorySink::default()));

    let response = health_check(State(state)).await;
    assert_eq!(response.0.message, "Health check");

    let data = response.0.data.expect("health data");
    assert_eq!(data.status, "ok");
}

#[tokio::test]
async fn health_check_reports_degraded_sink() {
    let store = Arc::new(Store::new());
    store.set_degraded(true);
    let state = AppState::new(store, Arc::new(MemorySink::default()));

    let response = health_check(State(state)).await;
    let data = response.0.data.expect("health data");
    assert_eq!(data.status, "degraded");
}
