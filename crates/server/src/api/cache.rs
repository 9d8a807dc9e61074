//! Cache inspection API handlers.

use std::sync::Arc;

use axum::{extract::State, Json};
use reelscout_core::CacheStats;
use serde::Serialize;
use tracing::info;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub listings: CacheStats,
    pub metadata: CacheStats,
}

fn stats(state: &AppState) -> CacheStatsResponse {
    let coordinator = state.coordinator();
    CacheStatsResponse {
        listings: coordinator.engine().cache().stats(),
        metadata: coordinator.reconciler().cache().stats(),
    }
}

/// GET /api/v1/cache
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<CacheStatsResponse> {
    Json(stats(&state))
}

/// DELETE /api/v1/cache
///
/// Clear both caches and return the resulting stats.
pub async fn clear(State(state): State<Arc<AppState>>) -> Json<CacheStatsResponse> {
    let coordinator = state.coordinator();
    coordinator.engine().cache().clear();
    coordinator.reconciler().cache().clear();
    info!("Caches cleared");
    Json(stats(&state))
}
