//! Search and hand-off API handlers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;

use reelscout_core::{
    HandoffError, MetadataClient, Query, QueryError, SearchOptions, SearchResponse, SoftFailure,
};

use crate::metrics::HANDOFFS_TOTAL;
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(flatten)]
    pub query: Query,
    #[serde(default)]
    pub options: SearchOptions,
}

#[derive(Debug, Serialize)]
pub struct SearchErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<SoftFailure>,
}

#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    pub sources: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    /// Registered providers, in merge priority order.
    pub providers: Vec<String>,
    pub priority: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct HandoffRequest {
    pub link: String,
}

#[derive(Debug, Serialize)]
pub struct HandoffResponse {
    pub status: &'static str,
    pub link: String,
}

fn query_error_status(error: &QueryError) -> StatusCode {
    match error {
        QueryError::AllSourcesFailed { .. } => StatusCode::BAD_GATEWAY,
        QueryError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        QueryError::InvalidQuery(_)
        | QueryError::UnknownSource(_)
        | QueryError::UnknownProvider(_) => StatusCode::BAD_REQUEST,
    }
}

fn handoff_error_status(error: &HandoffError) -> StatusCode {
    match error {
        HandoffError::InvalidLink(_) => StatusCode::BAD_REQUEST,
        HandoffError::ChannelFull | HandoffError::ChannelClosed | HandoffError::NotConfigured => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

fn handoff_error_label(error: &HandoffError) -> &'static str {
    match error {
        HandoffError::InvalidLink(_) => "invalid_link",
        HandoffError::ChannelFull => "channel_full",
        HandoffError::ChannelClosed => "channel_closed",
        HandoffError::NotConfigured => "not_configured",
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/search
///
/// Gather listings from the selected sources and enrich them with metadata.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, impl IntoResponse> {
    match state.coordinator().execute(&body.query, &body.options).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            let status = query_error_status(&e);
            warn!(query = %body.query.title, error = %e, "Search failed");
            let failures = match &e {
                QueryError::AllSourcesFailed { failures } => failures.clone(),
                _ => Vec::new(),
            };
            Err((
                status,
                Json(SearchErrorResponse {
                    error: e.to_string(),
                    code: e.kind(),
                    failures,
                }),
            ))
        }
    }
}

/// GET /api/v1/sources
pub async fn list_sources(State(state): State<Arc<AppState>>) -> Json<SourcesResponse> {
    Json(SourcesResponse {
        sources: state.coordinator().sources().ids(),
    })
}

/// GET /api/v1/providers
pub async fn list_providers(State(state): State<Arc<AppState>>) -> Json<ProvidersResponse> {
    let coordinator = state.coordinator();
    let reconciler = coordinator.reconciler();
    let providers = reconciler
        .order_providers(&coordinator.providers().all())
        .iter()
        .map(|p: &Arc<dyn MetadataClient>| p.id().to_string())
        .collect();
    Json(ProvidersResponse {
        providers,
        priority: reconciler.priority().to_vec(),
    })
}

/// POST /api/v1/handoff
///
/// Queue a candidate's link for download. Returns 202 once queued.
pub async fn hand_off(
    State(state): State<Arc<AppState>>,
    Json(body): Json<HandoffRequest>,
) -> impl IntoResponse {
    match state.coordinator().hand_off(&body.link) {
        Ok(()) => {
            HANDOFFS_TOTAL.with_label_values(&["queued"]).inc();
            (
                StatusCode::ACCEPTED,
                Json(HandoffResponse {
                    status: "queued",
                    link: body.link.trim().to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            let label = handoff_error_label(&e);
            HANDOFFS_TOTAL.with_label_values(&[label]).inc();
            (
                handoff_error_status(&e),
                Json(SearchErrorResponse {
                    error: e.to_string(),
                    code: label,
                    failures: Vec::new(),
                }),
            )
                .into_response()
        }
    }
}
