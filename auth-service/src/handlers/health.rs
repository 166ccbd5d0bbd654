use axum::extract::State;
use serde::Serialize;
use service_core::response::ApiResponse;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: String,
    pub version: String,
    pub credential_store: &'static str,
}

/// Liveness. A failing store probe degrades the status but the process
/// still answers.
pub async fn health_check(State(state): State<AppState>) -> ApiResponse<HealthStatus> {
    let store_up = match state.store.health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "Credential store health check failed");
            false
        }
    };

    ApiResponse::success(HealthStatus {
        status: if store_up { "healthy" } else { "degraded" },
        service: state.config.service_name.clone(),
        version: state.config.service_version.clone(),
        credential_store: if store_up { "up" } else { "down" },
    })
}
