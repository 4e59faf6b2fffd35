use std::sync::Arc;

use axum::{Json, extract::State};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    model_loaded: bool,
    version: &'static str,
    /// Why the engine is unavailable
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

/// Liveness plus engine readiness; always 200 while the process serves
pub async fn health_handler(State(tts): State<Arc<tts::Server>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model_loaded: tts.engine_ready(),
        version: env!("CARGO_PKG_VERSION"),
        detail: tts.engine_unavailable_reason().map(str::to_string),
    })
}
