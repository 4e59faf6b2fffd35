use axum::{Json, extract::State};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ServiceDescriptor {
    name: &'static str,
    version: &'static str,
    /// Health check path, absent when the endpoint is disabled
    health: Option<String>,
    endpoints: Endpoints,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Endpoints {
    synthesize: &'static str,
    synthesize_audio: &'static str,
    audio: &'static str,
}

impl ServiceDescriptor {
    pub fn new(health: Option<String>) -> Self {
        Self {
            name: "intone",
            version: env!("CARGO_PKG_VERSION"),
            health,
            endpoints: Endpoints {
                synthesize: "POST /tts",
                synthesize_audio: "POST /tts/audio",
                audio: "GET|HEAD /audio/{taskId}",
            },
        }
    }
}

pub async fn root_handler(State(descriptor): State<ServiceDescriptor>) -> Json<ServiceDescriptor> {
    Json(descriptor)
}
