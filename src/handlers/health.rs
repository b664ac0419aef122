//! Health check endpoint handler.
//!
//! Reports per-stream status: a terminally failed metric stream shows up
//! here so operators can spot silent degradation (the process itself
//! keeps serving the remaining streams).

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::{debug, instrument};

use crate::sampler::StreamStatus;
use crate::state::SharedState;

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let streams = &state.streams;
    let statuses = [
        ("cpu", streams.cpu.status(), streams.cpu.backlog_len()),
        ("ram", streams.ram.status(), streams.ram.backlog_len()),
        (
            "storage",
            streams.storage.status(),
            streams.storage.backlog_len(),
        ),
        (
            "network",
            streams.network.status(),
            streams.network.backlog_len(),
        ),
        ("gpu", streams.gpu.status(), streams.gpu.backlog_len()),
        (
            "speed_test",
            streams.speed_test.status(),
            streams.speed_test.backlog_len(),
        ),
    ];

    let any_failed = statuses
        .iter()
        .any(|(_, status, _)| *status == StreamStatus::Failed);

    let body = json!({
        "status": if any_failed { "degraded" } else { "ok" },
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "streams": statuses
            .iter()
            .map(|(name, status, backlog)| {
                (
                    name.to_string(),
                    json!({
                        "state": status.to_string(),
                        "backlog": backlog,
                    }),
                )
            })
            .collect::<serde_json::Map<String, serde_json::Value>>(),
    });

    let status = if any_failed {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status, Json(body))
}
