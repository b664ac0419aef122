//! Configuration endpoint handler exposing the effective config.

use axum::{extract::State, response::IntoResponse, Json};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the /config endpoint.
#[instrument(skip(state))]
pub async fn config_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /config request");
    Json(state.config.as_ref().clone())
}
