//! Application state shared across HTTP handlers.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::streams::MetricStreams;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state handed to every HTTP handler.
pub struct AppState {
    pub streams: MetricStreams,
    pub config: Arc<Config>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}
