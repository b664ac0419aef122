//! Root endpoint handler for the landing page.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");

    let version = env!("CARGO_PKG_VERSION");

    let uptime_secs = state.start_time.elapsed().as_secs();
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    let uptime_str = format!("{}h {}m {}s", hours, minutes, seconds);

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>sysvitals</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
               margin: 0; padding: 20px; background: #f5f5f5; line-height: 1.6; }}
        .container {{ max-width: 700px; margin: 0 auto; background: white; padding: 40px;
                     border-radius: 8px; box-shadow: 0 2px 8px rgba(0,0,0,0.1); }}
        h1 {{ color: #333; border-bottom: 3px solid #007bff; padding-bottom: 15px; }}
        code {{ background: #f0f0f0; padding: 2px 6px; border-radius: 4px; }}
        li {{ margin: 8px 0; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>sysvitals v{version}</h1>
        <p>Uptime: {uptime_str}</p>
        <p>Live metric streams (Server-Sent Events, backlog replayed on connect):</p>
        <ul>
            <li><a href="/streams/cpu"><code>/streams/cpu</code></a> &mdash; per-core load and temperature</li>
            <li><a href="/streams/ram"><code>/streams/ram</code></a> &mdash; active memory bytes</li>
            <li><a href="/streams/storage"><code>/streams/storage</code></a> &mdash; used bytes per physical drive</li>
            <li><a href="/streams/network"><code>/streams/network</code></a> &mdash; throughput, bytes per second</li>
            <li><a href="/streams/gpu"><code>/streams/gpu</code></a> &mdash; controller load and memory</li>
            <li><a href="/streams/speed_test"><code>/streams/speed_test</code></a> &mdash; periodic speed test results</li>
        </ul>
        <p>Service endpoints: <a href="/health"><code>/health</code></a> &middot; <a href="/config"><code>/config</code></a></p>
    </div>
</body>
</html>"#
    );

    Html(html)
}
