//! Server-Sent Events endpoint relaying metric streams to clients.
//!
//! `GET /streams/{metric}` subscribes to the named replay stream: the
//! client first receives the buffered backlog, then live samples. A
//! terminally failed stream delivers one `error` event and ends. A
//! disabled metric's stream stays open and silent.

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use serde::Serialize;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, instrument};

use crate::replay::Subscription;
use crate::state::SharedState;

/// Handler for the `/streams/{metric}` endpoint.
#[instrument(skip(state))]
pub async fn stream_handler(
    Path(metric): Path<String>,
    State(state): State<SharedState>,
) -> Response {
    debug!("subscribing client to [{}]", metric);

    match metric.as_str() {
        "cpu" => sse_response(state.streams.cpu.subscribe()),
        "ram" => sse_response(state.streams.ram.subscribe()),
        "storage" => sse_response(state.streams.storage.subscribe()),
        "network" => sse_response(state.streams.network.subscribe()),
        "gpu" => sse_response(state.streams.gpu.subscribe()),
        "speed_test" => sse_response(state.streams.speed_test.subscribe()),
        _ => (StatusCode::NOT_FOUND, format!("unknown metric: {metric}\n")).into_response(),
    }
}

fn sse_response<T>(subscription: Subscription<T>) -> Response
where
    T: Serialize + Send + 'static,
{
    Sse::new(event_stream(subscription))
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn event_stream<T>(
    subscription: Subscription<T>,
) -> impl Stream<Item = Result<Event, Infallible>>
where
    T: Serialize + Send + 'static,
{
    subscription.map(|item| {
        let event = match item {
            Ok(sample) => Event::default()
                .json_data(&sample)
                .unwrap_or_else(|e| Event::default().event("error").data(e.to_string())),
            Err(err) => Event::default().event("error").data(err.to_string()),
        };
        Ok(event)
    })
}
