//! Streaming chat endpoint

use crate::services::{MetricsService, TokenStream};
use crate::state::AppState;
use crate::types::{ChatError, ChatRequest, StreamEvent};
use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

/// `POST /api/chat`: stream the reply as `snapshot` events and one `complete` event.
pub async fn stream_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ChatError> {
    let request_id = Uuid::now_v7();
    tracing::info!(%request_id, history_turns = req.history.len(), "Received chat message");

    let config = match &req.generation {
        Some(overrides) => overrides.apply(state.chat.defaults()),
        None => state.chat.defaults().clone(),
    };
    let stream = state
        .chat
        .stream_response_with(&req.message, &req.history, config)?;

    let events = forward_snapshots(stream, state.metrics.clone(), request_id);
    let sse_stream = UnboundedReceiverStream::new(events).map(|event| {
        Ok(Event::default()
            .event(event.event_type())
            .data(event.to_sse_data()))
    });

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}

/// Drain `stream` on the blocking pool and forward it as SSE events.
///
/// When the receiving side goes away the stream is dropped, which cancels
/// the generation worker.
fn forward_snapshots(
    mut stream: TokenStream,
    metrics: Arc<MetricsService>,
    request_id: Uuid,
) -> UnboundedReceiver<StreamEvent> {
    let (tx, rx) = unbounded_channel();

    tokio::task::spawn_blocking(move || {
        let start = Instant::now();
        let mut snapshots = 0usize;

        for text in stream.by_ref() {
            snapshots += 1;
            if tx.send(StreamEvent::snapshot(text)).is_err() {
                tracing::info!(%request_id, "Client disconnected, cancelling generation");
                break;
            }
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        metrics.record_tokens(stream.token_ids().len());
        metrics.record_request(elapsed_ms, stream.termination());

        match stream.termination() {
            Some(termination) => {
                tracing::info!(
                    %request_id,
                    snapshots,
                    elapsed_ms,
                    outcome = ?termination,
                    "✅ Chat response finished"
                );
                let _ = tx.send(StreamEvent::complete(termination.clone()));
            }
            None => tracing::debug!(%request_id, "Response abandoned after {} snapshots", snapshots),
        }
    });

    rx
}
