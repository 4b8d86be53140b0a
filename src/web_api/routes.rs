//! API Routes

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};

use crate::codec;
use crate::error::Error;
use crate::models::{ToggleVisionResponse, TriggerReviewResponse};
use crate::realtime_hub::HubEvent;
use crate::review::TriggerOutcome;
use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(super::health_check))
        // Control
        .route("/api/trigger_review", post(trigger_review))
        .route("/api/toggle_vision", post(toggle_vision))
        // Stream
        .route("/api/ws", get(websocket_handler))
        .with_state(state)
}

// ========================================
// Control Handlers
// ========================================

/// Trigger an asynchronous clip review.
///
/// Always answers well-formed JSON, including when the buffer holds too
/// few frames.
async fn trigger_review(State(state): State<AppState>) -> impl IntoResponse {
    match state.review.trigger().await {
        Ok(TriggerOutcome::Accepted { clip_path }) => Json(TriggerReviewResponse {
            status: "Review Started".to_string(),
            clip: Some(clip_path.to_string_lossy().into_owned()),
        })
        .into_response(),
        Ok(TriggerOutcome::BufferEmpty { buffered }) => {
            tracing::info!(buffered, "Review refused, not enough frames");
            Json(TriggerReviewResponse {
                status: "Buffer Empty".to_string(),
                clip: None,
            })
            .into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Flip the vision toggle for the stream session
async fn toggle_vision(State(state): State<AppState>) -> impl IntoResponse {
    let enabled = state.session.toggle_vision();
    tracing::info!(enabled, "Vision toggled");
    Json(ToggleVisionResponse {
        status: if enabled { "ON" } else { "OFF" }.to_string(),
        enabled,
    })
}

// ========================================
// WebSocket Handler
// ========================================

/// WebSocket upgrade handler
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle one stream connection: ingest frames from the client, forward
/// hub events back out
async fn handle_websocket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let (sub_id, mut rx) = state.realtime.register().await;

    // Forward hub events to this viewer
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // Ingest frames from this connection
    let recv_state = state.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    if let Some(payload) = codec::strip_data_uri(&text) {
                        ingest_frame(&recv_state, payload).await;
                    }
                }
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    tracing::warn!(subscriber_id = %sub_id, error = %e, "WebSocket error");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {}
        _ = recv_task => {}
    }

    state.realtime.unregister(&sub_id).await;
}

/// Run one frame through the pipeline and fan the result out.
///
/// A malformed frame is dropped and logged; everything else keeps flowing.
async fn ingest_frame(state: &AppState, payload: &str) {
    let timestamp_ms = state.session.elapsed_ms();

    match state.pipeline.ingest(payload, timestamp_ms).await {
        Ok(output) => {
            state
                .realtime
                .broadcast(HubEvent::VideoFrame(output.jpeg_base64))
                .await;

            if let Some(score) = output.score {
                state.realtime.broadcast(HubEvent::ScoreUpdate(score)).await;
            }

            if output.event_detected && timestamp_ms % 10 == 0 {
                state
                    .realtime
                    .broadcast(HubEvent::ScoreUpdate("ACTION DETECTED".to_string()))
                    .await;
            }
        }
        Err(Error::Decode(msg)) => {
            tracing::warn!(timestamp_ms, error = %msg, "Dropped malformed frame");
        }
        Err(e) => {
            tracing::error!(timestamp_ms, error = %e, "Frame processing failed");
        }
    }
}
