use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::schedule::{MessageStatus, ScheduledMessage, ScheduledMessageStore};
use crate::voice::VoiceManager;

#[derive(Clone)]
struct StatusState {
    store: Arc<ScheduledMessageStore>,
    voice: Arc<VoiceManager>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
struct ScheduleCounts {
    pending: usize,
    sent: usize,
    failed: usize,
}

#[derive(Serialize)]
struct StatsResponse {
    scheduled: ScheduleCounts,
    voice_sessions: usize,
}

/// Serve the health/statistics routes until the process exits
pub async fn serve(
    addr: &str,
    store: Arc<ScheduledMessageStore>,
    voice: Arc<VoiceManager>,
) -> std::io::Result<()> {
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/stats", get(stats))
        .with_state(StatusState { store, voice });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Status service listening on {}", addr);
    axum::serve(listener, app).await
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn stats(State(state): State<StatusState>) -> Result<Json<StatsResponse>, StatusCode> {
    let messages = state.store.all().await.map_err(|e| {
        error!("Failed to read the scheduled-message store for /stats: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(StatsResponse {
        scheduled: summarize(&messages),
        voice_sessions: state.voice.session_count(),
    }))
}

fn summarize(messages: &[ScheduledMessage]) -> ScheduleCounts {
    let mut counts = ScheduleCounts::default();
    for message in messages {
        match message.status {
            MessageStatus::Pending => counts.pending += 1,
            MessageStatus::Sent => counts.sent += 1,
            MessageStatus::Failed => counts.failed += 1,
        }
    }
    counts
}
