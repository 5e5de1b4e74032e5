use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::agent::SearchService;
use crate::chat::turn::{stream_turn, TurnInput};
use crate::errors::AppError;
use crate::models::record::SearchRecord;
use crate::state::AppState;
use crate::streaming::SseSink;

/// Header carrying the (possibly newly minted) session id back to the client.
pub const SESSION_HEADER: &str = "x-session-id";
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub message: String,
}

fn bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Unauthorized("Authentication token is required".to_string()))
}

/// POST /api/v1/chat/candidates
pub async fn handle_candidate_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = payload?;
    stream_reply(&state, &state.candidates, &headers, req)
}

/// POST /api/v1/chat/jobs
pub async fn handle_job_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = payload?;
    stream_reply(&state, &state.jobs, &headers, req)
}

/// Validates, opens the SSE response at once and runs the turn in a producer
/// task that writes events as they become known.
fn stream_reply<R: SearchRecord>(
    state: &AppState,
    service: &SearchService<R>,
    headers: &HeaderMap,
    req: ChatRequest,
) -> Result<Response, AppError> {
    let token = bearer_token(headers)?;
    let session_id = req.session_id.unwrap_or_else(Uuid::new_v4);
    TurnInput {
        session_id,
        message: &req.message,
        token: &token,
    }
    .validate()?;

    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(EVENT_BUFFER);
    let service = service.clone();
    let log = Arc::clone(&state.message_log);
    let word_delay = state.config.stream_word_delay;
    let message = req.message;
    tokio::spawn(async move {
        let mut sink = SseSink::new(tx);
        let input = TurnInput {
            session_id,
            message: &message,
            token: &token,
        };
        let delivery = stream_turn(&service, log.as_ref(), input, &mut sink, word_delay).await;
        debug!(
            "Session {session_id}: streamed {} events (complete: {})",
            delivery.events_sent, delivery.completed
        );
    });

    let events = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (event, rx))
    });
    let mut response = Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response();
    let session_header = HeaderValue::from_str(&session_id.to_string())
        .map_err(|e| AppError::Internal(e.into()))?;
    response.headers_mut().insert(SESSION_HEADER, session_header);
    Ok(response)
}

/// DELETE /api/v1/chat/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state.message_log.delete_session(session_id).await?;
    let candidates_evicted = state.candidates.evict(session_id).await;
    let jobs_evicted = state.jobs.evict(session_id).await;

    if !(deleted || candidates_evicted || jobs_evicted) {
        return Err(AppError::NotFound(format!("Session {session_id} not found")));
    }
    info!("Deleted chat session {session_id}");
    Ok(StatusCode::NO_CONTENT)
}
