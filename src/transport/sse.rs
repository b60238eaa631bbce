//! Event-stream binding: `GET /sse` opens a session, `POST /messages`
//! submits frames to it.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::Stream;
use futures::stream;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

use super::{AppState, HttpError};
use crate::observability::session_span;
use crate::session::{ConnectionManager, FrameStatus, OutboundMessage, SessionError, SessionId};

pub const MESSAGES_PATH: &str = "/messages";

/// Destroys the session when the stream is dropped (client disconnect).
struct SessionGuard {
    sessions: ConnectionManager,
    id: SessionId,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.sessions.destroy(&self.id) {
            tracing::debug!(session_id = %self.id, "Event stream dropped");
        }
    }
}

struct StreamState {
    outbound: mpsc::Receiver<OutboundMessage>,
    shutdown: CancellationToken,
    flush_deadline: Duration,
    drain_until: Option<Instant>,
    guard: SessionGuard,
    span: Span,
}

pub async fn connect(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (session, outbound) = state.sessions.create();
    let id = session.id();

    let endpoint = format!("{}?session_id={}", MESSAGES_PATH, id);
    if !session.pipeline().push(OutboundMessage::Endpoint(endpoint)) {
        tracing::warn!(session_id = %id, "Could not queue endpoint event");
    }
    session.open();

    let stream_state = StreamState {
        outbound,
        shutdown: session.shutdown_token(),
        flush_deadline: state.flush_deadline,
        drain_until: None,
        guard: SessionGuard {
            sessions: state.sessions.clone(),
            id,
        },
        span: session_span(&id.to_string(), "sse"),
    };
    // The stream must not keep the session alive: dropping the session's
    // pipeline is what ends the outbound queue.
    drop(session);

    Sse::new(outbound_stream(stream_state)).keep_alive(KeepAlive::new().interval(state.keep_alive))
}

fn outbound_stream(state: StreamState) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(state, |mut state| {
        let span = state.span.clone();
        async move {
            loop {
                let next = match state.drain_until {
                    Some(deadline) => {
                        match tokio::time::timeout_at(deadline, state.outbound.recv()).await {
                            Ok(message) => message,
                            Err(_) => {
                                tracing::warn!("Flush deadline elapsed; dropping queued output");
                                None
                            }
                        }
                    }
                    None => tokio::select! {
                        message = state.outbound.recv() => message,
                        _ = state.shutdown.cancelled() => {
                            state.drain_until = Some(Instant::now() + state.flush_deadline);
                            continue;
                        }
                    },
                };
                return next.map(|message| (Ok(to_event(message)), state));
            }
        }
        .instrument(span)
    })
}

fn to_event(message: OutboundMessage) -> Event {
    match message {
        OutboundMessage::Endpoint(url) => Event::default().event("endpoint").data(url),
        OutboundMessage::Response(response) => {
            let data = serde_json::to_string(&response).unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to encode response");
                String::from(r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#)
            });
            Event::default().event("message").data(data)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    session_id: Option<String>,
}

pub async fn post_message(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
    body: Bytes,
) -> Response {
    match submit(&state, query, &body).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn submit(state: &AppState, query: MessagesQuery, body: &[u8]) -> Result<(), HttpError> {
    let raw = query
        .session_id
        .ok_or_else(|| HttpError::bad_request("missing_session_id", "session_id is required"))?;
    let id = SessionId::parse(&raw).ok_or_else(|| {
        let err = SessionError::InvalidId { value: raw.clone() };
        HttpError::bad_request("invalid_session_id", err.to_string())
    })?;

    let session = state
        .sessions
        .open_session(&id)
        .map_err(|e| HttpError::not_found("session_not_found", e.to_string()))?;

    match session
        .submit(body)
        .instrument(session_span(&id.to_string(), "sse"))
        .await
    {
        Ok(FrameStatus::Accepted) => Ok(()),
        Ok(FrameStatus::Rejected(malformed)) => Err(HttpError::Malformed(malformed.to_response())),
        Err(e) => Err(HttpError::not_found("session_not_found", e.to_string())),
    }
}
