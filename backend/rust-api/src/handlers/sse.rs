use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use chrono::Utc;
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::{
    metrics::SSE_CONNECTIONS_ACTIVE,
    models::{
        timer::{SessionComplete, TimerEvent, TimerTick},
        ActiveSession, SessionPhase, QUESTION_SECONDS,
    },
    services::AppState,
};

/// SSE endpoint mirroring the per-question countdown.
/// GET /api/v1/sessions/{id}/stream
pub async fn session_stream(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = state
        .sessions
        .get(&session_id)
        .ok_or((StatusCode::NOT_FOUND, "Session not found".to_string()))?;

    tracing::info!("Client connected to SSE stream: session={}", session_id);
    let stream = create_timer_stream(session_id, session, max_stream_duration_seconds());

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn max_stream_duration_seconds() -> u32 {
    std::env::var("SSE_MAX_STREAM_SECONDS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(3600)
}

/// Tracks open streams even when the client just goes away: dropping the
/// stream drops the guard.
struct ConnectionGuard;

impl ConnectionGuard {
    fn new() -> Self {
        SSE_CONNECTIONS_ACTIVE.inc();
        Self
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        SSE_CONNECTIONS_ACTIVE.dec();
    }
}

/// One event per second: ticks while the session runs, a single
/// `session-complete` once it reaches a terminal phase.
fn create_timer_stream(
    session_id: String,
    session: Arc<Mutex<ActiveSession>>,
    max_seconds: u32,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let guard = ConnectionGuard::new();
    stream::unfold(
        (session_id, session, guard, 0u32, false),
        move |(sid, session, guard, elapsed, final_sent)| async move {
            if final_sent || elapsed > max_seconds {
                return None;
            }

            let timer_event = {
                let state = session.lock().unwrap();
                match &state.phase {
                    SessionPhase::Quiz {
                        current,
                        remaining_seconds,
                    } => tick(&sid, *current, *remaining_seconds),
                    // paused states keep reporting a full countdown
                    SessionPhase::Instructions | SessionPhase::AwaitingPassword => {
                        tick(&sid, 0, QUESTION_SECONDS)
                    }
                    SessionPhase::Submitting { resume } => tick(&sid, *resume, QUESTION_SECONDS),
                    other => TimerEvent::SessionComplete(SessionComplete {
                        session_id: sid.clone(),
                        phase: other.name().to_string(),
                        timestamp: Utc::now(),
                    }),
                }
            };

            let is_final = matches!(timer_event, TimerEvent::SessionComplete(_));
            let event = Event::default()
                .event(timer_event.event_name())
                .data(timer_event.to_sse_data());

            if is_final {
                tracing::info!("Session stream complete: session={}", sid);
                return Some((Ok(event), (sid, session, guard, elapsed, true)));
            }

            sleep(Duration::from_secs(1)).await;
            Some((Ok(event), (sid, session, guard, elapsed + 1, false)))
        },
    )
}

fn tick(session_id: &str, question_index: usize, remaining_seconds: u32) -> TimerEvent {
    TimerEvent::TimerTick(TimerTick {
        session_id: session_id.to_string(),
        question_index,
        remaining_seconds,
        total_seconds: QUESTION_SECONDS,
        timestamp: Utc::now(),
    })
}
