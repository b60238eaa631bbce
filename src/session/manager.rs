//! Session table for the event-stream transport.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::ids::SessionId;
use super::pipeline::{PipelineLimits, SessionPipeline};
use super::state::Session;
use super::{OutboundMessage, SessionError, SessionResult};
use crate::protocol::McpService;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_REAPER_INTERVAL: Duration = Duration::from_secs(30);

/// Owns every live session. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    sessions: DashMap<SessionId, Arc<Session>>,
    service: Arc<McpService>,
    limits: PipelineLimits,
    idle_timeout: Duration,
}

impl ConnectionManager {
    pub fn new(service: Arc<McpService>) -> Self {
        Self::with_limits(service, PipelineLimits::default(), DEFAULT_IDLE_TIMEOUT)
    }

    pub fn with_limits(
        service: Arc<McpService>,
        limits: PipelineLimits,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions: DashMap::new(),
                service,
                limits,
                idle_timeout,
            }),
        }
    }

    /// Allocates a session in the Connecting state.
    pub fn create(&self) -> (Arc<Session>, mpsc::Receiver<OutboundMessage>) {
        loop {
            let id = SessionId::new();
            if let Entry::Vacant(slot) = self.inner.sessions.entry(id) {
                let (pipeline, outbound) = SessionPipeline::new(
                    Arc::clone(&self.inner.service),
                    self.inner.limits,
                    id.to_string(),
                );
                let session = Arc::new(Session::new(id, pipeline));
                slot.insert(Arc::clone(&session));
                tracing::info!(session_id = %id, "Session created");
                return (session, outbound);
            }
        }
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.inner
            .sessions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Looks up an open session.
    pub fn open_session(&self, id: &SessionId) -> SessionResult<Arc<Session>> {
        let session = self.get(id).ok_or_else(|| SessionError::NotFound {
            id: id.to_string(),
        })?;
        if !session.is_open() {
            return Err(SessionError::Closed { id: id.to_string() });
        }
        Ok(session)
    }

    /// Removes and closes a session. Returns `false` if it was not present.
    pub fn destroy(&self, id: &SessionId) -> bool {
        let Some((_, session)) = self.inner.sessions.remove(id) else {
            return false;
        };
        session.begin_close();
        session.mark_closed();
        tracing::info!(
            session_id = %id,
            in_flight = session.in_flight(),
            lifetime_secs = (chrono::Utc::now() - session.created_at()).num_seconds(),
            "Session closed"
        );
        true
    }

    /// Closes every session idle for longer than the idle timeout.
    pub fn sweep_idle(&self) -> usize {
        let idle: Vec<SessionId> = self
            .inner
            .sessions
            .iter()
            .filter(|entry| {
                let session = entry.value();
                session.in_flight() == 0 && session.idle_for() > self.inner.idle_timeout
            })
            .map(|entry| *entry.key())
            .collect();

        idle.iter()
            .filter(|id| {
                tracing::debug!(session_id = %id, "Reaping idle session");
                self.destroy(id)
            })
            .count()
    }

    /// Runs [`Self::sweep_idle`] every `interval` until `shutdown` fires.
    pub fn spawn_reaper(&self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let reaped = manager.sweep_idle();
                        if reaped > 0 {
                            tracing::info!(reaped, remaining = manager.len(), "Reaped idle sessions");
                        }
                    }
                }
            }
        })
    }

    /// Closes every session. Used on shutdown.
    pub fn close_all(&self) -> usize {
        let ids: Vec<SessionId> = self.inner.sessions.iter().map(|e| *e.key()).collect();
        ids.iter().filter(|id| self.destroy(id)).count()
    }

    pub fn len(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }

    pub fn idle_timeout(&self) -> Duration {
        self.inner.idle_timeout
    }
}
