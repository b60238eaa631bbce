//! A live client session of the event-stream transport.

use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::ids::SessionId;
use super::pipeline::{FrameStatus, SessionPipeline};
use super::{SessionError, SessionResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl SessionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::Open => 1,
            Self::Closing => 2,
            Self::Closed => 3,
        }
    }
}

pub struct Session {
    id: SessionId,
    created_at: DateTime<Utc>,
    state: AtomicU8,
    last_activity_ms: AtomicI64,
    shutdown: CancellationToken,
    pipeline: SessionPipeline,
}

impl Session {
    pub(crate) fn new(id: SessionId, pipeline: SessionPipeline) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            state: AtomicU8::new(SessionState::Connecting.as_u8()),
            last_activity_ms: AtomicI64::new(now.timestamp_millis()),
            shutdown: CancellationToken::new(),
            pipeline,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Connecting → Open. No effect in any other state.
    pub fn open(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Connecting.as_u8(),
                SessionState::Open.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Moves to Closing and signals the stream to drain. Returns `false` if
    /// the session was already closing or closed.
    pub(crate) fn begin_close(&self) -> bool {
        let previous = self
            .state
            .fetch_max(SessionState::Closing.as_u8(), Ordering::SeqCst);
        self.shutdown.cancel();
        previous < SessionState::Closing.as_u8()
    }

    pub(crate) fn mark_closed(&self) {
        self.state
            .store(SessionState::Closed.as_u8(), Ordering::SeqCst);
        self.shutdown.cancel();
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_activity_ms.load(Ordering::SeqCst))
            .unwrap_or(self.created_at)
    }

    pub fn touch(&self) {
        self.last_activity_ms
            .store(Utc::now().timestamp_millis(), Ordering::SeqCst);
    }

    pub fn idle_for(&self) -> Duration {
        (Utc::now() - self.last_activity())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Token cancelled when the session starts closing.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn pipeline(&self) -> &SessionPipeline {
        &self.pipeline
    }

    pub fn in_flight(&self) -> usize {
        self.pipeline.in_flight()
    }

    /// Submits an inbound frame. Only open sessions accept frames.
    pub async fn submit(&self, frame: &[u8]) -> SessionResult<FrameStatus> {
        if !self.is_open() {
            return Err(SessionError::Closed {
                id: self.id.to_string(),
            });
        }
        self.touch();
        Ok(self.pipeline.submit(frame).await)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("state", &self.state())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
