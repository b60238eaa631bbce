//! Client sessions: identifiers, the per-session request pipeline and the
//! session table.

mod ids;
pub mod manager;
pub mod pipeline;
pub mod sequencer;
mod state;

pub use ids::SessionId;
pub use manager::{ConnectionManager, DEFAULT_IDLE_TIMEOUT, DEFAULT_REAPER_INTERVAL};
pub use pipeline::{FrameStatus, PipelineLimits, SessionPipeline};
pub use sequencer::ResponseSequencer;
pub use state::{Session, SessionState};

use thiserror::Error;

use crate::protocol::JsonRpcResponse;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found: {id}")]
    NotFound { id: String },

    #[error("Session closed: {id}")]
    Closed { id: String },

    #[error("Invalid session id: {value}")]
    InvalidId { value: String },
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Items delivered to the client over a session's outbound channel.
#[derive(Clone, Debug, PartialEq)]
pub enum OutboundMessage {
    /// The `endpoint` handshake event of the SSE transport.
    Endpoint(String),
    Response(JsonRpcResponse),
}
