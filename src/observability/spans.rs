//! Structured span definitions for tracing.

use std::time::Instant;
use tracing::{Level, Span, field, span};

/// Span covering one tool call, from argument validation to the encoded
/// outcome.
pub struct ToolCallSpan {
    span: Span,
    start: Instant,
}

impl ToolCallSpan {
    pub fn new(tool: &str, request_id: &str) -> Self {
        let span = span!(
            Level::INFO,
            "tool.call",
            tool = tool,
            request_id = request_id,
            is_error = field::Empty,
            failure = field::Empty,
            duration_ms = field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn record_failure(&self, code: &str) {
        self.span.record("failure", code);
    }

    pub fn finish(self, is_error: bool) -> u64 {
        let duration_ms = self.start.elapsed().as_millis() as u64;
        self.span.record("is_error", is_error);
        self.span.record("duration_ms", duration_ms);
        duration_ms
    }
}

/// Span covering the lifetime of one client session.
pub fn session_span(session_id: &str, transport: &'static str) -> Span {
    span!(
        Level::INFO,
        "mcp.session",
        session_id = session_id,
        transport = transport,
    )
}
