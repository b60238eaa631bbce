//! Local pipe binding: newline-delimited JSON-RPC over a reader/writer pair.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::Instrument;

use super::{DEFAULT_FLUSH_DEADLINE, TransportResult};
use crate::observability::session_span;
use crate::protocol::McpService;
use crate::session::{FrameStatus, OutboundMessage, PipelineLimits, SessionId, SessionPipeline};

#[derive(Clone, Copy, Debug)]
pub struct StdioOptions {
    pub limits: PipelineLimits,
    pub flush_deadline: Duration,
}

impl Default for StdioOptions {
    fn default() -> Self {
        Self {
            limits: PipelineLimits::default(),
            flush_deadline: DEFAULT_FLUSH_DEADLINE,
        }
    }
}

/// Serves process stdin/stdout until stdin reaches EOF.
pub async fn serve_stdio(service: Arc<McpService>, options: StdioOptions) -> TransportResult<()> {
    serve(tokio::io::stdin(), tokio::io::stdout(), service, options).await
}

/// Serves one implicit session over `reader`/`writer`.
///
/// Returns after EOF once pending responses are written or the flush deadline
/// elapses.
pub async fn serve<R, W>(
    reader: R,
    writer: W,
    service: Arc<McpService>,
    options: StdioOptions,
) -> TransportResult<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let span = session_span(&SessionId::new().to_string(), "stdio");
    serve_session(reader, writer, service, options)
        .instrument(span)
        .await
}

async fn serve_session<R, W>(
    reader: R,
    writer: W,
    service: Arc<McpService>,
    options: StdioOptions,
) -> TransportResult<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (pipeline, outbound) = SessionPipeline::new(service, options.limits, "stdio");
    let mut writer_task = tokio::spawn(write_responses(outbound, writer).in_current_span());

    let mut lines = BufReader::new(reader).lines();
    let mut frames = 0u64;
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            // Writer gone (broken pipe): nothing more can be answered.
            result = &mut writer_task => {
                return match result {
                    Ok(outcome) => outcome,
                    Err(e) => Err(std::io::Error::other(e).into()),
                };
            }
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        frames += 1;
        if let FrameStatus::Rejected(malformed) = pipeline.submit(line.as_bytes()).await {
            tracing::warn!(line = frames, reason = %malformed.reason, "Ignoring unreadable frame");
        }
    }

    tracing::info!(frames, in_flight = pipeline.in_flight(), "Input closed; flushing responses");
    drop(pipeline);

    match tokio::time::timeout(options.flush_deadline, &mut writer_task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => Err(std::io::Error::other(e).into()),
        Err(_) => {
            tracing::warn!(
                deadline_secs = options.flush_deadline.as_secs_f64(),
                "Flush deadline elapsed; abandoning pending responses"
            );
            writer_task.abort();
            Ok(())
        }
    }
}

async fn write_responses<W>(
    mut outbound: mpsc::Receiver<OutboundMessage>,
    mut writer: W,
) -> TransportResult<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outbound.recv().await {
        let OutboundMessage::Response(response) = message else {
            continue;
        };
        let mut line = serde_json::to_vec(&response).map_err(std::io::Error::other)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    writer.shutdown().await?;
    Ok(())
}
