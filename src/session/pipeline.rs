//! Per-session request pipeline.
//!
//! Requests of one session run concurrently (bounded by a semaphore) while
//! their responses are released in arrival order by a sequencer task.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use futures::FutureExt;
use tokio::sync::{Semaphore, mpsc};
use tracing::Instrument;

use super::OutboundMessage;
use super::sequencer::ResponseSequencer;
use crate::protocol::{Inbound, JsonRpcResponse, MalformedFrame, McpService, decode};

pub const DEFAULT_MAX_IN_FLIGHT: usize = 32;
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineLimits {
    pub max_in_flight: usize,
    pub outbound_capacity: usize,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}

impl PipelineLimits {
    pub fn max_in_flight(mut self, n: usize) -> Self {
        self.max_in_flight = n.max(1);
        self
    }
}

/// What happened to a submitted frame.
#[derive(Debug, PartialEq)]
pub enum FrameStatus {
    /// Accepted; any response arrives on the outbound queue.
    Accepted,
    /// Unusable and carrying no request id, so no response can be addressed.
    Rejected(MalformedFrame),
}

/// A sequence slot and its response. `None` marks a slot abandoned before
/// its request ran.
type Completion = (u64, Option<JsonRpcResponse>);

/// A reserved position in the response order.
///
/// Dropping an unfilled slot releases it so later responses are not held
/// back behind it.
struct Slot {
    seq: u64,
    completions: mpsc::UnboundedSender<Completion>,
    filled: bool,
}

impl Slot {
    fn fill(mut self, response: JsonRpcResponse) {
        self.filled = true;
        let _ = self.completions.send((self.seq, Some(response)));
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if !self.filled {
            let _ = self.completions.send((self.seq, None));
        }
    }
}

pub struct SessionPipeline {
    service: Arc<McpService>,
    permits: Arc<Semaphore>,
    next_seq: AtomicU64,
    in_flight: Arc<AtomicUsize>,
    completions: mpsc::UnboundedSender<Completion>,
    outbound: mpsc::Sender<OutboundMessage>,
    label: String,
}

impl SessionPipeline {
    /// Creates the pipeline and spawns its sequencer task. The returned
    /// receiver closes once the pipeline is dropped and every in-flight call
    /// has completed.
    pub fn new(
        service: Arc<McpService>,
        limits: PipelineLimits,
        label: impl Into<String>,
    ) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let label = label.into();
        let (completions, completion_rx) = mpsc::unbounded_channel();
        let (outbound, outbound_rx) = mpsc::channel(limits.outbound_capacity.max(1));

        tokio::spawn(
            run_sequencer(completion_rx, outbound.clone())
                .instrument(tracing::debug_span!("sequencer", session_id = %label)),
        );

        let pipeline = Self {
            service,
            permits: Arc::new(Semaphore::new(limits.max_in_flight.max(1))),
            next_seq: AtomicU64::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
            completions,
            outbound,
            label,
        };
        (pipeline, outbound_rx)
    }

    /// Takes the next position in the response order. Must happen before any
    /// await so positions follow arrival order.
    fn reserve(&self) -> Slot {
        Slot {
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            completions: self.completions.clone(),
            filled: false,
        }
    }

    /// Decodes `frame` and schedules it.
    ///
    /// Waits while the session already has `max_in_flight` calls running.
    pub async fn submit(&self, frame: &[u8]) -> FrameStatus {
        match decode(frame) {
            Ok(Inbound::Request(request)) => {
                let slot = self.reserve();
                let Ok(permit) = self.permits.clone().acquire_owned().await else {
                    tracing::error!(session_id = %self.label, request_id = %request.id, "Pipeline closed; answering with an internal error");
                    slot.fill(JsonRpcResponse::internal_error(request.id));
                    return FrameStatus::Accepted;
                };
                let service = Arc::clone(&self.service);
                let in_flight = Arc::clone(&self.in_flight);
                in_flight.fetch_add(1, Ordering::SeqCst);

                tokio::spawn(async move {
                    let id = request.id.clone();
                    let response = AssertUnwindSafe(service.handle_request(request))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            tracing::error!(request_id = %id, "Request handler panicked");
                            JsonRpcResponse::internal_error(id)
                        });
                    drop(permit);
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    slot.fill(response);
                });
                FrameStatus::Accepted
            }
            Ok(Inbound::Notification(notification)) => {
                self.service.handle_notification(&notification);
                FrameStatus::Accepted
            }
            Ok(inbound @ Inbound::Response(_)) => {
                let _ = self.service.handle(inbound).await;
                FrameStatus::Accepted
            }
            Err(malformed) if malformed.id.is_some() => {
                tracing::debug!(session_id = %self.label, reason = %malformed.reason, "Malformed request");
                self.reserve().fill(malformed.to_response());
                FrameStatus::Accepted
            }
            Err(malformed) => {
                tracing::warn!(session_id = %self.label, reason = %malformed.reason, "Dropping malformed frame");
                FrameStatus::Rejected(malformed)
            }
        }
    }

    /// Queues a message ahead of any pending responses. Fails when the
    /// queue is full or the receiver is gone.
    pub fn push(&self, message: OutboundMessage) -> bool {
        self.outbound.try_send(message).is_ok()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

async fn run_sequencer(
    mut completions: mpsc::UnboundedReceiver<Completion>,
    outbound: mpsc::Sender<OutboundMessage>,
) {
    let mut sequencer = ResponseSequencer::new();
    let mut discarded = 0usize;

    while let Some((seq, response)) = completions.recv().await {
        if response.is_none() {
            tracing::debug!(seq, "Request abandoned before it ran");
        }
        for ready in sequencer.complete(seq, response).into_iter().flatten() {
            if outbound.is_closed() || outbound.send(OutboundMessage::Response(ready)).await.is_err() {
                discarded += 1;
            }
        }
    }

    if discarded > 0 {
        tracing::debug!(discarded, "Discarded responses for a closed session");
    }
}
