//! Fire-and-forget observability sink.
//!
//! The dispatcher emits one structured event per completed call. Sinks must
//! never block or fail the request path; anything heavier than a channel
//! push belongs behind the sink, not in it.

use gempool_types::models::OrchestratorEvent;

/// Receiver of per-dispatch structured events.
pub trait EventSink: Send + Sync {
    /// Consume one event. Must not block.
    fn emit(&self, event: OrchestratorEvent);
}

/// Default sink: one structured tracing line per dispatch.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: OrchestratorEvent) {
        tracing::info!(
            account_id = %event.account_id,
            proxy = event.proxy.as_deref().unwrap_or("direct"),
            outcome = %event.outcome,
            latency_ms = event.latency_ms,
            "dispatch completed"
        );
    }
}

/// Channel-backed sink, used by tests to assert on emitted events.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: tokio::sync::mpsc::UnboundedSender<OrchestratorEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its channel.
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<OrchestratorEvent>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: OrchestratorEvent) {
        // Receiver may be gone (test finished); events are best-effort.
        let _ = self.tx.send(event);
    }
}
