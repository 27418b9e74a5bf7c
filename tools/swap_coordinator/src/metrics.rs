use std::time::Duration;

use tracing::info;

use crate::state::SwapState;

pub trait SwapMetrics: Send + Sync {
    fn record_transition(&self, swap_id: Option<&str>, from: &SwapState, to: &SwapState);
    fn record_latency(&self, stage: &'static str, elapsed: Duration);
}

#[derive(Default, Debug, Clone)]
pub struct NoopMetrics;

impl SwapMetrics for NoopMetrics {
    fn record_transition(&self, _swap_id: Option<&str>, _from: &SwapState, _to: &SwapState) {}
    fn record_latency(&self, _stage: &'static str, _elapsed: Duration) {}
}

/// Emits metrics as `tracing` events under the `swap_metrics` target.
#[derive(Default, Debug, Clone)]
pub struct TracingMetrics;

impl SwapMetrics for TracingMetrics {
    fn record_transition(&self, swap_id: Option<&str>, from: &SwapState, to: &SwapState) {
        info!(
            target: "swap_metrics",
            swap_id = swap_id.unwrap_or("-"),
            from = from.name(),
            to = to.name(),
            "transition"
        );
    }

    fn record_latency(&self, stage: &'static str, elapsed: Duration) {
        info!(
            target: "swap_metrics",
            stage,
            elapsed_ms = elapsed.as_millis() as u64,
            "latency"
        );
    }
}
