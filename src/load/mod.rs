//! The Load Orchestrator: a fixed pool of virtual workers claiming
//! scenario units off a shared counter under a ramp-up schedule,
//! producing per-call result rows, live progress, and billable-only
//! throughput statistics.
mod collector;
mod orchestrator;
mod stats;
mod types;
mod worker;

#[cfg(test)]
mod tests;

pub use orchestrator::{LoadOrchestrator, LoadTestConfig};
pub use stats::{compute_summary, percentile};
pub use types::{CallDisposition, LoadResult, LoadSummary};
