//! Diagnostics returned alongside inference results.
//!
//! [`InferenceReport`] summarises one mean-field run: problem size, the
//! lattices behind each pairwise model, the schedule that was executed and
//! a per-stage timing breakdown. Everything is `Serialize` so callers can
//! dump it as JSON next to their own outputs.

mod report;
mod timing;

pub use report::InferenceReport;
pub use timing::{StageTiming, TimingBreakdown};

pub(crate) use timing::elapsed_ms;
