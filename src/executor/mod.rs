//! Probe execution engine
//!
//! Runs probes under a fixed concurrency cap.

mod parallel;

pub use parallel::ParallelExecutor;
