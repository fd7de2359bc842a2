//! Request probes
//!
//! A probe is one independent unit of work submitted to the runner. Every
//! probe resolves to a [`ProbeOutcome`]; errors never escape it.

mod chat;

pub use chat::{ChatProbe, Echo};

use async_trait::async_trait;

use crate::models::ProbeOutcome;

/// One connectivity check against the gateway
#[async_trait]
pub trait Probe: Send + Sync {
    /// Run the probe with its 1-based submission index
    async fn run(&self, index: usize) -> ProbeOutcome;
}
