//! Data models for gateway smoke testing
//!
//! Chat-completion wire types and probe outcome types.

mod chat;
mod outcome;

pub use chat::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Choice, Role, Usage};
pub use outcome::{FailureKind, ProbeFailure, ProbeOutcome, ProbeStatus, RunSummary};
