//! HTTP client module for gateway probing

mod client;

pub use client::{GatewayClient, GatewayError};
