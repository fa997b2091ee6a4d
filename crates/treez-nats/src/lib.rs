#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for client setup and bucket opening.
pub const TRACING_TARGET_CLIENT: &str = "treez_nats::client";

/// Tracing target for reads and writes on a bucket.
pub const TRACING_TARGET_KV: &str = "treez_nats::kv";

/// Tracing target for connect, disconnect and reconnect events.
pub const TRACING_TARGET_CONNECTION: &str = "treez_nats::connection";

mod client;
mod error;
pub mod kv;

pub use client::{NatsClient, NatsConfig};
pub use error::{BoxError, Error, Result};
