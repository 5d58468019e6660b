//! Remote generation for storyboard assembly.
//!
//! This crate provides:
//! - The [`GenerationClient`] seam and its Vertex AI implementation
//! - A backoff retrier for transient remote failures
//! - A fixed-cadence poller for long-running video jobs
//! - Token sources for Google APIs

pub mod auth;
pub mod client;
pub mod error;
pub mod metrics;
pub mod poller;
pub mod retry;
pub mod vertex;

pub use auth::{AccessTokenSource, GcpTokenSource, StaticToken};
pub use client::{GenerationClient, OperationSource, SpeechRequest, VideoRequest};
pub use error::{GenAiError, GenAiResult};
pub use poller::{JobPoller, PollerConfig};
pub use retry::{retry_with_backoff, RetryConfig, Retryable};
pub use vertex::{VertexClient, VertexConfig};
