//! Storyboard video assembly worker.
//!
//! This crate provides:
//! - Per-scene clip generation with placeholder fallback
//! - Concurrent clip fetching with scene order restored
//! - Voiceover synthesis on a fixed cadence
//! - Composition jobs that own and clean up their scratch space
//! - Publishing to signed URLs or a local output directory
//! - The pipeline orchestrator tying the stages together

pub mod clip_fetcher;
pub mod composition_job;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod publish;
pub mod scene_generation;
pub mod voiceover;

pub use clip_fetcher::ClipFetcher;
pub use composition_job::CompositionJob;
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use logging::JobLogger;
pub use orchestrator::PipelineOrchestrator;
pub use publish::Publisher;
pub use scene_generation::{ClipSource, SceneClip, SceneGenerator};
pub use voiceover::VoiceoverSynthesizer;
