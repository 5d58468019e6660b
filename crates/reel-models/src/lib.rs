//! Shared data models for the storyboard assembly pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Remote object locators and clip references
//! - Voiceover segments and their active windows
//! - Moods and the mood to music track lookup
//! - Long-running generation operations
//! - Assembly requests and published results

pub mod audio;
pub mod clip;
pub mod error;
pub mod job;
pub mod locator;
pub mod mood;
pub mod operation;

// Re-export common types
pub use audio::{
    any_window_contains, cadence_offset, validate_ordering, ActiveWindow, SceneAudioSegment,
};
pub use clip::ClipReference;
pub use error::{ModelError, ModelResult};
pub use job::{AssemblyRequest, CompositionJobId, Language, OutputMode, PublishedVideo, SceneInput};
pub use locator::{ObjectLocator, StoragePrefix, GCS_SCHEME};
pub use mood::{Mood, MoodTrackMap};
pub use operation::{LongRunningOperation, OperationError, OperationStatus};
