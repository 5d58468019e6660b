//! Object storage for the assembly pipeline.
//!
//! This crate provides:
//! - The `ObjectStore` trait (upload, download, signed URLs)
//! - An S3-compatible implementation (GCS interoperability, R2, S3)
//! - A filesystem implementation for local runs and tests

pub mod error;
pub mod local;
pub mod s3;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use local::LocalObjectStore;
pub use s3::{S3ObjectStore, S3StoreConfig};
pub use store::{content_type_for, ObjectStore};
