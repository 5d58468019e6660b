//! Long-running generation operations.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::clip::ClipReference;

/// Structured error reported by a finished remote job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct OperationError {
    /// Status code reported by the service (google.rpc.Code)
    #[serde(default)]
    pub code: i32,
    /// Human-readable message, surfaced verbatim
    #[serde(default)]
    pub message: String,
}

/// Snapshot of a remote long-running operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRunningOperation {
    /// Opaque operation name returned at submission
    pub name: String,
    /// Whether the operation reached a terminal state
    #[serde(default)]
    pub done: bool,
    /// Output locators when finished successfully
    #[serde(default)]
    pub outputs: Vec<ClipReference>,
    /// Error when finished unsuccessfully
    #[serde(default)]
    pub error: Option<OperationError>,
}

/// Interpretation of an operation snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationStatus {
    /// Still running
    Pending,
    /// Finished with outputs (possibly empty)
    Succeeded(Vec<ClipReference>),
    /// Finished with a structured error
    Failed(OperationError),
}

impl LongRunningOperation {
    /// A freshly submitted, not yet completed operation.
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: false,
            outputs: Vec::new(),
            error: None,
        }
    }

    /// A completed operation with outputs.
    pub fn succeeded(name: impl Into<String>, outputs: Vec<ClipReference>) -> Self {
        Self {
            name: name.into(),
            done: true,
            outputs,
            error: None,
        }
    }

    /// A completed operation carrying an error.
    pub fn failed(name: impl Into<String>, code: i32, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: true,
            outputs: Vec::new(),
            error: Some(OperationError {
                code,
                message: message.into(),
            }),
        }
    }

    /// Classify the snapshot. An error is only terminal once `done` is set.
    pub fn status(&self) -> OperationStatus {
        if !self.done {
            return OperationStatus::Pending;
        }
        match &self.error {
            Some(err) => OperationStatus::Failed(err.clone()),
            None => OperationStatus::Succeeded(self.outputs.clone()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.done
    }
}
