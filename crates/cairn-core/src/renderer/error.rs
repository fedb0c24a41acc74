// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Defines the error types for GPU resources and pipeline descriptors.
//!
//! Capacity shortfalls (a step buffer that turned out too small, an exhausted
//! geometry block range) are not errors and never appear here; they are
//! handled by explicit grow-and-retry paths.

use std::fmt;

/// An error raised while validating a pipeline descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The descriptor does not reference any shader.
    MissingShader {
        /// The label of the pipeline being created.
        label: Option<String>,
    },
    /// The descriptor combines states that cannot be used together.
    InvalidState {
        /// The label of the pipeline being created.
        label: Option<String>,
        /// What is wrong with the descriptor.
        details: String,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::MissingShader { label } => write!(
                f,
                "Pipeline '{}' does not reference a shader",
                label.as_deref().unwrap_or("Unknown")
            ),
            PipelineError::InvalidState { label, details } => write!(
                f,
                "Invalid state for pipeline '{}': {}",
                label.as_deref().unwrap_or("Unknown"),
                details
            ),
        }
    }
}

impl std::error::Error for PipelineError {}

/// An error related to the creation or use of a GPU resource.
#[derive(Debug)]
pub enum ResourceError {
    /// A pipeline-specific error occurred.
    Pipeline(PipelineError),
    /// A resource could not be found.
    NotFound,
    /// The handle or ID used to reference a resource is invalid.
    InvalidHandle,
    /// An error originating from the graphics backend implementation.
    BackendError(String),
    /// An access reached past the end of a buffer.
    OutOfBounds {
        /// Byte offset of the access.
        offset: u64,
        /// Byte length of the access.
        len: u64,
        /// Byte size of the buffer.
        buffer_size: u64,
    },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Pipeline(err) => write!(f, "Pipeline resource error: {err}"),
            ResourceError::NotFound => write!(f, "Resource not found with ID."),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
            ResourceError::OutOfBounds {
                offset,
                len,
                buffer_size,
            } => write!(
                f,
                "Access of {len} bytes at offset {offset} exceeds buffer size {buffer_size}"
            ),
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Pipeline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        ResourceError::Pipeline(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_pipeline_error_display_uses_label() {
        let err = PipelineError::MissingShader {
            label: Some("depth".to_string()),
        };
        assert_eq!(err.to_string(), "Pipeline 'depth' does not reference a shader");

        let err = PipelineError::InvalidState {
            label: None,
            details: "blend on compute".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid state for pipeline 'Unknown': blend on compute"
        );
    }

    #[test]
    fn test_resource_error_wraps_pipeline_error() {
        let err: ResourceError = PipelineError::MissingShader { label: None }.into();
        assert!(matches!(err, ResourceError::Pipeline(_)));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_out_of_bounds_display() {
        let err = ResourceError::OutOfBounds {
            offset: 64,
            len: 32,
            buffer_size: 80,
        };
        assert_eq!(
            err.to_string(),
            "Access of 32 bytes at offset 64 exceeds buffer size 80"
        );
    }
}
