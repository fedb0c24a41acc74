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

//! # Lane Abstraction
//!
//! A **Lane** is a swappable processing strategy for one stage of the frame.
//! The compute pipeline exposes its per-frame orchestration as a lane so the
//! strategy (GPU dispatch, CPU reference executor, ...) can be chosen at
//! startup.

use crate::renderer::ResourceError;
use std::fmt;

/// Error type for lane operations.
#[derive(Debug)]
pub enum LaneError {
    /// A GPU resource operation failed.
    Resource(ResourceError),
    /// A render task still needed a larger step buffer after the allowed
    /// number of build dispatches.
    RetryLimitExceeded {
        /// Label of the task that did not converge.
        task: String,
        /// Build dispatches issued.
        attempts: u32,
        /// Step capacity requested by the last read-back.
        requested_capacity: usize,
    },
}

impl fmt::Display for LaneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneError::Resource(e) => write!(f, "Lane resource error: {e}"),
            LaneError::RetryLimitExceeded {
                task,
                attempts,
                requested_capacity,
            } => write!(
                f,
                "Render task '{task}' still needs {requested_capacity} steps after {attempts} build attempts"
            ),
        }
    }
}

impl std::error::Error for LaneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaneError::Resource(e) => Some(e),
            LaneError::RetryLimitExceeded { .. } => None,
        }
    }
}

impl From<ResourceError> for LaneError {
    fn from(err: ResourceError) -> Self {
        LaneError::Resource(err)
    }
}

/// Classification of lane types, used for routing and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneKind {
    /// Draw step generation.
    Render,
}

impl fmt::Display for LaneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneKind::Render => write!(f, "Render"),
        }
    }
}

/// Common interface of every lane.
pub trait Lane: Send + Sync {
    /// Human-readable name of the strategy.
    fn strategy_name(&self) -> &'static str;

    /// What the lane does.
    fn lane_kind(&self) -> LaneKind;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_retry_limit_display() {
        let err = LaneError::RetryLimitExceeded {
            task: "sky".to_string(),
            attempts: 3,
            requested_capacity: 420,
        };
        assert_eq!(
            err.to_string(),
            "Render task 'sky' still needs 420 steps after 3 build attempts"
        );
        assert!(err.source().is_none());
    }

    #[test]
    fn test_resource_error_converts() {
        let err: LaneError = ResourceError::NotFound.into();
        assert!(matches!(err, LaneError::Resource(ResourceError::NotFound)));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_lane_kind_display() {
        assert_eq!(LaneKind::Render.to_string(), "Render");
    }
}
