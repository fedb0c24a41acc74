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

//! Tunable parameters of the scene compute pipeline.

use serde::{Deserialize, Serialize};

/// Thresholds and growth policies for the world registry and render tasks.
///
/// The update factors are heuristics: a frame whose dirty count reaches
/// `factor × element_count` is resynchronized with a full rewrite instead of a
/// scatter pass. They are exposed so workloads can tune them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeSettings {
    /// Fraction of the element count above which element updates go full.
    pub full_update_factor: f32,
    /// Fraction of the element count above which geometry updates go full.
    pub full_update_geometry_factor: f32,
    /// Extra rows allocated when the element buffer must grow.
    pub element_growth_slack: usize,
    /// Extra rows allocated when the geometry buffer must grow.
    pub geometry_growth_slack: usize,
    /// Step capacity of a freshly created render task.
    pub initial_step_capacity: usize,
    /// Extra steps allocated on top of the GPU count when a step buffer is too small.
    pub step_growth_slack: usize,
    /// Build dispatches attempted per frame before giving up.
    pub max_build_attempts: u32,
    /// Pool sizes are logged each time they cross a multiple of this value.
    pub pool_log_interval: usize,
}

impl Default for ComputeSettings {
    fn default() -> Self {
        Self {
            full_update_factor: 0.2,
            full_update_geometry_factor: 0.25,
            element_growth_slack: 100,
            geometry_growth_slack: 100,
            initial_step_capacity: 256,
            step_growth_slack: 10,
            max_build_attempts: 3,
            pool_log_interval: 1000,
        }
    }
}

/// Computes an adaptive full-update limit.
///
/// The limit never shrinks: `max(current, ceil(factor × count))`. Comparing a
/// dirty count `d` with `d < limit` is then the same as `d < factor × count`.
pub fn grow_update_limit(current: usize, factor: f32, count: usize) -> usize {
    let scaled = (factor * count as f32).ceil();
    current.max(scaled.max(0.0) as usize)
}
