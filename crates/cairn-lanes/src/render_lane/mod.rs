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

//! Render lane - builds draw step lists on the GPU and replays them

mod config;
mod cpu_executor;
mod sort;
mod state_cache;
mod step;
mod step_build_lane;
mod task;

pub use config::*;
pub use cpu_executor::*;
pub use sort::{sort_schedule, work_group_count, SortDispatch, SortStage, BUILD_WORK_GROUP_SIZE, SORT_LANE_SIZE};
pub use state_cache::*;
pub use step::*;
pub use step_build_lane::*;
pub use task::*;
