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

//! Dispatch schedule of the bitonic step sort.
//!
//! The step list is padded to a power of two. Blocks of up to `2 * SORT_LANE_SIZE`
//! entries are handled inside one work group; larger flips and disperses need one
//! global dispatch each.

/// Threads per sort work group. Each thread compares one pair.
pub const SORT_LANE_SIZE: u32 = 128;

/// Threads per work group of the culling and building stages.
pub const BUILD_WORK_GROUP_SIZE: u32 = 64;

/// Work groups needed to cover `count` items with groups of
/// [`BUILD_WORK_GROUP_SIZE`].
pub fn work_group_count(count: u32) -> u32 {
    if count == 0 {
        return 0;
    }
    (count - 1) / BUILD_WORK_GROUP_SIZE + 1
}

/// One sort kernel invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortStage {
    /// Fully sorts every block of `height` entries in work-group memory.
    LocalSort {
        /// Block size.
        height: u32,
    },
    /// Compares mirrored pairs inside blocks of `height` entries.
    GlobalFlip {
        /// Block size.
        height: u32,
    },
    /// Compares pairs `height / 2` apart inside blocks of `height` entries.
    GlobalDisperse {
        /// Block size.
        height: u32,
    },
    /// Runs every disperse from `height` down to 2 in work-group memory.
    LocalDisperse {
        /// Block size.
        height: u32,
    },
}

/// A sort stage with its work-group count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortDispatch {
    /// Kernel invocation.
    pub stage: SortStage,
    /// Work groups to dispatch.
    pub work_groups: u32,
}

/// Builds the dispatch list sorting `count` entries. Empty for `count <= 1`.
pub fn sort_schedule(count: u32) -> Vec<SortDispatch> {
    if count <= 1 {
        return Vec::new();
    }
    let padded = count.next_power_of_two();
    let max_local = 2 * SORT_LANE_SIZE;
    let work_groups = (padded / 2).div_ceil(SORT_LANE_SIZE);
    let dispatch = |stage| SortDispatch { stage, work_groups };

    let mut schedule = Vec::new();
    let mut height = padded.min(max_local);
    schedule.push(dispatch(SortStage::LocalSort { height }));

    height *= 2;
    while height <= padded {
        schedule.push(dispatch(SortStage::GlobalFlip { height }));
        let mut disperse = height / 2;
        while disperse > 1 {
            if disperse <= max_local {
                schedule.push(dispatch(SortStage::LocalDisperse { height: disperse }));
                break;
            }
            schedule.push(dispatch(SortStage::GlobalDisperse { height: disperse }));
            disperse /= 2;
        }
        height *= 2;
    }
    schedule
}

/// Runs a schedule on the CPU. `values.len()` must be the padded power of two
/// the schedule was built for.
pub(crate) fn run_schedule<T: Ord>(values: &mut [T], schedule: &[SortDispatch]) {
    for dispatch in schedule {
        match dispatch.stage {
            SortStage::LocalSort { height } => {
                let mut h = 2;
                while h <= height {
                    flip(values, h);
                    let mut d = h / 2;
                    while d > 1 {
                        disperse(values, d);
                        d /= 2;
                    }
                    h *= 2;
                }
            }
            SortStage::GlobalFlip { height } => flip(values, height),
            SortStage::GlobalDisperse { height } => disperse(values, height),
            SortStage::LocalDisperse { height } => {
                let mut d = height;
                while d > 1 {
                    disperse(values, d);
                    d /= 2;
                }
            }
        }
    }
}

fn flip<T: Ord>(values: &mut [T], height: u32) {
    let height = height as usize;
    for block in (0..values.len()).step_by(height) {
        for i in 0..height / 2 {
            compare_swap(values, block + i, block + height - 1 - i);
        }
    }
}

fn disperse<T: Ord>(values: &mut [T], height: u32) {
    let height = height as usize;
    for block in (0..values.len()).step_by(height) {
        for i in 0..height / 2 {
            compare_swap(values, block + i, block + i + height / 2);
        }
    }
}

fn compare_swap<T: Ord>(values: &mut [T], a: usize, b: usize) {
    if values[a] > values[b] {
        values.swap(a, b);
    }
}
