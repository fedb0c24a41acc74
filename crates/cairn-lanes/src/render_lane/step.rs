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

//! Draw steps as consumed by the draw-issuing side.

use cairn_core::renderer::{GpuDrawStep, SpecialFlags};

/// One draw call worth of state, read back from the step buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawStep {
    /// Stable pipeline index.
    pub pipeline: u32,
    /// Texture state record index.
    pub tuc: u32,
    /// VAO record index.
    pub vao: u32,
    /// Instance record index.
    pub instance: u32,
    /// Per-instance parameter block index of the first sub-instance.
    pub spb_instance: u32,
    /// Special flags of the step.
    pub special_flags: SpecialFlags,
    /// Number of sub-instances drawn by this step, at least 1.
    pub sub_instance_count: u32,
}

impl From<&GpuDrawStep> for DrawStep {
    fn from(row: &GpuDrawStep) -> Self {
        Self {
            pipeline: row.pipeline,
            tuc: row.tuc,
            vao: row.vao,
            instance: row.instance,
            spb_instance: row.spb_instance,
            special_flags: SpecialFlags::from_bits(row.special_flags),
            sub_instance_count: row.sub_instance_count.max(1),
        }
    }
}

/// Receives the finished step list of a render task.
pub trait DrawStepSink {
    /// Called once per [`render`](super::ComputeRenderTask::render) with the
    /// steps in draw order.
    fn draw_steps(&mut self, steps: &[DrawStep]);
}

impl DrawStepSink for Vec<DrawStep> {
    fn draw_steps(&mut self, steps: &[DrawStep]) {
        self.extend_from_slice(steps);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sub_instance_count_reads_as_one() {
        let row = GpuDrawStep {
            pipeline: 4,
            special_flags: SpecialFlags::DOUBLE_SIDED.bits(),
            ..Default::default()
        };
        let step = DrawStep::from(&row);
        assert_eq!(step.sub_instance_count, 1);
        assert_eq!(step.special_flags, SpecialFlags::DOUBLE_SIDED);
    }
}
