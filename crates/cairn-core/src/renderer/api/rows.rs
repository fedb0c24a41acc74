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

//! GPU row layouts shared with the compute shaders.
//!
//! Every row is `repr(C)` and padded to a multiple of 16 bytes so it can be
//! bound as a structured storage buffer with std430 layout.

use bytemuck::{Pod, Zeroable};

/// One element in the world element buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GpuElement {
    /// Minimum AABB corner.
    pub min_extend: [f32; 3],
    /// Packed element flags and kind.
    pub flags: u32,
    /// Maximum AABB corner.
    pub max_extend: [f32; 3],
    /// Target row when uploaded through the scatter pass.
    pub update_index: u32,
    /// 64-bit layer mask split in two words.
    pub layer_mask: [u32; 2],
    /// First row of the element geometries.
    pub first_geometry: u32,
    /// Number of element geometries.
    pub geometry_count: u32,
    /// Distance factors selecting LOD levels 1 to 4.
    pub lod_factors: [f32; 4],
    /// Highest LOD index the element has.
    pub highest_lod: u32,
    /// Written by the culling pass.
    pub cull_result: u32,
    /// Written by the LOD pass.
    pub lod_index: u32,
    /// Padding.
    pub _pad: u32,
}

/// One geometry row in the world geometry buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct GpuElementGeometry {
    /// Dense index of the owning element.
    pub element: u32,
    /// LOD level this geometry belongs to.
    pub lod: u32,
    /// [`RenderFilter`](super::RenderFilter) bits.
    pub render_filter: u32,
    /// Skin texture slot.
    pub skin_texture: u32,
    /// First pipeline of the skin texture pipeline block.
    pub pipeline_base: u32,
    /// VAO record index.
    pub vao: u32,
    /// Instance record index.
    pub instance: u32,
    /// Per-instance shader parameter block index.
    pub spb_instance: u32,
    /// Texture-unit-configuration indices, one per slot.
    pub tucs: [u32; 4],
}

/// One draw step produced by the build pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct GpuDrawStep {
    /// Stable pipeline index.
    pub pipeline: u32,
    /// Texture-unit-configuration index.
    pub tuc: u32,
    /// VAO record index.
    pub vao: u32,
    /// Instance record index.
    pub instance: u32,
    /// Sub-instance shader parameter block index.
    pub spb_instance: u32,
    /// [`SpecialFlags`](super::SpecialFlags) bits.
    pub special_flags: u32,
    /// Rows consumed by this step, including itself.
    pub sub_instance_count: u32,
    /// Padding.
    pub _pad: u32,
}

/// One pass of the per-task configuration buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct GpuPassConfig {
    /// Geometry rows in use when the pass was configured.
    pub element_geometry_count: u32,
    /// Expected filter bits after masking.
    pub filter: u32,
    /// Filter bits tested by the pass.
    pub mask: u32,
    /// Packed cube face filter, 0 when unused.
    pub filter_cube_face: u32,
    /// Mask of enabled skin pipeline lists.
    pub skin_pipeline_lists: u32,
    /// Skin pipeline type.
    pub skin_pipeline_type: u32,
    /// Skin pipeline modifier bits.
    pub skin_pipeline_modifier: u32,
    /// Pipeline for double-sided occlusion geometry.
    pub pipeline_double_sided: u32,
    /// Pipeline for single-sided occlusion geometry.
    pub pipeline_single_sided: u32,
    /// Padding.
    pub _pad: [u32; 3],
}

/// Counters written by the build pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct GpuStepCounters {
    /// Indirect dispatch size for the sort pass.
    pub work_group_size: [u32; 3],
    /// Steps the build pass tried to emit, including those dropped for lack of space.
    pub count: u32,
}

/// Marks a pass pipeline index as unused.
pub const NO_PIPELINE: u32 = u32::MAX;

const _: () = assert!(std::mem::size_of::<GpuElement>() == 80);
const _: () = assert!(std::mem::size_of::<GpuElementGeometry>() == 48);
const _: () = assert!(std::mem::size_of::<GpuDrawStep>() == 32);
const _: () = assert!(std::mem::size_of::<GpuPassConfig>() == 48);
const _: () = assert!(std::mem::size_of::<GpuStepCounters>() == 16);
