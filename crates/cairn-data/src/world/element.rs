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

//! What the scene graph exposes for each renderable it registers.

use cairn_core::math::Aabb;
use cairn_core::renderer::{
    pack_element_flags, ElementFlags, ElementKind, GpuElement, GpuElementGeometry, RenderFilter,
};

/// Per-element values mirrored into the element buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementData {
    /// World-space bounds.
    pub bounds: Aabb,
    /// Element flags.
    pub flags: ElementFlags,
    /// Element kind, selecting the skin pipeline list.
    pub kind: ElementKind,
    /// Layers the element is visible on.
    pub layer_mask: u64,
    /// Distance factors switching to LOD 1 to 4.
    pub lod_factors: [f32; 4],
    /// Highest LOD level.
    pub highest_lod: u32,
    /// Number of geometry rows the element emits.
    pub geometry_count: usize,
}

impl Default for ElementData {
    fn default() -> Self {
        Self {
            bounds: Aabb::default(),
            flags: ElementFlags::EMPTY,
            kind: ElementKind::Component,
            layer_mask: u64::MAX,
            lod_factors: [0.0; 4],
            highest_lod: 0,
            geometry_count: 0,
        }
    }
}

impl ElementData {
    pub(crate) fn to_gpu(&self, first_geometry: u32) -> GpuElement {
        GpuElement {
            min_extend: self.bounds.min.to_array(),
            flags: pack_element_flags(self.flags, self.kind),
            max_extend: self.bounds.max.to_array(),
            update_index: 0,
            layer_mask: [self.layer_mask as u32, (self.layer_mask >> 32) as u32],
            first_geometry,
            geometry_count: self.geometry_count as u32,
            lod_factors: self.lod_factors,
            highest_lod: self.highest_lod,
            cull_result: 0,
            lod_index: 0,
            _pad: 0,
        }
    }
}

/// One geometry row as emitted by an element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ElementGeometry {
    /// LOD level the geometry belongs to.
    pub lod: u32,
    /// Filter bits matched against pass filters.
    pub render_filter: RenderFilter,
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

impl ElementGeometry {
    pub(crate) fn to_gpu(&self, element: u32) -> GpuElementGeometry {
        GpuElementGeometry {
            element,
            lod: self.lod,
            render_filter: self.render_filter.bits(),
            skin_texture: self.skin_texture,
            pipeline_base: self.pipeline_base,
            vao: self.vao,
            instance: self.instance,
            spb_instance: self.spb_instance,
            tucs: self.tucs,
        }
    }
}

/// A renderable owned by the scene graph.
///
/// The registry reads elements only while preparing a frame. Changing what
/// [`element_data`](Self::element_data) reports requires
/// [`update_element`](super::WorldComputeRegistry::update_element); changing
/// the emitted geometries requires
/// [`update_element_geometries`](super::WorldComputeRegistry::update_element_geometries),
/// and a changed geometry count requires both.
pub trait ComputeElement: Send + Sync {
    /// Current bounds, flags and LOD data.
    fn element_data(&self) -> ElementData;

    /// Fills `geometries` with the element's geometry rows.
    ///
    /// The slice holds at least the reported geometry count; extra rows are
    /// left untouched and never drawn.
    fn write_geometries(&self, geometries: &mut [ElementGeometry]);
}
