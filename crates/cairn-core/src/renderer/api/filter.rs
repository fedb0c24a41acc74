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

//! Filter words shared by geometry rows, pass configurations and draw steps.

use crate::cairn_bitflags;

cairn_bitflags! {
    /// Properties of one element geometry, tested by each pass as
    /// `(geometry_filter & pass.mask) == pass.filter`.
    pub struct RenderFilter: u32 {
        /// The geometry is renderable at all.
        const RENDER = 1 << 0;
        /// The geometry is solid (not transparent).
        const SOLID = 1 << 1;
        /// The geometry casts no shadows.
        const SHADOW_NONE = 1 << 2;
        /// The geometry shows up in reflections.
        const REFLECTED = 1 << 3;
        /// The geometry is visible to the main camera.
        const RENDERED = 1 << 4;
        /// The geometry is drawn as an outline.
        const OUTLINE = 1 << 5;
        /// The outline is solid.
        const OUTLINE_SOLID = 1 << 6;
        /// The geometry has alpha-tested holes.
        const HOLES = 1 << 7;
        /// The geometry is a decal.
        const DECAL = 1 << 8;
        /// The geometry has no back-face culling.
        const DOUBLE_SIDED = 1 << 9;
        /// The geometry is x-ray visible.
        const XRAY = 1 << 10;
        /// The geometry is drawn into shadow maps.
        const SHADOW = 1 << 11;
        /// The geometry has a compact shadow representation.
        const COMPACT_SHADOW = 1 << 12;
        /// The geometry is an occlusion mesh.
        const OCCLUSION = 1 << 13;
    }
}

/// Set on a packed cube-face filter so that face 0 differs from "no filter".
pub const CUBE_FACE_FILTER_PRESENT: u32 = 1 << 8;

cairn_bitflags! {
    /// Element-level flags stored in the low bits of the GPU element row.
    pub struct ElementFlags: u32 {
        /// The element does not move.
        const STATIC = 1 << 0;
        /// The element is excluded from culling and always visible.
        const NO_CULLING = 1 << 1;
        /// The element participates in global illumination.
        const GI = 1 << 2;
        /// The element is an occluder.
        const OCCLUDER = 1 << 3;
    }
}

/// Shift of the element kind inside the GPU element flags word.
pub const ELEMENT_KIND_SHIFT: u32 = 24;

/// Kind of scene element, packed in the top byte of the element flags word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ElementKind {
    /// Animated or static mesh component.
    #[default]
    Component = 0,
    /// Camera-facing billboard.
    Billboard = 1,
    /// Projected decal.
    Decal = 2,
    /// Prop field instance cluster.
    PropField = 3,
    /// Height terrain sector.
    HeightTerrain = 4,
    /// Particle emitter.
    Particles = 5,
}

impl ElementKind {
    /// The skin pipeline list geometries of this kind are drawn with.
    pub const fn pipeline_list(self) -> SkinPipelineList {
        match self {
            ElementKind::Component => SkinPipelineList::Component,
            ElementKind::Billboard => SkinPipelineList::Billboard,
            ElementKind::Decal => SkinPipelineList::Decal,
            ElementKind::PropField => SkinPipelineList::PropField,
            ElementKind::HeightTerrain => SkinPipelineList::HeightMap,
            ElementKind::Particles => SkinPipelineList::Particle,
        }
    }

    /// Decodes the kind from a GPU element flags word.
    pub const fn from_flags_word(word: u32) -> Option<Self> {
        match word >> ELEMENT_KIND_SHIFT {
            0 => Some(ElementKind::Component),
            1 => Some(ElementKind::Billboard),
            2 => Some(ElementKind::Decal),
            3 => Some(ElementKind::PropField),
            4 => Some(ElementKind::HeightTerrain),
            5 => Some(ElementKind::Particles),
            _ => None,
        }
    }
}

/// Packs element flags and kind into the GPU flags word.
pub const fn pack_element_flags(flags: ElementFlags, kind: ElementKind) -> u32 {
    (flags.bits() & ((1 << ELEMENT_KIND_SHIFT) - 1)) | ((kind as u32) << ELEMENT_KIND_SHIFT)
}

/// Lists of skin pipelines. A pass selects lists through a bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SkinPipelineList {
    /// Component pipelines.
    Component = 0,
    /// Billboard pipelines.
    Billboard = 1,
    /// Decal pipelines.
    Decal = 2,
    /// Prop field pipelines.
    PropField = 3,
    /// Height map pipelines.
    HeightMap = 4,
    /// Particle pipelines.
    Particle = 5,
}

impl SkinPipelineList {
    /// Bit of this list in a pass list mask.
    pub const fn bit(self) -> u32 {
        1 << self as u32
    }

    /// Mask selecting every list.
    pub const ALL: u32 = (1 << 6) - 1;
}

/// Pipeline type selected by a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum SkinPipelineType {
    /// Color geometry pass.
    #[default]
    Geometry = 0,
    /// Depth-only pass.
    Depth = 1,
    /// Occlusion query counting pass.
    Counter = 2,
    /// Perspective shadow map.
    ShadowProjection = 3,
    /// Orthogonal shadow map.
    ShadowOrthogonal = 4,
    /// Distance (cube) shadow map.
    ShadowDistance = 5,
}

impl SkinPipelineType {
    /// Number of pipeline modifiers per type; pipelines of one base are laid
    /// out as `base + type * MODIFIER_COUNT + modifier`.
    pub const MODIFIER_COUNT: u32 = 16;

    /// Which of the four texture-unit-configuration slots of a geometry this
    /// type draws with.
    pub const fn tuc_slot(self) -> usize {
        match self {
            SkinPipelineType::Geometry => 0,
            SkinPipelineType::Depth | SkinPipelineType::Counter => 1,
            SkinPipelineType::ShadowProjection | SkinPipelineType::ShadowOrthogonal => 2,
            SkinPipelineType::ShadowDistance => 3,
        }
    }

    /// Decodes a raw type value.
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(SkinPipelineType::Geometry),
            1 => Some(SkinPipelineType::Depth),
            2 => Some(SkinPipelineType::Counter),
            3 => Some(SkinPipelineType::ShadowProjection),
            4 => Some(SkinPipelineType::ShadowOrthogonal),
            5 => Some(SkinPipelineType::ShadowDistance),
            _ => None,
        }
    }
}

cairn_bitflags! {
    /// Variants applied on top of a pipeline type.
    pub struct PipelineModifier: u32 {
        /// Draw with front and back faces swapped.
        const FLIP_CULL_FACE = 1 << 0;
        /// Disable back-face culling.
        const DOUBLE_SIDED = 1 << 1;
        /// Enable the user clip plane.
        const CLIP_PLANE = 1 << 2;
        /// Render into stereo views.
        const STEREO = 1 << 3;
    }
}

cairn_bitflags! {
    /// Flags carried by a draw step.
    pub struct SpecialFlags: u32 {
        /// The geometry belongs to a double-sided material.
        const DOUBLE_SIDED = 1 << 0;
        /// The element is static.
        const STATIC = 1 << 1;
        /// The step was produced by an occlusion pass.
        const OCCLUSION = 1 << 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_flags_word_round_trip() {
        let word = pack_element_flags(ElementFlags::STATIC | ElementFlags::GI, ElementKind::Decal);
        assert_eq!(ElementKind::from_flags_word(word), Some(ElementKind::Decal));
        assert_eq!(word & 0xff, 0b101);
    }

    #[test]
    fn test_kind_maps_to_pipeline_list() {
        assert_eq!(ElementKind::HeightTerrain.pipeline_list(), SkinPipelineList::HeightMap);
        assert_eq!(SkinPipelineList::Decal.bit(), 0b100);
        assert_eq!(SkinPipelineList::ALL & SkinPipelineList::Particle.bit(), 1 << 5);
    }

    #[test]
    fn test_tuc_slots() {
        assert_eq!(SkinPipelineType::Geometry.tuc_slot(), 0);
        assert_eq!(SkinPipelineType::Counter.tuc_slot(), 1);
        assert_eq!(SkinPipelineType::ShadowDistance.tuc_slot(), 3);
        assert_eq!(SkinPipelineType::from_raw(4), Some(SkinPipelineType::ShadowOrthogonal));
        assert_eq!(SkinPipelineType::from_raw(9), None);
    }
}
