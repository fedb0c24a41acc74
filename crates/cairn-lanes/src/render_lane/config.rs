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

//! Per-pass filter configuration of a compute render task.
//!
//! A geometry row takes part in a pass when `(row.render_filter & mask) == filter`.
//! [`pack_filters`] turns the caller-facing [`PassFilters`] into that bit pair.

use cairn_core::renderer::{
    PipelineModifier, RenderFilter, SkinPipelineList, SkinPipelineType, CUBE_FACE_FILTER_PRESENT,
    NO_PIPELINE,
};

/// Caller-facing filter settings for one pass.
///
/// The `filter_*` fields decide whether a property is tested at all; the
/// matching plain field selects the required value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassFilters {
    /// Required solidity when `filter_solid` is set.
    pub solid: bool,
    /// Test solidity.
    pub filter_solid: bool,
    /// Outline pass: selects outline geometry, solidity is tested on the
    /// outline-solid bit instead.
    pub outline: bool,
    /// Test the x-ray bit.
    pub filter_xray: bool,
    /// Required x-ray value.
    pub xray: bool,
    /// Test the holes bit.
    pub filter_holes: bool,
    /// Required holes value.
    pub with_holes: bool,
    /// Test the decal bit.
    pub filter_decal: bool,
    /// Required decal value.
    pub decal: bool,
    /// Test the double-sided bit.
    pub filter_double_sided: bool,
    /// Required double-sided value.
    pub double_sided: bool,
    /// Render every geometry with the double-sided pipeline modifier.
    pub force_double_sided: bool,
    /// Test the shadow bits.
    pub filter_shadow: bool,
    /// Required shadow-casting value.
    pub shadow: bool,
    /// Required compact-shadow value.
    pub compact_shadow: bool,
    /// Occlusion pass: only occlusion geometry, drawn with the occlusion pipelines.
    pub occlusion: bool,
    /// Exclude geometry flagged as casting no shadow.
    pub no_shadow_none: bool,
    /// Only geometry visible in reflections.
    pub no_not_reflected: bool,
    /// Exclude geometry flagged as rendered.
    pub no_rendered: bool,
    /// Restrict to elements touching one cube map face (0 to 5).
    pub filter_cube_face: Option<u32>,
    /// Bit set of [`SkinPipelineList`]s taking part.
    pub skin_pipeline_lists: u32,
    /// Pipeline type selected from each skin pipeline block.
    pub skin_pipeline_type: SkinPipelineType,
    /// Pipeline modifier selected from each skin pipeline block.
    pub skin_pipeline_modifier: PipelineModifier,
    /// Pipeline used for double-sided geometry in occlusion passes.
    pub pipeline_double_sided: u32,
    /// Pipeline used for single-sided geometry in occlusion passes.
    pub pipeline_single_sided: u32,
}

impl Default for PassFilters {
    fn default() -> Self {
        Self {
            solid: false,
            filter_solid: false,
            outline: false,
            filter_xray: false,
            xray: false,
            filter_holes: false,
            with_holes: false,
            filter_decal: false,
            decal: false,
            filter_double_sided: false,
            double_sided: false,
            force_double_sided: false,
            filter_shadow: false,
            shadow: false,
            compact_shadow: false,
            occlusion: false,
            no_shadow_none: false,
            no_not_reflected: false,
            no_rendered: false,
            filter_cube_face: None,
            skin_pipeline_lists: SkinPipelineList::ALL,
            skin_pipeline_type: SkinPipelineType::Geometry,
            skin_pipeline_modifier: PipelineModifier::EMPTY,
            pipeline_double_sided: NO_PIPELINE,
            pipeline_single_sided: NO_PIPELINE,
        }
    }
}

impl PassFilters {
    /// Opaque geometry pass.
    pub fn solid_geometry() -> Self {
        Self {
            solid: true,
            filter_solid: true,
            ..Default::default()
        }
    }

    /// Shadow map pass for shadow casters.
    pub fn shadow_casters(pipeline_type: SkinPipelineType) -> Self {
        Self {
            filter_shadow: true,
            shadow: true,
            no_shadow_none: true,
            skin_pipeline_type: pipeline_type,
            ..Default::default()
        }
    }

    /// Occlusion mesh pass drawn with fixed pipelines.
    pub fn occlusion(pipeline_double_sided: u32, pipeline_single_sided: u32) -> Self {
        Self {
            occlusion: true,
            skin_pipeline_type: SkinPipelineType::Depth,
            pipeline_double_sided,
            pipeline_single_sided,
            ..Default::default()
        }
    }
}

/// The packed form of [`PassFilters`] stored in a pass configuration row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedFilters {
    /// Required bit values.
    pub filter: RenderFilter,
    /// Tested bits.
    pub mask: RenderFilter,
    /// `CUBE_FACE_FILTER_PRESENT | face`, or 0 without a face filter.
    pub cube_face: u32,
    /// Pipeline modifier including forced double-sidedness.
    pub modifier: PipelineModifier,
}

fn pair(filter: &mut RenderFilter, mask: &mut RenderFilter, test: bool, value: bool, bit: RenderFilter) {
    if test {
        mask.insert(bit);
        filter.set(bit, value);
    }
}

/// Packs pass filters into a `(filter, mask)` pair.
pub fn pack_filters(filters: &PassFilters) -> PackedFilters {
    let mut filter = RenderFilter::RENDER;
    let mut mask = RenderFilter::RENDER;

    if filters.outline {
        filter |= RenderFilter::OUTLINE;
        mask |= RenderFilter::OUTLINE;
        pair(
            &mut filter,
            &mut mask,
            filters.filter_solid,
            filters.solid,
            RenderFilter::OUTLINE_SOLID,
        );
    } else {
        pair(
            &mut filter,
            &mut mask,
            filters.filter_solid,
            filters.solid,
            RenderFilter::SOLID,
        );
    }

    pair(&mut filter, &mut mask, filters.filter_xray, filters.xray, RenderFilter::XRAY);
    pair(&mut filter, &mut mask, filters.filter_holes, filters.with_holes, RenderFilter::HOLES);
    pair(&mut filter, &mut mask, filters.filter_decal, filters.decal, RenderFilter::DECAL);
    pair(
        &mut filter,
        &mut mask,
        filters.filter_double_sided,
        filters.double_sided,
        RenderFilter::DOUBLE_SIDED,
    );
    pair(&mut filter, &mut mask, filters.filter_shadow, filters.shadow, RenderFilter::SHADOW);
    pair(
        &mut filter,
        &mut mask,
        filters.filter_shadow,
        filters.compact_shadow,
        RenderFilter::COMPACT_SHADOW,
    );

    if filters.no_not_reflected {
        filter |= RenderFilter::REFLECTED;
        mask |= RenderFilter::REFLECTED;
    }
    if filters.no_rendered {
        mask |= RenderFilter::RENDERED;
    }
    if filters.no_shadow_none {
        mask |= RenderFilter::SHADOW_NONE;
    }

    // Occlusion geometry only ever shows up in occlusion passes.
    mask |= RenderFilter::OCCLUSION;
    if filters.occlusion {
        filter |= RenderFilter::OCCLUSION;
    }

    let mut modifier = filters.skin_pipeline_modifier;
    if filters.force_double_sided {
        modifier |= PipelineModifier::DOUBLE_SIDED;
    }

    PackedFilters {
        filter,
        mask,
        cube_face: filters
            .filter_cube_face
            .map_or(0, |face| CUBE_FACE_FILTER_PRESENT | face),
        modifier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_only_requires_render() {
        let packed = pack_filters(&PassFilters::default());
        assert_eq!(packed.filter, RenderFilter::RENDER);
        assert_eq!(packed.mask, RenderFilter::RENDER | RenderFilter::OCCLUSION);
        assert_eq!(packed.cube_face, 0);
    }

    #[test]
    fn test_plain_solid_uses_solid_bit() {
        let packed = pack_filters(&PassFilters::solid_geometry());
        assert!(packed.filter.contains(RenderFilter::SOLID));
        assert!(packed.mask.contains(RenderFilter::SOLID));
        assert!(!packed.mask.contains(RenderFilter::OUTLINE_SOLID));
    }

    #[test]
    fn test_outline_moves_solidity_to_outline_solid() {
        let filters = PassFilters {
            outline: true,
            ..PassFilters::solid_geometry()
        };
        let packed = pack_filters(&filters);
        assert!(packed.filter.contains(RenderFilter::OUTLINE | RenderFilter::OUTLINE_SOLID));
        assert!(packed.mask.contains(RenderFilter::OUTLINE | RenderFilter::OUTLINE_SOLID));
        assert!(!packed.mask.contains(RenderFilter::SOLID));
    }

    #[test]
    fn test_transparent_pass_masks_without_filtering() {
        let filters = PassFilters {
            solid: false,
            filter_solid: true,
            ..Default::default()
        };
        let packed = pack_filters(&filters);
        assert!(packed.mask.contains(RenderFilter::SOLID));
        assert!(!packed.filter.contains(RenderFilter::SOLID));
    }

    #[test]
    fn test_shadow_pair_includes_compact_shadow() {
        let packed = pack_filters(&PassFilters::shadow_casters(
            SkinPipelineType::ShadowProjection,
        ));
        assert!(packed.filter.contains(RenderFilter::SHADOW));
        assert!(!packed.filter.contains(RenderFilter::COMPACT_SHADOW));
        assert!(packed
            .mask
            .contains(RenderFilter::SHADOW | RenderFilter::COMPACT_SHADOW | RenderFilter::SHADOW_NONE));
    }

    #[test]
    fn test_cube_face_zero_is_not_no_filter() {
        let filters = PassFilters {
            filter_cube_face: Some(0),
            ..Default::default()
        };
        assert_eq!(pack_filters(&filters).cube_face, CUBE_FACE_FILTER_PRESENT);

        let filters = PassFilters {
            filter_cube_face: Some(5),
            ..Default::default()
        };
        assert_eq!(pack_filters(&filters).cube_face, CUBE_FACE_FILTER_PRESENT | 5);
    }

    #[test]
    fn test_occlusion_and_reflection() {
        let filters = PassFilters {
            no_not_reflected: true,
            no_rendered: true,
            ..PassFilters::occlusion(3, 4)
        };
        let packed = pack_filters(&filters);
        assert!(packed.filter.contains(RenderFilter::OCCLUSION | RenderFilter::REFLECTED));
        assert!(packed.mask.contains(RenderFilter::RENDERED));
        assert!(!packed.filter.contains(RenderFilter::RENDERED));
    }

    #[test]
    fn test_force_double_sided_sets_modifier() {
        let filters = PassFilters {
            force_double_sided: true,
            skin_pipeline_modifier: PipelineModifier::CLIP_PLANE,
            ..Default::default()
        };
        let packed = pack_filters(&filters);
        assert_eq!(
            packed.modifier,
            PipelineModifier::CLIP_PLANE | PipelineModifier::DOUBLE_SIDED
        );
    }
}
