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

//! Host implementation of the compute stages.
//!
//! Runs the scatter, cull, build and sort kernels against the device buffers
//! on the CPU. It reads and writes exactly the rows the GPU kernels would, so
//! it doubles as the reference the shaders are checked against.

use super::sort::{run_schedule, sort_schedule, work_group_count};
use super::step_build_lane::ComputeStages;
use super::task::ComputeRenderTask;
use cairn_core::math::{Aabb, Vec3};
use cairn_core::renderer::{
    ComputeDevice, ElementFlags, ElementKind, GpuDrawStep, GpuElement, GpuElementGeometry,
    GpuPassConfig, GpuStepCounters, PipelineModifier, RenderFilter, ResourceError,
    SkinPipelineType, SpecialFlags, CUBE_FACE_FILTER_PRESENT, NO_PIPELINE,
};
use cairn_data::world::WorldComputeRegistry;

/// `cull_result` bit set on visible elements.
pub const CULL_VISIBLE: u32 = 1;

/// Shift of the six cube face bits inside `cull_result`.
pub const CULL_FACE_SHIFT: u32 = 1;

/// What the culling stage tests elements against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CullView {
    /// Viewer position, used for LOD selection and cube faces.
    pub position: Vec3,
    /// Visible volume.
    pub bounds: Aabb,
    /// Layers the view renders.
    pub layer_mask: u64,
    /// Multiplies every element LOD distance.
    pub lod_distance_scale: f32,
}

impl CullView {
    /// A view at `position` that sees everything.
    pub fn unbounded(position: Vec3) -> Self {
        Self {
            position,
            bounds: Aabb::from_min_max(Vec3::splat(-f32::MAX), Vec3::splat(f32::MAX)),
            layer_mask: u64::MAX,
            lod_distance_scale: 1.0,
        }
    }
}

impl Default for CullView {
    fn default() -> Self {
        Self::unbounded(Vec3::ZERO)
    }
}

/// Counters of the last [`CpuStepBuilder::build_steps`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Elements that passed culling.
    pub visible_elements: usize,
    /// Steps emitted before grouping.
    pub steps: usize,
    /// Steps actually written to the step buffer.
    pub written: usize,
}

/// Runs the compute stages on the CPU.
#[derive(Debug, Clone, Default)]
pub struct CpuStepBuilder {
    view: CullView,
    stats: BuildStats,
}

impl CpuStepBuilder {
    /// Creates a builder culling against `view`.
    pub fn new(view: CullView) -> Self {
        Self {
            view,
            stats: BuildStats::default(),
        }
    }

    /// Current view.
    pub fn view(&self) -> &CullView {
        &self.view
    }

    /// Replaces the view used by the next build.
    pub fn set_view(&mut self, view: CullView) {
        self.view = view;
    }

    /// Counters of the last build.
    pub fn last_stats(&self) -> BuildStats {
        self.stats
    }

    fn cull(&self, element: &mut GpuElement) {
        element.cull_result = 0;
        element.lod_index = 0;

        let layer_mask = element.layer_mask[0] as u64 | (element.layer_mask[1] as u64) << 32;
        if layer_mask & self.view.layer_mask == 0 || element.geometry_count == 0 {
            return;
        }

        let bounds = Aabb::from_min_max(
            Vec3::from_array(element.min_extend),
            Vec3::from_array(element.max_extend),
        );
        let no_culling = element.flags & ElementFlags::NO_CULLING.bits() != 0;
        if !no_culling && !self.view.bounds.intersects_aabb(&bounds) {
            return;
        }

        let distance = bounds.center().distance(self.view.position);
        let lod = element
            .lod_factors
            .iter()
            .filter(|&&factor| factor > 0.0 && distance >= factor * self.view.lod_distance_scale)
            .count() as u32;
        element.lod_index = lod.min(element.highest_lod);
        element.cull_result = CULL_VISIBLE | cube_faces(&bounds, self.view.position) << CULL_FACE_SHIFT;
    }
}

/// Cube faces around `position` whose half-space the box reaches, in
/// +X, -X, +Y, -Y, +Z, -Z order.
fn cube_faces(bounds: &Aabb, position: Vec3) -> u32 {
    let touched = [
        bounds.max.x > position.x,
        bounds.min.x < position.x,
        bounds.max.y > position.y,
        bounds.min.y < position.y,
        bounds.max.z > position.z,
        bounds.min.z < position.z,
    ];
    let mut mask = 0;
    for (face, hit) in touched.into_iter().enumerate() {
        if hit {
            mask |= 1 << face;
        }
    }
    mask
}

fn accepts(config: &GpuPassConfig, element: &GpuElement, geometry: &GpuElementGeometry, row: usize) -> bool {
    if element.cull_result & CULL_VISIBLE == 0 {
        return false;
    }
    let first = element.first_geometry as usize;
    if row < first || row >= first + element.geometry_count as usize {
        return false;
    }
    if geometry.lod != element.lod_index || geometry.render_filter & config.mask != config.filter {
        return false;
    }
    if config.filter_cube_face & CUBE_FACE_FILTER_PRESENT != 0 {
        let face = config.filter_cube_face & !CUBE_FACE_FILTER_PRESENT;
        if element.cull_result & 1 << (CULL_FACE_SHIFT + face) == 0 {
            return false;
        }
    }
    ElementKind::from_flags_word(element.flags)
        .is_some_and(|kind| config.skin_pipeline_lists & kind.pipeline_list().bit() != 0)
}

fn make_step(config: &GpuPassConfig, element: &GpuElement, geometry: &GpuElementGeometry) -> GpuDrawStep {
    let pipeline_type = SkinPipelineType::from_raw(config.skin_pipeline_type).unwrap_or_default();
    let occlusion = config.filter & RenderFilter::OCCLUSION.bits() != 0;
    let double_sided = geometry.render_filter & RenderFilter::DOUBLE_SIDED.bits() != 0;

    let mut modifier = PipelineModifier::from_bits(config.skin_pipeline_modifier);
    if double_sided {
        modifier |= PipelineModifier::DOUBLE_SIDED;
    }

    let pipeline = if occlusion {
        if double_sided {
            config.pipeline_double_sided
        } else {
            config.pipeline_single_sided
        }
    } else {
        // An unset base stays unset so the step is dropped.
        geometry
            .pipeline_base
            .checked_add(pipeline_type as u32 * SkinPipelineType::MODIFIER_COUNT + modifier.bits())
            .unwrap_or(NO_PIPELINE)
    };

    let mut special = SpecialFlags::EMPTY;
    special.set(
        SpecialFlags::DOUBLE_SIDED,
        modifier.contains(PipelineModifier::DOUBLE_SIDED),
    );
    special.set(
        SpecialFlags::STATIC,
        element.flags & ElementFlags::STATIC.bits() != 0,
    );
    special.set(SpecialFlags::OCCLUSION, occlusion);

    GpuDrawStep {
        pipeline,
        tuc: geometry.tucs[pipeline_type.tuc_slot()],
        vao: geometry.vao,
        instance: geometry.instance,
        spb_instance: geometry.spb_instance,
        special_flags: special.bits(),
        sub_instance_count: 1,
        _pad: 0,
    }
}

/// Sort key of a step. Padding entries sort last.
type SortKey = (bool, [u32; 6]);

fn sort_key(step: &GpuDrawStep) -> SortKey {
    (
        false,
        [
            step.pipeline,
            step.tuc,
            step.vao,
            step.instance,
            step.spb_instance,
            step.special_flags,
        ],
    )
}

fn sort_steps(steps: &mut Vec<GpuDrawStep>) {
    let count = steps.len() as u32;
    let schedule = sort_schedule(count);
    if schedule.is_empty() {
        return;
    }
    let mut keys: Vec<SortKey> = steps.iter().map(sort_key).collect();
    keys.resize(count.next_power_of_two() as usize, (true, [u32::MAX; 6]));
    run_schedule(&mut keys, &schedule);

    steps.clear();
    steps.extend(keys.into_iter().filter(|(padding, _)| !padding).map(
        |(_, [pipeline, tuc, vao, instance, spb_instance, special_flags])| GpuDrawStep {
            pipeline,
            tuc,
            vao,
            instance,
            spb_instance,
            special_flags,
            sub_instance_count: 1,
            _pad: 0,
        },
    ));
}

/// Stores the run length of equal `(pipeline, tuc, vao, instance)` steps in
/// the first step of each run.
fn group_sub_instances(steps: &mut [GpuDrawStep]) {
    let same_draw = |a: &GpuDrawStep, b: &GpuDrawStep| {
        (a.pipeline, a.tuc, a.vao, a.instance) == (b.pipeline, b.tuc, b.vao, b.instance)
    };
    let mut leader = 0;
    while leader < steps.len() {
        let run = steps[leader..]
            .iter()
            .take_while(|step| same_draw(*step, &steps[leader]))
            .count();
        steps[leader].sub_instance_count = run as u32;
        leader += run;
    }
}

impl ComputeStages for CpuStepBuilder {
    fn update_elements(
        &mut self,
        device: &dyn ComputeDevice,
        world: &WorldComputeRegistry,
    ) -> Result<(), ResourceError> {
        let rows = world
            .update_element_buffer()
            .read(device, 0, world.update_element_count())?;
        for row in &rows {
            world
                .element_buffer()
                .write(device, row.update_index as usize, std::slice::from_ref(row))?;
        }
        Ok(())
    }

    fn clear_geometries(
        &mut self,
        device: &dyn ComputeDevice,
        world: &WorldComputeRegistry,
    ) -> Result<(), ResourceError> {
        let indices = world
            .clear_geometry_buffer()
            .read(device, 0, world.clear_geometry_count())?;
        for index in indices {
            world.geometry_buffer().clear_rows(device, index as usize, 1)?;
        }
        Ok(())
    }

    fn update_geometries(
        &mut self,
        device: &dyn ComputeDevice,
        world: &WorldComputeRegistry,
    ) -> Result<(), ResourceError> {
        let count = world.update_geometry_count();
        let rows = world.update_geometry_buffer().read(device, 0, count)?;
        let indices = world.update_geometry_index_buffer().read(device, 0, count)?;
        for (row, index) in rows.iter().zip(indices) {
            world
                .geometry_buffer()
                .write(device, index as usize, std::slice::from_ref(row))?;
        }
        Ok(())
    }

    fn build_steps(
        &mut self,
        device: &dyn ComputeDevice,
        world: &WorldComputeRegistry,
        task: &ComputeRenderTask,
    ) -> Result<(), ResourceError> {
        let configs = task.config_buffer().read(device, 0, task.pass_count())?;
        let mut elements = world
            .element_buffer()
            .read(device, 0, world.element_count())?;
        for element in &mut elements {
            self.cull(element);
        }
        world.element_buffer().write(device, 0, &elements)?;

        let geometry_rows = configs
            .iter()
            .map(|config| config.element_geometry_count as usize)
            .max()
            .unwrap_or(0)
            .min(world.geometry_buffer().capacity());
        let geometries = world.geometry_buffer().read(device, 0, geometry_rows)?;

        let mut steps = Vec::new();
        for config in &configs {
            let rows = geometries
                .iter()
                .enumerate()
                .take(config.element_geometry_count as usize);
            for (row, geometry) in rows {
                let Some(element) = elements.get(geometry.element as usize) else {
                    continue;
                };
                if !accepts(config, element, geometry, row) {
                    continue;
                }
                let step = make_step(config, element, geometry);
                if step.pipeline != NO_PIPELINE {
                    steps.push(step);
                }
            }
        }

        sort_steps(&mut steps);
        if task.skips_sub_instance_groups() {
            group_sub_instances(&mut steps);
        }

        let written = steps.len().min(task.step_buffer().capacity());
        task.step_buffer().write(device, 0, &steps[..written])?;
        let counters = GpuStepCounters {
            work_group_size: [work_group_count(steps.len() as u32), 1, 1],
            count: steps.len() as u32,
        };
        task.counter_buffer().write(device, 0, &[counters])?;

        self.stats = BuildStats {
            visible_elements: elements
                .iter()
                .filter(|element| element.cull_result & CULL_VISIBLE != 0)
                .count(),
            steps: steps.len(),
            written,
        };
        log::trace!(
            "CpuStepBuilder: task '{}' built {} steps ({} written)",
            task.label(),
            steps.len(),
            written
        );
        Ok(())
    }
}
