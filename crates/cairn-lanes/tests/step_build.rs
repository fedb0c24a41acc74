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

//! Full frames through the step build lane on the host device.

use cairn_core::lane::LaneError;
use cairn_core::math::{Aabb, Vec3};
use cairn_core::renderer::{ComputeSettings, PipelineDescriptor, RenderFilter, ShaderRef};
use cairn_data::pipeline::PipelineCache;
use cairn_data::pool::SharedResourcePool;
use cairn_data::world::{ComputeElement, ElementData, ElementGeometry, WorldComputeRegistry};
use cairn_infra::HostComputeDevice;
use cairn_lanes::{
    replay, ComputeRenderTask, CpuStepBuilder, CullView, DrawCommandSink, DrawStateCache,
    DrawStep, PassFilters, StepBuildLane, TaskState,
};
use std::sync::Arc;

#[derive(Clone, Copy)]
struct Mesh {
    filter: RenderFilter,
    vao: u32,
    spb_instance: u32,
}

struct SceneElement {
    position: f32,
    meshes: Vec<Mesh>,
}

impl SceneElement {
    fn new(position: f32, meshes: &[Mesh]) -> Arc<Self> {
        Arc::new(Self {
            position,
            meshes: meshes.to_vec(),
        })
    }
}

impl ComputeElement for SceneElement {
    fn element_data(&self) -> ElementData {
        ElementData {
            bounds: Aabb::from_center_half_extents(Vec3::splat(self.position), Vec3::ONE),
            geometry_count: self.meshes.len(),
            ..Default::default()
        }
    }

    fn write_geometries(&self, geometries: &mut [ElementGeometry]) {
        for (geometry, mesh) in geometries.iter_mut().zip(&self.meshes) {
            geometry.render_filter = mesh.filter;
            geometry.vao = mesh.vao;
            geometry.spb_instance = mesh.spb_instance;
            geometry.tucs = [1, 0, 0, 0];
        }
    }
}

fn solid(vao: u32, spb_instance: u32) -> Mesh {
    Mesh {
        filter: RenderFilter::RENDER | RenderFilter::SOLID,
        vao,
        spb_instance,
    }
}

fn transparent(vao: u32) -> Mesh {
    Mesh {
        filter: RenderFilter::RENDER,
        vao,
        spb_instance: 0,
    }
}

struct Frame {
    device: HostComputeDevice,
    world: WorldComputeRegistry,
    lane: StepBuildLane,
    builder: CpuStepBuilder,
    settings: ComputeSettings,
}

impl Frame {
    fn new(settings: ComputeSettings) -> Self {
        let view = CullView {
            bounds: Aabb::from_min_max(Vec3::splat(-100.0), Vec3::splat(100.0)),
            ..Default::default()
        };
        Self {
            device: HostComputeDevice::new(),
            world: WorldComputeRegistry::new(&settings),
            lane: StepBuildLane::new(&settings),
            builder: CpuStepBuilder::new(view),
            settings,
        }
    }

    /// Two solid meshes sharing a draw, one transparent mesh and an element
    /// outside the view.
    fn scene(settings: ComputeSettings) -> Self {
        let mut frame = Self::new(settings);
        frame
            .world
            .add_element(SceneElement::new(0.0, &[solid(1, 0), transparent(2)]));
        frame.world.add_element(SceneElement::new(5.0, &[solid(1, 1)]));
        frame
            .world
            .add_element(SceneElement::new(1000.0, &[solid(3, 2)]));
        frame
    }

    fn sync(&mut self) {
        self.lane
            .sync_world(&self.device, &mut self.world, &mut self.builder)
            .unwrap();
    }

    fn task(&self, passes: &[PassFilters], group: bool) -> ComputeRenderTask {
        let mut task = ComputeRenderTask::new("frame", &self.settings);
        task.set_group_sub_instances(group);
        task.prepare(&self.device, &self.world, passes.len(), |task, world| {
            for filters in passes {
                task.set_filters(*filters);
                task.end_pass(world);
            }
        })
        .unwrap();
        task
    }

    fn build(&mut self, tasks: &mut [ComputeRenderTask]) -> Result<u32, LaneError> {
        self.lane
            .build(&self.device, &self.world, &mut self.builder, tasks)
    }
}

fn vaos(task: &ComputeRenderTask) -> Vec<(u32, u32)> {
    task.steps()
        .iter()
        .map(|step| (step.vao, step.sub_instance_count))
        .collect()
}

#[test]
fn test_solid_pass_groups_shared_draws() {
    let mut frame = Frame::scene(ComputeSettings::default());
    frame.sync();
    let mut tasks = [frame.task(&[PassFilters::solid_geometry()], true)];

    assert_eq!(frame.build(&mut tasks).unwrap(), 1);
    assert_eq!(tasks[0].state(), TaskState::Ready);
    assert_eq!(vaos(&tasks[0]), vec![(1, 2)]);
    assert_eq!(tasks[0].steps()[0].spb_instance, 0);
    assert_eq!(tasks[0].steps()[0].tuc, 1);
    assert_eq!(frame.builder.last_stats().visible_elements, 2);
}

#[test]
fn test_ungrouped_pass_keeps_every_step() {
    let mut frame = Frame::scene(ComputeSettings::default());
    frame.sync();
    let mut tasks = [frame.task(&[PassFilters::solid_geometry()], false)];

    frame.build(&mut tasks).unwrap();
    assert_eq!(vaos(&tasks[0]), vec![(1, 1), (1, 1)]);
}

#[test]
fn test_passes_accumulate_into_one_list() {
    let mut frame = Frame::scene(ComputeSettings::default());
    frame.sync();
    let transparent_pass = PassFilters {
        filter_solid: true,
        solid: false,
        ..Default::default()
    };
    let mut tasks = [frame.task(&[PassFilters::solid_geometry(), transparent_pass], false)];

    frame.build(&mut tasks).unwrap();
    assert_eq!(vaos(&tasks[0]), vec![(1, 1), (1, 1), (2, 1)]);
}

#[test]
fn test_small_step_buffer_is_rebuilt() {
    let settings = ComputeSettings {
        initial_step_capacity: 1,
        step_growth_slack: 0,
        ..Default::default()
    };
    let mut frame = Frame::new(settings);
    for i in 0..5 {
        frame
            .world
            .add_element(SceneElement::new(i as f32, &[solid(10 + i, 0)]));
    }
    frame.sync();
    let mut tasks = [frame.task(&[PassFilters::solid_geometry()], false)];

    assert_eq!(frame.build(&mut tasks).unwrap(), 2);
    assert_eq!(tasks[0].step_buffer().capacity(), 5);
    let expected: Vec<(u32, u32)> = (10..15).map(|vao| (vao, 1)).collect();
    assert_eq!(vaos(&tasks[0]), expected);
}

#[test]
fn test_retry_limit_is_reported() {
    let settings = ComputeSettings {
        initial_step_capacity: 1,
        step_growth_slack: 0,
        max_build_attempts: 1,
        ..Default::default()
    };
    let mut frame = Frame::new(settings);
    for i in 0..5 {
        frame
            .world
            .add_element(SceneElement::new(i as f32, &[solid(i, 0)]));
    }
    frame.sync();
    let mut tasks = [frame.task(&[PassFilters::solid_geometry()], false)];

    match frame.build(&mut tasks) {
        Err(LaneError::RetryLimitExceeded {
            task,
            attempts,
            requested_capacity,
        }) => {
            assert_eq!(task, "frame");
            assert_eq!(attempts, 1);
            assert_eq!(requested_capacity, 5);
        }
        other => panic!("expected a retry limit error, got {other:?}"),
    }
    assert_eq!(tasks[0].state(), TaskState::Building);
}

#[test]
fn test_removed_element_disappears_next_frame() {
    let mut frame = Frame::new(ComputeSettings::default());
    let first = frame
        .world
        .add_element(SceneElement::new(0.0, &[solid(1, 0)]));
    frame.world.add_element(SceneElement::new(1.0, &[solid(2, 0)]));
    frame.world.add_element(SceneElement::new(2.0, &[solid(3, 0)]));
    frame.sync();

    frame.world.remove_element(first);
    frame.sync();
    let mut tasks = [frame.task(&[PassFilters::solid_geometry()], true)];
    frame.build(&mut tasks).unwrap();

    assert_eq!(vaos(&tasks[0]), vec![(2, 1), (3, 1)]);
}

#[derive(Default)]
struct CountingSink {
    draws: Vec<u32>,
}

impl DrawCommandSink for CountingSink {
    fn bind_pipeline(&mut self, _pipeline: &cairn_data::pipeline::Pipeline) {}

    fn bind_texture_state(&mut self, _index: u32, _state: &cairn_data::pool::TextureStateRecord) {}

    fn bind_vao(&mut self, _index: u32, _vao: &cairn_data::pool::VaoRecord) {}

    fn draw(&mut self, _instance: &cairn_data::pool::InstanceRecord, step: &DrawStep) {
        self.draws.push(step.sub_instance_count);
    }
}

#[test]
fn test_built_steps_replay_through_the_state_cache() {
    let mut frame = Frame::scene(ComputeSettings::default());
    frame.sync();
    let mut tasks = [frame.task(&[PassFilters::solid_geometry()], true)];
    frame.build(&mut tasks).unwrap();

    let mut pool = SharedResourcePool::new(100);
    for _ in 0..4 {
        pool.acquire_texture();
        pool.acquire_vao();
    }
    pool.acquire_instance();
    let pipelines = PipelineCache::new();
    pipelines
        .get_or_create(&PipelineDescriptor::graphics(ShaderRef::new("solid")), true)
        .unwrap();

    let mut steps: Vec<DrawStep> = Vec::new();
    tasks[0].render(&mut steps);

    let mut sink = CountingSink::default();
    let stats = replay(
        &mut DrawStateCache::default(),
        &steps,
        &pool,
        &pipelines,
        &mut sink,
    );
    assert_eq!(stats.draws, 1);
    assert_eq!(stats.skipped, 0);
    assert_eq!(sink.draws, vec![2]);
}
