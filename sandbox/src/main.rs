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

// Cairn Sandbox
// Drives a few frames of the scene compute pipeline on an animated scene.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use cairn_core::math::{Aabb, Vec3};
use cairn_core::renderer::{
    ComputeDevice, ComputeSettings, PipelineDescriptor, RenderFilter, ShaderRef, SkinPipelineType,
};
use cairn_data::config::load_settings;
use cairn_data::pipeline::{Pipeline, PipelineCache};
use cairn_data::pool::{InstanceRecord, SharedResourcePool, TextureStateRecord, VaoRecord};
use cairn_data::world::{
    ComputeElement, ElementData, ElementGeometry, ElementHandle, WorldComputeRegistry,
};
use cairn_infra::{HostComputeDevice, WgpuComputeContext, WgpuComputeDevice};
use cairn_lanes::{
    replay, ComputeRenderTask, CpuStepBuilder, CullView, DrawCommandSink, DrawStateCache,
    DrawStep, PassFilters, StepBuildLane,
};

const FRAME_COUNT: usize = 8;
const ORBITER_COUNT: u32 = 12;
const PIPELINE_TYPES: u32 = 6;

/// A box circling the origin, with a detailed and a coarse LOD.
struct Orbiter {
    angle: Mutex<f32>,
    radius: f32,
    vao: u32,
}

impl Orbiter {
    fn new(index: u32) -> Arc<Self> {
        Arc::new(Self {
            angle: Mutex::new(index as f32 * 0.5),
            radius: 10.0 + 6.0 * index as f32,
            vao: index * 2,
        })
    }

    fn advance(&self, step: f32) {
        let mut angle = self.angle.lock().unwrap_or_else(|e| e.into_inner());
        *angle += step;
    }

    fn center(&self) -> Vec3 {
        let angle = *self.angle.lock().unwrap_or_else(|e| e.into_inner());
        Vec3::new(angle.cos() * self.radius, 0.0, angle.sin() * self.radius)
    }
}

impl ComputeElement for Orbiter {
    fn element_data(&self) -> ElementData {
        ElementData {
            bounds: Aabb::from_center_half_extents(self.center(), Vec3::splat(1.5)),
            lod_factors: [40.0, 0.0, 0.0, 0.0],
            highest_lod: 1,
            geometry_count: 2,
            ..Default::default()
        }
    }

    fn write_geometries(&self, geometries: &mut [ElementGeometry]) {
        for (lod, geometry) in geometries.iter_mut().enumerate() {
            geometry.lod = lod as u32;
            geometry.render_filter =
                RenderFilter::RENDER | RenderFilter::SOLID | RenderFilter::SHADOW;
            geometry.vao = self.vao + lod as u32;
            geometry.tucs = [0, 1, 2, 2];
        }
    }
}

/// Counts the commands a frame would record.
#[derive(Debug, Default)]
struct CommandCounter {
    binds: usize,
    draws: usize,
    sub_instances: usize,
}

impl DrawCommandSink for CommandCounter {
    fn bind_pipeline(&mut self, pipeline: &Pipeline) {
        log::trace!("bind pipeline '{}'", pipeline.descriptor().shader.name);
        self.binds += 1;
    }

    fn bind_texture_state(&mut self, _index: u32, _state: &TextureStateRecord) {
        self.binds += 1;
    }

    fn bind_vao(&mut self, _index: u32, _vao: &VaoRecord) {
        self.binds += 1;
    }

    fn draw(&mut self, _instance: &InstanceRecord, step: &DrawStep) {
        self.draws += 1;
        self.sub_instances += step.sub_instance_count as usize;
    }
}

fn create_device() -> Arc<dyn ComputeDevice> {
    match WgpuComputeContext::new_blocking() {
        Ok(context) => {
            log::info!(
                "Using GPU adapter '{}' ({:?})",
                context.adapter_name,
                context.adapter_backend
            );
            Arc::new(WgpuComputeDevice::new(Arc::new(context)))
        }
        Err(e) => {
            log::warn!("No GPU adapter available ({e:#}), falling back to the host device");
            Arc::new(HostComputeDevice::new())
        }
    }
}

/// Creates every skin pipeline of base 0 so step pipeline indices resolve.
fn create_pipelines() -> Result<PipelineCache> {
    let cache = PipelineCache::new();
    for pipeline_type in 0..PIPELINE_TYPES {
        for modifier in 0..SkinPipelineType::MODIFIER_COUNT {
            let shader = ShaderRef::new(format!("skin_{pipeline_type}_{modifier}"));
            cache.get_or_create(&PipelineDescriptor::graphics(shader), true)?;
        }
    }
    Ok(cache)
}

fn create_pool(settings: &ComputeSettings, vao_count: u32) -> SharedResourcePool {
    let mut pool = SharedResourcePool::new(settings.pool_log_interval);
    for _ in 0..3 {
        pool.acquire_texture();
    }
    for _ in 0..vao_count {
        pool.acquire_vao();
    }
    pool.acquire_instance();
    pool
}

fn prepare_tasks(
    device: &dyn ComputeDevice,
    world: &WorldComputeRegistry,
    tasks: &mut [ComputeRenderTask; 2],
) -> Result<()> {
    let [main, shadow] = tasks;
    main.prepare(device, world, 1, |task, world| {
        task.set_filters(PassFilters::solid_geometry());
        task.end_pass(world);
    })?;
    shadow.prepare(device, world, 1, |task, world| {
        task.set_filters(PassFilters::shadow_casters(SkinPipelineType::ShadowProjection));
        task.end_pass(world);
    })?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = match std::env::args().nth(1) {
        Some(path) => load_settings(path)?,
        None => ComputeSettings::default(),
    };
    log::info!("Starting sandbox with {settings:?}");

    let device = create_device();
    let device = device.as_ref();
    let pipelines = create_pipelines()?;
    let pool = create_pool(&settings, (ORBITER_COUNT + 1) * 2);

    let mut world = WorldComputeRegistry::new(&settings);
    let mut orbiters: Vec<(Arc<Orbiter>, ElementHandle)> = (0..ORBITER_COUNT)
        .map(|i| {
            let orbiter = Orbiter::new(i);
            let handle = world.add_element(orbiter.clone());
            (orbiter, handle)
        })
        .collect();

    let lane = StepBuildLane::new(&settings);
    let mut builder = CpuStepBuilder::new(CullView {
        position: Vec3::new(0.0, 5.0, 0.0),
        bounds: Aabb::from_min_max(Vec3::splat(-60.0), Vec3::splat(60.0)),
        ..Default::default()
    });
    let mut tasks = [
        ComputeRenderTask::new("main", &settings),
        ComputeRenderTask::new("shadow", &settings),
    ];
    let mut state_cache = DrawStateCache::default();

    for frame in 0..FRAME_COUNT {
        for (orbiter, handle) in orbiters.iter().step_by(2) {
            orbiter.advance(0.3);
            world.update_element(*handle);
        }
        if frame == 3 {
            let orbiter = Orbiter::new(ORBITER_COUNT);
            let handle = world.add_element(orbiter.clone());
            orbiters.push((orbiter, handle));
        }
        if frame == 5 {
            let (_, handle) = orbiters.remove(0);
            world.remove_element(handle);
        }

        let report = lane.sync_world(device, &mut world, &mut builder)?;
        prepare_tasks(device, &world, &mut tasks)?;
        let attempts = lane.build(device, &world, &mut builder, &mut tasks)?;

        for task in &tasks {
            let mut steps: Vec<DrawStep> = Vec::new();
            task.render(&mut steps);
            let mut counter = CommandCounter::default();
            state_cache.reset();
            let stats = replay(&mut state_cache, &steps, &pool, &pipelines, &mut counter);
            log::info!(
                "frame {frame} '{}': {} draws ({} sub-instances), {} binds, {} skipped",
                task.label(),
                counter.draws,
                counter.sub_instances,
                counter.binds,
                stats.skipped
            );
        }
        log::info!(
            "frame {frame}: {} elements, sync {:?}/{:?}, {attempts} build round(s)",
            world.element_count(),
            report.elements,
            report.geometries
        );
    }

    for task in &mut tasks {
        task.destroy_buffers(device)?;
    }
    world.destroy_buffers(device)?;
    log::info!("Sandbox finished");
    Ok(())
}
