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

//! A GPU-built list of draw steps for one or more render passes.
//!
//! The task publishes one configuration row per pass; the step-building stages
//! cull the world against it and append draw steps to the step buffer, counting
//! them in an atomic counter. The true step count is only known after the
//! build ran, so the step buffer may turn out too small: the build then stops
//! writing, [`ComputeRenderTask::read_back_steps`] grows the buffer and the
//! build is dispatched again.
//!
//! ```text
//! Initial -> Preparing -> Building -> Ready
//!                            ^  |
//!                            +--+ NeedsResize
//! ```

use super::config::{pack_filters, PassFilters};
use super::step::{DrawStep, DrawStepSink};
use cairn_core::renderer::{
    BufferUsage, ComputeDevice, ComputeSettings, GpuBlock, GpuDrawStep, GpuPassConfig,
    GpuStepCounters, ResourceError,
};
use cairn_data::world::WorldComputeRegistry;

/// Maximum number of passes of one task, exclusive.
pub const MAX_PASS_COUNT: usize = 8;

/// Lifecycle state of a [`ComputeRenderTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Never prepared.
    Initial,
    /// Between `begin_prepare` and `end_prepare`.
    Preparing,
    /// Configuration published, waiting for the build and read-back.
    Building,
    /// Steps read back and ready to render.
    Ready,
}

/// Outcome of [`ComputeRenderTask::read_back_steps`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadBack {
    /// Nothing visible this frame.
    Empty,
    /// This many steps were read back.
    Success(usize),
    /// The step buffer was too small and now holds this many rows; the build
    /// has to be dispatched again.
    NeedsResize(usize),
}

/// Builds and holds the draw steps of a set of passes.
#[derive(Debug)]
pub struct ComputeRenderTask {
    label: String,
    state: TaskState,
    initial_step_capacity: usize,
    step_growth_slack: usize,

    filters: PassFilters,
    pass_count: usize,
    passes: Vec<GpuPassConfig>,

    config: GpuBlock<GpuPassConfig>,
    steps: GpuBlock<GpuDrawStep>,
    counters: GpuBlock<GpuStepCounters>,

    group_sub_instances: bool,
    skip_sub_instance_groups: bool,
    cpu_steps: Vec<DrawStep>,
}

impl ComputeRenderTask {
    /// Creates a task. GPU buffers are created on the first prepare.
    pub fn new(label: impl Into<String>, settings: &ComputeSettings) -> Self {
        Self {
            label: label.into(),
            state: TaskState::Initial,
            initial_step_capacity: settings.initial_step_capacity,
            step_growth_slack: settings.step_growth_slack,
            filters: PassFilters::default(),
            pass_count: 0,
            passes: Vec::with_capacity(MAX_PASS_COUNT),
            config: GpuBlock::new("Render task pass config", BufferUsage::STORAGE_READBACK),
            steps: GpuBlock::new("Render task steps", BufferUsage::STORAGE_READBACK),
            counters: GpuBlock::new(
                "Render task counters",
                BufferUsage::STORAGE_READBACK.with(BufferUsage::INDIRECT),
            ),
            group_sub_instances: true,
            skip_sub_instance_groups: false,
            cpu_steps: Vec::new(),
        }
    }

    /// Debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Filters used by the next [`end_pass`](Self::end_pass).
    pub fn filters(&self) -> &PassFilters {
        &self.filters
    }

    /// Mutable access to the filters of the next pass.
    pub fn filters_mut(&mut self) -> &mut PassFilters {
        &mut self.filters
    }

    /// Replaces the filters of the next pass.
    pub fn set_filters(&mut self, filters: PassFilters) {
        self.filters = filters;
    }

    /// Whether the build merges runs of equal steps into sub-instance groups.
    pub fn group_sub_instances(&self) -> bool {
        self.group_sub_instances
    }

    /// Enables or disables sub-instance grouping for the next prepare.
    pub fn set_group_sub_instances(&mut self, group: bool) {
        self.group_sub_instances = group;
    }

    /// Returns `true` while the published build groups sub-instances, so the
    /// read-back has to skip group companions.
    pub fn skips_sub_instance_groups(&self) -> bool {
        self.skip_sub_instance_groups
    }

    /// Number of passes of the current prepare.
    pub fn pass_count(&self) -> usize {
        self.pass_count
    }

    /// Pass configuration rows.
    pub fn config_buffer(&self) -> &GpuBlock<GpuPassConfig> {
        &self.config
    }

    /// Step rows written by the build.
    pub fn step_buffer(&self) -> &GpuBlock<GpuDrawStep> {
        &self.steps
    }

    /// The counters row incremented by the build.
    pub fn counter_buffer(&self) -> &GpuBlock<GpuStepCounters> {
        &self.counters
    }

    /// Steps read back by the last successful read-back.
    pub fn steps(&self) -> &[DrawStep] {
        &self.cpu_steps
    }

    /// Starts configuring `pass_count` passes.
    ///
    /// # Panics
    /// If the task is already preparing or `pass_count` is not in `1..8`.
    pub fn begin_prepare(
        &mut self,
        device: &dyn ComputeDevice,
        pass_count: usize,
    ) -> Result<(), ResourceError> {
        assert!(
            self.state != TaskState::Preparing,
            "render task '{}' is already preparing",
            self.label
        );
        assert!(
            (1..MAX_PASS_COUNT).contains(&pass_count),
            "render task pass count {pass_count} out of range 1..{MAX_PASS_COUNT}"
        );

        self.config.ensure_capacity(device, pass_count)?;
        self.passes.clear();
        self.cpu_steps.clear();
        self.pass_count = pass_count;
        self.state = TaskState::Preparing;
        Ok(())
    }

    /// Records the configuration of the next pass from the current filters.
    ///
    /// # Panics
    /// If the task is not preparing or every pass has already been recorded.
    pub fn end_pass(&mut self, world: &WorldComputeRegistry) {
        assert_eq!(
            self.state,
            TaskState::Preparing,
            "end_pass outside of prepare"
        );
        assert!(
            self.passes.len() < self.pass_count,
            "render task '{}' has only {} passes",
            self.label,
            self.pass_count
        );

        let packed = pack_filters(&self.filters);
        self.passes.push(GpuPassConfig {
            element_geometry_count: world.element_geometry_count() as u32,
            filter: packed.filter.bits(),
            mask: packed.mask.bits(),
            filter_cube_face: packed.cube_face,
            skin_pipeline_lists: self.filters.skin_pipeline_lists,
            skin_pipeline_type: self.filters.skin_pipeline_type as u32,
            skin_pipeline_modifier: packed.modifier.bits(),
            pipeline_double_sided: self.filters.pipeline_double_sided,
            pipeline_single_sided: self.filters.pipeline_single_sided,
            _pad: [0; 3],
        });
    }

    /// Publishes the pass configuration and resets the step counter.
    ///
    /// # Panics
    /// If the task is not preparing, a pass was not recorded, or the world has
    /// no geometry rows.
    pub fn end_prepare(
        &mut self,
        device: &dyn ComputeDevice,
        world: &WorldComputeRegistry,
    ) -> Result<(), ResourceError> {
        assert_eq!(
            self.state,
            TaskState::Preparing,
            "end_prepare outside of prepare"
        );
        assert_eq!(
            self.passes.len(),
            self.pass_count,
            "render task '{}' ended prepare with passes missing",
            self.label
        );
        assert!(
            world.element_geometry_count() > 0,
            "render task '{}' prepared on a world without geometries",
            self.label
        );

        self.config.write(device, 0, &self.passes)?;
        self.steps.ensure_capacity(device, self.initial_step_capacity)?;
        self.counters.ensure_capacity(device, 1)?;
        self.counters.clear(device)?;

        self.skip_sub_instance_groups = self.group_sub_instances;
        self.state = TaskState::Building;
        log::trace!(
            "ComputeRenderTask '{}': prepared {} passes",
            self.label,
            self.pass_count
        );
        Ok(())
    }

    /// Runs `begin_prepare`, lets `configure` record the passes and runs
    /// `end_prepare`.
    pub fn prepare<F>(
        &mut self,
        device: &dyn ComputeDevice,
        world: &WorldComputeRegistry,
        pass_count: usize,
        configure: F,
    ) -> Result<(), ResourceError>
    where
        F: FnOnce(&mut Self, &WorldComputeRegistry),
    {
        self.begin_prepare(device, pass_count)?;
        configure(self, world);
        self.end_prepare(device, world)
    }

    /// Reads the built steps back.
    ///
    /// # Panics
    /// If the task is not building.
    pub fn read_back_steps(&mut self, device: &dyn ComputeDevice) -> Result<ReadBack, ResourceError> {
        assert_eq!(
            self.state,
            TaskState::Building,
            "read_back_steps while not building"
        );

        let count = self
            .counters
            .read(device, 0, 1)?
            .first()
            .map_or(0, |counters| counters.count as usize);

        if count == 0 {
            self.cpu_steps.clear();
            self.skip_sub_instance_groups = false;
            self.state = TaskState::Ready;
            return Ok(ReadBack::Empty);
        }

        if count > self.steps.capacity() {
            let capacity = count + self.step_growth_slack;
            log::debug!(
                "ComputeRenderTask '{}': {count} steps exceed capacity {}, growing to {capacity}",
                self.label,
                self.steps.capacity()
            );
            self.steps.set_capacity(device, capacity)?;
            self.counters.clear(device)?;
            return Ok(ReadBack::NeedsResize(capacity));
        }

        let rows = self.steps.read(device, 0, count)?;
        self.cpu_steps.clear();
        let mut cursor = 0;
        while cursor < rows.len() {
            let row = &rows[cursor];
            self.cpu_steps.push(DrawStep::from(row));
            cursor += if self.skip_sub_instance_groups {
                row.sub_instance_count.max(1) as usize
            } else {
                1
            };
        }

        self.skip_sub_instance_groups = false;
        self.state = TaskState::Ready;
        Ok(ReadBack::Success(self.cpu_steps.len()))
    }

    /// Hands the steps to `sink` in draw order.
    ///
    /// # Panics
    /// If the task is not ready.
    pub fn render(&self, sink: &mut dyn DrawStepSink) {
        assert_eq!(
            self.state,
            TaskState::Ready,
            "render task '{}' rendered before it is ready",
            self.label
        );
        sink.draw_steps(&self.cpu_steps);
    }

    /// Releases the GPU buffers and returns to [`TaskState::Initial`].
    pub fn destroy_buffers(&mut self, device: &dyn ComputeDevice) -> Result<(), ResourceError> {
        self.config.destroy(device)?;
        self.steps.destroy(device)?;
        self.counters.destroy(device)?;
        self.cpu_steps.clear();
        self.state = TaskState::Initial;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::renderer::api::{BufferDescriptor, BufferId};
    use cairn_core::renderer::{RenderFilter, SpecialFlags};
    use cairn_data::world::{ComputeElement, ElementData, ElementGeometry};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct MockComputeDevice {
        buffers: Mutex<HashMap<BufferId, Vec<u8>>>,
        next_id: AtomicUsize,
    }

    impl ComputeDevice for MockComputeDevice {
        fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
            let id = BufferId(self.next_id.fetch_add(1, Ordering::Relaxed));
            self.buffers
                .lock()
                .unwrap()
                .insert(id, vec![0; descriptor.size as usize]);
            Ok(id)
        }

        fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
            self.buffers
                .lock()
                .unwrap()
                .remove(&id)
                .map(|_| ())
                .ok_or(ResourceError::NotFound)
        }

        fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
            let mut buffers = self.buffers.lock().unwrap();
            let bytes = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
            bytes[offset as usize..offset as usize + data.len()].copy_from_slice(data);
            Ok(())
        }

        fn clear_buffer(
            &self,
            id: BufferId,
            offset: u64,
            size: Option<u64>,
        ) -> Result<(), ResourceError> {
            let mut buffers = self.buffers.lock().unwrap();
            let bytes = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
            let end = size.map_or(bytes.len(), |size| (offset + size) as usize);
            bytes[offset as usize..end].fill(0);
            Ok(())
        }

        fn read_buffer(&self, id: BufferId, offset: u64, size: u64) -> Result<Vec<u8>, ResourceError> {
            let buffers = self.buffers.lock().unwrap();
            let bytes = buffers.get(&id).ok_or(ResourceError::NotFound)?;
            Ok(bytes[offset as usize..(offset + size) as usize].to_vec())
        }

        fn buffer_size(&self, id: BufferId) -> Option<u64> {
            self.buffers
                .lock()
                .unwrap()
                .get(&id)
                .map(|bytes| bytes.len() as u64)
        }
    }

    struct OneGeometry;

    impl ComputeElement for OneGeometry {
        fn element_data(&self) -> ElementData {
            ElementData {
                geometry_count: 1,
                ..Default::default()
            }
        }

        fn write_geometries(&self, geometries: &mut [ElementGeometry]) {
            geometries[0].render_filter = RenderFilter::RENDER;
        }
    }

    fn world(device: &MockComputeDevice) -> WorldComputeRegistry {
        let mut world = WorldComputeRegistry::new(&ComputeSettings::default());
        world.add_element(Arc::new(OneGeometry));
        world.prepare(device).unwrap();
        world
    }

    fn small_task() -> ComputeRenderTask {
        let settings = ComputeSettings {
            initial_step_capacity: 4,
            ..Default::default()
        };
        ComputeRenderTask::new("test", &settings)
    }

    fn building_task(device: &MockComputeDevice, world: &WorldComputeRegistry) -> ComputeRenderTask {
        let mut task = small_task();
        task.prepare(device, world, 1, |task, world| task.end_pass(world))
            .unwrap();
        task
    }

    /// Simulates a build that produced `steps`, writing as many as fit.
    fn publish(device: &MockComputeDevice, task: &ComputeRenderTask, steps: &[GpuDrawStep]) {
        let fit = steps.len().min(task.step_buffer().capacity());
        task.step_buffer().write(device, 0, &steps[..fit]).unwrap();
        let counters = GpuStepCounters {
            work_group_size: [1, 1, 1],
            count: steps.len() as u32,
        };
        task.counter_buffer().write(device, 0, &[counters]).unwrap();
    }

    fn step(pipeline: u32, sub_instance_count: u32) -> GpuDrawStep {
        GpuDrawStep {
            pipeline,
            sub_instance_count,
            ..Default::default()
        }
    }

    #[test]
    fn test_prepare_publishes_pass_rows() {
        let device = MockComputeDevice::default();
        let world = world(&device);
        let mut task = small_task();

        task.prepare(&device, &world, 2, |task, world| {
            task.set_filters(PassFilters::solid_geometry());
            task.end_pass(world);
            task.filters_mut().solid = false;
            task.end_pass(world);
        })
        .unwrap();

        assert_eq!(task.state(), TaskState::Building);
        let rows = task.config_buffer().read(&device, 0, 2).unwrap();
        assert_eq!(rows[0].element_geometry_count, 1);
        assert_ne!(rows[0].filter & RenderFilter::SOLID.bits(), 0);
        assert_eq!(rows[1].filter & RenderFilter::SOLID.bits(), 0);
        assert_eq!(rows[0].mask, rows[1].mask);
    }

    #[test]
    fn test_empty_build_is_ready_without_steps() {
        let device = MockComputeDevice::default();
        let world = world(&device);
        let mut task = building_task(&device, &world);

        assert_eq!(task.read_back_steps(&device).unwrap(), ReadBack::Empty);
        assert_eq!(task.state(), TaskState::Ready);
        assert!(task.steps().is_empty());
    }

    #[test]
    fn test_overflow_grows_by_slack_and_stays_building() {
        let device = MockComputeDevice::default();
        let world = world(&device);
        let mut task = building_task(&device, &world);

        let steps: Vec<_> = (0..7).map(|i| step(i, 1)).collect();
        publish(&device, &task, &steps);

        assert_eq!(task.read_back_steps(&device).unwrap(), ReadBack::NeedsResize(17));
        assert_eq!(task.state(), TaskState::Building);
        assert_eq!(task.step_buffer().capacity(), 17);
        let counters = task.counter_buffer().read(&device, 0, 1).unwrap();
        assert_eq!(counters[0].count, 0);

        // The rebuild fits.
        publish(&device, &task, &steps);
        assert_eq!(task.read_back_steps(&device).unwrap(), ReadBack::Success(7));
        assert_eq!(task.state(), TaskState::Ready);
    }

    #[test]
    fn test_sub_instance_companions_are_skipped() {
        let device = MockComputeDevice::default();
        let world = world(&device);
        let mut task = building_task(&device, &world);

        publish(&device, &task, &[step(1, 3), step(1, 1), step(1, 1), step(2, 1)]);
        assert_eq!(task.read_back_steps(&device).unwrap(), ReadBack::Success(2));

        let pipelines: Vec<u32> = task.steps().iter().map(|s| s.pipeline).collect();
        assert_eq!(pipelines, vec![1, 2]);
        assert_eq!(task.steps()[0].sub_instance_count, 3);
        assert!(!task.skips_sub_instance_groups());
    }

    #[test]
    fn test_without_grouping_every_row_is_a_step() {
        let device = MockComputeDevice::default();
        let world = world(&device);
        let mut task = small_task();
        task.set_group_sub_instances(false);
        task.prepare(&device, &world, 1, |task, world| task.end_pass(world))
            .unwrap();

        publish(&device, &task, &[step(1, 2), step(1, 1)]);
        assert_eq!(task.read_back_steps(&device).unwrap(), ReadBack::Success(2));
    }

    #[test]
    fn test_render_hands_steps_to_sink() {
        let device = MockComputeDevice::default();
        let world = world(&device);
        let mut task = building_task(&device, &world);
        let mut row = step(9, 1);
        row.special_flags = SpecialFlags::STATIC.bits();
        publish(&device, &task, &[row]);
        task.read_back_steps(&device).unwrap();

        let mut sink: Vec<DrawStep> = Vec::new();
        task.render(&mut sink);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].special_flags, SpecialFlags::STATIC);
    }

    #[test]
    fn test_task_can_be_prepared_again_after_ready() {
        let device = MockComputeDevice::default();
        let world = world(&device);
        let mut task = building_task(&device, &world);
        publish(&device, &task, &[step(1, 1)]);
        task.read_back_steps(&device).unwrap();

        task.prepare(&device, &world, 1, |task, world| task.end_pass(world))
            .unwrap();
        assert_eq!(task.state(), TaskState::Building);
        assert!(task.steps().is_empty());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_pass_count_limit() {
        let device = MockComputeDevice::default();
        small_task().begin_prepare(&device, 8).unwrap();
    }

    #[test]
    #[should_panic(expected = "already preparing")]
    fn test_begin_prepare_twice_panics() {
        let device = MockComputeDevice::default();
        let mut task = small_task();
        task.begin_prepare(&device, 1).unwrap();
        task.begin_prepare(&device, 1).unwrap();
    }

    #[test]
    #[should_panic(expected = "passes missing")]
    fn test_end_prepare_requires_every_pass() {
        let device = MockComputeDevice::default();
        let world = world(&device);
        let mut task = small_task();
        task.begin_prepare(&device, 2).unwrap();
        task.end_pass(&world);
        task.end_prepare(&device, &world).unwrap();
    }

    #[test]
    #[should_panic(expected = "without geometries")]
    fn test_end_prepare_requires_geometry() {
        let device = MockComputeDevice::default();
        let world = WorldComputeRegistry::new(&ComputeSettings::default());
        let mut task = small_task();
        task.prepare(&device, &world, 1, |task, world| task.end_pass(world))
            .unwrap();
    }

    #[test]
    #[should_panic(expected = "while not building")]
    fn test_read_back_while_preparing_panics() {
        let device = MockComputeDevice::default();
        let mut task = small_task();
        task.begin_prepare(&device, 1).unwrap();
        let _ = task.read_back_steps(&device);
    }

    #[test]
    #[should_panic(expected = "before it is ready")]
    fn test_render_before_ready_panics() {
        let mut sink: Vec<DrawStep> = Vec::new();
        small_task().render(&mut sink);
    }
}
