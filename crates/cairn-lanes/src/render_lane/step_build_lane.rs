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

//! Orchestration of the per-frame compute stages.

use super::task::{ComputeRenderTask, ReadBack, TaskState};
use cairn_core::lane::{Lane, LaneError, LaneKind};
use cairn_core::renderer::{ComputeDevice, ComputeSettings, ResourceError};
use cairn_data::world::{SyncReport, WorldComputeRegistry};

/// The compute kernels the lane dispatches.
///
/// A GPU backend records compute passes; [`CpuStepBuilder`](super::CpuStepBuilder)
/// performs the same work on the host through the device's buffer API.
pub trait ComputeStages {
    /// Scatters the staged element rows into the element buffer.
    fn update_elements(
        &mut self,
        device: &dyn ComputeDevice,
        world: &WorldComputeRegistry,
    ) -> Result<(), ResourceError>;

    /// Zeroes the staged geometry rows.
    fn clear_geometries(
        &mut self,
        device: &dyn ComputeDevice,
        world: &WorldComputeRegistry,
    ) -> Result<(), ResourceError>;

    /// Scatters the staged geometry rows into the geometry buffer.
    fn update_geometries(
        &mut self,
        device: &dyn ComputeDevice,
        world: &WorldComputeRegistry,
    ) -> Result<(), ResourceError>;

    /// Culls the world against every pass of `task` and writes its steps and
    /// step counter.
    fn build_steps(
        &mut self,
        device: &dyn ComputeDevice,
        world: &WorldComputeRegistry,
        task: &ComputeRenderTask,
    ) -> Result<(), ResourceError>;
}

/// Drives world synchronization and the build/read-back retry loop.
#[derive(Debug, Clone)]
pub struct StepBuildLane {
    max_build_attempts: u32,
}

impl StepBuildLane {
    /// Creates the lane.
    pub fn new(settings: &ComputeSettings) -> Self {
        Self {
            max_build_attempts: settings.max_build_attempts.max(1),
        }
    }

    /// Prepares the world buffers and runs the scatter stages the prepare
    /// asked for. Clears run before the geometry scatter.
    pub fn sync_world(
        &self,
        device: &dyn ComputeDevice,
        world: &mut WorldComputeRegistry,
        stages: &mut dyn ComputeStages,
    ) -> Result<SyncReport, LaneError> {
        let report = world.prepare(device)?;
        if report.elements.needs_scatter() {
            stages.update_elements(device, world)?;
        }
        if report.cleared_geometry_rows > 0 {
            stages.clear_geometries(device, world)?;
        }
        if report.geometries.needs_scatter() {
            stages.update_geometries(device, world)?;
        }
        log::trace!("StepBuildLane: world synchronized {report:?}");
        Ok(report)
    }

    /// Builds and reads back every task that is still building, rebuilding the
    /// ones whose step buffer turned out too small.
    ///
    /// ## Returns
    /// The number of build rounds dispatched.
    pub fn build(
        &self,
        device: &dyn ComputeDevice,
        world: &WorldComputeRegistry,
        stages: &mut dyn ComputeStages,
        tasks: &mut [ComputeRenderTask],
    ) -> Result<u32, LaneError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            for task in tasks.iter().filter(|t| t.state() == TaskState::Building) {
                stages.build_steps(device, world, task)?;
            }

            let mut pending = None;
            for task in tasks
                .iter_mut()
                .filter(|t| t.state() == TaskState::Building)
            {
                if let ReadBack::NeedsResize(capacity) = task.read_back_steps(device)? {
                    log::warn!(
                        "StepBuildLane: task '{}' resized to {capacity} steps, rebuilding",
                        task.label()
                    );
                    pending = Some((task.label().to_owned(), capacity));
                }
            }

            match pending {
                None => return Ok(attempts),
                Some((task, requested_capacity)) if attempts >= self.max_build_attempts => {
                    log::error!(
                        "StepBuildLane: task '{task}' did not fit after {attempts} attempts"
                    );
                    return Err(LaneError::RetryLimitExceeded {
                        task,
                        attempts,
                        requested_capacity,
                    });
                }
                Some(_) => {}
            }
        }
    }
}

impl Default for StepBuildLane {
    fn default() -> Self {
        Self::new(&ComputeSettings::default())
    }
}

impl Lane for StepBuildLane {
    fn strategy_name(&self) -> &'static str {
        "StepBuild"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Render
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::renderer::RenderFilter;
    use cairn_data::world::{ComputeElement, ElementData, ElementGeometry};
    use cairn_infra::HostComputeDevice;
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingStages {
        calls: Vec<&'static str>,
    }

    impl ComputeStages for RecordingStages {
        fn update_elements(
            &mut self,
            _device: &dyn ComputeDevice,
            _world: &WorldComputeRegistry,
        ) -> Result<(), ResourceError> {
            self.calls.push("update_elements");
            Ok(())
        }

        fn clear_geometries(
            &mut self,
            _device: &dyn ComputeDevice,
            _world: &WorldComputeRegistry,
        ) -> Result<(), ResourceError> {
            self.calls.push("clear_geometries");
            Ok(())
        }

        fn update_geometries(
            &mut self,
            _device: &dyn ComputeDevice,
            _world: &WorldComputeRegistry,
        ) -> Result<(), ResourceError> {
            self.calls.push("update_geometries");
            Ok(())
        }

        fn build_steps(
            &mut self,
            _device: &dyn ComputeDevice,
            _world: &WorldComputeRegistry,
            _task: &ComputeRenderTask,
        ) -> Result<(), ResourceError> {
            self.calls.push("build_steps");
            Ok(())
        }
    }

    struct Quad;

    impl ComputeElement for Quad {
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

    #[test]
    fn test_sync_runs_only_the_stages_the_prepare_asked_for() {
        let device = HostComputeDevice::new();
        let mut world = WorldComputeRegistry::new(&ComputeSettings::default());
        let handles: Vec<_> = (0..10).map(|_| world.add_element(Arc::new(Quad))).collect();
        let lane = StepBuildLane::default();
        let mut stages = RecordingStages::default();

        lane.sync_world(&device, &mut world, &mut stages).unwrap();
        assert!(stages.calls.is_empty());

        world.update_element(handles[0]);
        lane.sync_world(&device, &mut world, &mut stages).unwrap();
        assert_eq!(stages.calls, vec!["update_elements"]);

        stages.calls.clear();
        world.update_element_geometries(handles[1]);
        lane.sync_world(&device, &mut world, &mut stages).unwrap();
        assert_eq!(stages.calls, vec!["update_geometries"]);

        stages.calls.clear();
        world.remove_element(handles[9]);
        lane.sync_world(&device, &mut world, &mut stages).unwrap();
        assert_eq!(stages.calls, vec!["clear_geometries"]);
    }

    #[test]
    fn test_tasks_without_steps_finish_in_one_round() {
        let device = HostComputeDevice::new();
        let mut world = WorldComputeRegistry::new(&ComputeSettings::default());
        world.add_element(Arc::new(Quad));
        world.prepare(&device).unwrap();

        let mut tasks = [ComputeRenderTask::new("empty", &ComputeSettings::default())];
        tasks[0]
            .prepare(&device, &world, 1, |task, world| task.end_pass(world))
            .unwrap();

        let mut stages = RecordingStages::default();
        let attempts = StepBuildLane::default()
            .build(&device, &world, &mut stages, &mut tasks)
            .unwrap();
        assert_eq!(attempts, 1);
        assert_eq!(stages.calls, vec!["build_steps"]);
        assert_eq!(tasks[0].state(), TaskState::Ready);
    }

    #[test]
    fn test_lane_identity() {
        let lane = StepBuildLane::default();
        assert_eq!(lane.strategy_name(), "StepBuild");
        assert_eq!(lane.lane_kind(), LaneKind::Render);
    }
}
