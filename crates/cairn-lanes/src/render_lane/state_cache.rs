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

//! Replays draw steps against a command sink, binding state only when it
//! changes between consecutive steps.

use super::step::DrawStep;
use cairn_data::pipeline::{Pipeline, PipelineCache};
use cairn_data::pool::{InstanceRecord, SharedResourcePool, TextureStateRecord, VaoRecord};

/// Receiver of the commands produced by [`replay`].
pub trait DrawCommandSink {
    /// Binds a pipeline.
    fn bind_pipeline(&mut self, pipeline: &Pipeline);
    /// Binds the texture state at pool index `index`.
    fn bind_texture_state(&mut self, index: u32, state: &TextureStateRecord);
    /// Binds the vertex array at pool index `index`.
    fn bind_vao(&mut self, index: u32, vao: &VaoRecord);
    /// Draws one step.
    fn draw(&mut self, instance: &InstanceRecord, step: &DrawStep);
}

/// The state bound by the last replayed step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStateCache {
    pipeline: Option<u32>,
    texture_state: Option<u32>,
    vao: Option<u32>,
}

impl DrawStateCache {
    /// Forgets the bound state, forcing every bind on the next step.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Counters of one [`replay`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Draw calls issued.
    pub draws: usize,
    /// Pipeline binds issued.
    pub pipeline_binds: usize,
    /// Texture state binds issued.
    pub texture_state_binds: usize,
    /// VAO binds issued.
    pub vao_binds: usize,
    /// Steps dropped because a record they reference is gone.
    pub skipped: usize,
}

/// Issues `steps` to `sink`.
///
/// Steps are expected sorted by pipeline, texture state and VAO; the cache
/// then binds each of them once per run. Steps referencing a missing pipeline
/// or record are skipped with a warning.
pub fn replay(
    cache: &mut DrawStateCache,
    steps: &[DrawStep],
    pool: &SharedResourcePool,
    pipelines: &PipelineCache,
    sink: &mut dyn DrawCommandSink,
) -> ReplayStats {
    let mut stats = ReplayStats::default();

    for step in steps {
        let pipeline = pipelines.by_stable_index(step.pipeline);
        let texture_state = pool.textures().payload_at(step.tuc);
        let vao = pool.vaos().payload_at(step.vao);
        let instance = pool.instances().payload_at(step.instance);

        let (Some(pipeline), Some(texture_state), Some(vao), Some(instance)) =
            (pipeline, texture_state, vao, instance)
        else {
            log::warn!("Draw replay: skipping step with missing records {step:?}");
            stats.skipped += 1;
            continue;
        };

        if cache.pipeline != Some(step.pipeline) {
            sink.bind_pipeline(&pipeline);
            cache.pipeline = Some(step.pipeline);
            stats.pipeline_binds += 1;
        }
        if cache.texture_state != Some(step.tuc) {
            sink.bind_texture_state(step.tuc, texture_state);
            cache.texture_state = Some(step.tuc);
            stats.texture_state_binds += 1;
        }
        if cache.vao != Some(step.vao) {
            sink.bind_vao(step.vao, vao);
            cache.vao = Some(step.vao);
            stats.vao_binds += 1;
        }

        sink.draw(instance, step);
        stats.draws += 1;
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::renderer::{PipelineDescriptor, ShaderRef, SpecialFlags};

    #[derive(Default)]
    struct Recorder {
        commands: Vec<String>,
    }

    impl DrawCommandSink for Recorder {
        fn bind_pipeline(&mut self, pipeline: &Pipeline) {
            self.commands
                .push(format!("pipeline {}", pipeline.descriptor().shader.name));
        }

        fn bind_texture_state(&mut self, index: u32, _state: &TextureStateRecord) {
            self.commands.push(format!("textures {index}"));
        }

        fn bind_vao(&mut self, index: u32, _vao: &VaoRecord) {
            self.commands.push(format!("vao {index}"));
        }

        fn draw(&mut self, instance: &InstanceRecord, step: &DrawStep) {
            self.commands
                .push(format!("draw {} x{}", instance.index_count, step.sub_instance_count));
        }
    }

    fn fixture() -> (SharedResourcePool, PipelineCache) {
        let mut pool = SharedResourcePool::new(1000);
        for _ in 0..2 {
            pool.acquire_texture();
            pool.acquire_vao();
        }
        let instance = pool.acquire_instance();
        if let Some(record) = pool.instances_mut().get_mut(instance) {
            record.index_count = 36;
        }

        let pipelines = PipelineCache::new();
        for name in ["opaque", "masked"] {
            pipelines
                .get_or_create(&PipelineDescriptor::graphics(ShaderRef::new(name)), true)
                .unwrap();
        }
        (pool, pipelines)
    }

    fn step(pipeline: u32, tuc: u32, vao: u32) -> DrawStep {
        DrawStep {
            pipeline,
            tuc,
            vao,
            instance: 0,
            spb_instance: 0,
            special_flags: SpecialFlags::EMPTY,
            sub_instance_count: 1,
        }
    }

    #[test]
    fn test_binds_only_on_change() {
        let (pool, pipelines) = fixture();
        let mut cache = DrawStateCache::default();
        let mut sink = Recorder::default();
        let steps = [step(0, 0, 0), step(0, 0, 0), step(0, 0, 1), step(1, 1, 1)];

        let stats = replay(&mut cache, &steps, &pool, &pipelines, &mut sink);

        assert_eq!(
            sink.commands,
            vec![
                "pipeline opaque",
                "textures 0",
                "vao 0",
                "draw 36 x1",
                "draw 36 x1",
                "vao 1",
                "draw 36 x1",
                "pipeline masked",
                "textures 1",
                "draw 36 x1",
            ]
        );
        assert_eq!(stats.draws, 4);
        assert_eq!((stats.pipeline_binds, stats.texture_state_binds, stats.vao_binds), (2, 2, 2));
    }

    #[test]
    fn test_cache_persists_until_reset() {
        let (pool, pipelines) = fixture();
        let mut cache = DrawStateCache::default();
        let mut sink = Recorder::default();

        replay(&mut cache, &[step(0, 0, 0)], &pool, &pipelines, &mut sink);
        let second = replay(&mut cache, &[step(0, 0, 0)], &pool, &pipelines, &mut sink);
        assert_eq!(second.pipeline_binds, 0);

        cache.reset();
        let third = replay(&mut cache, &[step(0, 0, 0)], &pool, &pipelines, &mut sink);
        assert_eq!(third.pipeline_binds, 1);
    }

    #[test]
    fn test_missing_records_are_skipped() {
        let (pool, pipelines) = fixture();
        let mut cache = DrawStateCache::default();
        let mut sink = Recorder::default();

        let stats = replay(
            &mut cache,
            &[step(9, 0, 0), step(0, 5, 0), step(0, 0, 0)],
            &pool,
            &pipelines,
            &mut sink,
        );
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.draws, 1);
    }
}
