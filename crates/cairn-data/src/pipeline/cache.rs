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

//! A cache resolving equal pipeline descriptors to one shared pipeline.
//!
//! Compute shaders embed pipelines by index, so a pipeline can additionally be
//! given a *stable index*: its position in an append-only list that is never
//! reordered.

use cairn_core::renderer::{PipelineDescriptor, PipelineError, PipelineType};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// A cached pipeline.
#[derive(Debug)]
pub struct Pipeline {
    descriptor: PipelineDescriptor,
    cache_index: usize,
    stable_index: OnceLock<u32>,
}

impl Pipeline {
    /// The descriptor the pipeline was created from.
    pub fn descriptor(&self) -> &PipelineDescriptor {
        &self.descriptor
    }

    /// Position in the cache's internal list.
    pub fn cache_index(&self) -> usize {
        self.cache_index
    }

    /// Index usable inside GPU buffers, if one was assigned.
    pub fn stable_index(&self) -> Option<u32> {
        self.stable_index.get().copied()
    }
}

#[derive(Debug, Default)]
struct CacheState {
    pipelines: Vec<Arc<Pipeline>>,
    stable: Vec<Arc<Pipeline>>,
}

/// Thread-safe pipeline cache. Lookups scan linearly for an equal descriptor.
#[derive(Debug, Default)]
pub struct PipelineCache {
    state: Mutex<CacheState>,
}

impl PipelineCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pipeline for `descriptor`, creating it on first use.
    ///
    /// ## Arguments
    /// * `descriptor` - The full pipeline state.
    /// * `assign_stable_index` - Also give the pipeline a stable index if it
    ///   does not have one yet.
    /// ## Errors
    /// * `PipelineError` - If the descriptor is invalid. Such errors are
    ///   programming mistakes and are not expected at runtime.
    pub fn get_or_create(
        &self,
        descriptor: &PipelineDescriptor,
        assign_stable_index: bool,
    ) -> Result<Arc<Pipeline>, PipelineError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let existing = state
            .pipelines
            .iter()
            .find(|pipeline| pipeline.descriptor == *descriptor)
            .cloned();

        let pipeline = match existing {
            Some(pipeline) => pipeline,
            None => {
                validate(descriptor)?;
                let pipeline = Arc::new(Pipeline {
                    descriptor: descriptor.clone(),
                    cache_index: state.pipelines.len(),
                    stable_index: OnceLock::new(),
                });
                state.pipelines.push(Arc::clone(&pipeline));
                log::debug!(
                    "Pipeline cache: created '{}' ({} cached)",
                    descriptor.label.as_deref().unwrap_or("unnamed"),
                    state.pipelines.len()
                );
                pipeline
            }
        };

        if assign_stable_index && pipeline.stable_index.get().is_none() {
            let index = state.stable.len() as u32;
            if pipeline.stable_index.set(index).is_ok() {
                state.stable.push(Arc::clone(&pipeline));
            }
        }

        Ok(pipeline)
    }

    /// Returns the pipeline with the given stable index.
    pub fn by_stable_index(&self, index: u32) -> Option<Arc<Pipeline>> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.stable.get(index as usize).cloned()
    }

    /// Number of cached pipelines.
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pipelines
            .len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of stable indices handed out.
    pub fn stable_len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stable
            .len()
    }
}

fn validate(descriptor: &PipelineDescriptor) -> Result<(), PipelineError> {
    let label = descriptor.label.as_ref().map(|l| l.to_string());
    if descriptor.shader.name.is_empty() {
        return Err(PipelineError::MissingShader { label });
    }
    if descriptor.pipeline_type == PipelineType::Compute
        && (descriptor.depth_stencil.is_some() || descriptor.blend.is_some())
    {
        return Err(PipelineError::InvalidState {
            label,
            details: "compute pipelines carry no depth or blend state".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::renderer::{BlendState, CullMode, ShaderRef};
    use std::thread;

    fn solid() -> PipelineDescriptor {
        PipelineDescriptor::graphics(ShaderRef::new("geometry"))
    }

    #[test]
    fn test_equal_descriptors_share_pipeline() {
        let cache = PipelineCache::new();
        let a = cache.get_or_create(&solid(), false).unwrap();
        let b = cache.get_or_create(&solid(), false).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
        assert_eq!(a.stable_index(), None);
    }

    #[test]
    fn test_different_state_creates_new_entry() {
        let cache = PipelineCache::new();
        let mut culled = solid();
        culled.primitive.cull_mode = Some(CullMode::Back);
        let a = cache.get_or_create(&solid(), false).unwrap();
        let b = cache.get_or_create(&culled, false).unwrap();
        assert_eq!((a.cache_index(), b.cache_index()), (0, 1));
    }

    #[test]
    fn test_stable_indices_are_dense_and_distinct_from_cache_index() {
        let cache = PipelineCache::new();
        let mut blended = solid();
        blended.blend = Some(BlendState::ALPHA_BLENDING);

        let unindexed = cache.get_or_create(&solid(), false).unwrap();
        let indexed = cache.get_or_create(&blended, true).unwrap();
        assert_eq!(indexed.cache_index(), 1);
        assert_eq!(indexed.stable_index(), Some(0));

        // A later request assigns an index to a pipeline created without one.
        let again = cache.get_or_create(&solid(), true).unwrap();
        assert!(Arc::ptr_eq(&again, &unindexed));
        assert_eq!(again.stable_index(), Some(1));

        // Asking twice keeps the first index.
        assert_eq!(cache.get_or_create(&blended, true).unwrap().stable_index(), Some(0));
        assert_eq!(cache.stable_len(), 2);
        assert!(Arc::ptr_eq(&cache.by_stable_index(1).unwrap(), &unindexed));
        assert!(cache.by_stable_index(2).is_none());
    }

    #[test]
    fn test_invalid_descriptors_are_rejected() {
        let cache = PipelineCache::new();
        let err = cache
            .get_or_create(&PipelineDescriptor::graphics(ShaderRef::new("")), false)
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingShader { .. }));

        let mut compute = PipelineDescriptor::compute(ShaderRef::new("cull"));
        compute.blend = Some(BlendState::ALPHA_BLENDING);
        assert!(matches!(
            cache.get_or_create(&compute, false),
            Err(PipelineError::InvalidState { .. })
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_lookups_resolve_to_one_pipeline() {
        let cache = Arc::new(PipelineCache::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get_or_create(&solid(), true).unwrap())
            })
            .collect();
        let pipelines: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(pipelines.iter().all(|p| Arc::ptr_eq(p, &pipelines[0])));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stable_len(), 1);
    }
}
