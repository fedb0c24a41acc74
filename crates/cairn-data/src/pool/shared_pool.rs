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

//! The three recyclable resource kinds referenced by draw steps.

use super::index_pool::{IndexPool, PoolHandle};
use cairn_core::renderer::BufferId;

/// Index element size of a VAO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexFormat {
    /// 16-bit indices.
    Uint16,
    /// 32-bit indices.
    #[default]
    Uint32,
}

/// A batched texture state: the textures and parameter block a draw binds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextureStateRecord {
    /// Texture unit configuration this state was built from.
    pub texture_unit_config: u32,
    /// Bound textures, one per unit.
    pub textures: Vec<u32>,
    /// Shader parameter block bound with the textures.
    pub param_block: Option<BufferId>,
}

/// A vertex array: vertex and index buffers with their layout.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VaoRecord {
    /// Vertex buffer.
    pub vertex_buffer: Option<BufferId>,
    /// Index buffer.
    pub index_buffer: Option<BufferId>,
    /// Format of the index buffer.
    pub index_format: IndexFormat,
    /// Vertex layout identifier.
    pub layout: u32,
}

/// An instance: the index range to draw and its parameter block.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InstanceRecord {
    /// First index of the range.
    pub first_index: u32,
    /// Number of indices, 0 for non-indexed draws.
    pub index_count: u32,
    /// First vertex, or base vertex for indexed draws.
    pub first_vertex: u32,
    /// Number of vertices for non-indexed draws.
    pub vertex_count: u32,
    /// Per-instance shader parameter block.
    pub param_block: Option<BufferId>,
}

/// Owner of every texture-state, VAO and instance record.
///
/// Draw steps carry raw indices into these pools, so records must outlive any
/// frame that may still reference them. Records are recycled, never deleted.
#[derive(Debug)]
pub struct SharedResourcePool {
    textures: IndexPool<TextureStateRecord>,
    vaos: IndexPool<VaoRecord>,
    instances: IndexPool<InstanceRecord>,
}

impl SharedResourcePool {
    /// Creates empty pools logging their growth every `log_interval` records.
    pub fn new(log_interval: usize) -> Self {
        Self {
            textures: IndexPool::new("Texture state", log_interval),
            vaos: IndexPool::new("VAO", log_interval),
            instances: IndexPool::new("Instance", log_interval),
        }
    }

    /// Acquires a texture-state record.
    pub fn acquire_texture(&mut self) -> PoolHandle<TextureStateRecord> {
        self.textures.acquire()
    }

    /// Acquires a VAO record.
    pub fn acquire_vao(&mut self) -> PoolHandle<VaoRecord> {
        self.vaos.acquire()
    }

    /// Acquires an instance record.
    pub fn acquire_instance(&mut self) -> PoolHandle<InstanceRecord> {
        self.instances.acquire()
    }

    /// Releases a texture-state record.
    pub fn release_texture(&mut self, handle: PoolHandle<TextureStateRecord>) {
        self.textures.release(handle);
    }

    /// Releases a VAO record.
    pub fn release_vao(&mut self, handle: PoolHandle<VaoRecord>) {
        self.vaos.release(handle);
    }

    /// Releases an instance record.
    pub fn release_instance(&mut self, handle: PoolHandle<InstanceRecord>) {
        self.instances.release(handle);
    }

    /// The texture-state pool.
    pub fn textures(&self) -> &IndexPool<TextureStateRecord> {
        &self.textures
    }

    /// The texture-state pool, mutable.
    pub fn textures_mut(&mut self) -> &mut IndexPool<TextureStateRecord> {
        &mut self.textures
    }

    /// The VAO pool.
    pub fn vaos(&self) -> &IndexPool<VaoRecord> {
        &self.vaos
    }

    /// The VAO pool, mutable.
    pub fn vaos_mut(&mut self) -> &mut IndexPool<VaoRecord> {
        &mut self.vaos
    }

    /// The instance pool.
    pub fn instances(&self) -> &IndexPool<InstanceRecord> {
        &self.instances
    }

    /// The instance pool, mutable.
    pub fn instances_mut(&mut self) -> &mut IndexPool<InstanceRecord> {
        &mut self.instances
    }
}

impl Default for SharedResourcePool {
    fn default() -> Self {
        Self::new(cairn_core::renderer::ComputeSettings::default().pool_log_interval)
    }
}
