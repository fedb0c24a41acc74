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

//! Conversions from `cairn-core` buffer types to wgpu types.

use cairn_core::renderer::api::BufferUsage;

/// A local extension trait to convert our API types into wgpu types.
/// This avoids Rust's orphan rules while keeping an idiomatic `.into_wgpu()` syntax.
pub trait IntoWgpu<T> {
    /// Consumes self and converts it into a wgpu type.
    fn into_wgpu(self) -> T;
}

impl IntoWgpu<wgpu::BufferUsages> for BufferUsage {
    fn into_wgpu(self) -> wgpu::BufferUsages {
        let mut usages = wgpu::BufferUsages::empty();
        if self.contains(BufferUsage::MAP_READ) {
            usages |= wgpu::BufferUsages::MAP_READ;
        }
        if self.contains(BufferUsage::MAP_WRITE) {
            usages |= wgpu::BufferUsages::MAP_WRITE;
        }
        if self.contains(BufferUsage::COPY_SRC) {
            usages |= wgpu::BufferUsages::COPY_SRC;
        }
        if self.contains(BufferUsage::COPY_DST) {
            usages |= wgpu::BufferUsages::COPY_DST;
        }
        if self.contains(BufferUsage::UNIFORM) {
            usages |= wgpu::BufferUsages::UNIFORM;
        }
        if self.contains(BufferUsage::STORAGE) {
            usages |= wgpu::BufferUsages::STORAGE;
        }
        if self.contains(BufferUsage::INDIRECT) {
            usages |= wgpu::BufferUsages::INDIRECT;
        }
        usages
    }
}
