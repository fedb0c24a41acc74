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

//! Defines data structures related to GPU buffer resources.

use crate::cairn_bitflags;
use std::borrow::Cow;

cairn_bitflags! {
    /// A set of flags describing the allowed usages of a buffer.
    pub struct BufferUsage: u32 {
        /// The buffer can be mapped for reading on the CPU.
        const MAP_READ = 1 << 0;
        /// The buffer can be mapped for writing on the CPU.
        const MAP_WRITE = 1 << 1;
        /// The buffer can be used as the source of a copy operation.
        const COPY_SRC = 1 << 2;
        /// The buffer can be used as the destination of a copy operation.
        const COPY_DST = 1 << 3;
        /// The buffer can be bound as a uniform buffer.
        const UNIFORM = 1 << 6;
        /// The buffer can be bound as a storage buffer (read/write access from shaders).
        const STORAGE = 1 << 7;
        /// The buffer can be used for indirect draw or dispatch commands.
        const INDIRECT = 1 << 8;
    }
}

impl BufferUsage {
    /// Usage of a structured buffer written by the CPU and read by compute shaders.
    pub const STORAGE_UPLOAD: Self = Self::STORAGE.with(Self::COPY_DST);
    /// Usage of a structured buffer written by compute shaders and read back by the CPU.
    pub const STORAGE_READBACK: Self = Self::STORAGE
        .with(Self::COPY_DST)
        .with(Self::COPY_SRC);
}

/// A descriptor used to create a buffer.
#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    /// An optional debug label for the buffer.
    pub label: Option<Cow<'a, str>>,
    /// The total size of the buffer in bytes.
    pub size: u64,
    /// A bitmask of [`BufferUsage`] flags describing how the buffer will be used.
    pub usage: BufferUsage,
}

/// An opaque handle to a GPU buffer resource.
///
/// Returned by [`ComputeDevice::create_buffer`](crate::renderer::ComputeDevice::create_buffer)
/// and used to reference the buffer in all subsequent operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub usize);
