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

//! Typed structured GPU buffer.
//!
//! A [`GpuBlock`] holds rows of one `Pod` type. Its backing buffer is created
//! on demand and recreated when the capacity changes; a recreated buffer
//! starts zeroed, so callers that grow a block must upload its contents again.
//! Row access never allocates and fails with `NotFound` before the buffer exists.

use crate::renderer::api::buffer::{BufferDescriptor, BufferId, BufferUsage};
use crate::renderer::error::ResourceError;
use crate::renderer::traits::ComputeDevice;
use bytemuck::Pod;
use std::borrow::Cow;
use std::marker::PhantomData;

/// A growable array of `T` rows living in a GPU buffer.
#[derive(Debug)]
pub struct GpuBlock<T: Pod> {
    buffer: Option<BufferId>,
    capacity: usize,
    usage: BufferUsage,
    label: &'static str,
    _marker: PhantomData<T>,
}

impl<T: Pod> GpuBlock<T> {
    /// Size of one row in bytes.
    pub const STRIDE: u64 = std::mem::size_of::<T>() as u64;

    /// Creates an empty block. No GPU memory is allocated until the block is
    /// first written or explicitly created.
    pub fn new(label: &'static str, usage: BufferUsage) -> Self {
        Self {
            buffer: None,
            capacity: 0,
            usage,
            label,
            _marker: PhantomData,
        }
    }

    /// Number of rows the block can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The backing buffer, if created.
    pub fn buffer(&self) -> Option<BufferId> {
        self.buffer
    }

    /// The debug label.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Creates the backing buffer if it does not exist yet.
    ///
    /// A block with zero capacity still gets a one-row buffer so it can be
    /// bound to a shader.
    pub fn ensure_buffer(&mut self, device: &dyn ComputeDevice) -> Result<BufferId, ResourceError> {
        if let Some(buffer) = self.buffer {
            return Ok(buffer);
        }
        let rows = self.capacity.max(1) as u64;
        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Borrowed(self.label)),
            size: rows * Self::STRIDE,
            usage: self.usage,
        })?;
        self.buffer = Some(buffer);
        Ok(buffer)
    }

    /// Sets the row capacity, recreating the buffer when it changes.
    ///
    /// The contents of a recreated buffer are zero.
    pub fn set_capacity(
        &mut self,
        device: &dyn ComputeDevice,
        capacity: usize,
    ) -> Result<(), ResourceError> {
        if capacity == self.capacity && self.buffer.is_some() {
            return Ok(());
        }
        if let Some(old) = self.buffer.take() {
            device.destroy_buffer(old)?;
        }
        log::debug!(
            "GpuBlock '{}': capacity {} -> {} rows",
            self.label,
            self.capacity,
            capacity
        );
        self.capacity = capacity;
        self.ensure_buffer(device)?;
        Ok(())
    }

    /// Grows the block to at least `required` rows.
    ///
    /// ## Returns
    /// `true` if the buffer was recreated and its previous contents are lost.
    pub fn ensure_capacity(
        &mut self,
        device: &dyn ComputeDevice,
        required: usize,
    ) -> Result<bool, ResourceError> {
        if required <= self.capacity {
            self.ensure_buffer(device)?;
            return Ok(false);
        }
        self.set_capacity(device, required)?;
        Ok(true)
    }

    /// Writes `rows` starting at row `first`.
    pub fn write(
        &self,
        device: &dyn ComputeDevice,
        first: usize,
        rows: &[T],
    ) -> Result<(), ResourceError> {
        if rows.is_empty() {
            return Ok(());
        }
        self.check_range(first, rows.len())?;
        let buffer = self.buffer.ok_or(ResourceError::NotFound)?;
        device.write_buffer(
            buffer,
            first as u64 * Self::STRIDE,
            bytemuck::cast_slice(rows),
        )
    }

    /// Zeroes `count` rows starting at row `first`.
    pub fn clear_rows(
        &self,
        device: &dyn ComputeDevice,
        first: usize,
        count: usize,
    ) -> Result<(), ResourceError> {
        if count == 0 {
            return Ok(());
        }
        self.check_range(first, count)?;
        let buffer = self.buffer.ok_or(ResourceError::NotFound)?;
        device.clear_buffer(
            buffer,
            first as u64 * Self::STRIDE,
            Some(count as u64 * Self::STRIDE),
        )
    }

    /// Zeroes the whole buffer.
    pub fn clear(&self, device: &dyn ComputeDevice) -> Result<(), ResourceError> {
        let buffer = self.buffer.ok_or(ResourceError::NotFound)?;
        device.clear_buffer(buffer, 0, None)
    }

    /// Reads `count` rows starting at row `first`, waiting for pending GPU work.
    pub fn read(
        &self,
        device: &dyn ComputeDevice,
        first: usize,
        count: usize,
    ) -> Result<Vec<T>, ResourceError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        self.check_range(first, count)?;
        let buffer = self.buffer.ok_or(ResourceError::NotFound)?;
        let bytes = device.read_buffer(
            buffer,
            first as u64 * Self::STRIDE,
            count as u64 * Self::STRIDE,
        )?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }

    /// Releases the backing buffer. The capacity is kept so the next write
    /// recreates a buffer of the same size.
    pub fn destroy(&mut self, device: &dyn ComputeDevice) -> Result<(), ResourceError> {
        match self.buffer.take() {
            Some(buffer) => device.destroy_buffer(buffer),
            None => Ok(()),
        }
    }

    fn check_range(&self, first: usize, count: usize) -> Result<(), ResourceError> {
        if first + count > self.capacity {
            return Err(ResourceError::OutOfBounds {
                offset: first as u64 * Self::STRIDE,
                len: count as u64 * Self::STRIDE,
                buffer_size: self.capacity as u64 * Self::STRIDE,
            });
        }
        Ok(())
    }
}
