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

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use cairn_core::renderer::api::{BufferDescriptor, BufferId};
use cairn_core::renderer::{ComputeDevice, ResourceError};

use super::context::WgpuComputeContext;
use super::conversions::IntoWgpu;

#[derive(Debug)]
struct WgpuBufferEntry {
    wgpu_buffer: Arc<wgpu::Buffer>,
    size: u64, // To track memory accurately on destruction
}

/// A [`ComputeDevice`] backed by a headless wgpu device.
///
/// Writes go through `Queue::write_buffer` and are applied before the next
/// submission; clears and read-back copies are recorded into their own command
/// buffers, so every operation executes in call order.
#[derive(Debug)]
pub struct WgpuComputeDevice {
    context: Arc<WgpuComputeContext>,
    buffers: Mutex<HashMap<BufferId, WgpuBufferEntry>>,
    next_buffer_id: AtomicUsize,
    allocated_bytes: AtomicUsize,
}

impl WgpuComputeDevice {
    /// Wraps an initialized context.
    pub fn new(context: Arc<WgpuComputeContext>) -> Self {
        Self {
            context,
            buffers: Mutex::new(HashMap::new()),
            next_buffer_id: AtomicUsize::new(0),
            allocated_bytes: AtomicUsize::new(0),
        }
    }

    /// The underlying context.
    pub fn context(&self) -> &WgpuComputeContext {
        &self.context
    }

    /// Bytes currently held by buffers created through this device.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes.load(Ordering::Relaxed)
    }

    /// Returns the wgpu buffer behind an ID, for binding in compute passes.
    pub fn get_wgpu_buffer(&self, id: BufferId) -> Option<Arc<wgpu::Buffer>> {
        self.lock_buffers()
            .ok()?
            .get(&id)
            .map(|entry| Arc::clone(&entry.wgpu_buffer))
    }

    fn generate_buffer_id(&self) -> BufferId {
        BufferId(self.next_buffer_id.fetch_add(1, Ordering::Relaxed))
    }

    fn lock_buffers(&self) -> Result<MutexGuard<'_, HashMap<BufferId, WgpuBufferEntry>>, ResourceError> {
        self.buffers
            .lock()
            .map_err(|e| ResourceError::BackendError(format!("Mutex poisoned (buffers): {e}")))
    }

    /// Looks up a buffer and checks that `[offset, offset + size)` lies inside it.
    fn checked_buffer(
        &self,
        id: BufferId,
        offset: u64,
        size: u64,
    ) -> Result<Arc<wgpu::Buffer>, ResourceError> {
        let buffers = self.lock_buffers()?;
        let entry = buffers.get(&id).ok_or(ResourceError::NotFound)?;
        if offset + size > entry.size {
            return Err(ResourceError::OutOfBounds {
                offset,
                len: size,
                buffer_size: entry.size,
            });
        }
        if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 || size % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(ResourceError::BackendError(format!(
                "Range {offset}+{size} of buffer {id:?} is not {}-byte aligned",
                wgpu::COPY_BUFFER_ALIGNMENT
            )));
        }
        Ok(Arc::clone(&entry.wgpu_buffer))
    }
}

impl ComputeDevice for WgpuComputeDevice {
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        // Sizes are rounded up so clears and copies of the whole buffer stay aligned.
        let size = descriptor.size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        let wgpu_buffer = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: descriptor.label.as_deref(),
            size,
            usage: descriptor.usage.into_wgpu(),
            mapped_at_creation: false,
        });
        let id = self.generate_buffer_id();

        self.allocated_bytes
            .fetch_add(size as usize, Ordering::Relaxed);
        self.lock_buffers()?.insert(
            id,
            WgpuBufferEntry {
                wgpu_buffer: Arc::new(wgpu_buffer),
                size,
            },
        );

        log::debug!(
            "WgpuComputeDevice: Created buffer '{}' with ID: {:?}, size: {} bytes",
            descriptor.label.as_deref().unwrap_or_default(),
            id,
            size
        );
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let entry = self
            .lock_buffers()?
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        self.allocated_bytes
            .fetch_sub(entry.size as usize, Ordering::Relaxed);
        entry.wgpu_buffer.destroy();
        log::trace!("WgpuComputeDevice: Destroyed buffer with ID: {id:?}");
        Ok(())
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        if data.is_empty() {
            return Ok(());
        }
        let buffer = self.checked_buffer(id, offset, data.len() as u64)?;
        self.context.queue.write_buffer(&buffer, offset, data);
        log::trace!(
            "WgpuComputeDevice: Wrote {} bytes to buffer ID: {:?} at offset {}",
            data.len(),
            id,
            offset
        );
        Ok(())
    }

    fn clear_buffer(
        &self,
        id: BufferId,
        offset: u64,
        size: Option<u64>,
    ) -> Result<(), ResourceError> {
        let total = self.buffer_size(id).ok_or(ResourceError::NotFound)?;
        let size = size.unwrap_or(total.saturating_sub(offset));
        if size == 0 {
            return Ok(());
        }
        let buffer = self.checked_buffer(id, offset, size)?;

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Cairn Clear Buffer"),
                });
        encoder.clear_buffer(&buffer, offset, Some(size));
        self.context.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn read_buffer(&self, id: BufferId, offset: u64, size: u64) -> Result<Vec<u8>, ResourceError> {
        if size == 0 {
            return Ok(Vec::new());
        }
        let source = self.checked_buffer(id, offset, size)?;
        let device = &self.context.device;

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cairn Read-back Staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Cairn Read-back"),
        });
        encoder.copy_buffer_to_buffer(&source, offset, &staging, 0, size);
        self.context.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = flume::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // The receiver only goes away if the read already failed.
            let _ = sender.send(result);
        });

        // PollType::Wait blocks until the copy and the map callback are done.
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| ResourceError::BackendError(format!("Device poll failed: {e:?}")))?;

        receiver
            .recv()
            .map_err(|e| ResourceError::BackendError(format!("Map callback dropped: {e}")))?
            .map_err(|e| ResourceError::BackendError(format!("WGPU map_async failed: {e:?}")))?;

        let bytes = slice.get_mapped_range().to_vec();
        staging.unmap();
        staging.destroy();
        Ok(bytes)
    }

    fn buffer_size(&self, id: BufferId) -> Option<u64> {
        self.lock_buffers().ok()?.get(&id).map(|entry| entry.size)
    }
}
