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
use std::sync::{Mutex, MutexGuard};

use cairn_core::renderer::api::{BufferDescriptor, BufferId};
use cairn_core::renderer::{ComputeDevice, ResourceError};

#[derive(Debug)]
struct HostBuffer {
    label: String,
    bytes: Vec<u8>,
}

/// A [`ComputeDevice`] that keeps every buffer in host memory.
///
/// Operations take effect immediately, so reads are trivially fenced. Used by
/// the CPU stage executor, the tests and machines without a GPU adapter.
#[derive(Debug, Default)]
pub struct HostComputeDevice {
    buffers: Mutex<HashMap<BufferId, HostBuffer>>,
    next_buffer_id: AtomicUsize,
    bytes_written: AtomicUsize,
}

impl HostComputeDevice {
    /// Creates a device without buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live buffers.
    pub fn buffer_count(&self) -> usize {
        self.lock().map(|buffers| buffers.len()).unwrap_or(0)
    }

    /// Total bytes uploaded through [`ComputeDevice::write_buffer`] so far.
    pub fn bytes_written(&self) -> usize {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Debug label of a buffer.
    pub fn buffer_label(&self, id: BufferId) -> Option<String> {
        self.lock().ok()?.get(&id).map(|buffer| buffer.label.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<BufferId, HostBuffer>>, ResourceError> {
        self.buffers
            .lock()
            .map_err(|e| ResourceError::BackendError(format!("Mutex poisoned (buffers): {e}")))
    }
}

/// Checks that `[offset, offset + len)` lies inside a buffer of `size` bytes.
fn check_range(offset: u64, len: u64, size: usize) -> Result<std::ops::Range<usize>, ResourceError> {
    let end = offset.checked_add(len);
    match end {
        Some(end) if end <= size as u64 => Ok(offset as usize..end as usize),
        _ => Err(ResourceError::OutOfBounds {
            offset,
            len,
            buffer_size: size as u64,
        }),
    }
}

impl ComputeDevice for HostComputeDevice {
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let id = BufferId(self.next_buffer_id.fetch_add(1, Ordering::Relaxed));
        let label = descriptor.label.as_deref().unwrap_or_default().to_owned();
        log::trace!(
            "HostComputeDevice: Created buffer '{label}' with ID: {id:?}, size: {} bytes",
            descriptor.size
        );
        self.lock()?.insert(
            id,
            HostBuffer {
                label,
                bytes: vec![0; descriptor.size as usize],
            },
        );
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        self.lock()?
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut buffers = self.lock()?;
        let buffer = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        let range = check_range(offset, data.len() as u64, buffer.bytes.len())?;
        buffer.bytes[range].copy_from_slice(data);
        self.bytes_written.fetch_add(data.len(), Ordering::Relaxed);
        Ok(())
    }

    fn clear_buffer(
        &self,
        id: BufferId,
        offset: u64,
        size: Option<u64>,
    ) -> Result<(), ResourceError> {
        let mut buffers = self.lock()?;
        let buffer = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        let total = buffer.bytes.len() as u64;
        let len = size.unwrap_or(total.saturating_sub(offset));
        let range = check_range(offset, len, buffer.bytes.len())?;
        buffer.bytes[range].fill(0);
        Ok(())
    }

    fn read_buffer(&self, id: BufferId, offset: u64, size: u64) -> Result<Vec<u8>, ResourceError> {
        let buffers = self.lock()?;
        let buffer = buffers.get(&id).ok_or(ResourceError::NotFound)?;
        let range = check_range(offset, size, buffer.bytes.len())?;
        Ok(buffer.bytes[range].to_vec())
    }

    fn buffer_size(&self, id: BufferId) -> Option<u64> {
        self.lock()
            .ok()?
            .get(&id)
            .map(|buffer| buffer.bytes.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::renderer::api::BufferUsage;
    use std::borrow::Cow;

    fn create(device: &HostComputeDevice, label: &'static str, size: u64) -> BufferId {
        device
            .create_buffer(&BufferDescriptor {
                label: Some(Cow::Borrowed(label)),
                size,
                usage: BufferUsage::STORAGE_READBACK,
            })
            .unwrap()
    }

    #[test]
    fn test_new_buffers_are_zeroed() {
        let device = HostComputeDevice::new();
        let buffer = create(&device, "zeroed", 12);
        assert_eq!(device.read_buffer(buffer, 0, 12).unwrap(), vec![0; 12]);
        assert_eq!(device.buffer_label(buffer).as_deref(), Some("zeroed"));
    }

    #[test]
    fn test_ids_are_unique() {
        let device = HostComputeDevice::new();
        let a = create(&device, "a", 4);
        let b = create(&device, "b", 4);
        assert_ne!(a, b);
        assert_eq!(device.buffer_count(), 2);
    }

    #[test]
    fn test_write_clear_read() {
        let device = HostComputeDevice::new();
        let buffer = create(&device, "data", 8);
        device.write_buffer(buffer, 0, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        device.clear_buffer(buffer, 2, Some(3)).unwrap();
        assert_eq!(
            device.read_buffer(buffer, 0, 8).unwrap(),
            vec![1, 2, 0, 0, 0, 6, 7, 8]
        );
        assert_eq!(device.bytes_written(), 8);

        device.clear_buffer(buffer, 6, None).unwrap();
        assert_eq!(device.read_buffer(buffer, 4, 4).unwrap(), vec![0, 6, 0, 0]);
    }

    #[test]
    fn test_out_of_bounds() {
        let device = HostComputeDevice::new();
        let buffer = create(&device, "small", 4);
        assert!(matches!(
            device.write_buffer(buffer, 2, &[0; 4]),
            Err(ResourceError::OutOfBounds {
                offset: 2,
                len: 4,
                buffer_size: 4
            })
        ));
        assert!(device.read_buffer(buffer, u64::MAX, 2).is_err());
    }

    #[test]
    fn test_destroyed_buffer_is_gone() {
        let device = HostComputeDevice::new();
        let buffer = create(&device, "gone", 4);
        device.destroy_buffer(buffer).unwrap();
        assert_eq!(device.buffer_size(buffer), None);
        assert!(matches!(
            device.read_buffer(buffer, 0, 4),
            Err(ResourceError::NotFound)
        ));
    }
}
