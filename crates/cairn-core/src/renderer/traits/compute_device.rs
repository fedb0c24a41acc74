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

use crate::renderer::api::{BufferDescriptor, BufferId};
use crate::renderer::error::ResourceError;
use std::fmt::Debug;

/// The narrow slice of a graphics device the scene compute pipeline needs:
/// structured buffers that the CPU can fill, clear and read back.
///
/// Reads are fenced: `read_buffer` returns only once every previously
/// submitted GPU write to the buffer has completed, so a read can never be
/// reordered ahead of the dispatch that produced the data.
pub trait ComputeDevice: Send + Sync + Debug + 'static {
    /// Creates a new GPU buffer with zeroed contents.
    /// ## Arguments
    /// * `descriptor` - The buffer configuration.
    /// ## Returns
    /// The ID of the created buffer.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Destroys a GPU buffer.
    /// ## Arguments
    /// * `id` - The ID of the buffer to be destroyed.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Writes bytes into a buffer.
    /// ## Arguments
    /// * `id` - The ID of the buffer to write to.
    /// * `offset` - Byte offset of the first written byte.
    /// * `data` - The bytes to write.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the write does not fit the buffer.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Fills a byte range of a buffer with zeros.
    /// ## Arguments
    /// * `id` - The ID of the buffer to clear.
    /// * `offset` - Byte offset of the range.
    /// * `size` - Byte length of the range, `None` for the rest of the buffer.
    fn clear_buffer(&self, id: BufferId, offset: u64, size: Option<u64>)
        -> Result<(), ResourceError>;

    /// Reads a byte range of a buffer back to the CPU, blocking until the GPU
    /// has finished all work submitted before the call.
    /// ## Arguments
    /// * `id` - The ID of the buffer to read.
    /// * `offset` - Byte offset of the range.
    /// * `size` - Byte length of the range.
    /// ## Returns
    /// The bytes of the range.
    fn read_buffer(&self, id: BufferId, offset: u64, size: u64) -> Result<Vec<u8>, ResourceError>;

    /// Returns the size of a buffer in bytes, or `None` if the ID is unknown.
    fn buffer_size(&self, id: BufferId) -> Option<u64>;
}
