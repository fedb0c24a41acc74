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

//! Public data types of the compute pipeline: buffers, pipeline descriptors,
//! filter words and the GPU row layouts shared by CPU and shaders.

pub mod buffer;
pub mod filter;
pub mod gpu_block;
pub mod pipeline;
pub mod rows;

pub use self::buffer::*;
pub use self::filter::*;
pub use self::gpu_block::GpuBlock;
pub use self::pipeline::*;
pub use self::rows::*;
