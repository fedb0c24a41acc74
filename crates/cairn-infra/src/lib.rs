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

//! Concrete implementations of the `cairn-core` device traits.
//!
//! * [`WgpuComputeDevice`] talks to a real GPU through a headless wgpu device.
//! * [`HostComputeDevice`] keeps buffers in memory, for tests and machines
//!   without a usable adapter.

#![warn(missing_docs)]

#[cfg(feature = "graphics")]
pub mod graphics;
pub mod host;

#[cfg(feature = "graphics")]
pub use graphics::wgpu::{WgpuComputeContext, WgpuComputeDevice};
pub use host::HostComputeDevice;
