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

use anyhow::anyhow;
use anyhow::Result;
use wgpu::{Adapter, Instance};

/// Holds the wgpu objects the compute device needs.
///
/// The context is headless: compute and buffer transfers only, no surface.
#[derive(Debug)]
pub struct WgpuComputeContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,

    // Store info for easy access
    pub adapter_name: String,
    pub adapter_backend: wgpu::Backend,
    pub adapter_device_type: wgpu::DeviceType,
}

impl WgpuComputeContext {
    /// Selects a high-performance adapter from the instance and creates a
    /// logical device on it.
    ///
    /// ## Arguments
    /// * `instance` - The wgpu instance to select the adapter from.
    ///
    /// ## Returns
    /// * `Result<Self>` - The initialized context, or an error if no adapter
    ///   is available or the device could not be created.
    pub async fn new(instance: &Instance) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| anyhow!("No suitable graphics adapter found: {}", e))?;

        Self::with_adapter(adapter).await
    }

    /// Creates the logical device on a pre-selected adapter.
    pub async fn with_adapter(adapter: Adapter) -> Result<Self> {
        let adapter_info = adapter.get_info();
        log::info!(
            "Using graphics adapter: \"{}\" (Backend: {:?})",
            adapter_info.name,
            adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Cairn Compute Device"),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await
            .map_err(|e| anyhow!("Failed to create logical device: {}", e))?;
        log::info!("Logical device and command queue created.");

        device.on_uncaptured_error(std::sync::Arc::new(|e| {
            log::error!("WGPU Uncaptured Error: {e:?}");
        }));

        Ok(Self {
            adapter,
            device,
            queue,
            adapter_name: adapter_info.name,
            adapter_backend: adapter_info.backend,
            adapter_device_type: adapter_info.device_type,
        })
    }

    /// Blocking variant of [`new`](Self::new) on a default instance.
    pub fn new_blocking() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::new_without_display_handle());
        pollster::block_on(Self::new(&instance))
    }
}
