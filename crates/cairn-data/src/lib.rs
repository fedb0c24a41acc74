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

//! # Cairn Data
//!
//! CPU-side ownership of everything the scene compute pipeline mirrors on the
//! GPU: recyclable resource records, the pipeline cache, geometry block
//! allocation and the world compute registry.

#![warn(missing_docs)]

pub mod allocators;
pub mod config;
pub mod pipeline;
pub mod pool;
pub mod world;
