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

//! Keeps the GPU element and geometry buffers in sync with the scene.
//!
//! Elements live in a dense array: removal swaps the last element into the
//! hole, so dense indices are not persistent. Callers hold an
//! [`ElementHandle`] instead, which stays valid until the element is removed.
//!
//! Each frame, [`WorldComputeRegistry::prepare`] chooses per buffer between a
//! partial update (dirty rows uploaded to a scratch buffer together with their
//! target rows, applied on the GPU by a scatter pass) and a full rewrite. The
//! partial path is taken while the number of dirty entries stays below an
//! adaptive limit derived from the element count.

use super::element::{ComputeElement, ElementData, ElementGeometry};
use crate::allocators::{Block, BlockAllocator};
use bytemuck::Zeroable;
use cairn_core::renderer::settings::grow_update_limit;
use cairn_core::renderer::{
    BufferUsage, ComputeDevice, ComputeSettings, GpuBlock, GpuElement, GpuElementGeometry,
    ResourceError,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A stable reference to a registered element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    slot: u32,
    generation: u32,
}

/// How one buffer was synchronized by a prepare call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    /// `rows` rows were staged for the scatter pass.
    Partial {
        /// Staged rows.
        rows: usize,
    },
    /// The buffer was rewritten; `rows` rows are in use.
    Full {
        /// Rewritten rows.
        rows: usize,
    },
}

impl SyncKind {
    /// Returns `true` if a scatter pass has rows to apply.
    pub fn needs_scatter(&self) -> bool {
        matches!(self, SyncKind::Partial { rows } if *rows > 0)
    }
}

/// Outcome of [`WorldComputeRegistry::prepare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Element buffer synchronization.
    pub elements: SyncKind,
    /// Geometry buffer synchronization.
    pub geometries: SyncKind,
    /// Geometry rows staged for clearing before the geometry scatter pass.
    pub cleared_geometry_rows: usize,
}

struct SlotEntry {
    generation: u32,
    dense: Option<usize>,
}

struct Entry {
    slot: u32,
    element: Arc<dyn ComputeElement>,
    update_required: bool,
    update_geometries_required: bool,
    data: ElementData,
    block: Option<Block>,
}

/// The GPU mirror of every renderable element of a world.
pub struct WorldComputeRegistry {
    settings: ComputeSettings,

    entries: Vec<Entry>,
    slots: Vec<SlotEntry>,
    free_slots: Vec<u32>,
    registered: HashMap<usize, ElementHandle>,

    update_elements: Vec<u32>,
    update_geometries: Vec<u32>,
    clear_geometries: Vec<Block>,
    full_update_limit: usize,
    full_update_geometry_limit: usize,
    force_full_update: bool,
    force_full_update_geometry: bool,

    geometry_allocator: BlockAllocator,

    elements: GpuBlock<GpuElement>,
    geometries: GpuBlock<GpuElementGeometry>,
    update_element_rows: GpuBlock<GpuElement>,
    update_geometry_rows: GpuBlock<GpuElementGeometry>,
    update_geometry_indices: GpuBlock<u32>,
    clear_geometry_indices: GpuBlock<u32>,

    update_element_count: usize,
    update_geometry_count: usize,
    clear_geometry_count: usize,
}

impl WorldComputeRegistry {
    /// Creates an empty registry. No GPU memory is allocated until the first
    /// prepare.
    pub fn new(settings: &ComputeSettings) -> Self {
        Self {
            settings: settings.clone(),
            entries: Vec::new(),
            slots: Vec::new(),
            free_slots: Vec::new(),
            registered: HashMap::new(),
            update_elements: Vec::new(),
            update_geometries: Vec::new(),
            clear_geometries: Vec::new(),
            full_update_limit: 0,
            full_update_geometry_limit: 0,
            force_full_update: false,
            force_full_update_geometry: false,
            geometry_allocator: BlockAllocator::default(),
            elements: GpuBlock::new("World elements", BufferUsage::STORAGE_READBACK),
            geometries: GpuBlock::new("World element geometries", BufferUsage::STORAGE_READBACK),
            update_element_rows: GpuBlock::new("Update elements", BufferUsage::STORAGE_READBACK),
            update_geometry_rows: GpuBlock::new(
                "Update element geometries",
                BufferUsage::STORAGE_READBACK,
            ),
            update_geometry_indices: GpuBlock::new(
                "Update geometry indices",
                BufferUsage::STORAGE_READBACK,
            ),
            clear_geometry_indices: GpuBlock::new(
                "Clear geometry indices",
                BufferUsage::STORAGE_READBACK,
            ),
            update_element_count: 0,
            update_geometry_count: 0,
            clear_geometry_count: 0,
        }
    }

    // --- Tracking ---

    /// Registers an element. Its rows are uploaded by the next prepare.
    ///
    /// # Panics
    /// If the same element is already registered.
    pub fn add_element(&mut self, element: Arc<dyn ComputeElement>) -> ElementHandle {
        let key = element_key(&element);
        if let Some(existing) = self.registered.get(&key) {
            panic!("element already registered as {existing:?}");
        }

        let dense = self.entries.len();
        let slot = match self.free_slots.pop() {
            Some(slot) => {
                self.slots[slot as usize].dense = Some(dense);
                slot
            }
            None => {
                self.slots.push(SlotEntry {
                    generation: 0,
                    dense: Some(dense),
                });
                (self.slots.len() - 1) as u32
            }
        };
        let handle = ElementHandle {
            slot,
            generation: self.slots[slot as usize].generation,
        };

        self.entries.push(Entry {
            slot,
            element,
            update_required: true,
            update_geometries_required: true,
            data: ElementData::default(),
            block: None,
        });
        self.registered.insert(key, handle);
        self.enqueue_element(slot);
        self.enqueue_geometries(slot);

        log::trace!(
            "WorldCompute: add element {dense} (queued {}/{}, geometries {}/{})",
            self.update_elements.len(),
            self.full_update_limit,
            self.update_geometries.len(),
            self.full_update_geometry_limit
        );
        handle
    }

    /// Marks the element data (bounds, flags, LOD, geometry count) as changed.
    ///
    /// # Panics
    /// If the handle does not refer to a registered element.
    pub fn update_element(&mut self, handle: ElementHandle) {
        let dense = self.dense_index(handle);
        let entry = &mut self.entries[dense];
        if entry.update_required {
            return;
        }
        entry.update_required = true;
        self.enqueue_element(handle.slot);
    }

    /// Marks the geometry rows of an element as changed.
    ///
    /// # Panics
    /// If the handle does not refer to a registered element.
    pub fn update_element_geometries(&mut self, handle: ElementHandle) {
        let dense = self.dense_index(handle);
        self.mark_geometries_dirty(dense);
    }

    /// Unregisters an element and returns it.
    ///
    /// The last element moves into the freed dense index and is re-queued.
    ///
    /// # Panics
    /// If the handle does not refer to a registered element.
    pub fn remove_element(&mut self, handle: ElementHandle) -> Arc<dyn ComputeElement> {
        let dense = self.dense_index(handle);

        if let Some(block) = self.entries[dense].block.take() {
            self.queue_clear(block);
            self.geometry_allocator.release(block);
        }

        // Pending clears stay queued: they are applied before geometry writes.
        self.update_elements.retain(|&slot| slot != handle.slot);
        self.update_geometries.retain(|&slot| slot != handle.slot);

        let last = self.entries.len() - 1;
        let removed = self.entries.swap_remove(dense);

        if dense < last {
            let moved_slot = self.entries[dense].slot;
            self.slots[moved_slot as usize].dense = Some(dense);

            if !self.entries[dense].update_required {
                self.entries[dense].update_required = true;
                self.enqueue_element(moved_slot);
            }
            // Geometry rows embed the element index and must be rewritten.
            self.mark_geometries_dirty(dense);
        }

        let slot = &mut self.slots[handle.slot as usize];
        slot.dense = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push(handle.slot);
        self.registered.remove(&element_key(&removed.element));

        log::trace!(
            "WorldCompute: removed element {dense}, {} remain",
            self.entries.len()
        );
        removed.element
    }

    // --- Queries ---

    /// Number of registered elements.
    pub fn element_count(&self) -> usize {
        self.entries.len()
    }

    /// Current dense index of an element, `None` if it is not registered.
    pub fn index_of(&self, handle: ElementHandle) -> Option<usize> {
        self.slots
            .get(handle.slot as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.dense)
    }

    /// Returns `true` if the handle refers to a registered element.
    pub fn contains(&self, handle: ElementHandle) -> bool {
        self.index_of(handle).is_some()
    }

    /// The element at a dense index.
    pub fn element_at(&self, index: usize) -> Option<&Arc<dyn ComputeElement>> {
        self.entries.get(index).map(|entry| &entry.element)
    }

    /// The handle of the element at a dense index.
    pub fn handle_at(&self, index: usize) -> Option<ElementHandle> {
        self.entries.get(index).map(|entry| ElementHandle {
            slot: entry.slot,
            generation: self.slots[entry.slot as usize].generation,
        })
    }

    /// Returns `true` if the element rows wait for the next prepare.
    pub fn is_element_dirty(&self, handle: ElementHandle) -> bool {
        self.index_of(handle)
            .is_some_and(|dense| self.entries[dense].update_required)
    }

    /// Returns `true` if the element geometry rows wait for the next prepare.
    pub fn are_geometries_dirty(&self, handle: ElementHandle) -> bool {
        self.index_of(handle)
            .is_some_and(|dense| self.entries[dense].update_geometries_required)
    }

    /// The geometry rows assigned to an element.
    pub fn geometry_block(&self, handle: ElementHandle) -> Option<Block> {
        self.index_of(handle)
            .and_then(|dense| self.entries[dense].block)
    }

    /// Elements queued for the next partial element update.
    pub fn queued_element_updates(&self) -> usize {
        self.update_elements.len()
    }

    /// Elements queued for the next partial geometry update.
    pub fn queued_geometry_updates(&self) -> usize {
        self.update_geometries.len()
    }

    /// Current element full-update limit.
    pub fn full_update_limit(&self) -> usize {
        self.full_update_limit
    }

    /// Current geometry full-update limit.
    pub fn full_update_geometry_limit(&self) -> usize {
        self.full_update_geometry_limit
    }

    /// Geometry rows in use: every row up to the last allocated block.
    pub fn element_geometry_count(&self) -> usize {
        self.geometry_allocator.size() - self.geometry_allocator.free_count_at_end()
    }

    // --- Buffers ---

    /// The element buffer.
    pub fn element_buffer(&self) -> &GpuBlock<GpuElement> {
        &self.elements
    }

    /// The element geometry buffer.
    pub fn geometry_buffer(&self) -> &GpuBlock<GpuElementGeometry> {
        &self.geometries
    }

    /// Staged element rows of the last partial update. Each row's
    /// `update_index` is its target row.
    pub fn update_element_buffer(&self) -> &GpuBlock<GpuElement> {
        &self.update_element_rows
    }

    /// Number of staged element rows.
    pub fn update_element_count(&self) -> usize {
        self.update_element_count
    }

    /// Staged geometry rows of the last partial update.
    pub fn update_geometry_buffer(&self) -> &GpuBlock<GpuElementGeometry> {
        &self.update_geometry_rows
    }

    /// Target rows of the staged geometry rows, in the same order.
    pub fn update_geometry_index_buffer(&self) -> &GpuBlock<u32> {
        &self.update_geometry_indices
    }

    /// Number of staged geometry rows.
    pub fn update_geometry_count(&self) -> usize {
        self.update_geometry_count
    }

    /// Geometry rows to zero before the geometry scatter pass.
    pub fn clear_geometry_buffer(&self) -> &GpuBlock<u32> {
        &self.clear_geometry_indices
    }

    /// Number of geometry rows to zero.
    pub fn clear_geometry_count(&self) -> usize {
        self.clear_geometry_count
    }

    // --- Synchronization ---

    /// Synchronizes both buffers for the coming frame.
    pub fn prepare(&mut self, device: &dyn ComputeDevice) -> Result<SyncReport, ResourceError> {
        let elements = self.prepare_elements(device)?;
        let geometries = self.prepare_geometries(device)?;
        Ok(SyncReport {
            elements,
            geometries,
            cleared_geometry_rows: self.clear_geometry_count,
        })
    }

    /// Synchronizes the element buffer. Must run before
    /// [`prepare_geometries`](Self::prepare_geometries) since it resolves
    /// geometry counts and blocks.
    pub fn prepare_elements(
        &mut self,
        device: &dyn ComputeDevice,
    ) -> Result<SyncKind, ResourceError> {
        let partial = self.update_elements.len() < self.full_update_limit
            && !self.force_full_update
            && self.entries.len() <= self.elements.capacity();

        let kind = if partial {
            self.update_elements_partial(device)?
        } else {
            self.update_elements_full(device)?
        };
        self.force_full_update = false;

        self.full_update_limit = grow_update_limit(
            self.full_update_limit,
            self.settings.full_update_factor,
            self.entries.len(),
        );
        Ok(kind)
    }

    /// Synchronizes the geometry buffer and stages geometry clears.
    pub fn prepare_geometries(
        &mut self,
        device: &dyn ComputeDevice,
    ) -> Result<SyncKind, ResourceError> {
        self.clear_geometry_count = 0;
        if self.clear_geometries.len() < self.full_update_geometry_limit {
            self.stage_clear_geometries(device)?;
        } else {
            self.force_full_update_geometry = true;
        }

        let kind = if self.update_geometries.len() < self.full_update_geometry_limit
            && !self.force_full_update_geometry
        {
            self.update_geometries_partial(device)?
        } else {
            self.update_geometries_full(device)?
        };
        self.force_full_update_geometry = false;

        // Scaled by the element count, not the geometry count.
        self.full_update_geometry_limit = grow_update_limit(
            self.full_update_geometry_limit,
            self.settings.full_update_geometry_factor,
            self.entries.len(),
        );
        Ok(kind)
    }

    /// Releases every GPU buffer. The registry keeps its elements and rebuilds
    /// the buffers with a full update on the next prepare.
    pub fn destroy_buffers(&mut self, device: &dyn ComputeDevice) -> Result<(), ResourceError> {
        self.elements.destroy(device)?;
        self.geometries.destroy(device)?;
        self.update_element_rows.destroy(device)?;
        self.update_geometry_rows.destroy(device)?;
        self.update_geometry_indices.destroy(device)?;
        self.clear_geometry_indices.destroy(device)?;
        self.force_full_update = true;
        self.force_full_update_geometry = true;
        Ok(())
    }

    // --- Internals ---

    fn dense_index(&self, handle: ElementHandle) -> usize {
        match self.index_of(handle) {
            Some(dense) => dense,
            None => panic!("element handle {handle:?} is not registered"),
        }
    }

    fn enqueue_element(&mut self, slot: u32) {
        if self.update_elements.len() < self.full_update_limit {
            self.update_elements.push(slot);
        } else {
            self.force_full_update = true;
        }
    }

    fn enqueue_geometries(&mut self, slot: u32) {
        if self.update_geometries.len() < self.full_update_geometry_limit {
            self.update_geometries.push(slot);
        } else {
            self.force_full_update_geometry = true;
        }
    }

    fn mark_geometries_dirty(&mut self, dense: usize) {
        let entry = &mut self.entries[dense];
        if entry.update_geometries_required {
            return;
        }
        entry.update_geometries_required = true;
        let slot = entry.slot;
        self.enqueue_geometries(slot);
    }

    fn queue_clear(&mut self, block: Block) {
        if self.clear_geometries.len() < self.full_update_geometry_limit {
            self.clear_geometries.push(block);
        } else {
            self.force_full_update_geometry = true;
        }
    }

    /// Reads an element and builds its GPU row, resolving its geometry block.
    fn build_element_row(
        &mut self,
        device: &dyn ComputeDevice,
        dense: usize,
    ) -> Result<GpuElement, ResourceError> {
        let data = self.entries[dense].element.element_data();
        self.entries[dense].update_required = false;
        self.check_geometry_count(device, dense, data.geometry_count)?;

        let entry = &mut self.entries[dense];
        entry.data = data;
        let first_geometry = entry.block.map_or(0, |block| block.index as u32);
        Ok(data.to_gpu(first_geometry))
    }

    fn check_geometry_count(
        &mut self,
        device: &dyn ComputeDevice,
        dense: usize,
        count: usize,
    ) -> Result<(), ResourceError> {
        let old = self.entries[dense].block;
        let old_count = old.map_or(0, |block| block.count);
        if count == old_count {
            return Ok(());
        }

        if count == 0 {
            if let Some(block) = old {
                self.queue_clear(block);
                self.geometry_allocator.release(block);
            }
            self.entries[dense].block = None;
            return Ok(());
        }

        // A smaller count keeps the block; rows past the count are written empty.
        if count < old_count {
            return Ok(());
        }

        // Release first so the freed range can merge into a larger one.
        if let Some(block) = old {
            self.geometry_allocator.release(block);
        }
        self.entries[dense].block = None;

        let block = match self.geometry_allocator.allocate(count) {
            Some(block) => {
                if let Some(old) = old {
                    self.queue_clear(old);
                }
                block
            }
            None => {
                let new_size = self.geometries.capacity().max(self.geometry_allocator.size())
                    + count
                    + self.settings.geometry_growth_slack;
                log::debug!(
                    "WorldCompute: geometry buffer grows to {new_size} rows for {count} geometries"
                );
                self.geometry_allocator.grow(new_size);
                self.geometries.set_capacity(device, new_size)?;
                self.force_full_update_geometry = true;

                match self.geometry_allocator.allocate(count) {
                    Some(block) => block,
                    None => panic!("geometry allocator cannot fit {count} rows after growing"),
                }
            }
        };

        self.entries[dense].block = Some(block);
        self.mark_geometries_dirty(dense);
        Ok(())
    }

    fn update_elements_partial(
        &mut self,
        device: &dyn ComputeDevice,
    ) -> Result<SyncKind, ResourceError> {
        let queued = std::mem::take(&mut self.update_elements);
        let mut rows = Vec::with_capacity(queued.len());

        for slot in queued {
            let Some(dense) = self.slots[slot as usize].dense else {
                continue;
            };
            let mut row = self.build_element_row(device, dense)?;
            row.update_index = dense as u32;
            rows.push(row);
        }

        self.update_element_rows.ensure_capacity(device, rows.len())?;
        self.update_element_rows.write(device, 0, &rows)?;
        self.update_element_count = rows.len();

        log::trace!("WorldCompute: partial element update of {} rows", rows.len());
        Ok(SyncKind::Partial { rows: rows.len() })
    }

    fn update_elements_full(
        &mut self,
        device: &dyn ComputeDevice,
    ) -> Result<SyncKind, ResourceError> {
        self.update_element_count = 0;
        self.update_elements.clear();

        let count = self.entries.len();
        if count == 0 {
            self.elements.ensure_buffer(device)?;
            return Ok(SyncKind::Full { rows: 0 });
        }

        if count > self.elements.capacity() {
            self.elements
                .set_capacity(device, count + self.settings.element_growth_slack)?;
        }

        let mut rows = Vec::with_capacity(count);
        for dense in 0..count {
            rows.push(self.build_element_row(device, dense)?);
        }
        self.elements.write(device, 0, &rows)?;

        log::debug!("WorldCompute: full element update of {count} rows");
        Ok(SyncKind::Full { rows: count })
    }

    fn geometry_rows(&self, dense: usize, block: Block) -> Vec<GpuElementGeometry> {
        let mut geometries = vec![ElementGeometry::default(); block.count];
        self.entries[dense].element.write_geometries(&mut geometries);
        geometries
            .iter()
            .map(|geometry| geometry.to_gpu(dense as u32))
            .collect()
    }

    fn stage_clear_geometries(&mut self, device: &dyn ComputeDevice) -> Result<(), ResourceError> {
        let indices: Vec<u32> = self
            .clear_geometries
            .drain(..)
            .flat_map(|block| (block.index..block.index + block.count).map(|row| row as u32))
            .collect();
        if indices.is_empty() {
            return Ok(());
        }

        self.clear_geometry_indices
            .ensure_capacity(device, indices.len())?;
        self.clear_geometry_indices.write(device, 0, &indices)?;
        self.clear_geometry_count = indices.len();

        log::trace!("WorldCompute: staged {} geometry clears", indices.len());
        Ok(())
    }

    fn update_geometries_partial(
        &mut self,
        device: &dyn ComputeDevice,
    ) -> Result<SyncKind, ResourceError> {
        let queued = std::mem::take(&mut self.update_geometries);
        self.update_geometry_count = 0;

        let mut blocks = Vec::with_capacity(queued.len());
        for slot in queued {
            let Some(dense) = self.slots[slot as usize].dense else {
                continue;
            };
            // Cleared even without a block: the element may have dropped it
            // while its element row was rebuilt.
            self.entries[dense].update_geometries_required = false;
            if let Some(block) = self.entries[dense].block {
                blocks.push((dense, block));
            }
        }

        let total: usize = blocks.iter().map(|(_, block)| block.count).sum();
        if total == 0 {
            return Ok(SyncKind::Partial { rows: 0 });
        }

        let mut rows = Vec::with_capacity(total);
        let mut indices = Vec::with_capacity(total);
        for &(dense, block) in &blocks {
            rows.extend(self.geometry_rows(dense, block));
            indices.extend((block.index..block.index + block.count).map(|row| row as u32));
        }

        // Indices are consumed as uvec4 by the scatter shader.
        let index_capacity = total.div_ceil(4) * 4;
        self.update_geometry_rows.ensure_capacity(device, total)?;
        self.update_geometry_indices
            .ensure_capacity(device, index_capacity)?;
        self.update_geometry_rows.write(device, 0, &rows)?;
        self.update_geometry_indices.write(device, 0, &indices)?;
        self.update_geometry_count = total;

        log::trace!("WorldCompute: partial geometry update of {total} rows");
        Ok(SyncKind::Partial { rows: total })
    }

    fn update_geometries_full(
        &mut self,
        device: &dyn ComputeDevice,
    ) -> Result<SyncKind, ResourceError> {
        self.clear_geometry_count = 0;
        self.update_geometry_count = 0;
        self.update_geometries.clear();
        // A full rewrite starts from a zeroed buffer, pending clears are moot.
        self.clear_geometries.clear();

        for entry in &mut self.entries {
            entry.update_geometries_required = false;
        }

        let used = self.element_geometry_count();
        self.geometries.ensure_capacity(device, used)?;
        // Rows released since the last frame must read back as empty.
        self.geometries.clear(device)?;
        if self.entries.is_empty() || used == 0 {
            return Ok(SyncKind::Full { rows: 0 });
        }

        let mut rows = vec![GpuElementGeometry::zeroed(); used];
        for dense in 0..self.entries.len() {
            if let Some(block) = self.entries[dense].block {
                let element_rows = self.geometry_rows(dense, block);
                rows[block.index..block.index + block.count].copy_from_slice(&element_rows);
            }
        }
        self.geometries.write(device, 0, &rows)?;

        log::debug!(
            "WorldCompute: full geometry update of {used} rows for {} elements",
            self.entries.len()
        );
        Ok(SyncKind::Full { rows: used })
    }
}

impl fmt::Debug for WorldComputeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldComputeRegistry")
            .field("elements", &self.entries.len())
            .field("geometry_rows", &self.element_geometry_count())
            .field("queued_elements", &self.update_elements.len())
            .field("queued_geometries", &self.update_geometries.len())
            .field("full_update_limit", &self.full_update_limit)
            .field("full_update_geometry_limit", &self.full_update_geometry_limit)
            .finish()
    }
}

fn element_key(element: &Arc<dyn ComputeElement>) -> usize {
    Arc::as_ptr(element) as *const () as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::math::{Aabb, Vec3};

    struct StaticElement {
        geometries: usize,
    }

    impl ComputeElement for StaticElement {
        fn element_data(&self) -> ElementData {
            ElementData {
                bounds: Aabb::from_min_max(Vec3::ZERO, Vec3::ONE),
                geometry_count: self.geometries,
                ..Default::default()
            }
        }

        fn write_geometries(&self, _geometries: &mut [ElementGeometry]) {}
    }

    fn element() -> Arc<dyn ComputeElement> {
        Arc::new(StaticElement { geometries: 1 })
    }

    #[test]
    fn test_add_assigns_dense_indices() {
        let mut registry = WorldComputeRegistry::new(&ComputeSettings::default());
        let a = registry.add_element(element());
        let b = registry.add_element(element());
        assert_eq!(registry.index_of(a), Some(0));
        assert_eq!(registry.index_of(b), Some(1));
        assert!(registry.is_element_dirty(a));
        assert!(registry.are_geometries_dirty(b));
        // The limits start at zero, so the first frame is always a full update.
        assert_eq!(registry.queued_element_updates(), 0);
    }

    #[test]
    fn test_remove_middle_swaps_last_into_hole() {
        let mut registry = WorldComputeRegistry::new(&ComputeSettings::default());
        let a = registry.add_element(element());
        let _b = registry.add_element(element());
        let c = registry.add_element(element());

        let removed = registry.add_element(element());
        registry.remove_element(removed);
        registry.remove_element(a);

        assert_eq!(registry.element_count(), 2);
        assert_eq!(registry.index_of(c), Some(0));
        assert_eq!(registry.handle_at(0), Some(c));
        assert!(!registry.contains(a));
    }

    #[test]
    fn test_removing_last_never_swaps() {
        let mut registry = WorldComputeRegistry::new(&ComputeSettings::default());
        let a = registry.add_element(element());
        let b = registry.add_element(element());
        registry.remove_element(b);
        assert_eq!(registry.index_of(a), Some(0));
        assert_eq!(registry.element_count(), 1);
    }

    #[test]
    fn test_slot_reuse_invalidates_old_handle() {
        let mut registry = WorldComputeRegistry::new(&ComputeSettings::default());
        let a = registry.add_element(element());
        registry.remove_element(a);
        let b = registry.add_element(element());
        assert_ne!(a, b);
        assert!(!registry.contains(a));
        assert_eq!(registry.index_of(b), Some(0));
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_double_registration_panics() {
        let mut registry = WorldComputeRegistry::new(&ComputeSettings::default());
        let shared = element();
        registry.add_element(Arc::clone(&shared));
        registry.add_element(shared);
    }

    #[test]
    #[should_panic(expected = "is not registered")]
    fn test_removing_unregistered_panics() {
        let mut registry = WorldComputeRegistry::new(&ComputeSettings::default());
        let a = registry.add_element(element());
        registry.remove_element(a);
        registry.remove_element(a);
    }

    #[test]
    #[should_panic(expected = "is not registered")]
    fn test_updating_unregistered_panics() {
        let mut registry = WorldComputeRegistry::new(&ComputeSettings::default());
        let a = registry.add_element(element());
        registry.remove_element(a);
        registry.update_element(a);
    }
}
