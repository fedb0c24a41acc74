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

//! Arena of records handed out by stable index.

use std::fmt;
use std::marker::PhantomData;

/// A generation-tagged reference to a record of an [`IndexPool`].
///
/// The `index` is what GPU rows embed; the generation detects use after release.
pub struct PoolHandle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PoolHandle<T> {
    /// The stable index of the record.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The generation the handle was issued for.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl<T> Clone for PoolHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PoolHandle<T> {}

impl<T> PartialEq for PoolHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for PoolHandle<T> {}

impl<T> fmt::Debug for PoolHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PoolHandle({}v{})", self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    acquired: bool,
    payload: T,
}

/// A growable arena of `T` records with a free list.
///
/// Records are never removed: released records are reset to `T::default()` and
/// their index is reused by the next [`acquire`](Self::acquire). Indices stay
/// dense and below [`len`](Self::len) for the lifetime of the pool.
pub struct IndexPool<T: Default> {
    label: &'static str,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    log_interval: usize,
}

impl<T: Default> IndexPool<T> {
    /// Creates an empty pool. Its size is logged each time it crosses a
    /// multiple of `log_interval`.
    pub fn new(label: &'static str, log_interval: usize) -> Self {
        Self {
            label,
            slots: Vec::new(),
            free: Vec::new(),
            log_interval: log_interval.max(1),
        }
    }

    /// Acquires a record, reusing a released index when one is available.
    pub fn acquire(&mut self) -> PoolHandle<T> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.acquired = true;
            return PoolHandle {
                index,
                generation: slot.generation,
                _marker: PhantomData,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            acquired: true,
            payload: T::default(),
        });
        if self.slots.len() % self.log_interval == 0 {
            log::info!("{} pool grew to {} records", self.label, self.slots.len());
        }
        PoolHandle {
            index,
            generation: 0,
            _marker: PhantomData,
        }
    }

    /// Releases a record: its payload is reset and its index becomes reusable.
    ///
    /// # Panics
    /// If the handle is stale or was already released.
    pub fn release(&mut self, handle: PoolHandle<T>) {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.acquired && slot.generation == handle.generation);
        let Some(slot) = slot else {
            panic!("{} pool: release of stale handle {handle:?}", self.label);
        };
        slot.payload = T::default();
        slot.acquired = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
    }

    /// Returns the payload of a live record.
    pub fn get(&self, handle: PoolHandle<T>) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.acquired && slot.generation == handle.generation)
            .map(|slot| &slot.payload)
    }

    /// Returns the payload of a live record for modification.
    pub fn get_mut(&mut self, handle: PoolHandle<T>) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.acquired && slot.generation == handle.generation)
            .map(|slot| &mut slot.payload)
    }

    /// Resolves a raw index read from a GPU row.
    ///
    /// Released records resolve to their cleared payload.
    pub fn payload_at(&self, index: u32) -> Option<&T> {
        self.slots.get(index as usize).map(|slot| &slot.payload)
    }

    /// High-water mark: the number of records ever created.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no record was ever created.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of released records waiting for reuse.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Number of records currently acquired.
    pub fn acquired_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

impl<T: Default> fmt::Debug for IndexPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexPool")
            .field("label", &self.label)
            .field("len", &self.slots.len())
            .field("free", &self.free.len())
            .finish()
    }
}
