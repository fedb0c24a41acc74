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

//! First-fit allocator of contiguous row ranges inside a growable buffer.
//!
//! The allocator only does bookkeeping. The owner of the buffer grows it in
//! step with [`BlockAllocator::grow`].

/// A contiguous range of rows handed out by a [`BlockAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    /// First row.
    pub index: usize,
    /// Number of rows.
    pub count: usize,
}

#[derive(Debug, Clone, Copy)]
struct Span {
    index: usize,
    count: usize,
    free: bool,
}

/// Hands out row ranges, merging neighbouring free ranges on release.
#[derive(Debug, Default)]
pub struct BlockAllocator {
    spans: Vec<Span>,
    size: usize,
}

impl BlockAllocator {
    /// Creates an allocator managing `size` rows.
    pub fn new(size: usize) -> Self {
        let mut allocator = Self::default();
        allocator.grow(size);
        allocator
    }

    /// Total number of managed rows.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Allocates `count` contiguous rows from the first free range large enough.
    ///
    /// Returns `None` when `count` is zero or no free range fits.
    pub fn allocate(&mut self, count: usize) -> Option<Block> {
        if count == 0 {
            return None;
        }
        let position = self
            .spans
            .iter()
            .position(|span| span.free && span.count >= count)?;

        let span = self.spans[position];
        self.spans[position] = Span {
            index: span.index,
            count,
            free: false,
        };
        if span.count > count {
            self.spans.insert(
                position + 1,
                Span {
                    index: span.index + count,
                    count: span.count - count,
                    free: true,
                },
            );
        }
        Some(Block {
            index: span.index,
            count,
        })
    }

    /// Returns a block to the allocator.
    ///
    /// # Panics
    /// If `block` was not handed out by this allocator or is already free.
    pub fn release(&mut self, block: Block) {
        let found = self
            .spans
            .binary_search_by_key(&block.index, |span| span.index)
            .ok()
            .filter(|&i| !self.spans[i].free && self.spans[i].count == block.count);
        let Some(mut position) = found else {
            panic!("release of unknown block {block:?}");
        };

        self.spans[position].free = true;

        if position + 1 < self.spans.len() && self.spans[position + 1].free {
            let next = self.spans.remove(position + 1);
            self.spans[position].count += next.count;
        }
        if position > 0 && self.spans[position - 1].free {
            let current = self.spans.remove(position);
            position -= 1;
            self.spans[position].count += current.count;
        }
    }

    /// Grows the managed range to `new_size` rows. Shrinking is ignored.
    pub fn grow(&mut self, new_size: usize) {
        if new_size <= self.size {
            return;
        }
        let added = new_size - self.size;
        match self.spans.last_mut() {
            Some(last) if last.free => last.count += added,
            _ => self.spans.push(Span {
                index: self.size,
                count: added,
                free: true,
            }),
        }
        self.size = new_size;
    }

    /// Number of free rows after the last allocated block.
    pub fn free_count_at_end(&self) -> usize {
        match self.spans.last() {
            Some(last) if last.free => last.count,
            _ => 0,
        }
    }

    /// Number of rows currently allocated.
    pub fn used_count(&self) -> usize {
        self.spans
            .iter()
            .filter(|span| !span.free)
            .map(|span| span.count)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_allocator_fails() {
        let mut allocator = BlockAllocator::default();
        assert_eq!(allocator.allocate(1), None);
        assert_eq!(allocator.free_count_at_end(), 0);
    }

    #[test]
    fn test_first_fit_and_split() {
        let mut allocator = BlockAllocator::new(10);
        let a = allocator.allocate(3).unwrap();
        let b = allocator.allocate(4).unwrap();
        assert_eq!(a, Block { index: 0, count: 3 });
        assert_eq!(b, Block { index: 3, count: 4 });
        assert_eq!(allocator.free_count_at_end(), 3);
        assert_eq!(allocator.allocate(4), None);
        assert_eq!(allocator.allocate(0), None);
    }

    #[test]
    fn test_release_merges_neighbours() {
        let mut allocator = BlockAllocator::new(9);
        let a = allocator.allocate(3).unwrap();
        let b = allocator.allocate(3).unwrap();
        let c = allocator.allocate(3).unwrap();

        allocator.release(a);
        allocator.release(c);
        assert_eq!(allocator.free_count_at_end(), 3);
        assert_eq!(allocator.allocate(6), None);

        allocator.release(b);
        assert_eq!(allocator.free_count_at_end(), 9);
        assert_eq!(allocator.allocate(9), Some(Block { index: 0, count: 9 }));
    }

    #[test]
    fn test_hole_is_reused_first() {
        let mut allocator = BlockAllocator::new(8);
        let a = allocator.allocate(2).unwrap();
        let _b = allocator.allocate(2).unwrap();
        allocator.release(a);
        assert_eq!(allocator.allocate(1), Some(Block { index: 0, count: 1 }));
        assert_eq!(allocator.used_count(), 3);
    }

    #[test]
    fn test_grow_extends_trailing_free_range() {
        let mut allocator = BlockAllocator::new(4);
        let _a = allocator.allocate(3).unwrap();
        allocator.grow(10);
        assert_eq!(allocator.free_count_at_end(), 7);
        assert_eq!(allocator.allocate(7), Some(Block { index: 3, count: 7 }));

        allocator.grow(12);
        assert_eq!(allocator.size(), 12);
        assert_eq!(allocator.allocate(2), Some(Block { index: 10, count: 2 }));
        assert_eq!(allocator.free_count_at_end(), 0);
    }

    #[test]
    #[should_panic(expected = "unknown block")]
    fn test_double_release_panics() {
        let mut allocator = BlockAllocator::new(4);
        let a = allocator.allocate(2).unwrap();
        allocator.release(a);
        allocator.release(a);
    }
}
