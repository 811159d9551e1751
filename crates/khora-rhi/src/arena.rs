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

//! A growable bump allocator backing a single command list.
//!
//! An [`Arena`] hands out memory from a chain of fixed-size blocks with a
//! monotonically advancing offset. Issued pointers never move: the arena grows
//! by acquiring new blocks, and memory is only reclaimed in bulk by
//! [`Arena::reset`], which keeps the blocks for the next recording session.
//! Nothing allocated here has its destructor run by the arena; owners of
//! non-trivial values (the command chain) destruct them explicitly.

use std::alloc::{self, Layout};
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::Mutex;

use khora_core::memory;

/// Alignment of every block; allocations with a larger alignment are padded.
const BLOCK_ALIGN: usize = 16;

/// The maximum number of idle arenas an [`ArenaPool`] keeps around.
const MAX_POOLED_ARENAS: usize = 32;

#[derive(Debug)]
struct Block {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl Block {
    fn new(size: usize) -> Self {
        let layout = match Layout::from_size_align(size, BLOCK_ALIGN) {
            Ok(layout) => layout,
            Err(_) => panic!("Arena block of {size} bytes has an invalid layout"),
        };
        // SAFETY: `layout` has a non-zero size, guaranteed by `Arena::new`.
        let raw = unsafe { alloc::alloc(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            // Resource exhaustion is fatal at this layer.
            alloc::handle_alloc_error(layout);
        };
        memory::record_block_acquired(size);
        Self { ptr, layout }
    }

    fn size(&self) -> usize {
        self.layout.size()
    }

    fn base(&self) -> usize {
        self.ptr.as_ptr() as usize
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        // SAFETY: `ptr` was allocated in `Block::new` with this exact layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };
        memory::record_block_released(self.layout.size());
    }
}

/// A typed view of a run of values copied into an arena.
///
/// The view is only valid while the arena that produced it has not been reset
/// or dropped; reading it is therefore `unsafe`.
pub struct ArenaSlice<T> {
    ptr: NonNull<T>,
    len: usize,
    _marker: PhantomData<T>,
}

/// A run of bytes copied into an arena.
pub type ArenaBytes = ArenaSlice<u8>;

impl<T> Clone for ArenaSlice<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ArenaSlice<T> {}

impl<T> std::fmt::Debug for ArenaSlice<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArenaSlice")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

// SAFETY: the slice is plain data living in an arena that moves between
// threads together with the list owning both.
unsafe impl<T: Send> Send for ArenaSlice<T> {}
unsafe impl<T: Sync> Sync for ArenaSlice<T> {}

impl<T> ArenaSlice<T> {
    /// An empty slice that points at no arena memory.
    pub fn empty() -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
            _marker: PhantomData,
        }
    }

    /// The number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the slice holds no element.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Borrows the elements.
    ///
    /// # Safety
    ///
    /// The producing arena must be alive and not reset since this slice was
    /// allocated, and no mutable borrow of the same slice may be live.
    pub unsafe fn as_slice<'a>(&self) -> &'a [T] {
        std::slice::from_raw_parts(self.ptr.as_ptr(), self.len)
    }

    /// Mutably borrows the elements.
    ///
    /// # Safety
    ///
    /// Same as [`as_slice`](Self::as_slice), and no other borrow of the slice
    /// may be live.
    pub unsafe fn as_mut_slice<'a>(&mut self) -> &'a mut [T] {
        std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len)
    }
}

/// A block-based bump allocator.
#[derive(Debug)]
pub struct Arena {
    blocks: Vec<Block>,
    current: usize,
    offset: usize,
    block_size: usize,
    used: usize,
}

// SAFETY: the arena exclusively owns its blocks; the raw pointers are never
// shared with another arena.
unsafe impl Send for Arena {}

impl Arena {
    /// Creates an empty arena growing by blocks of `block_size` bytes.
    /// No memory is reserved until the first allocation.
    pub fn new(block_size: usize) -> Self {
        Self {
            blocks: Vec::new(),
            current: 0,
            offset: 0,
            block_size: block_size.max(BLOCK_ALIGN),
            used: 0,
        }
    }

    /// Allocates `size` bytes aligned to `align`.
    ///
    /// Never fails recoverably: running out of memory aborts.
    ///
    /// # Panics
    ///
    /// Panics if `align` is not a power of two.
    pub fn alloc_raw(&mut self, size: usize, align: usize) -> NonNull<u8> {
        assert!(align.is_power_of_two(), "Arena alignment {align} is not a power of two");

        if let Some(ptr) = self.try_bump(size, align) {
            return ptr;
        }

        // Move on to the next block that can hold the request, reusing blocks
        // kept from a previous session before acquiring a new one.
        let needed = size + align.saturating_sub(BLOCK_ALIGN);
        let mut next = if self.blocks.is_empty() { 0 } else { self.current + 1 };
        while next < self.blocks.len() && self.blocks[next].size() < needed {
            next += 1;
        }
        if next == self.blocks.len() {
            self.blocks.push(Block::new(needed.max(self.block_size)));
        } else if next != self.current + 1 && !self.blocks.is_empty() {
            // Keep the chosen block right after the current one so later
            // sessions walk the blocks in the same order.
            let block = self.blocks.remove(next);
            self.blocks.insert(self.current + 1, block);
            next = self.current + 1;
        }
        self.current = next;
        self.offset = 0;

        match self.try_bump(size, align) {
            Some(ptr) => ptr,
            None => panic!("Arena block too small for a {size} byte allocation"),
        }
    }

    fn try_bump(&mut self, size: usize, align: usize) -> Option<NonNull<u8>> {
        let block = self.blocks.get(self.current)?;
        let base = block.base();
        let start = (base + self.offset).checked_next_multiple_of(align)? - base;
        let end = start.checked_add(size)?;
        if end > block.size() {
            return None;
        }
        let issued = end - self.offset;
        self.offset = end;
        self.used += issued;
        memory::record_bytes_issued(issued);
        // SAFETY: `start..end` lies within the block.
        Some(unsafe { NonNull::new_unchecked(block.ptr.as_ptr().add(start)) })
    }

    /// Moves `value` into the arena and returns a pointer to it.
    ///
    /// The arena never drops `value`; the caller is responsible for it.
    pub fn alloc<T>(&mut self, value: T) -> NonNull<T> {
        let ptr = self
            .alloc_raw(std::mem::size_of::<T>(), std::mem::align_of::<T>())
            .cast::<T>();
        // SAFETY: freshly allocated, properly sized and aligned memory.
        unsafe { ptr.as_ptr().write(value) };
        ptr
    }

    /// Copies `data` into the arena.
    pub fn alloc_slice_copy<T: Copy>(&mut self, data: &[T]) -> ArenaSlice<T> {
        if data.is_empty() {
            return ArenaSlice::empty();
        }
        let ptr = self
            .alloc_raw(std::mem::size_of_val(data), std::mem::align_of::<T>())
            .cast::<T>();
        // SAFETY: the destination is fresh arena memory of the same size and
        // cannot overlap `data`.
        unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.as_ptr(), data.len()) };
        ArenaSlice {
            ptr,
            len: data.len(),
            _marker: PhantomData,
        }
    }

    /// Copies a byte payload into the arena.
    pub fn alloc_bytes(&mut self, data: &[u8]) -> ArenaBytes {
        self.alloc_slice_copy(data)
    }

    /// Allocates `len` zeroed bytes.
    pub fn alloc_zeroed_bytes(&mut self, len: usize) -> ArenaBytes {
        if len == 0 {
            return ArenaSlice::empty();
        }
        let ptr = self.alloc_raw(len, 1);
        // SAFETY: freshly allocated memory of `len` bytes.
        unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0, len) };
        ArenaSlice {
            ptr,
            len,
            _marker: PhantomData,
        }
    }

    /// Bytes handed out since the last reset, alignment padding included.
    pub fn used_memory(&self) -> usize {
        self.used
    }

    /// Bytes reserved by all blocks.
    pub fn reserved_memory(&self) -> usize {
        self.blocks.iter().map(Block::size).sum()
    }

    /// The number of blocks acquired.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Reclaims every allocation at once. Blocks are kept for reuse, and all
    /// pointers previously issued become dangling.
    pub fn reset(&mut self) {
        self.current = 0;
        self.offset = 0;
        self.used = 0;
    }
}

/// A pool of idle arenas shared by the command lists of one executor.
#[derive(Debug)]
pub struct ArenaPool {
    block_size: usize,
    idle: Mutex<Vec<Arena>>,
}

impl ArenaPool {
    /// Creates an empty pool whose arenas grow by `block_size` bytes.
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Takes an idle arena, or creates a new one.
    pub fn acquire(&self) -> Arena {
        self.idle
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Arena::new(self.block_size))
    }

    /// Resets `arena` and returns it to the pool.
    pub fn release(&self, mut arena: Arena) {
        arena.reset();
        let mut idle = self.idle.lock().unwrap();
        if idle.len() < MAX_POOLED_ARENAS {
            idle.push(arena);
        }
    }

    /// The number of idle arenas.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap().len()
    }

    /// Frees every idle arena.
    pub fn trim(&self) {
        let freed: Vec<Arena> = std::mem::take(&mut *self.idle.lock().unwrap());
        if !freed.is_empty() {
            log::debug!("ArenaPool: released {} idle arenas.", freed.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_is_respected() {
        let mut arena = Arena::new(1024);
        arena.alloc_raw(1, 1);
        for align in [1usize, 2, 4, 8, 16, 32, 64] {
            let ptr = arena.alloc_raw(3, align);
            assert_eq!(ptr.as_ptr() as usize % align, 0, "align {align}");
        }
    }

    #[test]
    fn test_growth_never_moves_issued_pointers() {
        let mut arena = Arena::new(256);
        let first = arena.alloc(0xDEAD_BEEF_u32);
        for i in 0..200u64 {
            arena.alloc(i);
        }
        assert!(arena.block_count() > 1);
        // SAFETY: the arena has not been reset.
        assert_eq!(unsafe { *first.as_ptr() }, 0xDEAD_BEEF);
    }

    #[test]
    fn test_oversized_allocation_gets_its_own_block() {
        let mut arena = Arena::new(256);
        let big = arena.alloc_zeroed_bytes(4096);
        assert_eq!(big.len(), 4096);
        assert!(arena.reserved_memory() >= 4096);
        // SAFETY: the arena has not been reset.
        assert!(unsafe { big.as_slice() }.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_reset_reuses_blocks() {
        let mut arena = Arena::new(256);
        for _ in 0..100 {
            arena.alloc([0u8; 16]);
        }
        let blocks = arena.block_count();
        let reserved = arena.reserved_memory();
        assert!(arena.used_memory() >= 1600);

        arena.reset();
        assert_eq!(arena.used_memory(), 0);
        for _ in 0..100 {
            arena.alloc([0u8; 16]);
        }
        assert_eq!(arena.block_count(), blocks);
        assert_eq!(arena.reserved_memory(), reserved);
    }

    #[test]
    fn test_copied_payload_outlives_source() {
        let mut arena = Arena::new(256);
        let copy = {
            let name = String::from("ShadowDepths");
            arena.alloc_bytes(name.as_bytes())
        };
        // SAFETY: the arena has not been reset.
        assert_eq!(unsafe { copy.as_slice() }, b"ShadowDepths");
    }

    #[test]
    fn test_empty_copy_does_not_allocate() {
        let mut arena = Arena::new(256);
        let empty = arena.alloc_bytes(&[]);
        assert!(empty.is_empty());
        assert_eq!(arena.block_count(), 0);
    }

    #[test]
    fn test_pool_recycles_arenas() {
        let pool = ArenaPool::new(512);
        let mut arena = pool.acquire();
        arena.alloc(42u64);
        pool.release(arena);
        assert_eq!(pool.idle_count(), 1);

        let recycled = pool.acquire();
        assert_eq!(recycled.used_memory(), 0);
        assert_eq!(recycled.block_count(), 1);
        pool.release(recycled);

        pool.trim();
        assert_eq!(pool.idle_count(), 0);
    }
}
