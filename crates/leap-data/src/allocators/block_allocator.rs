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

//! The single-threaded tagged block allocator.

use super::block::{Block, BlockLayout, HEADER_SIZE, MEMORY_TAG};
use super::registry::{self, BlockRegistry};
use leap_core::memory::MemoryTracker;
use std::alloc::{handle_alloc_error, GlobalAlloc, Layout, System};
use std::mem::align_of;
use std::ptr::NonNull;

/// An allocator that tags every block it hands out and records it in a registry.
///
/// Each request is served by one allocation from the inner allocator, sized for
/// the caller's bytes plus a header. The header holds the [`MEMORY_TAG`]
/// sentinel and the requested byte count, and the count is reported to the
/// injected [`MemoryTracker`].
///
/// Releasing a pointer first checks that the registry holds its block, so
/// null, foreign, and already-released pointers are ignored without reading
/// memory the allocator does not own.
///
/// The allocator is not synchronised. Use [`LeapAllocator`](super::LeapAllocator)
/// for a thread-safe, process-wide hook.
///
/// # Type Parameters
///
/// * `A`: The underlying allocator that performs the actual memory allocation.
///   Defaults to `System`, the standard Rust allocator.
pub struct BlockAllocator<A: GlobalAlloc = System> {
    inner: A,
    registry: BlockRegistry,
    tracker: &'static MemoryTracker,
}

impl<A: GlobalAlloc> BlockAllocator<A> {
    /// Creates an allocator that serves memory from `inner` and reports to `tracker`.
    pub const fn new(inner: A, tracker: &'static MemoryTracker) -> Self {
        Self {
            inner,
            registry: BlockRegistry::new(),
            tracker,
        }
    }

    /// Returns the wrapped allocator.
    #[inline]
    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Returns the tracker this allocator reports to.
    #[inline]
    pub fn tracker(&self) -> &'static MemoryTracker {
        self.tracker
    }

    /// Allocates `byte_count` bytes aligned for the block header.
    ///
    /// A request for zero bytes is served as a request for one byte, so every
    /// call returns a distinct, valid pointer.
    ///
    /// There is no recovery from an exhausted system allocator: on failure this
    /// calls [`handle_alloc_error`], which aborts the process. A byte count too
    /// large to describe as a `Layout` aborts as well.
    pub fn allocate(&mut self, byte_count: usize) -> NonNull<u8> {
        let Some(layout) = byte_request(byte_count) else {
            capacity_overflow()
        };
        match self.allocate_layout(layout) {
            Some(ptr) => ptr,
            None => handle_alloc_error(layout),
        }
    }

    /// Allocates memory for `layout`, honouring its alignment.
    ///
    /// Zero-sized layouts are served as one byte. Returns `None` if the inner
    /// allocator fails or the padded size overflows.
    pub fn allocate_layout(&mut self, layout: Layout) -> Option<NonNull<u8>> {
        let size = layout.size().max(1);
        let request = Layout::from_size_align(size, layout.align()).ok()?;
        let block_layout = BlockLayout::for_request(request)?;

        let base = NonNull::new(unsafe { self.inner.alloc(block_layout.system) })?;
        // SAFETY: `base` is a fresh allocation of `block_layout.system`.
        let block = unsafe { Block::write(base, block_layout, size) };

        if !unsafe { self.registry.push_back(&self.inner, block) } {
            unsafe { self.inner.dealloc(base.as_ptr(), block_layout.system) };
            return None;
        }

        self.tracker.track_memory(size as u64);
        // SAFETY: the header was just written.
        Some(unsafe { block.as_ref().data })
    }

    /// Releases a block previously returned by this allocator.
    ///
    /// Null pointers, pointers this allocator never returned, pointers already
    /// released, and blocks whose tag was overwritten are silently ignored.
    ///
    /// # Safety
    ///
    /// If `ptr` was returned by this allocator, the memory behind it must not
    /// be accessed after this call.
    pub unsafe fn deallocate(&mut self, ptr: *mut u8) {
        let _ = unsafe { self.release(ptr) };
    }

    /// Releases `ptr` if it is a live block of this allocator.
    ///
    /// # Safety
    ///
    /// Same contract as [`deallocate`](Self::deallocate).
    pub(crate) unsafe fn release(&mut self, ptr: *mut u8) -> Release {
        if ptr.is_null() {
            return Release::NotRegistered;
        }

        let Some(cursor) = self.registry.find(Block::header_of(ptr)) else {
            return Release::NotRegistered;
        };

        // SAFETY: the registry confirmed the header belongs to a live block.
        let header = unsafe { &mut *cursor.block().as_ptr() };
        if !header.is_valid() {
            return Release::BadTag;
        }

        self.tracker.untrack_memory(header.size as u64);
        let (base, system_layout) = (header.base, header.system_layout);
        header.tag = 0;

        unsafe {
            self.registry.unlink(&self.inner, cursor);
            self.inner.dealloc(base.as_ptr(), system_layout);
        }
        Release::Released
    }

    /// Returns `true` if `ptr` is the start of a live block of this allocator.
    pub fn contains(&self, ptr: *const u8) -> bool {
        !ptr.is_null()
            && self
                .registry
                .find(Block::header_of(ptr.cast_mut()))
                .is_some()
    }

    /// Returns the byte count recorded for the live block starting at `ptr`.
    pub fn block_size(&self, ptr: *const u8) -> Option<usize> {
        if ptr.is_null() {
            return None;
        }
        let cursor = self.registry.find(Block::header_of(ptr.cast_mut()))?;
        // SAFETY: the registry confirmed the header belongs to a live block.
        Some(unsafe { cursor.block().as_ref().size })
    }

    /// Number of live blocks.
    #[inline]
    pub fn block_count(&self) -> usize {
        self.registry.len()
    }

    /// Sum of the byte counts of all live blocks.
    pub fn live_bytes(&self) -> usize {
        self.live_blocks().map(|(_, size)| size).sum()
    }

    /// Iterates over live blocks as `(pointer, byte count)`, oldest first.
    pub fn live_blocks(&self) -> LiveBlocks<'_> {
        LiveBlocks {
            inner: self.registry.iter(),
        }
    }

    /// Releases every live block, oldest first, untracking each one.
    pub fn release_all(&mut self) {
        // SAFETY: the registry only holds blocks written by this allocator.
        while let Some(block) = unsafe { self.registry.pop_front(&self.inner) } {
            let header = unsafe { &mut *block.as_ptr() };
            self.tracker.untrack_memory(header.size as u64);
            let (base, system_layout) = (header.base, header.system_layout);
            header.tag = 0;
            unsafe { self.inner.dealloc(base.as_ptr(), system_layout) };
        }
    }
}

impl<A: GlobalAlloc> Drop for BlockAllocator<A> {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl<A: GlobalAlloc> std::fmt::Debug for BlockAllocator<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockAllocator")
            .field("blocks", &self.block_count())
            .field("header_size", &HEADER_SIZE)
            .field("tag", &format_args!("{MEMORY_TAG:#06X}"))
            .finish()
    }
}

/// Iterator over the live blocks of a [`BlockAllocator`].
pub struct LiveBlocks<'a> {
    inner: registry::Iter<'a>,
}

impl Iterator for LiveBlocks<'_> {
    type Item = (NonNull<u8>, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.inner.next()?;
        // SAFETY: registered headers stay valid while the registry is borrowed.
        let header = unsafe { block.as_ref() };
        Some((header.data, header.size))
    }
}

/// The layout served for a plain byte-count request, or `None` if it exceeds `isize::MAX`.
fn byte_request(byte_count: usize) -> Option<Layout> {
    Layout::from_size_align(byte_count.max(1), align_of::<Block>()).ok()
}

/// Outcome of [`BlockAllocator::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Release {
    /// The block was untracked and returned to the inner allocator.
    Released,
    /// Null, or not a live block of this allocator.
    NotRegistered,
    /// Registered, but the sentinel tag was overwritten. Nothing was freed.
    BadTag,
}

/// Oversized requests share the out-of-memory path: the process aborts, it never unwinds.
#[cold]
fn capacity_overflow() -> ! {
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> &'static MemoryTracker {
        Box::leak(Box::new(MemoryTracker::new()))
    }

    #[test]
    fn test_allocate_tracks_exact_byte_count() {
        let tracker = tracker();
        let mut allocator = BlockAllocator::new(System, tracker);

        let ptr = allocator.allocate(48);
        assert_eq!(tracker.current_bytes(), 48);
        assert_eq!(allocator.block_count(), 1);
        assert_eq!(allocator.block_size(ptr.as_ptr()), Some(48));

        // The memory is usable.
        unsafe {
            ptr.as_ptr().write_bytes(0xAB, 48);
            assert_eq!(*ptr.as_ptr().add(47), 0xAB);
        }

        unsafe { allocator.deallocate(ptr.as_ptr()) };
        assert_eq!(tracker.current_bytes(), 0);
        assert_eq!(allocator.block_count(), 0);
    }

    #[test]
    fn test_zero_byte_request_counts_as_one() {
        let tracker = tracker();
        let mut allocator = BlockAllocator::new(System, tracker);

        let a = allocator.allocate(0);
        let b = allocator.allocate(0);
        assert_ne!(a, b);
        assert_eq!(tracker.current_bytes(), 2);
        assert_eq!(allocator.block_size(a.as_ptr()), Some(1));
    }

    #[test]
    fn test_oversized_byte_count_has_no_layout() {
        assert_eq!(byte_request(0).map(|l| l.size()), Some(1));
        assert_eq!(byte_request(40).map(|l| l.align()), Some(align_of::<Block>()));
        assert!(byte_request(usize::MAX).is_none());
        assert!(byte_request(isize::MAX as usize).is_none());
    }

    #[test]
    fn test_header_precedes_returned_pointer() {
        let mut allocator = BlockAllocator::new(System, tracker());
        let ptr = allocator.allocate(16);
        let header = unsafe { &*Block::header_of(ptr.as_ptr()) };
        assert_eq!(header.tag, MEMORY_TAG);
        assert_eq!(header.size, 16);
        assert_eq!(header.data, ptr);
    }

    #[test]
    fn test_null_deallocation_is_noop() {
        let tracker = tracker();
        let mut allocator = BlockAllocator::new(System, tracker);
        let _keep = allocator.allocate(8);

        unsafe { allocator.deallocate(std::ptr::null_mut()) };
        assert_eq!(tracker.current_bytes(), 8);
        assert_eq!(allocator.block_count(), 1);
    }

    #[test]
    fn test_double_free_is_noop() {
        let tracker = tracker();
        let mut allocator = BlockAllocator::new(System, tracker);
        let keep = allocator.allocate(100);
        let ptr = allocator.allocate(20);

        unsafe {
            allocator.deallocate(ptr.as_ptr());
            allocator.deallocate(ptr.as_ptr());
        }
        assert_eq!(tracker.current_bytes(), 100);
        assert_eq!(allocator.block_count(), 1);
        assert!(allocator.contains(keep.as_ptr()));
    }

    #[test]
    fn test_foreign_pointer_is_ignored() {
        let tracker = tracker();
        let mut allocator = BlockAllocator::new(System, tracker);
        let _keep = allocator.allocate(4);

        let mut foreign = vec![0u8; 64];
        let foreign_ptr = foreign.as_mut_ptr().wrapping_add(HEADER_SIZE);
        assert!(!allocator.contains(foreign_ptr));
        unsafe { allocator.deallocate(foreign_ptr) };
        assert_eq!(tracker.current_bytes(), 4);
        assert_eq!(allocator.block_count(), 1);
    }

    #[test]
    fn test_corrupted_tag_is_ignored() {
        let tracker = tracker();
        let mut allocator = BlockAllocator::new(System, tracker);
        let ptr = allocator.allocate(12);

        unsafe { (*Block::header_of(ptr.as_ptr())).tag = 0xDEAD };
        unsafe { allocator.deallocate(ptr.as_ptr()) };
        assert_eq!(tracker.current_bytes(), 12);
        assert_eq!(allocator.block_count(), 1);

        // Restore the tag so the block can be released normally.
        unsafe { (*Block::header_of(ptr.as_ptr())).tag = MEMORY_TAG };
        unsafe { allocator.deallocate(ptr.as_ptr()) };
        assert_eq!(tracker.current_bytes(), 0);
    }

    #[test]
    fn test_release_distinguishes_foreign_from_bad_tag() {
        let mut allocator = BlockAllocator::new(System, tracker());
        let ptr = allocator.allocate(16);

        let mut foreign = [0u8; 64];
        let foreign_ptr = foreign.as_mut_ptr().wrapping_add(HEADER_SIZE);
        assert_eq!(unsafe { allocator.release(foreign_ptr) }, Release::NotRegistered);
        assert_eq!(
            unsafe { allocator.release(std::ptr::null_mut()) },
            Release::NotRegistered
        );

        unsafe { (*Block::header_of(ptr.as_ptr())).tag = 0xDEAD };
        assert_eq!(unsafe { allocator.release(ptr.as_ptr()) }, Release::BadTag);
        assert!(allocator.contains(ptr.as_ptr()));

        unsafe { (*Block::header_of(ptr.as_ptr())).tag = MEMORY_TAG };
        assert_eq!(unsafe { allocator.release(ptr.as_ptr()) }, Release::Released);
        assert_eq!(allocator.block_count(), 0);
    }

    #[test]
    fn test_free_order_lifo_fifo_and_random() {
        let tracker = tracker();
        let mut allocator = BlockAllocator::new(System, tracker);
        let sizes = [3usize, 17, 64, 1, 250, 9];
        let ptrs: Vec<_> = sizes.iter().map(|&s| allocator.allocate(s)).collect();
        assert_eq!(tracker.current_bytes(), sizes.iter().sum::<usize>() as u64);

        // Middle, tail, head, then the rest.
        for index in [2usize, 5, 0, 4, 1, 3] {
            let before = tracker.current_bytes();
            unsafe { allocator.deallocate(ptrs[index].as_ptr()) };
            assert_eq!(before - tracker.current_bytes(), sizes[index] as u64);
            assert!(!allocator.contains(ptrs[index].as_ptr()));
        }
        assert_eq!(allocator.block_count(), 0);
        assert_eq!(tracker.current_bytes(), 0);
    }

    #[test]
    fn test_allocate_layout_respects_alignment() {
        let mut allocator = BlockAllocator::new(System, tracker());
        for align in [1usize, 8, 64, 256, 4096] {
            let layout = Layout::from_size_align(24, align).unwrap();
            let ptr = allocator.allocate_layout(layout).unwrap();
            assert_eq!(ptr.as_ptr() as usize % align, 0, "alignment {align}");
            assert_eq!(allocator.block_size(ptr.as_ptr()), Some(24));
        }
        assert_eq!(allocator.block_count(), 5);
    }

    #[test]
    fn test_live_blocks_in_allocation_order() {
        let mut allocator = BlockAllocator::new(System, tracker());
        let a = allocator.allocate(5);
        let b = allocator.allocate(6);
        let c = allocator.allocate(7);
        unsafe { allocator.deallocate(b.as_ptr()) };

        let live: Vec<_> = allocator.live_blocks().collect();
        assert_eq!(live, vec![(a, 5), (c, 7)]);
        assert_eq!(allocator.live_bytes(), 12);
    }

    #[test]
    fn test_release_all_and_drop_untrack_everything() {
        let tracker = tracker();
        {
            let mut allocator = BlockAllocator::new(System, tracker);
            allocator.allocate(10);
            allocator.allocate(20);
            allocator.release_all();
            assert_eq!(allocator.block_count(), 0);
            assert_eq!(tracker.current_bytes(), 0);

            allocator.allocate(30);
        }
        assert_eq!(tracker.current_bytes(), 0);
        assert_eq!(tracker.stats().total_deallocations, 3);
    }
}
