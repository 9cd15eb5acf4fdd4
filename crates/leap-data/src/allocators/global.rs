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

//! A `GlobalAlloc` hook that routes the whole process through a [`BlockAllocator`].

use super::block_allocator::Release;
use super::BlockAllocator;
use leap_core::config::AllocatorSettings;
use leap_core::memory::{MemoryStats, MemoryTracker};
use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Maximum number of leaked blocks a [`ShutdownReport`] records individually.
pub const LEAK_SAMPLE_CAPACITY: usize = 16;

/// A process-wide allocation hook backed by a [`BlockAllocator`].
///
/// Register it as the `#[global_allocator]` and drive its lifecycle explicitly:
/// requests made before [`init`](Self::init) or after [`shutdown`](Self::shutdown)
/// go straight to the inner allocator, untagged and untracked. Releasing a
/// pointer the registry does not know is forwarded to the inner allocator, so
/// memory obtained on either side of a lifecycle transition is always returned
/// to the allocator that produced it.
///
/// The registry is guarded by a `std::sync::Mutex`, which never allocates. No
/// code path holding the lock logs or allocates through the hook.
///
/// # Usage
///
/// ```rust,ignore
/// use leap_core::memory::GLOBAL_TRACKER;
/// use leap_data::allocators::LeapAllocator;
///
/// #[global_allocator]
/// static GLOBAL: LeapAllocator = LeapAllocator::new(std::alloc::System, &GLOBAL_TRACKER);
///
/// fn main() {
///     GLOBAL.init();
///     // ...
///     GLOBAL.shutdown(&Default::default());
/// }
/// ```
pub struct LeapAllocator<A: GlobalAlloc = System> {
    allocator: Mutex<BlockAllocator<A>>,
    active: AtomicBool,
}

impl<A: GlobalAlloc> LeapAllocator<A> {
    /// Creates an inactive hook serving memory from `inner` and reporting to `tracker`.
    pub const fn new(inner: A, tracker: &'static MemoryTracker) -> Self {
        Self {
            allocator: Mutex::new(BlockAllocator::new(inner, tracker)),
            active: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BlockAllocator<A>> {
        // The registry is consistent between operations, so a poisoned lock is still usable.
        self.allocator.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts routing new allocations through the block allocator.
    ///
    /// Resets the tracker when no block is registered, so statistics describe
    /// the current session only. Calling `init` on an active hook does nothing.
    pub fn init(&self) {
        if self.active.load(Ordering::Acquire) {
            return;
        }
        {
            let allocator = self.lock();
            if allocator.block_count() == 0 {
                allocator.tracker().reset();
            }
        }
        self.active.store(true, Ordering::Release);
        log::info!("Block allocator hook enabled");
    }

    /// Stops routing new allocations and reports the blocks still live.
    ///
    /// Blocks that are still registered stay valid: they are released through
    /// the registry whenever their owners free them.
    pub fn shutdown(&self, settings: &AllocatorSettings) -> ShutdownReport {
        self.active.store(false, Ordering::Release);

        let report = {
            let allocator = self.lock();
            let mut report = ShutdownReport {
                live_blocks: allocator.block_count(),
                live_bytes: 0,
                stats: allocator.tracker().stats(),
                sample: [LeakedBlock::default(); LEAK_SAMPLE_CAPACITY],
                sample_len: 0,
            };
            for (ptr, size) in allocator.live_blocks() {
                report.live_bytes += size;
                if report.sample_len < LEAK_SAMPLE_CAPACITY {
                    report.sample[report.sample_len] = LeakedBlock {
                        address: ptr.as_ptr() as usize,
                        size,
                    };
                    report.sample_len += 1;
                }
            }
            report
        };

        // Logging allocates, so it happens only once the lock is released.
        log::info!(
            "Block allocator hook disabled (peak {} bytes over {} allocations)",
            report.stats.peak_bytes,
            report.stats.total_allocations
        );
        if settings.report_leaks_on_shutdown && report.live_blocks > 0 {
            log::warn!(
                "{} block(s) totalling {} bytes still live at shutdown",
                report.live_blocks,
                report.live_bytes
            );
            for leak in report.leaks().iter().take(settings.leak_report_limit) {
                log::warn!("  live block at {:#x}: {} bytes", leak.address, leak.size);
            }
        }
        report
    }

    /// Returns `true` between [`init`](Self::init) and [`shutdown`](Self::shutdown).
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Number of blocks currently registered.
    pub fn block_count(&self) -> usize {
        self.lock().block_count()
    }

    /// Returns `true` if `ptr` is a live block served by the hook.
    pub fn contains(&self, ptr: *const u8) -> bool {
        self.lock().contains(ptr)
    }

    /// Returns the byte count recorded for the live block at `ptr`.
    pub fn block_size(&self, ptr: *const u8) -> Option<usize> {
        self.lock().block_size(ptr)
    }

    /// Takes a snapshot of the tracker this hook reports to.
    pub fn stats(&self) -> MemoryStats {
        self.lock().tracker().stats()
    }
}

unsafe impl<A: GlobalAlloc> GlobalAlloc for LeapAllocator<A> {
    /// Allocates a tagged block while active, otherwise defers to the inner allocator.
    ///
    /// # Safety
    ///
    /// This function is unsafe because it is part of the `GlobalAlloc` trait.
    /// The caller must ensure that `layout` has a non-zero size.
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let mut allocator = self.lock();
        if !self.active.load(Ordering::Acquire) {
            return unsafe { allocator.inner().alloc(layout) };
        }
        allocator
            .allocate_layout(layout)
            .map_or(std::ptr::null_mut(), |ptr| ptr.as_ptr())
    }

    /// Releases a tagged block, or forwards unregistered memory to the inner allocator.
    ///
    /// A registered block whose tag was overwritten is left alone: its data
    /// pointer is not the start of an inner allocation.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `ptr` was allocated by this allocator with the same `layout`.
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        let mut allocator = self.lock();
        match unsafe { allocator.release(ptr) } {
            Release::Released | Release::BadTag => {}
            Release::NotRegistered => unsafe { allocator.inner().dealloc(ptr, layout) },
        }
    }
}

/// A live block listed in a [`ShutdownReport`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeakedBlock {
    /// Address of the usable memory.
    pub address: usize,
    /// The byte count originally requested.
    pub size: usize,
}

/// What was still allocated when the hook shut down.
#[derive(Debug, Clone, Copy)]
pub struct ShutdownReport {
    /// Number of blocks still registered.
    pub live_blocks: usize,
    /// Total bytes of those blocks.
    pub live_bytes: usize,
    /// Tracker snapshot taken at shutdown.
    pub stats: MemoryStats,
    sample: [LeakedBlock; LEAK_SAMPLE_CAPACITY],
    sample_len: usize,
}

impl ShutdownReport {
    /// The oldest live blocks, at most [`LEAK_SAMPLE_CAPACITY`] of them.
    pub fn leaks(&self) -> &[LeakedBlock] {
        &self.sample[..self.sample_len]
    }

    /// Returns `true` if nothing was live at shutdown.
    pub fn is_clean(&self) -> bool {
        self.live_blocks == 0
    }
}
