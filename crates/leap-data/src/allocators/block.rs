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

//! The header written in front of every allocated block.

use std::alloc::Layout;
use std::mem::{align_of, size_of};
use std::ptr::NonNull;

/// The sentinel value stored in every live block header.
pub const MEMORY_TAG: u16 = 0xBEEF;

/// Size, in bytes, of the header that precedes every returned pointer.
pub const HEADER_SIZE: usize = size_of::<Block>();

const HEADER_ALIGN: usize = align_of::<Block>();

/// Bookkeeping for one allocation.
///
/// The header always occupies the `HEADER_SIZE` bytes directly before `data`.
/// When the caller asks for an alignment larger than the header's, the padding
/// sits in front of the header, between `base` and the header itself.
#[repr(C)]
pub(crate) struct Block {
    /// `MEMORY_TAG` while the block is live, cleared on release.
    pub(crate) tag: u16,
    /// The byte count reported to the tracker.
    pub(crate) size: usize,
    /// Start of the usable memory.
    pub(crate) data: NonNull<u8>,
    /// Start of the underlying system allocation.
    pub(crate) base: NonNull<u8>,
    /// Layout of the underlying system allocation.
    pub(crate) system_layout: Layout,
}

/// Where a block's pieces live inside a single system allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockLayout {
    /// The layout requested from the inner allocator.
    pub(crate) system: Layout,
    /// Offset of the usable memory from the start of the system allocation.
    pub(crate) data_offset: usize,
}

impl BlockLayout {
    /// Computes the system layout needed to serve `request` with a header in front.
    ///
    /// Returns `None` if the total size overflows.
    pub(crate) fn for_request(request: Layout) -> Option<Self> {
        let align = request.align().max(HEADER_ALIGN);
        // Rounding HEADER_SIZE up to `align` keeps both the header and the data aligned.
        let data_offset = HEADER_SIZE.checked_next_multiple_of(align)?;
        let total = data_offset.checked_add(request.size())?;
        let system = Layout::from_size_align(total, align).ok()?;
        Some(Self {
            system,
            data_offset,
        })
    }
}

impl Block {
    /// Writes a fresh header into a system allocation and returns it.
    ///
    /// # Safety
    ///
    /// `base` must point to a live allocation of `layout.system`.
    pub(crate) unsafe fn write(base: NonNull<u8>, layout: BlockLayout, size: usize) -> NonNull<Block> {
        let data = unsafe { NonNull::new_unchecked(base.as_ptr().add(layout.data_offset)) };
        let header = unsafe { data.as_ptr().sub(HEADER_SIZE) }.cast::<Block>();
        unsafe {
            header.write(Block {
                tag: MEMORY_TAG,
                size,
                data,
                base,
                system_layout: layout.system,
            });
            NonNull::new_unchecked(header)
        }
    }

    /// Computes where the header of `data` would be if it came from a block.
    ///
    /// Uses wrapping arithmetic and never dereferences, so it is safe to call
    /// with pointers of unknown origin. The result may only be read once the
    /// registry confirms it belongs to a live block.
    #[inline]
    pub(crate) fn header_of(data: *mut u8) -> *mut Block {
        data.wrapping_sub(HEADER_SIZE).cast::<Block>()
    }

    /// Returns `true` if the sentinel tag is intact.
    #[inline]
    pub(crate) fn is_valid(&self) -> bool {
        self.tag == MEMORY_TAG
    }
}
