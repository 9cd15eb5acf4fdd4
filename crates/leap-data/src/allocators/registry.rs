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

//! The insertion-ordered registry of live blocks.

use super::block::Block;
use std::alloc::{GlobalAlloc, Layout};
use std::ptr::NonNull;

/// One link of the registry.
struct Node {
    block: NonNull<Block>,
    next: Option<NonNull<Node>>,
}

/// The position of a registered block, as found by [`BlockRegistry::find`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cursor {
    prev: Option<NonNull<Node>>,
    node: NonNull<Node>,
}

impl Cursor {
    /// The block this cursor points at.
    pub(crate) fn block(&self) -> NonNull<Block> {
        // SAFETY: a cursor is only produced for a node currently linked in the registry.
        unsafe { self.node.as_ref().block }
    }
}

/// A singly linked list with one node per live block, in allocation order.
///
/// Nodes are allocated from the same inner allocator as the blocks, never from
/// the block allocator itself, so registering a block cannot recurse.
///
/// Removal checks the head, then the tail, then scans from the second node.
/// That is O(1) to identify blocks freed in LIFO or FIFO order and O(n) in
/// the worst case, which makes n unordered frees O(n²).
pub(crate) struct BlockRegistry {
    head: Option<NonNull<Node>>,
    tail: Option<NonNull<Node>>,
    len: usize,
}

// SAFETY: the registry exclusively owns its nodes, and the blocks it points to
// are owned by the allocator holding the registry. Nothing is shared with the
// thread that created them.
unsafe impl Send for BlockRegistry {}

impl BlockRegistry {
    pub(crate) const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Appends `block` at the tail.
    ///
    /// Returns `false` if the node could not be allocated; the registry is left unchanged.
    ///
    /// # Safety
    ///
    /// `alloc` must be the allocator every other call on this registry uses.
    pub(crate) unsafe fn push_back<A: GlobalAlloc>(&mut self, alloc: &A, block: NonNull<Block>) -> bool {
        let raw = unsafe { alloc.alloc(Layout::new::<Node>()) }.cast::<Node>();
        let Some(node) = NonNull::new(raw) else {
            return false;
        };
        unsafe { node.as_ptr().write(Node { block, next: None }) };

        match self.tail {
            Some(mut tail) => unsafe { tail.as_mut().next = Some(node) },
            None => self.head = Some(node),
        }
        self.tail = Some(node);
        self.len += 1;
        true
    }

    /// Locates the node holding `block` without touching the block itself.
    pub(crate) fn find(&self, block: *const Block) -> Option<Cursor> {
        let head = self.head?;
        // SAFETY: every linked node is a live allocation owned by the registry.
        unsafe {
            if head.as_ref().block.as_ptr().cast_const() == block {
                return Some(Cursor {
                    prev: None,
                    node: head,
                });
            }

            if let Some(tail) = self.tail {
                if tail.as_ref().block.as_ptr().cast_const() == block {
                    // The tail is identified in O(1), but unlinking it still
                    // needs its predecessor.
                    let mut prev = head;
                    while let Some(next) = prev.as_ref().next {
                        if next == tail {
                            break;
                        }
                        prev = next;
                    }
                    return Some(Cursor {
                        prev: Some(prev),
                        node: tail,
                    });
                }
            }

            // The head was already checked, start at the second node.
            let mut prev = head;
            let mut current = head.as_ref().next;
            while let Some(node) = current {
                if node.as_ref().block.as_ptr().cast_const() == block {
                    return Some(Cursor {
                        prev: Some(prev),
                        node,
                    });
                }
                prev = node;
                current = node.as_ref().next;
            }
        }
        None
    }

    /// Unlinks the node at `cursor` and frees it, returning the block it held.
    ///
    /// # Safety
    ///
    /// `cursor` must come from [`find`](Self::find) on this registry with no
    /// mutation in between, and `alloc` must be the registry's allocator.
    pub(crate) unsafe fn unlink<A: GlobalAlloc>(&mut self, alloc: &A, cursor: Cursor) -> NonNull<Block> {
        let Cursor { prev, node } = cursor;
        let (block, next) = unsafe {
            let node_ref = node.as_ref();
            (node_ref.block, node_ref.next)
        };

        match prev {
            Some(mut prev) => unsafe { prev.as_mut().next = next },
            None => self.head = next,
        }
        if self.tail == Some(node) {
            self.tail = prev;
        }
        self.len -= 1;

        unsafe { alloc.dealloc(node.as_ptr().cast::<u8>(), Layout::new::<Node>()) };
        block
    }

    /// Unlinks and frees the oldest node, returning its block.
    ///
    /// # Safety
    ///
    /// `alloc` must be the registry's allocator.
    pub(crate) unsafe fn pop_front<A: GlobalAlloc>(&mut self, alloc: &A) -> Option<NonNull<Block>> {
        let head = self.head?;
        Some(unsafe {
            self.unlink(
                alloc,
                Cursor {
                    prev: None,
                    node: head,
                },
            )
        })
    }

    /// Iterates over the registered blocks in allocation order.
    pub(crate) fn iter(&self) -> Iter<'_> {
        Iter {
            current: self.head,
            _registry: std::marker::PhantomData,
        }
    }
}

/// Iterator over registered blocks, oldest first.
pub(crate) struct Iter<'a> {
    current: Option<NonNull<Node>>,
    _registry: std::marker::PhantomData<&'a BlockRegistry>,
}

impl Iterator for Iter<'_> {
    type Item = NonNull<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;
        // SAFETY: the borrow of the registry keeps every node alive and linked.
        let node = unsafe { node.as_ref() };
        self.current = node.next;
        Some(node.block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::alloc::System;

    /// The registry never dereferences blocks, so distinct dangling addresses are enough.
    fn fake_block(addr: usize) -> NonNull<Block> {
        NonNull::new(addr as *mut Block).unwrap()
    }

    fn drain(registry: &mut BlockRegistry) {
        while unsafe { registry.pop_front(&System) }.is_some() {}
    }

    fn contents(registry: &BlockRegistry) -> Vec<usize> {
        registry.iter().map(|b| b.as_ptr() as usize).collect()
    }

    fn remove(registry: &mut BlockRegistry, addr: usize) -> bool {
        match registry.find(addr as *const Block) {
            Some(cursor) => {
                unsafe { registry.unlink(&System, cursor) };
                true
            }
            None => false,
        }
    }

    #[test]
    fn test_push_keeps_insertion_order() {
        let mut registry = BlockRegistry::new();
        for addr in [0x10, 0x20, 0x30] {
            assert!(unsafe { registry.push_back(&System, fake_block(addr)) });
        }
        assert_eq!(registry.len(), 3);
        assert_eq!(contents(&registry), vec![0x10, 0x20, 0x30]);
        drain(&mut registry);
    }

    #[test]
    fn test_remove_head_middle_and_tail() {
        let mut registry = BlockRegistry::new();
        for addr in [0x10, 0x20, 0x30, 0x40] {
            unsafe { registry.push_back(&System, fake_block(addr)) };
        }

        assert!(remove(&mut registry, 0x10));
        assert_eq!(contents(&registry), vec![0x20, 0x30, 0x40]);

        assert!(remove(&mut registry, 0x30));
        assert_eq!(contents(&registry), vec![0x20, 0x40]);

        assert!(remove(&mut registry, 0x40));
        assert_eq!(contents(&registry), vec![0x20]);

        // The tail pointer must have moved back, so appends land after 0x20.
        unsafe { registry.push_back(&System, fake_block(0x50)) };
        assert_eq!(contents(&registry), vec![0x20, 0x50]);
        assert_eq!(registry.len(), 2);
        drain(&mut registry);
    }

    #[test]
    fn test_remove_last_remaining_block_empties_registry() {
        let mut registry = BlockRegistry::new();
        unsafe { registry.push_back(&System, fake_block(0x10)) };
        assert!(remove(&mut registry, 0x10));
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);

        unsafe { registry.push_back(&System, fake_block(0x20)) };
        assert_eq!(contents(&registry), vec![0x20]);
        drain(&mut registry);
    }

    #[test]
    fn test_unknown_block_is_not_found() {
        let mut registry = BlockRegistry::new();
        assert!(registry.find(0x10 as *const Block).is_none());
        unsafe { registry.push_back(&System, fake_block(0x10)) };
        assert!(!remove(&mut registry, 0x99));
        assert_eq!(registry.len(), 1);
        drain(&mut registry);
    }
}
