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

//! Tagged block allocation.
//!
//! Every block handed out carries a small header placed immediately before the
//! returned pointer: a sentinel tag, the requested byte count, and enough
//! information to hand the whole region back to the system. Live blocks are
//! recorded in an insertion-ordered registry so a pointer can be validated
//! before it is released.
//!
//! [`BlockAllocator`] is the single-threaded allocator object.
//! [`LeapAllocator`] wraps one behind a mutex and implements `GlobalAlloc`, with
//! an explicit `init`/`shutdown` lifecycle.

mod block;
mod block_allocator;
mod global;
mod registry;

pub use block::{HEADER_SIZE, MEMORY_TAG};
pub use block_allocator::{BlockAllocator, LiveBlocks};
pub use global::{LeakedBlock, LeapAllocator, ShutdownReport, LEAK_SAMPLE_CAPACITY};
