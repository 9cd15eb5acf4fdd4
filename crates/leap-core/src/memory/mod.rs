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

//! Provides the memory tracker: a running total of live allocated bytes.
//!
//! The tracker forms a "contract" with the engine's block allocator: the
//! allocator is the only writer, reporting every allocation with
//! [`MemoryTracker::track_memory`] and every release with
//! [`MemoryTracker::untrack_memory`]. Any part of the engine can read the
//! counters in a thread-safe manner to monitor memory usage.
//!
//! The tracker is a diagnostic counter, never used for allocation decisions.
//! No bounds checking is performed: untracking more bytes than are currently
//! tracked wraps the live total around silently.
//!
//! Nothing in this module allocates or logs, so it is safe to call from inside
//! a global allocator.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// The process-wide tracker fed by the global allocation hook.
pub static GLOBAL_TRACKER: MemoryTracker = MemoryTracker::new();

/// A set of atomic counters describing the memory handed out by an allocator.
#[derive(Debug, Default)]
pub struct MemoryTracker {
    /// Bytes currently live. Wraps on underflow.
    current_bytes: AtomicU64,
    /// The highest value `current_bytes` has reached.
    peak_bytes: AtomicU64,
    /// Number of `track_memory` calls.
    track_calls: AtomicU64,
    /// Number of `untrack_memory` calls.
    untrack_calls: AtomicU64,
    /// Cumulative bytes ever tracked.
    bytes_tracked_lifetime: AtomicU64,
    /// Cumulative bytes ever untracked.
    bytes_untracked_lifetime: AtomicU64,
}

impl MemoryTracker {
    /// Creates a tracker with every counter at zero.
    pub const fn new() -> Self {
        Self {
            current_bytes: AtomicU64::new(0),
            peak_bytes: AtomicU64::new(0),
            track_calls: AtomicU64::new(0),
            untrack_calls: AtomicU64::new(0),
            bytes_tracked_lifetime: AtomicU64::new(0),
            bytes_untracked_lifetime: AtomicU64::new(0),
        }
    }

    /// Adds `nr_of_bytes` to the live total.
    pub fn track_memory(&self, nr_of_bytes: u64) {
        let previous = self.current_bytes.fetch_add(nr_of_bytes, Ordering::Relaxed);
        self.peak_bytes
            .fetch_max(previous.wrapping_add(nr_of_bytes), Ordering::Relaxed);
        self.track_calls.fetch_add(1, Ordering::Relaxed);
        self.bytes_tracked_lifetime
            .fetch_add(nr_of_bytes, Ordering::Relaxed);
    }

    /// Subtracts `nr_of_bytes` from the live total, wrapping on underflow.
    pub fn untrack_memory(&self, nr_of_bytes: u64) {
        self.current_bytes.fetch_sub(nr_of_bytes, Ordering::Relaxed);
        self.untrack_calls.fetch_add(1, Ordering::Relaxed);
        self.bytes_untracked_lifetime
            .fetch_add(nr_of_bytes, Ordering::Relaxed);
    }

    /// Returns the number of bytes currently tracked as live.
    pub fn current_bytes(&self) -> u64 {
        self.current_bytes.load(Ordering::Relaxed)
    }

    /// Returns the highest live total observed since creation or the last [`reset`](Self::reset).
    pub fn peak_bytes(&self) -> u64 {
        self.peak_bytes.load(Ordering::Relaxed)
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        self.current_bytes.store(0, Ordering::Relaxed);
        self.peak_bytes.store(0, Ordering::Relaxed);
        self.track_calls.store(0, Ordering::Relaxed);
        self.untrack_calls.store(0, Ordering::Relaxed);
        self.bytes_tracked_lifetime.store(0, Ordering::Relaxed);
        self.bytes_untracked_lifetime.store(0, Ordering::Relaxed);
    }

    /// Takes a snapshot of all counters and returns them in a structured format.
    ///
    /// Counters are read individually with `Ordering::Relaxed`, so a snapshot
    /// taken while another thread allocates may be slightly inconsistent.
    pub fn stats(&self) -> MemoryStats {
        let mut stats = MemoryStats {
            current_bytes: self.current_bytes(),
            peak_bytes: self.peak_bytes(),
            total_allocations: self.track_calls.load(Ordering::Relaxed),
            total_deallocations: self.untrack_calls.load(Ordering::Relaxed),
            bytes_allocated_lifetime: self.bytes_tracked_lifetime.load(Ordering::Relaxed),
            bytes_deallocated_lifetime: self.bytes_untracked_lifetime.load(Ordering::Relaxed),
            ..Default::default()
        };
        stats.calculate_derived_metrics();
        stats
    }
}

/// A snapshot of a [`MemoryTracker`]'s counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MemoryStats {
    /// Bytes live at the time of the snapshot.
    pub current_bytes: u64,
    /// Highest live total reached.
    pub peak_bytes: u64,
    /// Number of tracked allocations.
    pub total_allocations: u64,
    /// Number of untracked deallocations.
    pub total_deallocations: u64,
    /// Cumulative bytes ever allocated.
    pub bytes_allocated_lifetime: u64,
    /// Cumulative bytes ever released.
    pub bytes_deallocated_lifetime: u64,

    // --- Calculated Metrics ---
    /// `total_allocations - total_deallocations`.
    pub net_allocations: i64,
    /// The average size of a single allocation (`bytes_allocated_lifetime` / `total_allocations`).
    pub average_allocation_size: f64,
}

impl MemoryStats {
    /// Populates the derived metrics based on the raw counter values.
    pub fn calculate_derived_metrics(&mut self) {
        self.net_allocations = self.total_allocations as i64 - self.total_deallocations as i64;
        if self.total_allocations > 0 {
            self.average_allocation_size =
                self.bytes_allocated_lifetime as f64 / self.total_allocations as f64;
        }
    }
}

// --- Process-wide API ---

/// Adds `nr_of_bytes` to the [`GLOBAL_TRACKER`].
pub fn track_memory(nr_of_bytes: u64) {
    GLOBAL_TRACKER.track_memory(nr_of_bytes);
}

/// Subtracts `nr_of_bytes` from the [`GLOBAL_TRACKER`], wrapping on underflow.
pub fn untrack_memory(nr_of_bytes: u64) {
    GLOBAL_TRACKER.untrack_memory(nr_of_bytes);
}

/// Gets the total number of bytes the [`GLOBAL_TRACKER`] currently counts as live.
pub fn currently_tracked_bytes() -> u64 {
    GLOBAL_TRACKER.current_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_and_untrack() {
        let tracker = MemoryTracker::new();
        tracker.track_memory(64);
        tracker.track_memory(16);
        assert_eq!(tracker.current_bytes(), 80);

        tracker.untrack_memory(64);
        assert_eq!(tracker.current_bytes(), 16);
        assert_eq!(tracker.peak_bytes(), 80);
    }

    #[test]
    fn test_untrack_underflow_wraps_silently() {
        let tracker = MemoryTracker::new();
        tracker.track_memory(4);
        tracker.untrack_memory(10);
        assert_eq!(tracker.current_bytes(), u64::MAX - 5);

        // Tracking the missing bytes brings the counter back to zero.
        tracker.track_memory(6);
        assert_eq!(tracker.current_bytes(), 0);
    }

    #[test]
    fn test_stats_snapshot() {
        let tracker = MemoryTracker::new();
        tracker.track_memory(100);
        tracker.track_memory(300);
        tracker.untrack_memory(100);

        let stats = tracker.stats();
        assert_eq!(stats.current_bytes, 300);
        assert_eq!(stats.peak_bytes, 400);
        assert_eq!(stats.total_allocations, 2);
        assert_eq!(stats.total_deallocations, 1);
        assert_eq!(stats.net_allocations, 1);
        assert_eq!(stats.bytes_deallocated_lifetime, 100);
        assert!((stats.average_allocation_size - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reset_clears_everything() {
        let tracker = MemoryTracker::new();
        tracker.track_memory(12);
        tracker.untrack_memory(2);
        tracker.reset();
        assert_eq!(tracker.stats(), MemoryStats::default());
    }
}
