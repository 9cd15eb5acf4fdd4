use criterion::{criterion_group, criterion_main, Criterion};
use leap_core::memory::MemoryTracker;
use leap_data::BlockAllocator;
use std::alloc::System;
use std::hint::black_box;
use std::ptr::NonNull;

const BLOCKS: usize = 256;

fn fresh_allocator() -> BlockAllocator {
    BlockAllocator::new(System, Box::leak(Box::new(MemoryTracker::new())))
}

fn fill(allocator: &mut BlockAllocator) -> Vec<NonNull<u8>> {
    (0..BLOCKS)
        .map(|i| allocator.allocate(16 + (i % 8) * 24))
        .collect()
}

fn bench_release_orders(c: &mut Criterion) {
    let mut group = c.benchmark_group("Block Allocator");

    // Newest block is the registry tail.
    group.bench_function("LIFO release", |b| {
        let mut allocator = fresh_allocator();
        b.iter(|| {
            let blocks = fill(&mut allocator);
            for ptr in blocks.into_iter().rev() {
                unsafe { allocator.deallocate(black_box(ptr.as_ptr())) };
            }
        });
    });

    // Oldest block is the registry head.
    group.bench_function("FIFO release", |b| {
        let mut allocator = fresh_allocator();
        b.iter(|| {
            let blocks = fill(&mut allocator);
            for ptr in blocks {
                unsafe { allocator.deallocate(black_box(ptr.as_ptr())) };
            }
        });
    });

    // Mid-list releases exercise the linear scan.
    group.bench_function("Interleaved release", |b| {
        let mut allocator = fresh_allocator();
        b.iter(|| {
            let blocks = fill(&mut allocator);
            let (even, odd): (Vec<_>, Vec<_>) =
                blocks.into_iter().enumerate().partition(|(i, _)| i % 2 == 0);
            for (_, ptr) in odd.into_iter().chain(even) {
                unsafe { allocator.deallocate(black_box(ptr.as_ptr())) };
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_release_orders);
criterion_main!(benches);
