use rayon::prelude::*;
use std::cell::UnsafeCell;

/// Data-parallel map over a particle index range, backed by a `rayon`
/// thread pool sized to the host's hardware parallelism (SPEC_FULL.md §2.4,
/// §4.7). This directly replaces the original C++'s hand-rolled
/// `std::thread`/`condition_variable` pool (`thread_pool.hpp`).
pub struct WorkScheduler {
    pool: rayon::ThreadPool,
    worker_count: usize,
}

impl WorkScheduler {
    pub fn new() -> Self {
        let worker_count = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .build()
            .expect("failed to build rayon thread pool");
        WorkScheduler { pool, worker_count }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Maps `body(i)` over `begin..end`. Iterations may run in any order and
    /// concurrently; `body` must touch only index-`i`'s own outputs. Falls
    /// back to a sequential loop below `4 * worker_count` iterations, per
    /// the original `ThreadPool::parallelFor`'s small-range contract.
    pub fn parallel_for<F>(&self, begin: usize, end: usize, body: F)
    where
        F: Fn(usize) + Sync + Send,
    {
        if end <= begin {
            return;
        }
        let len = end - begin;
        if len < 4 * self.worker_count.max(1) {
            for i in begin..end {
                body(i);
            }
            return;
        }
        self.pool.install(|| {
            (begin..end).into_par_iter().for_each(|i| body(i));
        });
    }
}

impl Default for WorkScheduler {
    fn default() -> Self {
        WorkScheduler::new()
    }
}

/// A `&mut [T]` reinterpreted so that disjoint indices can be written from
/// separate `parallel_for` iterations through a shared reference.
///
/// This is the standard escape hatch for "each `body(i)` writes only its
/// own row" data-parallel loops: the `WorkScheduler::parallel_for` contract
/// (SPEC_FULL.md §4.7) guarantees no two iterations of the same call ever
/// touch the same index, so the actual aliasing the borrow checker can't see
/// here never happens. Every caller in `sph_solver` upholds that by
/// construction (one write per `i`, at index `i` only).
pub struct UnsafeSlice<'a, T> {
    slice: &'a [UnsafeCell<T>],
}

unsafe impl<'a, T: Send + Sync> Sync for UnsafeSlice<'a, T> {}

impl<'a, T> UnsafeSlice<'a, T> {
    pub fn new(slice: &'a mut [T]) -> Self {
        let ptr = slice as *mut [T] as *const [UnsafeCell<T>];
        // SAFETY: `UnsafeCell<T>` has the same layout as `T`.
        UnsafeSlice { slice: unsafe { &*ptr } }
    }

    /// # Safety
    /// The caller must ensure no two concurrent calls target the same `i`.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut(&self, i: usize) -> &mut T {
        &mut *self.slice[i].get()
    }
}

impl<'a, T> Clone for UnsafeSlice<'a, T> {
    fn clone(&self) -> Self {
        UnsafeSlice { slice: self.slice }
    }
}
impl<'a, T> Copy for UnsafeSlice<'a, T> {}
