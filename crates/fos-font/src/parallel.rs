//! Scoped Parallel Work Distribution
//!
//! Glyph work is embarrassingly parallel: every job owns one glyph index and
//! never touches another glyph. Items are split into contiguous chunks, one
//! per available core, and run on `std::thread::scope` workers so borrowed
//! font data can be shared without reference counting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// Get the number of available CPU cores
pub fn num_cpus() -> usize {
    thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}

fn chunk_size(len: usize, threads: usize) -> usize {
    len.div_ceil(threads).max(1)
}

fn join_worker<R>(handle: thread::ScopedJoinHandle<'_, R>) -> R {
    match handle.join() {
        Ok(value) => value,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

// ============================================================================
// Parallel Map
// ============================================================================

/// Map a function over items in a slice in parallel, preserving order
pub fn map_ref<T, U, F>(items: &[T], f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Send + Sync,
{
    let num_threads = num_cpus().min(items.len());
    if num_threads <= 1 {
        return items.iter().map(&f).collect();
    }

    let chunk_size = chunk_size(items.len(), num_threads);
    let f = &f;
    let results: Vec<Vec<U>> = thread::scope(|s| {
        let handles: Vec<_> = items
            .chunks(chunk_size)
            .map(|chunk| s.spawn(move || chunk.iter().map(f).collect::<Vec<U>>()))
            .collect();

        handles.into_iter().map(join_worker).collect()
    });

    results.into_iter().flatten().collect()
}

// ============================================================================
// Fallible Parallel Map
// ============================================================================

/// Map a fallible function over items in parallel
///
/// Once any job fails, workers stop picking up new items and the first error
/// (in item order among the failures observed) is returned. Jobs already
/// running are allowed to finish.
pub fn try_map<T, U, E, F>(items: &[T], f: F) -> Result<Vec<U>, E>
where
    T: Sync,
    U: Send,
    E: Send,
    F: Fn(&T) -> Result<U, E> + Send + Sync,
{
    let num_threads = num_cpus().min(items.len());
    if num_threads <= 1 {
        return items.iter().map(&f).collect();
    }

    let failed = AtomicBool::new(false);
    let chunk_size = chunk_size(items.len(), num_threads);
    let f = &f;
    let failed = &failed;

    let results: Vec<Result<Vec<U>, E>> = thread::scope(|s| {
        let handles: Vec<_> = items
            .chunks(chunk_size)
            .map(|chunk| {
                s.spawn(move || {
                    let mut out = Vec::with_capacity(chunk.len());
                    for item in chunk {
                        if failed.load(Ordering::Relaxed) {
                            break;
                        }
                        match f(item) {
                            Ok(value) => out.push(value),
                            Err(err) => {
                                failed.store(true, Ordering::Relaxed);
                                return Err(err);
                            }
                        }
                    }
                    Ok(out)
                })
            })
            .collect();

        handles.into_iter().map(join_worker).collect()
    });

    let mut all = Vec::with_capacity(items.len());
    for chunk in results {
        all.extend(chunk?);
    }
    Ok(all)
}
