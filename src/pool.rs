//! Bounded-concurrency map over independent work items.

use anyhow::{Context, Result};
use rayon::prelude::*;

/// Applies `f` to every item and collects the results in input order.
///
/// With `jobs == 0` the items are processed sequentially on the calling
/// thread. Otherwise a dedicated pool of `jobs` threads runs them. Either way
/// the call returns only once all work has finished or the first error has
/// been seen; items already running when an error occurs complete, but their
/// results are discarded.
pub fn try_map<I, T, R, F>(jobs: usize, items: I, f: F) -> Result<Vec<R>>
where
    I: IntoIterator<Item = T>,
    T: Send,
    R: Send,
    F: Fn(T) -> Result<R> + Send + Sync,
{
    let items: Vec<T> = items.into_iter().collect();

    if jobs == 0 {
        return items.into_iter().map(f).collect();
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("Failed to build worker pool")?;

    pool.install(|| items.into_par_iter().map(&f).collect())
}
