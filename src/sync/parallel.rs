//! Bounded-parallel fetching.
//!
//! `do_parallel_requests` submits a window of independent requests at once, waits for the
//! whole window and only then submits the next one. A failure anywhere in a window is returned
//! and no later window is started.

use futures::future::try_join_all;
use std::future::Future;
use std::ops::Range;
use tracing::debug;

/// Number of requests in flight at once while seeding.
pub const DEFAULT_PARALLEL_WINDOW: usize = 16;

/// Split `0..total` into consecutive batches of at most `window` indices.
pub fn batch_ranges(total: usize, window: usize) -> Vec<Range<usize>> {
    let window = window.max(1);
    (0..total)
        .step_by(window)
        .map(|start| start..(start + window).min(total))
        .collect()
}

/// Fetch `total` items, `window` at a time.
///
/// The returned vector is ordered by index: element `i` is the output of `fetcher(i)`.
pub async fn do_parallel_requests<T, E, F, Fut>(
    description: &str,
    total: usize,
    window: usize,
    fetcher: F,
) -> Result<Vec<T>, E>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let batches = batch_ranges(total, window);
    let batch_count = batches.len();
    let mut results = Vec::with_capacity(total);

    for (n, batch) in batches.into_iter().enumerate() {
        let end = batch.end;
        let outputs = try_join_all(batch.map(&fetcher)).await?;
        results.extend(outputs);
        debug!(
            "{}: batch {}/{} done ({}/{} items)",
            description,
            n + 1,
            batch_count,
            end,
            total
        );
    }

    Ok(results)
}
