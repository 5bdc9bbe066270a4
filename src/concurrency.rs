//! Bounded fan-out: run one task per item on at most `limit` threads and collect every
//! task's result over a channel. A failing task never stops its siblings.

use anyhow::{Context, Result};
use std::sync::mpsc;

/// Apply `f` to every item with at most `limit` in flight. Results come back in completion
/// order. `limit <= 1` runs sequentially on the calling thread, in item order.
pub fn run_bounded<T, R, F>(items: &[T], limit: usize, f: F) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Sync + Fn(&T) -> R,
{
    if limit <= 1 || items.len() <= 1 {
        return Ok(items.iter().map(&f).collect());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(limit.min(items.len()))
        .thread_name(|i| format!("unit-worker-{i}"))
        .build()
        .context("build worker pool")?;

    let (tx, rx) = mpsc::channel::<R>();
    pool.scope(|s| {
        for item in items {
            let tx = tx.clone();
            let f = &f;
            s.spawn(move |_| {
                // The receiver outlives the scope, so a send can only fail if we are unwinding.
                let _ = tx.send(f(item));
            });
        }
    });
    drop(tx);
    Ok(rx.into_iter().collect())
}
