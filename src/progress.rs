//! Progress reporting: unit-count bar for a batch run, byte bars for downloads.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Optional global MultiProgress that allows multiple bars to render concurrently.
/// If unset, progress bars draw to the default terminal target.
static GLOBAL_MP: OnceLock<Arc<MultiProgress>> = OnceLock::new();

/// Install a global MultiProgress used by all subsequently created progress bars.
/// Safe to call once; additional calls are ignored.
pub fn set_global_multiprogress(mp: Arc<MultiProgress>) {
    let _ = GLOBAL_MP.set(mp);
}

fn new_bar(total: u64, template: &str) -> ProgressBar {
    let pb = match GLOBAL_MP.get() {
        Some(mp) => mp.add(ProgressBar::new(total)),
        None => ProgressBar::new(total),
    };
    let style = ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Byte-style progress bar (downloads), with an optional label.
pub fn make_progress_bar_labeled(total_bytes: u64, label: Option<&str>) -> ProgressBar {
    let pb = new_bar(
        total_bytes,
        "{spinner:.green} {msg} {bytes:>10}/{total_bytes:<10} [{bar:.cyan/blue}] {percent:>3}%  \
         {bytes_per_sec}  elapsed: {elapsed_precise}  eta: {eta_precise}",
    );
    if let Some(msg) = label {
        pb.set_message(msg.to_string());
    }
    pb
}

/// Count-style progress bar (units processed out of total), with an optional label.
pub fn make_count_progress(total: u64, label: &str) -> ProgressBar {
    let pb = new_bar(
        total,
        "{spinner:.green} {msg} {pos}/{len} [{bar:.cyan/blue}] {percent:>3}%  \
         elapsed: {elapsed_precise}  eta: {eta_precise}",
    );
    if !label.is_empty() {
        pb.set_message(label.to_string());
    }
    pb
}
