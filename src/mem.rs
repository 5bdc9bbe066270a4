use parking_lot::Mutex;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use sysinfo::{System, SystemExt};

/// Cached, low-overhead memory watcher.
/// - Refreshes at most every `REFRESH_EVERY`.
/// - Uses available/total RAM to decide whether a new decoder may start.
struct MemState {
    sys: System,
    last_check: Instant,
    last_frac: f64, // available / total (0.0..1.0)
}

static STATE: OnceLock<Mutex<MemState>> = OnceLock::new();
const REFRESH_EVERY: Duration = Duration::from_millis(500);

/// Returns a recent estimate of available memory fraction (0.0..1.0).
pub fn available_memory_fraction() -> f64 {
    let m = STATE.get_or_init(|| {
        Mutex::new(MemState { sys: System::new(), last_check: Instant::now() - REFRESH_EVERY * 2, last_frac: 1.0 })
    });
    let mut st = m.lock();
    let now = Instant::now();
    if now.duration_since(st.last_check) >= REFRESH_EVERY {
        st.sys.refresh_memory();
        let total = st.sys.total_memory() as f64;
        let avail = st.sys.available_memory() as f64;
        st.last_frac = if total > 0.0 { (avail / total).clamp(0.0, 1.0) } else { 1.0 };
        st.last_check = now;
    }
    st.last_frac
}

/// Block while available memory is below `threshold`, for at most `max_wait`.
/// A full-window zstd decoder can claim up to 2 GiB, so units should not pile onto a
/// machine that is already short. Returns `false` if it gave up waiting.
pub fn wait_for_memory_headroom(threshold: f64, max_wait: Duration) -> bool {
    if threshold <= 0.0 {
        return true;
    }
    let deadline = Instant::now() + max_wait;
    let mut logged = false;
    while available_memory_fraction() < threshold {
        if Instant::now() >= deadline {
            return false;
        }
        if !logged {
            tracing::info!(threshold, "low memory, delaying next unit");
            logged = true;
        }
        std::thread::sleep(Duration::from_millis(250));
    }
    true
}
