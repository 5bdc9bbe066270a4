use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

static INIT_ONCE: std::sync::Once = std::sync::Once::new();
pub fn init_tracing_once() {
    INIT_ONCE.call_once(|| {
        let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .try_init();
    });
}

// -------- robust file ops with backoff (Windows-friendly) --------

/// True for transient I/O errors seen on Windows when AV/backup filter drivers,
/// USB/NAS volumes, or sharing violations get in the way.
fn is_retriable_io_error(e: &io::Error) -> bool {
    // 5 access denied, 21 device not ready, 32 sharing violation, 33 lock violation,
    // 225 AV blocked, 433 missing device, 1006 volume altered, 1117 device error,
    // 1224 user-mapped section open
    matches!(e.raw_os_error(), Some(5 | 21 | 32 | 33 | 225 | 433 | 1006 | 1117 | 1224))
}

fn io_with_backoff<T>(tries: usize, delay_ms: u64, mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    let tries = tries.max(1);
    let mut i = 0;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if i + 1 < tries && is_retriable_io_error(&e) => {
                i += 1;
                sleep(Duration::from_millis(delay_ms.saturating_mul(i as u64)));
            }
            Err(e) => return Err(e),
        }
    }
}

pub fn open_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> io::Result<File> {
    io_with_backoff(tries, delay_ms, || File::open(path))
}

pub fn create_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> io::Result<File> {
    io_with_backoff(tries, delay_ms, || File::create(path))
}

/// Remove a file; succeeds if it is already gone.
pub fn remove_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> Result<()> {
    io_with_backoff(tries, delay_ms, || match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    })
    .with_context(|| format!("remove {}", path.display()))
}

/// Atomically promote `tmp` to `dest`. Falls back to copy+remove when rename is refused
/// (cross-device, or sharing on Windows).
pub fn replace_file_atomic_backoff(tmp: &Path, dest: &Path) -> Result<()> {
    let (tries, delay_ms) = (20usize, 50u64);
    if dest.exists() {
        remove_with_backoff(dest, tries, delay_ms)?;
    }
    if io_with_backoff(tries, delay_ms, || fs::rename(tmp, dest)).is_ok() {
        return Ok(());
    }
    io_with_backoff(tries, delay_ms, || fs::copy(tmp, dest))
        .with_context(|| format!("copy {} -> {}", tmp.display(), dest.display()))?;
    remove_with_backoff(tmp, tries, delay_ms)
}

/// Sibling path with `suffix` appended to the file name (`a/RC_2006-01.zst` → `a/RC_2006-01.zst.part`).
pub fn with_suffix(path: &Path, suffix: &str) -> std::path::PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}
