use crate::paths::ArchiveNaming;
use crate::retry::RetryPolicy;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_COMMENTS_URL: &str = "https://files.pushshift.io/reddit/comments";

/// What to do with a line that is not a valid comment record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    /// Drop the line, count it, keep going.
    #[default]
    Skip,
    /// Fail the whole unit; no output file is produced.
    Abort,
}

/// User-facing options with sensible defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct SentimentOptions {
    pub archive_dir: PathBuf,       // where RC_YYYY-MM.zst archives are downloaded/found
    pub output_dir: PathBuf,        // where RC_YYYY-MM.tsv outputs are written/found
    pub base_url: String,           // remote directory holding the archives
    pub naming: ArchiveNaming,
    pub start_year: u16,            // inclusive
    pub end_year: u16,              // inclusive
    pub file_concurrency: usize,    // units in flight at once
    pub malformed: MalformedPolicy,
    pub keep_archives: bool,        // delete archive after its output is complete when false
    pub progress: bool,
    pub progress_label: Option<String>,

    // Decoder
    pub window_log_max: u32,        // 31 => 2 GiB history window

    // Fetcher
    pub fetch_retry: RetryPolicy,
    pub connect_timeout: Duration,

    // IO tuning
    pub read_buffer_bytes: usize,
    pub write_buffer_bytes: usize,

    // Skip starting a unit while available memory is below this fraction (0 disables)
    pub min_free_memory: f64,
}

impl Default for SentimentOptions {
    fn default() -> Self {
        let base = PathBuf::from(".");
        Self {
            output_dir: base.clone(),
            archive_dir: base,
            base_url: DEFAULT_COMMENTS_URL.to_string(),
            naming: ArchiveNaming::default(),
            start_year: 2005,
            end_year: 2006,
            file_concurrency: 1, // safe default to prevent OOM on big .zst windows
            malformed: MalformedPolicy::Skip,
            keep_archives: true,
            progress: true,
            progress_label: None,

            window_log_max: 31,

            fetch_retry: RetryPolicy::default(),
            connect_timeout: Duration::from_secs(30),

            read_buffer_bytes: 256 * 1024,
            write_buffer_bytes: 256 * 1024,

            min_free_memory: 0.10,
        }
    }
}

impl SentimentOptions {
    /// Archives and outputs both live under `dir`.
    pub fn with_base_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.archive_dir = dir.as_ref().to_path_buf();
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_archive_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.archive_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
    pub fn with_naming(mut self, naming: ArchiveNaming) -> Self {
        self.naming = naming;
        self
    }
    pub fn with_years(mut self, start_year: u16, end_year: u16) -> Self {
        self.start_year = start_year;
        self.end_year = end_year;
        self
    }
    pub fn with_file_concurrency(mut self, n: usize) -> Self {
        self.file_concurrency = n.max(1);
        self
    }
    pub fn with_malformed_policy(mut self, policy: MalformedPolicy) -> Self {
        self.malformed = policy;
        self
    }
    pub fn with_keep_archives(mut self, yes: bool) -> Self {
        self.keep_archives = yes;
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_progress_label(mut self, label: impl Into<String>) -> Self {
        self.progress_label = Some(label.into());
        self
    }
    pub fn with_window_log_max(mut self, log: u32) -> Self {
        self.window_log_max = log.clamp(10, 31);
        self
    }
    pub fn with_fetch_retry(mut self, policy: RetryPolicy) -> Self {
        self.fetch_retry = policy;
        self
    }
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
    pub fn with_io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self {
        self.read_buffer_bytes = read_bytes.max(8 * 1024);
        self.write_buffer_bytes = write_bytes.max(8 * 1024);
        self
    }
    pub fn with_min_free_memory(mut self, fraction: f64) -> Self {
        self.min_free_memory = fraction.clamp(0.0, 1.0);
        self
    }
}
