use crate::concurrency::run_bounded;
use crate::config::{MalformedPolicy, SentimentOptions};
use crate::error::{ProcessError, UnitError};
use crate::fetch::Fetcher;
use crate::mem::wait_for_memory_headroom;
use crate::paths::ArchiveNaming;
use crate::planner::{plan, WorkPlan, WorkUnit};
use crate::progress::{make_count_progress, make_progress_bar_labeled};
use crate::record::{process_lines, ArchiveStats};
use crate::retry::RetryPolicy;
use crate::sentiment::{SentimentModel, VaderModel};
use crate::tsv::TsvWriter;
use crate::util::{init_tracing_once, remove_with_backoff};
use crate::zstd_lines::ArchiveLines;
use crate::YearMonth;
use anyhow::{anyhow, Context, Result};
use std::any::Any;
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const MEMORY_WAIT: Duration = Duration::from_secs(300);
const PROGRESS_EVERY_LINES: u64 = 4096;

/// Entry point: configure with the chained builders, then `run()`.
#[derive(Clone)]
pub struct SentimentETL {
    pub(crate) opts: SentimentOptions,
    model: Arc<dyn SentimentModel>,
}

/// A unit that finished and left its output on disk.
#[derive(Clone, Debug)]
pub struct UnitOutcome {
    pub ym: YearMonth,
    pub output_path: PathBuf,
    pub downloaded_bytes: Option<u64>,
    pub stats: ArchiveStats,
}

/// Summary of one batch run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub completed: Vec<UnitOutcome>,
    pub failed: Vec<UnitError>,
    /// Requested months skipped because their output already existed.
    pub omitted: usize,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

impl Default for SentimentETL {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentETL {
    pub fn new() -> Self {
        Self { opts: SentimentOptions::default(), model: Arc::new(VaderModel::new()) }
    }

    // -------- Builder methods --------
    pub fn options(mut self, opts: SentimentOptions) -> Self { self.opts = opts; self }
    pub fn base_dir(mut self, dir: impl AsRef<Path>) -> Self { self.opts = self.opts.with_base_dir(dir); self }
    pub fn archive_dir(mut self, dir: impl AsRef<Path>) -> Self { self.opts = self.opts.with_archive_dir(dir); self }
    pub fn output_dir(mut self, dir: impl AsRef<Path>) -> Self { self.opts = self.opts.with_output_dir(dir); self }
    pub fn base_url(mut self, url: impl Into<String>) -> Self { self.opts = self.opts.with_base_url(url); self }
    pub fn naming(mut self, naming: ArchiveNaming) -> Self { self.opts = self.opts.with_naming(naming); self }
    pub fn years(mut self, start_year: u16, end_year: u16) -> Self { self.opts = self.opts.with_years(start_year, end_year); self }
    pub fn file_concurrency(mut self, n: usize) -> Self { self.opts = self.opts.with_file_concurrency(n); self }
    pub fn malformed_policy(mut self, policy: MalformedPolicy) -> Self { self.opts = self.opts.with_malformed_policy(policy); self }
    pub fn keep_archives(mut self, yes: bool) -> Self { self.opts = self.opts.with_keep_archives(yes); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn progress_label(mut self, label: impl Into<String>) -> Self { self.opts = self.opts.with_progress_label(label); self }
    pub fn window_log_max(mut self, log: u32) -> Self { self.opts = self.opts.with_window_log_max(log); self }
    pub fn fetch_retry(mut self, policy: RetryPolicy) -> Self { self.opts = self.opts.with_fetch_retry(policy); self }
    pub fn io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self { self.opts = self.opts.with_io_buffers(read_bytes, write_bytes); self }
    pub fn min_free_memory(mut self, fraction: f64) -> Self { self.opts = self.opts.with_min_free_memory(fraction); self }
    pub fn model(mut self, model: Arc<dyn SentimentModel>) -> Self { self.model = model; self }

    pub fn opts(&self) -> &SentimentOptions {
        &self.opts
    }

    /// Which months a `run()` would process right now.
    pub fn plan(&self) -> WorkPlan {
        plan(&self.opts)
    }

    /// Plan, then fetch → decode → score every unit on a bounded pool.
    /// Per-unit failures are collected in the report; only setup problems return `Err`.
    pub fn run(&self) -> Result<RunReport> {
        init_tracing_once();
        fs::create_dir_all(&self.opts.archive_dir)
            .with_context(|| format!("create {}", self.opts.archive_dir.display()))?;
        fs::create_dir_all(&self.opts.output_dir)
            .with_context(|| format!("create {}", self.opts.output_dir.display()))?;

        let plan = self.plan();
        info!("Omitting {} archives", plan.omitted.len());
        if !plan.resumed.is_empty() {
            let months: Vec<String> = plan.resumed.iter().map(|ym| ym.to_string()).collect();
            info!(months = %months.join(","), "finishing downloaded archives outside the requested years");
        }
        let mut report = RunReport { omitted: plan.omitted.len(), ..Default::default() };
        if plan.units.is_empty() {
            info!("nothing to do");
            return Ok(report);
        }
        info!(units = plan.units.len(), workers = self.opts.file_concurrency, "dispatching");

        let fetcher = Fetcher::new(self.opts.fetch_retry.clone(), self.opts.connect_timeout, self.opts.progress)?;
        let label = self.opts.progress_label.as_deref().unwrap_or("Archives");
        let pb = self.opts.progress.then(|| make_count_progress(plan.units.len() as u64, label));

        let results = run_bounded(&plan.units, self.opts.file_concurrency, |unit| {
            let res = catch_unwind(AssertUnwindSafe(|| self.process_unit(unit, &fetcher)))
                .unwrap_or_else(|payload| Err(UnitError::Panicked { unit: unit.ym, message: panic_message(payload) }));
            match &res {
                Ok(o) => info!(unit = %o.ym, rows = o.stats.rows, malformed = o.stats.malformed, "unit complete"),
                Err(e) => warn!(unit = %e.unit(), error = %e, "unit failed"),
            }
            if let Some(pb) = &pb {
                pb.inc(1);
            }
            res
        })?;
        if let Some(pb) = pb {
            pb.finish_with_message("done");
        }

        for r in results {
            match r {
                Ok(o) => report.completed.push(o),
                Err(e) => report.failed.push(e),
            }
        }
        report.completed.sort_by_key(|o| o.ym);
        report.failed.sort_by_key(|e| e.unit());

        for e in &report.failed {
            error!(unit = %e.unit(), "{e}");
        }
        info!(completed = report.completed.len(), failed = report.failed.len(), omitted = report.omitted, "run finished");
        Ok(report)
    }

    /// One unit, start to finish. Owns its archive and output paths exclusively.
    fn process_unit(&self, unit: &WorkUnit, fetcher: &Fetcher) -> Result<UnitOutcome, UnitError> {
        let ym = unit.ym;
        let other = |source: anyhow::Error| UnitError::Other { unit: ym, source };

        let downloaded_bytes = if unit.archive_path.exists() {
            debug!(unit = %ym, path = %unit.archive_path.display(), "archive present, skipping download");
            None
        } else {
            if let Some(parent) = unit.archive_path.parent() {
                fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display())).map_err(other)?;
            }
            let n = fetcher
                .fetch(&unit.url, &unit.archive_path)
                .map_err(|source| UnitError::Transfer { unit: ym, source })?;
            Some(n)
        };

        if !wait_for_memory_headroom(self.opts.min_free_memory, MEMORY_WAIT) {
            warn!(unit = %ym, "still short on memory, starting anyway");
        }

        let stats = self.annotate_archive_inner(&unit.archive_path, &unit.output_path).map_err(|e| match e {
            AnnotateError::Process(ProcessError::Decode(source)) => UnitError::Decode { unit: ym, source },
            AnnotateError::Process(ProcessError::Malformed(source)) => UnitError::Malformed { unit: ym, source },
            AnnotateError::Process(ProcessError::Sink(e)) => other(anyhow!(e).context("write output")),
            AnnotateError::Setup(e) => other(e),
        })?;

        if !self.opts.keep_archives {
            if let Err(e) = remove_with_backoff(&unit.archive_path, 16, 50) {
                warn!(unit = %ym, error = %e, "could not delete processed archive");
            }
        }

        Ok(UnitOutcome { ym, output_path: unit.output_path.clone(), downloaded_bytes, stats })
    }

    /// Decode `archive` and write its scored rows to `output` (atomically).
    /// No download, no planning: the single-archive building block of `run()`.
    pub fn annotate_archive(&self, archive: &Path, output: &Path) -> Result<ArchiveStats> {
        self.annotate_archive_inner(archive, output).map_err(|e| match e {
            AnnotateError::Process(p) => anyhow!(p).context(format!("annotate {}", archive.display())),
            AnnotateError::Setup(e) => e,
        })
    }

    fn annotate_archive_inner(&self, archive: &Path, output: &Path) -> Result<ArchiveStats, AnnotateError> {
        let lines = ArchiveLines::open(archive, self.opts.window_log_max, self.opts.read_buffer_bytes)
            .map_err(|e| AnnotateError::Process(e.into()))?;
        let mut sink = TsvWriter::create(output, self.opts.write_buffer_bytes).map_err(AnnotateError::Setup)?;

        let counter = lines.compressed_counter();
        let pb = self.opts.progress.then(|| {
            let total = fs::metadata(archive).map(|m| m.len()).unwrap_or(0);
            let label = archive.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            make_progress_bar_labeled(total, Some(&label))
        });
        let mut seen = 0u64;
        let on_line = || {
            seen += 1;
            if seen % PROGRESS_EVERY_LINES == 0 {
                if let Some(pb) = &pb {
                    pb.set_position(counter.get());
                }
            }
        };

        let res = process_lines(lines, self.model.as_ref(), &mut sink, self.opts.malformed, on_line);
        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }
        let stats = res.map_err(AnnotateError::Process)?;
        // On any error above `sink` is dropped and its temp file removed.
        sink.finish_atomic().map_err(AnnotateError::Setup)?;
        debug!(archive = %archive.display(), output = %output.display(), lines = stats.lines, rows = stats.rows, "archive annotated");
        Ok(stats)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(s) => *s,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(s) => s.to_string(),
            Err(_) => "non-string panic payload".to_string(),
        },
    }
}

enum AnnotateError {
    Process(ProcessError),
    Setup(anyhow::Error),
}
