use crate::concurrency::run_bounded;
use crate::paths::discover_all;
use crate::pipeline::SentimentETL;
use crate::progress::make_count_progress;
use crate::util::init_tracing_once;
use crate::zstd_lines::{quick_validate_zst, validate_zst_full};
use anyhow::Result;
use parking_lot::Mutex;
use std::path::PathBuf;

/// Mode for integrity checks.
#[derive(Clone, Copy, Debug)]
pub enum IntegrityMode {
    /// Decode only the first `sample_bytes` (decompressed) per file.
    /// Catches truncated headers and early corruption, not a damaged tail.
    Quick { sample_bytes: u64 },
    /// Decode the entire stream, frame checksums included.
    Full,
}

impl SentimentETL {
    /// Validate every archive found under the archive directory, whatever its month.
    /// Returns `(path, error_message)` for each archive that failed, sorted by path.
    ///
    /// At most `file_concurrency` archives are decoded at once; progress ticks once per file.
    pub fn check_archives(&self, mode: IntegrityMode) -> Result<Vec<(PathBuf, String)>> {
        init_tracing_once();
        let discovered = discover_all(&self.opts.archive_dir, &self.opts.output_dir, &self.opts.naming);
        let files: Vec<PathBuf> = discovered.archives.into_values().collect();

        let label = match mode {
            IntegrityMode::Quick { .. } => "Integrity (quick)",
            IntegrityMode::Full => "Integrity (full)",
        };
        let pb = self.opts.progress.then(|| make_count_progress(files.len() as u64, label));
        let wlm = self.opts.window_log_max;
        let errors = Mutex::new(Vec::<(PathBuf, String)>::new());

        run_bounded(&files, self.opts.file_concurrency, |path| {
            let res = match mode {
                IntegrityMode::Quick { sample_bytes } => quick_validate_zst(path, wlm, sample_bytes),
                IntegrityMode::Full => validate_zst_full(path, wlm),
            };
            if let Err(e) = res {
                tracing::warn!(path = %path.display(), error = %e, "archive failed integrity check");
                errors.lock().push((path.clone(), e.to_string()));
            }
            if let Some(pb) = &pb {
                pb.inc(1);
            }
        })?;

        if let Some(pb) = pb {
            pb.finish_with_message("done");
        }
        let mut errors = errors.into_inner();
        errors.sort();
        tracing::info!(checked = files.len(), failed = errors.len(), "integrity check finished");
        Ok(errors)
    }
}
