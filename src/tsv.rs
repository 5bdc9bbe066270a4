//! Per-archive TSV output: `id \t subreddit \t created_utc \t polarity \t subjectivity`, no header.
//!
//! Files are written under `<name>.inprogress` and promoted on `finish_atomic`, so a
//! `.tsv` on disk is always complete. Its existence is the unit's completion marker.

use crate::record::{RecordSink, ScoredRecord};
use crate::util::{create_with_backoff, open_with_backoff, remove_with_backoff, replace_file_atomic_backoff, with_suffix};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Tabs and line breaks inside a field would shift columns; flatten them to spaces.
fn clean_field(s: &str) -> std::borrow::Cow<'_, str> {
    if s.contains(['\t', '\n', '\r']) {
        s.replace(['\t', '\n', '\r'], " ").into()
    } else {
        s.into()
    }
}

pub fn write_tsv_row<W: Write + ?Sized>(w: &mut W, row: &ScoredRecord) -> io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}\t{}\t{}",
        clean_field(&row.id),
        clean_field(&row.subreddit),
        row.created_utc,
        row.polarity,
        row.subjectivity
    )
}

/// Parse one TSV row back into a record. `None` for rows with the wrong shape.
pub fn parse_tsv_row(line: &str) -> Option<ScoredRecord> {
    let mut it = line.split('\t');
    let id = it.next()?;
    let subreddit = it.next()?;
    let created_utc = it.next()?.trim().parse().ok()?;
    let polarity = it.next()?.trim().parse().ok()?;
    let subjectivity = it.next()?.trim().parse().ok()?;
    if it.next().is_some() {
        return None;
    }
    Some(ScoredRecord { id: id.to_string(), subreddit: subreddit.to_string(), created_utc, polarity, subjectivity })
}

/// Buffered TSV writer on a temp path; promote with `finish_atomic`, or drop/`abandon` to discard.
pub struct TsvWriter {
    tmp_path: PathBuf,
    final_path: PathBuf,
    w: Option<BufWriter<File>>,
}

impl TsvWriter {
    pub fn create(final_path: &Path, buf_bytes: usize) -> Result<Self> {
        let tmp_path = with_suffix(final_path, ".inprogress");
        let f = create_with_backoff(&tmp_path, 16, 50).with_context(|| format!("create {}", tmp_path.display()))?;
        Ok(Self {
            tmp_path,
            final_path: final_path.to_path_buf(),
            w: Some(BufWriter::with_capacity(buf_bytes.max(8 * 1024), f)),
        })
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Flush and atomically promote the temp file to the final path.
    pub fn finish_atomic(mut self) -> Result<PathBuf> {
        if let Some(mut w) = self.w.take() {
            w.flush().with_context(|| format!("flush {}", self.tmp_path.display()))?;
            w.into_inner()
                .map_err(|e| e.into_error())
                .and_then(|f| f.sync_all())
                .with_context(|| format!("sync {}", self.tmp_path.display()))?;
        }
        replace_file_atomic_backoff(&self.tmp_path, &self.final_path)?;
        Ok(self.final_path.clone())
    }

    /// Discard the partial output.
    pub fn abandon(mut self) -> Result<()> {
        drop(self.w.take());
        remove_with_backoff(&self.tmp_path, 16, 50)
    }
}

impl RecordSink for TsvWriter {
    fn write_row(&mut self, row: &ScoredRecord) -> io::Result<()> {
        match &mut self.w {
            Some(w) => write_tsv_row(w, row),
            None => Err(io::Error::new(io::ErrorKind::Other, "writer already finished")),
        }
    }
}

impl Drop for TsvWriter {
    fn drop(&mut self) {
        if self.w.take().is_some() {
            let _ = std::fs::remove_file(&self.tmp_path);
        }
    }
}

/// Buffered reader over one TSV output. Yields parsed rows; skips blank lines,
/// counts rows that do not parse.
pub struct TsvReader {
    path: PathBuf,
    rdr: BufReader<File>,
    buf: String,
    pub bad_rows: u64,
}

impl TsvReader {
    pub fn open(path: &Path, buf_bytes: usize) -> io::Result<Self> {
        let f = open_with_backoff(path, 16, 50)?;
        Ok(Self {
            path: path.to_path_buf(),
            rdr: BufReader::with_capacity(buf_bytes.max(8 * 1024), f),
            buf: String::with_capacity(256),
            bad_rows: 0,
        })
    }

    /// Next parsed row; `Ok(None)` at EOF.
    pub fn next_row(&mut self) -> Result<Option<ScoredRecord>> {
        loop {
            self.buf.clear();
            let n = self.rdr.read_line(&mut self.buf).with_context(|| format!("read {}", self.path.display()))?;
            if n == 0 {
                return Ok(None);
            }
            let line = self.buf.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                continue;
            }
            match parse_tsv_row(line) {
                Some(row) => return Ok(Some(row)),
                None => self.bad_rows += 1,
            }
        }
    }
}
