//! Daily sentiment per subreddit over every per-archive TSV output.
//!
//! Files are ingested in parallel, each into its own `Aggregator` state, and the states
//! are merged. The result is one CSV with header
//! `year,day,subreddit,avg_polarity,avg_subjectivity,count`, ordered by (year, day) and
//! then subreddit.

use crate::date::year_and_ordinal;
use crate::paths::OUTPUT_EXT;
use crate::pipeline::SentimentETL;
use crate::progress::make_count_progress;
use crate::record::ScoredRecord;
use crate::tsv::TsvReader;
use crate::util::{create_with_backoff, init_tracing_once, replace_file_atomic_backoff, with_suffix};
use ahash::RandomState;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub trait Aggregator: Send + Default {
    fn ingest(&mut self, record: &ScoredRecord);
    fn merge(&mut self, other: Self);
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct GroupKey {
    year: i32,
    day: u16,
    subreddit: String,
}

#[derive(Clone, Copy, Debug, Default)]
struct Acc {
    polarity_sum: f64,
    subjectivity_sum: f64,
    count: u64,
}

/// One output row.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateRow {
    pub year: i32,
    pub day: u16,
    pub subreddit: String,
    pub avg_polarity: f64,
    pub avg_subjectivity: f64,
    pub count: u64,
}

/// Group-by (year, day-of-year, subreddit) with running sums.
#[derive(Debug, Default)]
pub struct DailySentiment {
    groups: HashMap<GroupKey, Acc, RandomState>,
    /// Rows whose timestamp is outside the representable calendar.
    pub skipped: u64,
}

impl Aggregator for DailySentiment {
    fn ingest(&mut self, r: &ScoredRecord) {
        let Some((year, day)) = year_and_ordinal(r.created_utc) else {
            self.skipped += 1;
            return;
        };
        let acc = self.groups.entry(GroupKey { year, day, subreddit: r.subreddit.clone() }).or_default();
        acc.polarity_sum += r.polarity;
        acc.subjectivity_sum += r.subjectivity;
        acc.count += 1;
    }

    fn merge(&mut self, other: Self) {
        for (k, v) in other.groups {
            let acc = self.groups.entry(k).or_default();
            acc.polarity_sum += v.polarity_sum;
            acc.subjectivity_sum += v.subjectivity_sum;
            acc.count += v.count;
        }
        self.skipped += other.skipped;
    }
}

impl DailySentiment {
    /// Final rows, ordered by (year, day, subreddit).
    pub fn rows(&self) -> Vec<AggregateRow> {
        let mut keys: Vec<&GroupKey> = self.groups.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|k| {
                let a = &self.groups[k];
                let n = a.count as f64;
                AggregateRow {
                    year: k.year,
                    day: k.day,
                    subreddit: k.subreddit.clone(),
                    avg_polarity: a.polarity_sum / n,
                    avg_subjectivity: a.subjectivity_sum / n,
                    count: a.count,
                }
            })
            .collect()
    }
}

pub const CSV_HEADER: &str = "year,day,subreddit,avg_polarity,avg_subjectivity,count";

fn csv_field(s: &str) -> std::borrow::Cow<'_, str> {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\"")).into()
    } else {
        s.into()
    }
}

pub fn write_csv<W: Write>(w: &mut W, rows: &[AggregateRow]) -> std::io::Result<()> {
    writeln!(w, "{CSV_HEADER}")?;
    for r in rows {
        writeln!(w, "{},{},{},{},{},{}", r.year, r.day, csv_field(&r.subreddit), r.avg_polarity, r.avg_subjectivity, r.count)?;
    }
    Ok(())
}

/// Every finished per-archive output under `dir` (recursively), sorted.
pub fn discover_tsv_inputs(dir: &Path) -> Vec<PathBuf> {
    let mut v: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|x| x.to_str()) == Some(OUTPUT_EXT))
        .collect();
    v.sort();
    v
}

/// What an aggregation run read and wrote.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregateSummary {
    pub files: usize,
    pub rows_in: u64,
    pub bad_rows: u64,
    pub groups: usize,
}

impl SentimentETL {
    /// Fold every file in `inputs` into one `A`, one file per task.
    pub fn aggregate_tsvs_parallel<A: Aggregator>(&self, inputs: &[PathBuf]) -> Result<(A, u64, u64)> {
        let pb = self.opts.progress.then(|| make_count_progress(inputs.len() as u64, "Aggregate"));
        let read_buf = self.opts.read_buffer_bytes;

        let parts = inputs
            .par_iter()
            .map(|input| -> Result<(A, u64, u64)> {
                let mut agg = A::default();
                let mut n = 0u64;
                let mut rdr = TsvReader::open(input, read_buf).with_context(|| format!("open {}", input.display()))?;
                while let Some(row) = rdr.next_row()? {
                    agg.ingest(&row);
                    n += 1;
                }
                if rdr.bad_rows > 0 {
                    tracing::warn!(path = %input.display(), bad_rows = rdr.bad_rows, "skipped unparsable rows");
                }
                if let Some(pb) = &pb {
                    pb.inc(1);
                }
                Ok((agg, n, rdr.bad_rows))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(pb) = pb {
            pb.finish_with_message("Aggregate: merged");
        }

        let mut total = A::default();
        let (mut rows, mut bad) = (0u64, 0u64);
        for (part, n, b) in parts {
            total.merge(part);
            rows += n;
            bad += b;
        }
        Ok((total, rows, bad))
    }

    /// Load all `.tsv` outputs under `input_dir`, group by (year, day-of-year, subreddit)
    /// in UTC, and write the ordered result to `output_path` (atomically).
    pub fn aggregate_dir(&self, input_dir: &Path, output_path: &Path) -> Result<AggregateSummary> {
        init_tracing_once();
        let inputs = discover_tsv_inputs(input_dir);
        if inputs.is_empty() {
            tracing::warn!(dir = %input_dir.display(), "no .tsv inputs found; writing header only");
        }

        let (agg, rows_in, bad_rows) = self.aggregate_tsvs_parallel::<DailySentiment>(&inputs)?;
        if agg.skipped > 0 {
            tracing::warn!(skipped = agg.skipped, "rows with out-of-range timestamps skipped");
        }
        let rows = agg.rows();

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let tmp = with_suffix(output_path, ".inprogress");
        let f = create_with_backoff(&tmp, 16, 50).with_context(|| format!("create {}", tmp.display()))?;
        let mut w = BufWriter::with_capacity(self.opts.write_buffer_bytes, f);
        write_csv(&mut w, &rows).with_context(|| format!("write {}", tmp.display()))?;
        w.flush().with_context(|| format!("flush {}", tmp.display()))?;
        drop(w);
        replace_file_atomic_backoff(&tmp, output_path)?;

        let summary = AggregateSummary { files: inputs.len(), rows_in, bad_rows, groups: rows.len() };
        tracing::info!(files = summary.files, rows = summary.rows_in, groups = summary.groups, out = %output_path.display(), "aggregation written");
        Ok(summary)
    }
}

/// `aggregate(input_directory, output_path)` with default options and no progress bar.
pub fn aggregate(input_dir: &Path, output_path: &Path) -> Result<AggregateSummary> {
    SentimentETL::new().progress(false).aggregate_dir(input_dir, output_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, sub: &str, ts: i64, pol: f64, subj: f64) -> ScoredRecord {
        ScoredRecord { id: id.into(), subreddit: sub.into(), created_utc: ts, polarity: pol, subjectivity: subj }
    }

    const JAN_1_2006: i64 = 1_136_073_600;
    const DAY: i64 = 86_400;

    #[test]
    fn groups_by_year_day_and_subreddit() {
        let mut a = DailySentiment::default();
        a.ingest(&rec("a", "x", JAN_1_2006 + 10, 0.5, 0.5));
        a.ingest(&rec("b", "x", JAN_1_2006 + 20, -0.5, 0.5));
        a.ingest(&rec("c", "y", JAN_1_2006 + 30, 1.0, 0.0));
        a.ingest(&rec("d", "x", JAN_1_2006 + DAY, 0.25, 1.0));

        let rows = a.rows();
        assert_eq!(
            rows,
            vec![
                AggregateRow { year: 2006, day: 1, subreddit: "x".into(), avg_polarity: 0.0, avg_subjectivity: 0.5, count: 2 },
                AggregateRow { year: 2006, day: 1, subreddit: "y".into(), avg_polarity: 1.0, avg_subjectivity: 0.0, count: 1 },
                AggregateRow { year: 2006, day: 2, subreddit: "x".into(), avg_polarity: 0.25, avg_subjectivity: 1.0, count: 1 },
            ]
        );
    }

    #[test]
    fn merge_equals_single_pass() {
        let recs = [
            rec("a", "x", JAN_1_2006, 0.1, 0.2),
            rec("b", "x", JAN_1_2006 + 5, 0.3, 0.4),
            rec("c", "z", JAN_1_2006 - DAY, -0.3, 0.9),
        ];
        let mut whole = DailySentiment::default();
        recs.iter().for_each(|r| whole.ingest(r));

        let mut left = DailySentiment::default();
        let mut right = DailySentiment::default();
        left.ingest(&recs[0]);
        right.ingest(&recs[1]);
        right.ingest(&recs[2]);
        left.merge(right);

        assert_eq!(left.rows(), whole.rows());
        // 2005-12-31 sorts before 2006-01-01 although its day number is larger.
        assert_eq!((left.rows()[0].year, left.rows()[0].day), (2005, 365));
    }

    #[test]
    fn csv_has_header_and_quotes_awkward_names() {
        let rows = vec![AggregateRow {
            year: 2006,
            day: 1,
            subreddit: "a,\"b\"".into(),
            avg_polarity: 0.0,
            avg_subjectivity: 0.5,
            count: 2,
        }];
        let mut out = Vec::new();
        write_csv(&mut out, &rows).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "year,day,subreddit,avg_polarity,avg_subjectivity,count\n2006,1,\"a,\"\"b\"\"\",0,0.5,2\n"
        );
    }
}
